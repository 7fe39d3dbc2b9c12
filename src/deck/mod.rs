//! Slide injection engine.
//!
//! A run copies slides from a template package into an output package:
//! [`inject_slide`] copies one slide and pulls its layout, master, theme,
//! media and other parts through [`AssetCloner`]; [`finalize`] then lists
//! the new slides and masters in `presentation.xml` in one pass.
//! [`DeckBuilder`] bundles the three for one output file.

mod builder;
mod clone;
mod ids;
mod inject;
mod patch;
mod picture;
mod placeholder;
mod skeleton;
mod state;

#[cfg(test)]
pub(crate) mod fixtures;

pub use builder::DeckBuilder;
pub use clone::{AssetCloner, CloneMaps, LayoutClone, MasterClone, ThemeClone};
pub use ids::{IdAllocator, MAX_SLIDE_ID, MIN_MASTER_LAYOUT_ID, MIN_SLIDE_ID};
pub use inject::{inject_slide, ImagePayload, InjectOutcome, Position, SlideRecord, SlideRequest};
pub use patch::{finalize, rebuild_slide_list, sync_sections};
pub use picture::{fit_picture, image_dimensions, Frame};
pub use placeholder::{escape_text, expand_line_breaks, strip_marker, substitute, Placeholders};
pub use skeleton::skeleton;
pub use state::{presentation_part, RunState};
