//! # reportdeck
//!
//! Personalized PowerPoint reports by OOXML slide injection.
//!
//! The core copies slides out of a template `.pptx` into an output
//! presentation, cloning each slide's layout, master, theme and media
//! exactly once, renumbering slide and relationship IDs without
//! collisions and patching `presentation.xml`, its relationships and
//! `[Content_Types].xml` so the result opens without a repair prompt.
//!
//! ## Quick Start
//!
//! ```no_run
//! use reportdeck::{DeckBuilder, Package, Placeholders, Position, SlideRequest};
//!
//! let template = Package::open("template.pptx")?;
//! let mut deck = DeckBuilder::from_template(&template)?;
//!
//! let cover = Placeholders::new().with("姓名", "李雷").with("日期", "2024-05-01");
//! deck.inject(&SlideRequest::new(1, Position::Start).with_placeholders(cover))?;
//! deck.inject(&SlideRequest::new(7, Position::End))?;
//!
//! let (output, slides) = deck.finish()?;
//! output.write_to("李雷.pptx")?;
//! println!("{} slides", slides.len());
//! # Ok::<(), reportdeck::Error>(())
//! ```
//!
//! ## Batch Reports
//!
//! ```no_run
//! use reportdeck::workflow::{BatchConfig, BatchRunner};
//!
//! let config = BatchConfig::load("batch.toml")?;
//! let employees = reportdeck::load_employees(&config.employees)?;
//! let summary = BatchRunner::from_config(config)?.run(&employees)?;
//! println!("{} ok, {} skipped, {} failed", summary.succeeded, summary.skipped, summary.failed);
//! # Ok::<(), reportdeck::Error>(())
//! ```

pub mod audit;
pub mod container;
pub mod content_types;
pub mod deck;
pub mod detect;
pub mod docx;
pub mod error;
pub mod model;
pub mod rels;
pub mod workflow;
pub mod xlsx;
pub mod xmltext;

// Re-exports
pub use audit::{audit, Issue, PackageReport};
pub use container::{Package, PartData};
pub use content_types::ContentTypes;
pub use deck::{
    finalize, inject_slide, skeleton, DeckBuilder, ImagePayload, InjectOutcome, Placeholders,
    Position, RunState, SlideRecord, SlideRequest,
};
pub use detect::{detect_format_from_bytes, detect_format_from_path, FormatType};
pub use error::{Error, Result};
pub use model::{AssetBundle, AssetCategory, Attachment, AttachmentKind, Employee, ImagePage};
pub use rels::{RelKind, Relationship};
pub use xlsx::load_employees;

use std::path::Path;

/// Inject template slides into a deck file and write the result.
///
/// `requests` are applied in order; requests for slides the template
/// lacks are skipped. Returns the records of the injected slides.
///
/// # Example
///
/// ```no_run
/// use reportdeck::{inject_into_file, Position, SlideRequest};
///
/// let slides = inject_into_file(
///     "template.pptx",
///     "deck.pptx",
///     "deck-out.pptx",
///     &[SlideRequest::new(1, Position::Start)],
/// )?;
/// # Ok::<(), reportdeck::Error>(())
/// ```
pub fn inject_into_file(
    template: impl AsRef<Path>,
    deck: impl AsRef<Path>,
    output: impl AsRef<Path>,
    requests: &[SlideRequest],
) -> Result<Vec<SlideRecord>> {
    let template = detect::open_as(template, FormatType::Pptx)?;
    let deck = detect::open_as(deck, FormatType::Pptx)?;
    let mut builder = DeckBuilder::new(&template, deck)?;
    for request in requests {
        builder.inject(request)?;
    }
    let (package, records) = builder.finish()?;
    package.write_to(output)?;
    Ok(records)
}

/// Audit a presentation file.
///
/// # Example
///
/// ```no_run
/// let report = reportdeck::inspect("report.pptx")?;
/// for issue in &report.issues {
///     println!("{}", issue);
/// }
/// # Ok::<(), reportdeck::Error>(())
/// ```
pub fn inspect(path: impl AsRef<Path>) -> Result<PackageReport> {
    audit(&detect::open_as(path, FormatType::Pptx)?)
}
