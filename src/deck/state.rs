//! Per-output-package run state.
//!
//! One [`RunState`] exists per "open output package -> inject N slides ->
//! finalize" unit of work. It is owned by that unit and passed by
//! reference into every clone and injection call.

use super::clone::CloneMaps;
use super::ids::IdAllocator;
use super::inject::SlideRecord;
use crate::container::Package;
use crate::content_types::ContentTypes;
use crate::error::{Error, Result};
use crate::rels::{self, RelKind};
use std::collections::HashMap;

/// Locate the main presentation part through the package relationships,
/// falling back to the conventional `ppt/presentation.xml`.
pub fn presentation_part(pkg: &Package) -> String {
    pkg.get_text("_rels/.rels")
        .and_then(|xml| rels::parse(xml).ok())
        .and_then(|list| {
            list.into_iter()
                .find(|r| r.rel_type.ends_with("/officeDocument") && !r.external)
                .map(|r| rels::resolve("", &r.target))
        })
        .filter(|path| pkg.contains(path))
        .unwrap_or_else(|| "ppt/presentation.xml".to_string())
}

/// Mutable bookkeeping for one injection run.
#[derive(Debug)]
pub struct RunState {
    /// Number allocator seeded from the output package
    pub ids: IdAllocator,
    /// Memoized clones keyed by template source path
    pub clones: CloneMaps,
    /// Slides injected but not yet listed in `presentation.xml`
    pub pending: Vec<SlideRecord>,
    presentation_path: String,
    presentation_xml: String,
    presentation_rels: String,
    content_types: ContentTypes,
    template_types: Option<ContentTypes>,
    image_overrides: HashMap<String, String>,
    injected: HashMap<String, String>,
    created: Vec<(String, String)>,
    notes_master: Option<String>,
    finalized: bool,
}

impl RunState {
    /// Capture working copies of the output package's coordination parts.
    ///
    /// Fails when the output lacks `presentation.xml`, its relationships or
    /// `[Content_Types].xml`.
    pub fn new(output: &Package) -> Result<Self> {
        let presentation_path = presentation_part(output);
        let presentation_xml = output
            .get_text(&presentation_path)
            .ok_or_else(|| Error::MissingComponent(presentation_path.clone()))?
            .to_string();
        let rels_path = rels::rels_path_for(&presentation_path);
        let presentation_rels = output
            .get_text(&rels_path)
            .ok_or_else(|| Error::MissingComponent(rels_path.clone()))?
            .to_string();
        let content_types = ContentTypes::from_package(output)?;

        let notes_master = rels::parse(&presentation_rels)?
            .into_iter()
            .find(|r| r.kind() == RelKind::NotesMaster && !r.external)
            .map(|r| rels::resolve(&presentation_path, &r.target))
            .filter(|path| output.contains(path));

        let root = rels::parent_dir(&presentation_path).to_string();
        let ids = IdAllocator::scan(output, &root, &presentation_xml, &presentation_rels);

        Ok(Self {
            ids,
            clones: CloneMaps::default(),
            pending: Vec::new(),
            presentation_path,
            presentation_xml,
            presentation_rels,
            content_types,
            template_types: None,
            image_overrides: HashMap::new(),
            injected: HashMap::new(),
            created: Vec::new(),
            notes_master,
            finalized: false,
        })
    }

    /// Part name of the output presentation.
    pub fn presentation_path(&self) -> &str {
        &self.presentation_path
    }

    /// Directory of the output presentation (normally `ppt`).
    pub fn root(&self) -> &str {
        rels::parent_dir(&self.presentation_path)
    }

    /// Part path under the output root, e.g. `root_path("slides/slide3.xml")`.
    pub fn root_path(&self, rest: &str) -> String {
        if self.root().is_empty() {
            rest.to_string()
        } else {
            format!("{}/{}", self.root(), rest)
        }
    }

    /// Working copy of `presentation.xml`.
    pub fn presentation_xml(&self) -> &str {
        &self.presentation_xml
    }

    pub(crate) fn set_presentation_xml(&mut self, xml: String) {
        self.presentation_xml = xml;
    }

    /// Working copy of the presentation relationships.
    pub fn presentation_rels(&self) -> &str {
        &self.presentation_rels
    }

    pub(crate) fn set_presentation_rels(&mut self, xml: String) {
        self.presentation_rels = xml;
    }

    /// Working copy of `[Content_Types].xml`.
    pub fn content_types(&self) -> &ContentTypes {
        &self.content_types
    }

    pub(crate) fn content_types_mut(&mut self) -> &mut ContentTypes {
        &mut self.content_types
    }

    /// Content types of the template package, read once per run.
    pub(crate) fn template_types(&mut self, template: &Package) -> Option<&ContentTypes> {
        if self.template_types.is_none() {
            self.template_types = ContentTypes::from_package(template).ok();
        }
        self.template_types.as_ref()
    }

    /// Notes master already present in the output package.
    pub fn notes_master(&self) -> Option<&str> {
        self.notes_master.as_deref()
    }

    /// Record a new part that must carry an `<Override>` after finalize.
    pub(crate) fn register_part(&mut self, part: &str, content_type: &str) {
        self.content_types.ensure_override(part, content_type);
        self.created.push((part.to_string(), content_type.to_string()));
    }

    /// New parts created in this run with their content types.
    pub fn created_parts(&self) -> &[(String, String)] {
        &self.created
    }

    /// Image replacements for the slide currently being injected, keyed
    /// by the template relationship ID.
    pub(crate) fn image_overrides(&self) -> &HashMap<String, String> {
        &self.image_overrides
    }

    pub(crate) fn image_overrides_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.image_overrides
    }

    /// First injected copy of a template slide.
    pub fn injected_copy(&self, template_slide: &str) -> Option<&str> {
        self.injected.get(template_slide).map(String::as_str)
    }

    pub(crate) fn record_injected(&mut self, template_slide: &str, new_path: &str) {
        self.injected
            .entry(template_slide.to_string())
            .or_insert_with(|| new_path.to_string());
    }

    /// Whether finalize already ran.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub(crate) fn mark_finalized(&mut self) {
        self.finalized = true;
    }
}
