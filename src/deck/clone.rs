//! Copying template parts into the output package exactly once per run.
//!
//! Dependencies are resolved bottom-up: a layout clones its master first,
//! a master clones its theme first. Every clone is memoized by its source
//! path in the template, so all relationships to one source part end up
//! pointing at the same new part.

use super::ids::IdAllocator;
use super::state::RunState;
use crate::container::{Package, PartData};
use crate::content_types::{
    mime_for_extension, CT_NOTES_SLIDE, CT_SLIDE_LAYOUT, CT_SLIDE_MASTER, CT_THEME,
};
use crate::error::{Error, Result};
use crate::rels::{self, RelKind, Relationship, REL_TYPE_SLIDE_LAYOUT};
use crate::xmltext::{self, find_element, start_tags};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Result of cloning a slide layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutClone {
    pub new_path: String,
    /// New path of the master the layout now belongs to
    pub master_path: String,
}

/// Result of cloning a slide master.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterClone {
    pub new_path: String,
    pub theme_path: String,
}

/// Result of cloning a theme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeClone {
    pub new_path: String,
}

/// A cloned master whose layout list grows as layouts are attached.
#[derive(Debug, Clone)]
struct MasterDraft {
    xml: String,
    rels: Vec<Relationship>,
    layouts: Vec<(u32, String)>,
}

/// Memoization tables keyed by template source path.
#[derive(Debug, Default)]
pub struct CloneMaps {
    layouts: HashMap<String, LayoutClone>,
    masters: HashMap<String, MasterClone>,
    themes: HashMap<String, ThemeClone>,
    media: HashMap<String, String>,
    parts: HashMap<String, Option<String>>,
    drafts: HashMap<String, MasterDraft>,
    new_masters: Vec<String>,
}

impl CloneMaps {
    /// Layout clone for a template layout path.
    pub fn layout(&self, source: &str) -> Option<&LayoutClone> {
        self.layouts.get(source)
    }

    /// Master clone for a template master path.
    pub fn master(&self, source: &str) -> Option<&MasterClone> {
        self.masters.get(source)
    }

    /// Theme clone for a template theme path.
    pub fn theme(&self, source: &str) -> Option<&ThemeClone> {
        self.themes.get(source)
    }

    /// New media path for a template media path.
    pub fn media(&self, source: &str) -> Option<&str> {
        self.media.get(source).map(String::as_str)
    }

    /// Masters cloned in this run, in creation order.
    pub fn new_masters(&self) -> &[String] {
        &self.new_masters
    }

    /// Treat parts the output shares unchanged with the template (as in a
    /// skeleton built from it) as clones of themselves.
    pub fn adopt_shared(&mut self, template: &Package, output: &Package) {
        let target_of = |part: &str, kind: RelKind| -> Option<String> {
            let xml = output.get_text(&rels::rels_path_for(part))?;
            rels::parse(xml)
                .ok()?
                .into_iter()
                .find(|r| r.kind() == kind && !r.external)
                .map(|r| rels::resolve(part, &r.target))
        };

        for name in output.part_names() {
            if name.ends_with(".rels") || template.get(name) != output.get(name) {
                continue;
            }
            let file_dir = rels::parent_dir(name).rsplit('/').next().unwrap_or_default();
            match file_dir {
                "slideLayouts" => {
                    if let Some(master_path) = target_of(name, RelKind::SlideMaster) {
                        let clone = LayoutClone {
                            new_path: name.to_string(),
                            master_path,
                        };
                        self.layouts.insert(name.to_string(), clone);
                    }
                }
                "slideMasters" => {
                    if let Some(theme_path) = target_of(name, RelKind::Theme) {
                        let clone = MasterClone {
                            new_path: name.to_string(),
                            theme_path,
                        };
                        self.masters.insert(name.to_string(), clone);
                    }
                }
                "theme" => {
                    let clone = ThemeClone {
                        new_path: name.to_string(),
                    };
                    self.themes.insert(name.to_string(), clone);
                }
                "media" => {
                    self.media.insert(name.to_string(), name.to_string());
                }
                _ => {}
            }
        }
    }
}

/// Where the relationships being rewritten belong.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct RelContext<'c> {
    /// New slide the part hangs off, if any
    pub owner_slide: Option<&'c str>,
    /// Template slide being injected
    pub template_slide: Option<&'c str>,
    /// Honour the per-slide image replacements
    pub image_overrides: bool,
    /// Drop `slideLayout` relationships (cloned masters rebuild their own)
    pub drop_layouts: bool,
}

/// Clones template parts into an output package.
pub struct AssetCloner<'a> {
    template: &'a Package,
    output: &'a mut Package,
    state: &'a mut RunState,
}

impl<'a> AssetCloner<'a> {
    pub fn new(template: &'a Package, output: &'a mut Package, state: &'a mut RunState) -> Self {
        Self {
            template,
            output,
            state,
        }
    }

    /// Copy a media part under a fresh `template_media_<n>.<ext>` name.
    ///
    /// A missing source is logged and yields `None`; the caller leaves its
    /// relationship pointing at the original path.
    pub fn clone_media(&mut self, source: &str) -> Option<String> {
        if let Some(existing) = self.state.clones.media.get(source) {
            return Some(existing.clone());
        }
        let template = self.template;
        let Some(bytes) = template.get_binary(source) else {
            warn!(source, "template media is missing; relationship left dangling");
            return None;
        };
        let ext = extension_of(source).unwrap_or("bin").to_ascii_lowercase();
        let new_path = self.write_media(bytes.to_vec(), &ext, "template_media");
        debug!(source, new_path = %new_path, "cloned media");
        self.state
            .clones
            .media
            .insert(source.to_string(), new_path.clone());
        Some(new_path)
    }

    /// Write media bytes under a fresh sequential name and make sure the
    /// extension has a content-type default.
    pub fn write_media(&mut self, bytes: Vec<u8>, ext: &str, prefix: &str) -> String {
        let n = self.state.ids.next_media_seq();
        let new_path = self
            .state
            .root_path(&format!("media/{}_{}.{}", prefix, n, ext));
        self.output.put(&new_path, PartData::Binary(bytes));
        self.ensure_extension_default(ext, None);
        new_path
    }

    /// Register a `<Default>` for an extension unless the output has one.
    pub fn ensure_extension_default(&mut self, ext: &str, mime: Option<&str>) {
        if self.state.content_types().has_default(ext) {
            return;
        }
        let template = self.template;
        let content_type = mime
            .or_else(|| mime_for_extension(ext))
            .map(String::from)
            .or_else(|| {
                self.state
                    .template_types(template)
                    .and_then(|ct| ct.default_for(ext))
                    .map(String::from)
            })
            .unwrap_or_else(|| "application/octet-stream".to_string());
        self.state
            .content_types_mut()
            .ensure_default(ext, &content_type);
    }

    /// Clone a theme (and any media it references).
    pub fn clone_theme(&mut self, source: &str) -> Result<ThemeClone> {
        if let Some(existing) = self.state.clones.themes.get(source) {
            return Ok(existing.clone());
        }
        let template = self.template;
        let xml = template
            .get_text(source)
            .ok_or_else(|| Error::MissingComponent(format!("template theme {}", source)))?;

        let n = self.state.ids.next_theme_number();
        let new_path = self.state.root_path(&format!("theme/theme{}.xml", n));
        let clone = ThemeClone {
            new_path: new_path.clone(),
        };
        self.state
            .clones
            .themes
            .insert(source.to_string(), clone.clone());

        self.output.put(&new_path, xml.to_string());
        let rels = self.clone_rels(source, &new_path, RelContext::default())?;
        self.write_rels(source, &new_path, &rels);
        self.state.register_part(&new_path, CT_THEME);
        debug!(source, new_path = %new_path, "cloned theme");
        Ok(clone)
    }

    /// Clone a slide master after its theme.
    ///
    /// The clone starts with an empty layout list; layouts cloned against
    /// it are attached one by one.
    pub fn clone_master(&mut self, source: &str) -> Result<MasterClone> {
        if let Some(existing) = self.state.clones.masters.get(source) {
            return Ok(existing.clone());
        }
        let template = self.template;
        let xml = template
            .get_text(source)
            .ok_or_else(|| Error::MissingComponent(format!("template slide master {}", source)))?;
        let source_rels = self.template_rels(source)?;

        let theme_rel = source_rels
            .iter()
            .find(|r| r.kind() == RelKind::Theme && !r.external)
            .ok_or_else(|| {
                Error::Template(format!("slide master {} has no theme relationship", source))
            })?;
        let theme = self.clone_theme(&rels::resolve(source, &theme_rel.target))?;

        let n = self.state.ids.next_master_number();
        let new_path = self
            .state
            .root_path(&format!("slideMasters/slideMaster{}.xml", n));
        let clone = MasterClone {
            new_path: new_path.clone(),
            theme_path: theme.new_path,
        };
        self.state
            .clones
            .masters
            .insert(source.to_string(), clone.clone());

        let rels = self.clone_rels(
            source,
            &new_path,
            RelContext {
                drop_layouts: true,
                ..RelContext::default()
            },
        )?;
        let draft = MasterDraft {
            xml: empty_layout_list(xml, source)?,
            rels,
            layouts: Vec::new(),
        };
        self.state.clones.drafts.insert(new_path.clone(), draft);
        self.state.clones.new_masters.push(new_path.clone());
        self.write_master(&new_path);
        self.state.register_part(&new_path, CT_SLIDE_MASTER);
        debug!(source, new_path = %new_path, "cloned slide master");
        Ok(clone)
    }

    /// Clone a slide layout, cloning its master (and theme) first.
    pub fn clone_layout(&mut self, source: &str) -> Result<LayoutClone> {
        if let Some(existing) = self.state.clones.layouts.get(source) {
            return Ok(existing.clone());
        }
        let template = self.template;
        let xml = template
            .get_text(source)
            .ok_or_else(|| Error::MissingComponent(format!("template slide layout {}", source)))?;
        let source_rels = self.template_rels(source)?;

        let master_rel = source_rels
            .iter()
            .find(|r| r.kind() == RelKind::SlideMaster && !r.external)
            .ok_or_else(|| {
                Error::Template(format!(
                    "slide layout {} has no slideMaster relationship",
                    source
                ))
            })?;
        let master = self.clone_master(&rels::resolve(source, &master_rel.target))?;

        let n = self.state.ids.next_layout_number();
        let new_path = self
            .state
            .root_path(&format!("slideLayouts/slideLayout{}.xml", n));
        let clone = LayoutClone {
            new_path: new_path.clone(),
            master_path: master.new_path.clone(),
        };
        self.state
            .clones
            .layouts
            .insert(source.to_string(), clone.clone());

        self.output.put(&new_path, xml.to_string());
        let rels = self.clone_rels(source, &new_path, RelContext::default())?;
        self.write_rels(source, &new_path, &rels);
        self.state.register_part(&new_path, CT_SLIDE_LAYOUT);
        self.attach_layout(&master.new_path, &new_path);
        debug!(source, new_path = %new_path, master = %master.new_path, "cloned slide layout");
        Ok(clone)
    }

    /// Copy any other internal part under a fresh number in the same
    /// directory, carrying its content type and relationships.
    ///
    /// Returns `None` (after a warning) when the template lacks the part.
    pub fn clone_part(&mut self, source: &str) -> Result<Option<String>> {
        self.clone_part_in(source, RelContext::default())
    }

    pub(crate) fn clone_part_in(&mut self, source: &str, ctx: RelContext<'_>) -> Result<Option<String>> {
        if let Some(existing) = self.state.clones.parts.get(source) {
            return Ok(existing.clone());
        }
        let template = self.template;
        let Some(data) = template.get(source) else {
            warn!(source, "template part is missing; relationship left dangling");
            self.state.clones.parts.insert(source.to_string(), None);
            return Ok(None);
        };

        let dir = rels::parent_dir(source);
        let file = &source[source.rfind('/').map_or(0, |p| p + 1)..];
        let (stem, ext) = file.rsplit_once('.').unwrap_or((file, "bin"));
        let family = stem.trim_end_matches(|c: char| c.is_ascii_digit());
        let family = if family.is_empty() { "part" } else { family };

        let n = self.state.ids.next_part_number(self.output, dir, family, ext);
        let new_path = if dir.is_empty() {
            format!("{}{}.{}", family, n, ext)
        } else {
            format!("{}/{}{}.{}", dir, family, n, ext)
        };
        self.state
            .clones
            .parts
            .insert(source.to_string(), Some(new_path.clone()));
        self.output.put(&new_path, data.clone());

        let override_ct = self
            .state
            .template_types(template)
            .and_then(|ct| ct.override_for(source))
            .map(String::from);
        match override_ct {
            Some(ct) => self.state.register_part(&new_path, &ct),
            None => self.ensure_extension_default(ext, None),
        }

        let inner = RelContext {
            image_overrides: false,
            drop_layouts: false,
            ..ctx
        };
        let rels = self.clone_rels(source, &new_path, inner)?;
        self.write_rels(source, &new_path, &rels);
        debug!(source, new_path = %new_path, "cloned part");
        Ok(Some(new_path))
    }

    /// Clone a notes slide for a freshly injected slide.
    ///
    /// Notes need a notes master in the output; without one the notes are
    /// dropped with a warning.
    pub(crate) fn clone_notes(&mut self, source: &str, ctx: RelContext<'_>) -> Result<Option<String>> {
        if self.state.notes_master().is_none() {
            warn!(source, "output has no notes master; speaker notes dropped");
            return Ok(None);
        }
        let template = self.template;
        let Some(xml) = template.get_text(source) else {
            warn!(source, "template notes slide is missing; speaker notes dropped");
            return Ok(None);
        };

        let dir = self.state.root_path("notesSlides");
        let n = self
            .state
            .ids
            .next_part_number(self.output, &dir, "notesSlide", "xml");
        let new_path = format!("{}/notesSlide{}.xml", dir, n);
        self.output.put(&new_path, xml.to_string());

        let inner = RelContext {
            image_overrides: false,
            ..ctx
        };
        let rels = self.clone_rels(source, &new_path, inner)?;
        self.write_rels(source, &new_path, &rels);
        self.state.register_part(&new_path, CT_NOTES_SLIDE);
        Ok(Some(new_path))
    }

    /// Rewrite the template relationships of `source` for its clone at
    /// `new_part`, cloning every internal target on the way.
    pub(crate) fn clone_rels(
        &mut self,
        source: &str,
        new_part: &str,
        ctx: RelContext<'_>,
    ) -> Result<Vec<Relationship>> {
        let mut out = Vec::new();

        for rel in self.template_rels(source)? {
            if rel.external {
                out.push(rel);
                continue;
            }
            let target = rels::resolve(source, &rel.target);

            let new_target = match rel.kind() {
                RelKind::SlideLayout if ctx.drop_layouts => continue,
                RelKind::SlideLayout => Some(self.clone_layout(&target)?.new_path),
                RelKind::SlideMaster => Some(self.clone_master(&target)?.new_path),
                RelKind::Theme => Some(self.clone_theme(&target)?.new_path),
                RelKind::Image | RelKind::Media => {
                    let replaced = if ctx.image_overrides {
                        self.state.image_overrides().get(&rel.id).cloned()
                    } else {
                        None
                    };
                    replaced.or_else(|| self.clone_media(&target))
                }
                RelKind::NotesSlide => match ctx.owner_slide {
                    Some(_) => match self.clone_notes(&target, ctx)? {
                        Some(path) => Some(path),
                        None => continue,
                    },
                    None => {
                        warn!(source, target = %target, "notes relationship outside a slide");
                        None
                    }
                },
                RelKind::NotesMaster => match self.state.notes_master() {
                    Some(path) => Some(path.to_string()),
                    None => {
                        warn!(source, "output has no notes master");
                        None
                    }
                },
                RelKind::Slide => self.slide_link_target(&target, ctx),
                RelKind::Other => self.clone_part_in(&target, ctx)?,
            };

            match new_target {
                Some(path) => out.push(Relationship {
                    target: rels::relativize(new_part, &path),
                    ..rel
                }),
                None => {
                    warn!(source, id = %rel.id, target = %rel.target, "dangling relationship kept");
                    out.push(rel);
                }
            }
        }

        Ok(out)
    }

    /// Where a slide-to-slide relationship should point in the output.
    fn slide_link_target(&self, target: &str, ctx: RelContext<'_>) -> Option<String> {
        let owner = ctx.owner_slide?;
        if ctx.template_slide == Some(target) {
            return Some(owner.to_string());
        }
        match self.state.injected_copy(target) {
            Some(copy) => Some(copy.to_string()),
            None => {
                warn!(target, owner, "linked slide not injected; link retargeted to its own slide");
                Some(owner.to_string())
            }
        }
    }

    /// Parsed template relationships of a part (empty when it has none).
    pub(crate) fn template_rels(&self, part: &str) -> Result<Vec<Relationship>> {
        match self.template.get_text(&rels::rels_path_for(part)) {
            Some(xml) => rels::parse(xml),
            None => Ok(Vec::new()),
        }
    }

    /// Write the relationships of a clone when the source had a rels part
    /// or the clone gained relationships.
    pub(crate) fn write_rels(&mut self, source: &str, new_part: &str, list: &[Relationship]) {
        let had_rels = self.template.contains(&rels::rels_path_for(source));
        if had_rels || !list.is_empty() {
            self.output
                .put(&rels::rels_path_for(new_part), rels::serialize(list));
        }
    }

    /// Add a cloned layout to a cloned master's relationships and layout list.
    fn attach_layout(&mut self, master_path: &str, layout_path: &str) {
        let state = &mut *self.state;
        let Some(draft) = state.clones.drafts.get_mut(master_path) else {
            return;
        };
        let rel_id = IdAllocator::next_local_rel_id(&draft.rels);
        draft.rels.push(Relationship::new(
            rel_id.clone(),
            REL_TYPE_SLIDE_LAYOUT,
            rels::relativize(master_path, layout_path),
        ));
        let layout_id = state.ids.next_master_layout_id();
        draft.layouts.push((layout_id, rel_id));
        self.write_master(master_path);
    }

    /// Write a master draft with its current layout list.
    fn write_master(&mut self, master_path: &str) {
        let Some(draft) = self.state.clones.drafts.get(master_path) else {
            return;
        };
        let xml = match find_element(&draft.xml, "sldLayoutIdLst") {
            Some(list) => {
                let prefix = list.open.prefix();
                let entries: String = draft
                    .layouts
                    .iter()
                    .map(|(id, rid)| format!("<{}sldLayoutId id=\"{}\" r:id=\"{}\"/>", prefix, id, rid))
                    .collect();
                xmltext::append_child(&draft.xml, &list, &entries)
            }
            None => draft.xml.clone(),
        };
        let rels_xml = rels::serialize(&draft.rels);
        self.output.put(master_path, xml);
        self.output.put(&rels::rels_path_for(master_path), rels_xml);
    }
}

/// Replace a master's layout list with an empty one, inserting the list
/// after `clrMap` when the master has none.
fn empty_layout_list(xml: &str, source: &str) -> Result<String> {
    if let Some(list) = find_element(xml, "sldLayoutIdLst") {
        let empty = format!("<{}/>", list.open.qname);
        return Ok(xmltext::splice(xml, list.open.start, list.end, &empty));
    }
    let clr_map = find_element(xml, "clrMap").ok_or_else(|| {
        Error::Template(format!("slide master {} has neither sldLayoutIdLst nor clrMap", source))
    })?;
    let prefix = start_tags(xml, "sldMaster")
        .first()
        .map(|t| t.prefix())
        .unwrap_or("p:");
    let empty = format!("<{}sldLayoutIdLst/>", prefix);
    Ok(xmltext::splice(xml, clr_map.end, clr_map.end, &empty))
}

/// File extension of a part name.
pub(crate) fn extension_of(part: &str) -> Option<&str> {
    let file = part.rsplit('/').next()?;
    file.rsplit_once('.').map(|(_, ext)| ext).filter(|e| !e.is_empty())
}
