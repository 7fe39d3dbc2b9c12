//! Structural checks over a finished package.
//!
//! These are the conditions Office reports as "needs repair": relationship
//! targets that do not exist, parts without a content type, duplicate
//! overrides and slide IDs out of range or repeated.

use crate::container::{Package, CONTENT_TYPES_PART};
use crate::content_types::ContentTypes;
use crate::deck::{presentation_part, MIN_MASTER_LAYOUT_ID};
use crate::error::Result;
use crate::rels;
use crate::xmltext::{find_element, find_elements, start_tags};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// A structural problem found in a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Issue {
    /// Internal relationship whose target part does not exist
    DanglingRelationship { source: String, id: String, target: String },
    /// Part with neither an override nor a default for its extension
    MissingContentType { part: String },
    /// More than one override for the same part
    DuplicateOverride { part: String },
    /// Slide ID listed more than once
    DuplicateSlideId { id: u32 },
    /// Slide ID outside 256..2147483648
    SlideIdOutOfRange { id: u32 },
    /// `sldId` whose relationship is missing from `presentation.xml.rels`
    UnlinkedSlide { id: u32, rel_id: String },
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Issue::DanglingRelationship { source, id, target } => {
                write!(f, "{} {} points at missing {}", source, id, target)
            }
            Issue::MissingContentType { part } => write!(f, "{} has no content type", part),
            Issue::DuplicateOverride { part } => write!(f, "{} has duplicate overrides", part),
            Issue::DuplicateSlideId { id } => write!(f, "slide id {} is listed twice", id),
            Issue::SlideIdOutOfRange { id } => write!(f, "slide id {} is out of range", id),
            Issue::UnlinkedSlide { id, rel_id } => {
                write!(f, "slide id {} refers to unknown relationship {}", id, rel_id)
            }
        }
    }
}

/// One entry of the presentation's slide list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlideEntry {
    pub id: u32,
    pub rel_id: String,
    /// Resolved slide part, if the relationship exists
    pub part: Option<String>,
}

/// Summary of a package's presentation structure.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PackageReport {
    pub slides: Vec<SlideEntry>,
    pub masters: Vec<String>,
    pub layouts: Vec<String>,
    pub themes: Vec<String>,
    /// Media part names with their sizes in bytes
    pub media: BTreeMap<String, usize>,
    pub issues: Vec<Issue>,
}

impl PackageReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Inspect a package and collect every structural issue.
pub fn audit(pkg: &Package) -> Result<PackageReport> {
    let mut report = PackageReport::default();
    let presentation = presentation_part(pkg);
    let root = rels::parent_dir(&presentation);
    let under = |dir: &str| {
        let prefix = if root.is_empty() {
            format!("{}/", dir)
        } else {
            format!("{}/{}/", root, dir)
        };
        pkg.list_with_prefix(&prefix)
            .into_iter()
            .filter(|p| !p.ends_with(".rels") && !p.contains("/_rels/"))
            .collect::<Vec<_>>()
    };
    report.masters = under("slideMasters");
    report.layouts = under("slideLayouts");
    report.themes = under("theme");
    report.media = under("media")
        .into_iter()
        .map(|p| {
            let size = pkg.get_binary(&p).map_or(0, <[u8]>::len);
            (p, size)
        })
        .collect();

    let pres_rels = pkg
        .get_text(&rels::rels_path_for(&presentation))
        .map(rels::parse)
        .transpose()?
        .unwrap_or_default();

    if let Some(xml) = pkg.get_text(&presentation) {
        let sections = find_element(xml, "sectionLst");
        let list = find_elements(xml, "sldIdLst").into_iter().find(|l| match sections {
            Some(s) => l.open.start < s.open.start || l.open.start >= s.end,
            None => true,
        });
        let mut seen = HashSet::new();
        if let Some(list) = list {
            for tag in start_tags(list.inner(xml), "sldId") {
                let Some(id) = tag.attr("id").and_then(|v| v.trim().parse::<u32>().ok()) else {
                    continue;
                };
                let rel_id = tag.attr("r:id").unwrap_or_default().to_string();
                if !seen.insert(id) {
                    report.issues.push(Issue::DuplicateSlideId { id });
                }
                if !(256..MIN_MASTER_LAYOUT_ID).contains(&id) {
                    report.issues.push(Issue::SlideIdOutOfRange { id });
                }
                let part = pres_rels
                    .iter()
                    .find(|r| r.id == rel_id)
                    .map(|r| rels::resolve(&presentation, &r.target));
                if part.is_none() {
                    report.issues.push(Issue::UnlinkedSlide {
                        id,
                        rel_id: rel_id.clone(),
                    });
                }
                report.slides.push(SlideEntry { id, rel_id, part });
            }
        }
    }

    for rels_part in pkg.part_names().filter(|n| n.ends_with(".rels")) {
        let Some(owner) = rels::owner_of_rels(rels_part) else {
            continue;
        };
        let Some(list) = pkg.get_text(rels_part).and_then(|xml| rels::parse(xml).ok()) else {
            continue;
        };
        for rel in list.into_iter().filter(|r| !r.external) {
            let target = rels::resolve(&owner, &rel.target);
            if !pkg.contains(&target) {
                report.issues.push(Issue::DanglingRelationship {
                    source: rels_part.to_string(),
                    id: rel.id,
                    target,
                });
            }
        }
    }

    if let Ok(types) = ContentTypes::from_package(pkg) {
        for part in pkg.part_names().filter(|n| *n != CONTENT_TYPES_PART) {
            if types.override_count(part) > 1 {
                report.issues.push(Issue::DuplicateOverride {
                    part: part.to_string(),
                });
            }
            if types.content_type_of(part).is_none() {
                report.issues.push(Issue::MissingContentType {
                    part: part.to_string(),
                });
            }
        }
    }

    Ok(report)
}
