//! Slide-free copy of a template used as the output base.

use super::state::presentation_part;
use crate::container::{Package, CONTENT_TYPES_PART};
use crate::content_types::ContentTypes;
use crate::error::{Error, Result};
use crate::rels::{self, RelKind};
use crate::xmltext::{self, find_element, find_elements};
use std::collections::{HashSet, VecDeque};
use tracing::debug;

/// Copy `template` without any slide.
///
/// Slides, their relationships and `sldId` entries are removed, along with
/// sections and custom shows that list them. Parts no longer reachable
/// from the package relationships (notes slides, slide-only media, charts)
/// are dropped together with their content-type overrides.
pub fn skeleton(template: &Package) -> Result<Package> {
    let mut pkg = template.clone();
    let presentation = presentation_part(&pkg);
    let rels_path = rels::rels_path_for(&presentation);

    let pres_rels = rels::parse(
        pkg.get_text(&rels_path)
            .ok_or_else(|| Error::MissingComponent(rels_path.clone()))?,
    )?;
    let kept: Vec<_> = pres_rels
        .into_iter()
        .filter(|r| r.kind() != RelKind::Slide)
        .collect();
    pkg.put(&rels_path, rels::serialize(&kept));

    let mut xml = pkg
        .get_text(&presentation)
        .ok_or_else(|| Error::MissingComponent(presentation.clone()))?
        .to_string();
    if let Some(list) = find_element(&xml, "sldIdLst") {
        let empty = format!("<{}/>", list.open.qname);
        xml = xmltext::splice(&xml, list.open.start, list.end, &empty);
    }
    if let Some(shows) = find_element(&xml, "custShowLst") {
        xml = xmltext::splice(&xml, shows.open.start, shows.end, "");
    }
    if let Some(sections) = find_element(&xml, "sectionLst") {
        let holder = find_elements(&xml, "ext")
            .into_iter()
            .find(|ext| ext.open.start < sections.open.start && ext.end >= sections.end);
        let (start, end) = holder
            .map(|ext| (ext.open.start, ext.end))
            .unwrap_or((sections.open.start, sections.end));
        xml = xmltext::splice(&xml, start, end, "");
    }
    pkg.put(&presentation, xml);

    let reachable = reachable_parts(&pkg);
    let mut types = ContentTypes::from_package(&pkg)?;
    let unreachable: Vec<String> = pkg
        .part_names()
        .filter(|name| !is_kept(name, &reachable))
        .map(String::from)
        .collect();
    for part in &unreachable {
        pkg.remove(part);
        types.remove_override(part);
    }
    types.write_to(&mut pkg);

    debug!(removed = unreachable.len(), "built skeleton");
    Ok(pkg)
}

/// Parts reachable through internal relationships from `_rels/.rels`.
fn reachable_parts(pkg: &Package) -> HashSet<String> {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([String::new()]);

    while let Some(part) = queue.pop_front() {
        let rels_path = rels::rels_path_for(&part);
        let Some(list) = pkg.get_text(&rels_path).and_then(|xml| rels::parse(xml).ok()) else {
            continue;
        };
        for rel in list.iter().filter(|r| !r.external) {
            let target = rels::resolve(&part, &rel.target);
            if pkg.contains(&target) && seen.insert(target.clone()) {
                queue.push_back(target);
            }
        }
    }
    seen
}

fn is_kept(name: &str, reachable: &HashSet<String>) -> bool {
    if name == CONTENT_TYPES_PART || reachable.contains(name) {
        return true;
    }
    match rels::owner_of_rels(name) {
        Some(owner) if owner.is_empty() => true,
        Some(owner) => reachable.contains(&owner),
        None => false,
    }
}
