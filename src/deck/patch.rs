//! One-shot rewrite of the presentation's coordination parts.

use super::inject::{Position, SlideRecord};
use super::state::RunState;
use crate::container::Package;
use crate::error::{Error, Result};
use crate::rels::{self, Relationship, REL_TYPE_SLIDE, REL_TYPE_SLIDE_MASTER};
use crate::xmltext::{self, find_element, find_elements, start_tags, Element};
use tracing::{debug, info};

/// Children of `<p:presentation>` that precede `<p:sldIdLst>`, last first.
const SLIDE_LIST_ANCHORS: [&str; 3] = ["handoutMasterIdLst", "notesMasterIdLst", "sldMasterIdLst"];

/// List the pending slides and cloned masters in `presentation.xml`,
/// append their relationships and write the three coordination parts.
///
/// Slide IDs and relationship IDs are allocated here and returned on the
/// records. Must run exactly once per [`RunState`].
pub fn finalize(output: &mut Package, state: &mut RunState) -> Result<Vec<SlideRecord>> {
    if state.is_finalized() {
        return Err(Error::InvalidData("presentation already finalized".to_string()));
    }

    let presentation_path = state.presentation_path().to_string();
    let mut records = std::mem::take(&mut state.pending);
    let mut presentation_rels = state.presentation_rels().to_string();
    let mut xml = state.presentation_xml().to_string();

    // IDs follow final slide order; records stay in injection order
    let mut order: Vec<usize> = (0..records.len()).collect();
    order.sort_by_key(|&i| records[i].position);
    for i in order {
        let record = &mut records[i];
        let rel_id = format!("rId{}", state.ids.next_rel_id());
        let slide_id = state.ids.next_slide_id()?;
        let rel = Relationship::new(
            rel_id.clone(),
            REL_TYPE_SLIDE,
            rels::relativize(&presentation_path, &record.part_name),
        );
        presentation_rels = rels::append_to_xml(&presentation_rels, &rel)?;
        record.rel_id = Some(rel_id);
        record.slide_id = Some(slide_id);
    }

    if !records.is_empty() {
        xml = rebuild_slide_list(&xml, &records)?;
        xml = sync_sections(&xml, &records);
    }

    for master in state.clones.new_masters().to_vec() {
        let rel_id = format!("rId{}", state.ids.next_rel_id());
        let id = state.ids.next_master_layout_id();
        let rel = Relationship::new(
            rel_id.clone(),
            REL_TYPE_SLIDE_MASTER,
            rels::relativize(&presentation_path, &master),
        );
        presentation_rels = rels::append_to_xml(&presentation_rels, &rel)?;
        xml = append_master_entry(&xml, id, &rel_id)?;
        debug!(master = %master, id, rel_id = %rel_id, "listed slide master");
    }

    for (part, content_type) in state.created_parts().to_vec() {
        state.content_types_mut().ensure_override(&part, &content_type);
    }

    output.put(&presentation_path, xml.clone());
    output.put(&rels::rels_path_for(&presentation_path), presentation_rels.clone());
    state.content_types().write_to(output);
    state.set_presentation_xml(xml);
    state.set_presentation_rels(presentation_rels);
    state.mark_finalized();

    info!(
        slides = records.len(),
        masters = state.clones.new_masters().len(),
        parts = state.created_parts().len(),
        "finalized presentation"
    );
    Ok(records)
}

/// Root prefix of `presentation.xml` (normally `p:`).
fn root_prefix(xml: &str) -> &str {
    start_tags(xml, "presentation")
        .first()
        .map(|t| t.prefix())
        .unwrap_or("p:")
}

/// The presentation's own `sldIdLst`, not a section's `p14:sldIdLst`.
fn main_slide_list(xml: &str) -> Option<Element<'_>> {
    let sections = find_element(xml, "sectionLst");
    find_elements(xml, "sldIdLst").into_iter().find(|list| match sections {
        Some(s) => list.open.start < s.open.start || list.open.start >= s.end,
        None => true,
    })
}

fn slide_entries(prefix: &str, records: &[SlideRecord], position: Position) -> String {
    records
        .iter()
        .filter(|r| r.position == position)
        .filter_map(|r| {
            Some(format!(
                r#"<{}sldId id="{}" r:id="{}"/>"#,
                prefix,
                r.slide_id?,
                r.rel_id.as_deref()?
            ))
        })
        .collect()
}

/// Rebuild `<p:sldIdLst>` as start entries, the original entries
/// untouched, middle entries, then end entries.
pub fn rebuild_slide_list(xml: &str, records: &[SlideRecord]) -> Result<String> {
    let prefix = root_prefix(xml);

    let Some(list) = main_slide_list(xml) else {
        let content: String = [Position::Start, Position::Middle, Position::End]
            .iter()
            .map(|p| slide_entries(prefix, records, *p))
            .collect();
        let new_list = format!("<{p}sldIdLst>{}</{p}sldIdLst>", content, p = prefix);
        let anchor = SLIDE_LIST_ANCHORS
            .iter()
            .find_map(|name| find_element(xml, name))
            .map(|el| el.end)
            .or_else(|| start_tags(xml, "sldSz").first().map(|t| t.start))
            .ok_or_else(|| {
                Error::MissingComponent("presentation.xml has no place for sldIdLst".to_string())
            })?;
        return Ok(xmltext::splice(xml, anchor, anchor, &new_list));
    };

    let prefix = list.open.prefix();
    let content = format!(
        "{}{}{}{}",
        slide_entries(prefix, records, Position::Start),
        list.inner(xml),
        slide_entries(prefix, records, Position::Middle),
        slide_entries(prefix, records, Position::End)
    );
    let open = if list.open.is_empty_element() {
        format!("{}>", list.open.text.trim_end_matches("/>").trim_end())
    } else {
        list.open.text.to_string()
    };
    let rebuilt = format!("{}{}</{}>", open, content, list.open.qname);
    Ok(xmltext::splice(xml, list.open.start, list.end, &rebuilt))
}

/// Keep `p14:sectionLst` consistent: start slides join the first section,
/// middle and end slides join the last one.
pub fn sync_sections(xml: &str, records: &[SlideRecord]) -> String {
    let section_lists = |xml: &str| -> Vec<(usize, usize)> {
        let Some(sections) = find_element(xml, "sectionLst") else {
            return Vec::new();
        };
        find_elements(xml, "sldIdLst")
            .into_iter()
            .filter(|l| l.open.start > sections.open.start && l.end <= sections.end)
            .map(|l| (l.open.start, l.end))
            .collect()
    };
    let ids = |positions: &[Position]| -> Vec<u32> {
        records
            .iter()
            .filter(|r| positions.contains(&r.position))
            .filter_map(|r| r.slide_id)
            .collect()
    };
    let entries = |prefix: &str, ids: &[u32]| -> String {
        ids.iter()
            .map(|id| format!(r#"<{}sldId id="{}"/>"#, prefix, id))
            .collect()
    };

    let mut out = xml.to_string();
    let mut trailing = ids(&[Position::Middle]);
    trailing.extend(ids(&[Position::End]));
    if !trailing.is_empty() {
        if let Some(&(start, _)) = section_lists(&out).last() {
            if let Some(list) = find_element(&out[start..], "sldIdLst") {
                let local = xmltext::append_child(&out[start..], &list, &entries(list.open.prefix(), &trailing));
                out = format!("{}{}", &out[..start], local);
            }
        }
    }
    let leading = ids(&[Position::Start]);
    if !leading.is_empty() {
        if let Some(&(start, _)) = section_lists(&out).first() {
            if let Some(list) = find_element(&out[start..], "sldIdLst") {
                let local = xmltext::prepend_child(&out[start..], &list, &entries(list.open.prefix(), &leading));
                out = format!("{}{}", &out[..start], local);
            }
        }
    }
    out
}

/// Append a `<p:sldMasterId>` entry, creating the list when absent.
fn append_master_entry(xml: &str, id: u32, rel_id: &str) -> Result<String> {
    let prefix = root_prefix(xml);
    let entry = format!(r#"<{}sldMasterId id="{}" r:id="{}"/>"#, prefix, id, rel_id);
    if let Some(list) = find_element(xml, "sldMasterIdLst") {
        return Ok(xmltext::append_child(xml, &list, &entry));
    }
    let root = start_tags(xml, "presentation")
        .first()
        .copied()
        .ok_or_else(|| Error::MissingComponent("presentation root element".to_string()))?;
    let list = format!("<{p}sldMasterIdLst>{}</{p}sldMasterIdLst>", entry, p = prefix);
    Ok(xmltext::splice(xml, root.end, root.end, &list))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::fixtures;
    use crate::deck::ids::{MAX_SLIDE_ID, MIN_SLIDE_ID};
    use crate::deck::inject::{inject_slide, SlideRequest};

    fn record(n: u32, id: u32, position: Position) -> SlideRecord {
        SlideRecord {
            slide_number: n,
            slide_id: Some(id),
            rel_id: Some(format!("rId{}", 100 + n)),
            position,
            part_name: format!("ppt/slides/slide{}.xml", n),
            template_slide: 1,
        }
    }

    fn listed_ids(xml: &str) -> Vec<u32> {
        let list = main_slide_list(xml).unwrap();
        start_tags(list.inner(xml), "sldId")
            .iter()
            .filter_map(|t| t.attr("id")?.parse().ok())
            .collect()
    }

    #[test]
    fn test_slide_order_start_original_middle_end() {
        let xml = r#"<p:presentation><p:sldMasterIdLst/><p:sldIdLst><p:sldId id="256" r:id="rId2"/><p:sldId id='300' r:id='rId3'/></p:sldIdLst></p:presentation>"#;
        let records = [
            record(10, 401, Position::End),
            record(11, 400, Position::Start),
            record(12, 402, Position::End),
            record(13, 403, Position::Middle),
        ];
        let out = rebuild_slide_list(xml, &records).unwrap();
        assert_eq!(listed_ids(&out), vec![400, 256, 300, 403, 401, 402]);
        // Original entries are kept byte-for-byte.
        assert!(out.contains(r#"<p:sldId id='300' r:id='rId3'/>"#));
    }

    #[test]
    fn test_self_closing_and_missing_slide_list() {
        let records = [record(1, 257, Position::Start)];
        let xml = r#"<p:presentation><p:sldMasterIdLst/><p:sldIdLst/><p:sldSz/></p:presentation>"#;
        let out = rebuild_slide_list(xml, &records).unwrap();
        assert_eq!(
            out,
            r#"<p:presentation><p:sldMasterIdLst/><p:sldIdLst><p:sldId id="257" r:id="rId101"/></p:sldIdLst><p:sldSz/></p:presentation>"#
        );

        let xml = r#"<p:presentation><p:sldMasterIdLst></p:sldMasterIdLst><p:notesMasterIdLst/><p:sldSz/></p:presentation>"#;
        let out = rebuild_slide_list(xml, &records).unwrap();
        assert!(out.contains(r#"<p:notesMasterIdLst/><p:sldIdLst><p:sldId id="257""#));
    }

    #[test]
    fn test_sections_receive_new_ids() {
        let xml = format!(
            "<p:presentation><p:sldIdLst/>{}</p:presentation>",
            fixtures::section_list(&[&[256], &[257]])
        );
        let records = [
            record(1, 300, Position::Start),
            record(2, 301, Position::End),
            record(3, 302, Position::Middle),
        ];
        let out = sync_sections(&xml, &records);
        assert!(out.contains(r#"<p14:sldIdLst><p14:sldId id="300"/><p14:sldId id="256"/></p14:sldIdLst>"#));
        assert!(out.contains(
            r#"<p14:sldIdLst><p14:sldId id="257"/><p14:sldId id="302"/><p14:sldId id="301"/></p14:sldIdLst>"#
        ));
        // The main list is not a section list.
        assert_eq!(main_slide_list(&out).unwrap().open.qname, "p:sldIdLst");
    }

    #[test]
    fn test_single_section_gets_both_ends() {
        let xml = format!("<p:presentation>{}</p:presentation>", fixtures::section_list(&[&[256]]));
        let records = [record(1, 300, Position::Start), record(2, 301, Position::End)];
        let out = sync_sections(&xml, &records);
        assert!(out.contains(
            r#"<p14:sldIdLst><p14:sldId id="300"/><p14:sldId id="256"/><p14:sldId id="301"/></p14:sldIdLst>"#
        ));
    }

    #[test]
    fn test_finalize_allocates_fresh_ids_and_writes_parts() {
        let template = fixtures::template();
        let mut output = fixtures::base_deck(&[256, 257, 900]);
        let mut state = RunState::new(&output).unwrap();
        for (n, position) in [(1, Position::Start), (7, Position::End), (2, Position::Middle)] {
            inject_slide(&template, &mut output, &mut state, &SlideRequest::new(n, position)).unwrap();
        }
        let records = finalize(&mut output, &mut state).unwrap();
        assert_eq!(records.len(), 3);

        let ids: Vec<u32> = records.iter().map(|r| r.slide_id.unwrap()).collect();
        for id in &ids {
            assert!(*id >= MIN_SLIDE_ID);
            assert!(![256, 257, 900].contains(id));
        }
        let xml = output.get_text("ppt/presentation.xml").unwrap();
        assert_eq!(listed_ids(xml), vec![ids[0], 256, 257, 900, ids[2], ids[1]]);

        let pres_rels = rels::parse(output.get_text("ppt/_rels/presentation.xml.rels").unwrap()).unwrap();
        for record in &records {
            let rel = pres_rels
                .iter()
                .find(|r| Some(r.id.as_str()) == record.rel_id.as_deref())
                .unwrap();
            assert_eq!(rels::resolve("ppt/presentation.xml", &rel.target), record.part_name);
        }

        // The cloned master is listed with an ID from the shared space.
        let masters = start_tags(xml, "sldMasterId");
        assert_eq!(masters.len(), 2);
        let master_id: u32 = masters[1].attr("id").unwrap().parse().unwrap();
        assert!(master_id > 2_147_483_649);

        let types = crate::content_types::ContentTypes::from_package(&output).unwrap();
        for (part, _) in state.created_parts() {
            assert_eq!(types.override_count(part), 1, "{}", part);
        }
    }

    #[test]
    fn test_slide_ids_follow_final_order() {
        let template = fixtures::template();
        let mut output = fixtures::base_deck(&[256]);
        let mut state = RunState::new(&output).unwrap();
        for (n, position) in [(7, Position::End), (2, Position::Middle), (1, Position::Start)] {
            inject_slide(&template, &mut output, &mut state, &SlideRequest::new(n, position)).unwrap();
        }
        let records = finalize(&mut output, &mut state).unwrap();

        // records keep injection order
        let positions: Vec<Position> = records.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![Position::End, Position::Middle, Position::Start]);

        let xml = output.get_text("ppt/presentation.xml").unwrap();
        assert_eq!(listed_ids(xml), vec![257, 256, 258, 259]);
        assert_eq!(records[2].slide_id, Some(257));
        assert_eq!(records[0].slide_id, Some(259));
    }

    #[test]
    fn test_slide_id_after_maximum_stays_in_range() {
        let template = fixtures::template();
        let mut output = fixtures::base_deck(&[256, MAX_SLIDE_ID]);
        let mut state = RunState::new(&output).unwrap();
        inject_slide(&template, &mut output, &mut state, &SlideRequest::new(1, Position::End)).unwrap();
        let records = finalize(&mut output, &mut state).unwrap();

        assert_eq!(records[0].slide_id, Some(MIN_SLIDE_ID));
        let xml = output.get_text("ppt/presentation.xml").unwrap();
        assert_eq!(listed_ids(xml), vec![256, MAX_SLIDE_ID, MIN_SLIDE_ID]);
        let report = crate::audit::audit(&output).unwrap();
        assert!(report.is_clean(), "{:?}", report.issues);
    }

    #[test]
    fn test_finalize_twice_fails() {
        let mut output = fixtures::base_deck(&[256]);
        let mut state = RunState::new(&output).unwrap();
        finalize(&mut output, &mut state).unwrap();
        assert!(finalize(&mut output, &mut state).is_err());
    }

    #[test]
    fn test_append_master_entry_creates_list() {
        let xml = r#"<p:presentation xmlns:p="p"><p:sldSz/></p:presentation>"#;
        let out = append_master_entry(xml, 2147483700, "rId9").unwrap();
        assert_eq!(
            out,
            r#"<p:presentation xmlns:p="p"><p:sldMasterIdLst><p:sldMasterId id="2147483700" r:id="rId9"/></p:sldMasterIdLst><p:sldSz/></p:presentation>"#
        );
    }
}
