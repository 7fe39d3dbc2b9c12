//! Collision-free allocation of slide, relationship, part and media numbers.
//!
//! Every allocator is seeded from what the output package already holds.
//! A number, once handed out, is recorded immediately, so no later call
//! (even after the package gained new parts) can reissue it.

use crate::container::Package;
use crate::error::{Error, Result};
use crate::rels;
use crate::xmltext::start_tags;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Lowest slide ID this allocator hands out. Slide IDs stay strictly above 256.
pub const MIN_SLIDE_ID: u32 = 257;

/// Highest valid `<p:sldId id>`.
pub const MAX_SLIDE_ID: u32 = 2_147_483_647;

/// Lowest ID in the space shared by `sldMasterId` and `sldLayoutId`.
pub const MIN_MASTER_LAYOUT_ID: u32 = 2_147_483_648;

/// Counter over `floor..=ceiling` with a collision set.
///
/// Numbers are handed out above the highest one seen; once that passes
/// the ceiling, the lowest unused number in range is reused.
#[derive(Debug, Clone)]
struct Counter {
    used: HashSet<u32>,
    next: u32,
    floor: u32,
    ceiling: u32,
}

impl Counter {
    fn new(floor: u32, ceiling: u32) -> Self {
        Self {
            used: HashSet::new(),
            next: floor,
            floor,
            ceiling,
        }
    }

    fn seeded(floor: u32, existing: impl IntoIterator<Item = u32>) -> Self {
        Self::bounded(floor, u32::MAX, existing)
    }

    fn bounded(floor: u32, ceiling: u32, existing: impl IntoIterator<Item = u32>) -> Self {
        let mut counter = Self::new(floor, ceiling);
        for n in existing {
            counter.reserve(n);
        }
        counter
    }

    /// Mark a number as taken.
    fn reserve(&mut self, n: u32) {
        self.used.insert(n);
        if n >= self.next {
            self.next = n.saturating_add(1);
        }
    }

    /// Next free number, `None` once every number in range is used.
    fn take(&mut self) -> Option<u32> {
        let start = self.next.max(self.floor);
        let free = |n: &u32| !self.used.contains(n);
        let candidate = (start..=self.ceiling)
            .find(free)
            .or_else(|| (self.floor..=self.ceiling).find(free))?;
        self.used.insert(candidate);
        self.next = candidate.saturating_add(1);
        Some(candidate)
    }

    /// [`Counter::take`] for ranges too wide to fill in one package.
    fn take_any(&mut self) -> u32 {
        self.take().unwrap_or(self.ceiling)
    }
}

/// Numeric suffixes of parts matching `pattern` (one capture group).
fn numbers_matching(pkg: &Package, pattern: &str) -> Vec<u32> {
    let Ok(re) = Regex::new(pattern) else {
        return Vec::new();
    };
    pkg.part_names()
        .filter_map(|name| re.captures(name))
        .filter_map(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
        .collect()
}

/// Numeric values of an attribute on every tag with the given local name.
fn attribute_numbers(xml: &str, local: &str, attr: &str) -> Vec<u32> {
    start_tags(xml, local)
        .into_iter()
        .filter_map(|t| t.attr(attr)?.trim().parse::<u32>().ok())
        .collect()
}

/// Allocator for every number a slide injection run needs.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    slide_numbers: Counter,
    slide_ids: Counter,
    rel_ids: Counter,
    layout_numbers: Counter,
    master_numbers: Counter,
    theme_numbers: Counter,
    media_seq: Counter,
    master_layout_ids: Counter,
    part_numbers: HashMap<String, Counter>,
}

impl IdAllocator {
    /// Seed the allocator from an output package.
    ///
    /// `root` is the directory holding `presentation.xml` (normally `ppt`);
    /// the presentation XML and its relationships are passed as the run's
    /// working copies.
    pub fn scan(output: &Package, root: &str, presentation_xml: &str, presentation_rels: &str) -> Self {
        let dir = regex::escape(root);

        let slide_numbers = numbers_matching(output, &format!(r"^{}/slides/slide(\d+)\.xml$", dir));
        let layout_numbers =
            numbers_matching(output, &format!(r"^{}/slideLayouts/slideLayout(\d+)\.xml$", dir));
        let master_numbers =
            numbers_matching(output, &format!(r"^{}/slideMasters/slideMaster(\d+)\.xml$", dir));
        let theme_numbers = numbers_matching(output, &format!(r"^{}/theme/theme(\d+)\.xml$", dir));
        let media_numbers =
            numbers_matching(output, &format!(r"^{}/media/[^/]*?(\d+)\.[A-Za-z0-9]+$", dir));

        let slide_ids = attribute_numbers(presentation_xml, "sldId", "id");

        let rel_ids: Vec<u32> = start_tags(presentation_rels, "Relationship")
            .into_iter()
            .filter_map(|t| t.attr("Id")?.strip_prefix("rId")?.parse::<u32>().ok())
            .collect();

        let mut master_layout_ids = attribute_numbers(presentation_xml, "sldMasterId", "id");
        let master_re = format!(r"^{}/slideMasters/slideMaster\d+\.xml$", dir);
        if let Ok(re) = Regex::new(&master_re) {
            for master in output.list_matching(&re) {
                if let Some(xml) = output.get_text(&master) {
                    master_layout_ids.extend(attribute_numbers(xml, "sldLayoutId", "id"));
                }
            }
        }

        debug!(
            slides = slide_numbers.len(),
            slide_ids = slide_ids.len(),
            rel_ids = rel_ids.len(),
            "seeded id allocator"
        );

        Self {
            slide_numbers: Counter::seeded(1, slide_numbers),
            slide_ids: Counter::bounded(MIN_SLIDE_ID, MAX_SLIDE_ID, slide_ids),
            rel_ids: Counter::seeded(1, rel_ids),
            layout_numbers: Counter::seeded(1, layout_numbers),
            master_numbers: Counter::seeded(1, master_numbers),
            theme_numbers: Counter::seeded(1, theme_numbers),
            media_seq: Counter::seeded(1, media_numbers),
            master_layout_ids: Counter::seeded(MIN_MASTER_LAYOUT_ID, master_layout_ids),
            part_numbers: HashMap::new(),
        }
    }

    /// Next free `slideN.xml` number.
    pub fn next_slide_number(&mut self) -> u32 {
        self.slide_numbers.take_any()
    }

    /// Next free `<p:sldId id>`, within 257..=2147483647.
    ///
    /// Past the highest existing ID the lowest unused one is reused; an
    /// error only when the whole range is taken.
    pub fn next_slide_id(&mut self) -> Result<u32> {
        self.slide_ids.take().ok_or_else(|| {
            Error::InvalidData(format!(
                "no free slide id left in {}..={}",
                MIN_SLIDE_ID, MAX_SLIDE_ID
            ))
        })
    }

    /// Next free `rIdN` number in `presentation.xml.rels`.
    pub fn next_rel_id(&mut self) -> u32 {
        self.rel_ids.take_any()
    }

    /// Next free `slideLayoutN.xml` number.
    pub fn next_layout_number(&mut self) -> u32 {
        self.layout_numbers.take_any()
    }

    /// Next free `slideMasterN.xml` number.
    pub fn next_master_number(&mut self) -> u32 {
        self.master_numbers.take_any()
    }

    /// Next free `themeN.xml` number.
    pub fn next_theme_number(&mut self) -> u32 {
        self.theme_numbers.take_any()
    }

    /// Next free media sequence number.
    pub fn next_media_seq(&mut self) -> u32 {
        self.media_seq.take_any()
    }

    /// Next free ID in the master/layout ID space (≥ 2147483648).
    pub fn next_master_layout_id(&mut self) -> u32 {
        self.master_layout_ids.take_any()
    }

    /// Next free number for `<dir>/<stem>N.<ext>`, seeded from the package
    /// the first time a given family is requested.
    pub fn next_part_number(&mut self, output: &Package, dir: &str, stem: &str, ext: &str) -> u32 {
        let key = format!("{}/{}#.{}", dir, stem, ext);
        let counter = self.part_numbers.entry(key).or_insert_with(|| {
            let pattern = format!(
                r"^{}/{}(\d+)\.{}$",
                regex::escape(dir),
                regex::escape(stem),
                regex::escape(ext)
            );
            Counter::seeded(1, numbers_matching(output, &pattern))
        });
        counter.take_any()
    }

    /// Next free `rIdN` among a part-local relationship list.
    pub fn next_local_rel_id(existing: &[rels::Relationship]) -> String {
        format!("rId{}", rels::max_numeric_id(existing) + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRESENTATION: &str = r#"<p:presentation xmlns:p="p" xmlns:r="r"><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst><p:sldIdLst><p:sldId id="256" r:id="rId2"/><p:sldId r:id='rId3' id='900'/><p:sldId id="258" r:id="rId7"/></p:sldIdLst></p:presentation>"#;
    const PRESENTATION_RELS: &str = r#"<Relationships><Relationship Id="rId1" Type="x/slideMaster" Target="slideMasters/slideMaster1.xml"/><Relationship Id="rId2" Type="x/slide" Target="slides/slide1.xml"/><Relationship Type='x/slide' Target='slides/slide2.xml' Id='rId3'/><Relationship Id="rId7" Type="x/slide" Target="slides/slide9.xml"/></Relationships>"#;

    fn output() -> Package {
        let mut pkg = Package::new();
        pkg.put("ppt/slides/slide1.xml", "<p:sld/>");
        pkg.put("ppt/slides/slide2.xml", "<p:sld/>");
        pkg.put("ppt/slides/slide9.xml", "<p:sld/>");
        pkg.put("ppt/slideLayouts/slideLayout11.xml", "<p:sldLayout/>");
        pkg.put("ppt/slideMasters/slideMaster1.xml", r#"<p:sldMaster><p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/><p:sldLayoutId id="2147483660" r:id="rId2"/></p:sldLayoutIdLst></p:sldMaster>"#);
        pkg.put("ppt/theme/theme1.xml", "<a:theme/>");
        pkg.put("ppt/media/image4.png", vec![0u8]);
        pkg.put("ppt/media/template_media_12.jpeg", vec![0u8]);
        pkg
    }

    fn allocator() -> IdAllocator {
        IdAllocator::scan(&output(), "ppt", PRESENTATION, PRESENTATION_RELS)
    }

    #[test]
    fn test_file_numbers_continue_after_max() {
        let mut ids = allocator();
        assert_eq!(ids.next_slide_number(), 10);
        assert_eq!(ids.next_slide_number(), 11);
        assert_eq!(ids.next_layout_number(), 12);
        assert_eq!(ids.next_master_number(), 2);
        assert_eq!(ids.next_theme_number(), 2);
        assert_eq!(ids.next_media_seq(), 13);
    }

    #[test]
    fn test_slide_ids_skip_existing_and_stay_above_256() {
        let mut ids = allocator();
        let existing: HashSet<u32> = [256, 258, 900].into_iter().collect();
        let mut seen = HashSet::new();
        for _ in 0..50 {
            let id = ids.next_slide_id().unwrap();
            assert!(id > 256);
            assert!(!existing.contains(&id));
            assert!(seen.insert(id), "slide id {} issued twice", id);
        }
    }

    #[test]
    fn test_slide_ids_on_empty_presentation_start_above_256() {
        let mut ids = IdAllocator::scan(&Package::new(), "ppt", "<p:presentation/>", "<Relationships/>");
        assert_eq!(ids.next_slide_id().unwrap(), 257);
        assert_eq!(ids.next_slide_id().unwrap(), 258);
        assert_eq!(ids.next_rel_id(), 1);
    }

    #[test]
    fn test_low_existing_slide_ids_do_not_leak() {
        let xml = r#"<p:sldIdLst><p:sldId id="100" r:id="rId1"/><p:sldId id="257" r:id="rId2"/></p:sldIdLst>"#;
        let mut ids = IdAllocator::scan(&Package::new(), "ppt", xml, "<Relationships/>");
        assert_eq!(ids.next_slide_id().unwrap(), 258);
    }

    #[test]
    fn test_rel_ids_tolerate_attribute_order_and_quotes() {
        let mut ids = allocator();
        assert_eq!(ids.next_rel_id(), 8);
        assert_eq!(ids.next_rel_id(), 9);
    }

    #[test]
    fn test_master_layout_id_space() {
        let mut ids = allocator();
        let id = ids.next_master_layout_id();
        assert_eq!(id, 2_147_483_661);
        assert!(id >= MIN_MASTER_LAYOUT_ID);
    }

    #[test]
    fn test_counter_reserve_keeps_gaps_closed() {
        let mut counter = Counter::seeded(1, [3, 1]);
        assert_eq!(counter.take(), Some(4));
        counter.reserve(5);
        assert_eq!(counter.take(), Some(6));
    }

    #[test]
    fn test_slide_ids_reuse_gaps_below_ceiling() {
        let xml = r#"<p:sldIdLst><p:sldId id="256" r:id="rId1"/><p:sldId id="2147483647" r:id="rId2"/></p:sldIdLst>"#;
        let mut ids = IdAllocator::scan(&Package::new(), "ppt", xml, "<Relationships/>");
        assert_eq!(ids.next_slide_id().unwrap(), 257);
        assert_eq!(ids.next_slide_id().unwrap(), 258);
    }

    #[test]
    fn test_bounded_counter_exhausts() {
        let mut counter = Counter::bounded(1, 3, [1, 3]);
        assert_eq!(counter.take(), Some(2));
        assert_eq!(counter.take(), None);
    }

    #[test]
    fn test_next_part_number_per_family() {
        let mut pkg = Package::new();
        pkg.put("ppt/notesSlides/notesSlide4.xml", "<p:notes/>");
        let mut ids = allocator();
        assert_eq!(ids.next_part_number(&pkg, "ppt/notesSlides", "notesSlide", "xml"), 5);
        pkg.put("ppt/notesSlides/notesSlide5.xml", "<p:notes/>");
        assert_eq!(ids.next_part_number(&pkg, "ppt/notesSlides", "notesSlide", "xml"), 6);
        assert_eq!(ids.next_part_number(&pkg, "ppt/charts", "chart", "xml"), 1);
    }

    #[test]
    fn test_next_local_rel_id() {
        let rels = vec![
            rels::Relationship::new("rId4", "t", "a.xml"),
            rels::Relationship::new("rId2", "t", "b.xml"),
        ];
        assert_eq!(IdAllocator::next_local_rel_id(&rels), "rId5");
        assert_eq!(IdAllocator::next_local_rel_id(&[]), "rId1");
    }
}
