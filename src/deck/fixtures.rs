//! Synthetic template and output decks for unit tests.

use crate::container::{Package, CONTENT_TYPES_PART};
use crate::content_types::{CT_NOTES_SLIDE, CT_SLIDE, CT_SLIDE_LAYOUT, CT_SLIDE_MASTER, CT_THEME};
use crate::rels::{self, Relationship, REL_TYPE_BASE};
use std::io::Cursor;

pub const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;

const CT_PRESENTATION: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml";
const CT_NOTES_MASTER: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.notesMaster+xml";
const SECTION_EXT_URI: &str = "{521415D9-36F7-43E2-AB2F-B90AF26B5E84}";

fn rel(id: &str, kind: &str, target: &str) -> Relationship {
    Relationship::new(id, format!("{}/{}", REL_TYPE_BASE, kind), target)
}

pub fn text_shape(id: u32, text: &str) -> String {
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="Text {id}"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:p><a:r><a:rPr lang="zh-CN"/><a:t>{text}</a:t></a:r></a:p></p:txBody></p:sp>"#
    )
}

pub fn picture(id: u32, rel_id: &str) -> String {
    format!(
        r#"<p:pic><p:nvPicPr><p:cNvPr id="{id}" name="Picture {id}"/><p:cNvPicPr/><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="{rel_id}"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr><a:xfrm><a:off x="1000000" y="1000000"/><a:ext cx="4000000" cy="4000000"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#
    )
}

pub fn slide_xml(shapes: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sld {NS}><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{shapes}</p:spTree></p:cSld></p:sld>"#
    )
}

fn layout_xml(name: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sldLayout {NS}><p:cSld name="{name}"><p:spTree/></p:cSld></p:sldLayout>"#
    )
}

fn master_xml(layouts: &[(u32, &str)]) -> String {
    let entries: String = layouts
        .iter()
        .map(|(id, rid)| format!(r#"<p:sldLayoutId id="{}" r:id="{}"/>"#, id, rid))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sldMaster {NS}><p:cSld><p:spTree/></p:cSld><p:clrMap bg1="lt1" tx1="dk1"/><p:sldLayoutIdLst>{entries}</p:sldLayoutIdLst></p:sldMaster>"#
    )
}

fn theme_xml(name: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="{name}"><a:themeElements/></a:theme>"#
    )
}

fn content_types(overrides: &[(String, &str)]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/>"#,
    );
    for (part, ct) in overrides {
        xml.push_str(&format!(r#"<Override PartName="/{}" ContentType="{}"/>"#, part, ct));
    }
    xml.push_str("</Types>");
    xml
}

fn presentation_xml(slide_ids: &[(u32, String)], notes_master: Option<&str>, tail: &str) -> String {
    let ids: String = slide_ids
        .iter()
        .map(|(id, rid)| format!(r#"<p:sldId id="{}" r:id="{}"/>"#, id, rid))
        .collect();
    let notes = notes_master
        .map(|rid| format!(r#"<p:notesMasterIdLst><p:notesMasterId r:id="{}"/></p:notesMasterIdLst>"#, rid))
        .unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:presentation {NS}><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst>{notes}<p:sldIdLst>{ids}</p:sldIdLst><p:sldSz cx="12192000" cy="6858000"/><p:notesSz cx="6858000" cy="9144000"/>{tail}</p:presentation>"#
    )
}

/// `p14:sectionLst` extension listing the given slide IDs per section.
pub fn section_list(sections: &[&[u32]]) -> String {
    let body: String = sections
        .iter()
        .enumerate()
        .map(|(i, ids)| {
            let entries: String = ids
                .iter()
                .map(|id| format!(r#"<p14:sldId id="{}"/>"#, id))
                .collect();
            format!(
                r#"<p14:section name="Section {n}" id="{{00000000-0000-0000-0000-00000000000{n}}}"><p14:sldIdLst>{entries}</p14:sldIdLst></p14:section>"#,
                n = i + 1
            )
        })
        .collect();
    format!(
        r#"<p:extLst><p:ext uri="{SECTION_EXT_URI}"><p14:sectionLst xmlns:p14="http://schemas.microsoft.com/office/powerpoint/2010/main">{body}</p14:sectionLst></p:ext></p:extLst>"#
    )
}

fn package_rels() -> String {
    rels::serialize(&[rel("rId1", "officeDocument", "ppt/presentation.xml")])
}

/// Encoded PNG of the given size.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageOutputFormat::Png).unwrap();
    buf.into_inner()
}

/// Template numbered like the report template: 1 cover, 2 lab, 3 body
/// composition, 4 ECG, 5 imaging, 6 AI summary, 7 closing.
///
/// Slide 2 carries a notes slide; slide 7 links back to slide 1.
pub fn template() -> Package {
    let mut pkg = Package::new();
    let mut overrides = vec![("ppt/presentation.xml".to_string(), CT_PRESENTATION)];

    let cover = slide_xml(&[
        text_shape(2, "{{ 姓名 }}&#160;"),
        text_shape(3, "[性别]"),
        text_shape(4, "年龄"),
        text_shape(5, "体检日期：{{日期}}"),
        text_shape(6, "{{证件号}}"),
    ]
    .concat());
    let image_slide = |title: &str| {
        slide_xml(&[text_shape(2, title), text_shape(3, "{{图片}}"), picture(4, "rId2")].concat())
    };
    let slides = [
        (1, cover),
        (2, image_slide("检验报告")),
        (3, image_slide("人体成分")),
        (4, image_slide("心电图")),
        (5, image_slide("影像检查")),
        (6, slide_xml(&[text_shape(2, "AI 解读"), text_shape(3, "{{总结}}")].concat())),
        (7, slide_xml(&[text_shape(2, "健康指导"), picture(3, "rId2")].concat())),
    ];

    let mut ids = Vec::new();
    let mut pres_rels = vec![rel("rId1", "slideMaster", "slideMasters/slideMaster1.xml")];
    for (n, xml) in slides {
        let part = format!("ppt/slides/slide{}.xml", n);
        pkg.put(&part, xml);
        let layout = if (2..=5).contains(&n) { 2 } else { 1 };
        let mut slide_rels = vec![rel(
            "rId1",
            "slideLayout",
            &format!("../slideLayouts/slideLayout{}.xml", layout),
        )];
        if n != 1 && n != 6 {
            slide_rels.push(rel("rId2", "image", "../media/image1.png"));
        }
        if n == 2 {
            slide_rels.push(rel("rId3", "notesSlide", "../notesSlides/notesSlide1.xml"));
        }
        if n == 7 {
            slide_rels.push(rel("rId4", "slide", "slide1.xml"));
            let mut link = rel("rId5", "hyperlink", "https://example.com/guide");
            link.external = true;
            slide_rels.push(link);
        }
        pkg.put(&rels::rels_path_for(&part), rels::serialize(&slide_rels));
        overrides.push((part, CT_SLIDE));

        let rid = format!("rId{}", n + 1);
        ids.push((255 + n, rid.clone()));
        pres_rels.push(rel(&rid, "slide", &format!("slides/slide{}.xml", n)));
    }
    pres_rels.push(rel("rId9", "notesMaster", "notesMasters/notesMaster1.xml"));
    pres_rels.push(rel("rId10", "theme", "theme/theme1.xml"));

    pkg.put(
        "ppt/notesSlides/notesSlide1.xml",
        format!(r#"<p:notes {NS}><p:cSld><p:spTree/></p:cSld></p:notes>"#),
    );
    pkg.put(
        "ppt/notesSlides/_rels/notesSlide1.xml.rels",
        rels::serialize(&[
            rel("rId1", "notesMaster", "../notesMasters/notesMaster1.xml"),
            rel("rId2", "slide", "../slides/slide2.xml"),
        ]),
    );
    overrides.push(("ppt/notesSlides/notesSlide1.xml".to_string(), CT_NOTES_SLIDE));
    add_notes_master_parts(&mut pkg, &mut overrides, 2);

    for (n, name) in [(1, "Title"), (2, "Picture")] {
        let part = format!("ppt/slideLayouts/slideLayout{}.xml", n);
        pkg.put(&part, layout_xml(name));
        pkg.put(
            &rels::rels_path_for(&part),
            rels::serialize(&[rel("rId1", "slideMaster", "../slideMasters/slideMaster1.xml")]),
        );
        overrides.push((part, CT_SLIDE_LAYOUT));
    }
    pkg.put(
        "ppt/slideMasters/slideMaster1.xml",
        master_xml(&[(2147483649, "rId1"), (2147483650, "rId2")]),
    );
    pkg.put(
        "ppt/slideMasters/_rels/slideMaster1.xml.rels",
        rels::serialize(&[
            rel("rId1", "slideLayout", "../slideLayouts/slideLayout1.xml"),
            rel("rId2", "slideLayout", "../slideLayouts/slideLayout2.xml"),
            rel("rId3", "theme", "../theme/theme1.xml"),
        ]),
    );
    overrides.push(("ppt/slideMasters/slideMaster1.xml".to_string(), CT_SLIDE_MASTER));
    pkg.put("ppt/theme/theme1.xml", theme_xml("Report"));
    overrides.push(("ppt/theme/theme1.xml".to_string(), CT_THEME));
    pkg.put("ppt/media/image1.png", png(4, 4));

    pkg.put(
        "ppt/presentation.xml",
        presentation_xml(&ids, Some("rId9"), &section_list(&[&[256, 257, 258, 259, 260, 261, 262]])),
    );
    pkg.put("ppt/_rels/presentation.xml.rels", rels::serialize(&pres_rels));
    pkg.put("_rels/.rels", package_rels());
    pkg.put(CONTENT_TYPES_PART, content_types(&overrides));
    pkg
}

fn add_notes_master_parts(pkg: &mut Package, overrides: &mut Vec<(String, &'static str)>, theme: u32) {
    let theme_part = format!("ppt/theme/theme{}.xml", theme);
    pkg.put(
        "ppt/notesMasters/notesMaster1.xml",
        format!(r#"<p:notesMaster {NS}><p:cSld><p:spTree/></p:cSld></p:notesMaster>"#),
    );
    pkg.put(
        "ppt/notesMasters/_rels/notesMaster1.xml.rels",
        rels::serialize(&[rel("rId1", "theme", &format!("../theme/theme{}.xml", theme))]),
    );
    pkg.put(&theme_part, theme_xml("Notes"));
    overrides.push(("ppt/notesMasters/notesMaster1.xml".to_string(), CT_NOTES_MASTER));
    overrides.push((theme_part, CT_THEME));
}

/// Output deck holding one slide per given slide ID, all on layout 1 of
/// master 1 with theme 1.
pub fn base_deck(slide_ids: &[u32]) -> Package {
    build_base(slide_ids, "", false)
}

/// Base deck whose presentation carries the given sections.
pub fn base_deck_with_sections(slide_ids: &[u32], sections: &[&[u32]]) -> Package {
    build_base(slide_ids, &section_list(sections), false)
}

/// Base deck that has a notes master.
pub fn base_deck_with_notes(slide_ids: &[u32]) -> Package {
    build_base(slide_ids, "", true)
}

fn build_base(slide_ids: &[u32], tail: &str, notes: bool) -> Package {
    let mut pkg = Package::new();
    let mut overrides = vec![("ppt/presentation.xml".to_string(), CT_PRESENTATION)];
    let mut pres_rels = vec![rel("rId1", "slideMaster", "slideMasters/slideMaster1.xml")];
    let mut ids = Vec::new();

    for (i, id) in slide_ids.iter().enumerate() {
        let part = format!("ppt/slides/slide{}.xml", i + 1);
        pkg.put(&part, slide_xml(&text_shape(2, &format!("existing {}", id))));
        pkg.put(
            &rels::rels_path_for(&part),
            rels::serialize(&[rel("rId1", "slideLayout", "../slideLayouts/slideLayout1.xml")]),
        );
        overrides.push((part, CT_SLIDE));
        let rid = format!("rId{}", i + 2);
        pres_rels.push(rel(&rid, "slide", &format!("slides/slide{}.xml", i + 1)));
        ids.push((*id, rid));
    }
    let next = slide_ids.len() + 2;
    pres_rels.push(rel(&format!("rId{}", next), "theme", "theme/theme1.xml"));
    let notes_rid = format!("rId{}", next + 1);
    if notes {
        pres_rels.push(rel(&notes_rid, "notesMaster", "notesMasters/notesMaster1.xml"));
        add_notes_master_parts(&mut pkg, &mut overrides, 1);
    }

    pkg.put("ppt/slideLayouts/slideLayout1.xml", layout_xml("Base"));
    pkg.put(
        "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
        rels::serialize(&[rel("rId1", "slideMaster", "../slideMasters/slideMaster1.xml")]),
    );
    overrides.push(("ppt/slideLayouts/slideLayout1.xml".to_string(), CT_SLIDE_LAYOUT));
    pkg.put("ppt/slideMasters/slideMaster1.xml", master_xml(&[(2147483649, "rId1")]));
    pkg.put(
        "ppt/slideMasters/_rels/slideMaster1.xml.rels",
        rels::serialize(&[
            rel("rId1", "slideLayout", "../slideLayouts/slideLayout1.xml"),
            rel("rId2", "theme", "../theme/theme1.xml"),
        ]),
    );
    overrides.push(("ppt/slideMasters/slideMaster1.xml".to_string(), CT_SLIDE_MASTER));
    if !pkg.contains("ppt/theme/theme1.xml") {
        pkg.put("ppt/theme/theme1.xml", theme_xml("Base"));
        overrides.push(("ppt/theme/theme1.xml".to_string(), CT_THEME));
    }

    let notes_ref = notes.then_some(notes_rid.as_str());
    pkg.put("ppt/presentation.xml", presentation_xml(&ids, notes_ref, tail));
    pkg.put("ppt/_rels/presentation.xml.rels", rels::serialize(&pres_rels));
    pkg.put("_rels/.rels", package_rels());
    pkg.put(CONTENT_TYPES_PART, content_types(&overrides));
    pkg
}
