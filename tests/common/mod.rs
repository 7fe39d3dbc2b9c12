//! Synthetic Office packages for integration tests.
//!
//! Everything is written with `zip::ZipWriter` so the tests exercise the
//! same reading path real files take.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;
const REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_TYPE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PML: &str = "application/vnd.openxmlformats-officedocument.presentationml";

/// Zip the given parts in order.
pub fn zip_parts(parts: &[(String, Vec<u8>)]) -> Vec<u8> {
    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        for (name, data) in parts {
            zip.start_file(name.as_str(), options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }
    buffer
}

fn rels(entries: &[(&str, &str, &str)]) -> Vec<u8> {
    let mut xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{}">"#,
        REL_NS
    );
    for (id, kind, target) in entries {
        xml.push_str(&format!(
            r#"<Relationship Id="{}" Type="{}/{}" Target="{}"/>"#,
            id, REL_TYPE, kind, target
        ));
    }
    xml.push_str("</Relationships>");
    xml.into_bytes()
}

fn content_types(defaults: &[(&str, &str)], overrides: &[(String, String)]) -> Vec<u8> {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/>"#,
    );
    for (ext, ct) in defaults {
        xml.push_str(&format!(r#"<Default Extension="{}" ContentType="{}"/>"#, ext, ct));
    }
    for (part, ct) in overrides {
        xml.push_str(&format!(r#"<Override PartName="/{}" ContentType="{}"/>"#, part, ct));
    }
    xml.push_str("</Types>");
    xml.into_bytes()
}

fn text_shape(id: u32, text: &str) -> String {
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="Text {id}"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:p><a:r><a:rPr lang="zh-CN"/><a:t>{text}</a:t></a:r></a:p></p:txBody></p:sp>"#
    )
}

fn picture(id: u32, rel_id: &str) -> String {
    format!(
        r#"<p:pic><p:nvPicPr><p:cNvPr id="{id}" name="Picture {id}"/><p:cNvPicPr/><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="{rel_id}"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr><a:xfrm><a:off x="914400" y="914400"/><a:ext cx="5486400" cy="3657600"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#
    )
}

fn slide(shapes: &str) -> Vec<u8> {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sld {NS}><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{shapes}</p:spTree></p:cSld></p:sld>"#
    )
    .into_bytes()
}

/// Encoded PNG of the given size.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageOutputFormat::Png).unwrap();
    buf.into_inner()
}

/// Layout, master and theme parts, with their overrides.
fn design_parts(theme_name: &str, parts: &mut Vec<(String, Vec<u8>)>, overrides: &mut Vec<(String, String)>) {
    parts.push((
        "ppt/slideLayouts/slideLayout1.xml".into(),
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sldLayout {NS}><p:cSld name="{theme_name} Layout"><p:spTree/></p:cSld></p:sldLayout>"#
        )
        .into_bytes(),
    ));
    parts.push((
        "ppt/slideLayouts/_rels/slideLayout1.xml.rels".into(),
        rels(&[("rId1", "slideMaster", "../slideMasters/slideMaster1.xml")]),
    ));
    parts.push((
        "ppt/slideMasters/slideMaster1.xml".into(),
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sldMaster {NS}><p:cSld><p:spTree/></p:cSld><p:clrMap bg1="lt1" tx1="dk1"/><p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst></p:sldMaster>"#
        )
        .into_bytes(),
    ));
    parts.push((
        "ppt/slideMasters/_rels/slideMaster1.xml.rels".into(),
        rels(&[
            ("rId1", "slideLayout", "../slideLayouts/slideLayout1.xml"),
            ("rId2", "theme", "../theme/theme1.xml"),
        ]),
    ));
    parts.push((
        "ppt/theme/theme1.xml".into(),
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="{theme_name}"><a:themeElements/></a:theme>"#
        )
        .into_bytes(),
    ));
    overrides.push(("ppt/slideLayouts/slideLayout1.xml".into(), format!("{}.slideLayout+xml", PML)));
    overrides.push(("ppt/slideMasters/slideMaster1.xml".into(), format!("{}.slideMaster+xml", PML)));
    overrides.push((
        "ppt/theme/theme1.xml".into(),
        "application/vnd.openxmlformats-officedocument.theme+xml".into(),
    ));
}

fn presentation(
    slides: Vec<Vec<u8>>,
    slide_rels: Vec<Vec<(&str, &str, &str)>>,
    theme_name: &str,
    media: &[(&str, Vec<u8>)],
) -> Vec<u8> {
    let mut parts = Vec::new();
    let mut overrides = vec![(
        "ppt/presentation.xml".to_string(),
        format!("{}.presentation.main+xml", PML),
    )];
    let mut pres_rels = vec![("rId1".to_string(), "slideMaster", "slideMasters/slideMaster1.xml".to_string())];
    let mut ids = String::new();

    for (i, (xml, slide_rel)) in slides.into_iter().zip(slide_rels).enumerate() {
        let n = i + 1;
        let part = format!("ppt/slides/slide{}.xml", n);
        parts.push((part.clone(), xml));
        parts.push((format!("ppt/slides/_rels/slide{}.xml.rels", n), rels(&slide_rel)));
        overrides.push((part, format!("{}.slide+xml", PML)));
        let rid = format!("rId{}", n + 1);
        ids.push_str(&format!(r#"<p:sldId id="{}" r:id="{}"/>"#, 255 + n, rid));
        pres_rels.push((rid, "slide", format!("slides/slide{}.xml", n)));
    }
    let theme_rid = format!("rId{}", pres_rels.len() + 1);
    pres_rels.push((theme_rid, "theme", "theme/theme1.xml".to_string()));

    design_parts(theme_name, &mut parts, &mut overrides);
    for (name, data) in media {
        parts.push((format!("ppt/media/{}", name), data.clone()));
    }

    let pres_rels: Vec<(&str, &str, &str)> = pres_rels
        .iter()
        .map(|(id, kind, target)| (id.as_str(), *kind, target.as_str()))
        .collect();
    parts.push(("ppt/_rels/presentation.xml.rels".into(), rels(&pres_rels)));
    parts.push((
        "ppt/presentation.xml".into(),
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:presentation {NS}><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst><p:sldIdLst>{ids}</p:sldIdLst><p:sldSz cx="12192000" cy="6858000"/><p:notesSz cx="6858000" cy="9144000"/></p:presentation>"#
        )
        .into_bytes(),
    ));
    parts.push(("_rels/.rels".into(), rels(&[("rId1", "officeDocument", "ppt/presentation.xml")])));
    parts.insert(
        0,
        (
            "[Content_Types].xml".into(),
            content_types(&[("png", "image/png")], &overrides),
        ),
    );
    zip_parts(&parts)
}

/// Report template: 1 cover, 2 lab, 3 body composition, 4 ECG,
/// 5 imaging, 6 AI summary, 7 closing.
pub fn template_pptx() -> Vec<u8> {
    let cover = [
        text_shape(2, "{{姓名}}"),
        text_shape(3, "[性别]"),
        text_shape(4, "{{ 年龄 }}"),
        text_shape(5, "体检日期：{{日期}}"),
        text_shape(6, "{{证件号}}"),
    ]
    .concat();
    let image_slide = |title: &str| {
        slide(&[text_shape(2, title), text_shape(3, "{{图片}}"), picture(4, "rId2")].concat())
    };
    let slides = vec![
        slide(&cover),
        image_slide("检验报告"),
        image_slide("人体成分"),
        image_slide("心电图"),
        image_slide("影像检查"),
        slide(&[text_shape(2, "AI 解读"), text_shape(3, "{{总结}}")].concat()),
        slide(&text_shape(2, "祝您健康")),
    ];
    let layout = ("rId1", "slideLayout", "../slideLayouts/slideLayout1.xml");
    let placeholder_image = ("rId2", "image", "../media/image1.png");
    let slide_rels = (1..=7)
        .map(|n| {
            if (2..=5).contains(&n) {
                vec![layout, placeholder_image]
            } else {
                vec![layout]
            }
        })
        .collect();
    presentation(slides, slide_rels, "Report", &[("image1.png", png(8, 8))])
}

/// Deck with `count` existing slides on its own master and theme.
pub fn base_pptx(count: usize) -> Vec<u8> {
    let slides = (1..=count)
        .map(|n| slide(&text_shape(2, &format!("体检须知 {}", n))))
        .collect();
    let slide_rels = (0..count)
        .map(|_| vec![("rId1", "slideLayout", "../slideLayouts/slideLayout1.xml")])
        .collect();
    presentation(slides, slide_rels, "Base", &[])
}

/// Single-sheet workbook of inline-string cells.
pub fn roster_xlsx(rows: &[&[&str]]) -> Vec<u8> {
    let mut sheet = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    for (r, row) in rows.iter().enumerate() {
        sheet.push_str(&format!(r#"<row r="{}">"#, r + 1));
        for (c, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            let col = (b'A' + c as u8) as char;
            sheet.push_str(&format!(
                r#"<c r="{}{}" t="inlineStr"><is><t>{}</t></is></c>"#,
                col,
                r + 1,
                value
            ));
        }
        sheet.push_str("</row>");
    }
    sheet.push_str("</sheetData></worksheet>");

    let parts = vec![
        (
            "[Content_Types].xml".to_string(),
            content_types(
                &[],
                &[
                    (
                        "xl/workbook.xml".to_string(),
                        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"
                            .to_string(),
                    ),
                    (
                        "xl/worksheets/sheet1.xml".to_string(),
                        "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"
                            .to_string(),
                    ),
                ],
            ),
        ),
        ("_rels/.rels".to_string(), rels(&[("rId1", "officeDocument", "xl/workbook.xml")])),
        (
            "xl/workbook.xml".to_string(),
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="员工" sheetId="1" r:id="rId1"/></sheets></workbook>"#
                .as_bytes().to_vec(),
        ),
        (
            "xl/_rels/workbook.xml.rels".to_string(),
            rels(&[("rId1", "worksheet", "worksheets/sheet1.xml")]),
        ),
        ("xl/worksheets/sheet1.xml".to_string(), sheet.into_bytes()),
    ];
    zip_parts(&parts)
}

/// Word document with one paragraph per entry.
pub fn summary_docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>", p))
        .collect();
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    );
    let parts = vec![
        (
            "[Content_Types].xml".to_string(),
            content_types(
                &[],
                &[(
                    "word/document.xml".to_string(),
                    "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"
                        .to_string(),
                )],
            ),
        ),
        ("_rels/.rels".to_string(), rels(&[("rId1", "officeDocument", "word/document.xml")])),
        ("word/document.xml".to_string(), document.into_bytes()),
    ];
    zip_parts(&parts)
}
