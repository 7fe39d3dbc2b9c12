//! Plain-text extraction from `word/document.xml`.

use crate::container::Package;
use crate::detect::{open_as, FormatType};
use crate::error::{Error, Result};
use quick_xml::events::Event;
use std::path::Path;

const DOCUMENT_PART: &str = "word/document.xml";

/// Extract the body text of a DOCX file.
pub fn extract_text(path: impl AsRef<Path>) -> Result<String> {
    extract_from_package(&open_as(path, FormatType::Docx)?)
}

/// Extract the body text of DOCX bytes.
pub fn extract_text_from_bytes(data: &[u8]) -> Result<String> {
    extract_from_package(&Package::from_bytes(data)?)
}

fn extract_from_package(pkg: &Package) -> Result<String> {
    let xml = pkg
        .get_text(DOCUMENT_PART)
        .ok_or_else(|| Error::MissingComponent(DOCUMENT_PART.to_string()))?;
    document_text(xml)
}

/// Paragraph text of a WordprocessingML body.
///
/// Paragraphs become lines, `w:tab` a tab and `w:br`/`w:cr` a newline.
/// Field instructions (`w:instrText`) and deleted text are skipped.
/// Leading and trailing blank lines are dropped.
pub fn document_text(xml: &str) -> Result<String> {
    let mut reader = quick_xml::Reader::from_str(xml);
    // xml:space="preserve" runs keep their spaces
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_paragraph = false;
    let mut in_text = false;
    let mut deleted_depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"w:p" => {
                    in_paragraph = true;
                    current.clear();
                }
                b"w:t" => in_text = true,
                b"w:del" => deleted_depth += 1,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:tab" if in_paragraph => current.push('\t'),
                b"w:br" | b"w:cr" if in_paragraph => current.push('\n'),
                b"w:p" => lines.push(String::new()),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text && deleted_depth == 0 => {
                current.push_str(&e.unescape().unwrap_or_default());
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:del" => deleted_depth = deleted_depth.saturating_sub(1),
                b"w:p" => {
                    in_paragraph = false;
                    lines.push(std::mem::take(&mut current));
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::XmlParse(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    let text = lines.join("\n");
    Ok(text.trim_matches('\n').to_string())
}
