//! Relationship (`.rels`) parsing, serialization and part-path arithmetic.

use crate::error::{Error, Result};
use quick_xml::escape::escape;
use std::borrow::Cow;

/// Namespace of the `<Relationships>` root element.
pub const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// Base URI shared by the transitional OOXML relationship types.
pub const REL_TYPE_BASE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Relationship type of a slide part.
pub const REL_TYPE_SLIDE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";

/// Relationship type of a slide master part.
pub const REL_TYPE_SLIDE_MASTER: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster";

/// Relationship type of a slide layout part.
pub const REL_TYPE_SLIDE_LAYOUT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout";

/// A relationship entry from a .rels file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// Relationship ID (e.g., "rId1")
    pub id: String,
    /// Relationship type URI
    pub rel_type: String,
    /// Target path (relative or absolute)
    pub target: String,
    /// Whether the target is external
    pub external: bool,
}

impl Relationship {
    /// Create an internal relationship.
    pub fn new(id: impl Into<String>, rel_type: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rel_type: rel_type.into(),
            target: target.into(),
            external: false,
        }
    }

    /// Classify the relationship by the last segment of its type URI.
    pub fn kind(&self) -> RelKind {
        RelKind::of(&self.rel_type)
    }

    /// Render the relationship as a single `<Relationship/>` element.
    pub fn to_xml(&self) -> String {
        let mode = if self.external {
            " TargetMode=\"External\""
        } else {
            ""
        };
        format!(
            "<Relationship Id=\"{}\" Type=\"{}\" Target=\"{}\"{}/>",
            escape(self.id.as_str()),
            escape(self.rel_type.as_str()),
            escape(self.target.as_str()),
            mode
        )
    }
}

/// Relationship categories the cloning logic dispatches on.
///
/// Matching is on the final URI segment so both the transitional and the
/// strict (`purl.oclc.org`) namespaces are recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelKind {
    Slide,
    SlideLayout,
    SlideMaster,
    Theme,
    Image,
    /// Audio, video and generic media
    Media,
    NotesSlide,
    NotesMaster,
    Other,
}

impl RelKind {
    /// Classify a relationship type URI.
    pub fn of(rel_type: &str) -> Self {
        match rel_type.rsplit('/').next().unwrap_or_default() {
            "slide" => RelKind::Slide,
            "slideLayout" => RelKind::SlideLayout,
            "slideMaster" => RelKind::SlideMaster,
            "theme" => RelKind::Theme,
            "image" => RelKind::Image,
            "audio" | "video" | "media" => RelKind::Media,
            "notesSlide" => RelKind::NotesSlide,
            "notesMaster" => RelKind::NotesMaster,
            _ => RelKind::Other,
        }
    }
}

/// Parse the content of a relationships part, keeping document order.
pub fn parse(xml: &str) -> Result<Vec<Relationship>> {
    let mut rels = Vec::new();
    if xml.trim().is_empty() {
        return Ok(rels);
    }

    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Empty(e)) | Ok(quick_xml::events::Event::Start(e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let mut id = String::new();
                let mut rel_type = String::new();
                let mut target = String::new();
                let mut external = false;

                for attr in e.attributes().flatten() {
                    let value = attr
                        .unescape_value()
                        .map(|v| v.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).to_string());
                    match attr.key.as_ref() {
                        b"Id" => id = value,
                        b"Type" => rel_type = value,
                        b"Target" => target = value,
                        b"TargetMode" => external = value.eq_ignore_ascii_case("external"),
                        _ => {}
                    }
                }

                if !id.is_empty() {
                    rels.push(Relationship {
                        id,
                        rel_type,
                        target,
                        external,
                    });
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(Error::XmlParse(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

/// Serialize relationships. An empty list still yields the root element.
pub fn serialize(rels: &[Relationship]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n");
    xml.push_str("<Relationships xmlns=\"");
    xml.push_str(RELATIONSHIPS_NS);
    xml.push_str("\">");
    for rel in rels {
        xml.push_str(&rel.to_xml());
    }
    xml.push_str("</Relationships>");
    xml
}

/// Append one relationship to relationships XML text without reformatting it.
pub fn append_to_xml(xml: &str, rel: &Relationship) -> Result<String> {
    if let Some(pos) = xml.rfind("</Relationships>") {
        let mut out = String::with_capacity(xml.len() + 160);
        out.push_str(&xml[..pos]);
        out.push_str(&rel.to_xml());
        out.push_str(&xml[pos..]);
        return Ok(out);
    }
    // `<Relationships .../>` with no children
    if let Some(start) = xml.find("<Relationships") {
        if let Some(rel_end) = xml[start..].find("/>") {
            let close = start + rel_end;
            let mut out = String::with_capacity(xml.len() + 180);
            out.push_str(&xml[..close]);
            out.push('>');
            out.push_str(&rel.to_xml());
            out.push_str("</Relationships>");
            out.push_str(&xml[close + 2..]);
            return Ok(out);
        }
    }
    Err(Error::XmlParse("relationships part has no <Relationships> root".to_string()))
}

/// Highest numeric suffix among `rIdN` identifiers.
pub fn max_numeric_id(rels: &[Relationship]) -> u32 {
    rels.iter()
        .filter_map(|r| r.id.strip_prefix("rId"))
        .filter_map(|n| n.parse::<u32>().ok())
        .max()
        .unwrap_or(0)
}

/// Path of the relationships part that belongs to `part`.
///
/// `ppt/slides/slide1.xml` maps to `ppt/slides/_rels/slide1.xml.rels`;
/// the package itself (empty name) maps to `_rels/.rels`.
pub fn rels_path_for(part: &str) -> String {
    let part = part.trim_start_matches('/');
    if part.is_empty() {
        return "_rels/.rels".to_string();
    }
    match part.rfind('/') {
        Some(pos) => format!("{}/_rels/{}.rels", &part[..pos], &part[pos + 1..]),
        None => format!("_rels/{}.rels", part),
    }
}

/// Owning part of a relationships part, the inverse of [`rels_path_for`].
pub fn owner_of_rels(rels_path: &str) -> Option<String> {
    let file = rels_path.rsplit('/').next()?;
    let owner_file = file.strip_suffix(".rels")?;
    let dir = rels_path[..rels_path.len() - file.len()].trim_end_matches('/');
    let parent = dir.strip_suffix("_rels")?.trim_end_matches('/');
    if parent.is_empty() {
        Some(owner_file.to_string())
    } else {
        Some(format!("{}/{}", parent, owner_file))
    }
}

/// Directory portion of a part name (empty for root-level parts).
pub fn parent_dir(part: &str) -> &str {
    match part.rfind('/') {
        Some(pos) => &part[..pos],
        None => "",
    }
}

/// Resolve a relationship target against the part that owns it.
///
/// Absolute targets (leading `/`) are package-rooted. `.` and `..`
/// segments are applied POSIX-style; `..` never climbs above the root.
/// Target segments are percent-decoded into plain part names.
pub fn resolve(from_part: &str, target: &str) -> String {
    let target = target.split(['#', '?']).next().unwrap_or_default();
    let mut segments: Vec<Cow<'_, str>> = if target.starts_with('/') {
        Vec::new()
    } else {
        parent_dir(from_part.trim_start_matches('/'))
            .split('/')
            .filter(|s| !s.is_empty())
            .map(Cow::Borrowed)
            .collect()
    };

    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(decode_segment(s)),
        }
    }

    segments.join("/")
}

/// Percent-decode one target segment; malformed escapes stay literal.
fn decode_segment(segment: &str) -> Cow<'_, str> {
    if !segment.contains('%') {
        return Cow::Borrowed(segment);
    }
    urlencoding::decode(segment).unwrap_or(Cow::Borrowed(segment))
}

/// Relative target from `from_part` to `to_part`, always forward-slash and
/// without a leading `./`. Segments are percent-encoded except for
/// unreserved ASCII.
pub fn relativize(from_part: &str, to_part: &str) -> String {
    let from_parts: Vec<&str> = parent_dir(from_part.trim_start_matches('/'))
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    let to_parts: Vec<&str> = to_part
        .trim_start_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    // The file name itself is never part of the shared prefix.
    let common = from_parts
        .iter()
        .zip(to_parts.iter().take(to_parts.len().saturating_sub(1)))
        .take_while(|(a, b)| a == b)
        .count();

    let mut result = String::new();
    for _ in common..from_parts.len() {
        result.push_str("../");
    }
    let tail: Vec<Cow<'_, str>> = to_parts[common..]
        .iter()
        .map(|s| urlencoding::encode(*s))
        .collect();
    result.push_str(&tail.join("/"));
    result
}
