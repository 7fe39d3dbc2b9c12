//! Working copy of `[Content_Types].xml`.
//!
//! Entries are inserted textually before `</Types>`; existing content is
//! never reformatted.

use crate::container::{Package, CONTENT_TYPES_PART};
use crate::error::{Error, Result};
use crate::xmltext::{self, start_tags};
use quick_xml::escape::escape;

/// Content type of a slide part.
pub const CT_SLIDE: &str = "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";
/// Content type of a slide layout part.
pub const CT_SLIDE_LAYOUT: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml";
/// Content type of a slide master part.
pub const CT_SLIDE_MASTER: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml";
/// Content type of a theme part.
pub const CT_THEME: &str = "application/vnd.openxmlformats-officedocument.theme+xml";
/// Content type of a notes slide part.
pub const CT_NOTES_SLIDE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.notesSlide+xml";

/// Determine MIME type from a file extension.
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let mime = match ext.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" | "jpe" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tiff" | "tif" => "image/tiff",
        "svg" => "image/svg+xml",
        "wmf" => "image/x-wmf",
        "emf" => "image/x-emf",
        "wdp" => "image/vnd.ms-photo",
        "webp" => "image/webp",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" => "audio/mp4",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "wmv" => "video/x-ms-wmv",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "bin" => "application/vnd.openxmlformats-officedocument.oleObject",
        _ => return None,
    };
    Some(mime)
}

/// Get extension from MIME type.
pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    match mime.to_ascii_lowercase().as_str() {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpeg"),
        "image/gif" => Some("gif"),
        "image/bmp" => Some("bmp"),
        "image/tiff" => Some("tiff"),
        "image/svg+xml" => Some("svg"),
        "image/x-wmf" => Some("wmf"),
        "image/x-emf" => Some("emf"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Editable `[Content_Types].xml` text.
#[derive(Debug, Clone)]
pub struct ContentTypes {
    xml: String,
}

impl ContentTypes {
    /// Wrap content-types XML text. The `</Types>` close tag is required.
    pub fn from_xml(xml: impl Into<String>) -> Result<Self> {
        let xml = xml.into();
        if !xml.contains("</Types>") {
            return Err(Error::InvalidData(
                "[Content_Types].xml has no </Types> close tag".to_string(),
            ));
        }
        Ok(Self { xml })
    }

    /// Read the content types of a package.
    pub fn from_package(pkg: &Package) -> Result<Self> {
        let xml = pkg
            .get_text(CONTENT_TYPES_PART)
            .ok_or_else(|| Error::MissingComponent(CONTENT_TYPES_PART.to_string()))?;
        Self::from_xml(xml)
    }

    /// Current XML text.
    pub fn as_str(&self) -> &str {
        &self.xml
    }

    /// Consume into XML text.
    pub fn into_string(self) -> String {
        self.xml
    }

    /// Content type registered as `<Default>` for an extension.
    pub fn default_for(&self, ext: &str) -> Option<&str> {
        start_tags(&self.xml, "Default")
            .into_iter()
            .find(|t| {
                t.attr("Extension")
                    .is_some_and(|e| e.eq_ignore_ascii_case(ext))
            })
            .and_then(|t| t.attr("ContentType"))
    }

    /// Whether a `<Default>` exists for an extension (case-insensitive).
    pub fn has_default(&self, ext: &str) -> bool {
        self.default_for(ext).is_some()
    }

    /// Content type registered as `<Override>` for a part.
    pub fn override_for(&self, part: &str) -> Option<&str> {
        let wanted = part_name(part);
        start_tags(&self.xml, "Override")
            .into_iter()
            .find(|t| {
                t.attr("PartName")
                    .is_some_and(|p| p.eq_ignore_ascii_case(&wanted))
            })
            .and_then(|t| t.attr("ContentType"))
    }

    /// Whether an `<Override>` exists for a part (case-insensitive).
    pub fn has_override(&self, part: &str) -> bool {
        self.override_for(part).is_some()
    }

    /// Number of `<Override>` entries for a part.
    pub fn override_count(&self, part: &str) -> usize {
        let wanted = part_name(part);
        start_tags(&self.xml, "Override")
            .into_iter()
            .filter(|t| {
                t.attr("PartName")
                    .is_some_and(|p| p.eq_ignore_ascii_case(&wanted))
            })
            .count()
    }

    /// Content type a part resolves to (override first, then default).
    pub fn content_type_of(&self, part: &str) -> Option<&str> {
        self.override_for(part).or_else(|| {
            let ext = part.rsplit_once('.').map(|(_, e)| e)?;
            self.default_for(ext)
        })
    }

    /// Register a `<Default>` for an extension unless one exists.
    /// Returns `true` when an entry was added.
    pub fn ensure_default(&mut self, ext: &str, content_type: &str) -> bool {
        if self.has_default(ext) {
            return false;
        }
        let entry = format!(
            "<Default Extension=\"{}\" ContentType=\"{}\"/>",
            escape(ext.to_ascii_lowercase().as_str()),
            escape(content_type)
        );
        self.insert_before_close(&entry);
        true
    }

    /// Register an `<Override>` for a part unless one exists.
    /// Returns `true` when an entry was added.
    pub fn ensure_override(&mut self, part: &str, content_type: &str) -> bool {
        if self.has_override(part) {
            return false;
        }
        let entry = format!(
            "<Override PartName=\"{}\" ContentType=\"{}\"/>",
            escape(part_name(part).as_str()),
            escape(content_type)
        );
        self.insert_before_close(&entry);
        true
    }

    /// Remove every `<Override>` for a part. Returns the number removed.
    pub fn remove_override(&mut self, part: &str) -> usize {
        let wanted = part_name(part);
        let spans: Vec<(usize, usize)> = start_tags(&self.xml, "Override")
            .into_iter()
            .filter(|t| {
                t.attr("PartName")
                    .is_some_and(|p| p.eq_ignore_ascii_case(&wanted))
            })
            .map(|t| (t.start, t.end))
            .collect();

        for (start, end) in spans.iter().rev() {
            self.xml = xmltext::splice(&self.xml, *start, *end, "");
        }
        spans.len()
    }

    /// Write the working copy back into a package.
    pub fn write_to(&self, pkg: &mut Package) {
        pkg.put(CONTENT_TYPES_PART, self.xml.clone());
    }

    fn insert_before_close(&mut self, entry: &str) {
        if let Some(pos) = self.xml.rfind("</Types>") {
            self.xml.insert_str(pos, entry);
        }
    }
}

/// Part name in content-types form (leading slash).
fn part_name(part: &str) -> String {
    format!("/{}", part.trim_start_matches('/'))
}
