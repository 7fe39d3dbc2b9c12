//! In-memory mutable view of an OOXML package.
//!
//! A [`Package`] holds every part of a ZIP container keyed by its part
//! name (`ppt/slides/slide3.xml`). XML-ish parts are decoded to text on
//! load so callers can apply targeted text edits; everything else stays
//! as raw bytes.

use crate::error::{Error, Result};
use regex::Regex;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;

/// Part name of the package content-type map.
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// Contents of one package part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartData {
    /// Decoded XML text
    Text(String),
    /// Raw bytes (media, embedded objects)
    Binary(Vec<u8>),
}

impl PartData {
    /// Borrow the part as bytes regardless of representation.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            PartData::Text(s) => s.as_bytes(),
            PartData::Binary(b) => b,
        }
    }
}

impl From<String> for PartData {
    fn from(s: String) -> Self {
        PartData::Text(s)
    }
}

impl From<&str> for PartData {
    fn from(s: &str) -> Self {
        PartData::Text(s.to_string())
    }
}

impl From<Vec<u8>> for PartData {
    fn from(b: Vec<u8>) -> Self {
        PartData::Binary(b)
    }
}

/// Whether a part name is stored as text.
fn is_text_part(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".xml") || lower.ends_with(".rels") || lower.ends_with(".vml")
}

/// Fix XML encoding declaration from UTF-16 to UTF-8.
///
/// Once UTF-16 XML has been decoded into a Rust string the declaration
/// would lie about the encoding; writing it back as UTF-8 needs it fixed.
fn fix_xml_encoding_declaration(content: &str) -> String {
    if content.starts_with("<?xml") {
        if let Some(end_decl) = content.find("?>") {
            let decl = &content[..end_decl + 2];
            let rest = &content[end_decl + 2..];

            let fixed_decl = decl
                .replace("encoding=\"UTF-16\"", "encoding=\"UTF-8\"")
                .replace("encoding='UTF-16'", "encoding='UTF-8'")
                .replace("encoding=\"utf-16\"", "encoding=\"UTF-8\"")
                .replace("encoding='utf-16'", "encoding='UTF-8'");

            return format!("{}{}", fixed_decl, rest);
        }
    }
    content.to_string()
}

/// Decode XML bytes handling different encodings (UTF-8, UTF-16 LE/BE).
///
/// OOXML parts are normally UTF-8, but some producers write UTF-16 with a
/// byte order mark.
pub fn decode_xml_bytes(bytes: &[u8]) -> Result<String> {
    if bytes.len() >= 3 && bytes[0] == 0xEF && bytes[1] == 0xBB && bytes[2] == 0xBF {
        return String::from_utf8(bytes[3..].to_vec())
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)));
    }

    if bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] == 0xFE {
        let content = decode_utf16(&bytes[2..], u16::from_le_bytes)?;
        return Ok(fix_xml_encoding_declaration(&content));
    }

    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let content = decode_utf16(&bytes[2..], u16::from_be_bytes)?;
        return Ok(fix_xml_encoding_declaration(&content));
    }

    match String::from_utf8(bytes.to_vec()) {
        Ok(s) => Ok(s),
        Err(_) => Ok(String::from_utf8_lossy(bytes).into_owned()),
    }
}

fn decode_utf16(bytes: &[u8], to_unit: fn([u8; 2]) -> u16) -> Result<String> {
    let len = bytes.len() & !1;
    let units = (0..len)
        .step_by(2)
        .map(|i| to_unit([bytes[i], bytes[i + 1]]));

    char::decode_utf16(units)
        .collect::<std::result::Result<String, _>>()
        .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

/// Mutable OOXML package.
///
/// `put` overwrites silently; later writes win. Part order is kept so a
/// package that is opened and serialized again keeps its original entry
/// order, with new parts appended.
#[derive(Clone, Default)]
pub struct Package {
    parts: HashMap<String, PartData>,
    order: Vec<String>,
}

impl Package {
    /// Create an empty package.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a package from a file path.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use reportdeck::container::Package;
    ///
    /// let pkg = Package::open("template.pptx")?;
    /// assert!(pkg.contains("ppt/presentation.xml"));
    /// # Ok::<(), reportdeck::Error>(())
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mut reader = BufReader::new(file);
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes(&data)
    }

    /// Load a package from ZIP bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut archive = zip::ZipArchive::new(Cursor::new(data))?;
        let mut pkg = Self::new();

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().trim_start_matches('/').to_string();
            let mut bytes = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut bytes)?;

            let data = if is_text_part(&name) {
                PartData::Text(decode_xml_bytes(&bytes)?)
            } else {
                PartData::Binary(bytes)
            };
            pkg.put(&name, data);
        }

        Ok(pkg)
    }

    /// Read a part as text. Binary parts are returned when they are valid UTF-8.
    pub fn get_text(&self, path: &str) -> Option<&str> {
        match self.parts.get(path)? {
            PartData::Text(s) => Some(s.as_str()),
            PartData::Binary(b) => std::str::from_utf8(b).ok(),
        }
    }

    /// Read a part as bytes.
    pub fn get_binary(&self, path: &str) -> Option<&[u8]> {
        self.parts.get(path).map(PartData::as_bytes)
    }

    /// Borrow the raw part data.
    pub fn get(&self, path: &str) -> Option<&PartData> {
        self.parts.get(path)
    }

    /// Write a part, replacing any existing content.
    pub fn put(&mut self, path: &str, data: impl Into<PartData>) {
        let path = path.trim_start_matches('/');
        if self.parts.insert(path.to_string(), data.into()).is_none() {
            self.order.push(path.to_string());
        }
    }

    /// Remove a part, returning its content when it existed.
    pub fn remove(&mut self, path: &str) -> Option<PartData> {
        let removed = self.parts.remove(path)?;
        self.order.retain(|p| p != path);
        Some(removed)
    }

    /// Check if a part exists.
    pub fn contains(&self, path: &str) -> bool {
        self.parts.contains_key(path)
    }

    /// Number of parts.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Whether the package has no parts.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Part names in package order.
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Part names matching a pattern, in package order.
    pub fn list_matching(&self, pattern: &Regex) -> Vec<String> {
        self.part_names()
            .filter(|n| pattern.is_match(n))
            .map(String::from)
            .collect()
    }

    /// Part names starting with a prefix, in package order.
    pub fn list_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.part_names()
            .filter(|n| n.starts_with(prefix))
            .map(String::from)
            .collect()
    }

    /// Serialize the package to ZIP bytes.
    ///
    /// Entries use Deflate and a fixed 1980-01-01 timestamp so identical
    /// packages serialize to identical bytes. `[Content_Types].xml` is
    /// always the first entry.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default());

        let names = std::iter::once(CONTENT_TYPES_PART)
            .filter(|n| self.contains(n))
            .chain(self.part_names().filter(|n| *n != CONTENT_TYPES_PART));

        for name in names {
            if let Some(data) = self.parts.get(name) {
                zip.start_file(name, options)?;
                zip.write_all(data.as_bytes())?;
            }
        }

        let cursor = zip.finish()?;
        Ok(cursor.into_inner())
    }

    /// Serialize the package and write it to disk.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.serialize()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

impl std::fmt::Debug for Package {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Package")
            .field("parts", &self.parts.len())
            .finish()
    }
}
