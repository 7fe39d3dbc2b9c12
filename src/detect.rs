//! Format detection for the Office packages the workflow reads.

use crate::container::{Package, CONTENT_TYPES_PART};
use crate::error::{Error, Result};
use std::path::Path;

/// ZIP file magic bytes: PK\x03\x04
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// Main-part content types, with the macro-enabled and template variants.
const DOCX_CONTENT_TYPES: [&str; 3] = [
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.template.main+xml",
    "application/vnd.ms-word.document.macroEnabled.main+xml",
];
const XLSX_CONTENT_TYPES: [&str; 3] = [
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.template.main+xml",
    "application/vnd.ms-excel.sheet.macroEnabled.main+xml",
];
const PPTX_CONTENT_TYPES: [&str; 3] = [
    "application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml",
    "application/vnd.openxmlformats-officedocument.presentationml.template.main+xml",
    "application/vnd.ms-powerpoint.presentation.macroEnabled.main+xml",
];

/// Detected Office document format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatType {
    /// Word document; AI summaries
    Docx,
    /// Excel workbook; the employee roster
    Xlsx,
    /// PowerPoint presentation; templates and reports
    Pptx,
}

impl FormatType {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            FormatType::Docx => "docx",
            FormatType::Xlsx => "xlsx",
            FormatType::Pptx => "pptx",
        }
    }

    /// Returns a human-readable name for this format.
    pub fn name(&self) -> &'static str {
        match self {
            FormatType::Docx => "Word Document",
            FormatType::Xlsx => "Excel Workbook",
            FormatType::Pptx => "PowerPoint Presentation",
        }
    }
}

impl std::fmt::Display for FormatType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Detect the format of an opened package.
///
/// `[Content_Types].xml` decides; packages without a recognisable main
/// part fall back to their top-level folder.
pub fn detect_format(pkg: &Package) -> Result<FormatType> {
    let content_types = pkg
        .get_text(CONTENT_TYPES_PART)
        .ok_or_else(|| Error::MissingComponent(CONTENT_TYPES_PART.to_string()))?;

    let declares = |types: &[&str]| types.iter().any(|t| content_types.contains(t));
    if declares(&DOCX_CONTENT_TYPES) {
        Ok(FormatType::Docx)
    } else if declares(&XLSX_CONTENT_TYPES) {
        Ok(FormatType::Xlsx)
    } else if declares(&PPTX_CONTENT_TYPES) {
        Ok(FormatType::Pptx)
    } else {
        detect_by_folder_structure(pkg)
    }
}

/// Fallback detection by checking folder structure.
fn detect_by_folder_structure(pkg: &Package) -> Result<FormatType> {
    let has = |prefix: &str| pkg.part_names().any(|n| n.starts_with(prefix));

    match (has("word/"), has("xl/"), has("ppt/")) {
        (true, false, false) => Ok(FormatType::Docx),
        (false, true, false) => Ok(FormatType::Xlsx),
        (false, false, true) => Ok(FormatType::Pptx),
        _ => Err(Error::UnknownFormat),
    }
}

/// Detect the format type from a byte slice.
pub fn detect_format_from_bytes(data: &[u8]) -> Result<FormatType> {
    if !is_zip_file(data) {
        return Err(Error::UnknownFormat);
    }
    detect_format(&Package::from_bytes(data)?)
}

/// Detect the format type from a file path.
pub fn detect_format_from_path(path: impl AsRef<Path>) -> Result<FormatType> {
    detect_format_from_bytes(&std::fs::read(path.as_ref())?)
}

/// Open `path` as a package, requiring it to be of `expected` format.
///
/// ```no_run
/// use reportdeck::detect::{open_as, FormatType};
///
/// let template = open_as("template.pptx", FormatType::Pptx)?;
/// # Ok::<(), reportdeck::Error>(())
/// ```
pub fn open_as(path: impl AsRef<Path>, expected: FormatType) -> Result<Package> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    if !is_zip_file(&data) {
        return Err(Error::UnknownFormat);
    }
    let pkg = Package::from_bytes(&data)?;
    let found = detect_format(&pkg)?;
    if found != expected {
        return Err(Error::InvalidData(format!(
            "{} is a {}, expected a {}",
            path.display(),
            found,
            expected
        )));
    }
    Ok(pkg)
}

/// Check if data starts with ZIP magic bytes.
pub fn is_zip_file(data: &[u8]) -> bool {
    data.len() >= 4 && data[..4] == ZIP_MAGIC
}
