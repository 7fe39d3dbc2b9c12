//! Error types for the reportdeck library.

use std::io;
use thiserror::Error;

/// Result type alias for reportdeck operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or dispatching reports.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error reading or writing a ZIP archive.
    #[error("ZIP archive error: {0}")]
    ZipArchive(String),

    /// Error parsing XML content.
    #[error("XML parse error: {0}")]
    XmlParse(String),

    /// The file is not an Office package this crate reads.
    #[error("Unknown or unsupported file format")]
    UnknownFormat,

    /// Invalid or malformed data in a package or input file.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A part the output package cannot do without is missing.
    #[error("Missing component: {0}")]
    MissingComponent(String),

    /// The template breaks the slide -> layout -> master -> theme chain.
    #[error("Template error: {0}")]
    Template(String),

    /// Employee spreadsheet could not be interpreted.
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    /// An external program failed or timed out.
    #[error("{program} failed: {message}")]
    Process {
        /// Program name as invoked
        program: String,
        /// Exit status or failure description
        message: String,
    },

    /// The lookup or delivery service answered with a failure code.
    #[error("Service error: {0}")]
    Service(String),

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::ZipArchive(err.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::XmlParse(err.to_string())
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::InvalidData(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidData(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Http(err.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::InvalidData(err.to_string())
    }
}
