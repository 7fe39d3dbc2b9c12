//! DOCX (Word) summary text extraction.

mod text;

pub use text::{document_text, extract_text, extract_text_from_bytes};
