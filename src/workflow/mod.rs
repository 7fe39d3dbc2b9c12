//! Batch report workflow around the slide-injection engine.
//!
//! Each collaborator the batch depends on sits behind a trait so tests
//! and embedders can swap it:
//!
//! | Trait | Default implementation |
//! |-------|------------------------|
//! | [`AssetSource`] | [`DirectoryAssets`] (file name matching) |
//! | [`SummaryReader`] | [`DocxSummaryReader`] |
//! | [`Rasterizer`] | [`PdfRasterizer`] (`pdftoppm`, then `mutool`) |
//! | [`PdfConverter`] | [`SofficeConverter`] |
//! | [`Messenger`] | [`HttpMessenger`] |

mod assets;
mod batch;
mod config;
mod convert;
mod delivery;
mod naming;
mod process;
mod raster;
mod report;

pub use assets::{is_summary_doc, DirectoryAssets};
pub use batch::{BatchRunner, BatchSummary, EmployeeReport, Outcome, SKIP_NO_CONTENT};
pub use config::{
    BatchConfig, ConverterConfig, DeliveryConfig, PlaceholderKeys, RasterConfig, TemplateSlides,
};
pub use convert::{ConverterQueue, SofficeConverter};
pub use delivery::HttpMessenger;
pub use naming::{sanitize_file_name, FileNamer};
pub use process::{is_available, run_with_timeout};
pub use raster::PdfRasterizer;
pub use report::{paginate_summary, AssembledReport, ReportAssembler, ReportContent};

use crate::error::Result;
use crate::model::{AssetBundle, Employee, ImagePage};
use std::path::{Path, PathBuf};

/// Finds an employee's attachments and summary documents.
pub trait AssetSource: Send + Sync {
    fn collect_assets(&self, employee: &Employee) -> Result<AssetBundle>;
}

/// Reads summary text out of a document.
pub trait SummaryReader: Send + Sync {
    fn extract_text(&self, path: &Path) -> Result<String>;
}

/// Renders PDF pages to images, in page order.
pub trait Rasterizer: Send + Sync {
    fn pdf_to_images(&self, pdf: &Path) -> Result<Vec<ImagePage>>;
}

/// Converts a presentation to PDF, returning the PDF path.
pub trait PdfConverter: Send + Sync {
    fn convert_to_pdf(&self, pptx: &Path) -> Result<PathBuf>;
}

/// Resolves identity numbers to accounts and delivers files to them.
pub trait Messenger: Send + Sync {
    fn lookup_id(&self, id_number: &str) -> Result<String>;
    fn deliver_file(&self, account: &str, data: &[u8], file_name: &str) -> Result<()>;
}

/// [`SummaryReader`] for `.docx` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxSummaryReader;

impl SummaryReader for DocxSummaryReader {
    fn extract_text(&self, path: &Path) -> Result<String> {
        crate::docx::extract_text(path)
    }
}
