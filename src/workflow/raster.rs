//! PDF page rasterization through poppler or MuPDF.

use super::config::RasterConfig;
use super::process::run_with_timeout;
use super::Rasterizer;
use crate::error::{Error, Result};
use crate::model::ImagePage;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

/// Rasterizer backed by `pdftoppm`, falling back to `mutool draw`.
#[derive(Debug, Clone)]
pub struct PdfRasterizer {
    config: RasterConfig,
    pdftoppm: String,
    mutool: String,
}

impl PdfRasterizer {
    pub fn new(config: RasterConfig) -> Self {
        Self {
            config,
            pdftoppm: "pdftoppm".to_string(),
            mutool: "mutool".to_string(),
        }
    }

    /// Override the backend executables.
    pub fn with_programs(mut self, pdftoppm: impl Into<String>, mutool: impl Into<String>) -> Self {
        self.pdftoppm = pdftoppm.into();
        self.mutool = mutool.into();
        self
    }

    fn run_pdftoppm(&self, pdf: &Path, dir: &Path) -> Result<()> {
        let mut cmd = Command::new(&self.pdftoppm);
        cmd.arg("-png")
            .arg("-r")
            .arg(self.config.dpi.to_string())
            .arg(pdf)
            .arg(dir.join("page"));
        run_with_timeout(&mut cmd, self.config.timeout())
    }

    fn run_mutool(&self, pdf: &Path, dir: &Path) -> Result<()> {
        let mut cmd = Command::new(&self.mutool);
        cmd.arg("draw")
            .arg("-r")
            .arg(self.config.dpi.to_string())
            .arg("-o")
            .arg(dir.join("page-%d.png"))
            .arg(pdf);
        run_with_timeout(&mut cmd, self.config.timeout())
    }

    fn pages_in(dir: &Path, pdf: &Path) -> Result<Vec<ImagePage>> {
        let mut files: Vec<(usize, PathBuf)> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter_map(|path| page_number(&path).map(|n| (n, path)))
            .collect();
        files.sort_by_key(|(n, _)| *n);

        files
            .into_iter()
            .map(|(page, path)| {
                Ok(ImagePage {
                    data: std::fs::read(&path)?,
                    extension: "png".to_string(),
                    source: pdf.to_path_buf(),
                    page,
                })
            })
            .collect()
    }
}

impl Rasterizer for PdfRasterizer {
    fn pdf_to_images(&self, pdf: &Path) -> Result<Vec<ImagePage>> {
        let mut failures = Vec::new();
        let backends: [(&str, fn(&Self, &Path, &Path) -> Result<()>); 2] = [
            (self.pdftoppm.as_str(), Self::run_pdftoppm),
            (self.mutool.as_str(), Self::run_mutool),
        ];

        for (name, run) in backends {
            let dir = tempfile::tempdir()?;
            match run(self, pdf, dir.path()) {
                Ok(()) => {
                    let pages = Self::pages_in(dir.path(), pdf)?;
                    if !pages.is_empty() {
                        debug!(pdf = %pdf.display(), backend = name, pages = pages.len(), "rasterized");
                        return Ok(pages);
                    }
                    failures.push(format!("{}: no pages produced", name));
                }
                Err(e) => {
                    warn!(pdf = %pdf.display(), backend = name, error = %e, "rasterizer failed");
                    failures.push(e.to_string());
                }
            }
        }

        Err(Error::Process {
            program: "pdf rasterizer".to_string(),
            message: format!("{}: {}", pdf.display(), failures.join("; ")),
        })
    }
}

/// Page number from `page-3.png` or `page-03.png`.
fn page_number(path: &Path) -> Option<usize> {
    if path.extension()?.to_str()? != "png" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    stem.strip_prefix("page-")?.parse().ok()
}
