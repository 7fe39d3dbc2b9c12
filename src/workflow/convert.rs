//! PPTX to PDF conversion through LibreOffice.

use super::config::ConverterConfig;
use super::process::run_with_timeout;
use super::PdfConverter;
use crate::error::{Error, Result};
use crossbeam::channel::{bounded, Receiver, Sender};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Converter invoking `soffice --headless --convert-to pdf`.
#[derive(Debug, Clone)]
pub struct SofficeConverter {
    config: ConverterConfig,
}

impl SofficeConverter {
    pub fn new(config: ConverterConfig) -> Self {
        Self { config }
    }
}

impl PdfConverter for SofficeConverter {
    fn convert_to_pdf(&self, pptx: &Path) -> Result<PathBuf> {
        let out_dir = pptx
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let pdf = pptx.with_extension("pdf");

        // A private profile lets several instances run side by side.
        let profile = tempfile::tempdir()?;
        let profile_url = format!("file://{}", profile.path().display());

        let mut cmd = Command::new(&self.config.program);
        cmd.arg(format!("-env:UserInstallation={}", profile_url))
            .arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(out_dir)
            .arg(pptx);
        run_with_timeout(&mut cmd, self.config.timeout())?;

        if !pdf.is_file() {
            return Err(Error::Process {
                program: self.config.program.clone(),
                message: format!("no PDF produced for {}", pptx.display()),
            });
        }
        info!(pdf = %pdf.display(), "converted");
        Ok(pdf)
    }
}

/// Limits how many conversions run at once.
///
/// Holds a bounded channel pre-filled with one token per slot; a caller
/// takes a token for the duration of its conversion.
#[derive(Debug, Clone)]
pub struct ConverterQueue {
    tokens: Sender<()>,
    slots: Receiver<()>,
    limit: usize,
}

impl ConverterQueue {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        let (tokens, slots) = bounded(limit);
        for _ in 0..limit {
            // Cannot fail: capacity equals the number of sends.
            let _ = tokens.try_send(());
        }
        Self {
            tokens,
            slots,
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Run `job` once a slot is free.
    pub fn run<T>(&self, job: impl FnOnce() -> T) -> Result<T> {
        self.slots
            .recv()
            .map_err(|_| Error::InvalidData("converter queue closed".to_string()))?;
        let _slot = Slot(&self.tokens);
        debug!(limit = self.limit, "converter slot acquired");
        Ok(job())
    }

    /// Convert through `converter` once a slot is free.
    pub fn convert(&self, converter: &dyn PdfConverter, pptx: &Path) -> Result<PathBuf> {
        self.run(|| converter.convert_to_pdf(pptx))?
    }
}

/// Returns its token on drop, including during unwinding.
struct Slot<'q>(&'q Sender<()>);

impl Drop for Slot<'_> {
    fn drop(&mut self) {
        let _ = self.0.try_send(());
    }
}
