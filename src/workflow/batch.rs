//! Parallel batch driver.

use super::config::BatchConfig;
use super::convert::{ConverterQueue, SofficeConverter};
use super::delivery::HttpMessenger;
use super::naming::FileNamer;
use super::raster::PdfRasterizer;
use super::report::{ReportAssembler, ReportContent};
use super::{
    AssetSource, DirectoryAssets, DocxSummaryReader, Messenger, PdfConverter, Rasterizer,
    SummaryReader,
};
use crate::error::{Error, Result};
use crate::model::{AssetBundle, AssetCategory, AttachmentKind, Employee, ImagePage};
use chrono::{Local, NaiveDate};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Skip reason for an employee with neither attachments nor summary.
pub const SKIP_NO_CONTENT: &str = "缺少体检结果与AI总结";

/// What happened to one employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Succeeded {
        output: PathBuf,
        #[serde(skip_serializing_if = "Option::is_none")]
        pdf: Option<PathBuf>,
        delivered: bool,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<String>,
    },
    Skipped {
        reason: String,
    },
    Failed {
        reason: String,
        /// Report written before the failure, if any
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<PathBuf>,
    },
}

impl Outcome {
    fn failed(reason: impl Into<String>, output: Option<PathBuf>) -> Self {
        Outcome::Failed {
            reason: reason.into(),
            output,
        }
    }
}

/// Per-employee line of the batch summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmployeeReport {
    pub name: String,
    /// Roster row
    pub row: usize,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Result of a whole batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// In roster order
    pub reports: Vec<EmployeeReport>,
}

impl BatchSummary {
    pub fn from_reports(reports: Vec<EmployeeReport>) -> Self {
        let mut summary = BatchSummary::default();
        for report in &reports {
            match report.outcome {
                Outcome::Succeeded { .. } => summary.succeeded += 1,
                Outcome::Skipped { .. } => summary.skipped += 1,
                Outcome::Failed { .. } => summary.failed += 1,
            }
        }
        summary.reports = reports;
        summary
    }

    pub fn total(&self) -> usize {
        self.reports.len()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Runs report generation for a roster.
pub struct BatchRunner {
    config: BatchConfig,
    assembler: ReportAssembler,
    assets: Box<dyn AssetSource>,
    summaries: Box<dyn SummaryReader>,
    rasterizer: Box<dyn Rasterizer>,
    converter: Option<Box<dyn PdfConverter>>,
    queue: ConverterQueue,
    messenger: Option<Box<dyn Messenger>>,
    today: NaiveDate,
}

impl BatchRunner {
    /// Runner with the stock collaborators `config` asks for.
    pub fn from_config(config: BatchConfig) -> Result<Self> {
        config.validate()?;
        let assembler = ReportAssembler::from_config(&config)?;
        let assets = DirectoryAssets::scan(&config.attachments)?;
        let mut runner = Self::new(config.clone(), assembler, assets);
        if config.convert_pdf {
            runner = runner.with_converter(SofficeConverter::new(config.converter.clone()));
        }
        if let Some(delivery) = config.delivery.clone() {
            runner = runner.with_messenger(HttpMessenger::new(delivery)?);
        }
        Ok(runner)
    }

    /// Runner without conversion or delivery.
    pub fn new(
        config: BatchConfig,
        assembler: ReportAssembler,
        assets: impl AssetSource + 'static,
    ) -> Self {
        let queue = ConverterQueue::new(config.converter_concurrency);
        let rasterizer = PdfRasterizer::new(config.rasterizer.clone());
        Self {
            config,
            assembler,
            assets: Box::new(assets),
            summaries: Box::new(DocxSummaryReader),
            rasterizer: Box::new(rasterizer),
            converter: None,
            queue,
            messenger: None,
            today: Local::now().date_naive(),
        }
    }

    pub fn with_summary_reader(mut self, reader: impl SummaryReader + 'static) -> Self {
        self.summaries = Box::new(reader);
        self
    }

    pub fn with_rasterizer(mut self, rasterizer: impl Rasterizer + 'static) -> Self {
        self.rasterizer = Box::new(rasterizer);
        self
    }

    /// Convert every report to PDF.
    pub fn with_converter(mut self, converter: impl PdfConverter + 'static) -> Self {
        self.converter = Some(Box::new(converter));
        self
    }

    /// Deliver every report.
    pub fn with_messenger(mut self, messenger: impl Messenger + 'static) -> Self {
        self.messenger = Some(Box::new(messenger));
        self
    }

    /// Date used for default exam dates and derived ages.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn run(&self, employees: &[Employee]) -> Result<BatchSummary> {
        self.run_with_progress(employees, |_| {})
    }

    /// Process every employee, calling `on_done` as each finishes.
    ///
    /// Only setup problems (output directory, thread pool) are errors;
    /// anything going wrong for one employee is recorded in the summary.
    pub fn run_with_progress(
        &self,
        employees: &[Employee],
        on_done: impl Fn(&EmployeeReport) + Sync,
    ) -> Result<BatchSummary> {
        std::fs::create_dir_all(&self.config.output_dir)?;
        let stems = FileNamer::assign(self.config.append_id_suffix, employees);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.concurrency.max(1))
            .build()
            .map_err(|e| Error::Config(format!("failed to build worker pool: {}", e)))?;

        info!(
            employees = employees.len(),
            concurrency = self.config.concurrency,
            "starting batch"
        );
        let reports: Vec<EmployeeReport> = pool.install(|| {
            employees
                .par_iter()
                .zip(stems.par_iter())
                .map(|(employee, stem)| {
                    let report = self.process(employee, stem);
                    on_done(&report);
                    report
                })
                .collect()
        });

        let summary = BatchSummary::from_reports(reports);
        info!(
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            failed = summary.failed,
            "batch finished"
        );
        Ok(summary)
    }

    fn process(&self, employee: &Employee, stem: &str) -> EmployeeReport {
        let outcome = match self.try_process(employee, stem) {
            Ok(outcome) => outcome,
            Err(e) => Outcome::failed(e.to_string(), None),
        };
        match &outcome {
            Outcome::Succeeded { output, .. } => {
                info!(employee = %employee.name, output = %output.display(), "report generated")
            }
            Outcome::Skipped { reason } => info!(employee = %employee.name, "skipped: {}", reason),
            Outcome::Failed { reason, .. } => error!(employee = %employee.name, "failed: {}", reason),
        }
        EmployeeReport {
            name: employee.name.clone(),
            row: employee.row,
            outcome,
        }
    }

    fn try_process(&self, employee: &Employee, stem: &str) -> Result<Outcome> {
        let bundle = self.assets.collect_assets(employee)?;
        let summary = self.read_summary(employee, &bundle);
        if bundle.attachments.is_empty() && summary.trim().is_empty() {
            return Ok(Outcome::Skipped {
                reason: SKIP_NO_CONTENT.to_string(),
            });
        }

        let content = ReportContent {
            employee: employee.clone(),
            pages: self.render_pages(employee, &bundle),
            summary: Some(summary).filter(|s| !s.trim().is_empty()),
        };
        let report = self.assembler.assemble(&content, self.today)?;
        let output = self.config.output_dir.join(format!("{}.pptx", stem));
        report.package.write_to(&output)?;

        let pdf = match &self.converter {
            Some(converter) => match self.queue.convert(converter.as_ref(), &output) {
                Ok(pdf) => Some(pdf),
                Err(e) => {
                    return Ok(Outcome::failed(
                        format!("PDF conversion failed: {}", e),
                        Some(output),
                    ))
                }
            },
            None => None,
        };

        let delivered = match &self.messenger {
            Some(messenger) => {
                let file = pdf.as_deref().unwrap_or(&output);
                if let Err(e) = deliver(messenger.as_ref(), employee, file) {
                    return Ok(Outcome::failed(
                        format!("delivery failed: {}", e),
                        Some(output),
                    ));
                }
                true
            }
            None => false,
        };

        Ok(Outcome::Succeeded {
            output,
            pdf,
            delivered,
            warnings: report.warnings,
        })
    }

    /// Concatenated text of every readable summary document.
    fn read_summary(&self, employee: &Employee, bundle: &AssetBundle) -> String {
        let mut parts = Vec::new();
        for doc in &bundle.summary_docs {
            match self.summaries.extract_text(doc) {
                Ok(text) if !text.trim().is_empty() => parts.push(text.trim().to_string()),
                Ok(_) => {}
                Err(e) => warn!(
                    employee = %employee.name,
                    doc = %doc.display(),
                    error = %e,
                    "unreadable summary document"
                ),
            }
        }
        parts.join("\n\n")
    }

    /// Pages of every attachment in report order; unreadable ones are left out.
    fn render_pages(&self, employee: &Employee, bundle: &AssetBundle) -> Vec<(AssetCategory, ImagePage)> {
        let mut pages = Vec::new();
        for category in AssetCategory::ORDER {
            for attachment in bundle.in_category(category) {
                let rendered = match attachment.kind {
                    AttachmentKind::Image => ImagePage::from_file(&attachment.path)
                        .map(|page| vec![page])
                        .map_err(Error::from),
                    AttachmentKind::Pdf => self.rasterizer.pdf_to_images(&attachment.path),
                };
                match rendered {
                    Ok(rendered) => pages.extend(rendered.into_iter().map(|p| (category, p))),
                    Err(e) => warn!(
                        employee = %employee.name,
                        attachment = %attachment.path.display(),
                        error = %e,
                        "attachment left out"
                    ),
                }
            }
        }
        pages
    }
}

fn deliver(messenger: &dyn Messenger, employee: &Employee, file: &Path) -> Result<()> {
    let id = employee
        .id()
        .ok_or_else(|| Error::Service("employee has no identity number".to_string()))?;
    let account = messenger.lookup_id(id)?;
    let data = std::fs::read(file)?;
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string());
    messenger.deliver_file(&account, &data, &file_name)
}
