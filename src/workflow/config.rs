//! Batch configuration.
//!
//! A batch is described by a TOML file:
//!
//! ```toml
//! template = "template.pptx"
//! employees = "roster.xlsx"
//! attachments = "attachments/"
//! output_dir = "out/"
//! concurrency = 4
//!
//! [slides]
//! cover = 1
//! closing = 7
//!
//! [delivery]
//! lookup_url = "http://im.local/api/lookup"
//! delivery_url = "http://im.local/api/send"
//! ```
//!
//! Every section is optional; command-line flags override file values.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Template slide numbers used for each report section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateSlides {
    pub cover: u32,
    pub lab: Option<u32>,
    pub body_composition: Option<u32>,
    pub ecg: Option<u32>,
    pub imaging: Option<u32>,
    pub ai_summary: Option<u32>,
    pub closing: Option<u32>,
}

impl Default for TemplateSlides {
    fn default() -> Self {
        Self {
            cover: 1,
            lab: Some(2),
            body_composition: Some(3),
            ecg: Some(4),
            imaging: Some(5),
            ai_summary: Some(6),
            closing: Some(7),
        }
    }
}

/// Placeholder keys written in the template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaceholderKeys {
    pub name: String,
    pub gender: String,
    pub age: String,
    pub date: String,
    pub id_number: String,
    pub summary: String,
    pub image: String,
}

impl Default for PlaceholderKeys {
    fn default() -> Self {
        Self {
            name: "姓名".to_string(),
            gender: "性别".to_string(),
            age: "年龄".to_string(),
            date: "日期".to_string(),
            id_number: "证件号".to_string(),
            summary: "总结".to_string(),
            image: "图片".to_string(),
        }
    }
}

/// Office-to-PDF converter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Converter executable
    pub program: String,
    pub timeout_secs: u64,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            program: "soffice".to_string(),
            timeout_secs: 120,
        }
    }
}

impl ConverterConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// PDF rasterizer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterConfig {
    pub dpi: u32,
    pub timeout_secs: u64,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            dpi: 150,
            timeout_secs: 60,
        }
    }
}

impl RasterConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Identity lookup and file delivery endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryConfig {
    pub lookup_url: String,
    pub delivery_url: String,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

fn default_http_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1000
}

impl DeliveryConfig {
    /// Endpoints with default timeout and retry settings.
    pub fn new(lookup_url: impl Into<String>, delivery_url: impl Into<String>) -> Self {
        Self {
            lookup_url: lookup_url.into(),
            delivery_url: delivery_url.into(),
            timeout_secs: default_http_timeout(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Everything a batch run needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Element template presentation
    pub template: PathBuf,

    /// Deck each report starts from; the stripped template when absent
    pub base_deck: Option<PathBuf>,

    /// Employee roster spreadsheet
    pub employees: PathBuf,

    /// Root directory searched for attachments
    pub attachments: PathBuf,

    /// Where reports are written
    pub output_dir: PathBuf,

    pub slides: TemplateSlides,
    pub placeholders: PlaceholderKeys,

    /// Display width of summary text per AI-summary slide
    pub summary_chars_per_slide: usize,

    /// Append `_<id number>` to report file names
    pub append_id_suffix: bool,

    /// Employees processed at once
    pub concurrency: usize,

    /// Converter processes allowed at once
    pub converter_concurrency: usize,

    /// Also produce a PDF next to each report
    pub convert_pdf: bool,

    pub converter: ConverterConfig,
    pub rasterizer: RasterConfig,

    /// Delivery is skipped when absent
    pub delivery: Option<DeliveryConfig>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            template: PathBuf::from("template.pptx"),
            base_deck: None,
            employees: PathBuf::from("employees.xlsx"),
            attachments: PathBuf::from("attachments"),
            output_dir: PathBuf::from("output"),
            slides: TemplateSlides::default(),
            placeholders: PlaceholderKeys::default(),
            summary_chars_per_slide: 600,
            append_id_suffix: false,
            concurrency: 4,
            converter_concurrency: 1,
            convert_pdf: false,
            converter: ConverterConfig::default(),
            rasterizer: RasterConfig::default(),
            delivery: None,
        }
    }
}

impl BatchConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and validate a TOML configuration file.
    ///
    /// Relative paths in the file are resolved against its directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&content)?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            config.rebase(dir);
        }
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML without validating.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn rebase(&mut self, dir: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = dir.join(&*p);
            }
        };
        join(&mut self.template);
        join(&mut self.employees);
        join(&mut self.attachments);
        join(&mut self.output_dir);
        if let Some(base) = self.base_deck.as_mut() {
            join(base);
        }
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.slides.cover == 0 {
            return Err(Error::Config("slides.cover must be >= 1".to_string()));
        }
        if self.summary_chars_per_slide == 0 {
            return Err(Error::Config(
                "summary_chars_per_slide must be > 0".to_string(),
            ));
        }
        if self.concurrency == 0 || self.converter_concurrency == 0 {
            return Err(Error::Config(
                "concurrency and converter_concurrency must be >= 1".to_string(),
            ));
        }
        if self.rasterizer.dpi == 0 {
            return Err(Error::Config("rasterizer.dpi must be > 0".to_string()));
        }
        if let Some(delivery) = &self.delivery {
            for url in [&delivery.lookup_url, &delivery.delivery_url] {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(Error::Config(format!("not an http(s) URL: {}", url)));
                }
            }
        }
        Ok(())
    }

    /// Set the element template.
    pub fn with_template(mut self, path: impl Into<PathBuf>) -> Self {
        self.template = path.into();
        self
    }

    /// Start reports from a base deck instead of the stripped template.
    pub fn with_base_deck(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_deck = Some(path.into());
        self
    }

    /// Set the roster spreadsheet.
    pub fn with_employees(mut self, path: impl Into<PathBuf>) -> Self {
        self.employees = path.into();
        self
    }

    /// Set the attachment root.
    pub fn with_attachments(mut self, path: impl Into<PathBuf>) -> Self {
        self.attachments = path.into();
        self
    }

    /// Set the output directory.
    pub fn with_output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = path.into();
        self
    }

    /// Set the employee concurrency (at least 1).
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// Enable PDF conversion.
    pub fn with_pdf(mut self, convert: bool) -> Self {
        self.convert_pdf = convert;
        self
    }

    /// Append the identity number to file names.
    pub fn with_id_suffix(mut self, append: bool) -> Self {
        self.append_id_suffix = append;
        self
    }

    /// Set the summary width budget per slide.
    pub fn with_summary_chars(mut self, width: usize) -> Self {
        self.summary_chars_per_slide = width.max(1);
        self
    }

    /// Enable delivery.
    pub fn with_delivery(mut self, delivery: DeliveryConfig) -> Self {
        self.delivery = Some(delivery);
        self
    }
}
