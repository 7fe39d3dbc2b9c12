//! Assembling one employee's report deck.

use super::config::{BatchConfig, PlaceholderKeys, TemplateSlides};
use crate::container::Package;
use crate::detect::{open_as, FormatType};
use crate::deck::{
    skeleton, DeckBuilder, ImagePayload, InjectOutcome, Placeholders, Position, SlideRecord,
    SlideRequest,
};
use crate::error::Result;
use crate::model::{AssetCategory, Employee, ImagePage};
use chrono::NaiveDate;
use tracing::{debug, warn};
use unicode_width::UnicodeWidthChar;

/// What goes into one report.
#[derive(Debug, Clone, Default)]
pub struct ReportContent {
    pub employee: Employee,
    /// Rendered attachment pages with their section
    pub pages: Vec<(AssetCategory, ImagePage)>,
    /// Extracted AI summary text
    pub summary: Option<String>,
}

/// A finished report package.
#[derive(Debug, Clone)]
pub struct AssembledReport {
    pub package: Package,
    pub slides: Vec<SlideRecord>,
    /// Contributions left out, such as a section the template lacks
    pub warnings: Vec<String>,
}

/// Builds report decks from one template.
#[derive(Debug)]
pub struct ReportAssembler {
    template: Package,
    /// Starting deck cloned for every report
    base: Package,
    /// `base` is a skeleton of `template`
    shares_template: bool,
    slides: TemplateSlides,
    keys: PlaceholderKeys,
    summary_width: usize,
}

impl ReportAssembler {
    /// Load the template (and base deck, if configured) named by `config`.
    pub fn from_config(config: &BatchConfig) -> Result<Self> {
        let template = open_as(&config.template, FormatType::Pptx)?;
        let base = match &config.base_deck {
            Some(path) => Some(open_as(path, FormatType::Pptx)?),
            None => None,
        };
        Self::new(template, base, config)
    }

    /// Reports start from `base`, or from the template stripped of its
    /// slides.
    pub fn new(template: Package, base: Option<Package>, config: &BatchConfig) -> Result<Self> {
        let (base, shares_template) = match base {
            Some(base) => (base, false),
            None => (skeleton(&template)?, true),
        };
        Ok(Self {
            template,
            base,
            shares_template,
            slides: config.slides.clone(),
            keys: config.placeholders.clone(),
            summary_width: config.summary_chars_per_slide.max(1),
        })
    }

    pub fn template(&self) -> &Package {
        &self.template
    }

    /// Build the deck for one employee.
    ///
    /// `today` fills the date when the roster has none and anchors ages
    /// derived from the identity number.
    pub fn assemble(&self, content: &ReportContent, today: NaiveDate) -> Result<AssembledReport> {
        let mut deck = if self.shares_template {
            DeckBuilder::from_skeleton(&self.template, self.base.clone())?
        } else {
            DeckBuilder::new(&self.template, self.base.clone())?
        };
        let mut warnings = Vec::new();

        let cover = SlideRequest::new(self.slides.cover, Position::Start)
            .with_placeholders(self.cover_values(&content.employee, today));
        note(&mut warnings, deck.inject(&cover)?);

        for category in AssetCategory::ORDER {
            let pages: Vec<&ImagePage> = content
                .pages
                .iter()
                .filter(|(c, _)| *c == category)
                .map(|(_, page)| page)
                .collect();
            if pages.is_empty() {
                continue;
            }
            let Some(slide) = self.category_slide(category) else {
                let reason = format!("no template slide for {}; {} page(s) left out", category, pages.len());
                warn!(employee = %content.employee.name, "{}", reason);
                warnings.push(reason);
                continue;
            };
            for page in pages {
                let payload = ImagePayload::Bytes {
                    data: page.data.clone(),
                    extension: page.extension.clone(),
                };
                let request = SlideRequest::new(slide, Position::Middle)
                    .with_image(payload, Some(self.keys.image.clone()));
                note(&mut warnings, deck.inject(&request)?);
            }
        }

        let summary = content.summary.as_deref().unwrap_or_default();
        match self.slides.ai_summary {
            Some(slide) => {
                for chunk in paginate_summary(summary, self.summary_width) {
                    let values = Placeholders::new().with(self.keys.summary.clone(), chunk);
                    let request = SlideRequest::new(slide, Position::End).with_placeholders(values);
                    note(&mut warnings, deck.inject(&request)?);
                }
            }
            None if !summary.trim().is_empty() => {
                warnings.push("no template slide for the AI summary".to_string());
            }
            None => {}
        }

        if let Some(slide) = self.slides.closing {
            note(&mut warnings, deck.inject(&SlideRequest::new(slide, Position::End))?);
        }

        let (package, slides) = deck.finish()?;
        debug!(employee = %content.employee.name, slides = slides.len(), "assembled report");
        Ok(AssembledReport {
            package,
            slides,
            warnings,
        })
    }

    fn category_slide(&self, category: AssetCategory) -> Option<u32> {
        match category {
            AssetCategory::BodyComposition => self.slides.body_composition,
            AssetCategory::Lab => self.slides.lab,
            AssetCategory::Ecg => self.slides.ecg,
            AssetCategory::Imaging => self.slides.imaging,
        }
    }

    /// Cover values. Blank gender and age clear their placeholders;
    /// a missing identity number leaves its placeholder visible.
    fn cover_values(&self, employee: &Employee, today: NaiveDate) -> Placeholders {
        let date = employee
            .exam_date
            .clone()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| today.format("%Y-%m-%d").to_string());
        Placeholders::new()
            .with(self.keys.name.clone(), employee.name.trim())
            .with(
                self.keys.gender.clone(),
                employee.effective_gender().unwrap_or_default(),
            )
            .allow_blank(self.keys.gender.clone())
            .with(
                self.keys.age.clone(),
                employee.effective_age(today).unwrap_or_default(),
            )
            .allow_blank(self.keys.age.clone())
            .with(self.keys.date.clone(), date)
            .with(self.keys.id_number.clone(), employee.id().unwrap_or_default())
    }
}

fn note(warnings: &mut Vec<String>, outcome: InjectOutcome) {
    if let InjectOutcome::Skipped { reason } = outcome {
        warnings.push(reason);
    }
}

/// Split summary text into slide-sized chunks.
///
/// Lines are kept whole while they fit within `width` display columns
/// (CJK characters count two); longer lines are broken at character
/// boundaries. Blank lines at chunk edges are dropped.
pub fn paginate_summary(text: &str, width: usize) -> Vec<String> {
    let width = width.max(2);
    let mut chunks = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut used = 0usize;

    let flush = |current: &mut Vec<String>, used: &mut usize, chunks: &mut Vec<String>| {
        let chunk = current.join("\n").trim_matches('\n').trim_end().to_string();
        if !chunk.trim().is_empty() {
            chunks.push(chunk);
        }
        current.clear();
        *used = 0;
    };

    for line in text.trim().lines() {
        for piece in split_by_width(line.trim_end(), width) {
            let cost = display_width(&piece).max(1);
            if used + cost > width && !current.is_empty() {
                flush(&mut current, &mut used, &mut chunks);
            }
            if current.is_empty() && piece.trim().is_empty() {
                continue;
            }
            used += cost;
            current.push(piece);
        }
    }
    flush(&mut current, &mut used, &mut chunks);
    chunks
}

fn display_width(s: &str) -> usize {
    s.chars().map(|c| c.width().unwrap_or(0)).sum()
}

/// Break a line into pieces no wider than `width`.
fn split_by_width(line: &str, width: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut piece = String::new();
    let mut used = 0;
    for c in line.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > width && !piece.is_empty() {
            pieces.push(std::mem::take(&mut piece));
            used = 0;
        }
        piece.push(c);
        used += w;
    }
    if !piece.is_empty() || pieces.is_empty() {
        pieces.push(piece);
    }
    pieces
}
