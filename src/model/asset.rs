//! Attachment model structures.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Report section an attachment belongs to.
///
/// The declaration order is the order sections appear in a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetCategory {
    /// Body composition analysis
    BodyComposition,
    /// Laboratory results; also anything unclassified
    Lab,
    /// Electrocardiogram
    Ecg,
    /// Ultrasound, CT, DR and other imaging
    Imaging,
}

impl AssetCategory {
    /// All categories in report order.
    pub const ORDER: [AssetCategory; 4] = [
        AssetCategory::BodyComposition,
        AssetCategory::Lab,
        AssetCategory::Ecg,
        AssetCategory::Imaging,
    ];

    /// Classify a file name by its keywords.
    pub fn classify(file_name: &str) -> Self {
        let upper = file_name.to_uppercase();
        if file_name.contains("人体成分") {
            AssetCategory::BodyComposition
        } else if file_name.contains("心电") {
            AssetCategory::Ecg
        } else if ["影像", "彩超", "超声"].iter().any(|k| file_name.contains(k))
            || ["CT", "DR", "MRI"].iter().any(|k| upper.contains(k))
        {
            AssetCategory::Imaging
        } else {
            AssetCategory::Lab
        }
    }

    /// Chinese section title.
    pub fn label(&self) -> &'static str {
        match self {
            AssetCategory::BodyComposition => "人体成分",
            AssetCategory::Lab => "检验报告",
            AssetCategory::Ecg => "心电图",
            AssetCategory::Imaging => "影像检查",
        }
    }
}

impl std::fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// File format of an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Pdf,
}

impl AttachmentKind {
    /// Determine the kind from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" | "jpg" | "jpeg" => Some(AttachmentKind::Image),
            "pdf" => Some(AttachmentKind::Pdf),
            _ => None,
        }
    }
}

/// One examination attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub path: PathBuf,
    pub category: AssetCategory,
    pub kind: AttachmentKind,
}

impl Attachment {
    /// Classify a path; `None` for unsupported formats.
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let kind = AttachmentKind::from_extension(path.extension()?.to_str()?)?;
        let name = path.file_name()?.to_string_lossy().into_owned();
        Some(Self {
            category: AssetCategory::classify(&name),
            kind,
            path,
        })
    }
}

/// Everything found for one employee.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetBundle {
    /// Attachments in discovery order
    pub attachments: Vec<Attachment>,
    /// AI summary documents
    pub summary_docs: Vec<PathBuf>,
}

impl AssetBundle {
    /// Whether nothing was found at all.
    pub fn is_empty(&self) -> bool {
        self.attachments.is_empty() && self.summary_docs.is_empty()
    }

    /// Attachments of one category, sorted by file name.
    pub fn in_category(&self, category: AssetCategory) -> Vec<&Attachment> {
        let mut found: Vec<&Attachment> = self
            .attachments
            .iter()
            .filter(|a| a.category == category)
            .collect();
        found.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
        found
    }
}

/// One rendered page ready for a slide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePage {
    /// Encoded image bytes
    pub data: Vec<u8>,
    /// Lower-case file extension of `data`
    pub extension: String,
    /// Attachment the page came from
    pub source: PathBuf,
    /// 1-based page number within the source
    pub page: usize,
}

impl ImagePage {
    /// A single-page image read from disk.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_else(|| "png".to_string());
        Ok(Self {
            data: std::fs::read(path)?,
            extension,
            source: path.to_path_buf(),
            page: 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_keywords() {
        assert_eq!(AssetCategory::classify("李雷_人体成分.pdf"), AssetCategory::BodyComposition);
        assert_eq!(AssetCategory::classify("李雷_心电图.png"), AssetCategory::Ecg);
        assert_eq!(AssetCategory::classify("李雷_彩超.jpg"), AssetCategory::Imaging);
        assert_eq!(AssetCategory::classify("李雷_胸部ct.pdf"), AssetCategory::Imaging);
        assert_eq!(AssetCategory::classify("李雷_检验.pdf"), AssetCategory::Lab);
        assert_eq!(AssetCategory::classify("李雷_其他.pdf"), AssetCategory::Lab);
    }

    #[test]
    fn test_attachment_from_path() {
        let att = Attachment::from_path("/data/李雷_心电.PDF").unwrap();
        assert_eq!(att.kind, AttachmentKind::Pdf);
        assert_eq!(att.category, AssetCategory::Ecg);
        assert!(Attachment::from_path("/data/李雷.txt").is_none());
        assert!(Attachment::from_path("/data/noext").is_none());
    }

    #[test]
    fn test_bundle_category_order() {
        let bundle = AssetBundle {
            attachments: vec![
                Attachment::from_path("b_检验.png").unwrap(),
                Attachment::from_path("x_心电.png").unwrap(),
                Attachment::from_path("a_化验.png").unwrap(),
            ],
            summary_docs: vec![],
        };
        let lab = bundle.in_category(AssetCategory::Lab);
        assert_eq!(lab.len(), 2);
        assert_eq!(lab[0].path, PathBuf::from("a_化验.png"));
        assert!(!bundle.is_empty());
        assert!(AssetBundle::default().is_empty());
        assert!(AssetCategory::BodyComposition < AssetCategory::Imaging);
    }
}
