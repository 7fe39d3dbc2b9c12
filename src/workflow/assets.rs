//! Attachment discovery by file name.

use super::AssetSource;
use crate::error::Result;
use crate::model::{AssetBundle, Attachment, Employee};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use unicode_normalization::UnicodeNormalization;
use walkdir::WalkDir;

/// Keywords marking a `.docx` as an AI summary.
const SUMMARY_KEYWORDS: [&str; 3] = ["总结", "AI", "解读"];

/// One file under the attachment root.
#[derive(Debug, Clone)]
struct IndexedFile {
    path: PathBuf,
    /// NFC-normalized path relative to the root
    key: String,
}

/// Attachments found by walking a directory tree.
///
/// The tree is indexed once; a file belongs to an employee when its
/// relative path (so either the file name or a per-employee folder)
/// contains the employee's name.
#[derive(Debug, Clone)]
pub struct DirectoryAssets {
    root: PathBuf,
    files: Vec<IndexedFile>,
}

impl DirectoryAssets {
    /// Index every file below `root`.
    pub fn scan(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let mut files = Vec::new();
        for entry in WalkDir::new(&root).follow_links(true).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable attachment entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            // Office lock files
            if name.starts_with("~$") || name.starts_with('.') {
                continue;
            }
            let relative = entry.path().strip_prefix(&root).unwrap_or(entry.path());
            files.push(IndexedFile {
                key: normalize(&relative.to_string_lossy()),
                path: entry.path().to_path_buf(),
            });
        }
        debug!(root = %root.display(), files = files.len(), "indexed attachments");
        Ok(Self { root, files })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl AssetSource for DirectoryAssets {
    fn collect_assets(&self, employee: &Employee) -> Result<AssetBundle> {
        let name = normalize(employee.name.trim());
        if name.is_empty() {
            return Ok(AssetBundle::default());
        }

        let mut matches: Vec<&IndexedFile> =
            self.files.iter().filter(|f| f.key.contains(&name)).collect();

        // Several people may share a name; files carrying the id number win.
        if let Some(id) = employee.id() {
            let id = normalize(id);
            if matches.iter().any(|f| f.key.contains(&id)) {
                matches.retain(|f| f.key.contains(&id));
            }
        }

        let mut bundle = AssetBundle::default();
        for file in matches {
            if is_summary_doc(&file.path) {
                bundle.summary_docs.push(file.path.clone());
            } else if let Some(attachment) = Attachment::from_path(&file.path) {
                bundle.attachments.push(attachment);
            }
        }
        debug!(
            employee = %employee.name,
            attachments = bundle.attachments.len(),
            summaries = bundle.summary_docs.len(),
            "collected assets"
        );
        Ok(bundle)
    }
}

fn normalize(s: &str) -> String {
    s.nfc().collect()
}

/// A `.docx` whose name carries a summary keyword.
pub fn is_summary_doc(path: &Path) -> bool {
    let is_docx = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("docx"));
    let name = path
        .file_name()
        .map(|n| normalize(&n.to_string_lossy()).to_uppercase())
        .unwrap_or_default();
    is_docx && SUMMARY_KEYWORDS.iter().any(|k| name.contains(k))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AssetCategory, AttachmentKind};
    use std::fs;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_is_summary_doc() {
        assert!(is_summary_doc(Path::new("李雷_AI总结.docx")));
        assert!(is_summary_doc(Path::new("李雷_ai解读.DOCX")));
        assert!(!is_summary_doc(Path::new("李雷_检验.docx")));
        assert!(!is_summary_doc(Path::new("李雷_总结.pdf")));
    }

    #[test]
    fn test_collect_by_name_and_folder() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "李雷_心电图.png");
        touch(dir.path(), "李雷_人体成分.pdf");
        touch(dir.path(), "李雷_AI总结.docx");
        touch(dir.path(), "~$李雷_AI总结.docx");
        touch(dir.path(), "李雷_备注.txt");
        touch(dir.path(), "韩梅梅/血常规.jpg");
        touch(dir.path(), "韩梅梅/彩超.pdf");

        let assets = DirectoryAssets::scan(dir.path()).unwrap();
        let bundle = assets.collect_assets(&Employee::new("李雷")).unwrap();
        assert_eq!(bundle.attachments.len(), 2);
        assert_eq!(bundle.summary_docs.len(), 1);
        assert!(bundle
            .attachments
            .iter()
            .any(|a| a.category == AssetCategory::Ecg && a.kind == AttachmentKind::Image));

        let bundle = assets.collect_assets(&Employee::new("韩梅梅")).unwrap();
        assert_eq!(bundle.attachments.len(), 2);
        assert_eq!(bundle.in_category(AssetCategory::Imaging).len(), 1);

        assert!(assets.collect_assets(&Employee::new("张三")).unwrap().is_empty());
    }

    #[test]
    fn test_identity_number_disambiguates() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "王芳_110101199001011234_检验.pdf");
        touch(dir.path(), "王芳_110101198505052222_检验.pdf");

        let assets = DirectoryAssets::scan(dir.path()).unwrap();
        let first = Employee::new("王芳").with_id_number("110101199001011234");
        let bundle = assets.collect_assets(&first).unwrap();
        assert_eq!(bundle.attachments.len(), 1);
        assert!(bundle.attachments[0]
            .path
            .to_string_lossy()
            .contains("110101199001011234"));

        let bundle = assets.collect_assets(&Employee::new("王芳")).unwrap();
        assert_eq!(bundle.attachments.len(), 2);
    }

    #[test]
    fn test_nfc_matching() {
        let dir = tempfile::tempdir().unwrap();
        // Decomposed "é" on disk, composed in the roster.
        touch(dir.path(), "Rene\u{301}_ECG_心电.png");
        let assets = DirectoryAssets::scan(dir.path()).unwrap();
        let bundle = assets.collect_assets(&Employee::new("Ren\u{e9}")).unwrap();
        assert_eq!(bundle.attachments.len(), 1);
    }
}
