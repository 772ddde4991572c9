//! Core types for WordPress export scanning

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::types::WpId;

/// An author declared in the export channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorInfo {
    pub login: String,
    pub display_name: String,
}

/// A media attachment declared as an `attachment` item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentInfo {
    pub url: String,
    /// Alt text from `_wp_attachment_image_alt`, empty if absent
    pub alt: String,
    pub title: String,
}

/// Summary of an export produced by a single streaming scan.
///
/// Built once by [`scan`](super::scan) and only handed out by reference
/// afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct XmlSummary {
    /// Host of the source site
    pub domain: String,
    /// Site URL from the channel `link`
    pub base_url: String,
    /// Authors keyed by email
    pub authors: BTreeMap<String, AuthorInfo>,
    /// Attachments keyed by WordPress post id
    pub attachments: BTreeMap<WpId, AttachmentInfo>,
    pub posts: usize,
    pub pages: usize,
    pub categories: BTreeSet<String>,
    pub tags: BTreeSet<String>,
    /// Approved comments on posts (pages are not counted)
    pub approved_comment_count: usize,
    /// Largest single item subtree materialised during the scan, in bytes
    pub peak_item_bytes: u64,
}

impl XmlSummary {
    /// Look up an author's email by login name
    pub fn email_for_login(&self, login: &str) -> Option<&str> {
        self.authors
            .iter()
            .find(|(_, author)| author.login == login)
            .map(|(email, _)| email.as_str())
    }

    pub fn requirements(&self) -> Requirements {
        Requirements::from_summary(self)
    }
}

/// Which pipeline phases the export needs at all
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirements {
    pub needs_users: bool,
    pub needs_media: bool,
    pub needs_taxonomy: bool,
    pub needs_comments: bool,
}

impl Requirements {
    pub fn from_summary(summary: &XmlSummary) -> Self {
        Self {
            needs_users: !summary.authors.is_empty(),
            needs_media: !summary.attachments.is_empty(),
            needs_taxonomy: !summary.categories.is_empty() || !summary.tags.is_empty(),
            needs_comments: summary.approved_comment_count > 0,
        }
    }
}

/// Errors raised while reading an export
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Malformed export: {0}")]
    MalformedInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parse error at byte {position}: {message}")]
    Xml { position: u64, message: String },
}

/// Export file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WxrFormat {
    /// Plain WXR XML
    Xml,
    /// WXR XML compressed with bzip2
    XmlBzip2,
}

impl WxrFormat {
    /// Detect format from file path
    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_lowercase();

        if name.ends_with(".xml.bz2") {
            Some(WxrFormat::XmlBzip2)
        } else if name.ends_with(".xml") {
            Some(WxrFormat::Xml)
        } else {
            None
        }
    }
}

/// List export candidates in a directory, sorted by file name
pub fn discover_exports(dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && WxrFormat::detect(&path).is_some() {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_format_detection() {
        assert_eq!(
            WxrFormat::detect(Path::new("site.WordPress.2024-01-01.xml")),
            Some(WxrFormat::Xml)
        );
        assert_eq!(
            WxrFormat::detect(Path::new("export.xml.bz2")),
            Some(WxrFormat::XmlBzip2)
        );
        assert_eq!(WxrFormat::detect(Path::new("notes.txt")), None);
    }

    #[test]
    fn test_discover_exports_filters_by_extension() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.xml"), "<rss/>").unwrap();
        std::fs::write(dir.path().join("a.xml.bz2"), "").unwrap();
        std::fs::write(dir.path().join("readme.md"), "").unwrap();
        std::fs::create_dir(dir.path().join("nested.xml")).unwrap();

        let found = discover_exports(dir.path()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.xml.bz2", "b.xml"]);
    }

    #[test]
    fn test_requirements_from_summary() {
        let mut summary = XmlSummary::default();
        assert_eq!(summary.requirements(), Requirements::default());

        summary.tags.insert("rust".to_string());
        summary.approved_comment_count = 2;
        let req = summary.requirements();
        assert!(req.needs_taxonomy);
        assert!(req.needs_comments);
        assert!(!req.needs_users);
        assert!(!req.needs_media);
    }

    #[test]
    fn test_email_for_login() {
        let mut summary = XmlSummary::default();
        summary.authors.insert(
            "jane@example.com".to_string(),
            AuthorInfo {
                login: "jane".to_string(),
                display_name: "Jane".to_string(),
            },
        );
        assert_eq!(summary.email_for_login("jane"), Some("jane@example.com"));
        assert_eq!(summary.email_for_login("bob"), None);
    }
}
