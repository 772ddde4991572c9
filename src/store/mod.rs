//! Target store boundary
//!
//! The pipeline never talks to a concrete content store. Everything it needs
//! (catalog introspection, natural-key lookups, entity creation, file
//! storage) goes through the [`TargetStore`] trait. [`LocalStore`] is a
//! reference implementation backed by a JSON snapshot.

pub mod environment;
pub mod fetcher;
pub mod local;

pub use environment::{TargetEnvironment, ValidationError};
pub use fetcher::{FetchError, Fetcher, HttpFetcher};
pub use local::LocalStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::EntityId;
use crate::util::extension_of;

/// Errors reported by a target store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rejected by target store: {0}")]
    Rejected(String),

    #[error("File fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A named entry in one of the store's catalogs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub label: String,
}

impl CatalogEntry {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// Field names a bundle uses for each logical slot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedFields {
    pub body: Option<String>,
    pub excerpt: Option<String>,
    pub image: Option<String>,
    pub comment: Option<String>,
}

impl DetectedFields {
    /// Candidate field names per slot, most preferred first
    pub const BODY: &'static [&'static str] = &["body", "field_body", "field_content"];
    pub const EXCERPT: &'static [&'static str] = &["field_excerpt", "field_summary", "field_teaser"];
    pub const IMAGE: &'static [&'static str] = &[
        "field_image",
        "field_featured_image",
        "field_media_image",
        "field_thumbnail",
    ];
    pub const COMMENT: &'static [&'static str] = &["comment", "field_comments", "field_comment"];

    /// Resolve slots from a bundle's field names, once, at introspection time
    pub fn detect<S: AsRef<str>>(field_names: &[S]) -> Self {
        let pick = |candidates: &[&str]| {
            candidates
                .iter()
                .find(|c| field_names.iter().any(|f| f.as_ref() == **c))
                .map(|c| c.to_string())
        };

        Self {
            body: pick(Self::BODY),
            excerpt: pick(Self::EXCERPT),
            image: pick(Self::IMAGE),
            comment: pick(Self::COMMENT),
        }
    }

    /// A bundle can hold posts only if it has a body field
    pub fn is_content_capable(&self) -> bool {
        self.body.is_some()
    }
}

/// A content bundle and its detected fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleInfo {
    pub id: String,
    pub label: String,
    pub fields: DetectedFields,
}

/// Natural keys a user can be found by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserLookup<'a> {
    Email(&'a str),
    Name(&'a str),
}

/// Reference to a file the store has saved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub file_id: EntityId,
    pub uri: String,
    /// Public URL the file is served from
    pub url: String,
    pub filename: String,
    pub size: u64,
}

/// Target media bundle chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaRule {
    pub extensions: &'static [&'static str],
    pub bundle: &'static str,
    /// Source field holding the file
    pub field: &'static str,
}

/// Evaluated in order; the first rule listing the extension wins
pub const MEDIA_RULES: &[MediaRule] = &[
    MediaRule {
        extensions: &[
            "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "ods", "txt", "csv", "zip",
        ],
        bundle: "document",
        field: "field_media_document",
    },
    MediaRule {
        extensions: &["mp4", "m4v", "mov", "webm", "ogv", "avi"],
        bundle: "video",
        field: "field_media_video_file",
    },
    MediaRule {
        extensions: &["mp3", "m4a", "wav", "ogg", "oga", "flac"],
        bundle: "audio",
        field: "field_media_audio_file",
    },
];

/// Used when no rule matches
pub const IMAGE_RULE: MediaRule = MediaRule {
    extensions: &[],
    bundle: "image",
    field: "field_media_image",
};

/// Pick the media bundle for a file URL
pub fn media_rule_for(url: &str) -> &'static MediaRule {
    let Some(ext) = extension_of(url) else {
        return &IMAGE_RULE;
    };
    MEDIA_RULES
        .iter()
        .find(|rule| rule.extensions.contains(&ext.as_str()))
        .unwrap_or(&IMAGE_RULE)
}

/// Formatted text value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextValue {
    pub value: String,
    pub format: String,
}

/// Image reference on a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub field: String,
    pub media_id: EntityId,
    pub alt: String,
}

/// A node ready to be written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub bundle: String,
    pub title: String,
    pub author_id: EntityId,
    pub created: DateTime<Utc>,
    pub changed: DateTime<Utc>,
    /// Body field name and value
    pub body_field: String,
    pub body: TextValue,
    /// Excerpt field name and value, when the bundle has one
    pub excerpt: Option<(String, TextValue)>,
    pub alias: Option<String>,
    pub published: bool,
    pub category_ids: Vec<EntityId>,
    pub tag_ids: Vec<EntityId>,
    pub image: Option<ImageRef>,
}

/// Who wrote a comment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommentAuthor {
    User(EntityId),
    Anonymous {
        name: String,
        email: String,
        homepage: String,
    },
}

/// A comment ready to be written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub node_id: EntityId,
    pub field_name: String,
    pub comment_type: String,
    pub parent_id: Option<EntityId>,
    pub subject: String,
    pub body: TextValue,
    pub author: CommentAuthor,
    pub created: DateTime<Utc>,
    pub published: bool,
}

/// Capability the pipeline queries and writes through.
///
/// Lookups take `&self`; anything that writes takes `&mut self`.
pub trait TargetStore {
    fn list_bundles(&self) -> Result<Vec<BundleInfo>, StoreError>;

    fn list_vocabularies(&self) -> Result<Vec<CatalogEntry>, StoreError>;

    fn list_text_formats(&self) -> Result<Vec<CatalogEntry>, StoreError>;

    fn list_comment_types(&self) -> Result<Vec<CatalogEntry>, StoreError>;

    fn find_user(&self, key: UserLookup<'_>) -> Result<Option<EntityId>, StoreError>;

    fn create_user(&mut self, name: &str, email: &str) -> Result<EntityId, StoreError>;

    fn find_term(&self, name: &str, vocabulary: &str) -> Result<Option<EntityId>, StoreError>;

    fn create_term(&mut self, name: &str, vocabulary: &str) -> Result<EntityId, StoreError>;

    /// Download a file and store it; a failed or timed-out fetch is an error for that file only
    fn fetch_and_store_file(&mut self, url: &str) -> Result<FileRef, FetchError>;

    /// Existing media entity that already references this stored file
    fn find_media(&self, file: &FileRef) -> Result<Option<EntityId>, StoreError>;

    fn create_media(
        &mut self,
        file: &FileRef,
        rule: &MediaRule,
        alt: &str,
    ) -> Result<EntityId, StoreError>;

    fn find_existing_node(
        &self,
        bundle: &str,
        title: &str,
        created: DateTime<Utc>,
    ) -> Result<Option<EntityId>, StoreError>;

    fn create_node(&mut self, record: &NodeRecord) -> Result<EntityId, StoreError>;

    fn create_comment(&mut self, record: &CommentRecord) -> Result<EntityId, StoreError>;

    /// Comment-capable field on a bundle, if any
    fn find_comment_field(&self, bundle: &str) -> Result<Option<String>, StoreError>;

    /// Drop any result caching the store keeps; called periodically on long phases
    fn reset_cache(&mut self) {}

    /// Make every write so far durable; called before the mapping cache is saved
    fn flush(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_fields_priority() {
        let fields = DetectedFields::detect(&[
            "field_content",
            "body",
            "field_summary",
            "field_thumbnail",
            "field_image",
        ]);
        assert_eq!(fields.body.as_deref(), Some("body"));
        assert_eq!(fields.excerpt.as_deref(), Some("field_summary"));
        assert_eq!(fields.image.as_deref(), Some("field_image"));
        assert_eq!(fields.comment, None);
        assert!(fields.is_content_capable());
    }

    #[test]
    fn test_detect_fields_empty() {
        let fields = DetectedFields::detect::<&str>(&[]);
        assert_eq!(fields, DetectedFields::default());
        assert!(!fields.is_content_capable());
    }

    #[test]
    fn test_media_rule_for_extension() {
        assert_eq!(media_rule_for("https://x/a/report.PDF").bundle, "document");
        assert_eq!(media_rule_for("https://x/a/clip.mp4").bundle, "video");
        assert_eq!(media_rule_for("https://x/a/song.mp3").bundle, "audio");
        assert_eq!(media_rule_for("https://x/a/photo.jpeg").bundle, "image");
        assert_eq!(media_rule_for("https://x/a/unknown.xyz").bundle, "image");
        assert_eq!(media_rule_for("https://x/a/noext").bundle, "image");
    }
}
