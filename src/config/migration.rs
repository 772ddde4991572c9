//! Migration selections

use serde::{Deserialize, Serialize};

use crate::types::UserStrategy;

/// Operator-confirmed target selections. Fixed once a run starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Text format for node bodies and excerpts
    pub content_format: String,
    /// Text format for comment bodies
    pub comment_format: String,
    /// Destination bundle for posts; unset or empty skips posts
    pub post_bundle: Option<String>,
    /// Destination bundle for pages; unset or empty skips pages
    pub page_bundle: Option<String>,
    pub category_vocabulary: String,
    pub tag_vocabulary: String,
    pub comment_type: String,
    /// Import attachments as media entities
    pub import_media: bool,
    pub user_strategy: UserStrategy,
    /// Publish created nodes instead of leaving them as drafts
    pub auto_publish: bool,
    /// Simulate every write with a sentinel id
    pub dry_run: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            content_format: "basic_html".to_string(),
            comment_format: "basic_html".to_string(),
            post_bundle: Some("article".to_string()),
            page_bundle: Some("page".to_string()),
            category_vocabulary: "categories".to_string(),
            tag_vocabulary: "tags".to_string(),
            comment_type: "comment".to_string(),
            import_media: true,
            user_strategy: UserStrategy::MapToAdmin,
            auto_publish: false,
            dry_run: false,
        }
    }
}

impl MigrationConfig {
    /// Destination bundle for a WordPress post type
    pub fn bundle_for(&self, post_type: &str) -> Option<&str> {
        let bundle = match post_type {
            "post" => self.post_bundle.as_deref(),
            "page" => self.page_bundle.as_deref(),
            _ => None,
        };
        bundle.map(str::trim).filter(|b| !b.is_empty())
    }
}
