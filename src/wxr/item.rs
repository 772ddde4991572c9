//! Typed views of materialised export elements

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::reader::XmlNode;
use crate::types::WpId;

/// Date format used by `wp:post_date` and `wp:comment_date`
const WP_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse an export timestamp, preferring the GMT variant.
///
/// WordPress writes `0000-00-00 00:00:00` for unset GMT dates (drafts,
/// scheduled posts); those fail to parse and fall through to the local value.
pub fn parse_wp_date(gmt: Option<&str>, local: Option<&str>) -> Option<DateTime<Utc>> {
    [gmt, local]
        .into_iter()
        .flatten()
        .find_map(|value| NaiveDateTime::parse_from_str(value.trim(), WP_DATE_FORMAT).ok())
        .map(|naive| naive.and_utc())
}

/// An author declared at channel level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WxrAuthor {
    pub email: String,
    pub login: String,
    pub display_name: String,
}

impl WxrAuthor {
    /// Build from a `wp:author` node; authors without an email cannot be keyed and are dropped
    pub fn from_node(node: &XmlNode) -> Option<Self> {
        let email = node.child_text("wp:author_email")?.to_string();
        let local_part = email.split('@').next().unwrap_or(&email).to_string();
        let login = node
            .child_text("wp:author_login")
            .map(str::to_string)
            .unwrap_or(local_part);
        let display_name = node
            .child_text("wp:author_display_name")
            .map(str::to_string)
            .unwrap_or_else(|| login.clone());

        Some(Self {
            email,
            login,
            display_name,
        })
    }
}

/// A taxonomy reference on an item (`<category domain="...">`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WxrTerm {
    /// `category` or `post_tag` (other taxonomies pass through unused)
    pub domain: String,
    pub name: String,
}

/// A comment nested in an item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WxrComment {
    pub id: WpId,
    pub author: String,
    pub author_email: String,
    pub author_url: String,
    pub date: Option<DateTime<Utc>>,
    pub content: String,
    /// Raw `wp:comment_approved` value (`1`, `0`, `spam`, `trash`)
    pub approved: String,
    /// WordPress id of the parent comment, 0 for top level
    pub parent: WpId,
}

impl WxrComment {
    fn from_node(node: &XmlNode) -> Option<Self> {
        let id = node.child_text("wp:comment_id")?.parse().ok()?;
        let text = |name: &str| node.child_text(name).unwrap_or_default().to_string();

        Some(Self {
            id,
            author: text("wp:comment_author"),
            author_email: text("wp:comment_author_email"),
            author_url: text("wp:comment_author_url"),
            date: parse_wp_date(
                node.child_text("wp:comment_date_gmt"),
                node.child_text("wp:comment_date"),
            ),
            content: node
                .child_raw("wp:comment_content")
                .unwrap_or_default()
                .trim()
                .to_string(),
            approved: text("wp:comment_approved"),
            parent: node
                .child_text("wp:comment_parent")
                .and_then(|p| p.parse().ok())
                .unwrap_or(0),
        })
    }

    pub fn is_approved(&self) -> bool {
        self.approved == "1"
    }
}

/// A post, page, attachment or other `item`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WxrItem {
    pub title: String,
    pub link: String,
    /// Author login (`dc:creator`)
    pub creator: String,
    pub description: String,
    /// Raw `content:encoded` markup
    pub content: String,
    /// Raw `excerpt:encoded` markup
    pub excerpt: String,
    pub post_id: Option<WpId>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub post_name: String,
    pub status: String,
    pub post_type: String,
    pub attachment_url: Option<String>,
    pub terms: Vec<WxrTerm>,
    /// `wp:postmeta` pairs in document order
    pub postmeta: Vec<(String, String)>,
    pub comments: Vec<WxrComment>,
}

impl WxrItem {
    pub fn from_node(node: &XmlNode) -> Self {
        let text = |name: &str| node.child_text(name).unwrap_or_default().to_string();
        let raw = |name: &str| node.child_raw(name).unwrap_or_default().to_string();

        let terms = node
            .children_named("category")
            .filter_map(|c| {
                let name = c.text.trim();
                if name.is_empty() {
                    return None;
                }
                Some(WxrTerm {
                    domain: c.attr("domain").unwrap_or("category").to_string(),
                    name: name.to_string(),
                })
            })
            .collect();

        let postmeta = node
            .children_named("wp:postmeta")
            .filter_map(|m| {
                let key = m.child_text("wp:meta_key")?;
                let value = m.child_raw("wp:meta_value").unwrap_or_default().trim();
                Some((key.to_string(), value.to_string()))
            })
            .collect();

        let comments = node
            .children_named("wp:comment")
            .filter_map(WxrComment::from_node)
            .collect();

        Self {
            title: text("title"),
            link: text("link"),
            creator: text("dc:creator"),
            description: text("description"),
            content: raw("content:encoded"),
            excerpt: raw("excerpt:encoded"),
            post_id: node.child_text("wp:post_id").and_then(|v| v.parse().ok()),
            created: parse_wp_date(
                node.child_text("wp:post_date_gmt"),
                node.child_text("wp:post_date"),
            ),
            modified: parse_wp_date(
                node.child_text("wp:post_modified_gmt"),
                node.child_text("wp:post_modified"),
            ),
            post_name: text("wp:post_name"),
            status: text("wp:status"),
            post_type: text("wp:post_type"),
            attachment_url: node.child_text("wp:attachment_url").map(str::to_string),
            terms,
            postmeta,
            comments,
        }
    }

    /// First postmeta value for a key
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.postmeta
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Whether the scanner counts this item at all
    pub fn is_counted(&self) -> bool {
        matches!(self.status.as_str(), "publish" | "inherit")
    }

    pub fn is_published(&self) -> bool {
        self.status == "publish"
    }

    /// Term names for one taxonomy domain
    pub fn term_names<'a>(&'a self, domain: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.terms
            .iter()
            .filter(move |t| t.domain == domain)
            .map(|t| t.name.as_str())
    }

    /// The item's own excerpt: `excerpt:encoded`, else `description`
    pub fn explicit_excerpt(&self) -> Option<&str> {
        [self.excerpt.trim(), self.description.trim()]
            .into_iter()
            .find(|s| !s.is_empty())
    }
}
