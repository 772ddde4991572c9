//! Content transformation
//!
//! Pure functions over post markup. Nothing here touches the target store;
//! lookup tables (the media URL map, the old base URL) are passed in.

pub mod html;
pub mod media;
pub mod text;

pub use html::clean_content;
pub use media::{rewrite_media_urls, MediaUrlMap, RewriteResult};
pub use text::{extract_alias, generate_excerpt, html_to_text, EXCERPT_LENGTH, SUBJECT_LENGTH};
