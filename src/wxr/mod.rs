//! WordPress eXtended RSS (WXR) export reading
//!
//! The export is never loaded as a whole. [`WxrReader`] streams the file and
//! materialises one channel-level element (`item`, `wp:author`, `link`) at a
//! time; [`scan`] builds an [`XmlSummary`] from a single pass, and the import
//! pipeline re-opens the file for each phase that needs item bodies.
//!
//! ```text
//!   export.xml(.bz2) ──► WxrReader ──► WxrEntry::{Link, Author, Item}
//!                                          │
//!                      ┌───────────────────┼───────────────────┐
//!                      ▼                   ▼                   ▼
//!                 scan() pass       content phase pass   comments phase pass
//!                 (XmlSummary)         (nodes)              (comments)
//! ```

pub mod item;
pub mod reader;
pub mod scanner;
pub mod source;

pub use item::{parse_wp_date, WxrAuthor, WxrComment, WxrItem, WxrTerm};
pub use reader::{WxrEntry, WxrReader, XmlNode};
pub use scanner::scan;
pub use source::{
    discover_exports, AttachmentInfo, AuthorInfo, Requirements, ScanError, WxrFormat, XmlSummary,
};
