//! wpmigrate: WordPress export migration engine
//!
//! Moves the content of a WordPress eXtended RSS (WXR) export into a target
//! content store:
//! - Streaming export scan with bounded memory (plain or bzip2)
//! - Content cleanup, media URL rewriting, excerpts and path aliases
//! - Durable id mapping so repeated runs resume instead of duplicating
//! - Ordered import of users, media, taxonomy, content and comments
//! - Dry runs that exercise every phase without writing

pub mod cache;
pub mod config;
pub mod pipeline;
pub mod store;
pub mod transform;
pub mod types;
pub mod util;
pub mod wxr;

pub use config::Config;
pub use types::*;
