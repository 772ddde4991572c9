//! Entity mapping cache
//!
//! Durable WordPress-key -> target-id tables that make repeated runs
//! idempotent. Loaded (and merged) at the start of a run, rewritten in full
//! at the end of a live run, and archived when the operator starts fresh.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::transform::MediaUrlMap;
use crate::types::{EntityId, WpId};

/// Errors that can occur reading or writing the cache file
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Archive destination already exists: {0}")]
    ArchiveExists(PathBuf),
}

/// Where an imported attachment ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaMapping {
    pub target_id: EntityId,
    pub target_url: String,
    pub alt: String,
}

/// The six mapping tables
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingCache {
    /// Author email -> user id
    #[serde(default)]
    pub users: BTreeMap<String, EntityId>,
    /// Source URL -> media entity
    #[serde(default)]
    pub media: BTreeMap<String, MediaMapping>,
    /// Category name -> term id
    #[serde(default)]
    pub terms_cat: BTreeMap<String, EntityId>,
    /// Tag name -> term id
    #[serde(default)]
    pub terms_tag: BTreeMap<String, EntityId>,
    /// WordPress post id -> node id
    #[serde(default)]
    pub nodes: BTreeMap<WpId, EntityId>,
    /// WordPress comment id -> comment id
    #[serde(default)]
    pub comments: BTreeMap<WpId, EntityId>,
}

/// Row counts per table, for status output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableSizes {
    pub users: usize,
    pub media: usize,
    pub terms_cat: usize,
    pub terms_tag: usize,
    pub nodes: usize,
    pub comments: usize,
}

/// On-disk envelope
#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    saved_at: DateTime<Utc>,
    tables: MappingCache,
}

impl MappingCache {
    const CURRENT_VERSION: u32 = 1;

    pub fn new() -> Self {
        Self::default()
    }

    /// Load a persisted cache; a missing file yields an empty cache
    pub fn load(path: &Path) -> Result<Self, CacheError> {
        let mut cache = Self::default();

        if !path.exists() {
            return Ok(cache);
        }

        let data = fs::read_to_string(path)?;
        let file: CacheFile = serde_json::from_str(&data)?;

        if file.version > Self::CURRENT_VERSION {
            warn!(
                "Mapping cache version {} is newer than supported {}",
                file.version,
                Self::CURRENT_VERSION
            );
        }

        cache.merge(file.tables);
        info!(
            "Loaded mapping cache from {} (saved {})",
            path.display(),
            file.saved_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        Ok(cache)
    }

    /// Union `other` into this cache, `other` winning on key collisions
    pub fn merge(&mut self, other: MappingCache) {
        self.users.extend(other.users);
        self.media.extend(other.media);
        self.terms_cat.extend(other.terms_cat);
        self.terms_tag.extend(other.terms_tag);
        self.nodes.extend(other.nodes);
        self.comments.extend(other.comments);
    }

    /// Rewrite the cache file in full (temp file + rename)
    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = CacheFile {
            version: Self::CURRENT_VERSION,
            saved_at: Utc::now(),
            tables: self.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        let temp_path = path.with_extension("tmp");
        let mut out = File::create(&temp_path)?;
        out.write_all(json.as_bytes())?;
        out.sync_all()?;
        fs::rename(&temp_path, path)?;

        info!("Saved mapping cache to {}", path.display());
        Ok(())
    }

    /// Target URL for every imported attachment, keyed by source URL
    pub fn media_url_map(&self) -> MediaUrlMap {
        self.media
            .iter()
            .map(|(source, m)| (source.clone(), m.target_url.clone()))
            .collect()
    }

    pub fn table_sizes(&self) -> TableSizes {
        TableSizes {
            users: self.users.len(),
            media: self.media.len(),
            terms_cat: self.terms_cat.len(),
            terms_tag: self.terms_tag.len(),
            nodes: self.nodes.len(),
            comments: self.comments.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.table_sizes() == TableSizes::default()
    }
}

/// Move a cache file aside. Returns `false` if there was nothing to archive.
pub fn archive(path: &Path, destination: &Path) -> Result<bool, CacheError> {
    if !path.exists() {
        return Ok(false);
    }
    if destination.exists() {
        return Err(CacheError::ArchiveExists(destination.to_path_buf()));
    }
    fs::rename(path, destination)?;
    info!(
        "Archived mapping cache {} -> {}",
        path.display(),
        destination.display()
    );
    Ok(true)
}
