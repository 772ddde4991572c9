//! Import pipeline state machine

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

use super::stats::Stats;
use crate::cache::{CacheError, MappingCache};
use crate::config::MigrationConfig;
use crate::store::{FetchError, StoreError, TargetEnvironment, TargetStore, ValidationError};
use crate::types::{EntityId, EntityKind};
use crate::wxr::{Requirements, ScanError, XmlSummary};

/// Long phases ask the store to drop its result cache this often
pub(super) const STORE_RESET_INTERVAL: u64 = 50;

/// Failures that abort a run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to read export: {0}")]
    Scan(#[from] ScanError),

    #[error("Target store error: {0}")]
    Store(#[from] StoreError),

    #[error("Mapping cache error: {0}")]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// A per-item failure; logged and counted, never propagated out of a phase
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("failed to fetch {key}: {source}")]
    ResourceFetch {
        key: String,
        #[source]
        source: FetchError,
    },

    #[error("failed to write {kind} {key}: {source}")]
    EntityWrite {
        kind: EntityKind,
        key: String,
        #[source]
        source: StoreError,
    },
}

impl ItemError {
    pub(super) fn write(kind: EntityKind, key: impl Into<String>, source: StoreError) -> Self {
        Self::EntityWrite {
            kind,
            key: key.into(),
            source,
        }
    }
}

/// What happened to one source item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// A new entity was written (a sentinel id under dry run)
    Created(EntityId),
    /// An existing entity was reused
    Mapped(EntityId),
    /// Already imported by an earlier pass; nothing was written
    Duplicate(EntityId),
    /// Deliberately not imported
    Skipped(&'static str),
}

/// Ordered import phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Users,
    Media,
    Taxonomy,
    Content,
    Comments,
    Finalize,
}

impl Phase {
    /// Execution order; later phases read mappings written by earlier ones
    pub const ALL: [Phase; 6] = [
        Phase::Users,
        Phase::Media,
        Phase::Taxonomy,
        Phase::Content,
        Phase::Comments,
        Phase::Finalize,
    ];

    /// Needed phases, in execution order
    pub fn plan(summary: &XmlSummary, config: &MigrationConfig) -> Vec<Phase> {
        Self::ALL
            .into_iter()
            .filter(|phase| phase.is_needed(summary, config))
            .collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Media => "media",
            Self::Taxonomy => "taxonomy",
            Self::Content => "content",
            Self::Comments => "comments",
            Self::Finalize => "finalize",
        }
    }

    /// Whether this phase has anything to do for the export and selections
    pub fn is_needed(&self, summary: &XmlSummary, config: &MigrationConfig) -> bool {
        let requirements = Requirements::from_summary(summary);
        match self {
            Self::Users => requirements.needs_users,
            Self::Media => requirements.needs_media && config.import_media,
            Self::Taxonomy => requirements.needs_taxonomy,
            Self::Content => {
                (summary.posts > 0 && config.bundle_for("post").is_some())
                    || (summary.pages > 0 && config.bundle_for("page").is_some())
            }
            Self::Comments => requirements.needs_comments && config.bundle_for("post").is_some(),
            Self::Finalize => true,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a run requested by the operator ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(Stats),
    /// The operator declined; nothing was written
    Aborted,
}

/// Drives the ordered import of one export into a target store.
///
/// The summary, environment and selections are borrowed and never change
/// during a run; the mapping cache and the statistics are owned here.
pub struct ImportPipeline<'a, S: TargetStore + ?Sized> {
    pub(super) store: &'a mut S,
    pub(super) source: PathBuf,
    pub(super) summary: &'a XmlSummary,
    pub(super) environment: &'a TargetEnvironment,
    pub(super) config: &'a MigrationConfig,
    pub(super) cache: MappingCache,
    cache_path: Option<PathBuf>,
    pub(super) stats: Stats,
    pub(super) quiet: bool,
}

impl<'a, S: TargetStore + ?Sized> ImportPipeline<'a, S> {
    pub fn new(
        store: &'a mut S,
        source: impl AsRef<Path>,
        summary: &'a XmlSummary,
        environment: &'a TargetEnvironment,
        config: &'a MigrationConfig,
    ) -> Self {
        Self {
            store,
            source: source.as_ref().to_path_buf(),
            summary,
            environment,
            config,
            cache: MappingCache::new(),
            cache_path: None,
            stats: Stats::default(),
            quiet: false,
        }
    }

    /// Start from an in-memory cache (persisted state already merged in)
    pub fn with_cache(mut self, cache: MappingCache) -> Self {
        self.cache.merge(cache);
        self
    }

    /// Load and merge the cache file at `path`; it is rewritten there on completion
    pub fn with_cache_file(mut self, path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref().to_path_buf();
        let persisted = MappingCache::load(&path)?;
        self.cache.merge(persisted);
        self.cache_path = Some(path);
        Ok(self)
    }

    /// Set quiet mode (no progress output)
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn into_cache(self) -> MappingCache {
        self.cache
    }

    /// Phases that will run, in order
    pub fn plan(&self) -> Vec<Phase> {
        Phase::plan(self.summary, self.config)
    }

    /// Run every needed phase in order and return the statistics
    pub fn run(&mut self) -> Result<Stats, PipelineError> {
        let start = Instant::now();
        self.stats = Stats::default();

        info!(
            "Starting migration of {}{}",
            self.source.display(),
            if self.config.dry_run { " (dry run)" } else { "" }
        );

        for phase in Phase::ALL {
            if !phase.is_needed(self.summary, self.config) {
                info!("Skipping {} phase: nothing to import", phase);
                continue;
            }

            info!("Starting {} phase", phase);
            match phase {
                Phase::Users => self.import_users(),
                Phase::Media => self.import_media(),
                Phase::Taxonomy => self.import_taxonomy(),
                Phase::Content => self.import_content()?,
                Phase::Comments => self.import_comments()?,
                Phase::Finalize => self.finalize()?,
            }
        }

        self.stats.log_summary(start.elapsed());
        Ok(self.stats.clone())
    }

    fn finalize(&mut self) -> Result<(), PipelineError> {
        if self.config.dry_run {
            info!("Dry run: mapping cache not saved");
            return Ok(());
        }
        // The cache must never reference entities the store has not kept
        self.store.flush()?;
        if let Some(path) = &self.cache_path {
            self.cache.save(path)?;
        }
        Ok(())
    }

    /// Count an item outcome, logging failures with their context
    pub(super) fn record(&mut self, kind: EntityKind, result: Result<ItemOutcome, ItemError>) {
        if let Err(e) = &result {
            warn!("{}", e);
        }
        self.stats.record(kind, &result);
    }

    /// Periodic hint to the store on long phases
    pub(super) fn maybe_reset_store(&mut self, processed: u64) {
        if processed > 0 && processed % STORE_RESET_INTERVAL == 0 {
            self.store.reset_cache();
        }
    }
}
