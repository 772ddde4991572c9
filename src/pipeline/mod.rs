//! Ordered, idempotent import pipeline
//!
//! ```text
//!   Users ──► Media ──► Taxonomy ──► Content ──► Comments ──► Finalize
//!     │         │           │           │            │            │
//!     └─────────┴───────────┴─── MappingCache ───────┘      save (live only)
//! ```
//!
//! Each phase consults the mapping cache before touching the target store
//! and records what it created, so a re-run resolves instead of duplicating.
//! Content and comments re-stream the export rather than holding items in
//! memory. Under dry run every write is replaced by a sentinel id; lookups
//! still happen and the statistics come out the same as a live run.

pub mod comments;
pub mod content;
pub mod coordinator;
pub mod media;
pub mod progress;
pub mod stats;
pub mod taxonomy;
pub mod users;

pub use coordinator::{
    ImportPipeline, ItemError, ItemOutcome, Phase, PipelineError, RunOutcome,
};
pub use media::{is_same_domain, resolve_alt};
pub use progress::PhaseProgress;
pub use stats::{EntityStats, Stats};
