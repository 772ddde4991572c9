//! Run statistics

use serde::Serialize;
use std::time::Duration;
use tracing::info;

use super::coordinator::{ItemError, ItemOutcome};
use crate::types::EntityKind;

/// Outcome counters for one entity kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EntityStats {
    /// Written to the target store (or simulated under dry run)
    pub created: usize,
    /// Resolved to an existing entity without writing
    pub mapped: usize,
    /// Already imported by an earlier pass
    pub duplicates: usize,
    /// Deliberately not imported
    pub skipped: usize,
    /// Per-item failures
    pub failed: usize,
}

impl EntityStats {
    pub fn total(&self) -> usize {
        self.created + self.mapped + self.duplicates + self.skipped + self.failed
    }
}

/// Counters accumulated over one run. Reported, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub users: EntityStats,
    pub media: EntityStats,
    pub terms: EntityStats,
    pub nodes: EntityStats,
    pub comments: EntityStats,
    /// Media URL occurrences rewritten in bodies
    pub urls_replaced: usize,
    /// Old-site links made domain-relative
    pub domain_urls_replaced: usize,
    /// Nodes created with their WordPress path
    pub aliases_preserved: usize,
}

impl Stats {
    pub fn entity(&self, kind: EntityKind) -> &EntityStats {
        match kind {
            EntityKind::User => &self.users,
            EntityKind::Media => &self.media,
            EntityKind::Term => &self.terms,
            EntityKind::Node => &self.nodes,
            EntityKind::Comment => &self.comments,
        }
    }

    pub fn entity_mut(&mut self, kind: EntityKind) -> &mut EntityStats {
        match kind {
            EntityKind::User => &mut self.users,
            EntityKind::Media => &mut self.media,
            EntityKind::Term => &mut self.terms,
            EntityKind::Node => &mut self.nodes,
            EntityKind::Comment => &mut self.comments,
        }
    }

    /// Count one item's outcome
    pub fn record(&mut self, kind: EntityKind, result: &Result<ItemOutcome, ItemError>) {
        let counters = self.entity_mut(kind);
        match result {
            Ok(ItemOutcome::Created(_)) => counters.created += 1,
            Ok(ItemOutcome::Mapped(_)) => counters.mapped += 1,
            Ok(ItemOutcome::Duplicate(_)) => counters.duplicates += 1,
            Ok(ItemOutcome::Skipped(_)) => counters.skipped += 1,
            Err(_) => counters.failed += 1,
        }
    }

    pub fn total_failed(&self) -> usize {
        self.kinds().map(|(_, s)| s.failed).sum()
    }

    fn kinds(&self) -> impl Iterator<Item = (EntityKind, &EntityStats)> {
        [
            EntityKind::User,
            EntityKind::Media,
            EntityKind::Term,
            EntityKind::Node,
            EntityKind::Comment,
        ]
        .into_iter()
        .map(move |kind| (kind, self.entity(kind)))
    }

    /// Write the final statistics to the log
    pub fn log_summary(&self, elapsed: Duration) {
        for (kind, s) in self.kinds() {
            info!(
                "{}: {} created, {} mapped, {} duplicates, {} skipped, {} failed",
                kind, s.created, s.mapped, s.duplicates, s.skipped, s.failed
            );
        }
        info!(
            "URLs replaced: {}, domain links made relative: {}, aliases preserved: {}",
            self.urls_replaced, self.domain_urls_replaced, self.aliases_preserved
        );
        info!("Finished in {:.1}s", elapsed.as_secs_f64());
    }

    /// Print summary to console
    pub fn print_summary(&self, elapsed: Duration) {
        println!("\nMigration Summary");
        println!("=================");
        println!(
            "{:<10} {:>8} {:>8} {:>10} {:>8} {:>8}",
            "", "created", "mapped", "duplicate", "skipped", "failed"
        );
        for (kind, s) in self.kinds() {
            println!(
                "{:<10} {:>8} {:>8} {:>10} {:>8} {:>8}",
                kind.as_str(),
                s.created,
                s.mapped,
                s.duplicates,
                s.skipped,
                s.failed
            );
        }
        println!();
        println!("Media URLs replaced:   {}", self.urls_replaced);
        println!("Domain links relative: {}", self.domain_urls_replaced);
        println!("Aliases preserved:     {}", self.aliases_preserved);
        println!("Elapsed time:          {:.1}s", elapsed.as_secs_f64());
    }
}
