//! Taxonomy phase

use std::collections::BTreeMap;

use super::coordinator::{ImportPipeline, ItemError, ItemOutcome};
use crate::store::TargetStore;
use crate::types::{EntityId, EntityKind, SENTINEL_ID};

/// Which WordPress taxonomy a term comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum TermKind {
    Category,
    Tag,
}

impl<S: TargetStore + ?Sized> ImportPipeline<'_, S> {
    pub(super) fn import_taxonomy(&mut self) {
        let summary = self.summary;
        for name in &summary.categories {
            let result = self.import_term(name, TermKind::Category);
            self.record(EntityKind::Term, result);
        }
        for name in &summary.tags {
            let result = self.import_term(name, TermKind::Tag);
            self.record(EntityKind::Term, result);
        }
    }

    pub(super) fn term_table(&self, kind: TermKind) -> &BTreeMap<String, EntityId> {
        match kind {
            TermKind::Category => &self.cache.terms_cat,
            TermKind::Tag => &self.cache.terms_tag,
        }
    }

    fn term_table_mut(&mut self, kind: TermKind) -> &mut BTreeMap<String, EntityId> {
        match kind {
            TermKind::Category => &mut self.cache.terms_cat,
            TermKind::Tag => &mut self.cache.terms_tag,
        }
    }

    fn import_term(&mut self, name: &str, kind: TermKind) -> Result<ItemOutcome, ItemError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(ItemOutcome::Skipped("empty term name"));
        }
        if let Some(&id) = self.term_table(kind).get(name) {
            return Ok(ItemOutcome::Mapped(id));
        }

        let config = self.config;
        let vocabulary = match kind {
            TermKind::Category => config.category_vocabulary.as_str(),
            TermKind::Tag => config.tag_vocabulary.as_str(),
        };
        let write_error = |e| ItemError::write(EntityKind::Term, format!("{}:{}", vocabulary, name), e);

        let outcome = match self.store.find_term(name, vocabulary).map_err(write_error)? {
            Some(id) => ItemOutcome::Mapped(id),
            None if config.dry_run => ItemOutcome::Created(SENTINEL_ID),
            None => ItemOutcome::Created(
                self.store
                    .create_term(name, vocabulary)
                    .map_err(write_error)?,
            ),
        };

        if let ItemOutcome::Created(id) | ItemOutcome::Mapped(id) = outcome {
            self.term_table_mut(kind).insert(name.to_string(), id);
        }
        Ok(outcome)
    }
}
