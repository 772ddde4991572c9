//! Comments phase

use chrono::Utc;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::coordinator::{ImportPipeline, ItemError, ItemOutcome, PipelineError};
use super::progress::PhaseProgress;
use crate::store::{CommentAuthor, CommentRecord, TargetStore, TextValue};
use crate::transform::{generate_excerpt, SUBJECT_LENGTH};
use crate::types::{EntityId, EntityKind, WpId, SENTINEL_ID};
use crate::wxr::{WxrComment, WxrReader};

impl<S: TargetStore + ?Sized> ImportPipeline<'_, S> {
    /// Re-stream the export and attach approved post comments to imported nodes
    pub(super) fn import_comments(&mut self) -> Result<(), PipelineError> {
        let config = self.config;
        let Some(bundle) = config.bundle_for("post") else {
            return Ok(());
        };
        let Some(field_name) = self.store.find_comment_field(bundle)? else {
            warn!("Bundle '{}' has no comment field; skipping comments", bundle);
            return Ok(());
        };

        let mut progress = PhaseProgress::new(
            "Comments",
            Some(self.summary.approved_comment_count as u64),
            self.quiet,
        );

        // WordPress comment id -> id assigned in this pass, for threading
        let mut threaded: BTreeMap<WpId, EntityId> = BTreeMap::new();

        let mut reader = WxrReader::open(&self.source)?;
        for item in reader.items() {
            let item = item?;
            if item.post_type != "post" {
                continue;
            }

            let node_id = item.post_id.and_then(|wp| self.cache.nodes.get(&wp).copied());
            for comment in item.comments.iter().filter(|c| c.is_approved()) {
                progress.item(&comment.author);
                self.maybe_reset_store(progress.processed());

                let result = match node_id {
                    Some(node_id) => {
                        self.import_comment(comment, node_id, &field_name, &mut threaded)
                    }
                    None => Ok(ItemOutcome::Skipped("post not imported")),
                };
                self.record(EntityKind::Comment, result);
            }
        }

        progress.finish();
        Ok(())
    }

    fn import_comment(
        &mut self,
        comment: &WxrComment,
        node_id: EntityId,
        field_name: &str,
        threaded: &mut BTreeMap<WpId, EntityId>,
    ) -> Result<ItemOutcome, ItemError> {
        if let Some(&id) = self.cache.comments.get(&comment.id) {
            threaded.insert(comment.id, id);
            return Ok(ItemOutcome::Mapped(id));
        }

        // Only parents already seen in this pass; forward references stay unresolved
        let parent_id = match comment.parent {
            0 => None,
            parent => threaded.get(&parent).copied(),
        };
        if comment.parent != 0 && parent_id.is_none() {
            debug!(
                "Comment {} parent {} not imported yet; creating it unthreaded",
                comment.id, comment.parent
            );
        }

        let author = match self.cache.users.get(&comment.author_email) {
            Some(&id) => CommentAuthor::User(id),
            None => CommentAuthor::Anonymous {
                name: comment.author.clone(),
                email: comment.author_email.clone(),
                homepage: comment.author_url.clone(),
            },
        };

        let record = CommentRecord {
            node_id,
            field_name: field_name.to_string(),
            comment_type: self.config.comment_type.clone(),
            parent_id,
            subject: generate_excerpt(&comment.content, SUBJECT_LENGTH),
            body: TextValue {
                value: comment.content.trim().to_string(),
                format: self.config.comment_format.clone(),
            },
            author,
            created: comment.date.unwrap_or_else(Utc::now),
            published: true,
        };

        let id = if self.config.dry_run {
            SENTINEL_ID
        } else {
            self.store
                .create_comment(&record)
                .map_err(|e| ItemError::write(EntityKind::Comment, format!("comment {}", comment.id), e))?
        };

        self.cache.comments.insert(comment.id, id);
        threaded.insert(comment.id, id);
        Ok(ItemOutcome::Created(id))
    }
}
