//! Content phase

use chrono::{DateTime, Utc};
use tracing::debug;

use super::coordinator::{ImportPipeline, ItemError, ItemOutcome, PipelineError};
use super::progress::PhaseProgress;
use super::taxonomy::TermKind;
use crate::store::{BundleInfo, ImageRef, NodeRecord, StoreError, TargetStore, TextValue};
use crate::transform::{
    clean_content, extract_alias, generate_excerpt, rewrite_media_urls, MediaUrlMap,
    EXCERPT_LENGTH,
};
use crate::types::{EntityId, EntityKind, WpId, ADMIN_ID, SENTINEL_ID};
use crate::wxr::{WxrItem, WxrReader};

/// Postmeta key pointing a post at its featured attachment
const THUMBNAIL_META_KEY: &str = "_thumbnail_id";

impl<S: TargetStore + ?Sized> ImportPipeline<'_, S> {
    /// Re-stream the export and create one node per published post or page
    pub(super) fn import_content(&mut self) -> Result<(), PipelineError> {
        let config = self.config;
        let expected = (self.summary.posts + self.summary.pages) as u64;
        let mut progress = PhaseProgress::new("Content", Some(expected), self.quiet);
        let media_map = self.cache.media_url_map();

        let mut reader = WxrReader::open(&self.source)?;
        for item in reader.items() {
            let item = item?;
            if !matches!(item.post_type.as_str(), "post" | "page") || !item.is_published() {
                continue;
            }
            let Some(bundle_id) = config.bundle_for(&item.post_type) else {
                continue;
            };

            progress.item(&item.title);
            self.maybe_reset_store(progress.processed());

            let result = self.import_node(&item, bundle_id, &media_map);
            if let Ok(ItemOutcome::Duplicate(id)) = &result {
                debug!("Post {:?} already imported as node {}", item.post_id, id);
            }
            self.record(EntityKind::Node, result);
        }

        progress.finish();
        Ok(())
    }

    fn import_node(
        &mut self,
        item: &WxrItem,
        bundle_id: &str,
        media_map: &MediaUrlMap,
    ) -> Result<ItemOutcome, ItemError> {
        let key = match item.post_id {
            Some(id) => format!("post {}", id),
            None => format!("post '{}'", item.title),
        };
        let write_error = |e| ItemError::write(EntityKind::Node, key.clone(), e);

        let environment = self.environment;
        let bundle = environment
            .bundle(bundle_id)
            .ok_or_else(|| write_error(StoreError::NotFound(format!("bundle '{}'", bundle_id))))?;

        if let Some(&id) = item.post_id.and_then(|wp| self.cache.nodes.get(&wp)) {
            return Ok(ItemOutcome::Duplicate(id));
        }

        let title = item.title.trim();
        let created = item.created.unwrap_or_else(Utc::now);
        if let Some(id) = self
            .store
            .find_existing_node(bundle_id, title, created)
            .map_err(write_error)?
        {
            self.remember_node(item.post_id, id);
            return Ok(ItemOutcome::Duplicate(id));
        }

        let record = self.build_node(item, bundle, created, media_map);

        let id = if self.config.dry_run {
            SENTINEL_ID
        } else {
            self.store.create_node(&record).map_err(write_error)?
        };
        self.remember_node(item.post_id, id);
        debug!("Created {} node {} for {}", bundle_id, id, key);
        Ok(ItemOutcome::Created(id))
    }

    fn remember_node(&mut self, post_id: Option<WpId>, id: EntityId) {
        if let Some(wp) = post_id {
            self.cache.nodes.insert(wp, id);
        }
    }

    fn build_node(
        &mut self,
        item: &WxrItem,
        bundle: &BundleInfo,
        created: DateTime<Utc>,
        media_map: &MediaUrlMap,
    ) -> NodeRecord {
        let is_post = item.post_type == "post";

        let author_id = self
            .summary
            .email_for_login(&item.creator)
            .and_then(|email| self.cache.users.get(email))
            .copied()
            .unwrap_or(ADMIN_ID);

        let rewritten = rewrite_media_urls(
            &clean_content(&item.content),
            media_map,
            &self.summary.base_url,
        );
        self.stats.urls_replaced += rewritten.replaced;
        self.stats.domain_urls_replaced += rewritten.domain_replaced;
        let body = rewritten.html;

        let excerpt = bundle.fields.excerpt.as_ref().map(|field| {
            let value = match item.explicit_excerpt() {
                Some(text) => text.to_string(),
                None => generate_excerpt(&body, EXCERPT_LENGTH),
            };
            (
                field.clone(),
                TextValue {
                    value,
                    format: self.config.content_format.clone(),
                },
            )
        });

        let alias = extract_alias(&item.link);
        if alias.is_some() {
            self.stats.aliases_preserved += 1;
        }

        let (category_ids, tag_ids, image) = if is_post {
            (
                self.term_ids(item, "category", TermKind::Category),
                self.term_ids(item, "post_tag", TermKind::Tag),
                self.featured_image(item, bundle),
            )
        } else {
            (Vec::new(), Vec::new(), None)
        };

        NodeRecord {
            bundle: bundle.id.clone(),
            title: item.title.trim().to_string(),
            author_id,
            created,
            changed: item.modified.unwrap_or(created),
            body_field: bundle.fields.body.clone().unwrap_or_else(|| "body".to_string()),
            body: TextValue {
                value: body,
                format: self.config.content_format.clone(),
            },
            excerpt,
            alias,
            published: self.config.auto_publish,
            category_ids,
            tag_ids,
            image,
        }
    }

    /// Mapped term ids for one taxonomy domain; unmapped names are dropped
    fn term_ids(&self, item: &WxrItem, domain: &str, kind: TermKind) -> Vec<EntityId> {
        let table = self.term_table(kind);
        let mut ids: Vec<EntityId> = item
            .term_names(domain)
            .filter_map(|name| table.get(name.trim()).copied())
            .collect();
        ids.dedup();
        ids
    }

    /// `_thumbnail_id` -> attachment URL -> imported media. Never resolved under dry run.
    fn featured_image(&self, item: &WxrItem, bundle: &BundleInfo) -> Option<ImageRef> {
        if self.config.dry_run {
            return None;
        }
        let field = bundle.fields.image.as_ref()?;
        let attachment_id: WpId = item.meta(THUMBNAIL_META_KEY)?.trim().parse().ok()?;
        let attachment = self.summary.attachments.get(&attachment_id)?;
        let media = self.cache.media.get(&attachment.url)?;

        Some(ImageRef {
            field: field.clone(),
            media_id: media.target_id,
            alt: media.alt.clone(),
        })
    }
}
