//! Media phase

use tracing::debug;
use url::Url;

use super::coordinator::{ImportPipeline, ItemError, ItemOutcome};
use super::progress::PhaseProgress;
use crate::cache::MediaMapping;
use crate::store::{media_rule_for, TargetStore};
use crate::types::{EntityKind, SENTINEL_ID};
use crate::util::file_stem_of;
use crate::wxr::AttachmentInfo;

/// Alt text: explicit alt, else title, else the file name without extension
pub fn resolve_alt(attachment: &AttachmentInfo) -> String {
    [attachment.alt.trim(), attachment.title.trim()]
        .into_iter()
        .find(|s| !s.is_empty())
        .unwrap_or_else(|| file_stem_of(&attachment.url))
        .to_string()
}

/// Whether `url` is served from the export's own host
pub fn is_same_domain(url: &str, domain: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.eq_ignore_ascii_case(domain)))
        .unwrap_or(false)
}

/// Stand-in target URL under dry run: the source path, domain-relative
fn dry_run_url(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string())
}

impl<S: TargetStore + ?Sized> ImportPipeline<'_, S> {
    pub(super) fn import_media(&mut self) {
        let summary = self.summary;
        let mut progress = PhaseProgress::new(
            "Media",
            Some(summary.attachments.len() as u64),
            self.quiet,
        );

        for (wp_id, attachment) in &summary.attachments {
            progress.item(&attachment.url);
            self.maybe_reset_store(progress.processed());

            if !is_same_domain(&attachment.url, &summary.domain) {
                debug!("Skipping attachment {} from another domain: {}", wp_id, attachment.url);
                self.record(EntityKind::Media, Ok(ItemOutcome::Skipped("cross-domain")));
                continue;
            }

            let result = self.import_attachment(attachment);
            self.record(EntityKind::Media, result);
        }

        progress.finish();
    }

    fn import_attachment(&mut self, attachment: &AttachmentInfo) -> Result<ItemOutcome, ItemError> {
        let url = attachment.url.as_str();
        if let Some(existing) = self.cache.media.get(url) {
            return Ok(ItemOutcome::Mapped(existing.target_id));
        }

        let alt = resolve_alt(attachment);

        if self.config.dry_run {
            self.cache.media.insert(
                url.to_string(),
                MediaMapping {
                    target_id: SENTINEL_ID,
                    target_url: dry_run_url(url),
                    alt,
                },
            );
            return Ok(ItemOutcome::Created(SENTINEL_ID));
        }

        let file = self
            .store
            .fetch_and_store_file(url)
            .map_err(|source| ItemError::ResourceFetch {
                key: url.to_string(),
                source,
            })?;
        let write_error = |e| ItemError::write(EntityKind::Media, url, e);

        let (target_id, outcome) = match self.store.find_media(&file).map_err(write_error)? {
            Some(id) => (id, ItemOutcome::Mapped(id)),
            None => {
                let rule = media_rule_for(url);
                let id = self
                    .store
                    .create_media(&file, rule, &alt)
                    .map_err(write_error)?;
                debug!("Created {} media {} for {}", rule.bundle, id, url);
                (id, ItemOutcome::Created(id))
            }
        };

        self.cache.media.insert(
            url.to_string(),
            MediaMapping {
                target_id,
                target_url: file.url,
                alt,
            },
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(url: &str, alt: &str, title: &str) -> AttachmentInfo {
        AttachmentInfo {
            url: url.into(),
            alt: alt.into(),
            title: title.into(),
        }
    }

    #[test]
    fn test_alt_priority() {
        let url = "https://old.example.com/uploads/sunset-beach.jpg";
        assert_eq!(resolve_alt(&attachment(url, "Alt", "Title")), "Alt");
        assert_eq!(resolve_alt(&attachment(url, " ", "Title")), "Title");
        assert_eq!(resolve_alt(&attachment(url, "", "")), "sunset-beach");
    }

    #[test]
    fn test_same_domain() {
        assert!(is_same_domain("https://old.example.com/a.jpg", "old.example.com"));
        assert!(is_same_domain("http://OLD.example.com/a.jpg", "old.example.com"));
        assert!(!is_same_domain("https://cdn.example.com/a.jpg", "old.example.com"));
        assert!(!is_same_domain("/relative/a.jpg", "old.example.com"));
    }

    #[test]
    fn test_dry_run_url_is_domain_relative() {
        assert_eq!(
            dry_run_url("https://old.example.com/wp-content/uploads/a.jpg"),
            "/wp-content/uploads/a.jpg"
        );
    }
}
