//! Target environment snapshot and pre-flight validation

use std::fmt;
use tracing::{info, warn};

use super::{BundleInfo, CatalogEntry, StoreError, TargetStore};
use crate::config::MigrationConfig;
use crate::wxr::Requirements;

/// Every problem that prevents a run from starting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub problems: Vec<String>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Target environment validation failed:\n  - {}",
            self.problems.join("\n  - ")
        )
    }
}

impl std::error::Error for ValidationError {}

/// Catalogs read from the target store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetEnvironment {
    pub bundles: Vec<BundleInfo>,
    pub vocabularies: Vec<CatalogEntry>,
    pub text_formats: Vec<CatalogEntry>,
    pub comment_types: Vec<CatalogEntry>,
}

impl TargetEnvironment {
    /// Read all catalogs from the store
    pub fn query<S: TargetStore + ?Sized>(store: &S) -> Result<Self, StoreError> {
        let env = Self {
            bundles: store.list_bundles()?,
            vocabularies: store.list_vocabularies()?,
            text_formats: store.list_text_formats()?,
            comment_types: store.list_comment_types()?,
        };
        info!(
            "Target environment: {} bundles, {} vocabularies, {} text formats, {} comment types",
            env.bundles.len(),
            env.vocabularies.len(),
            env.text_formats.len(),
            env.comment_types.len()
        );
        Ok(env)
    }

    /// Re-read the catalogs after the store changed under a running session
    pub fn refresh<S: TargetStore + ?Sized>(&mut self, store: &S) -> Result<(), StoreError> {
        *self = Self::query(store)?;
        Ok(())
    }

    pub fn bundle(&self, id: &str) -> Option<&BundleInfo> {
        self.bundles.iter().find(|b| b.id == id)
    }

    pub fn content_bundles(&self) -> impl Iterator<Item = &BundleInfo> {
        self.bundles.iter().filter(|b| b.fields.is_content_capable())
    }

    pub fn has_vocabulary(&self, id: &str) -> bool {
        self.vocabularies.iter().any(|v| v.id == id)
    }

    pub fn has_text_format(&self, id: &str) -> bool {
        self.text_formats.iter().any(|f| f.id == id)
    }

    pub fn has_comment_type(&self, id: &str) -> bool {
        self.comment_types.iter().any(|c| c.id == id)
    }

    /// Check that the store can receive what the export needs under `config`.
    ///
    /// All problems are collected. A bundle without a comment field is only
    /// a warning; the comments phase skips itself in that case.
    pub fn validate(
        &self,
        requirements: &Requirements,
        config: &MigrationConfig,
    ) -> Result<(), ValidationError> {
        let mut problems = Vec::new();

        if self.text_formats.is_empty() {
            problems.push("target store has no text formats".to_string());
        } else if !self.has_text_format(&config.content_format) {
            problems.push(format!(
                "content text format '{}' does not exist",
                config.content_format
            ));
        }

        if self.content_bundles().next().is_none() {
            problems.push("target store has no bundle with a body field".to_string());
        }

        for post_type in ["post", "page"] {
            let Some(bundle_id) = config.bundle_for(post_type) else {
                continue;
            };
            match self.bundle(bundle_id) {
                None => problems.push(format!(
                    "{} bundle '{}' does not exist",
                    post_type, bundle_id
                )),
                Some(bundle) if !bundle.fields.is_content_capable() => problems.push(format!(
                    "{} bundle '{}' has no body field",
                    post_type, bundle_id
                )),
                Some(_) => {}
            }
        }

        if requirements.needs_taxonomy {
            for vocabulary in [&config.category_vocabulary, &config.tag_vocabulary] {
                if !self.has_vocabulary(vocabulary) {
                    problems.push(format!("vocabulary '{}' does not exist", vocabulary));
                }
            }
        }

        if requirements.needs_comments {
            if !self.has_comment_type(&config.comment_type) {
                problems.push(format!(
                    "comment type '{}' does not exist",
                    config.comment_type
                ));
            }
            if !self.text_formats.is_empty() && !self.has_text_format(&config.comment_format) {
                problems.push(format!(
                    "comment text format '{}' does not exist",
                    config.comment_format
                ));
            }
            let commentable = config
                .bundle_for("post")
                .and_then(|id| self.bundle(id))
                .is_some_and(|b| b.fields.comment.is_some());
            if !commentable {
                warn!("Post bundle has no comment field; comments will not be imported");
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { problems })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DetectedFields;

    fn environment() -> TargetEnvironment {
        TargetEnvironment {
            bundles: vec![
                BundleInfo {
                    id: "article".into(),
                    label: "Article".into(),
                    fields: DetectedFields::detect(&["body", "comment"]),
                },
                BundleInfo {
                    id: "page".into(),
                    label: "Basic page".into(),
                    fields: DetectedFields::detect(&["body"]),
                },
                BundleInfo {
                    id: "landing".into(),
                    label: "Landing".into(),
                    fields: DetectedFields::detect(&["field_hero"]),
                },
            ],
            vocabularies: vec![
                CatalogEntry::new("categories", "Categories"),
                CatalogEntry::new("tags", "Tags"),
            ],
            text_formats: vec![CatalogEntry::new("basic_html", "Basic HTML")],
            comment_types: vec![CatalogEntry::new("comment", "Default comments")],
        }
    }

    fn all_requirements() -> Requirements {
        Requirements {
            needs_users: true,
            needs_media: true,
            needs_taxonomy: true,
            needs_comments: true,
        }
    }

    #[test]
    fn test_valid_environment() {
        let env = environment();
        assert!(env
            .validate(&all_requirements(), &MigrationConfig::default())
            .is_ok());
    }

    #[test]
    fn test_no_text_formats_is_fatal() {
        let mut env = environment();
        env.text_formats.clear();
        let err = env
            .validate(&Requirements::default(), &MigrationConfig::default())
            .unwrap_err();
        assert_eq!(err.problems, vec!["target store has no text formats"]);
    }

    #[test]
    fn test_no_content_bundle_is_fatal() {
        let mut env = environment();
        env.bundles.retain(|b| b.id == "landing");
        let err = env
            .validate(&Requirements::default(), &MigrationConfig::default())
            .unwrap_err();
        assert!(err
            .problems
            .contains(&"target store has no bundle with a body field".to_string()));
        assert!(err.to_string().contains("post bundle 'article' does not exist"));
    }

    #[test]
    fn test_collects_every_problem() {
        let env = environment();
        let config = MigrationConfig {
            post_bundle: Some("landing".into()),
            tag_vocabulary: "keywords".into(),
            comment_type: "forum".into(),
            ..MigrationConfig::default()
        };
        let err = env.validate(&all_requirements(), &config).unwrap_err();
        assert_eq!(err.problems.len(), 3);
        assert!(err.problems[0].contains("has no body field"));
        assert!(err.problems[1].contains("'keywords'"));
        assert!(err.problems[2].contains("'forum'"));
    }

    #[test]
    fn test_unneeded_catalogs_are_not_checked() {
        let mut env = environment();
        env.vocabularies.clear();
        env.comment_types.clear();
        assert!(env
            .validate(&Requirements::default(), &MigrationConfig::default())
            .is_ok());
    }

    #[test]
    fn test_refresh_requeries_store() {
        struct NoFetch;
        impl crate::store::Fetcher for NoFetch {
            fn fetch(&self, url: &str) -> Result<Vec<u8>, crate::store::FetchError> {
                Err(crate::store::FetchError::InvalidUrl(url.to_string()))
            }
        }

        let store = crate::store::LocalStore::in_memory(NoFetch);
        let mut env = TargetEnvironment::query(&store).unwrap();
        env.text_formats.clear();
        env.bundles.clear();
        assert!(env
            .validate(&Requirements::default(), &MigrationConfig::default())
            .is_err());

        env.refresh(&store).unwrap();
        assert!(env.has_text_format("basic_html"));
        assert!(env.bundle("article").is_some());
        assert!(env
            .validate(&Requirements::default(), &MigrationConfig::default())
            .is_ok());
    }
}
