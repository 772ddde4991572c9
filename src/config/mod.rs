//! Configuration for wpmigrate

mod fetch;
mod logging;
mod migration;

pub use fetch::FetchConfig;
pub use logging::{init_logging, rotate_log, LogFormat, LogLevel, LoggingConfig, LOG_FILE_NAME};
pub use migration::MigrationConfig;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default user agent for media downloads
pub const DEFAULT_USER_AGENT: &str = concat!("wpmigrate/", env!("CARGO_PKG_VERSION"));

/// Mapping cache file name inside the data directory
pub const CACHE_FILE_NAME: &str = "mapping-cache.json";

/// Where exports are looked for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Directory searched for `.xml` / `.xml.bz2` exports
    pub dir: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root for the mapping cache, the log and the local store
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub migration: MigrationConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".wpmigrate")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            source: SourceConfig::default(),
            migration: MigrationConfig::default(),
            fetch: FetchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, validating it
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file means defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join(CACHE_FILE_NAME)
    }

    pub fn store_dir(&self) -> PathBuf {
        self.data_dir.join("store")
    }

    /// Validate structural fields, reporting every problem at once.
    ///
    /// Whether the named bundles and formats exist is checked later against
    /// the target environment.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if self.data_dir.as_os_str().is_empty() {
            errors.push("data_dir must not be empty".to_string());
        }

        let m = &self.migration;
        if m.content_format.trim().is_empty() {
            errors.push("migration.content_format must not be empty".to_string());
        }
        if m.comment_format.trim().is_empty() {
            errors.push("migration.comment_format must not be empty".to_string());
        }
        if m.bundle_for("post").is_none() && m.bundle_for("page").is_none() {
            errors.push("at least one of migration.post_bundle or migration.page_bundle must be set".to_string());
        }
        if m.category_vocabulary.trim().is_empty() {
            errors.push("migration.category_vocabulary must not be empty".to_string());
        }
        if m.tag_vocabulary.trim().is_empty() {
            errors.push("migration.tag_vocabulary must not be empty".to_string());
        }
        if m.comment_type.trim().is_empty() {
            errors.push("migration.comment_type must not be empty".to_string());
        }

        if self.fetch.timeout_secs == 0 {
            errors.push("fetch.timeout_secs must be positive".to_string());
        }
        if self.fetch.connect_timeout_secs == 0 {
            errors.push("fetch.connect_timeout_secs must be positive".to_string());
        }
        if self.fetch.max_content_size == 0 {
            errors.push("fetch.max_content_size must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserStrategy;

    #[test]
    fn default_config_passes_validation() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_formats() {
        let mut cfg = Config::default();
        cfg.migration.content_format = " ".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("content_format must not be empty"));
    }

    #[test]
    fn validate_rejects_no_bundles() {
        let mut cfg = Config::default();
        cfg.migration.post_bundle = None;
        cfg.migration.page_bundle = Some(String::new());
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("post_bundle or migration.page_bundle"));
    }

    #[test]
    fn validate_collects_multiple_errors() {
        let mut cfg = Config::default();
        cfg.data_dir = PathBuf::from("");
        cfg.fetch.timeout_secs = 0;
        cfg.migration.comment_type = String::new();
        let msg = cfg.validate().unwrap_err().to_string();
        assert!(msg.contains("data_dir must not be empty"));
        assert!(msg.contains("fetch.timeout_secs must be positive"));
        assert!(msg.contains("migration.comment_type must not be empty"));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            data_dir = "/tmp/wp"

            [migration]
            user_strategy = "create-users"
            page_bundle = "basic_page"
            dry_run = true
            "#,
        )
        .unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/tmp/wp"));
        assert_eq!(cfg.migration.user_strategy, UserStrategy::CreateUsers);
        assert_eq!(cfg.migration.page_bundle.as_deref(), Some("basic_page"));
        assert_eq!(cfg.migration.post_bundle.as_deref(), Some("article"));
        assert!(cfg.migration.dry_run);
        assert_eq!(cfg.fetch.timeout_secs, 30);
        assert_eq!(cfg.cache_path(), PathBuf::from("/tmp/wp/mapping-cache.json"));
    }

    #[test]
    fn load_or_default_without_file() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = Config::load_or_default(&tmp.path().join("missing.toml")).unwrap();
        assert_eq!(cfg.migration, MigrationConfig::default());
    }

    #[test]
    fn bundle_for_post_types() {
        let m = MigrationConfig::default();
        assert_eq!(m.bundle_for("post"), Some("article"));
        assert_eq!(m.bundle_for("page"), Some("page"));
        assert_eq!(m.bundle_for("attachment"), None);
    }
}
