//! Logging configuration and subscriber setup

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{fmt as tracing_fmt, layer::SubscriberExt, util::SubscriberInitExt};
use tracing_subscriber::{EnvFilter, Layer};

use crate::util::timestamped_destination;

/// Name of the per-run log inside the data directory
pub const LOG_FILE_NAME: &str = "migration.log";

/// Log output format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Log severity level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Raise verbosity by `-v` count; never lowers the configured level
    pub fn with_verbosity(&self, verbose: u8) -> LogLevel {
        match (verbose, self) {
            (0, level) => level.clone(),
            (1, Self::Trace) => Self::Trace,
            (1, _) => Self::Debug,
            _ => Self::Trace,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Console log format
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
    /// Also write `migration.log` into the data directory
    #[serde(default = "default_log_file")]
    pub file: bool,
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_log_file() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            level: LogLevel::Info,
            file: true,
        }
    }
}

/// Move an existing log aside as `migration.<timestamp>.log`.
///
/// Returns the archive path, or `None` if there was no log yet.
pub fn rotate_log(path: &Path) -> Result<Option<PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }
    let destination = timestamped_destination(path, Utc::now());
    fs::rename(path, &destination).with_context(|| {
        format!(
            "Failed to rotate log {} to {}",
            path.display(),
            destination.display()
        )
    })?;
    Ok(Some(destination))
}

/// Install the global subscriber: console output plus, when enabled, a fresh
/// plain-text log file in `data_dir`. `RUST_LOG` overrides the level.
pub fn init_logging(config: &LoggingConfig, data_dir: &Path, verbose: u8) -> Result<Option<PathBuf>> {
    let level = config.level.with_verbosity(verbose);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let console = match config.format {
        LogFormat::Text => tracing_fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Json => tracing_fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed(),
    };

    let (file_layer, log_path) = if config.file {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;
        let path = data_dir.join(LOG_FILE_NAME);
        rotate_log(&path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        let layer = tracing_fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_writer(Mutex::new(file));
        (Some(layer), Some(path))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(log_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_verbosity_only_raises_level() {
        assert_eq!(LogLevel::Warn.with_verbosity(0), LogLevel::Warn);
        assert_eq!(LogLevel::Warn.with_verbosity(1), LogLevel::Debug);
        assert_eq!(LogLevel::Trace.with_verbosity(1), LogLevel::Trace);
        assert_eq!(LogLevel::Info.with_verbosity(3), LogLevel::Trace);
    }

    #[test]
    fn test_rotate_log() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(LOG_FILE_NAME);
        assert!(rotate_log(&path).unwrap().is_none());

        std::fs::write(&path, "first run\n").unwrap();
        let archived = rotate_log(&path).unwrap().unwrap();
        assert!(!path.exists());
        assert_eq!(std::fs::read_to_string(&archived).unwrap(), "first run\n");

        let name = archived.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("migration."));
        assert!(name.ends_with(".log"));
    }

    #[test]
    fn test_logging_config_from_toml() {
        let config: LoggingConfig = toml::from_str("level = \"debug\"\nformat = \"json\"").unwrap();
        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.file);
    }
}
