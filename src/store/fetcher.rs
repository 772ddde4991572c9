//! Media download
//!
//! The only thing the store needs from the network is "given a URL, return
//! bytes or fail". Requests are blocking with bounded timeouts; a failure
//! affects that one file only.

use std::io::Read;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::FetchConfig;

/// Errors that can occur during fetching
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected HTTP status {0}")]
    Status(u16),
    #[error("Timeout after {0:?}")]
    Timeout(Duration),
    #[error("Content too large: {0} bytes")]
    ContentTooLarge(usize),
    #[error("Failed to parse URL: {0}")]
    InvalidUrl(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of file bytes
pub trait Fetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Blocking HTTP fetcher
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
    config: FetchConfig,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(&config.user_agent)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", url, e)))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(FetchError::InvalidUrl(format!("unsupported scheme in {}", url)));
        }

        let start = Instant::now();
        let response = self.client.get(parsed).send().map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(self.config.timeout())
            } else {
                FetchError::Http(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let max = self.config.max_content_size;
        if let Some(len) = response.content_length() {
            if len as usize > max {
                return Err(FetchError::ContentTooLarge(len as usize));
            }
        }

        // Read one byte past the limit so an oversized body without a length header is caught
        let mut body = Vec::new();
        response.take(max as u64 + 1).read_to_end(&mut body)?;
        if body.len() > max {
            return Err(FetchError::ContentTooLarge(body.len()));
        }

        debug!(
            "Fetched {} ({} bytes in {:?})",
            url,
            body.len(),
            start.elapsed()
        );
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(FetchConfig::default()).unwrap()
    }

    #[test]
    fn test_rejects_unparseable_url() {
        assert!(matches!(
            fetcher().fetch("not a url"),
            Err(FetchError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        assert!(matches!(
            fetcher().fetch("file:///etc/passwd"),
            Err(FetchError::InvalidUrl(_))
        ));
    }
}
