//! Shared utility functions

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Last path segment of a URL or path, without query string
pub fn file_name_of(url: &str) -> &str {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    without_query
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or("")
}

/// File name without its final extension
pub fn file_stem_of(url: &str) -> &str {
    let name = file_name_of(url);
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    }
}

/// Lowercased final extension of a URL's file name
pub fn extension_of(url: &str) -> Option<String> {
    let name = file_name_of(url);
    let idx = name.rfind('.')?;
    if idx == 0 || idx + 1 == name.len() {
        return None;
    }
    Some(name[idx + 1..].to_ascii_lowercase())
}

/// `name.YYYYmmdd-HHMMSS.ext` next to `path`, suffixed `-N` until unused
pub fn timestamped_destination(path: &Path, now: DateTime<Utc>) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let stamp = now.format("%Y%m%d-%H%M%S");

    let mut candidate = path.with_file_name(format!("{}.{}{}", stem, stamp, ext));
    let mut n = 1;
    while candidate.exists() {
        candidate = path.with_file_name(format!("{}.{}-{}{}", stem, stamp, n, ext));
        n += 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_helpers() {
        let url = "https://old.example.com/wp-content/uploads/2024/01/Photo.Final.JPG?ver=2";
        assert_eq!(file_name_of(url), "Photo.Final.JPG");
        assert_eq!(file_stem_of(url), "Photo.Final");
        assert_eq!(extension_of(url), Some("jpg".to_string()));
        assert_eq!(extension_of("https://example.com/README"), None);
        assert_eq!(file_stem_of("https://example.com/.hidden"), ".hidden");
    }
}
