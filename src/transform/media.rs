//! Media URL rewriting inside post bodies

use regex_lite::{Captures, Regex};
use std::collections::BTreeMap;

/// Old source URL -> new target URL
pub type MediaUrlMap = BTreeMap<String, String>;

/// Result of rewriting a body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteResult {
    pub html: String,
    /// Occurrences of mapped media URLs (exact or resized variants) replaced
    pub replaced: usize,
    /// Remaining absolute links to the old site made domain-relative
    pub domain_replaced: usize,
}

/// Rewrite media references and make remaining old-site links relative.
///
/// Each mapped URL is replaced where it appears verbatim, and WordPress's
/// generated thumbnails of it (`name-300x200.ext` in the same directory) are
/// pointed at the canonical new URL too. Afterwards any literal occurrence of
/// `base_url` is stripped so links resolve against the new site.
pub fn rewrite_media_urls(html: &str, media: &MediaUrlMap, base_url: &str) -> RewriteResult {
    let mut current = html.to_string();
    let mut replaced = 0;

    // Longest first, so a URL that prefixes another cannot clobber it
    let mut entries: Vec<(&String, &String)> = media.iter().collect();
    entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));

    for (old, new) in entries {
        if old.is_empty() || old == new {
            continue;
        }

        let exact = current.matches(old.as_str()).count();
        if exact > 0 {
            current = current.replace(old.as_str(), new);
            replaced += exact;
        }

        if let Some(re_resized) = resized_pattern(old) {
            let resized = re_resized.find_iter(&current).count();
            if resized > 0 {
                current = re_resized
                    .replace_all(&current, |_: &Captures| new.to_string())
                    .into_owned();
                replaced += resized;
            }
        }
    }

    let (current, domain_replaced) = strip_base_url(&current, base_url);

    RewriteResult {
        html: current,
        replaced,
        domain_replaced,
    }
}

/// Matches `dir/name-WIDTHxHEIGHT.ext` for a canonical `dir/name.ext`
fn resized_pattern(url: &str) -> Option<Regex> {
    let path_end = url.find(['?', '#']).unwrap_or(url.len());
    let path = &url[..path_end];
    let slash = path.rfind('/')?;
    let dot = path.rfind('.').filter(|&d| d > slash + 1)?;
    let (stem, ext) = path.split_at(dot);

    Regex::new(&format!(
        r"{}-\d+x\d+{}",
        regex_lite::escape(stem),
        regex_lite::escape(ext)
    ))
    .ok()
}

/// Strip `base_url` where it is followed by a path or ends an attribute value
fn strip_base_url(html: &str, base_url: &str) -> (String, usize) {
    let base = base_url.trim_end_matches('/');
    if base.is_empty() {
        return (html.to_string(), 0);
    }

    let Ok(re_base) = Regex::new(&format!(r#"{}([/"'\s<)]|$)"#, regex_lite::escape(base))) else {
        return (html.to_string(), 0);
    };

    let mut count = 0;
    let rewritten = re_base
        .replace_all(html, |caps: &Captures| {
            count += 1;
            match &caps[1] {
                "/" => "/".to_string(),
                other => format!("/{}", other),
            }
        })
        .into_owned();

    (rewritten, count)
}
