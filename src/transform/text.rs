//! Plain-text derivations: excerpts, comment subjects, path aliases

use regex_lite::Regex;
use scraper::Html;
use std::sync::OnceLock;
use url::Url;

static RE_SCRIPT_STYLE: OnceLock<Regex> = OnceLock::new();
static RE_COMMENT: OnceLock<Regex> = OnceLock::new();
static RE_BLOCK_TAG: OnceLock<Regex> = OnceLock::new();
static RE_ANY_TAG: OnceLock<Regex> = OnceLock::new();
static RE_ALIAS_PATH: OnceLock<Regex> = OnceLock::new();

/// Default excerpt length in characters
pub const EXCERPT_LENGTH: usize = 300;

/// Comment subject length in characters
pub const SUBJECT_LENGTH: usize = 28;

const ELLIPSIS: &str = "...";

/// Paths owned by the target system that an alias must not shadow
const RESERVED_PREFIXES: &[&str] = &["/admin", "/user", "/node", "/taxonomy"];

/// Reduce markup to a single line of plain text with entities decoded
pub fn html_to_text(html: &str) -> String {
    let re_script = RE_SCRIPT_STYLE.get_or_init(|| {
        Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>").unwrap()
    });
    let re_comment = RE_COMMENT.get_or_init(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
    let re_block = RE_BLOCK_TAG.get_or_init(|| {
        Regex::new(r"(?i)</?(?:p|div|br|li|ul|ol|h[1-6]|tr|td|th|blockquote|pre|figure|figcaption|section|article|hr)\b[^>]*>").unwrap()
    });
    let re_tag = RE_ANY_TAG.get_or_init(|| Regex::new(r"<[^>]*>").unwrap());

    let text = re_script.replace_all(html, " ");
    let text = re_comment.replace_all(&text, " ");
    let text = re_block.replace_all(&text, " ");
    let text = re_tag.replace_all(&text, "");

    // Only entities remain; let the HTML parser decode them
    let fragment = Html::parse_fragment(&text);
    let decoded: String = fragment.root_element().text().collect();

    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Build a plain-text excerpt of at most `max_len` characters.
///
/// Text that fits is returned unchanged. Longer text is cut at the last word
/// boundary that leaves room for a trailing `...`. Words are never split, so a
/// first word longer than the limit yields the ellipsis alone.
pub fn generate_excerpt(html: &str, max_len: usize) -> String {
    let text = html_to_text(html);
    truncate_words(&text, max_len)
}

fn truncate_words(text: &str, max_len: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_len {
        return text.to_string();
    }
    let ellipsis_len = ELLIPSIS.chars().count();
    if max_len <= ellipsis_len {
        return ELLIPSIS.chars().take(max_len).collect();
    }

    let budget = max_len - ellipsis_len;
    // A first word longer than the budget leaves only the ellipsis
    let cut = if chars[budget].is_whitespace() {
        budget
    } else {
        match chars[..budget].iter().rposition(|c| c.is_whitespace()) {
            Some(cut) => cut,
            None => return ELLIPSIS.to_string(),
        }
    };

    let head: String = chars[..cut].iter().collect();
    let head = head.trim_end().trim_end_matches([',', ';', ':', '-']);
    format!("{}{}", head, ELLIPSIS)
}

/// Path alias to preserve from a WordPress permalink.
///
/// Returns `None` for URLs without a path (or only `/`), paths with
/// characters outside `[A-Za-z0-9-_/]`, and paths under a reserved prefix.
/// Trailing slashes are dropped.
pub fn extract_alias(permalink: &str) -> Option<String> {
    let url = Url::parse(permalink).ok()?;
    let path = url.path().trim_end_matches('/');
    if path.is_empty() {
        return None;
    }

    let re_path =
        RE_ALIAS_PATH.get_or_init(|| Regex::new(r"^/[A-Za-z0-9\-_/]{1,254}$").unwrap());
    if !re_path.is_match(path) {
        return None;
    }

    if RESERVED_PREFIXES.iter().any(|prefix| path.starts_with(prefix)) {
        return None;
    }

    Some(path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_to_text_decodes_and_collapses() {
        let html = "<p>Fish &amp; chips</p><p>are&nbsp;great</p>\n<script>var x = 1;</script><!-- note -->";
        assert_eq!(html_to_text(html), "Fish & chips are great");
    }

    #[test]
    fn test_inline_tags_do_not_split_words() {
        assert_eq!(html_to_text("<p>Hello <b>wor</b>ld</p>"), "Hello world");
    }

    #[test]
    fn test_short_text_unchanged() {
        assert_eq!(generate_excerpt("<p>Short text</p>", 300), "Short text");
        assert_eq!(generate_excerpt("exactly ten", 11), "exactly ten");
    }

    #[test]
    fn test_excerpt_respects_limit_and_word_boundary() {
        let text = "The quick brown fox jumps over the lazy dog near the river bank";
        for max_len in 10..text.len() {
            let excerpt = generate_excerpt(text, max_len);
            assert!(
                excerpt.chars().count() <= max_len,
                "{:?} exceeds {}",
                excerpt,
                max_len
            );
            assert!(excerpt.ends_with("..."));
            let body = excerpt.trim_end_matches("...");
            for word in body.split_whitespace() {
                assert!(text.split_whitespace().any(|w| w == word), "split word {:?}", word);
            }
        }
    }

    #[test]
    fn test_subject_length() {
        let subject = generate_excerpt("This is a fairly long comment body about migration", SUBJECT_LENGTH);
        assert_eq!(subject, "This is a fairly long...");
    }

    #[test]
    fn test_long_first_word_is_never_split() {
        assert_eq!(
            generate_excerpt("Pneumonoultramicroscopic is a long word", 12),
            "..."
        );
        assert_eq!(
            generate_excerpt("Pneumonoultramicroscopicsilicovolcanoconiosis", 12),
            "..."
        );
    }

    #[test]
    fn test_excerpt_never_splits_words_of_any_length() {
        let text = "a Supercalifragilistic word then antidisestablishmentarianism follows here";
        for max_len in 4..text.len() {
            let excerpt = generate_excerpt(text, max_len);
            assert!(excerpt.chars().count() <= max_len, "{:?} exceeds {}", excerpt, max_len);
            let body = excerpt.trim_end_matches("...");
            for word in body.split_whitespace() {
                assert!(text.split_whitespace().any(|w| w == word), "split word {:?}", word);
            }
        }
    }

    #[test]
    fn test_extract_alias() {
        assert_eq!(extract_alias("https://old.example.com/admin/secret"), None);
        assert_eq!(
            extract_alias("https://old.example.com/my-post"),
            Some("/my-post".to_string())
        );
        assert_eq!(
            extract_alias("https://old.example.com/2024/01/hello_world/"),
            Some("/2024/01/hello_world".to_string())
        );
    }

    #[test]
    fn test_extract_alias_rejects() {
        assert_eq!(extract_alias("https://old.example.com"), None);
        assert_eq!(extract_alias("https://old.example.com/"), None);
        assert_eq!(extract_alias("https://old.example.com/?p=12"), None);
        assert_eq!(extract_alias("https://old.example.com/caf%C3%A9"), None);
        assert_eq!(extract_alias("https://old.example.com/node/5"), None);
        assert_eq!(extract_alias("https://old.example.com/user"), None);
        assert_eq!(extract_alias("not a url"), None);
    }

    #[test]
    fn test_reserved_prefix_matches_any_path_start() {
        assert_eq!(extract_alias("https://old.example.com/administrator"), None);
        assert_eq!(extract_alias("https://old.example.com/users-guide"), None);
        assert_eq!(extract_alias("https://old.example.com/nodes-of-life"), None);
        assert_eq!(
            extract_alias("https://old.example.com/about-users"),
            Some("/about-users".to_string())
        );
    }
}
