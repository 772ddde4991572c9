//! Post body cleanup
//!
//! Removes block-editor markers and presentational attributes, then prunes
//! elements left without content.

use regex_lite::{Captures, Regex};
use std::sync::OnceLock;

static RE_BLOCK_MARKER: OnceLock<Regex> = OnceLock::new();
static RE_START_TAG: OnceLock<Regex> = OnceLock::new();
static RE_ATTRIBUTE: OnceLock<Regex> = OnceLock::new();
static RE_ID_ATTR: OnceLock<Regex> = OnceLock::new();
static RE_EMPTY_ELEMENT: OnceLock<Regex> = OnceLock::new();

/// One attribute: leading whitespace, name, then an optional quoted or bare value
const ATTRIBUTE: &str = r#"\s+[^\s=/<>"']+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'>]+))?"#;

/// Elements that are meaningful without any content
const EMBEDDABLE_TAGS: &[&str] = &["iframe", "script", "video", "audio", "object", "embed"];

/// Clean a post body.
///
/// Block-editor comments (`<!-- wp:... -->`, `<!-- /wp:... -->`) are removed
/// once; attribute stripping and empty-element pruning are then repeated until
/// the markup stops changing.
pub fn clean_content(html: &str) -> String {
    let re_marker =
        RE_BLOCK_MARKER.get_or_init(|| Regex::new(r"(?s)<!--\s*/?wp:.*?-->").unwrap());
    let mut current = re_marker.replace_all(html, "").into_owned();

    // Each pass that changes the text strictly shortens it, so this terminates
    loop {
        let next = remove_empty_elements(&strip_attributes(&current));
        if next == current {
            break;
        }
        current = next;
    }

    current.trim().to_string()
}

/// Drop `class` and `data-*` attributes from every start tag
fn strip_attributes(html: &str) -> String {
    let re_tag = RE_START_TAG.get_or_init(|| {
        Regex::new(&format!(r"<([a-zA-Z][a-zA-Z0-9-]*)((?:{})*)(\s*/?)>", ATTRIBUTE)).unwrap()
    });
    let re_attr = RE_ATTRIBUTE.get_or_init(|| {
        Regex::new(r#"\s+([^\s=/<>"']+)(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'>]+))?"#).unwrap()
    });

    re_tag
        .replace_all(html, |caps: &Captures| {
            let attrs = re_attr.replace_all(&caps[2], |attr: &Captures| {
                let name = attr[1].to_ascii_lowercase();
                if name == "class" || name.starts_with("data-") {
                    String::new()
                } else {
                    attr[0].to_string()
                }
            });
            format!("<{}{}{}>", &caps[1], attrs, &caps[3])
        })
        .into_owned()
}

/// Remove elements containing only whitespace, keeping embeds and id anchors
fn remove_empty_elements(html: &str) -> String {
    let re_empty = RE_EMPTY_ELEMENT.get_or_init(|| {
        Regex::new(&format!(
            r"<([a-zA-Z][a-zA-Z0-9-]*)((?:{})*)\s*>(?:\s|&nbsp;|&#160;)*</([a-zA-Z][a-zA-Z0-9-]*)\s*>",
            ATTRIBUTE
        ))
        .unwrap()
    });
    let re_id = RE_ID_ATTR.get_or_init(|| Regex::new(r"(?i)(?:^|\s)id\s*=").unwrap());

    re_empty
        .replace_all(html, |caps: &Captures| {
            let open = &caps[1];
            let close = &caps[3];
            let has_id = re_id.is_match(&caps[2]);
            let embeddable = EMBEDDABLE_TAGS.iter().any(|t| t.eq_ignore_ascii_case(open));

            if open.eq_ignore_ascii_case(close) && !has_id && !embeddable {
                String::new()
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}
