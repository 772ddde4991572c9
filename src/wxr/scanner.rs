//! Single-pass export summary scan

use std::path::Path;
use tracing::{debug, info};
use url::Url;

use super::item::WxrItem;
use super::reader::{WxrEntry, WxrReader};
use super::source::{AttachmentInfo, AuthorInfo, ScanError, XmlSummary};

/// Postmeta key holding an attachment's alt text
const ALT_META_KEY: &str = "_wp_attachment_image_alt";

/// Scan an export and build its summary.
///
/// Fails with [`ScanError::MalformedInput`] when the file cannot be opened,
/// is not well-formed, or carries no WordPress export markers.
pub fn scan(path: impl AsRef<Path>) -> Result<XmlSummary, ScanError> {
    let path = path.as_ref();
    let mut reader = WxrReader::open(path)?;
    let mut summary = XmlSummary::default();

    for entry in reader.entries() {
        let entry = entry.map_err(|e| match e {
            ScanError::Xml { position, message } => ScanError::MalformedInput(format!(
                "{} is not well-formed XML (byte {}): {}",
                path.display(),
                position,
                message
            )),
            other => other,
        })?;

        match entry {
            WxrEntry::Link(link) => record_link(&mut summary, &link),
            WxrEntry::Author(author) => {
                summary
                    .authors
                    .entry(author.email)
                    .or_insert(AuthorInfo {
                        login: author.login,
                        display_name: author.display_name,
                    });
            }
            WxrEntry::Item(item) => record_item(&mut summary, item),
        }
    }

    if !reader.has_export_markers() {
        return Err(ScanError::MalformedInput(format!(
            "{} contains no WordPress export markers",
            path.display()
        )));
    }

    summary.peak_item_bytes = reader.peak_item_bytes();

    info!(
        "Scanned {}: {} posts, {} pages, {} attachments, {} authors, {} categories, {} tags, {} approved comments",
        path.display(),
        summary.posts,
        summary.pages,
        summary.attachments.len(),
        summary.authors.len(),
        summary.categories.len(),
        summary.tags.len(),
        summary.approved_comment_count
    );

    Ok(summary)
}

/// The first valid absolute URL fixes the base URL and domain
fn record_link(summary: &mut XmlSummary, link: &str) {
    if !summary.base_url.is_empty() {
        return;
    }
    let Ok(url) = Url::parse(link) else {
        debug!("Ignoring channel link that is not an absolute URL: {}", link);
        return;
    };
    let Some(host) = url.host_str() else {
        return;
    };
    summary.domain = host.to_string();
    summary.base_url = link.trim_end_matches('/').to_string();
}

fn record_item(summary: &mut XmlSummary, item: WxrItem) {
    if !item.is_counted() {
        return;
    }

    match item.post_type.as_str() {
        "post" => {
            summary.posts += 1;
            for term in &item.terms {
                match term.domain.as_str() {
                    "category" => {
                        summary.categories.insert(term.name.clone());
                    }
                    "post_tag" => {
                        summary.tags.insert(term.name.clone());
                    }
                    _ => {}
                }
            }
            summary.approved_comment_count +=
                item.comments.iter().filter(|c| c.is_approved()).count();
        }
        "page" => {
            summary.pages += 1;
        }
        "attachment" => {
            let (Some(id), Some(url)) = (item.post_id, item.attachment_url.clone()) else {
                debug!("Skipping attachment without id or URL: {}", item.title);
                return;
            };
            let alt = item
                .meta(ALT_META_KEY)
                .filter(|a| !a.trim().is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| item.title.clone());
            summary.attachments.insert(
                id,
                AttachmentInfo {
                    url,
                    alt,
                    title: item.title,
                },
            );
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"
  xmlns:excerpt="http://wordpress.org/export/1.2/excerpt/"
  xmlns:content="http://purl.org/rss/1.0/modules/content/"
  xmlns:dc="http://purl.org/dc/elements/1.1/"
  xmlns:wp="http://wordpress.org/export/1.2/">
<channel>
  <title>Old Site</title>
  <link>not a url</link>
  <link>https://old.example.com/</link>
  <link>https://other.example.org</link>
  <wp:author><wp:author_login>jane</wp:author_login><wp:author_email>jane@example.com</wp:author_email><wp:author_display_name>Jane Doe</wp:author_display_name></wp:author>
  <wp:author><wp:author_login>jane2</wp:author_login><wp:author_email>jane@example.com</wp:author_email></wp:author>
  <wp:author><wp:author_email>bob@example.com</wp:author_email></wp:author>
  <item>
    <title>Hello</title>
    <wp:post_id>1</wp:post_id>
    <wp:status>publish</wp:status>
    <wp:post_type>post</wp:post_type>
    <category domain="category" nicename="news"><![CDATA[News]]></category>
    <category domain="post_tag" nicename="rust"><![CDATA[Rust]]></category>
    <category domain="category" nicename="news"><![CDATA[News]]></category>
    <wp:comment><wp:comment_id>1</wp:comment_id><wp:comment_approved>1</wp:comment_approved></wp:comment>
    <wp:comment><wp:comment_id>2</wp:comment_id><wp:comment_approved>0</wp:comment_approved></wp:comment>
    <wp:comment><wp:comment_id>3</wp:comment_id><wp:comment_approved>1</wp:comment_approved></wp:comment>
  </item>
  <item>
    <title>Draft</title>
    <wp:post_id>2</wp:post_id>
    <wp:status>draft</wp:status>
    <wp:post_type>post</wp:post_type>
    <category domain="category" nicename="secret"><![CDATA[Secret]]></category>
  </item>
  <item>
    <title>About</title>
    <wp:post_id>3</wp:post_id>
    <wp:status>publish</wp:status>
    <wp:post_type>page</wp:post_type>
    <category domain="category" nicename="pages"><![CDATA[PageCat]]></category>
    <wp:comment><wp:comment_id>4</wp:comment_id><wp:comment_approved>1</wp:comment_approved></wp:comment>
  </item>
  <item>
    <title>Photo title</title>
    <wp:post_id>4</wp:post_id>
    <wp:status>inherit</wp:status>
    <wp:post_type>attachment</wp:post_type>
    <wp:attachment_url>https://old.example.com/wp-content/uploads/photo.jpg</wp:attachment_url>
    <wp:postmeta><wp:meta_key>_wp_attachment_image_alt</wp:meta_key><wp:meta_value><![CDATA[A photo]]></wp:meta_value></wp:postmeta>
  </item>
  <item>
    <title>Untitled doc</title>
    <wp:post_id>5</wp:post_id>
    <wp:status>inherit</wp:status>
    <wp:post_type>attachment</wp:post_type>
    <wp:attachment_url>https://old.example.com/wp-content/uploads/doc.pdf</wp:attachment_url>
  </item>
  <item>
    <title>Broken attachment</title>
    <wp:post_id>6</wp:post_id>
    <wp:status>inherit</wp:status>
    <wp:post_type>attachment</wp:post_type>
  </item>
</channel>
</rss>
"#;

    fn write_temp(xml: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".xml").tempfile().unwrap();
        file.write_all(xml.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_scan_counts_and_sets() {
        let file = write_temp(SAMPLE_XML);
        let summary = scan(file.path()).unwrap();

        assert_eq!(summary.posts, 1);
        assert_eq!(summary.pages, 1);
        assert_eq!(
            summary.categories.iter().collect::<Vec<_>>(),
            vec!["News"]
        );
        assert_eq!(summary.tags.iter().collect::<Vec<_>>(), vec!["Rust"]);
        // Page comments are not counted
        assert_eq!(summary.approved_comment_count, 2);
    }

    #[test]
    fn test_scan_base_url_from_first_valid_link() {
        let file = write_temp(SAMPLE_XML);
        let summary = scan(file.path()).unwrap();
        assert_eq!(summary.base_url, "https://old.example.com");
        assert_eq!(summary.domain, "old.example.com");
    }

    #[test]
    fn test_scan_authors_unique_by_email() {
        let file = write_temp(SAMPLE_XML);
        let summary = scan(file.path()).unwrap();

        assert_eq!(summary.authors.len(), 2);
        let jane = &summary.authors["jane@example.com"];
        assert_eq!(jane.login, "jane");
        assert_eq!(jane.display_name, "Jane Doe");
        assert_eq!(summary.authors["bob@example.com"].login, "bob");
    }

    #[test]
    fn test_scan_attachments() {
        let file = write_temp(SAMPLE_XML);
        let summary = scan(file.path()).unwrap();

        assert_eq!(summary.attachments.len(), 2);
        assert_eq!(summary.attachments[&4].alt, "A photo");
        assert_eq!(summary.attachments[&5].alt, "Untitled doc");
        assert!(!summary.attachments.contains_key(&6));
    }

    #[test]
    fn test_scan_tracks_peak_item_size() {
        let file = write_temp(SAMPLE_XML);
        let summary = scan(file.path()).unwrap();
        let file_len = std::fs::metadata(file.path()).unwrap().len();
        assert!(summary.peak_item_bytes > 0);
        assert!(summary.peak_item_bytes < file_len / 2);
    }

    #[test]
    fn test_scan_missing_file_is_malformed() {
        let err = scan("/nonexistent/export.xml").unwrap_err();
        assert!(matches!(err, ScanError::MalformedInput(_)));
    }

    #[test]
    fn test_scan_rejects_non_wordpress_xml() {
        let file = write_temp("<rss><channel><title>Plain feed</title></channel></rss>");
        let err = scan(file.path()).unwrap_err();
        assert!(matches!(err, ScanError::MalformedInput(_)));
    }

    #[test]
    fn test_scan_rejects_garbage() {
        let file = write_temp("<rss><channel></rss>");
        let err = scan(file.path()).unwrap_err();
        assert!(matches!(err, ScanError::MalformedInput(_)));
    }

    #[test]
    fn test_scan_bzip2_export_matches_plain() {
        let mut file = tempfile::Builder::new().suffix(".xml.bz2").tempfile().unwrap();
        let mut encoder =
            bzip2::write::BzEncoder::new(file.as_file_mut(), bzip2::Compression::default());
        encoder.write_all(SAMPLE_XML.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let plain = write_temp(SAMPLE_XML);
        let expected = scan(plain.path()).unwrap();
        let summary = scan(file.path()).unwrap();

        assert!(summary.posts > 0);
        assert_eq!(
            serde_json::to_value(&summary).unwrap(),
            serde_json::to_value(&expected).unwrap()
        );
    }
}
