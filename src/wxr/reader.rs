//! Streaming WXR reader
//!
//! Forward-only pass over a WordPress export (plain or bzip2-compressed).
//! Channel-level `item`, `wp:author` and `link` elements are materialised one
//! at a time as small owned [`XmlNode`] trees and handed out as
//! [`WxrEntry`] values; everything else is streamed past.

use bzip2::read::BzDecoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::item::{WxrAuthor, WxrItem};
use super::source::{ScanError, WxrFormat};

/// Owned subtree of a single export element
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    fn new(name: String, attributes: Vec<(String, String)>) -> Self {
        Self {
            name,
            attributes,
            text: String::new(),
            children: Vec::new(),
        }
    }

    /// First direct child with the given qualified name
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All direct children with the given qualified name, in document order
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Trimmed text of a direct child; `None` when missing or blank
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name)
            .map(|c| c.text.trim())
            .filter(|t| !t.is_empty())
    }

    /// Untrimmed text of a direct child (for markup bodies)
    pub fn child_raw(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.as_str())
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A channel-level element handed out by the reader
#[derive(Debug, Clone)]
pub enum WxrEntry {
    /// Text of a channel `link` element
    Link(String),
    Author(WxrAuthor),
    Item(WxrItem),
}

/// Reader abstraction for different compression formats
enum XmlSource {
    Bzip2(Reader<BufReader<BzDecoder<File>>>),
    Plain(Reader<BufReader<File>>),
}

impl XmlSource {
    fn read_event<'a>(&mut self, buf: &'a mut Vec<u8>) -> Result<Event<'a>, quick_xml::Error> {
        buf.clear();
        match self {
            XmlSource::Bzip2(reader) => reader.read_event_into(buf),
            XmlSource::Plain(reader) => reader.read_event_into(buf),
        }
    }

    fn buffer_position(&self) -> u64 {
        match self {
            XmlSource::Bzip2(reader) => reader.buffer_position() as u64,
            XmlSource::Plain(reader) => reader.buffer_position() as u64,
        }
    }
}

/// Owned form of a parser event, so the read buffer can be reused
enum Step {
    Start(String, Vec<(String, String)>),
    Empty(String, Vec<(String, String)>),
    Text(String),
    End,
    Eof,
    Other,
}

impl Step {
    fn from_event(event: Event<'_>) -> Self {
        match event {
            Event::Start(ref e) => {
                let (name, attrs) = start_parts(e);
                Step::Start(name, attrs)
            }
            Event::Empty(ref e) => {
                let (name, attrs) = start_parts(e);
                Step::Empty(name, attrs)
            }
            Event::Text(ref e) => {
                let text = match e.unescape() {
                    Ok(text) => text.into_owned(),
                    // HTML entities outside CDATA are not valid XML escapes; keep them verbatim
                    Err(_) => String::from_utf8_lossy(e).into_owned(),
                };
                Step::Text(text)
            }
            Event::CData(ref e) => Step::Text(String::from_utf8_lossy(e).into_owned()),
            Event::End(_) => Step::End,
            Event::Eof => Step::Eof,
            _ => Step::Other,
        }
    }
}

fn start_parts(e: &BytesStart<'_>) -> (String, Vec<(String, String)>) {
    let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
    let attrs = e
        .attributes()
        .flatten()
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            let value = attr
                .unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
            (key, value)
        })
        .collect();
    (name, attrs)
}

/// Forward-only WXR reader
pub struct WxrReader {
    source: XmlSource,
    /// Names of currently open elements outside materialised subtrees
    stack: Vec<String>,
    saw_channel: bool,
    saw_wp_markup: bool,
    peak_item_bytes: u64,
}

impl WxrReader {
    /// Open an export file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ScanError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            ScanError::MalformedInput(format!("cannot open {}: {}", path.display(), e))
        })?;

        let source = match WxrFormat::detect(path) {
            Some(WxrFormat::XmlBzip2) => {
                let decoder = BzDecoder::new(file);
                let buf_reader = BufReader::with_capacity(1024 * 1024, decoder); // 1MB buffer
                XmlSource::Bzip2(Reader::from_reader(buf_reader))
            }
            _ => {
                let buf_reader = BufReader::with_capacity(1024 * 1024, file); // 1MB buffer
                XmlSource::Plain(Reader::from_reader(buf_reader))
            }
        };

        Ok(Self {
            source,
            stack: Vec::new(),
            saw_channel: false,
            saw_wp_markup: false,
            peak_item_bytes: 0,
        })
    }

    /// Whether a `channel` and WordPress-namespaced markup have been seen so far
    pub fn has_export_markers(&self) -> bool {
        self.saw_channel && self.saw_wp_markup
    }

    /// Largest item subtree materialised so far, in bytes
    pub fn peak_item_bytes(&self) -> u64 {
        self.peak_item_bytes
    }

    /// Iterate over channel-level entries in document order
    pub fn entries(&mut self) -> WxrEntries<'_> {
        WxrEntries {
            reader: self,
            done: false,
        }
    }

    /// Iterate over items only
    pub fn items(&mut self) -> impl Iterator<Item = Result<WxrItem, ScanError>> + '_ {
        self.entries().filter_map(|entry| match entry {
            Ok(WxrEntry::Item(item)) => Some(Ok(item)),
            Ok(_) => None,
            Err(e) => Some(Err(e)),
        })
    }

    fn next_step(&mut self, buf: &mut Vec<u8>) -> Result<Step, ScanError> {
        let event = self.source.read_event(buf);
        match event {
            Ok(event) => Ok(Step::from_event(event)),
            Err(e) => Err(ScanError::Xml {
                position: self.source.buffer_position(),
                message: e.to_string(),
            }),
        }
    }

    fn note_markers(&mut self, name: &str, attrs: &[(String, String)]) {
        if name == "channel" {
            self.saw_channel = true;
        }
        if name.starts_with("wp:") || attrs.iter().any(|(k, _)| k == "xmlns:wp") {
            self.saw_wp_markup = true;
        }
    }

    fn in_channel(&self) -> bool {
        self.stack.last().map(|s| s == "channel").unwrap_or(false)
    }

    /// Read the next channel-level entry
    fn next_entry(&mut self) -> Result<Option<WxrEntry>, ScanError> {
        let mut buf = Vec::with_capacity(8192);

        loop {
            let before = self.source.buffer_position();
            let step = self.next_step(&mut buf)?;

            match step {
                Step::Start(name, attrs) => {
                    self.note_markers(&name, &attrs);

                    if self.in_channel() {
                        match name.as_str() {
                            "item" => {
                                let node = self.read_node(name, attrs)?;
                                let size = self.source.buffer_position().saturating_sub(before);
                                self.peak_item_bytes = self.peak_item_bytes.max(size);
                                return Ok(Some(WxrEntry::Item(WxrItem::from_node(&node))));
                            }
                            "wp:author" => {
                                let node = self.read_node(name, attrs)?;
                                if let Some(author) = WxrAuthor::from_node(&node) {
                                    return Ok(Some(WxrEntry::Author(author)));
                                }
                                continue;
                            }
                            "link" => {
                                let node = self.read_node(name, attrs)?;
                                return Ok(Some(WxrEntry::Link(node.text.trim().to_string())));
                            }
                            _ => {}
                        }
                    }

                    self.stack.push(name);
                }
                Step::Empty(name, attrs) => {
                    self.note_markers(&name, &attrs);
                }
                Step::End => {
                    self.stack.pop();
                }
                Step::Eof => return Ok(None),
                Step::Text(_) | Step::Other => {}
            }
        }
    }

    /// Materialise the subtree of an element whose start tag was just read
    fn read_node(
        &mut self,
        name: String,
        attributes: Vec<(String, String)>,
    ) -> Result<XmlNode, ScanError> {
        let mut buf = Vec::with_capacity(4096);
        let mut open = vec![XmlNode::new(name, attributes)];

        loop {
            match self.next_step(&mut buf)? {
                Step::Start(name, attrs) => {
                    self.note_markers(&name, &attrs);
                    open.push(XmlNode::new(name, attrs));
                }
                Step::Empty(name, attrs) => {
                    self.note_markers(&name, &attrs);
                    if let Some(parent) = open.last_mut() {
                        parent.children.push(XmlNode::new(name, attrs));
                    }
                }
                Step::Text(text) => {
                    if let Some(current) = open.last_mut() {
                        current.text.push_str(&text);
                    }
                }
                Step::End => {
                    let Some(node) = open.pop() else {
                        return Err(ScanError::MalformedInput("unbalanced element".into()));
                    };
                    match open.last_mut() {
                        Some(parent) => parent.children.push(node),
                        None => return Ok(node),
                    }
                }
                Step::Eof => {
                    let name = open.first().map(|n| n.name.clone()).unwrap_or_default();
                    return Err(ScanError::MalformedInput(format!(
                        "unexpected end of file inside <{}>",
                        name
                    )));
                }
                Step::Other => {}
            }
        }
    }
}

/// Iterator over channel-level entries
pub struct WxrEntries<'a> {
    reader: &'a mut WxrReader,
    done: bool,
}

impl<'a> Iterator for WxrEntries<'a> {
    type Item = Result<WxrEntry, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                // The stream position is unknown after a parse error
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:wp="http://wordpress.org/export/1.2/" xmlns:content="http://purl.org/rss/1.0/modules/content/">
<channel>
  <title>Site</title>
  <link>https://old.example.com</link>
  <wp:author><wp:author_login><![CDATA[jane]]></wp:author_login><wp:author_email>jane@example.com</wp:author_email></wp:author>
  <item>
    <title>First &amp; best</title>
    <link>https://old.example.com/first/</link>
    <content:encoded><![CDATA[<p>Hello</p>]]></content:encoded>
    <wp:post_id>10</wp:post_id>
    <wp:status>publish</wp:status>
    <wp:post_type>post</wp:post_type>
    <category domain="category" nicename="news"><![CDATA[News]]></category>
    <wp:postmeta><wp:meta_key>_thumbnail_id</wp:meta_key><wp:meta_value>11</wp:meta_value></wp:postmeta>
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
    fn test_entries_in_document_order() {
        let file = write_temp(SAMPLE);
        let mut reader = WxrReader::open(file.path()).unwrap();
        let entries: Vec<_> = reader.entries().collect::<Result<_, _>>().unwrap();

        assert_eq!(entries.len(), 3);
        assert!(matches!(&entries[0], WxrEntry::Link(l) if l == "https://old.example.com"));
        assert!(matches!(&entries[1], WxrEntry::Author(a) if a.email == "jane@example.com"));
        match &entries[2] {
            WxrEntry::Item(item) => {
                assert_eq!(item.title, "First & best");
                assert_eq!(item.post_id, Some(10));
                assert_eq!(item.content, "<p>Hello</p>");
                assert_eq!(item.meta("_thumbnail_id"), Some("11"));
                assert_eq!(item.terms[0].domain, "category");
                assert_eq!(item.terms[0].name, "News");
            }
            other => panic!("expected item, got {:?}", other),
        }
        assert!(reader.has_export_markers());
        assert!(reader.peak_item_bytes() > 0);
    }

    #[test]
    fn test_item_link_is_not_a_channel_link() {
        let file = write_temp(SAMPLE);
        let mut reader = WxrReader::open(file.path()).unwrap();
        let links = reader
            .entries()
            .filter(|e| matches!(e, Ok(WxrEntry::Link(_))))
            .count();
        assert_eq!(links, 1);
    }

    #[test]
    fn test_truncated_item_is_an_error() {
        let file = write_temp("<rss><channel><item><title>Cut");
        let mut reader = WxrReader::open(file.path()).unwrap();
        let results: Vec<_> = reader.items().collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }

    #[test]
    fn test_node_helpers() {
        let mut node = XmlNode::new("item".into(), vec![("domain".into(), "post_tag".into())]);
        let mut child = XmlNode::new("title".into(), Vec::new());
        child.text = "  Spaced  ".into();
        node.children.push(child);
        node.children.push(XmlNode::new("empty".into(), Vec::new()));

        assert_eq!(node.child_text("title"), Some("Spaced"));
        assert_eq!(node.child_raw("title"), Some("  Spaced  "));
        assert_eq!(node.child_text("empty"), None);
        assert_eq!(node.attr("domain"), Some("post_tag"));
        assert_eq!(node.children_named("title").count(), 1);
    }
}
