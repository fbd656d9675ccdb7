//! Sitemap and sitemap-index parsing.

use crate::error::{Result, SitemapError};
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use sitepulse_core::UrlEntry;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Default cap on child sitemaps fetched from an index.
pub const MAX_CHILD_SITEMAPS: usize = 10;

/// A parsed sitemap document.
#[derive(Debug, Clone, PartialEq)]
pub enum SitemapDocument {
    /// `<urlset>` with its entries
    UrlSet(Vec<UrlEntry>),
    /// `<sitemapindex>` with child sitemap locations
    Index(Vec<String>),
}

/// Fetches child sitemaps referenced by an index.
#[async_trait]
pub trait SitemapSource: Send + Sync {
    async fn fetch_sitemap(&self, url: &str) -> Result<String>;
}

#[derive(Clone, Copy, PartialEq)]
enum Root {
    UrlSet,
    Index,
}

#[derive(Clone, Copy)]
enum Field {
    Loc,
    Lastmod,
    Changefreq,
    Priority,
}

#[derive(Default)]
struct EntryBuilder {
    loc: String,
    lastmod: Option<String>,
    changefreq: Option<String>,
    priority: Option<String>,
}

impl EntryBuilder {
    fn set(&mut self, field: Field, text: &str) {
        match field {
            Field::Loc => self.loc.push_str(text),
            Field::Lastmod => self.lastmod.get_or_insert_with(String::new).push_str(text),
            Field::Changefreq => self
                .changefreq
                .get_or_insert_with(String::new)
                .push_str(text),
            Field::Priority => self.priority.get_or_insert_with(String::new).push_str(text),
        }
    }
}

/// Parse one sitemap document without fetching anything.
///
/// Relative `<loc>` values are resolved against `base_url` when it parses.
pub fn parse_document(xml: &str, base_url: &str) -> Result<SitemapDocument> {
    let base = Url::parse(base_url).ok();
    let mut reader = Reader::from_reader(xml.as_bytes());
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut root: Option<Root> = None;
    let mut entry: Option<EntryBuilder> = None;
    let mut field: Option<Field> = None;
    let mut entries = Vec::new();
    let mut children = Vec::new();
    // Root is depth 1, entries depth 2, entry fields depth 3. Extension
    // elements nested deeper (`<image:loc>`, `<video:title>`) are ignored.
    let mut depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                depth += 1;
                let name = e.local_name();
                let name = name.as_ref();
                match (depth, root) {
                    (1, _) => root = Some(root_kind(name)?),
                    (2, Some(Root::UrlSet)) if name == b"url" => {
                        entry = Some(EntryBuilder::default());
                    }
                    (2, Some(Root::Index)) if name == b"sitemap" => {
                        entry = Some(EntryBuilder::default());
                    }
                    (3, _) if entry.is_some() => field = field_kind(name),
                    _ => field = None,
                }
            }
            Ok(Event::Empty(e)) => {
                if root.is_none() {
                    root = Some(root_kind(e.local_name().as_ref())?);
                }
            }
            Ok(Event::Text(t)) if depth == 3 => {
                if let (Some(f), Some(builder)) = (field, entry.as_mut()) {
                    builder.set(f, &t.unescape()?);
                }
            }
            Ok(Event::CData(c)) if depth == 3 => {
                if let (Some(f), Some(builder)) = (field, entry.as_mut()) {
                    builder.set(f, &String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Ok(Event::End(_)) => {
                match depth {
                    2 => {
                        if let Some(builder) = entry.take() {
                            push_entry(builder, root, base.as_ref(), &mut entries, &mut children);
                        }
                    }
                    3 => field = None,
                    _ => {}
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(SitemapError::Parse(format!(
                    "at byte {}: {e}",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    match root {
        Some(Root::UrlSet) => Ok(SitemapDocument::UrlSet(entries)),
        Some(Root::Index) => Ok(SitemapDocument::Index(children)),
        None => Err(SitemapError::InvalidFormat("document has no root element".into())),
    }
}

fn push_entry(
    builder: EntryBuilder,
    root: Option<Root>,
    base: Option<&Url>,
    entries: &mut Vec<UrlEntry>,
    children: &mut Vec<String>,
) {
    let loc = resolve_loc(builder.loc.trim(), base);
    if loc.is_empty() {
        debug!("skipping sitemap entry without <loc>");
    } else if root == Some(Root::Index) {
        children.push(loc);
    } else {
        entries.push(UrlEntry {
            loc,
            lastmod: trimmed(builder.lastmod),
            changefreq: trimmed(builder.changefreq),
            priority: builder.priority.and_then(|p| p.trim().parse::<f64>().ok()),
        });
    }
}

fn root_kind(name: &[u8]) -> Result<Root> {
    match name {
        b"urlset" => Ok(Root::UrlSet),
        b"sitemapindex" => Ok(Root::Index),
        other => Err(SitemapError::InvalidFormat(format!(
            "unexpected root element <{}>",
            String::from_utf8_lossy(other)
        ))),
    }
}

fn field_kind(name: &[u8]) -> Option<Field> {
    match name {
        b"loc" => Some(Field::Loc),
        b"lastmod" => Some(Field::Lastmod),
        b"changefreq" => Some(Field::Changefreq),
        b"priority" => Some(Field::Priority),
        _ => None,
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn resolve_loc(loc: &str, base: Option<&Url>) -> String {
    if loc.is_empty() || Url::parse(loc).is_ok() {
        return loc.to_string();
    }
    base.and_then(|b| b.join(loc).ok())
        .map_or_else(|| loc.to_string(), |u| u.to_string())
}

/// Resolves a sitemap or sitemap index into URL entries.
pub struct SitemapResolver {
    source: Arc<dyn SitemapSource>,
    max_children: usize,
}

impl SitemapResolver {
    pub fn new(source: Arc<dyn SitemapSource>) -> Self {
        Self {
            source,
            max_children: MAX_CHILD_SITEMAPS,
        }
    }

    #[must_use]
    pub fn with_max_children(mut self, max_children: usize) -> Self {
        self.max_children = max_children;
        self
    }

    /// Parse a sitemap, fetching the children of a sitemap index.
    ///
    /// Children are fetched sequentially, at most `max_children` of them. A
    /// child that fails to fetch or parse is skipped. A child that is itself
    /// an index is not expanded further.
    pub async fn parse(&self, xml: &str, base_url: &str) -> Result<Vec<UrlEntry>> {
        let children = match parse_document(xml, base_url)? {
            SitemapDocument::UrlSet(entries) => return Ok(entries),
            SitemapDocument::Index(children) => children,
        };

        info!("found {} sitemaps in sitemap index", children.len());
        let mut urls = Vec::new();

        for child in children.iter().take(self.max_children) {
            debug!("fetching child sitemap {child}");
            let content = match self.source.fetch_sitemap(child).await {
                Ok(content) => content,
                Err(e) => {
                    warn!("error fetching sitemap {child}: {e}");
                    continue;
                }
            };

            match parse_document(&content, base_url) {
                Ok(SitemapDocument::UrlSet(entries)) => urls.extend(entries),
                Ok(SitemapDocument::Index(nested)) => {
                    warn!(
                        "sitemap {child} is a nested index with {} children, not expanded",
                        nested.len()
                    );
                }
                Err(e) => warn!("error parsing sitemap {child}: {e}"),
            }
        }

        info!("total URLs found from all sitemaps: {}", urls.len());
        Ok(urls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URLSET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url>
    <loc>https://example.com/</loc>
    <lastmod>2024-01-01</lastmod>
    <changefreq>daily</changefreq>
    <priority>1.0</priority>
  </url>
  <url>
    <loc>https://example.com/blog/a?x=1&amp;y=2</loc>
    <priority>not-a-number</priority>
  </url>
  <url><loc><![CDATA[/about]]></loc></url>
</urlset>"#;

    #[test]
    fn test_parse_urlset() {
        let doc = parse_document(URLSET, "https://example.com").expect("parse");
        let SitemapDocument::UrlSet(entries) = doc else {
            panic!("expected urlset");
        };

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].loc, "https://example.com/");
        assert_eq!(entries[0].lastmod.as_deref(), Some("2024-01-01"));
        assert_eq!(entries[0].changefreq.as_deref(), Some("daily"));
        assert_eq!(entries[0].priority, Some(1.0));
        assert_eq!(entries[1].loc, "https://example.com/blog/a?x=1&y=2");
        assert_eq!(entries[1].priority, None);
        assert_eq!(entries[2].loc, "https://example.com/about");
    }

    #[test]
    fn test_parse_prefixed_namespace() {
        let xml = r#"<sm:urlset xmlns:sm="http://www.sitemaps.org/schemas/sitemap/0.9"><sm:url><sm:loc>https://a.com/x</sm:loc></sm:url></sm:urlset>"#;
        let doc = parse_document(xml, "https://a.com").expect("parse");
        assert_eq!(doc, SitemapDocument::UrlSet(vec![UrlEntry::new("https://a.com/x")]));
    }

    #[test]
    fn test_nested_extension_elements_do_not_leak_into_entry() {
        let xml = r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"
        xmlns:image="http://www.google.com/schemas/sitemap-image/1.1"
        xmlns:video="http://www.google.com/schemas/sitemap-video/1.1">
  <url>
    <loc>https://a.com/p</loc>
    <image:image><image:loc>https://a.com/i.jpg</image:loc></image:image>
    <lastmod>2024-05-01</lastmod>
    <video:video><video:title>Demo</video:title><video:priority>0.1</video:priority></video:video>
  </url>
  <url>
    <image:image><image:loc>https://a.com/only-image.jpg</image:loc></image:image>
  </url>
</urlset>"#;
        let doc = parse_document(xml, "https://a.com").expect("parse");
        let SitemapDocument::UrlSet(entries) = doc else {
            panic!("expected urlset");
        };

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].loc, "https://a.com/p");
        assert_eq!(entries[0].lastmod.as_deref(), Some("2024-05-01"));
        assert_eq!(entries[0].priority, None);
    }

    #[test]
    fn test_index_ignores_nested_loc() {
        let xml = r"<sitemapindex><sitemap><loc>https://a.com/s1.xml</loc><ext><loc>https://a.com/x.xml</loc></ext></sitemap></sitemapindex>";
        let doc = parse_document(xml, "https://a.com").expect("parse");
        assert_eq!(doc, SitemapDocument::Index(vec!["https://a.com/s1.xml".to_string()]));
    }

    #[test]
    fn test_parse_index() {
        let xml = r"<sitemapindex><sitemap><loc>https://a.com/s1.xml</loc><lastmod>2024</lastmod></sitemap><sitemap><loc>https://a.com/s2.xml</loc></sitemap></sitemapindex>";
        let doc = parse_document(xml, "https://a.com").expect("parse");
        assert_eq!(
            doc,
            SitemapDocument::Index(vec![
                "https://a.com/s1.xml".to_string(),
                "https://a.com/s2.xml".to_string()
            ])
        );
    }

    #[test]
    fn test_empty_urlset() {
        let doc = parse_document("<urlset/>", "https://a.com").expect("parse");
        assert_eq!(doc, SitemapDocument::UrlSet(Vec::new()));
    }

    #[test]
    fn test_unexpected_root_is_invalid_format() {
        let err = parse_document("<html><body>404</body></html>", "https://a.com")
            .expect_err("not a sitemap");
        assert!(matches!(err, SitemapError::InvalidFormat(_)));

        let err = parse_document("", "https://a.com").expect_err("empty");
        assert!(matches!(err, SitemapError::InvalidFormat(_)));
    }

    #[test]
    fn test_malformed_xml_is_parse_error() {
        let err = parse_document("<urlset><url><loc>x</url></urlset>", "https://a.com")
            .expect_err("mismatched tags");
        assert!(matches!(err, SitemapError::Parse(_)));
    }
}
