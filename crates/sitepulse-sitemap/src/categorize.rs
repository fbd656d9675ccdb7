//! Group same-host sitemap URLs by their first path segment.

use crate::error::{Result, SitemapError};
use sitepulse_core::{SitemapUrl, UrlEntry};
use std::collections::BTreeMap;
use tracing::{debug, info};
use url::Url;

/// Bucket for root-like paths.
pub const HOMEPAGE: &str = "homepage";
/// Bucket for URLs whose first segment does not repeat.
pub const OTHER: &str = "other";

/// Category name to analysed URLs, in a stable key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Categories {
    buckets: BTreeMap<String, Vec<SitemapUrl>>,
}

impl Categories {
    pub fn get(&self, name: &str) -> &[SitemapUrl] {
        self.buckets
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[SitemapUrl])> {
        self.buckets.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of URLs per category.
    pub fn counts(&self) -> BTreeMap<String, usize> {
        self.buckets
            .iter()
            .map(|(k, v)| (k.clone(), v.len()))
            .collect()
    }

    /// URLs across all categories.
    pub fn total(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Path analysis for a parsed URL: lowercased path, non-empty segments, depth.
pub fn analyze(url: &Url) -> (String, Vec<String>, u32) {
    let pathname = url.path().to_lowercase();
    let segments: Vec<String> = pathname
        .split('/')
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect();
    let level = u32::try_from(segments.len()).unwrap_or(u32::MAX);
    (pathname, segments, level)
}

fn is_homepage_path(pathname: &str) -> bool {
    matches!(pathname, "" | "/" | "/home" | "/index" | "/homepage")
}

/// Split `urls` into categories relative to `base_url`.
///
/// Other hosts and unparseable locations are dropped. Root-like paths go to
/// [`HOMEPAGE`]; a first segment shared by at least two URLs becomes its own
/// category; everything else goes to [`OTHER`].
pub fn categorize(urls: &[UrlEntry], base_url: &str) -> Result<Categories> {
    let base =
        Url::parse(base_url).map_err(|e| SitemapError::InvalidUrl(format!("{base_url}: {e}")))?;
    let host = base.host_str();

    let mut homepage = Vec::new();
    let mut by_segment: BTreeMap<String, Vec<SitemapUrl>> = BTreeMap::new();

    for entry in urls {
        let Ok(parsed) = Url::parse(&entry.loc) else {
            debug!("skipping unparseable sitemap URL {}", entry.loc);
            continue;
        };
        if parsed.host_str() != host {
            continue;
        }

        let (pathname, segments, level) = analyze(&parsed);
        let is_home = is_homepage_path(&pathname);
        let first_segment = segments.first().cloned();
        let url = SitemapUrl {
            loc: entry.loc.clone(),
            lastmod: entry.lastmod.clone(),
            changefreq: entry.changefreq.clone(),
            priority: entry.priority,
            level,
            pathname,
            segments,
            link_text: None,
        };

        match first_segment {
            Some(segment) if !is_home => by_segment.entry(segment).or_default().push(url),
            _ => homepage.push(url),
        }
    }

    let mut buckets: BTreeMap<String, Vec<SitemapUrl>> = BTreeMap::new();
    buckets.insert(HOMEPAGE.to_string(), homepage);
    buckets.insert(OTHER.to_string(), Vec::new());

    for (segment, urls) in by_segment {
        let name = if urls.len() >= 2 { segment } else { OTHER.to_string() };
        buckets.entry(name).or_default().extend(urls);
    }

    info!(
        "auto-detected URL categories: {}",
        buckets
            .iter()
            .map(|(k, v)| format!("{k}={}", v.len()))
            .collect::<Vec<_>>()
            .join(", ")
    );

    Ok(Categories { buckets })
}
