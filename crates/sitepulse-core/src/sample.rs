//! Sitemap entries and the bounded sample chosen for crawling.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One `<url>` entry from a sitemap document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlEntry {
    /// Absolute location
    pub loc: String,
    /// Last modification, as written in the sitemap
    pub lastmod: Option<String>,
    /// Change frequency hint
    pub changefreq: Option<String>,
    /// Priority in `[0, 1]`, if declared and numeric
    pub priority: Option<f64>,
}

impl UrlEntry {
    /// Entry with only a location.
    #[must_use]
    pub fn new(loc: impl Into<String>) -> Self {
        Self {
            loc: loc.into(),
            lastmod: None,
            changefreq: None,
            priority: None,
        }
    }
}

/// A same-host URL with its path analysis, as carried in a sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SitemapUrl {
    /// Absolute location
    pub loc: String,
    /// Last modification
    pub lastmod: Option<String>,
    /// Change frequency hint
    pub changefreq: Option<String>,
    /// Priority
    pub priority: Option<f64>,
    /// Number of non-empty path segments
    pub level: u32,
    /// Lowercased path
    pub pathname: String,
    /// Non-empty path segments
    pub segments: Vec<String>,
    /// Anchor text, for links discovered on the homepage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_text: Option<String>,
}

impl SitemapUrl {
    /// A first-level page is exactly one segment deep.
    #[must_use]
    pub fn is_first_level(&self) -> bool {
        self.level == 1
    }
}

/// Where a sample's URLs came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleSource {
    /// Parsed from a sitemap document
    Sitemap,
    /// Discovered from links on the homepage
    HomepageCrawl,
}

/// A first-level page as listed for reporting, crawled or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirstLevelPage {
    /// Absolute location
    pub url: String,
    /// Path depth, always 1
    pub level: u32,
    /// Lowercased path
    pub pathname: String,
    /// Priority
    pub priority: Option<f64>,
    /// Change frequency hint
    pub changefreq: Option<String>,
    /// Last modification
    pub lastmod: Option<String>,
}

impl From<&SitemapUrl> for FirstLevelPage {
    fn from(url: &SitemapUrl) -> Self {
        Self {
            url: url.loc.clone(),
            level: url.level,
            pathname: url.pathname.clone(),
            priority: url.priority,
            changefreq: url.changefreq.clone(),
            lastmod: url.lastmod.clone(),
        }
    }
}

/// Every first-level page discovered, and how many were crawled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirstLevelPages {
    /// Discovered first-level pages
    pub total: usize,
    /// First-level pages included in the sample
    pub crawled: usize,
    /// The full sorted list, including pages not crawled
    pub all_pages: Vec<FirstLevelPage>,
}

/// Caps applied when the sample was built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlingLimits {
    /// Maximum first-level pages crawled
    pub first_level_limit: usize,
    /// Maximum deeper pages per category
    pub max_per_category: usize,
}

/// Bounded, representative subset of a site selected for crawling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleSitemap {
    /// URLs to crawl, homepage first, deduplicated
    pub urls: Vec<SitemapUrl>,
    /// Category name to number of discovered URLs
    pub categories: BTreeMap<String, usize>,
    /// First-level page accounting
    pub first_level_pages: FirstLevelPages,
    /// URLs considered before sampling
    pub total_original_urls: usize,
    /// Caps in effect
    pub crawling_limits: CrawlingLimits,
    /// Built from homepage links because no usable sitemap existed
    #[serde(default)]
    pub fallback: bool,
    /// Origin of the URLs
    pub source: SampleSource,
}

impl SampleSitemap {
    /// Number of URLs that will be crawled.
    #[must_use]
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    /// No URLs selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}
