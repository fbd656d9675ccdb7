//! Bounded crawl samples from categorised sitemaps or homepage links.

use crate::categorize::{analyze, Categories, HOMEPAGE, OTHER};
use crate::error::{Result, SitemapError};
use regex::Regex;
use sitepulse_core::{
    CrawlingConfig, CrawlingLimits, FirstLevelPage, FirstLevelPages, SampleSitemap, SampleSource,
    SitemapUrl,
};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;
use tracing::info;
use url::Url;

/// Caps applied when sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleLimits {
    pub first_level_limit: usize,
    pub max_per_category: usize,
    /// Cap on links taken from the homepage in fallback mode
    pub fallback_link_limit: usize,
}

impl Default for SampleLimits {
    fn default() -> Self {
        Self {
            first_level_limit: 10,
            max_per_category: 2,
            fallback_link_limit: 20,
        }
    }
}

impl From<&CrawlingConfig> for SampleLimits {
    fn from(config: &CrawlingConfig) -> Self {
        Self {
            first_level_limit: config.first_level_limit,
            max_per_category: config.max_per_category,
            fallback_link_limit: config.fallback_link_limit,
        }
    }
}

/// Priority descending when both have one, prioritised before unprioritised,
/// then URL ascending.
fn by_priority_then_loc(a: &SitemapUrl, b: &SitemapUrl) -> Ordering {
    match (a.priority, b.priority) {
        (Some(pa), Some(pb)) => pb.total_cmp(&pa).then_with(|| a.loc.cmp(&b.loc)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.loc.cmp(&b.loc),
    }
}

fn skip_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)\.(jpg|jpeg|png|gif|svg|pdf|doc|docx|zip|exe)$",
            r"^/wp-admin",
            r"^/admin",
            r"^/login",
            r"^/register",
            r"^/cart",
            r"^/checkout",
            r"^/account",
            r"^/search",
            r"^/#",
            r"^/mailto:",
            r"^/tel:",
            r"^javascript:",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect()
    })
}

/// Non-content paths never taken from homepage links.
pub fn should_skip_link(pathname: &str) -> bool {
    skip_patterns().iter().any(|p| p.is_match(pathname))
}

fn dedup_by_loc(urls: Vec<SitemapUrl>) -> Vec<SitemapUrl> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|u| seen.insert(u.loc.clone()))
        .collect()
}

/// Selects a bounded, representative subset of a site's URLs.
#[derive(Debug, Clone, Default)]
pub struct UrlSampler {
    limits: SampleLimits,
}

impl UrlSampler {
    pub fn new(limits: SampleLimits) -> Self {
        Self { limits }
    }

    fn crawling_limits(&self) -> CrawlingLimits {
        CrawlingLimits {
            first_level_limit: self.limits.first_level_limit,
            max_per_category: self.limits.max_per_category,
        }
    }

    /// Sample categorised sitemap URLs.
    ///
    /// At most one homepage, the first `first_level_limit` depth-1 pages
    /// across all categories, and up to `max_per_category` deeper pages from
    /// every other category. Deterministic for identical input.
    pub fn sample(&self, categories: &Categories) -> SampleSitemap {
        let mut selected: Vec<SitemapUrl> =
            categories.get(HOMEPAGE).iter().take(1).cloned().collect();

        let mut first_level: Vec<SitemapUrl> = categories
            .iter()
            .flat_map(|(_, urls)| urls.iter().filter(|u| u.level == 1).cloned())
            .collect();
        first_level.sort_by(by_priority_then_loc);

        let crawled_first_level = first_level.len().min(self.limits.first_level_limit);
        selected.extend(first_level.iter().take(crawled_first_level).cloned());

        for (name, urls) in categories.iter() {
            if name == HOMEPAGE {
                continue;
            }
            let mut deeper: Vec<SitemapUrl> = urls.iter().filter(|u| u.level > 1).cloned().collect();
            deeper.sort_by(by_priority_then_loc);
            selected.extend(deeper.into_iter().take(self.limits.max_per_category));
        }

        let urls = dedup_by_loc(selected);
        info!(
            "created sample sitemap with {} URLs (first-level pages limited to {})",
            urls.len(),
            self.limits.first_level_limit
        );

        SampleSitemap {
            urls,
            categories: categories.counts(),
            first_level_pages: FirstLevelPages {
                total: first_level.len(),
                crawled: crawled_first_level,
                all_pages: first_level.iter().map(FirstLevelPage::from).collect(),
            },
            total_original_urls: categories.total(),
            crawling_limits: self.crawling_limits(),
            fallback: false,
            source: SampleSource::Sitemap,
        }
    }

    /// Sample links discovered on the homepage when no usable sitemap exists.
    ///
    /// The homepage always comes first. Same-host, non-denylisted links are
    /// ordered by depth then URL; depth-1 links are capped at
    /// `first_level_limit`, deeper links fill the rest up to
    /// `fallback_link_limit`.
    pub fn sample_from_links<'a, I>(&self, homepage: &str, links: I) -> Result<SampleSitemap>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let base =
            Url::parse(homepage).map_err(|e| SitemapError::InvalidUrl(format!("{homepage}: {e}")))?;
        let host = base.host_str();

        let home = SitemapUrl {
            loc: homepage.to_string(),
            lastmod: None,
            changefreq: None,
            priority: Some(1.0),
            level: 0,
            pathname: "/".to_string(),
            segments: Vec::new(),
            link_text: None,
        };

        let mut seen: HashSet<String> = HashSet::from([base.to_string(), homepage.to_string()]);
        let mut candidates = Vec::new();

        for (href, text) in links {
            let Ok(mut parsed) = Url::parse(href) else {
                continue;
            };
            parsed.set_fragment(None);
            if parsed.host_str() != host || should_skip_link(parsed.path()) {
                continue;
            }

            let (pathname, segments, level) = analyze(&parsed);
            if level == 0 || !seen.insert(parsed.to_string()) {
                continue;
            }

            candidates.push(SitemapUrl {
                loc: parsed.to_string(),
                lastmod: None,
                changefreq: None,
                priority: None,
                level,
                pathname,
                segments,
                link_text: Some(text.trim().to_string()),
            });
        }

        candidates.sort_by(|a, b| a.level.cmp(&b.level).then_with(|| a.loc.cmp(&b.loc)));

        let first_level: Vec<&SitemapUrl> = candidates.iter().filter(|u| u.level == 1).collect();
        let crawled_first_level = first_level.len().min(self.limits.first_level_limit);

        let mut selected: Vec<SitemapUrl> = first_level
            .iter()
            .take(crawled_first_level)
            .map(|u| (*u).clone())
            .collect();
        selected.extend(candidates.iter().filter(|u| u.level > 1).cloned());
        selected.truncate(self.limits.fallback_link_limit);

        info!("selected {} links from homepage crawl", selected.len());

        let mut urls = Vec::with_capacity(selected.len() + 1);
        urls.push(home);
        urls.extend(selected);

        Ok(SampleSitemap {
            categories: fallback_categories(&urls),
            first_level_pages: FirstLevelPages {
                total: first_level.len(),
                crawled: urls.iter().filter(|u| u.level == 1).count(),
                all_pages: first_level.into_iter().map(FirstLevelPage::from).collect(),
            },
            total_original_urls: candidates.len() + 1,
            crawling_limits: self.crawling_limits(),
            fallback: true,
            source: SampleSource::HomepageCrawl,
            urls,
        })
    }
}

fn fallback_categories(urls: &[SitemapUrl]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::from([(HOMEPAGE.to_string(), 0), (OTHER.to_string(), 0)]);
    for url in urls {
        let key = match (url.level, url.segments.first()) {
            (0, _) => HOMEPAGE.to_string(),
            (_, Some(segment)) => segment.clone(),
            (_, None) => OTHER.to_string(),
        };
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categorize::categorize;
    use sitepulse_core::UrlEntry;

    fn entry(loc: &str, priority: Option<f64>) -> UrlEntry {
        UrlEntry {
            priority,
            ..UrlEntry::new(loc)
        }
    }

    fn site() -> Vec<UrlEntry> {
        let mut urls = vec![entry("https://example.com/", Some(1.0))];
        for i in 0..15 {
            urls.push(entry(&format!("https://example.com/page-{i:02}"), None));
        }
        urls.push(entry("https://example.com/important", Some(0.9)));
        for i in 0..5 {
            urls.push(entry(&format!("https://example.com/blog/post-{i}"), Some(0.5)));
            urls.push(entry(&format!("https://example.com/shop/item-{i}"), None));
        }
        urls
    }

    #[test]
    fn test_sample_respects_caps() {
        let categories = categorize(&site(), "https://example.com").expect("categorize");
        let sample = UrlSampler::default().sample(&categories);

        let homepages = sample.urls.iter().filter(|u| u.level == 0).count();
        assert_eq!(homepages, 1);
        assert_eq!(sample.urls[0].loc, "https://example.com/");

        assert_eq!(sample.first_level_pages.total, 16);
        assert_eq!(sample.first_level_pages.crawled, 10);
        assert_eq!(sample.first_level_pages.all_pages.len(), 16);
        // Prioritised page sorts ahead of unprioritised ones.
        assert_eq!(sample.first_level_pages.all_pages[0].url, "https://example.com/important");

        let bound = 10 + 1 + (categories.len() - 1) * 2;
        assert!(sample.urls.len() <= bound);
        assert_eq!(sample.urls.iter().filter(|u| u.level == 2).count(), 4);
        assert_eq!(sample.total_original_urls, 27);
        assert_eq!(sample.categories.get("blog"), Some(&5));
        assert!(!sample.fallback);
    }

    #[test]
    fn test_sample_is_deterministic() {
        let categories = categorize(&site(), "https://example.com").expect("categorize");
        let sampler = UrlSampler::default();
        assert_eq!(sampler.sample(&categories), sampler.sample(&categories));
    }

    #[test]
    fn test_sample_deduplicates() {
        let urls = vec![
            entry("https://example.com/home", None),
            entry("https://example.com/home", None),
        ];
        let categories = categorize(&urls, "https://example.com").expect("categorize");
        let sample = UrlSampler::default().sample(&categories);
        assert_eq!(sample.urls.len(), 1);
    }

    #[test]
    fn test_skip_patterns() {
        assert!(should_skip_link("/wp-admin/options.php"));
        assert!(should_skip_link("/files/report.PDF"));
        assert!(should_skip_link("/cart"));
        assert!(!should_skip_link("/about"));
        assert!(!should_skip_link("/blog/admin-tips"));
    }

    #[test]
    fn test_fallback_from_links() {
        let links = [
            ("https://example.com/about", "About"),
            ("https://example.com/about#team", "Team"),
            ("https://example.com/blog/first", "First"),
            ("https://example.com/login", "Log in"),
            ("https://example.com/logo.png", ""),
            ("https://elsewhere.com/x", "External"),
            ("https://example.com/", "Home"),
            ("mailto:hi@example.com", "Mail"),
        ];
        let sample = UrlSampler::default()
            .sample_from_links("https://example.com", links)
            .expect("sample");

        let locs: Vec<&str> = sample.urls.iter().map(|u| u.loc.as_str()).collect();
        assert_eq!(
            locs,
            vec![
                "https://example.com",
                "https://example.com/about",
                "https://example.com/blog/first"
            ]
        );
        assert!(sample.fallback);
        assert_eq!(sample.source, SampleSource::HomepageCrawl);
        assert_eq!(sample.categories.get("homepage"), Some(&1));
        assert_eq!(sample.categories.get("about"), Some(&1));
        assert_eq!(sample.urls[1].link_text.as_deref(), Some("About"));
    }

    #[test]
    fn test_fallback_caps() {
        let hrefs: Vec<String> = (0..30)
            .map(|i| format!("https://example.com/p{i:02}"))
            .chain((0..30).map(|i| format!("https://example.com/d/{i:02}")))
            .collect();
        let sample = UrlSampler::default()
            .sample_from_links("https://example.com/", hrefs.iter().map(|h| (h.as_str(), "")))
            .expect("sample");

        assert_eq!(sample.urls.len(), 21);
        assert_eq!(sample.urls.iter().filter(|u| u.level == 1).count(), 10);
        assert_eq!(sample.first_level_pages.total, 30);
        assert_eq!(sample.urls[0].level, 0);
    }

    #[test]
    fn test_fallback_without_links_is_homepage_only() {
        let sample = UrlSampler::default()
            .sample_from_links("https://example.com", std::iter::empty())
            .expect("sample");
        assert_eq!(sample.urls.len(), 1);
        assert_eq!(sample.total_original_urls, 1);
    }
}
