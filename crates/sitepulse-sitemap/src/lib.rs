//! Sitemap resolution and crawl sampling.
//!
//! Parses sitemaps and sitemap indexes, groups a site's URLs into categories
//! by first path segment, and selects a bounded sample to crawl. When a site
//! has no usable sitemap, the sample is built from links found on its homepage.

pub mod categorize;
pub mod error;
pub mod parser;
pub mod sampler;

pub use categorize::{categorize, Categories, HOMEPAGE, OTHER};
pub use error::{Result, SitemapError};
pub use parser::{parse_document, SitemapDocument, SitemapResolver, SitemapSource};
pub use sampler::{should_skip_link, SampleLimits, UrlSampler};
