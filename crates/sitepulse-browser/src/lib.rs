//! Remote page fetching for SitePulse.
//!
//! Renders pages on a remote headless browser with bounded retries and
//! wait-strategy escalation, and probes sites over plain HTTP for status,
//! robots.txt and sitemap documents.

pub mod classify;
pub mod engine;
pub mod error;
pub mod homepage;
pub mod http;
pub mod session;
pub mod strategy;

pub use engine::{FetchOptions, FetchedPage, PageFetch, PageFetcher};
pub use error::{BrowserError, ErrorClass, FetchError, Result};
pub use homepage::extract_homepage;
pub use http::{HttpProbe, SiteProbe, SitemapDocument, UrlStatus};
pub use session::{BrowserSession, PageLink, PageSnapshot, RemoteSessionFactory, SessionFactory};
pub use strategy::{FetchPolicy, WaitStrategy};
