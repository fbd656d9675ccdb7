//! SitePulse Core - Foundation crate for the SitePulse crawl pipeline.
//!
//! This crate provides shared domain types, error handling and configuration
//! management that all other SitePulse crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths and env overrides
//! - [`types`] - Identifier newtypes (`JobId`)
//! - [`job`] - Crawl job and page records, lifecycle status, pipeline stages
//! - [`sample`] - Sitemap entries and the bounded sample selected for crawling
//!
//! # Example
//!
//! ```rust
//! use sitepulse_core::{AppConfig, JobStatus};
//!
//! let config = AppConfig::default();
//! assert_eq!(config.crawling.batch_size, 3);
//! assert_eq!(JobStatus::Verified.as_str(), "verified");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod job;
pub mod sample;
pub mod types;

// Re-export commonly used types
pub use config::{
    AppConfig, BrowserConfig, CrawlingConfig, DatabaseConfig, HttpConfig, NotificationConfig,
    WebhookConfig,
};
pub use error::{ConfigError, ConfigResult, Result, SitepulseError};
pub use job::{
    CrawlJob, CrawlPage, CrawlStats, ErrorDetails, JobStatus, JobSummary, Stage, WebhookOutcome,
};
pub use sample::{
    CrawlingLimits, FirstLevelPage, FirstLevelPages, SampleSitemap, SampleSource, SitemapUrl,
    UrlEntry,
};
pub use types::JobId;
