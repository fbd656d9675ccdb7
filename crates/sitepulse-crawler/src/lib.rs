//! SitePulse Crawler - crawl job orchestration.
//!
//! Drives verified crawl jobs through the pipeline: URL and homepage
//! resolution, robots.txt, sitemap discovery, sampling, batched page
//! crawling with per-page analysis webhooks, and the best-effort completion
//! webhook and e-mail notice.
//!
//! # Example
//!
//! ```rust,ignore
//! use sitepulse_crawler::{CrawlProcessor, JobPipeline};
//! use std::sync::Arc;
//!
//! let pipeline = JobPipeline::new(store, probe, fetcher, webhooks)
//!     .with_crawling(&config.crawling)
//!     .with_notifier(notifier);
//! let processor = CrawlProcessor::new(Arc::new(pipeline), config.crawling.scan_interval());
//! processor.start();
//! // ...
//! processor.stop().await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod batch;
pub mod error;
pub mod pipeline;
pub mod processor;

// Re-export commonly used types
pub use batch::{BatchCoordinator, BatchSettings};
pub use error::{CrawlError, Result};
pub use pipeline::{InFlight, InFlightGuard, JobPipeline};
pub use processor::{CrawlProcessor, ScanReport};
