//! SitePulse Webhook - best-effort delivery of crawl data to AI analysis endpoints.
//!
//! Dispatch never returns an error to the caller. Every call resolves to a
//! [`WebhookOutcome`](sitepulse_core::WebhookOutcome): succeeded, failed after
//! retries, or skipped because no endpoint is configured.

pub mod dispatcher;
pub mod error;
pub mod payload;

pub use dispatcher::{RetryPolicy, WebhookDispatch, WebhookDispatcher};
pub use error::{Result, WebhookError};
pub use payload::{JobCompletionPayload, Metadata, PageAnalysisPayload};
