//! Crawl job and page records.
//!
//! A [`CrawlJob`] is one end-to-end website analysis request. It owns zero or
//! more [`CrawlPage`] rows, one per sampled URL.

use crate::error::SitepulseError;
use crate::sample::SampleSitemap;
use crate::types::JobId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a crawl job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Created by intake, awaiting verification
    Pending,
    /// Verified and waiting for the background processor
    Verified,
    /// Currently moving through the pipeline
    Processing,
    /// All stages finished
    Completed,
    /// A stage failed; see `failed_step` and `error`
    Failed,
    /// Cancelled during verification
    Cancelled,
}

impl JobStatus {
    /// Stable string form used in storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether no further transitions happen from this status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = SitepulseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "verified" => Ok(Self::Verified),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(SitepulseError::Validation(format!(
                "unknown job status '{other}'"
            ))),
        }
    }
}

/// Ordered steps of the job pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Check the submitted URL and derive the homepage
    UrlAndHomepage,
    /// Fetch and store robots.txt
    RobotsTxt,
    /// Locate and store the sitemap document
    SitemapXml,
    /// Build the bounded crawl sample
    SampleSitemap,
    /// Crawl sampled pages in batches
    CrawlPages,
    /// Post the whole job to the completion webhook
    CompletionWebhook,
    /// Hand off to the notifier
    Notification,
}

impl Stage {
    /// Stages in execution order.
    pub const PIPELINE: [Stage; 7] = [
        Stage::UrlAndHomepage,
        Stage::RobotsTxt,
        Stage::SitemapXml,
        Stage::SampleSitemap,
        Stage::CrawlPages,
        Stage::CompletionWebhook,
        Stage::Notification,
    ];

    /// Stable string form stored in `failed_step`.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UrlAndHomepage => "url_and_homepage",
            Self::RobotsTxt => "robots_txt",
            Self::SitemapXml => "sitemap_xml",
            Self::SampleSitemap => "sample_sitemap",
            Self::CrawlPages => "crawl_pages",
            Self::CompletionWebhook => "completion_webhook",
            Self::Notification => "notification",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = SitepulseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::PIPELINE
            .iter()
            .copied()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| SitepulseError::Validation(format!("unknown pipeline stage '{s}'")))
    }
}

/// Aggregate counters written when page crawling finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlStats {
    /// URLs in the sample
    pub total_pages: usize,
    /// Pages fetched successfully
    pub successful_pages: usize,
    /// Pages whose fetch failed
    pub failed_pages: usize,
    /// Page webhook calls that succeeded
    pub ai_succeeded: usize,
    /// Page webhook calls that failed
    pub ai_failed: usize,
    /// Page webhook calls skipped (endpoint unconfigured)
    pub ai_skipped: usize,
    /// When crawling finished
    pub completed_at: DateTime<Utc>,
}

/// Result of one webhook dispatch, persisted on the owning page or job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookOutcome {
    /// The endpoint accepted the payload
    pub success: bool,
    /// No endpoint was configured; nothing was sent
    pub skipped: bool,
    /// HTTP status of the final attempt, if a response arrived
    pub status: Option<u16>,
    /// Response body of a successful call
    pub data: Option<JsonValue>,
    /// Error text of a failed or skipped call
    pub error: Option<String>,
    /// Retries performed after the first attempt
    pub retries: u32,
    /// When the final attempt finished
    pub attempted_at: DateTime<Utc>,
}

impl WebhookOutcome {
    /// Outcome for an unconfigured endpoint.
    #[must_use]
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            skipped: true,
            status: None,
            data: None,
            error: Some(reason.into()),
            retries: 0,
            attempted_at: Utc::now(),
        }
    }

    /// Outcome for an accepted payload.
    #[must_use]
    pub fn succeeded(status: u16, data: Option<JsonValue>, retries: u32) -> Self {
        Self {
            success: true,
            skipped: false,
            status: Some(status),
            data,
            error: None,
            retries,
            attempted_at: Utc::now(),
        }
    }

    /// Outcome for a payload that was never accepted.
    #[must_use]
    pub fn failed(status: Option<u16>, error: impl Into<String>, retries: u32) -> Self {
        Self {
            success: false,
            skipped: false,
            status,
            data: None,
            error: Some(error.into()),
            retries,
            attempted_at: Utc::now(),
        }
    }

    /// A call was attempted and did not succeed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        !self.success && !self.skipped
    }
}

/// Diagnostics recorded when a stage fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetails {
    /// Top-level error message
    pub message: String,
    /// Source chain, outermost first
    pub chain: Vec<String>,
    /// Stage that failed
    pub stage: Stage,
    /// When the failure was recorded
    pub occurred_at: DateTime<Utc>,
}

impl ErrorDetails {
    /// Capture an error and its source chain.
    #[must_use]
    pub fn capture(stage: Stage, error: &(dyn std::error::Error + 'static)) -> Self {
        let mut chain = Vec::new();
        let mut source = error.source();
        while let Some(err) = source {
            chain.push(err.to_string());
            source = err.source();
        }

        Self {
            message: error.to_string(),
            chain,
            stage,
            occurred_at: Utc::now(),
        }
    }
}

/// One crawl request and everything the pipeline has learned about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlJob {
    /// Unique identifier
    pub id: JobId,
    /// URL submitted by the requester
    pub url: String,
    /// Contact email for the completion notice
    pub email: String,
    /// Lifecycle status
    pub status: JobStatus,
    /// Set by the verification layer
    pub verified: bool,
    /// Set by the verification layer
    pub cancelled: bool,
    /// Verification attempts made by the requester
    pub verify_attempts: u32,
    /// Homepage derived from the resolved URL
    pub homepage: Option<String>,
    /// Raw robots.txt, `None` when absent
    pub robots_txt: Option<String>,
    /// Raw sitemap document, `None` when absent
    pub sitemap_xml: Option<String>,
    /// Bounded sample chosen for crawling; immutable once written
    pub sample_sitemap: Option<SampleSitemap>,
    /// Aggregate crawl counters
    pub crawl_stats: Option<CrawlStats>,
    /// Outcome of the completion webhook
    pub crawl_completion_ai: Option<WebhookOutcome>,
    /// Stage that failed
    pub failed_step: Option<Stage>,
    /// Failure message
    pub error: Option<String>,
    /// Failure diagnostics
    pub error_details: Option<ErrorDetails>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl CrawlJob {
    /// The only state the pipeline accepts as an entry point.
    #[must_use]
    pub fn is_ready_for_processing(&self) -> bool {
        self.status == JobStatus::Verified && self.verified && !self.cancelled
    }
}

/// Lightweight job view for status queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    /// Unique identifier
    pub id: JobId,
    /// Submitted URL
    pub url: String,
    /// Contact email
    pub email: String,
    /// Lifecycle status
    pub status: JobStatus,
    /// Verification flag
    pub verified: bool,
    /// Cancellation flag
    pub cancelled: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

/// One sampled URL's crawl result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlPage {
    /// Unique identifier
    pub id: String,
    /// Owning job
    pub crawl_job_id: JobId,
    /// Sampled URL
    pub url: String,
    /// Document title, `None` on failure
    pub title: Option<String>,
    /// Rendered HTML, `None` on failure
    pub html: Option<String>,
    /// HTTP status; 0 when the fetch never completed
    pub status_code: u16,
    /// Navigation ended on a different URL
    pub redirected: bool,
    /// URL after redirects
    pub final_url: String,
    /// Path depth
    pub level: u32,
    /// Lowercased path
    pub pathname: String,
    /// Path segments
    pub segments: Vec<String>,
    /// Sitemap priority
    pub priority: Option<f64>,
    /// Sitemap change frequency
    pub changefreq: Option<String>,
    /// Sitemap last modification
    pub lastmod: Option<String>,
    /// Crawl error message
    pub error: Option<String>,
    /// An AI analysis attempt (or skip) was recorded
    pub ai_processed: bool,
    /// Opaque analysis returned by the webhook
    pub ai_response: Option<JsonValue>,
    /// Analysis failure or skip reason
    pub ai_error: Option<String>,
    /// When the analysis outcome was recorded
    pub ai_processed_at: Option<DateTime<Utc>>,
    /// Webhook retries used
    pub ai_retry_count: u32,
    /// When the page was crawled
    pub crawled_at: DateTime<Utc>,
}

impl CrawlPage {
    /// The fetch produced a page.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.status_code != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_round_trip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Verified,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().ok(), Some(status));
        }
        assert!("archived".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::Verified.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }

    #[test]
    fn test_stage_order_and_parse() {
        assert_eq!(Stage::PIPELINE[0], Stage::UrlAndHomepage);
        assert_eq!(Stage::PIPELINE[4], Stage::CrawlPages);
        assert_eq!("sitemap_xml".parse::<Stage>().ok(), Some(Stage::SitemapXml));
        assert!("unknown".parse::<Stage>().is_err());
    }

    #[test]
    fn test_webhook_outcome_states() {
        let skipped = WebhookOutcome::skipped("not configured");
        assert!(skipped.skipped);
        assert!(!skipped.is_failure());

        let failed = WebhookOutcome::failed(Some(502), "bad gateway", 3);
        assert!(failed.is_failure());
        assert_eq!(failed.retries, 3);

        let ok = WebhookOutcome::succeeded(200, None, 0);
        assert!(ok.success);
        assert!(!ok.is_failure());
    }

    #[test]
    fn test_error_details_capture_chain() {
        let inner = std::io::Error::new(std::io::ErrorKind::Other, "socket closed");
        let outer = SitepulseError::Io(inner);
        let details = ErrorDetails::capture(Stage::RobotsTxt, &outer);

        assert_eq!(details.stage, Stage::RobotsTxt);
        assert!(details.message.contains("socket closed"));
    }

    #[test]
    fn test_stats_serialize_camel_case() {
        let stats = CrawlStats {
            total_pages: 3,
            successful_pages: 2,
            failed_pages: 1,
            ai_succeeded: 0,
            ai_failed: 0,
            ai_skipped: 2,
            completed_at: Utc::now(),
        };
        let json = serde_json::to_value(&stats).expect("serialize stats");
        assert_eq!(json["totalPages"], 3);
        assert_eq!(json["aiSkipped"], 2);
    }
}
