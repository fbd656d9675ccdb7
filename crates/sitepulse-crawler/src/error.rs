//! Crawl pipeline errors.

use sitepulse_browser::{BrowserError, FetchError};
use sitepulse_core::{JobId, JobStatus, Stage};
use sitepulse_db::DatabaseError;
use sitepulse_sitemap::SitemapError;
use thiserror::Error;

/// Errors from running a job through the pipeline.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// No job with this ID
    #[error("Job {0} not found")]
    JobNotFound(JobId),

    /// Job is not verified, or has been cancelled
    #[error("Job {job_id} is not ready for processing (status {status})")]
    NotReady {
        /// Job that was refused
        job_id: JobId,
        /// Its status at the time
        status: JobStatus,
    },

    /// Another caller holds this job
    #[error("Job {0} is already being processed")]
    AlreadyProcessing(JobId),

    /// The site URL answered with an error status
    #[error("URL returned {status}: {url}")]
    UrlStatus {
        /// HTTP status code
        status: u16,
        /// URL that was checked
        url: String,
    },

    /// A stage needed output an earlier stage did not persist
    #[error("Job {job_id} has no {field}")]
    MissingField {
        /// Job being processed
        job_id: JobId,
        /// Missing job field
        field: &'static str,
    },

    /// Wraps the error of the stage that failed the job
    #[error("Stage {stage} failed: {source}")]
    StageFailed {
        /// Failing stage
        stage: Stage,
        /// Underlying error
        #[source]
        source: Box<CrawlError>,
    },

    /// Job store errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// HTTP probe errors
    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    /// Page fetch errors after retries
    #[error("Page fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Sitemap discovery and parsing errors
    #[error("Sitemap error: {0}")]
    Sitemap(#[from] SitemapError),
}

impl CrawlError {
    /// Stage that failed, for errors raised inside the pipeline.
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            Self::StageFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Result type alias using `CrawlError`.
pub type Result<T> = std::result::Result<T, CrawlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_failed_display_and_source() {
        let inner = CrawlError::UrlStatus {
            status: 404,
            url: "https://example.com/missing".to_string(),
        };
        let err = CrawlError::StageFailed {
            stage: Stage::UrlAndHomepage,
            source: Box::new(inner),
        };

        assert_eq!(
            err.to_string(),
            "Stage url_and_homepage failed: URL returned 404: https://example.com/missing"
        );
        assert_eq!(err.failed_stage(), Some(Stage::UrlAndHomepage));
        assert!(std::error::Error::source(&err).is_some());
    }
}
