//! JSON bodies posted to the analysis endpoints.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sitepulse_core::{CrawlJob, CrawlPage, JobId};

/// Envelope attached to every payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Event name, e.g. `page.crawled`
    pub event: &'static str,
    /// Producer name
    pub source: &'static str,
    /// Producer version
    pub version: &'static str,
    /// When the payload was built
    pub sent_at: DateTime<Utc>,
}

impl Metadata {
    fn new(event: &'static str) -> Self {
        Self {
            event,
            source: "sitepulse",
            version: env!("CARGO_PKG_VERSION"),
            sent_at: Utc::now(),
        }
    }
}

/// Per-page analysis request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageAnalysisPayload {
    /// Owning job
    pub job_id: JobId,
    /// Page row
    pub page_id: String,
    /// Site being analysed
    pub site_url: String,
    /// Sampled URL
    pub url: String,
    /// URL after redirects
    pub final_url: String,
    /// HTTP status
    pub status_code: u16,
    /// Document title
    pub title: Option<String>,
    /// Rendered HTML
    pub html: Option<String>,
    /// Path depth
    pub level: u32,
    /// Lowercased path
    pub pathname: String,
    /// Path segments
    pub segments: Vec<String>,
    /// Sitemap priority of the sampled entry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<f64>,
    /// Sitemap last modification of the sampled entry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lastmod: Option<String>,
    /// Sitemap change frequency of the sampled entry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changefreq: Option<String>,
    /// Envelope
    pub metadata: Metadata,
}

impl PageAnalysisPayload {
    /// Build from a stored page and the site URL of its job.
    #[must_use]
    pub fn new(site_url: &str, page: &CrawlPage) -> Self {
        Self {
            job_id: page.crawl_job_id.clone(),
            page_id: page.id.clone(),
            site_url: site_url.to_string(),
            url: page.url.clone(),
            final_url: page.final_url.clone(),
            status_code: page.status_code,
            title: page.title.clone(),
            html: page.html.clone(),
            level: page.level,
            pathname: page.pathname.clone(),
            segments: page.segments.clone(),
            priority: page.priority,
            lastmod: page.lastmod.clone(),
            changefreq: page.changefreq.clone(),
            metadata: Metadata::new("page.crawled"),
        }
    }
}

/// Whole-job analysis request sent after crawling completes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCompletionPayload {
    /// Job record as stored
    pub job: CrawlJob,
    /// Every page of the job
    pub pages: Vec<CrawlPage>,
    /// Envelope
    pub metadata: Metadata,
}

impl JobCompletionPayload {
    /// Build from a job and its pages.
    #[must_use]
    pub fn new(job: CrawlJob, pages: Vec<CrawlPage>) -> Self {
        Self {
            job,
            pages,
            metadata: Metadata::new("job.completed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> CrawlPage {
        CrawlPage {
            id: "page-1".to_string(),
            crawl_job_id: JobId::new("job-1").expect("valid id"),
            url: "https://example.com/about".to_string(),
            title: Some("About".to_string()),
            html: Some("<html></html>".to_string()),
            status_code: 200,
            redirected: false,
            final_url: "https://example.com/about".to_string(),
            level: 1,
            pathname: "/about".to_string(),
            segments: vec!["about".to_string()],
            priority: None,
            changefreq: None,
            lastmod: None,
            error: None,
            ai_processed: false,
            ai_response: None,
            ai_error: None,
            ai_processed_at: None,
            ai_retry_count: 0,
            crawled_at: Utc::now(),
        }
    }

    #[test]
    fn test_page_payload_shape() {
        let payload = PageAnalysisPayload::new("https://example.com", &page());
        let json = serde_json::to_value(&payload).expect("serialize");

        assert_eq!(json["jobId"], "job-1");
        assert_eq!(json["pageId"], "page-1");
        assert_eq!(json["statusCode"], 200);
        assert_eq!(json["metadata"]["event"], "page.crawled");
        assert_eq!(json["metadata"]["source"], "sitepulse");
        assert!(json["metadata"]["sentAt"].is_string());
        assert!(json.get("priority").is_none());
        assert!(json.get("lastmod").is_none());
    }

    #[test]
    fn test_page_payload_carries_sitemap_entry() {
        let page = CrawlPage {
            priority: Some(0.8),
            changefreq: Some("weekly".to_string()),
            lastmod: Some("2024-05-01".to_string()),
            ..page()
        };
        let json = serde_json::to_value(PageAnalysisPayload::new("https://example.com", &page))
            .expect("serialize");

        assert_eq!(json["priority"], 0.8);
        assert_eq!(json["changefreq"], "weekly");
        assert_eq!(json["lastmod"], "2024-05-01");
    }
}
