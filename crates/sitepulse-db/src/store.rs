//! Storage interface used by the crawl pipeline.

use crate::error::Result;
use crate::pages::NewPage;
use crate::{jobs, pages, Database};
use async_trait::async_trait;
use sitepulse_core::{
    CrawlJob, CrawlPage, CrawlStats, ErrorDetails, JobId, JobSummary, SampleSitemap,
    WebhookOutcome,
};

/// Job and page persistence needed to drive a job through the pipeline.
///
/// Implemented by [`Database`]; the pipeline only sees this trait so tests
/// can observe or fail individual writes.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Jobs ready for processing, oldest first.
    async fn find_verified_jobs(&self) -> Result<Vec<CrawlJob>>;

    /// Full job record.
    async fn get_job(&self, id: &JobId) -> Result<Option<CrawlJob>>;

    /// Status view of a job.
    async fn get_job_summary(&self, id: &JobId) -> Result<Option<JobSummary>>;

    /// Move a ready job to `processing`; `false` if it was not ready.
    async fn mark_processing(&self, id: &JobId) -> Result<bool>;

    /// Record the derived homepage.
    async fn set_homepage(&self, id: &JobId, homepage: &str) -> Result<()>;

    /// Record the raw robots.txt.
    async fn set_robots_txt(&self, id: &JobId, robots_txt: Option<&str>) -> Result<()>;

    /// Record the raw sitemap document.
    async fn set_sitemap_xml(&self, id: &JobId, sitemap_xml: Option<&str>) -> Result<()>;

    /// Persist the crawl sample once.
    async fn set_sample_sitemap(&self, id: &JobId, sample: &SampleSitemap) -> Result<()>;

    /// Store counters and mark the job completed.
    async fn complete_job(&self, id: &JobId, stats: &CrawlStats) -> Result<()>;

    /// Mark the job failed.
    async fn fail_job(&self, id: &JobId, details: &ErrorDetails) -> Result<()>;

    /// Record the completion webhook outcome.
    async fn set_completion_webhook(&self, id: &JobId, outcome: &WebhookOutcome) -> Result<()>;

    /// Insert a crawled page.
    async fn create_page(&self, page: &NewPage) -> Result<CrawlPage>;

    /// Record a page's analysis webhook outcome.
    async fn record_page_analysis(&self, page_id: &str, outcome: &WebhookOutcome) -> Result<()>;

    /// Pages of a job in crawl order.
    async fn list_pages(&self, job_id: &JobId) -> Result<Vec<CrawlPage>>;
}

#[async_trait]
impl JobStore for Database {
    async fn find_verified_jobs(&self) -> Result<Vec<CrawlJob>> {
        jobs::find_verified_jobs(self.pool()).await
    }

    async fn get_job(&self, id: &JobId) -> Result<Option<CrawlJob>> {
        jobs::get_job(self.pool(), id).await
    }

    async fn get_job_summary(&self, id: &JobId) -> Result<Option<JobSummary>> {
        jobs::get_job_summary(self.pool(), id).await
    }

    async fn mark_processing(&self, id: &JobId) -> Result<bool> {
        jobs::mark_processing(self.pool(), id).await
    }

    async fn set_homepage(&self, id: &JobId, homepage: &str) -> Result<()> {
        jobs::set_homepage(self.pool(), id, homepage).await
    }

    async fn set_robots_txt(&self, id: &JobId, robots_txt: Option<&str>) -> Result<()> {
        jobs::set_robots_txt(self.pool(), id, robots_txt).await
    }

    async fn set_sitemap_xml(&self, id: &JobId, sitemap_xml: Option<&str>) -> Result<()> {
        jobs::set_sitemap_xml(self.pool(), id, sitemap_xml).await
    }

    async fn set_sample_sitemap(&self, id: &JobId, sample: &SampleSitemap) -> Result<()> {
        jobs::set_sample_sitemap(self.pool(), id, sample).await
    }

    async fn complete_job(&self, id: &JobId, stats: &CrawlStats) -> Result<()> {
        jobs::complete_job(self.pool(), id, stats).await
    }

    async fn fail_job(&self, id: &JobId, details: &ErrorDetails) -> Result<()> {
        jobs::fail_job(self.pool(), id, details).await
    }

    async fn set_completion_webhook(&self, id: &JobId, outcome: &WebhookOutcome) -> Result<()> {
        jobs::set_completion_webhook(self.pool(), id, outcome).await
    }

    async fn create_page(&self, page: &NewPage) -> Result<CrawlPage> {
        pages::create_page(self.pool(), page).await
    }

    async fn record_page_analysis(&self, page_id: &str, outcome: &WebhookOutcome) -> Result<()> {
        pages::record_page_analysis(self.pool(), page_id, outcome).await
    }

    async fn list_pages(&self, job_id: &JobId) -> Result<Vec<CrawlPage>> {
        pages::list_pages(self.pool(), job_id).await
    }
}
