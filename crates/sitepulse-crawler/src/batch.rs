//! Batch crawl coordination.
//!
//! Sampled URLs are split into fixed-size batches. Batches run one after the
//! other; the URLs inside a batch are fetched concurrently and the batch ends
//! when all of them have finished.

use crate::error::Result;
use futures::future::join_all;
use sitepulse_browser::{FetchOptions, PageFetch};
use sitepulse_core::{CrawlJob, CrawlStats, CrawlingConfig, SitemapUrl, WebhookOutcome};
use sitepulse_db::{JobStore, NewPage};
use sitepulse_webhook::{PageAnalysisPayload, WebhookDispatch};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Batch size and the pause between batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSettings {
    /// URLs fetched concurrently per batch
    pub batch_size: usize,
    /// Pause after every batch except the last
    pub batch_delay: Duration,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            batch_size: 3,
            batch_delay: Duration::from_secs(2),
        }
    }
}

impl From<&CrawlingConfig> for BatchSettings {
    fn from(config: &CrawlingConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            batch_delay: config.batch_delay(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Analysis {
    Succeeded,
    Failed,
    Skipped,
    NotAttempted,
}

#[derive(Debug, Clone, Copy)]
struct PageOutcome {
    fetched: bool,
    analysis: Analysis,
}

impl Analysis {
    fn from_outcome(outcome: &WebhookOutcome) -> Self {
        if outcome.success {
            Self::Succeeded
        } else if outcome.skipped {
            Self::Skipped
        } else {
            Self::Failed
        }
    }
}

/// Crawls a job's sample and finalises its statistics.
pub struct BatchCoordinator {
    store: Arc<dyn JobStore>,
    fetcher: Arc<dyn PageFetch>,
    webhooks: Arc<dyn WebhookDispatch>,
    settings: BatchSettings,
}

impl BatchCoordinator {
    /// Coordinator with the default batch settings.
    pub fn new(
        store: Arc<dyn JobStore>,
        fetcher: Arc<dyn PageFetch>,
        webhooks: Arc<dyn WebhookDispatch>,
    ) -> Self {
        Self {
            store,
            fetcher,
            webhooks,
            settings: BatchSettings::default(),
        }
    }

    /// Replace the batch settings.
    #[must_use]
    pub fn with_settings(mut self, settings: BatchSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Crawl every URL, storing exactly one page per URL, then write the
    /// aggregate stats and mark the job completed.
    ///
    /// Fetch and webhook failures only annotate their own page. Store errors
    /// abort the crawl.
    pub async fn crawl(&self, job: &CrawlJob, urls: &[SitemapUrl]) -> Result<CrawlStats> {
        let batches: Vec<&[SitemapUrl]> = urls.chunks(self.settings.batch_size.max(1)).collect();
        let batch_count = batches.len();
        let mut outcomes = Vec::with_capacity(urls.len());

        info!(
            "Job {}: crawling {} URLs in {} batches",
            job.id,
            urls.len(),
            batch_count
        );

        for (index, batch) in batches.into_iter().enumerate() {
            info!(
                "Job {}: batch {}/{} ({} URLs)",
                job.id,
                index + 1,
                batch_count,
                batch.len()
            );

            let results = join_all(batch.iter().map(|url| self.crawl_one(job, url))).await;
            for result in results {
                outcomes.push(result?);
            }

            if index + 1 < batch_count && !self.settings.batch_delay.is_zero() {
                debug!("Waiting {:?} before next batch", self.settings.batch_delay);
                tokio::time::sleep(self.settings.batch_delay).await;
            }
        }

        let stats = tally(&outcomes);
        self.store.complete_job(&job.id, &stats).await?;

        info!(
            "Job {}: crawled {}/{} pages ({} failed), analysis {} ok / {} failed / {} skipped",
            job.id,
            stats.successful_pages,
            stats.total_pages,
            stats.failed_pages,
            stats.ai_succeeded,
            stats.ai_failed,
            stats.ai_skipped
        );
        Ok(stats)
    }

    async fn crawl_one(&self, job: &CrawlJob, url: &SitemapUrl) -> Result<PageOutcome> {
        let fetched = match self.fetcher.fetch(&url.loc, FetchOptions::default()).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Job {}: failed to crawl {}: {}", job.id, url.loc, e);
                self.store
                    .create_page(&NewPage::failed(&job.id, url, e.to_string()))
                    .await?;
                return Ok(PageOutcome {
                    fetched: false,
                    analysis: Analysis::NotAttempted,
                });
            }
        };

        let page = self
            .store
            .create_page(&NewPage {
                crawl_job_id: job.id.clone(),
                url: url.loc.clone(),
                title: fetched.title,
                html: Some(fetched.html),
                status_code: fetched.status_code,
                redirected: fetched.redirected,
                final_url: fetched.final_url,
                level: url.level,
                pathname: url.pathname.clone(),
                segments: url.segments.clone(),
                priority: url.priority,
                changefreq: url.changefreq.clone(),
                lastmod: url.lastmod.clone(),
                error: None,
            })
            .await?;
        debug!("Job {}: stored page {} ({})", job.id, page.url, page.status_code);

        let outcome = self
            .webhooks
            .dispatch_page(&PageAnalysisPayload::new(&job.url, &page))
            .await;
        if outcome.is_failure() {
            warn!(
                "Job {}: page analysis failed for {}: {}",
                job.id,
                page.url,
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
        if let Err(e) = self.store.record_page_analysis(&page.id, &outcome).await {
            warn!("Job {}: could not record analysis for {}: {}", job.id, page.url, e);
        }

        Ok(PageOutcome {
            fetched: true,
            analysis: Analysis::from_outcome(&outcome),
        })
    }
}

fn tally(outcomes: &[PageOutcome]) -> CrawlStats {
    let count = |analysis: Analysis| outcomes.iter().filter(|o| o.analysis == analysis).count();
    let successful_pages = outcomes.iter().filter(|o| o.fetched).count();

    CrawlStats {
        total_pages: outcomes.len(),
        successful_pages,
        failed_pages: outcomes.len() - successful_pages,
        ai_succeeded: count(Analysis::Succeeded),
        ai_failed: count(Analysis::Failed),
        ai_skipped: count(Analysis::Skipped),
        completed_at: chrono::Utc::now(),
    }
}
