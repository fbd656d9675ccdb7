//! Job pipeline: drives one verified job through its ordered stages.
//!
//! Every stage reads what it needs back from the job record and persists its
//! own output before the next stage starts. A failing stage marks the job
//! failed with the stage name and error diagnostics; it is not retried.
//! Completion webhook and notification failures are logged only.

use crate::batch::{BatchCoordinator, BatchSettings};
use crate::error::{CrawlError, Result};
use async_trait::async_trait;
use sitepulse_browser::{extract_homepage, FetchOptions, PageFetch, SiteProbe};
use sitepulse_core::{
    CrawlJob, CrawlStats, CrawlingConfig, ErrorDetails, JobId, JobSummary, SampleSitemap, Stage,
};
use sitepulse_db::JobStore;
use sitepulse_mail::Notifier;
use sitepulse_sitemap::{categorize, SitemapError, SitemapResolver, SitemapSource, UrlSampler};
use sitepulse_webhook::{JobCompletionPayload, WebhookDispatch};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{error, info, warn};

/// Job IDs currently inside the pipeline.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    ids: Arc<Mutex<HashSet<JobId>>>,
}

impl InFlight {
    fn lock(&self) -> MutexGuard<'_, HashSet<JobId>> {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim `id`; `None` if it is already claimed.
    pub fn try_acquire(&self, id: &JobId) -> Option<InFlightGuard> {
        if self.lock().insert(id.clone()) {
            Some(InFlightGuard {
                ids: Arc::clone(&self.ids),
                id: id.clone(),
            })
        } else {
            None
        }
    }

    /// Whether `id` is currently claimed.
    pub fn contains(&self, id: &JobId) -> bool {
        self.lock().contains(id)
    }

    /// Number of claimed jobs.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// `true` when no job is claimed.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Releases its job ID when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    ids: Arc<Mutex<HashSet<JobId>>>,
    id: JobId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

/// Child sitemaps are fetched through the plain HTTP probe.
struct ProbeSitemapSource {
    probe: Arc<dyn SiteProbe>,
}

#[async_trait]
impl SitemapSource for ProbeSitemapSource {
    async fn fetch_sitemap(&self, url: &str) -> sitepulse_sitemap::Result<String> {
        self.probe
            .fetch_document(url)
            .await
            .map_err(|e| SitemapError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Drives jobs from `verified` to `completed` or `failed`.
pub struct JobPipeline {
    store: Arc<dyn JobStore>,
    probe: Arc<dyn SiteProbe>,
    fetcher: Arc<dyn PageFetch>,
    webhooks: Arc<dyn WebhookDispatch>,
    notifier: Option<Arc<dyn Notifier>>,
    resolver: SitemapResolver,
    sampler: UrlSampler,
    batches: BatchCoordinator,
    in_flight: InFlight,
}

impl JobPipeline {
    /// Pipeline with default sampling and batch settings and no notifier.
    pub fn new(
        store: Arc<dyn JobStore>,
        probe: Arc<dyn SiteProbe>,
        fetcher: Arc<dyn PageFetch>,
        webhooks: Arc<dyn WebhookDispatch>,
    ) -> Self {
        let resolver = SitemapResolver::new(Arc::new(ProbeSitemapSource {
            probe: Arc::clone(&probe),
        }));
        let batches = BatchCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&fetcher),
            Arc::clone(&webhooks),
        );

        Self {
            store,
            probe,
            fetcher,
            webhooks,
            notifier: None,
            resolver,
            sampler: UrlSampler::default(),
            batches,
            in_flight: InFlight::default(),
        }
    }

    /// Apply sampling and batching settings.
    #[must_use]
    pub fn with_crawling(mut self, config: &CrawlingConfig) -> Self {
        self.sampler = UrlSampler::new(config.into());
        self.resolver = self.resolver.with_max_children(config.max_child_sitemaps);
        self.batches = self.batches.with_settings(BatchSettings::from(config));
        self
    }

    /// Send a completion notice for every completed job.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Status snapshot of a job, `None` if it does not exist.
    pub async fn get_job_status(&self, job_id: &JobId) -> Result<Option<JobSummary>> {
        Ok(self.store.get_job_summary(job_id).await?)
    }

    /// Whether `job_id` is inside the pipeline right now.
    pub fn is_job_processing(&self, job_id: &JobId) -> bool {
        self.in_flight.contains(job_id)
    }

    /// Number of jobs inside the pipeline right now.
    pub fn processing_jobs_count(&self) -> usize {
        self.in_flight.len()
    }

    pub(crate) fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Run every stage for one job.
    ///
    /// # Errors
    /// - `AlreadyProcessing` if the job is in flight elsewhere
    /// - `JobNotFound` / `NotReady` if the job cannot enter the pipeline; the
    ///   job is left untouched
    /// - `StageFailed` after the job has been marked failed
    pub async fn process_job(&self, job_id: &JobId) -> Result<CrawlStats> {
        let Some(_guard) = self.in_flight.try_acquire(job_id) else {
            info!("Job {} is already being processed, skipping", job_id);
            return Err(CrawlError::AlreadyProcessing(job_id.clone()));
        };

        let job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or_else(|| CrawlError::JobNotFound(job_id.clone()))?;
        if !job.is_ready_for_processing() || !self.store.mark_processing(job_id).await? {
            warn!("Job {} rejected: status {}", job_id, job.status);
            return Err(CrawlError::NotReady {
                job_id: job_id.clone(),
                status: job.status,
            });
        }

        info!("Processing job {} for {}", job.id, job.url);

        match self.run_stages(&job).await {
            Ok(stats) => {
                self.finish(&job, &stats).await;
                info!("Job {} completed", job.id);
                Ok(stats)
            }
            Err((stage, err)) => {
                error!("Job {} failed at {}: {}", job.id, stage, err);
                let details = ErrorDetails::capture(stage, &err);
                if let Err(e) = self.store.fail_job(&job.id, &details).await {
                    error!("Could not record failure of job {}: {}", job.id, e);
                }
                Err(CrawlError::StageFailed {
                    stage,
                    source: Box::new(err),
                })
            }
        }
    }

    async fn run_stages(&self, job: &CrawlJob) -> std::result::Result<CrawlStats, (Stage, CrawlError)> {
        let id = &job.id;

        self.resolve_homepage(job)
            .await
            .map_err(|e| (Stage::UrlAndHomepage, e))?;
        self.store_robots_txt(id)
            .await
            .map_err(|e| (Stage::RobotsTxt, e))?;
        self.store_sitemap_xml(id)
            .await
            .map_err(|e| (Stage::SitemapXml, e))?;
        self.build_sample(id)
            .await
            .map_err(|e| (Stage::SampleSitemap, e))?;
        self.crawl_sample(id)
            .await
            .map_err(|e| (Stage::CrawlPages, e))
    }

    async fn reload(&self, id: &JobId) -> Result<CrawlJob> {
        self.store
            .get_job(id)
            .await?
            .ok_or_else(|| CrawlError::JobNotFound(id.clone()))
    }

    async fn resolve_homepage(&self, job: &CrawlJob) -> Result<()> {
        info!("Job {}: checking {}", job.id, job.url);
        let status = self.probe.check_url_status(&job.url).await?;
        if status.is_error() {
            return Err(CrawlError::UrlStatus {
                status: status.status_code,
                url: job.url.clone(),
            });
        }

        let homepage = extract_homepage(&status.final_url)?;
        self.store.set_homepage(&job.id, &homepage).await?;
        info!("Job {}: homepage {}", job.id, homepage);
        Ok(())
    }

    async fn store_robots_txt(&self, id: &JobId) -> Result<()> {
        let job = self.reload(id).await?;
        let homepage = require(id, job.homepage, "homepage")?;

        let robots_txt = self.probe.fetch_robots_txt(&homepage).await?;
        self.store.set_robots_txt(id, robots_txt.as_deref()).await?;
        info!(
            "Job {}: robots.txt {}",
            id,
            if robots_txt.is_some() { "stored" } else { "not found" }
        );
        Ok(())
    }

    async fn store_sitemap_xml(&self, id: &JobId) -> Result<()> {
        let job = self.reload(id).await?;
        let homepage = require(id, job.homepage, "homepage")?;

        let sitemap = self
            .probe
            .fetch_sitemap(&homepage, job.robots_txt.as_deref())
            .await?;
        match &sitemap {
            Some(doc) => info!("Job {}: sitemap found at {}", id, doc.url),
            None => info!("Job {}: no sitemap found", id),
        }
        self.store
            .set_sitemap_xml(id, sitemap.as_ref().map(|doc| doc.content.as_str()))
            .await?;
        Ok(())
    }

    async fn build_sample(&self, id: &JobId) -> Result<()> {
        let job = self.reload(id).await?;
        let homepage = require(id, job.homepage, "homepage")?;

        let from_sitemap = match job.sitemap_xml.as_deref() {
            Some(xml) => {
                let entries = self.resolver.parse(xml, &homepage).await?;
                let categories = categorize(&entries, &homepage)?;
                if categories.total() == 0 {
                    info!("Job {}: sitemap has no same-host URLs", id);
                    None
                } else {
                    Some(self.sampler.sample(&categories))
                }
            }
            None => None,
        };

        let sample = match from_sitemap {
            Some(sample) => sample,
            None => self.sample_homepage_links(id, &homepage).await?,
        };

        info!(
            "Job {}: sampled {} of {} URLs{}",
            id,
            sample.len(),
            sample.total_original_urls,
            if sample.fallback { " (homepage links)" } else { "" }
        );
        self.store.set_sample_sitemap(id, &sample).await?;
        Ok(())
    }

    async fn sample_homepage_links(&self, id: &JobId, homepage: &str) -> Result<SampleSitemap> {
        info!("Job {}: discovering links from {}", id, homepage);
        match self.fetcher.fetch(homepage, FetchOptions::with_links()).await {
            Ok(page) => {
                let links = page
                    .links
                    .iter()
                    .map(|link| (link.href.as_str(), link.text.as_str()));
                Ok(self.sampler.sample_from_links(homepage, links)?)
            }
            Err(e) => {
                warn!("Job {}: homepage crawl failed, sampling homepage only: {}", id, e);
                Ok(self.sampler.sample_from_links(homepage, std::iter::empty())?)
            }
        }
    }

    async fn crawl_sample(&self, id: &JobId) -> Result<CrawlStats> {
        let job = self.reload(id).await?;
        let sample = job
            .sample_sitemap
            .as_ref()
            .ok_or_else(|| CrawlError::MissingField {
                job_id: id.clone(),
                field: "sample sitemap",
            })?;

        self.batches.crawl(&job, &sample.urls).await
    }

    async fn finish(&self, job: &CrawlJob, stats: &CrawlStats) {
        if let Err(e) = self.send_completion_webhook(&job.id).await {
            warn!("Job {}: completion webhook step failed: {}", job.id, e);
        }

        if let Some(notifier) = &self.notifier {
            match notifier
                .send_completion(&job.email, &job.id, &job.url, stats)
                .await
            {
                Ok(()) => info!("Job {}: completion notice sent", job.id),
                Err(e) => warn!("Job {}: completion notice failed: {}", job.id, e),
            }
        }
    }

    async fn send_completion_webhook(&self, id: &JobId) -> Result<()> {
        let job = self.reload(id).await?;
        let pages = self.store.list_pages(id).await?;

        let payload = JobCompletionPayload::new(job, pages);
        let Some(outcome) = self.webhooks.dispatch_completion(&payload).await else {
            return Ok(());
        };

        if outcome.success {
            info!("Job {}: completion webhook accepted", id);
        } else {
            warn!(
                "Job {}: completion webhook failed: {}",
                id,
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
        self.store.set_completion_webhook(id, &outcome).await?;
        Ok(())
    }
}

fn require(id: &JobId, value: Option<String>, field: &'static str) -> Result<String> {
    value.ok_or_else(|| CrawlError::MissingField {
        job_id: id.clone(),
        field,
    })
}
