//! Background scan loop.
//!
//! One scan runs immediately on start, then every interval. A scan pulls all
//! ready jobs oldest-first and processes them one at a time. Stopping cancels
//! the loop between scans; a scan already under way runs to completion.

use crate::error::{CrawlError, Result};
use crate::pipeline::JobPipeline;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Counts from one scan cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Ready jobs found
    pub found: usize,
    /// Jobs that completed
    pub completed: usize,
    /// Jobs that failed or were rejected
    pub failed: usize,
    /// Jobs skipped because they were already in flight
    pub skipped: usize,
}

struct Scanner {
    pipeline: Arc<JobPipeline>,
    scanning: AtomicBool,
}

/// Clears the scanning flag when dropped, including when the scan future is
/// dropped before it finishes.
struct ScanGuard<'a>(&'a AtomicBool);

impl<'a> ScanGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Scanner {
    async fn scan(&self) -> Result<Option<ScanReport>> {
        let Some(_guard) = ScanGuard::try_acquire(&self.scanning) else {
            debug!("Scan already in progress, skipping");
            return Ok(None);
        };

        self.scan_jobs().await.map(Some)
    }

    async fn scan_jobs(&self) -> Result<ScanReport> {
        let jobs = self.pipeline.store().find_verified_jobs().await?;
        let mut report = ScanReport {
            found: jobs.len(),
            ..ScanReport::default()
        };

        if jobs.is_empty() {
            debug!("No verified jobs to process");
            return Ok(report);
        }
        info!("Found {} verified jobs to process", jobs.len());

        for job in jobs {
            match self.pipeline.process_job(&job.id).await {
                Ok(_) => report.completed += 1,
                Err(CrawlError::AlreadyProcessing(_)) => report.skipped += 1,
                Err(e) => {
                    error!("Error processing job {}: {}", job.id, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Scan finished: {} completed, {} failed, {} skipped",
            report.completed, report.failed, report.skipped
        );
        Ok(report)
    }
}

struct Running {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the scan loop task.
pub struct CrawlProcessor {
    scanner: Arc<Scanner>,
    interval: Duration,
    running: Mutex<Option<Running>>,
}

impl CrawlProcessor {
    /// Create an idle processor scanning every `interval` once started.
    pub fn new(pipeline: Arc<JobPipeline>, interval: Duration) -> Self {
        Self {
            scanner: Arc::new(Scanner {
                pipeline,
                scanning: AtomicBool::new(false),
            }),
            interval,
            running: Mutex::new(None),
        }
    }

    /// The pipeline jobs are handed to.
    pub fn pipeline(&self) -> &Arc<JobPipeline> {
        &self.scanner.pipeline
    }

    /// Start the loop. Returns `false` if it was already running.
    pub fn start(&self) -> bool {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.is_some() {
            info!("Crawl processor already running");
            return false;
        }

        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let scanner = Arc::clone(&self.scanner);
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = scanner.scan().await {
                            error!("Scan failed: {}", e);
                        }
                    }
                }
            }
            debug!("Scan loop exited");
        });

        *running = Some(Running { shutdown, handle });
        info!("Crawl processor started, scanning every {:?}", self.interval);
        true
    }

    /// Stop scheduling scans and wait for the current one to finish.
    pub async fn stop(&self) {
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(Running { shutdown, handle }) = running else {
            return;
        };

        shutdown.cancel();
        if let Err(e) = handle.await {
            warn!("Scan loop task ended abnormally: {}", e);
        }
        info!("Crawl processor stopped");
    }

    /// Whether the loop has been started and not stopped.
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Run one scan now. `None` if another scan is in progress.
    pub async fn run_scan(&self) -> Result<Option<ScanReport>> {
        self.scanner.scan().await
    }
}
