//! SitePulse crawl worker
//!
//! Thin process shell: loads configuration, opens the job store, wires the
//! pipeline collaborators and runs the scan loop until shutdown.

use anyhow::{Context, Result};
use sitepulse_browser::{FetchPolicy, HttpProbe, PageFetcher, RemoteSessionFactory};
use sitepulse_core::AppConfig;
use sitepulse_crawler::{CrawlProcessor, JobPipeline};
use sitepulse_db::Database;
use sitepulse_mail::{Notifier, SmtpConfig, SmtpNotifier};
use sitepulse_webhook::WebhookDispatcher;
use std::sync::Arc;
use tracing::{info, warn};

/// Initialize tracing subscriber for logging
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sitepulse=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

fn notifier(config: &AppConfig) -> Result<Option<Arc<dyn Notifier>>> {
    let Some(smtp) = SmtpConfig::from_config(&config.notifications) else {
        info!("Completion e-mails disabled");
        return Ok(None);
    };
    let notifier = SmtpNotifier::new(&smtp).context("failed to configure SMTP relay")?;
    Ok(Some(Arc::new(notifier)))
}

async fn build_pipeline(config: &AppConfig) -> Result<JobPipeline> {
    let path = config.database_path()?;
    info!("Opening job store at {}", path.display());
    let db = Database::new(&path)
        .await
        .with_context(|| format!("failed to open database {}", path.display()))?;
    db.run_migrations().await.context("failed to run migrations")?;

    let probe = HttpProbe::new(&config.http)?;
    let sessions = RemoteSessionFactory::from_config(&config.browser)
        .context("remote browser is not configured")?;
    let fetcher = PageFetcher::new(Arc::new(sessions), FetchPolicy::from_config(&config.browser));
    let webhooks = WebhookDispatcher::new(&config.webhooks)?;

    if config.webhooks.page_analysis_url.is_none() {
        warn!("No page analysis webhook configured, page analysis will be skipped");
    }

    let mut pipeline = JobPipeline::new(
        Arc::new(db),
        Arc::new(probe),
        Arc::new(fetcher),
        Arc::new(webhooks),
    )
    .with_crawling(&config.crawling);
    if let Some(notifier) = notifier(config)? {
        pipeline = pipeline.with_notifier(notifier);
    }
    Ok(pipeline)
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
                return;
            }
            Err(e) => warn!("Cannot listen for SIGTERM: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("Starting SitePulse worker v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load_with_env().context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;

    let pipeline = build_pipeline(&config).await?;
    let processor = CrawlProcessor::new(Arc::new(pipeline), config.crawling.scan_interval());
    processor.start();

    shutdown_signal().await;
    info!("Received shutdown signal");

    processor.stop().await;
    info!("SitePulse worker stopped");
    Ok(())
}
