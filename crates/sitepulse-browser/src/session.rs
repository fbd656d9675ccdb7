//! Browser sessions against a remote browser-automation endpoint.
//!
//! A [`SessionFactory`] opens one [`BrowserSession`] per fetch attempt. The
//! production factory connects to a remote Chromium over the DevTools
//! WebSocket; tests script sessions directly.

use crate::error::{BrowserError, Result};
use crate::strategy::WaitStrategy;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use sitepulse_core::BrowserConfig;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

const STATUS_SCRIPT: &str = r"(() => {
    const nav = performance.getEntriesByType('navigation')[0];
    return nav && nav.responseStatus ? nav.responseStatus : 0;
})()";

const READY_STATE_SCRIPT: &str = r"(() => {
    return location.href !== 'about:blank'
        && (document.readyState === 'complete' || document.readyState === 'interactive');
})()";

const IDLE_PROBE_SCRIPT: &str = r"(() => ({
    complete: location.href !== 'about:blank' && document.readyState === 'complete',
    resources: performance.getEntriesByType('resource').length
}))()";

const LINKS_SCRIPT: &str = r"(() => Array.from(document.querySelectorAll('a[href]'))
    .map(a => ({ href: a.href, text: (a.textContent || '').trim() }))
    .filter(link => link.href && !link.href.startsWith('javascript:')))()";

/// An anchor found on a rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLink {
    pub href: String,
    pub text: String,
}

/// What a session reads back after navigation settles.
#[derive(Debug, Clone, Default)]
pub struct PageSnapshot {
    pub final_url: String,
    pub title: Option<String>,
    pub html: String,
    pub links: Vec<PageLink>,
}

/// One open page on a remote browser.
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigate and wait per `strategy`, bounded by `timeout`. Returns the HTTP status.
    async fn navigate(&mut self, url: &str, strategy: WaitStrategy, timeout: Duration)
        -> Result<u16>;

    /// Wait until the document is at least interactive.
    async fn wait_for_ready_state(&mut self, timeout: Duration) -> Result<()>;

    async fn snapshot(&mut self, extract_links: bool) -> Result<PageSnapshot>;

    /// Release the page and the connection. Called exactly once per session.
    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn BrowserSession>>;
}

#[derive(Debug, Deserialize)]
struct IdleProbe {
    complete: bool,
    resources: u64,
}

/// Opens sessions on a remote Chromium via `Browser::connect`.
#[derive(Debug, Clone)]
pub struct RemoteSessionFactory {
    ws_url: String,
    user_agent: String,
    viewport: (u32, u32),
}

impl RemoteSessionFactory {
    /// Build from config. Fails when no endpoint is configured.
    pub fn from_config(config: &BrowserConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or_else(|| BrowserError::Configuration("remote browser endpoint missing".into()))?;

        Ok(Self {
            ws_url: websocket_url(endpoint, config.token.as_deref())?,
            user_agent: config.user_agent.clone(),
            viewport: (config.viewport_width, config.viewport_height),
        })
    }
}

/// Turn an http(s) endpoint into a ws(s) DevTools URL carrying the token.
pub fn websocket_url(endpoint: &str, token: Option<&str>) -> Result<String> {
    let mut url = url::Url::parse(endpoint)
        .map_err(|e| BrowserError::InvalidUrl(format!("{endpoint}: {e}")))?;

    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(BrowserError::InvalidUrl(format!(
                "unsupported browser endpoint scheme '{other}'"
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| BrowserError::InvalidUrl(endpoint.to_string()))?;

    if let Some(token) = token {
        url.query_pairs_mut().append_pair("token", token);
    }

    Ok(url.to_string())
}

#[async_trait]
impl SessionFactory for RemoteSessionFactory {
    async fn open(&self) -> Result<Box<dyn BrowserSession>> {
        let (browser, mut handler) = Browser::connect(self.ws_url.as_str())
            .await
            .map_err(|e| BrowserError::Connection(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let mut session = RemoteSession {
            browser,
            page: None,
            handler,
        };

        let page = session.browser.new_page("about:blank").await?;
        session.page = Some(page);
        if let Err(err) = session.prepare(&self.user_agent, self.viewport).await {
            if let Err(close_err) = session.close().await {
                warn!("failed to close half-open session: {close_err}");
            }
            return Err(err);
        }

        Ok(Box::new(session))
    }
}

struct RemoteSession {
    browser: Browser,
    page: Option<Page>,
    handler: JoinHandle<()>,
}

impl RemoteSession {
    fn page(&self) -> Result<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| BrowserError::Protocol("session closed".into()))
    }

    async fn prepare(&self, user_agent: &str, (width, height): (u32, u32)) -> Result<()> {
        let page = self.page()?;

        page.execute(SetUserAgentOverrideParams {
            user_agent: user_agent.to_string(),
            accept_language: None,
            platform: None,
            user_agent_metadata: None,
        })
        .await?;

        page.execute(
            SetDeviceMetricsOverrideParams::builder()
                .width(i64::from(width))
                .height(i64::from(height))
                .device_scale_factor(1.0)
                .mobile(false)
                .build()
                .map_err(BrowserError::Protocol)?,
        )
        .await?;

        Ok(())
    }

    async fn evaluate<T: serde::de::DeserializeOwned>(&self, script: &str) -> Result<T> {
        self.page()?
            .evaluate(script)
            .await?
            .into_value::<T>()
            .map_err(|e| BrowserError::Protocol(e.to_string()))
    }

    async fn wait_until_settled(&self, strategy: WaitStrategy) -> Result<()> {
        let Some(quiet) = strategy.quiet_window() else {
            return self.poll_ready_state().await;
        };

        let mut last_count = None;
        let mut last_change = Instant::now();
        loop {
            // Evaluation fails while the old document is torn down.
            if let Ok(probe) = self.evaluate::<IdleProbe>(IDLE_PROBE_SCRIPT).await {
                if last_count != Some(probe.resources) {
                    last_count = Some(probe.resources);
                    last_change = Instant::now();
                } else if probe.complete && last_change.elapsed() >= quiet {
                    return Ok(());
                }
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn poll_ready_state(&self) -> Result<()> {
        loop {
            if let Ok(true) = self.evaluate::<bool>(READY_STATE_SCRIPT).await {
                return Ok(());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl BrowserSession for RemoteSession {
    async fn navigate(
        &mut self,
        url: &str,
        strategy: WaitStrategy,
        timeout: Duration,
    ) -> Result<u16> {
        let navigation = async {
            let response = self.page()?.execute(NavigateParams::new(url)).await?;
            if let Some(error_text) = response.result.error_text.clone() {
                return Err(BrowserError::Navigation(format!("{error_text} at {url}")));
            }
            self.wait_until_settled(strategy).await
        };

        tokio::time::timeout(timeout, navigation)
            .await
            .map_err(|_| {
                BrowserError::Timeout(format!(
                    "navigation timeout of {}ms exceeded ({strategy})",
                    timeout.as_millis()
                ))
            })??;

        let status = self.evaluate::<u16>(STATUS_SCRIPT).await.unwrap_or(0);
        Ok(if status == 0 { 200 } else { status })
    }

    async fn wait_for_ready_state(&mut self, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.poll_ready_state())
            .await
            .map_err(|_| BrowserError::Timeout("document readyState wait".into()))?
    }

    async fn snapshot(&mut self, extract_links: bool) -> Result<PageSnapshot> {
        let page = self.page()?;
        let final_url = page.url().await?.unwrap_or_default();
        let title = page.get_title().await?;
        let html = page.content().await?;
        let links = if extract_links {
            self.evaluate::<Vec<PageLink>>(LINKS_SCRIPT).await?
        } else {
            Vec::new()
        };

        Ok(PageSnapshot {
            final_url,
            title,
            html,
            links,
        })
    }

    async fn close(&mut self) -> Result<()> {
        let result = match self.page.take() {
            Some(page) => page.close().await.map_err(BrowserError::from),
            None => Ok(()),
        };
        // Disconnect only; the remote browser process is not ours to close.
        self.handler.abort();
        debug!("remote browser session closed");
        result
    }
}

impl Drop for RemoteSession {
    fn drop(&mut self) {
        if self.page.is_some() {
            warn!("remote browser session dropped without close");
        }
        self.handler.abort();
    }
}
