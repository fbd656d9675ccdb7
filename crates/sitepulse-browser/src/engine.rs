use crate::classify::classify;
use crate::error::{ErrorClass, FetchError, Result};
use crate::session::{BrowserSession, PageLink, SessionFactory};
use crate::strategy::{FetchPolicy, WaitStrategy};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-call fetch options.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    /// Collect `a[href]` anchors from the rendered page
    pub extract_links: bool,
}

impl FetchOptions {
    pub fn with_links() -> Self {
        Self {
            extract_links: true,
        }
    }
}

/// A rendered page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub final_url: String,
    pub status_code: u16,
    pub title: Option<String>,
    pub html: String,
    pub links: Vec<PageLink>,
    pub redirected: bool,
    pub attempts_used: u32,
}

/// Fetches rendered pages. Implemented by [`PageFetcher`] and by test doubles.
#[async_trait]
pub trait PageFetch: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        options: FetchOptions,
    ) -> std::result::Result<FetchedPage, FetchError>;
}

/// Page fetcher with retries and wait-strategy escalation.
///
/// Every attempt opens a fresh session and closes it before the attempt's
/// result is returned, so a detached frame never survives into a retry.
pub struct PageFetcher {
    sessions: Arc<dyn SessionFactory>,
    policy: FetchPolicy,
}

impl PageFetcher {
    pub fn new(sessions: Arc<dyn SessionFactory>, policy: FetchPolicy) -> Self {
        Self { sessions, policy }
    }

    async fn attempt(&self, url: &str, options: FetchOptions, attempt: u32) -> Result<FetchedPage> {
        let mut session = self.sessions.open().await?;
        let result = self.drive(session.as_mut(), url, options, attempt).await;

        if let Err(e) = session.close().await {
            warn!("error closing browser session for {url}: {e}");
        }

        result
    }

    async fn drive(
        &self,
        session: &mut dyn BrowserSession,
        url: &str,
        options: FetchOptions,
        attempt: u32,
    ) -> Result<FetchedPage> {
        let strategy = WaitStrategy::for_attempt(attempt);
        let timeout = self.policy.navigation_timeout_for(attempt);
        info!(
            "attempt {}/{} for {url} using wait strategy {strategy} (timeout {}s)",
            attempt + 1,
            self.policy.total_attempts(),
            timeout.as_secs()
        );

        let status_code = session.navigate(url, strategy, timeout).await?;

        if let Err(e) = session
            .wait_for_ready_state(self.policy.ready_state_timeout)
            .await
        {
            debug!("readyState check failed for {url}, using time delay: {e}");
        }
        tokio::time::sleep(self.policy.settle_delay(attempt)).await;

        let snapshot = session.snapshot(options.extract_links).await?;
        let final_url = if snapshot.final_url.is_empty() {
            url.to_string()
        } else {
            snapshot.final_url
        };

        Ok(FetchedPage {
            redirected: !same_url(url, &final_url),
            final_url,
            status_code,
            title: snapshot.title,
            html: snapshot.html,
            links: snapshot.links,
            attempts_used: attempt + 1,
        })
    }
}

#[async_trait]
impl PageFetch for PageFetcher {
    async fn fetch(
        &self,
        url: &str,
        options: FetchOptions,
    ) -> std::result::Result<FetchedPage, FetchError> {
        let mut attempt = 0;
        loop {
            let err = match self.attempt(url, options, attempt).await {
                Ok(page) => {
                    info!("fetched {url} on attempt {}", attempt + 1);
                    return Ok(page);
                }
                Err(err) => err,
            };

            let message = err.to_string();
            let classification = classify(&message);
            warn!(
                "attempt {} failed for {url} ({classification}): {message}",
                attempt + 1
            );

            if !classification.is_retryable() || attempt >= self.policy.max_retries {
                return Err(FetchError {
                    classification,
                    message,
                    attempts: attempt + 1,
                });
            }

            if classification == ErrorClass::FrameDetached {
                debug!("frame detached for {url}, next attempt uses a fresh session");
            }

            let delay = self.policy.backoff(attempt);
            info!(
                "retrying {url} in {}ms (attempt {}/{})",
                delay.as_millis(),
                attempt + 2,
                self.policy.total_attempts()
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Compare URLs after parsing, so `https://a.com` equals `https://a.com/`.
fn same_url(a: &str, b: &str) -> bool {
    match (url::Url::parse(a), url::Url::parse(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BrowserError;
    use crate::session::PageSnapshot;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scripted navigation result for one session.
    enum Script {
        Ok { final_url: &'static str },
        Fail(&'static str),
    }

    struct ScriptedFactory {
        scripts: Mutex<VecDeque<Script>>,
        opened: AtomicU32,
        closed: Arc<AtomicU32>,
        strategies: Arc<Mutex<Vec<WaitStrategy>>>,
        timeouts: Arc<Mutex<Vec<Duration>>>,
    }

    impl ScriptedFactory {
        fn new(scripts: Vec<Script>) -> Self {
            Self {
                scripts: Mutex::new(scripts.into()),
                opened: AtomicU32::new(0),
                closed: Arc::new(AtomicU32::new(0)),
                strategies: Arc::new(Mutex::new(Vec::new())),
                timeouts: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    struct ScriptedSession {
        script: Script,
        closed: Arc<AtomicU32>,
        strategies: Arc<Mutex<Vec<WaitStrategy>>>,
        timeouts: Arc<Mutex<Vec<Duration>>>,
    }

    #[async_trait]
    impl SessionFactory for ScriptedFactory {
        async fn open(&self) -> Result<Box<dyn BrowserSession>> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            let script = self
                .scripts
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Script::Fail("target closed"));
            Ok(Box::new(ScriptedSession {
                script,
                closed: Arc::clone(&self.closed),
                strategies: Arc::clone(&self.strategies),
                timeouts: Arc::clone(&self.timeouts),
            }))
        }
    }

    #[async_trait]
    impl BrowserSession for ScriptedSession {
        async fn navigate(
            &mut self,
            _url: &str,
            strategy: WaitStrategy,
            timeout: Duration,
        ) -> Result<u16> {
            self.strategies.lock().unwrap().push(strategy);
            self.timeouts.lock().unwrap().push(timeout);
            match self.script {
                Script::Ok { .. } => Ok(200),
                Script::Fail(message) => Err(BrowserError::Navigation(message.to_string())),
            }
        }

        async fn wait_for_ready_state(&mut self, _timeout: Duration) -> Result<()> {
            Err(BrowserError::Timeout("readyState".into()))
        }

        async fn snapshot(&mut self, extract_links: bool) -> Result<PageSnapshot> {
            let Script::Ok { final_url } = self.script else {
                unreachable!("snapshot after failed navigation");
            };
            let links = if extract_links {
                vec![PageLink {
                    href: format!("{final_url}about"),
                    text: "About".into(),
                }]
            } else {
                Vec::new()
            };
            Ok(PageSnapshot {
                final_url: final_url.to_string(),
                title: Some("Example".into()),
                html: "<html></html>".into(),
                links,
            })
        }

        async fn close(&mut self) -> Result<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn fetcher(factory: &Arc<ScriptedFactory>) -> PageFetcher {
        let sessions: Arc<dyn SessionFactory> = Arc::clone(factory) as Arc<dyn SessionFactory>;
        PageFetcher::new(sessions, FetchPolicy::default().without_delays())
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let factory = Arc::new(ScriptedFactory::new(vec![Script::Ok {
            final_url: "https://example.com/",
        }]));
        let page = fetcher(&factory)
            .fetch("https://example.com", FetchOptions::with_links())
            .await
            .expect("fetch succeeds");

        assert_eq!(page.attempts_used, 1);
        assert_eq!(page.status_code, 200);
        assert!(!page.redirected);
        assert_eq!(page.links.len(), 1);
        assert_eq!(factory.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retryable_error_exhausts_four_attempts() {
        let factory = Arc::new(ScriptedFactory::new(vec![
            Script::Fail("net::ERR_CONNECTION_RESET"),
            Script::Fail("net::ERR_CONNECTION_RESET"),
            Script::Fail("net::ERR_CONNECTION_RESET"),
            Script::Fail("net::ERR_CONNECTION_RESET"),
            Script::Ok {
                final_url: "https://example.com/",
            },
        ]));
        let err = fetcher(&factory)
            .fetch("https://example.com", FetchOptions::default())
            .await
            .expect_err("all attempts fail");

        assert_eq!(err.attempts, 4);
        assert_eq!(err.classification, ErrorClass::Transient);
        assert_eq!(factory.opened.load(Ordering::SeqCst), 4);
        assert_eq!(factory.closed.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_escalates_strategy_and_timeout() {
        let factory = Arc::new(ScriptedFactory::new(vec![
            Script::Fail("Navigating frame was detached"),
            Script::Fail("timeout"),
            Script::Ok {
                final_url: "https://example.com/landing",
            },
        ]));
        let page = fetcher(&factory)
            .fetch("https://example.com", FetchOptions::default())
            .await
            .expect("third attempt succeeds");

        assert_eq!(page.attempts_used, 3);
        assert!(page.redirected);
        assert_eq!(
            *factory.strategies.lock().unwrap(),
            vec![
                WaitStrategy::NetworkIdleRelaxed,
                WaitStrategy::DomContentLoaded,
                WaitStrategy::NetworkIdleStrict
            ]
        );
        assert_eq!(
            *factory.timeouts.lock().unwrap(),
            vec![
                Duration::from_secs(120),
                Duration::from_secs(130),
                Duration::from_secs(140)
            ]
        );
        assert_eq!(factory.closed.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_error_is_not_retried() {
        let factory = Arc::new(ScriptedFactory::new(vec![Script::Fail(
            "net::ERR_NAME_NOT_RESOLVED",
        )]));
        let err = fetcher(&factory)
            .fetch("https://nope.invalid", FetchOptions::default())
            .await
            .expect_err("fatal error");

        assert_eq!(err.attempts, 1);
        assert_eq!(err.classification, ErrorClass::Fatal);
        assert_eq!(factory.opened.load(Ordering::SeqCst), 1);
        assert_eq!(factory.closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_same_url_normalizes_trailing_slash() {
        assert!(same_url("https://example.com", "https://example.com/"));
        assert!(!same_url("https://example.com", "https://www.example.com/"));
    }
}
