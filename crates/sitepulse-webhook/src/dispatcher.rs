//! Webhook delivery with fixed-delay retry.

use crate::error::{Result, WebhookError};
use crate::payload::{JobCompletionPayload, PageAnalysisPayload};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value as JsonValue;
use sitepulse_core::{WebhookConfig, WebhookOutcome};
use std::time::Duration;
use tracing::{debug, info, warn};

const MAX_ERROR_BODY: usize = 500;

/// Delivery of analysis payloads, as seen by the crawl pipeline.
#[async_trait]
pub trait WebhookDispatch: Send + Sync {
    /// Send one page for analysis. Skipped when no endpoint is configured.
    async fn dispatch_page(&self, payload: &PageAnalysisPayload) -> WebhookOutcome;

    /// Send the finished job. `None` when no endpoint is configured.
    async fn dispatch_completion(&self, payload: &JobCompletionPayload) -> Option<WebhookOutcome>;
}

/// Retry settings for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Pause before each retry
    pub delay: Duration,
}

/// Posts JSON payloads to the configured endpoints.
#[derive(Debug, Clone)]
pub struct WebhookDispatcher {
    client: Client,
    page_analysis_url: Option<String>,
    job_completion_url: Option<String>,
    policy: RetryPolicy,
}

impl WebhookDispatcher {
    /// Build a dispatcher from configuration.
    ///
    /// # Errors
    /// Returns `WebhookError::Client` if the HTTP client cannot be created.
    pub fn new(config: &WebhookConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| WebhookError::Client(e.to_string()))?;

        Ok(Self {
            client,
            page_analysis_url: configured(config.page_analysis_url.as_deref()),
            job_completion_url: configured(config.job_completion_url.as_deref()),
            policy: RetryPolicy {
                max_retries: config.max_retries,
                delay: Duration::from_millis(config.retry_delay_ms),
            },
        })
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// POST `payload` to `endpoint`, retrying transient failures.
    ///
    /// Never fails: an unconfigured endpoint yields a skipped outcome and
    /// delivery errors yield a failed one.
    pub async fn dispatch<T: Serialize + Sync>(
        &self,
        endpoint: Option<&str>,
        payload: &T,
    ) -> WebhookOutcome {
        let Some(endpoint) = configured(endpoint) else {
            return WebhookOutcome::skipped("webhook endpoint not configured");
        };

        let body = match serde_json::to_vec(payload) {
            Ok(body) => body,
            Err(e) => {
                let err = WebhookError::from(e);
                warn!("Webhook payload for {} not sent: {}", endpoint, err);
                return WebhookOutcome::failed(None, err.to_string(), 0);
            }
        };

        let mut retries = 0;
        loop {
            match self.post(&endpoint, body.clone()).await {
                Ok((status, data)) => {
                    debug!("Webhook {} accepted with HTTP {}", endpoint, status);
                    return WebhookOutcome::succeeded(status, data, retries);
                }
                Err(err) if err.is_transient() && retries < self.policy.max_retries => {
                    retries += 1;
                    info!(
                        "Webhook {} failed ({}), retry {}/{} in {:?}",
                        endpoint, err, retries, self.policy.max_retries, self.policy.delay
                    );
                    tokio::time::sleep(self.policy.delay).await;
                }
                Err(err) => {
                    warn!(
                        "Webhook {} failed after {} retries: {}",
                        endpoint, retries, err
                    );
                    return WebhookOutcome::failed(err.status(), err.to_string(), retries);
                }
            }
        }
    }

    async fn post(&self, endpoint: &str, body: Vec<u8>) -> Result<(u16, Option<JsonValue>)> {
        let response = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(WebhookError::Status {
                status: status.as_u16(),
                body: truncate(&text, MAX_ERROR_BODY),
            });
        }

        let data = if text.trim().is_empty() {
            None
        } else {
            Some(serde_json::from_str(&text).unwrap_or(JsonValue::String(text)))
        };
        Ok((status.as_u16(), data))
    }
}

#[async_trait]
impl WebhookDispatch for WebhookDispatcher {
    async fn dispatch_page(&self, payload: &PageAnalysisPayload) -> WebhookOutcome {
        if self.page_analysis_url.is_none() {
            return WebhookOutcome::skipped("page analysis webhook not configured");
        }
        self.dispatch(self.page_analysis_url.as_deref(), payload).await
    }

    async fn dispatch_completion(&self, payload: &JobCompletionPayload) -> Option<WebhookOutcome> {
        let endpoint = self.job_completion_url.as_deref()?;
        Some(self.dispatch(Some(endpoint), payload).await)
    }
}

fn configured(endpoint: Option<&str>) -> Option<String> {
    endpoint
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(ToString::to_string)
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dispatcher(page_url: Option<String>) -> WebhookDispatcher {
        dispatcher_with_retries(page_url, 3)
    }

    fn dispatcher_with_retries(page_url: Option<String>, max_retries: u32) -> WebhookDispatcher {
        let config = WebhookConfig {
            page_analysis_url: page_url,
            timeout_secs: 5,
            ..WebhookConfig::default()
        };
        WebhookDispatcher::new(&config)
            .expect("client")
            .with_policy(RetryPolicy {
                max_retries,
                delay: Duration::ZERO,
            })
    }

    #[tokio::test]
    async fn test_unconfigured_is_skipped() {
        let d = dispatcher(None);
        let outcome = d.dispatch(None, &json!({"a": 1})).await;
        assert!(outcome.skipped);
        assert!(!outcome.success);
        assert!(!outcome.is_failure());

        let outcome = d.dispatch(Some("   "), &json!({"a": 1})).await;
        assert!(outcome.skipped);
    }

    #[tokio::test]
    async fn test_success_returns_response_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .match_header("content-type", "application/json")
            .with_status(200)
            .with_body(r#"{"seo":{"score":8}}"#)
            .expect(1)
            .create_async()
            .await;

        let d = dispatcher(None);
        let endpoint = format!("{}/hook", server.url());
        let outcome = d.dispatch(Some(&endpoint), &json!({"url": "https://a.com"})).await;

        mock.assert_async().await;
        assert!(outcome.success);
        assert_eq!(outcome.status, Some(200));
        assert_eq!(outcome.retries, 0);
        assert_eq!(outcome.data, Some(json!({"seo": {"score": 8}})));
    }

    #[tokio::test]
    async fn test_server_error_retried_three_times() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .with_status(502)
            .with_body("bad gateway")
            .expect(4)
            .create_async()
            .await;

        let d = dispatcher(None);
        let endpoint = format!("{}/hook", server.url());
        let outcome = d.dispatch(Some(&endpoint), &json!({})).await;

        mock.assert_async().await;
        assert!(outcome.is_failure());
        assert_eq!(outcome.status, Some(502));
        assert_eq!(outcome.retries, 3);
    }

    #[tokio::test]
    async fn test_policy_overrides_configured_retries() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .with_status(503)
            .expect(2)
            .create_async()
            .await;

        let d = dispatcher_with_retries(None, 1);
        let endpoint = format!("{}/hook", server.url());
        let outcome = d.dispatch(Some(&endpoint), &json!({})).await;

        mock.assert_async().await;
        assert!(outcome.is_failure());
        assert_eq!(outcome.status, Some(503));
        assert_eq!(outcome.retries, 1);
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .with_status(400)
            .with_body("missing field")
            .expect(1)
            .create_async()
            .await;

        let d = dispatcher(None);
        let endpoint = format!("{}/hook", server.url());
        let outcome = d.dispatch(Some(&endpoint), &json!({})).await;

        mock.assert_async().await;
        assert!(outcome.is_failure());
        assert_eq!(outcome.retries, 0);
        assert!(outcome.error.unwrap_or_default().contains("missing field"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_retried() {
        let d = dispatcher(None);
        let outcome = d.dispatch(Some("http://127.0.0.1:9/hook"), &json!({})).await;
        assert!(outcome.is_failure());
        assert_eq!(outcome.status, None);
        assert_eq!(outcome.retries, 3);
    }

    #[tokio::test]
    async fn test_page_dispatch_skipped_without_endpoint() {
        let d = dispatcher(Some(String::new()));
        let page = sitepulse_core::CrawlPage {
            id: "p".to_string(),
            crawl_job_id: sitepulse_core::JobId::new("j").expect("valid id"),
            url: "https://a.com/".to_string(),
            title: None,
            html: None,
            status_code: 200,
            redirected: false,
            final_url: "https://a.com/".to_string(),
            level: 0,
            pathname: "/".to_string(),
            segments: Vec::new(),
            priority: None,
            changefreq: None,
            lastmod: None,
            error: None,
            ai_processed: false,
            ai_response: None,
            ai_error: None,
            ai_processed_at: None,
            ai_retry_count: 0,
            crawled_at: chrono::Utc::now(),
        };
        let outcome = d
            .dispatch_page(&PageAnalysisPayload::new("https://a.com", &page))
            .await;
        assert!(outcome.skipped);
        assert!(outcome.error.unwrap_or_default().contains("not configured"));

        let completion = JobCompletionPayload::new(
            sitepulse_core::CrawlJob {
                id: sitepulse_core::JobId::new("j").expect("valid id"),
                url: "https://a.com".to_string(),
                email: "o@a.com".to_string(),
                status: sitepulse_core::JobStatus::Completed,
                verified: true,
                cancelled: false,
                verify_attempts: 0,
                homepage: None,
                robots_txt: None,
                sitemap_xml: None,
                sample_sitemap: None,
                crawl_stats: None,
                crawl_completion_ai: None,
                failed_step: None,
                error: None,
                error_details: None,
                created_at: chrono::Utc::now(),
                updated_at: chrono::Utc::now(),
            },
            vec![page],
        );
        assert!(d.dispatch_completion(&completion).await.is_none());
    }

    #[test]
    fn test_truncate_on_char_boundary() {
        assert_eq!(truncate("héllo", 2), "hé...");
        assert_eq!(truncate("short", 10), "short");
    }
}
