//! Error types for webhook delivery.
//!
//! These never cross the crate boundary as `Err`; they are folded into a
//! [`WebhookOutcome`](sitepulse_core::WebhookOutcome) by the dispatcher.

use thiserror::Error;

/// Failure of a single delivery attempt.
#[derive(Error, Debug)]
pub enum WebhookError {
    /// Endpoint answered with a non-success status
    #[error("webhook returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, truncated
        body: String,
    },

    /// Request never produced a response
    #[error("webhook request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Payload could not be encoded
    #[error("failed to serialize webhook payload: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client could not be built
    #[error("failed to create HTTP client: {0}")]
    Client(String),
}

/// Result type for webhook operations.
pub type Result<T> = std::result::Result<T, WebhookError>;

impl WebhookError {
    /// Connection resets, timeouts, DNS failures and upstream 5xx responses.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status >= 500,
            Self::Request(err) => {
                if err.is_timeout() || err.is_connect() {
                    return true;
                }
                let text = error_chain_text(err);
                ["connection reset", "dns error", "failed to lookup address", "broken pipe"]
                    .iter()
                    .any(|needle| text.contains(needle))
            }
            Self::Serialization(_) | Self::Client(_) => false,
        }
    }

    /// HTTP status of the response, when one arrived.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Request(err) => err.status().map(|s| s.as_u16()),
            Self::Serialization(_) | Self::Client(_) => None,
        }
    }
}

fn error_chain_text(err: &(dyn std::error::Error + 'static)) -> String {
    let mut text = err.to_string().to_lowercase();
    let mut source = err.source();
    while let Some(inner) = source {
        text.push_str(": ");
        text.push_str(&inner.to_string().to_lowercase());
        source = inner.source();
    }
    text
}
