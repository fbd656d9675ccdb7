use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("browser not configured: {0}")]
    Configuration(String),
}

impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        BrowserError::Protocol(err.to_string())
    }
}

/// How a failed navigation should be treated by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Worth another attempt after backoff
    Transient,
    /// The frame went away mid-navigation; the next attempt needs a fresh session
    FrameDetached,
    /// Retrying will not help
    Fatal,
}

impl ErrorClass {
    pub fn is_retryable(self) -> bool {
        !matches!(self, ErrorClass::Fatal)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorClass::Transient => "transient",
            ErrorClass::FrameDetached => "frame detached",
            ErrorClass::Fatal => "fatal",
        };
        f.write_str(label)
    }
}

/// Final error of a page fetch, after retries were exhausted or a fatal error hit.
#[derive(Debug, Clone, Error)]
#[error("{message} ({classification}, {attempts} attempt(s))")]
pub struct FetchError {
    pub classification: ErrorClass,
    pub message: String,
    pub attempts: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BrowserError::Navigation("net::ERR_NAME_NOT_RESOLVED".to_string());
        assert_eq!(err.to_string(), "navigation failed: net::ERR_NAME_NOT_RESOLVED");
    }

    #[test]
    fn test_fetch_error_display() {
        let err = FetchError {
            classification: ErrorClass::Transient,
            message: "timeout: navigation exceeded 120000ms".to_string(),
            attempts: 4,
        };
        let text = err.to_string();
        assert!(text.contains("transient"));
        assert!(text.contains("4 attempt(s)"));
    }

    #[test]
    fn test_retryable_classes() {
        assert!(ErrorClass::Transient.is_retryable());
        assert!(ErrorClass::FrameDetached.is_retryable());
        assert!(!ErrorClass::Fatal.is_retryable());
    }
}
