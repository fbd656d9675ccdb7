//! Identifier newtypes shared across SitePulse crates.

use crate::error::SitepulseError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Newtype for crawl job identifiers.
///
/// Job IDs are opaque: the intake layer may hand out UUIDs or any other
/// URL-safe token of 1-128 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Create a new `JobId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID is empty, too long, or contains characters
    /// outside `[A-Za-z0-9_-]`.
    pub fn new(id: impl Into<String>) -> Result<Self, SitepulseError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Create a new random `JobId` using UUID v4.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(id: &str) -> Result<(), SitepulseError> {
        static JOB_ID_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex =
            JOB_ID_REGEX.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{1,128}$").expect("valid regex"));

        if regex.is_match(id) {
            Ok(())
        } else {
            Err(SitepulseError::Validation(format!(
                "invalid job ID: must be 1-128 URL-safe characters, got '{id}'"
            )))
        }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
