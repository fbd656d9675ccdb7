//! Database error types.

use thiserror::Error;

/// Database-specific errors.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to open or create database connection.
    #[error("failed to open database: {0}")]
    Open(String),

    /// Migration execution failed.
    #[error("migration failed: {0}")]
    Migration(String),

    /// Requested record was not found.
    #[error("{0} not found")]
    NotFound(String),

    /// A job's sample sitemap is written once and never replaced.
    #[error("sample sitemap already written for job {0}")]
    SampleAlreadyWritten(String),

    /// Failed to decode database value.
    #[error("decode error: {0}")]
    Decode(String),

    /// Serialization/deserialization of a JSON column failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Underlying `SQLx` error.
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Result type alias for database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DatabaseError::NotFound("crawl job 'abc'".to_string());
        assert_eq!(err.to_string(), "crawl job 'abc' not found");

        let err = DatabaseError::SampleAlreadyWritten("abc".to_string());
        assert!(err.to_string().contains("already written"));
    }
}
