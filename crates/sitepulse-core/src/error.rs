//! Core error types for SitePulse.
//!
//! Subsystem crates carry their own error enums; this one covers the shared
//! domain types and configuration loading.

use thiserror::Error;

/// Errors raised by the shared domain types.
#[derive(Error, Debug)]
pub enum SitepulseError {
    /// Configuration could not be loaded or is invalid
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A value failed domain validation (job IDs, status and stage names)
    #[error("validation error: {0}")]
    Validation(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from loading, saving or validating `config.toml`.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No home directory to derive XDG paths from
    #[error("could not determine config directory (XDG base directories not available)")]
    NoConfigDir,

    /// Malformed TOML
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Reading or writing the config file failed
    #[error("config file I/O: {0}")]
    Io(#[from] std::io::Error),

    /// A setting is out of range
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Dotted setting name, e.g. `crawling.batch_size`
        field: String,
        /// What is wrong with it
        reason: String,
    },
}

/// Result type alias using `SitepulseError`.
pub type Result<T> = std::result::Result<T, SitepulseError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_value_names_the_setting() {
        let err = ConfigError::InvalidValue {
            field: "crawling.batch_size".to_string(),
            reason: "must be at least 1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid config value for crawling.batch_size: must be at least 1"
        );
    }

    #[test]
    fn test_config_error_wraps_into_core_error() {
        let err: SitepulseError = ConfigError::NoConfigDir.into();
        assert!(matches!(err, SitepulseError::Config(ConfigError::NoConfigDir)));
        assert!(err.to_string().starts_with("configuration error:"));
    }

    #[test]
    fn test_toml_parse_failure_converts() {
        let parse_err = toml::from_str::<toml::Value>("batch_size = [").unwrap_err();
        let err = ConfigError::from(parse_err);
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
