//! Configuration management for SitePulse.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration.
///
/// This is loaded from `~/.config/sitepulse/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Remote browser connection and navigation settings
    pub browser: BrowserConfig,
    /// Plain HTTP probe settings (URL status, robots.txt, sitemaps)
    pub http: HttpConfig,
    /// AI analysis webhook endpoints
    pub webhooks: WebhookConfig,
    /// Sampling and crawl scheduling settings
    pub crawling: CrawlingConfig,
    /// Job/page store settings
    pub database: DatabaseConfig,
    /// Completion notification settings
    pub notifications: NotificationConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(&config_path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides, then validate.
    ///
    /// Supports the following environment variables:
    /// - `SITEPULSE_BROWSER_URL`: remote browser endpoint
    /// - `SITEPULSE_BROWSER_TOKEN`: remote browser token
    /// - `SITEPULSE_PAGE_WEBHOOK_URL`: per-page AI analysis webhook
    /// - `SITEPULSE_COMPLETION_WEBHOOK_URL`: job completion AI webhook
    /// - `SITEPULSE_FIRST_LEVEL_LIMIT`: first-level sampling limit
    /// - `SITEPULSE_SCAN_INTERVAL_SECS`: background scan interval
    /// - `SITEPULSE_DATABASE_PATH`: SQLite database path
    /// - `SITEPULSE_SMTP_PASSWORD`: SMTP password for completion emails
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using the given variable lookup.
    ///
    /// Unparseable numeric values are ignored. Empty strings clear optional
    /// endpoints, which marks them as unconfigured.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("SITEPULSE_BROWSER_URL") {
            self.browser.endpoint = non_empty(val);
            tracing::debug!("Override browser.endpoint from env");
        }

        if let Some(val) = lookup("SITEPULSE_BROWSER_TOKEN") {
            self.browser.token = non_empty(val);
        }

        if let Some(val) = lookup("SITEPULSE_PAGE_WEBHOOK_URL") {
            self.webhooks.page_analysis_url = non_empty(val);
            tracing::debug!("Override webhooks.page_analysis_url from env");
        }

        if let Some(val) = lookup("SITEPULSE_COMPLETION_WEBHOOK_URL") {
            self.webhooks.job_completion_url = non_empty(val);
            tracing::debug!("Override webhooks.job_completion_url from env");
        }

        if let Some(val) = lookup("SITEPULSE_FIRST_LEVEL_LIMIT") {
            if let Ok(limit) = val.trim().parse() {
                self.crawling.first_level_limit = limit;
                tracing::debug!("Override crawling.first_level_limit from env: {}", limit);
            }
        }

        if let Some(val) = lookup("SITEPULSE_SCAN_INTERVAL_SECS") {
            if let Ok(secs) = val.trim().parse() {
                self.crawling.scan_interval_secs = secs;
                tracing::debug!("Override crawling.scan_interval_secs from env: {}", secs);
            }
        }

        if let Some(val) = lookup("SITEPULSE_DATABASE_PATH") {
            if !val.trim().is_empty() {
                self.database.path = Some(PathBuf::from(val));
            }
        }

        if let Some(val) = lookup("SITEPULSE_SMTP_PASSWORD") {
            self.notifications.smtp_password = non_empty(val);
        }
    }

    /// Reject values that would stall or disable the pipeline.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.crawling.batch_size == 0 {
            return Err(invalid("crawling.batch_size", "must be at least 1"));
        }
        if self.crawling.scan_interval_secs == 0 {
            return Err(invalid("crawling.scan_interval_secs", "must be at least 1"));
        }
        if self.crawling.first_level_limit == 0 {
            return Err(invalid("crawling.first_level_limit", "must be at least 1"));
        }
        if self.notifications.enabled && self.notifications.smtp_host.trim().is_empty() {
            return Err(invalid(
                "notifications.smtp_host",
                "required when notifications are enabled",
            ));
        }
        Ok(())
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| invalid("config_path", "no parent directory"))?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/sitepulse/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("com", "sitepulse", "sitepulse").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/sitepulse`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("com", "sitepulse", "sitepulse").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.data_dir().to_path_buf())
    }

    /// Resolve the database path, defaulting to `<data_dir>/sitepulse.db`.
    pub fn database_path(&self) -> ConfigResult<PathBuf> {
        match &self.database.path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join("sitepulse.db")),
        }
    }
}

fn non_empty(val: String) -> Option<String> {
    let trimmed = val.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// Remote browser settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Base URL of the remote browser service (http(s) or ws(s))
    pub endpoint: Option<String>,
    /// Access token appended to the WebSocket endpoint
    #[serde(skip)]
    pub token: Option<String>,
    /// User agent presented by browser sessions
    pub user_agent: String,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Retries after the first navigation attempt
    pub max_retries: u32,
    /// First backoff delay; doubles per retry
    pub retry_base_delay_ms: u64,
    /// Navigation timeout for the first attempt
    pub navigation_timeout_secs: u64,
    /// Extra navigation timeout added per retry
    pub timeout_step_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            token: None,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            viewport_width: 1280,
            viewport_height: 720,
            max_retries: 3,
            retry_base_delay_ms: 2000,
            navigation_timeout_secs: 120,
            timeout_step_secs: 10,
        }
    }
}

/// Plain HTTP probe settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum redirects followed by URL status checks
    pub max_redirects: usize,
    /// User agent for robots.txt and sitemap requests
    pub user_agent: String,
}

impl HttpConfig {
    /// Request timeout as a `Duration`.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_redirects: 5,
            user_agent: "Mozilla/5.0 (compatible; SitePulse Bot/1.0)".to_string(),
        }
    }
}

/// AI analysis webhook settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Per-page analysis endpoint; unset means page analysis is skipped
    pub page_analysis_url: Option<String>,
    /// Whole-job completion endpoint; unset means the step is omitted
    pub job_completion_url: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Retries after the first attempt for transient failures
    pub max_retries: u32,
    /// Fixed delay between retries
    pub retry_delay_ms: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            page_analysis_url: None,
            job_completion_url: None,
            timeout_secs: 120,
            max_retries: 3,
            retry_delay_ms: 2000,
        }
    }
}

/// Sampling and crawl scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlingConfig {
    /// Depth-1 pages crawled per job
    pub first_level_limit: usize,
    /// Deeper pages sampled from each category
    pub max_per_category: usize,
    /// URLs fetched concurrently within one batch
    pub batch_size: usize,
    /// Pause between batches in milliseconds
    pub batch_delay_ms: u64,
    /// Interval between background scans in seconds
    pub scan_interval_secs: u64,
    /// Child sitemaps fetched from a sitemap index
    pub max_child_sitemaps: usize,
    /// Links kept from homepage discovery when no sitemap exists
    pub fallback_link_limit: usize,
}

impl CrawlingConfig {
    /// Scan interval as a `Duration`.
    #[must_use]
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    /// Batch pause as a `Duration`.
    #[must_use]
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

impl Default for CrawlingConfig {
    fn default() -> Self {
        Self {
            first_level_limit: 10,
            max_per_category: 2,
            batch_size: 3,
            batch_delay_ms: 2000,
            scan_interval_secs: 30,
            max_child_sitemaps: 10,
            fallback_link_limit: 20,
        }
    }
}

/// Job/page store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database path (defaults to the XDG data directory)
    pub path: Option<PathBuf>,
}

/// Completion notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Send a completion email when a job finishes
    pub enabled: bool,
    /// SMTP relay host
    pub smtp_host: String,
    /// SMTP port
    pub smtp_port: u16,
    /// SMTP username
    pub smtp_username: String,
    /// SMTP password (never written to disk)
    #[serde(skip)]
    pub smtp_password: Option<String>,
    /// Sender address
    pub from_address: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: String::new(),
            smtp_port: 587,
            smtp_username: String::new(),
            smtp_password: None,
            from_address: "SitePulse <reports@sitepulse.local>".to_string(),
        }
    }
}
