//! Wait-strategy escalation and retry timing for page fetches.

use sitepulse_core::BrowserConfig;
use std::fmt;
use std::time::Duration;

/// When a navigation counts as finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStrategy {
    /// Load complete and resource activity quiet for a short window
    NetworkIdleRelaxed,
    /// DOM parsed; subresources may still be loading
    DomContentLoaded,
    /// Load complete and resource activity quiet for a long window
    NetworkIdleStrict,
}

impl WaitStrategy {
    const ESCALATION: [WaitStrategy; 3] = [
        WaitStrategy::NetworkIdleRelaxed,
        WaitStrategy::DomContentLoaded,
        WaitStrategy::NetworkIdleStrict,
    ];

    /// Strategy for a zero-based attempt; the last one repeats.
    pub fn for_attempt(attempt: u32) -> Self {
        let index = usize::try_from(attempt)
            .unwrap_or(usize::MAX)
            .min(Self::ESCALATION.len() - 1);
        Self::ESCALATION[index]
    }

    /// Quiet period required before network idle is assumed.
    pub fn quiet_window(self) -> Option<Duration> {
        match self {
            WaitStrategy::NetworkIdleRelaxed => Some(Duration::from_millis(500)),
            WaitStrategy::DomContentLoaded => None,
            WaitStrategy::NetworkIdleStrict => Some(Duration::from_millis(1000)),
        }
    }
}

impl fmt::Display for WaitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WaitStrategy::NetworkIdleRelaxed => "networkidle2",
            WaitStrategy::DomContentLoaded => "domcontentloaded",
            WaitStrategy::NetworkIdleStrict => "networkidle0",
        };
        f.write_str(label)
    }
}

/// Timing knobs for [`crate::PageFetcher`].
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Backoff before retry `n` is `base_delay * 2^n`
    pub base_delay: Duration,
    /// Navigation timeout of the first attempt
    pub navigation_timeout: Duration,
    /// Added to the navigation timeout per retry
    pub timeout_step: Duration,
    /// Bound on the post-navigation ready-state wait
    pub ready_state_timeout: Duration,
    /// Settle delay after the ready-state wait
    pub settle_base: Duration,
    /// Added to the settle delay per retry
    pub settle_step: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
            navigation_timeout: Duration::from_secs(120),
            timeout_step: Duration::from_secs(10),
            ready_state_timeout: Duration::from_secs(5),
            settle_base: Duration::from_millis(1000),
            settle_step: Duration::from_millis(500),
        }
    }
}

impl FetchPolicy {
    pub fn from_config(config: &BrowserConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            navigation_timeout: Duration::from_secs(config.navigation_timeout_secs),
            timeout_step: Duration::from_secs(config.timeout_step_secs),
            ..Self::default()
        }
    }

    /// Same attempt budget, no sleeping. Used by tests and dry runs.
    #[must_use]
    pub fn without_delays(self) -> Self {
        Self {
            base_delay: Duration::ZERO,
            settle_base: Duration::ZERO,
            settle_step: Duration::ZERO,
            ..self
        }
    }

    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    pub fn navigation_timeout_for(&self, attempt: u32) -> Duration {
        self.navigation_timeout + self.timeout_step.saturating_mul(attempt)
    }

    pub fn settle_delay(&self, attempt: u32) -> Duration {
        self.settle_base + self.settle_step.saturating_mul(attempt)
    }
}
