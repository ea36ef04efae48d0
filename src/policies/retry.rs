//! # Retry configuration: attempt budget, backoff curve and error classifier.
//!
//! [`RetryConfig`] is parameterized by:
//! - [`RetryConfig::max_retries`]: extra attempts after the first one;
//! - [`RetryConfig::initial_delay`]: delay after the first failure;
//! - [`RetryConfig::backoff_factor`]: multiplicative growth factor;
//! - [`RetryConfig::max_delay`]: cap applied after jitter;
//! - [`RetryConfig::retryable_tags`]: substrings marking an error as transient.
//!
//! The delay after failed attempt `n` (1-based) is
//! `min(initial_delay × factor^(n-1) + jitter, max_delay)`.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use loadvisor::{JitterPolicy, RetryConfig};
//!
//! let cfg = RetryConfig {
//!     initial_delay: Duration::from_millis(100),
//!     max_delay: Duration::from_secs(1),
//!     jitter: JitterPolicy::None,
//!     ..RetryConfig::default()
//! };
//!
//! assert_eq!(cfg.delay_for(1), Duration::from_millis(100));
//! assert_eq!(cfg.delay_for(2), Duration::from_millis(200));
//! assert_eq!(cfg.delay_for(10), Duration::from_secs(1));
//! ```

use std::time::Duration;

use crate::error::{ConfigError, OperationError};
use crate::policies::jitter::JitterPolicy;

/// Tags that mark a failure as transient unless configured otherwise.
pub const DEFAULT_RETRYABLE_TAGS: &[&str] = &[
    "unavailable",
    "network-request-failed",
    "timeout",
    "cancelled",
    "deadline-exceeded",
    "resource-exhausted",
    "internal",
    "aborted",
];

/// Retry budget, backoff curve and transient-error classifier.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Extra attempts after the first one (total = `max_retries + 1`).
    pub max_retries: u32,
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Multiplicative growth factor (must be `> 1`).
    pub backoff_factor: f64,
    /// Randomization added to each delay.
    pub jitter: JitterPolicy,
    /// Case-insensitive substrings that mark an error as retryable.
    pub retryable_tags: Vec<String>,
}

impl Default for RetryConfig {
    /// Returns a config with:
    /// - `max_retries = 3`;
    /// - `initial_delay = 1s`, `max_delay = 10s`, `backoff_factor = 2`;
    /// - additive 10% jitter;
    /// - [`DEFAULT_RETRYABLE_TAGS`].
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            backoff_factor: 2.0,
            jitter: JitterPolicy::default(),
            retryable_tags: DEFAULT_RETRYABLE_TAGS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl RetryConfig {
    /// Total attempts allowed (`max_retries + 1`).
    #[inline]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Checks `initial_delay <= max_delay` and `backoff_factor > 1`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_delay > self.max_delay {
            return Err(ConfigError::DelayOrder {
                initial: self.initial_delay,
                max: self.max_delay,
            });
        }
        if !(self.backoff_factor > 1.0) {
            return Err(ConfigError::Factor {
                factor: self.backoff_factor,
            });
        }
        Ok(())
    }

    /// Un-jittered delay after failed attempt `attempt` (1-based), clamped to `max_delay`.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exp);
        if !secs.is_finite() || secs < 0.0 || secs > self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    /// Delay to sleep after failed attempt `attempt` (1-based), jitter included.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.jitter.apply(self.base_delay(attempt)).min(self.max_delay)
    }

    /// Whether any haystack contains a configured tag (case-insensitive).
    pub fn matches_tags(&self, haystacks: &[&str]) -> bool {
        let lowered: Vec<String> = haystacks.iter().map(|h| h.to_lowercase()).collect();
        self.retryable_tags.iter().any(|tag| {
            let tag = tag.to_lowercase();
            !tag.is_empty() && lowered.iter().any(|h| h.contains(&tag))
        })
    }

    /// Classifies an operation failure.
    ///
    /// `Failed` is matched on its rendered form, its code and its message.
    /// `Canceled` is never retryable: cancellation comes from a newer load or a reset.
    pub fn is_retryable(&self, err: &OperationError) -> bool {
        match err {
            OperationError::Canceled => false,
            OperationError::Failed(e) => {
                let rendered = e.to_string();
                let code = e.code().unwrap_or_default();
                self.matches_tags(&[&rendered, code, e.message()])
            }
            other => self.matches_tags(&[other.as_label(), &other.to_string()]),
        }
    }
}
