//! Retry policies.
//!
//! This module groups the knobs that control **whether** a failed fetch is
//! retried and **how long** to wait between attempts.
//!
//! ## Contents
//! - [`RetryConfig`]  attempt budget, backoff curve, retryable-tag classifier
//! - [`JitterPolicy`] randomization added to each delay
//!
//! ## Quick wiring
//! ```text
//! ResourceConfig { retry: RetryConfig, .. }
//!      └─► core::retry::RetryExecutor uses:
//!           - retry.is_retryable(err) to decide continue/stop
//!           - retry.delay_for(attempt) to schedule the next attempt
//! ```
//!
//! ## Defaults
//! - `max_retries = 3`, `initial_delay = 1s`, `max_delay = 10s`, `backoff_factor = 2`.
//! - `JitterPolicy::Additive { ratio: 0.1 }`.
//! - [`DEFAULT_RETRYABLE_TAGS`] as the classifier.

mod jitter;
mod retry;

pub use jitter::{DEFAULT_JITTER_RATIO, JitterPolicy};
pub use retry::{DEFAULT_RETRYABLE_TAGS, RetryConfig};
