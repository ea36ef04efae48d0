//! # RetryExecutor: bounded retries with exponential backoff.
//!
//! Runs a fallible operation up to `max_retries + 1` times, classifying each
//! failure with [`RetryConfig::is_retryable`].
//!
//! ## Architecture
//! ```text
//! loop {
//!   ├─► token cancelled? ─► Cancelled outcome
//!   ├─► attempt += 1
//!   ├─► operation().await
//!   │       ├─ Ok  ──► success outcome (attempts = attempt)
//!   │       └─ Err ──► classify
//!   │             ├─ Canceled          ─► Cancelled outcome
//!   │             ├─ not retryable     ─► Fatal outcome
//!   │             ├─ attempts exhausted─► Transient outcome (last error)
//!   │             └─ retryable:
//!   │                  ├─ delay = retry.delay_for(attempt)
//!   │                  ├─ observer(RetryAttempt { attempt, delay, error })
//!   │                  └─ sleep(delay) (cancellable)
//! }
//! ```
//!
//! ## Rules
//! - Attempts run **sequentially**, never in parallel.
//! - This is the **only** place in the crate that retries.
//! - The delay base is derived from the attempt number alone.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::outcome::OperationOutcome;
use crate::error::{ConfigError, ErrorInfo, OperationError};
use crate::policies::RetryConfig;

/// Notice passed to the retry observer before each backoff sleep.
#[derive(Debug)]
pub struct RetryAttempt<'a> {
    /// The attempt that just failed (1-based).
    pub attempt: u32,
    /// Delay before the next attempt.
    pub delay: Duration,
    /// The failure that triggered the retry.
    pub error: &'a OperationError,
}

/// Callback invoked before each backoff sleep.
pub type RetryObserver = Arc<dyn Fn(&RetryAttempt<'_>) + Send + Sync>;

/// Executes an operation with retries per [`RetryConfig`].
///
/// # Example
/// ```rust
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::time::Duration;
/// use loadvisor::{FetchError, OperationError, RetryConfig, RetryExecutor};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let calls = AtomicU32::new(0);
/// let exec = RetryExecutor::new(RetryConfig {
///     initial_delay: Duration::from_millis(1),
///     max_delay: Duration::from_millis(5),
///     ..RetryConfig::default()
/// });
///
/// let outcome = exec
///     .run(|| async {
///         if calls.fetch_add(1, Ordering::SeqCst) < 2 {
///             Err(OperationError::from(FetchError::new("unavailable")))
///         } else {
///             Ok(42)
///         }
///     })
///     .await;
///
/// assert_eq!(outcome.value(), Some(&42));
/// assert_eq!(outcome.attempts(), 3);
/// # }
/// ```
#[derive(Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
    token: Option<CancellationToken>,
    observer: Option<RetryObserver>,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            token: None,
            observer: None,
        }
    }

    /// [`new`](Self::new) that rejects an invalid config.
    pub fn try_new(config: RetryConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(config))
    }

    /// Token checked before each attempt and during backoff sleeps.
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Callback invoked before each backoff sleep.
    pub fn with_observer(mut self, observer: RetryObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Runs `operation` until it succeeds, fails fatally, or attempts run out.
    ///
    /// ### Outcome
    /// - success: value + attempts used
    /// - non-retryable failure: `ErrorKind::Fatal`, stops immediately
    /// - exhausted: last error as `ErrorKind::Transient`, `attempts = max_retries + 1`
    /// - cancelled (token or `OperationError::Canceled`): `ErrorKind::Cancelled`
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> OperationOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, OperationError>>,
    {
        let max_attempts = self.config.max_attempts();
        let mut attempt: u32 = 0;

        loop {
            if self.is_cancelled() {
                return OperationOutcome::failure(ErrorInfo::cancelled(), attempt);
            }

            attempt += 1;
            let err = match operation().await {
                Ok(value) => return OperationOutcome::success(value, attempt),
                Err(err) => err,
            };

            if matches!(err, OperationError::Canceled) {
                return OperationOutcome::failure(err.classify(false), attempt);
            }

            let retryable = self.config.is_retryable(&err);
            if !retryable {
                debug!(attempt, error = %err, "non-retryable failure");
                return OperationOutcome::failure(err.classify(false), attempt);
            }
            if attempt >= max_attempts {
                warn!(
                    attempts = attempt,
                    max_retries = self.config.max_retries,
                    error = %err,
                    "retries exhausted"
                );
                return OperationOutcome::failure(err.classify(true), attempt);
            }

            let delay = self.config.delay_for(attempt);
            if let Some(observer) = &self.observer {
                observer(&RetryAttempt {
                    attempt,
                    delay,
                    error: &err,
                });
            }
            debug!(
                attempt,
                max_retries = self.config.max_retries,
                backoff_ms = delay.as_millis() as u64,
                error = %err,
                "retrying after transient error"
            );

            match &self.token {
                Some(token) => {
                    let sleep = time::sleep(delay);
                    tokio::pin!(sleep);
                    select! {
                        _ = &mut sleep => {}
                        _ = token.cancelled() => {
                            return OperationOutcome::failure(ErrorInfo::cancelled(), attempt);
                        }
                    }
                }
                None => time::sleep(delay).await,
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.token.as_ref().is_some_and(|t| t.is_cancelled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, FetchError};
    use crate::policies::JitterPolicy;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            jitter: JitterPolicy::None,
            ..RetryConfig::default()
        }
    }

    fn transient() -> OperationError {
        OperationError::from(FetchError::new("backend").with_code("unavailable"))
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt() {
        let outcome = RetryExecutor::new(fast())
            .run(|| async { Ok::<_, OperationError>("ready") })
            .await;
        assert!(outcome.is_success());
        assert_eq!(outcome.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_with_last_error() {
        let calls = AtomicU32::new(0);
        let outcome = RetryExecutor::new(fast())
            .run(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Err::<(), _>(OperationError::from(
                    FetchError::new(format!("down #{n}")).with_code("unavailable"),
                ))
            })
            .await;

        assert_eq!(outcome.attempts(), 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        let err = outcome.error().expect("error");
        assert_eq!(err.kind, ErrorKind::Transient);
        assert_eq!(err.message, "down #4");
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_max_retries_runs_once() {
        let calls = AtomicU32::new(0);
        let outcome = RetryExecutor::new(RetryConfig {
            max_retries: 0,
            ..fast()
        })
        .run(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(transient())
        })
        .await;
        assert_eq!(outcome.attempts(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_observer_sees_growing_delays() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let observer: RetryObserver = Arc::new(move |r: &RetryAttempt<'_>| {
            sink.lock().expect("lock").push((r.attempt, r.delay));
        });

        let _ = RetryExecutor::new(fast())
            .with_observer(observer)
            .run(|| async { Err::<(), _>(transient()) })
            .await;

        let seen = seen.lock().expect("lock").clone();
        assert_eq!(
            seen,
            vec![
                (1, Duration::from_millis(100)),
                (2, Duration::from_millis(200)),
                (3, Duration::from_millis(400)),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_stops() {
        let token = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let exec = RetryExecutor::new(RetryConfig {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(5),
            ..fast()
        })
        .with_cancel(token.clone());

        let cancel = async {
            time::sleep(Duration::from_secs(1)).await;
            token.cancel();
        };
        let (outcome, ()) = tokio::join!(
            exec.run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(transient())
            }),
            cancel
        );

        assert_eq!(outcome.kind(), Some(ErrorKind::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_operation_cancel_is_not_retried() {
        let calls = AtomicU32::new(0);
        let outcome = RetryExecutor::new(fast())
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(OperationError::Canceled)
            })
            .await;
        assert_eq!(outcome.kind(), Some(ErrorKind::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
