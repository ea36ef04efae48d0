//! # Deadline race for one composite operation.
//!
//! [`TimeoutGuard`] races a future against a timer. A zero deadline runs the
//! future directly.
//!
//! ## Flow
//! ```text
//! Deadline disabled:
//!   fut.await ──► Ok(output)
//!
//! Deadline enabled:
//!   time::timeout(d, fut)
//!     ├─ settles first ──► Ok(output)
//!     └─ timer first   ──► cancel token (if any) → Err(Timeout { d })
//! ```
//!
//! ## Rules
//! - The guard stops waiting; it does not rely on the loser stopping.
//! - The loser is dropped and its token cancelled, so cooperative work can exit.
//! - Any late effect of the loser is discarded downstream by generation.

use std::future::Future;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::OperationError;

/// Deadline applied to a composite operation.
#[derive(Clone, Debug, Default)]
pub struct TimeoutGuard {
    deadline: Option<Duration>,
    token: Option<CancellationToken>,
}

impl TimeoutGuard {
    /// Creates a guard; `Duration::ZERO` disables the deadline.
    pub fn new(timeout: Duration) -> Self {
        Self::from_deadline((timeout > Duration::ZERO).then_some(timeout))
    }

    /// Creates a guard from an optional deadline; `None` disables it.
    pub fn from_deadline(deadline: Option<Duration>) -> Self {
        Self { deadline, token: None }
    }

    /// Token cancelled when the deadline wins the race.
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Races `fut` against the deadline.
    ///
    /// The only error produced here is [`OperationError::Timeout`].
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, OperationError> {
        let Some(dur) = self.deadline else {
            return Ok(fut.await);
        };
        match time::timeout(dur, fut).await {
            Ok(output) => Ok(output),
            Err(_elapsed) => {
                if let Some(token) = &self.token {
                    token.cancel();
                }
                debug!(timeout_ms = dur.as_millis() as u64, "deadline elapsed");
                Err(OperationError::Timeout { timeout: dur })
            }
        }
    }
}

/// Races a fallible operation against `timeout` and flattens the result.
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use loadvisor::{OperationError, with_deadline};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let res = with_deadline(
///     async { Ok::<u32, OperationError>(5) },
///     Duration::from_secs(1),
/// ).await;
/// assert_eq!(res, Ok(5));
/// # }
/// ```
pub async fn with_deadline<T, F>(fut: F, timeout: Duration) -> Result<T, OperationError>
where
    F: Future<Output = Result<T, OperationError>>,
{
    TimeoutGuard::new(timeout).run(fut).await.and_then(|res| res)
}
