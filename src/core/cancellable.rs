//! # Cancellable execution of one fetch.
//!
//! [`CancellableOperation`] wraps a fetcher with a parent [`CancellationToken`].
//! Every [`execute`](CancellableOperation::execute) derives a fresh child token,
//! so cancelling one execution never poisons the next one.
//!
//! ## Flow
//! ```text
//! execute()
//!   ├─► child = parent.child_token()      (fresh per call)
//!   ├─► child cancelled?  ──► Err(Canceled)
//!   ├─► select! { child.cancelled() ──► Err(Canceled)
//!   │             fetcher.fetch(child) ──► result }
//!   └─► child cancelled?  ──► Err(Canceled)   (late result is dropped)
//! ```
//!
//! ## Rules
//! - Cancellation is cooperative: the fetch future is dropped at its next suspension point.
//! - `cancel()` after completion is a no-op.
//! - Correctness never depends on this wrapper; stale results are discarded by generation.

use std::sync::Mutex;

use tokio::select;
use tokio_util::sync::CancellationToken;

use crate::core::lock;
use crate::error::OperationError;
use crate::fetch::FetcherRef;

/// One fetcher bound to a parent cancellation token.
pub struct CancellableOperation<T> {
    fetcher: FetcherRef<T>,
    parent: CancellationToken,
    current: Mutex<Option<CancellationToken>>,
}

impl<T: Send + 'static> CancellableOperation<T> {
    /// Binds `fetcher` to `parent`; cancelling `parent` cancels every execution.
    pub fn new(fetcher: FetcherRef<T>, parent: CancellationToken) -> Self {
        Self {
            fetcher,
            parent,
            current: Mutex::new(None),
        }
    }

    /// Name of the wrapped fetcher.
    pub fn name(&self) -> &str {
        self.fetcher.name()
    }

    /// Runs the fetcher once under a fresh child token.
    pub async fn execute(&self) -> Result<T, OperationError> {
        let token = self.parent.child_token();
        *lock(&self.current) = Some(token.clone());

        if token.is_cancelled() {
            return Err(OperationError::Canceled);
        }

        let res = select! {
            biased;
            _ = token.cancelled() => return Err(OperationError::Canceled),
            res = self.fetcher.fetch(token.clone()) => res,
        };

        if token.is_cancelled() {
            return Err(OperationError::Canceled);
        }
        res.map_err(OperationError::Failed)
    }

    /// Cancels the most recent execution.
    pub fn cancel(&self) {
        if let Some(token) = lock(&self.current).as_ref() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::fetch::FetchFn;
    use std::sync::Arc;
    use std::time::Duration;

    fn slow(value: u32) -> FetcherRef<u32> {
        FetchFn::arc("slow", move |_ctx: CancellationToken| async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<u32, FetchError>(value)
        })
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let f: FetcherRef<u32> = FetchFn::arc("ok", |_ctx: CancellationToken| async {
            Ok::<u32, FetchError>(7)
        });
        let op = CancellableOperation::new(f, CancellationToken::new());
        assert_eq!(op.execute().await, Ok(7));
        assert_eq!(op.name(), "ok");
        op.cancel();
    }

    #[tokio::test]
    async fn test_fetch_failure_is_wrapped() {
        let f: FetcherRef<u32> = FetchFn::arc("bad", |_ctx: CancellationToken| async {
            Err::<u32, FetchError>(FetchError::new("nope"))
        });
        let op = CancellableOperation::new(f, CancellationToken::new());
        assert_eq!(
            op.execute().await,
            Err(OperationError::Failed(FetchError::new("nope")))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_pending_fetch() {
        let started = Arc::new(tokio::sync::Notify::new());
        let signal = started.clone();
        let f: FetcherRef<u32> = FetchFn::arc("slow", move |_ctx: CancellationToken| {
            let signal = signal.clone();
            async move {
                signal.notify_one();
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<u32, FetchError>(1)
            }
        });
        let op = Arc::new(CancellableOperation::new(f, CancellationToken::new()));
        let runner = {
            let op = op.clone();
            tokio::spawn(async move { op.execute().await })
        };
        started.notified().await;
        op.cancel();

        let res = runner.await.expect("join");
        assert_eq!(res, Err(OperationError::Canceled));
    }

    #[tokio::test]
    async fn test_cancelled_parent_short_circuits() {
        let parent = CancellationToken::new();
        parent.cancel();
        let op = CancellableOperation::new(slow(1), parent);
        assert_eq!(op.execute().await, Err(OperationError::Canceled));
    }

    #[tokio::test]
    async fn test_new_execute_gets_fresh_token() {
        let f: FetcherRef<u32> = FetchFn::arc("ok", |ctx: CancellationToken| async move {
            if ctx.is_cancelled() {
                return Err(FetchError::new("saw cancelled token"));
            }
            Ok::<u32, FetchError>(1)
        });
        let op = CancellableOperation::new(f, CancellationToken::new());
        assert_eq!(op.execute().await, Ok(1));
        op.cancel();
        assert_eq!(op.execute().await, Ok(1));
    }
}
