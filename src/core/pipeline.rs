//! # One composite load: deadline over retries over a cancellable fetch.
//!
//! ```text
//! TimeoutGuard(opts.timeout, token)
//!   └─ RetryExecutor(retry, token, observer ─► RetryScheduled)   [skipped when skip_retry]
//!        └─ CancellableOperation(fetcher, token)
//!             └─ Err ─► AttemptFailed
//! timer wins ─► TimeoutHit, Timeout outcome
//! ```
//!
//! ## Rules
//! - Publishes attempt-level events only; settlement events belong to the caller.
//! - Attempts are counted across the race so a timeout reports how far it got.
//! - Never touches resource state.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio_util::sync::CancellationToken;

use crate::config::LoadOptions;
use crate::core::cancellable::CancellableOperation;
use crate::core::deadline::TimeoutGuard;
use crate::core::outcome::OperationOutcome;
use crate::core::retry::{RetryAttempt, RetryExecutor, RetryObserver};
use crate::error::OperationError;
use crate::events::{Bus, Event, EventKind};
use crate::fetch::FetcherRef;
use crate::policies::RetryConfig;

/// Event context of one composite load.
#[derive(Clone)]
pub(crate) struct Emitter {
    pub(crate) bus: Bus,
    pub(crate) resource: Arc<str>,
    pub(crate) key: Option<Arc<str>>,
    pub(crate) generation: u64,
}

impl Emitter {
    fn event(&self, kind: EventKind) -> Event {
        let ev = Event::new(kind)
            .with_resource(Arc::clone(&self.resource))
            .with_generation(self.generation);
        match &self.key {
            Some(key) => ev.with_key(Arc::clone(key)),
            None => ev,
        }
    }

    fn attempt_failed(&self, attempt: u32, err: &OperationError) {
        self.bus.publish(
            self.event(EventKind::AttemptFailed)
                .with_attempt(attempt)
                .with_reason(err.to_string()),
        );
    }

    fn retry_scheduled(&self, retry: &RetryAttempt<'_>) {
        self.bus.publish(
            self.event(EventKind::RetryScheduled)
                .with_attempt(retry.attempt)
                .with_delay(retry.delay)
                .with_reason(retry.error.to_string()),
        );
    }

    fn timeout_hit(&self, err: &OperationError) {
        let mut ev = self.event(EventKind::TimeoutHit).with_reason(err.to_string());
        if let OperationError::Timeout { timeout } = err {
            ev = ev.with_timeout(*timeout);
        }
        self.bus.publish(ev);
    }
}

/// Runs `fetcher` under the full composition and returns its settled outcome.
pub(crate) async fn run_pipeline<V: Send + 'static>(
    fetcher: FetcherRef<V>,
    token: CancellationToken,
    opts: LoadOptions,
    retry: &RetryConfig,
    emitter: &Emitter,
) -> OperationOutcome<V> {
    let op = CancellableOperation::new(fetcher, token.clone());
    let attempts = AtomicU32::new(0);
    let guard = TimeoutGuard::from_deadline(opts.deadline()).with_token(token.clone());

    let op = &op;
    let attempts_ref = &attempts;
    let attempt_once = move || async move {
        let n = attempts_ref.fetch_add(1, Ordering::SeqCst) + 1;
        let res = op.execute().await;
        if let Err(err) = &res {
            if !matches!(err, OperationError::Canceled) {
                emitter.attempt_failed(n, err);
            }
        }
        res
    };

    let raced = if opts.skip_retry {
        guard
            .run(async {
                match attempt_once().await {
                    Ok(value) => OperationOutcome::success(value, 1),
                    Err(err) => OperationOutcome::failure(err.classify(retry.is_retryable(&err)), 1),
                }
            })
            .await
    } else {
        let sink = emitter.clone();
        let observer: RetryObserver = Arc::new(move |r: &RetryAttempt<'_>| sink.retry_scheduled(r));
        let exec = RetryExecutor::new(retry.clone())
            .with_cancel(token.clone())
            .with_observer(observer);
        guard.run(exec.run(attempt_once)).await
    };

    match raced {
        Ok(outcome) => outcome,
        Err(err) => {
            emitter.timeout_hit(&err);
            OperationOutcome::failure(err.classify(false), attempts.load(Ordering::SeqCst))
        }
    }
}
