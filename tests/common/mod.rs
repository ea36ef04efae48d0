//! Shared helpers for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use loadvisor::{FetchError, FetchFn, FetcherRef, JitterPolicy, ResourceConfig, RetryConfig};
use tokio_util::sync::CancellationToken;

/// Retry config with short, deterministic delays.
pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 3,
        initial_delay: Duration::from_millis(100),
        max_delay: Duration::from_secs(1),
        jitter: JitterPolicy::None,
        ..RetryConfig::default()
    }
}

/// Resource config named `name` using [`fast_retry`].
pub fn config(name: &str) -> ResourceConfig {
    ResourceConfig {
        retry: fast_retry(),
        ..ResourceConfig::named(name)
    }
}

/// Fetcher that returns `value` immediately.
pub fn ready<T: Clone + Send + Sync + 'static>(value: T) -> FetcherRef<T> {
    FetchFn::arc("ready", move |_ctx: CancellationToken| {
        let value = value.clone();
        async move { Ok::<T, FetchError>(value) }
    })
}

/// Fetcher that returns `value` after `delay`.
pub fn delayed<T: Clone + Send + Sync + 'static>(value: T, delay: Duration) -> FetcherRef<T> {
    FetchFn::arc("delayed", move |_ctx: CancellationToken| {
        let value = value.clone();
        async move {
            tokio::time::sleep(delay).await;
            Ok::<T, FetchError>(value)
        }
    })
}

/// Fetcher that never settles.
pub fn hanging<T: Send + 'static>() -> FetcherRef<T> {
    FetchFn::arc("hanging", |_ctx: CancellationToken| async {
        std::future::pending::<()>().await;
        Err::<T, FetchError>(FetchError::new("unreachable"))
    })
}

/// Fetcher that fails with `error` for the first `failures` calls, then returns `value`.
///
/// Returns the fetcher and its call counter.
pub fn flaky<T: Clone + Send + Sync + 'static>(
    failures: u32,
    error: FetchError,
    value: T,
) -> (FetcherRef<T>, Arc<AtomicU32>) {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let fetcher: FetcherRef<T> = FetchFn::arc("flaky", move |_ctx: CancellationToken| {
        let counter = Arc::clone(&counter);
        let error = error.clone();
        let value = value.clone();
        async move {
            if counter.fetch_add(1, Ordering::SeqCst) < failures {
                Err(error)
            } else {
                Ok::<T, FetchError>(value)
            }
        }
    });
    (fetcher, calls)
}

pub fn calls(counter: &AtomicU32) -> u32 {
    counter.load(Ordering::SeqCst)
}
