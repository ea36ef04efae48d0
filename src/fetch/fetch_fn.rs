//! # Function-backed fetcher (`FetchFn`)
//!
//! [`FetchFn`] wraps a closure `F: Fn(CancellationToken) -> Fut`, producing a fresh
//! future per attempt. No state is shared between attempts; if a fetcher needs
//! shared state (a client, a counter) it should hold an `Arc<...>` explicitly.
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use loadvisor::{FetchError, FetchFn, FetcherRef};
//!
//! let stats: FetcherRef<u64> = FetchFn::arc("stats", |_ctx: CancellationToken| async move {
//!     Ok::<u64, FetchError>(42)
//! });
//!
//! assert_eq!(stats.name(), "stats");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::FetchError;
use crate::fetch::fetch::Fetch;

/// Function-backed fetcher implementation.
#[derive(Debug)]
pub struct FetchFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> FetchFn<F> {
    /// Creates a new function-backed fetcher.
    ///
    /// Prefer [`FetchFn::arc`] when you immediately need a [`FetcherRef`](crate::FetcherRef).
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self { name: name.into(), f }
    }

    /// Creates the fetcher and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<T, F, Fut> Fetch<T> for FetchFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    T: Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, ctx: CancellationToken) -> Result<T, FetchError> {
        (self.f)(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetcherRef;

    #[tokio::test]
    async fn test_fresh_future_per_call() {
        let calls = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let c = calls.clone();
        let f: FetcherRef<u32> = FetchFn::arc("counter", move |_ctx: CancellationToken| {
            let c = c.clone();
            async move { Ok::<u32, FetchError>(c.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1) }
        });

        assert_eq!(f.fetch(CancellationToken::new()).await, Ok(1));
        assert_eq!(f.fetch(CancellationToken::new()).await, Ok(2));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
