//! # Fetcher abstraction.
//!
//! This module defines the [`Fetch`] trait (async, cancelable). The common
//! handle type is [`FetcherRef`], an `Arc<dyn Fetch<T>>` that a resource keeps
//! so `reload()` and deferred auto-retries can call the same fetcher again.
//!
//! A fetcher receives a [`CancellationToken`] and should check it around its
//! suspension points so that a superseded load stops early.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::FetchError;

/// # Asynchronous, cancelable data source.
///
/// A `Fetch` has a stable [`name`](Fetch::name) (used as the key in
/// multi-source loads and in events) and an async [`fetch`](Fetch::fetch)
/// method that receives a [`CancellationToken`].
///
/// # Example
/// ```
/// use tokio_util::sync::CancellationToken;
/// use async_trait::async_trait;
/// use loadvisor::{Fetch, FetchError};
///
/// struct MenuItems;
///
/// #[async_trait]
/// impl Fetch<Vec<String>> for MenuItems {
///     fn name(&self) -> &str { "menu_items" }
///
///     async fn fetch(&self, ctx: CancellationToken) -> Result<Vec<String>, FetchError> {
///         if ctx.is_cancelled() {
///             return Err(FetchError::new("cancelled before request"));
///         }
///         Ok(vec!["espresso".into()])
///     }
/// }
/// ```
#[async_trait]
pub trait Fetch<T>: Send + Sync + 'static {
    /// Returns a stable, human-readable fetcher name.
    fn name(&self) -> &str;

    /// Produces one value or fails.
    ///
    /// Called once per attempt; each call receives a fresh child token.
    async fn fetch(&self, ctx: CancellationToken) -> Result<T, FetchError>;
}

/// Shared handle to a fetcher.
pub type FetcherRef<T> = Arc<dyn Fetch<T>>;
