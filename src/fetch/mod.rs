//! # Fetcher abstractions.
//!
//! This module provides the data-source contract consumed by resources:
//! - [`Fetch`] - trait for async cancelable data sources
//! - [`FetchFn`] - closure-backed implementation
//! - [`FetcherRef`] - shared reference to a fetcher (`Arc<dyn Fetch<T>>`)

#[allow(clippy::module_inception)]
mod fetch;
mod fetch_fn;

pub use fetch::{Fetch, FetcherRef};
pub use fetch_fn::FetchFn;
