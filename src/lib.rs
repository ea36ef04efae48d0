//! # loadvisor
//!
//! **Loadvisor** is a resilient async data-loading layer for dashboard views.
//!
//! It fetches remote data, retries transient failures with exponential backoff,
//! races each load against a deadline, discards results made stale by newer
//! requests, and manages long-lived push subscriptions whose callbacks are
//! ignored once superseded or torn down.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐
//!     │  FetcherRef  │   │  FetcherRef  │   │ subscription     │
//!     │   (orders)   │   │ (per key)    │   │ setup(pusher)    │
//!     └──────┬───────┘   └──────┬───────┘   └────────┬─────────┘
//!            ▼                  ▼                    ▼
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────────────┐
//!     │  Resource<T> │◄──│ MultiSource  │   │ SubscriptionRegistry │
//!     │  load/reload │   │  load_all    │   │ setup / cleanup      │
//!     │  reset       │   └──────────────┘   └──────────┬───────────┘
//!     └──────┬───────┘                                 │ push (same generation check)
//!            │ run_pipeline                            │
//!            ▼                                         ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │ TimeoutGuard ─► RetryExecutor ─► CancellableOperation ─► fetch()  │
//! └──────┬────────────────────────────────────────────────────────────┘
//!        │ settle(my_gen, outcome)
//!        ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │ StateCell: watch<ResourceState<T>>                                │
//! │   commit only if state.generation == my_gen                       │
//! └──────┬────────────────────────────────────────────────────────────┘
//!        │ Events (LoadStarted, RetryScheduled, TimeoutHit, ...)
//!        ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                     Bus (broadcast channel)                       │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       SubscriberSet::listen
//!                        ┌──────────┼──────────┐
//!                        ▼          ▼          ▼
//!                     worker1    worker2    workerN
//! ```
//!
//! ### Lifecycle of one load
//! ```text
//! load(fetcher, opts)
//!   ├─► cancel previous token + auto-retry timer
//!   ├─► generation += 1 → my_gen, loading = opts.show_loading_state
//!   ├─► TimeoutGuard(opts.timeout)
//!   │     └─ RetryExecutor (skipped when opts.skip_retry)
//!   │          loop {
//!   │            ├─ CancellableOperation::execute()
//!   │            ├─ Ok  ─► done
//!   │            └─ Err ─► not retryable ─► Fatal
//!   │                      exhausted     ─► Transient
//!   │                      else ─► sleep(min(initial·factor^(n-1) + jitter, max)) ─► continue
//!   │          }
//!   └─► settle
//!         ├─ stale or cancelled ─► Discarded (nothing committed)
//!         ├─ success            ─► data, on_success
//!         └─ failure            ─► error, on_error, maybe auto-retry ("network")
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                              |
//! |-------------------|---------------------------------------------------------------|-------------------------------------------------|
//! | **Loading**       | Generation-guarded loads with reload/reset and mutators.      | [`Resource`], [`ResourceState`], [`LoadOptions`]|
//! | **Retries**       | Bounded exponential backoff with jitter and tag classifier.   | [`RetryExecutor`], [`RetryConfig`]              |
//! | **Deadlines**     | Race any operation against a timer.                           | [`TimeoutGuard`], [`with_deadline`]             |
//! | **Cancellation**  | Fresh child token per execution.                              | [`CancellableOperation`]                        |
//! | **Subscriptions** | Push listeners feeding a resource, released exactly once.     | [`SubscriptionRegistry`], [`Pusher`]            |
//! | **Aggregation**   | Keyed fan-out with partial-success folding.                   | [`MultiSource`]                                 |
//! | **Events**        | Diagnostic events and subscriber fan-out.                     | [`Bus`], [`Event`], [`Subscribe`]               |
//! | **Errors**        | Typed errors with stable labels.                              | [`FetchError`], [`OperationError`]              |
//!
//! ## Optional features
//! - `logging`: exports the built-in `LogWriter`, rendering events through `tracing`.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use loadvisor::{FetchError, FetchFn, FetcherRef, LoadOptions, LoadStatus, Resource, ResourceConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let orders: Resource<Vec<String>> = Resource::builder(ResourceConfig::named("orders"))
//!         .empty_when_len_zero()
//!         .on_error(|msg: &str| eprintln!("orders failed: {msg}"))
//!         .build();
//!
//!     let fetch: FetcherRef<Vec<String>> = FetchFn::arc("orders", |ctx: CancellationToken| async move {
//!         if ctx.is_cancelled() {
//!             return Err(FetchError::new("cancelled"));
//!         }
//!         Ok(vec!["#1001".to_string()])
//!     });
//!
//!     let opts = LoadOptions { timeout: Duration::from_secs(5), ..LoadOptions::default() };
//!     assert_eq!(orders.load(fetch, opts).await, LoadStatus::Succeeded);
//!
//!     let state = orders.snapshot();
//!     assert_eq!(state.data.as_deref(), Some(&["#1001".to_string()][..]));
//!     assert!(!state.loading);
//! }
//! ```

mod config;
mod core;
mod error;
mod events;
mod fetch;
mod policies;
mod subscribers;

// ---- Public re-exports ----

pub use config::{AutoRetry, LoadOptions, ResourceConfig};
pub use self::core::{
    CancellableOperation, IsEmpty, LoadStatus, MultiSource, OperationOutcome, Phase, Pusher, Resource,
    ResourceBuilder, ResourceState, RetryAttempt, RetryExecutor, RetryObserver, SubscriptionHandle,
    SubscriptionRegistry, TimeoutGuard, Unsubscribe, with_deadline,
};
pub use error::{ConfigError, ErrorInfo, ErrorKind, FetchError, OperationError};
pub use events::{Bus, Event, EventKind, ResourceEvents};
pub use fetch::{Fetch, FetchFn, FetcherRef};
pub use policies::{DEFAULT_JITTER_RATIO, DEFAULT_RETRYABLE_TAGS, JitterPolicy, RetryConfig};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in tracing subscriber.
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
