//! # MultiSource: keyed fan-out folded into one resource.
//!
//! [`MultiSource`] drives one independently retried load per key and folds the
//! settled outcomes into a `Resource<BTreeMap<String, V>>`.
//!
//! ## Flow
//! ```text
//! load_all({k1: f1, k2: f2, ..}, opts)
//!   ├─► begin() ─► cancels every per-key run of the previous generation
//!   ├─► join_all( run_pipeline(f_i, token.child_token(), opts) per key )
//!   └─► settle-all
//!         ├─ superseded            ─► LoadDiscarded
//!         ├─ Ok(v_i)               ─► data[k_i] = v_i (over defaults)
//!         └─ Err(e_i)              ─► SourceFailed, "k_i: msg_i"
//!       error = failures.join("; ")
//!       commit(data, error) ─► on_success (no failures) | on_error (once)
//! ```
//!
//! Each key gets its own deadline (`opts.timeout`); a slow key never stops the
//! others from settling.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use tokio::sync::watch;
use tracing::debug;

use crate::config::{LoadOptions, ResourceConfig};
use crate::core::builder::ResourceBuilder;
use crate::core::lock;
use crate::core::pipeline::run_pipeline;
use crate::core::resource::{InFlight, LoadStatus, Resource};
use crate::core::state::ResourceState;
use crate::error::{ConfigError, ErrorInfo, ErrorKind};
use crate::events::EventKind;
use crate::fetch::FetcherRef;

type Sources<V> = BTreeMap<String, FetcherRef<V>>;

/// Aggregator of keyed sources into one map-valued resource.
///
/// # Example
/// ```rust
/// use std::collections::BTreeMap;
/// use loadvisor::{FetchError, FetchFn, FetcherRef, LoadOptions, MultiSource, ResourceConfig};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let defaults = BTreeMap::from([("tables".to_string(), 0u32), ("stats".to_string(), 0u32)]);
/// let overview = MultiSource::new(ResourceConfig::named("overview"), defaults);
///
/// let tables: FetcherRef<u32> = FetchFn::arc("tables", |_ctx: CancellationToken| async {
///     Ok::<u32, FetchError>(12)
/// });
/// let sources = BTreeMap::from([("tables".to_string(), tables)]);
///
/// overview.load_all(sources, LoadOptions::default()).await;
/// let data = overview.snapshot().data.unwrap_or_default();
/// assert_eq!(data["tables"], 12);
/// assert_eq!(data["stats"], 0);
/// # }
/// ```
pub struct MultiSource<V> {
    resource: Resource<BTreeMap<String, V>>,
    defaults: BTreeMap<String, V>,
    last: Mutex<Option<(Sources<V>, LoadOptions)>>,
}

impl<V> fmt::Debug for MultiSource<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiSource")
            .field("resource", &self.resource)
            .field("keys", &self.defaults.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<V: Clone + Send + Sync + 'static> MultiSource<V> {
    /// Aggregator whose data starts as `defaults`.
    pub fn new(config: ResourceConfig, defaults: BTreeMap<String, V>) -> Self {
        Self::from_builder(ResourceBuilder::new(config), defaults)
    }

    /// Aggregator built from a configured builder (callbacks, shared bus).
    ///
    /// The builder's initial data is replaced by `defaults`.
    pub fn from_builder(builder: ResourceBuilder<BTreeMap<String, V>>, defaults: BTreeMap<String, V>) -> Self {
        let resource = builder.initial_data(defaults.clone()).build();
        Self {
            resource,
            defaults,
            last: Mutex::new(None),
        }
    }

    /// [`new`](Self::new) that rejects an invalid retry config.
    pub fn try_new(config: ResourceConfig, defaults: BTreeMap<String, V>) -> Result<Self, ConfigError> {
        let resource = ResourceBuilder::new(config)
            .initial_data(defaults.clone())
            .try_build()?;
        Ok(Self {
            resource,
            defaults,
            last: Mutex::new(None),
        })
    }

    pub fn resource(&self) -> &Resource<BTreeMap<String, V>> {
        &self.resource
    }

    pub fn snapshot(&self) -> ResourceState<BTreeMap<String, V>> {
        self.resource.snapshot()
    }

    pub fn watch(&self) -> watch::Receiver<ResourceState<BTreeMap<String, V>>> {
        self.resource.watch()
    }

    /// Loads every key concurrently and commits the merged result once all settle.
    ///
    /// Returns [`LoadStatus::Partial`] when some keys failed and others
    /// succeeded, [`LoadStatus::Failed`] when none succeeded.
    pub async fn load_all(&self, fetchers: Sources<V>, opts: LoadOptions) -> LoadStatus {
        *lock(&self.last) = Some((fetchers.clone(), opts));

        let shared = self.resource.shared();
        let (generation, token) = shared.begin(None, &opts);
        let in_flight = InFlight::new(Arc::clone(shared), generation, token.clone());
        let retry = &shared.config.retry;

        let runs = fetchers.into_iter().map(|(key, fetcher)| {
            let emitter = shared.emitter(generation, Some(Arc::from(key.as_str())));
            let child = token.child_token();
            async move {
                let outcome = run_pipeline(fetcher, child, opts, retry, &emitter).await;
                (key, outcome)
            }
        });
        let settled = join_all(runs).await;
        in_flight.disarm();

        if token.is_cancelled() || !shared.cell.is_current(generation) {
            return shared.discarded(generation);
        }

        let mut data = self.defaults.clone();
        let mut succeeded = 0usize;
        let mut failures = Vec::new();
        for (key, outcome) in settled {
            match outcome.into_result() {
                Ok(value) => {
                    data.insert(key, value);
                    succeeded += 1;
                }
                Err(info) if info.is_cancelled() => {}
                Err(info) => {
                    shared.bus.publish(
                        shared
                            .event(EventKind::SourceFailed)
                            .with_generation(generation)
                            .with_key(key.as_str())
                            .with_reason(info.message.as_str())
                            .with_error_kind(info.kind),
                    );
                    failures.push(format!("{key}: {}", info.message));
                }
            }
        }

        let error = (!failures.is_empty()).then(|| failures.join("; "));
        let notify = (error.is_none() && shared.hooks.on_success.is_some()).then(|| data.clone());
        if !shared.cell.commit_partial(generation, data, error.clone()) {
            return shared.discarded(generation);
        }

        match error {
            None => {
                debug!(resource = %shared.name, generation, succeeded, "all sources loaded");
                shared
                    .bus
                    .publish(shared.event(EventKind::LoadSucceeded).with_generation(generation));
                if let Some(data) = notify {
                    shared.hooks.success(&data);
                }
                LoadStatus::Succeeded
            }
            Some(message) => {
                debug!(
                    resource = %shared.name,
                    generation,
                    succeeded,
                    failed = failures.len(),
                    error = %message,
                    "sources partially failed"
                );
                shared.failed_event(generation, &ErrorInfo::new(ErrorKind::Aggregate, message.as_str()));
                shared.hooks.error(&message);
                if succeeded == 0 {
                    LoadStatus::Failed
                } else {
                    LoadStatus::Partial
                }
            }
        }
    }

    /// Repeats the last `load_all` with `preserve_data = true`.
    pub async fn reload(&self) -> LoadStatus {
        let last = lock(&self.last).clone();
        let Some((fetchers, opts)) = last else {
            let shared = self.resource.shared();
            shared.bus.publish(shared.event(EventKind::ReloadSkipped));
            return LoadStatus::Skipped;
        };
        let opts = LoadOptions {
            preserve_data: true,
            ..opts
        };
        self.load_all(fetchers, opts).await
    }

    /// Cancels every per-key run and restores the defaults.
    pub fn reset(&self) -> u64 {
        self.resource.reset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::fetch::FetchFn;
    use crate::policies::{JitterPolicy, RetryConfig};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn config() -> ResourceConfig {
        ResourceConfig {
            retry: RetryConfig {
                max_retries: 0,
                jitter: JitterPolicy::None,
                ..RetryConfig::default()
            },
            ..ResourceConfig::named("overview")
        }
    }

    fn ok(v: u32) -> FetcherRef<u32> {
        FetchFn::arc("ok", move |_ctx: CancellationToken| async move { Ok::<u32, FetchError>(v) })
    }

    fn fail(msg: &'static str) -> FetcherRef<u32> {
        FetchFn::arc("fail", move |_ctx: CancellationToken| async move {
            Err::<u32, FetchError>(FetchError::new(msg))
        })
    }

    #[tokio::test]
    async fn test_all_failures_are_joined() {
        let multi = MultiSource::new(config(), BTreeMap::new());
        let sources = BTreeMap::from([("a".to_string(), fail("boom")), ("b".to_string(), fail("bust"))]);

        assert_eq!(multi.load_all(sources, LoadOptions::default()).await, LoadStatus::Failed);
        let s = multi.snapshot();
        assert_eq!(s.error.as_deref(), Some("a: boom; b: bust"));
        assert_eq!(s.data, Some(BTreeMap::new()));
    }

    #[tokio::test]
    async fn test_empty_sources_commit_defaults() {
        let defaults = BTreeMap::from([("x".to_string(), 1u32)]);
        let multi = MultiSource::new(config(), defaults.clone());
        assert_eq!(multi.load_all(BTreeMap::new(), LoadOptions::default()).await, LoadStatus::Succeeded);
        assert_eq!(multi.snapshot().data, Some(defaults));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_reuses_sources() {
        let multi = MultiSource::new(config(), BTreeMap::new());
        assert_eq!(multi.reload().await, LoadStatus::Skipped);

        let sources = BTreeMap::from([("a".to_string(), ok(3))]);
        multi.load_all(sources, LoadOptions::default()).await;
        assert_eq!(multi.reload().await, LoadStatus::Succeeded);
        assert_eq!(multi.snapshot().generation, 2);
        assert_eq!(multi.snapshot().retry_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_key_times_out_alone() {
        let multi = MultiSource::new(config(), BTreeMap::new());
        let slow: FetcherRef<u32> = FetchFn::arc("slow", |_ctx: CancellationToken| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<u32, FetchError>(0)
        });
        let sources = BTreeMap::from([("fast".to_string(), ok(1)), ("slow".to_string(), slow)]);
        let opts = LoadOptions {
            timeout: Duration::from_millis(50),
            ..LoadOptions::default()
        };

        assert_eq!(multi.load_all(sources, opts).await, LoadStatus::Partial);
        let s = multi.snapshot();
        assert_eq!(s.data.as_ref().and_then(|d| d.get("fast")), Some(&1));
        let error = s.error.unwrap_or_default();
        assert!(error.starts_with("slow: timeout"), "{error}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_load_all_clears_loading() {
        let multi = MultiSource::new(config(), BTreeMap::from([("tables".to_string(), 0u32)]));
        let hang: FetcherRef<u32> = FetchFn::arc("hang", |_ctx: CancellationToken| async {
            std::future::pending::<()>().await;
            Ok::<u32, FetchError>(0)
        });
        let opts = LoadOptions {
            timeout: Duration::ZERO,
            ..LoadOptions::default()
        };
        let sources = BTreeMap::from([("tables".to_string(), hang), ("stats".to_string(), ok(3))]);

        let outer = tokio::time::timeout(Duration::from_millis(5), multi.load_all(sources, opts)).await;
        assert!(outer.is_err());

        let state = multi.snapshot();
        assert!(!state.loading);
        assert_eq!(state.error, None);
        assert_eq!(state.generation, 1);
    }
}
