//! # Resource: generation-guarded loader for one piece of remote data.
//!
//! A [`Resource`] owns a [`ResourceState`] snapshot and exposes the operations
//! a view drives: `load`, `reload`, `reset` and the direct mutators.
//!
//! ## Architecture
//! ```text
//! load(fetcher, opts)
//!   ├─► [flight lock] cancel in-flight token + pending auto-retry
//!   │                 store (fetcher, opts) as `last`
//!   │                 generation += 1 → my_gen, apply opts to snapshot
//!   ├─► publish LoadStarted
//!   ├─► run_pipeline(TimeoutGuard(RetryExecutor(CancellableOperation)))
//!   └─► settle(my_gen, outcome)
//!         ├─ Cancelled             ─► LoadDiscarded        (never surfaced)
//!         ├─ generation moved on   ─► LoadDiscarded        (silently dropped)
//!         ├─ Ok(value)             ─► commit, LoadSucceeded, on_success(&value)
//!         └─ Err(info)             ─► commit, LoadFailed, on_error(msg)
//!                                       └─ "network" + auto-retry ─► spawn timer ─► load again
//! ```
//!
//! ## Rules
//! - The generation check and the commit are one atomic step ([`StateCell`]).
//! - The flight lock pairs each token with its generation; it is never held across `.await`.
//! - `load` never returns an error: failures land in `state.error` and `on_error`.
//! - Any `load` or `reset` cancels the pending auto-retry timer.
//! - A load dropped before settling cancels its token and lowers `loading`
//!   (only while its generation is current).

use std::fmt;
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::watch;
use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::{LoadOptions, ResourceConfig};
use crate::core::builder::ResourceBuilder;
use crate::core::lock;
use crate::core::outcome::OperationOutcome;
use crate::core::pipeline::{Emitter, run_pipeline};
use crate::core::state::{ResourceState, StateCell};
use crate::core::subscriptions::SubscriptionRegistry;
use crate::error::{ConfigError, ErrorInfo};
use crate::events::{Bus, Event, EventKind};
use crate::fetch::FetcherRef;

/// Result of one `load`, as seen by its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// A value was committed.
    Succeeded,
    /// A failure was committed to `state.error`.
    Failed,
    /// Multi-source only: some keys failed, the rest were committed.
    Partial,
    /// Superseded by a newer load or a reset; nothing was committed.
    Discarded,
    /// `reload` found no previous fetcher.
    Skipped,
}

pub(crate) type SuccessHook<T> = Arc<dyn Fn(&T) + Send + Sync>;
pub(crate) type ErrorHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Settlement callbacks.
pub(crate) struct Hooks<T> {
    pub(crate) on_success: Option<SuccessHook<T>>,
    pub(crate) on_error: Option<ErrorHook>,
}

impl<T> Hooks<T> {
    pub(crate) fn success(&self, value: &T) {
        if let Some(hook) = &self.on_success {
            hook(value);
        }
    }

    pub(crate) fn error(&self, message: &str) {
        if let Some(hook) = &self.on_error {
            hook(message);
        }
    }
}

/// Tokens of the work currently allowed to settle.
struct Flight<T> {
    current: Option<CancellationToken>,
    auto_retry: Option<CancellationToken>,
    last: Option<(FetcherRef<T>, LoadOptions)>,
}

impl<T> Flight<T> {
    fn cancel_all(&mut self) {
        if let Some(token) = self.current.take() {
            token.cancel();
        }
        if let Some(token) = self.auto_retry.take() {
            token.cancel();
        }
    }
}

/// Undoes [`Shared::begin`] when a load future is dropped before it settles.
///
/// Armed from `begin` until the outcome is in hand; a caller-side timeout,
/// `select!` or task abort drops it armed.
pub(crate) struct InFlight<T: Clone + Send + Sync + 'static> {
    shared: Arc<Shared<T>>,
    generation: u64,
    token: CancellationToken,
    armed: bool,
}

impl<T: Clone + Send + Sync + 'static> InFlight<T> {
    pub(crate) fn new(shared: Arc<Shared<T>>, generation: u64, token: CancellationToken) -> Self {
        Self {
            shared,
            generation,
            token,
            armed: true,
        }
    }

    /// The load settled; nothing to undo.
    pub(crate) fn disarm(mut self) {
        self.armed = false;
    }
}

impl<T: Clone + Send + Sync + 'static> Drop for InFlight<T> {
    fn drop(&mut self) {
        if self.armed {
            self.shared.abandon(self.generation, &self.token);
        }
    }
}

pub(crate) struct Shared<T> {
    pub(crate) name: Arc<str>,
    pub(crate) config: ResourceConfig,
    pub(crate) cell: StateCell<T>,
    pub(crate) hooks: Hooks<T>,
    pub(crate) bus: Bus,
    flight: Mutex<Flight<T>>,
}

impl<T: Clone + Send + Sync + 'static> Shared<T> {
    pub(crate) fn new(config: ResourceConfig, cell: StateCell<T>, hooks: Hooks<T>, bus: Bus) -> Self {
        Self {
            name: Arc::from(config.name.as_str()),
            config,
            cell,
            hooks,
            bus,
            flight: Mutex::new(Flight {
                current: None,
                auto_retry: None,
                last: None,
            }),
        }
    }

    pub(crate) fn event(&self, kind: EventKind) -> Event {
        Event::new(kind).with_resource(Arc::clone(&self.name))
    }

    pub(crate) fn emitter(&self, generation: u64, key: Option<Arc<str>>) -> Emitter {
        Emitter {
            bus: self.bus.clone(),
            resource: Arc::clone(&self.name),
            key,
            generation,
        }
    }

    /// Supersedes all in-flight work and starts a new generation.
    ///
    /// `last` is replaced only when a fetcher is given.
    pub(crate) fn begin(&self, fetcher: Option<&FetcherRef<T>>, opts: &LoadOptions) -> (u64, CancellationToken) {
        let token = CancellationToken::new();
        let generation = {
            let mut flight = lock(&self.flight);
            flight.cancel_all();
            flight.current = Some(token.clone());
            if let Some(fetcher) = fetcher {
                flight.last = Some((Arc::clone(fetcher), *opts));
            }
            self.cell.begin(opts)
        };
        self.bus
            .publish(self.event(EventKind::LoadStarted).with_generation(generation));
        (generation, token)
    }

    pub(crate) fn discarded(&self, generation: u64) -> LoadStatus {
        debug!(resource = %self.name, generation, "stale result discarded");
        self.bus
            .publish(self.event(EventKind::LoadDiscarded).with_generation(generation));
        LoadStatus::Discarded
    }

    /// Cancels an unsettled load and lowers its loading flag if it is still current.
    fn abandon(&self, generation: u64, token: &CancellationToken) {
        token.cancel();
        {
            let mut flight = lock(&self.flight);
            if self.cell.is_current(generation) {
                flight.current = None;
            }
        }
        self.cell.abandon(generation);
        debug!(resource = %self.name, generation, "load dropped before settling");
        self.bus.publish(
            self.event(EventKind::LoadDiscarded)
                .with_generation(generation)
                .with_reason("dropped before settling"),
        );
    }

    pub(crate) fn failed_event(&self, generation: u64, info: &ErrorInfo) {
        self.bus.publish(
            self.event(EventKind::LoadFailed)
                .with_generation(generation)
                .with_reason(info.message.as_str())
                .with_error_kind(info.kind),
        );
    }

    fn run_load(self: Arc<Self>, fetcher: FetcherRef<T>, opts: LoadOptions) -> BoxFuture<'static, LoadStatus> {
        async move {
            let (generation, token) = self.begin(Some(&fetcher), &opts);
            let in_flight = InFlight::new(Arc::clone(&self), generation, token.clone());
            let emitter = self.emitter(generation, None);
            let outcome = run_pipeline(Arc::clone(&fetcher), token, opts, &self.config.retry, &emitter).await;
            in_flight.disarm();
            self.settle(generation, outcome, fetcher, opts)
        }
        .boxed()
    }

    fn settle(
        self: &Arc<Self>,
        generation: u64,
        outcome: OperationOutcome<T>,
        fetcher: FetcherRef<T>,
        opts: LoadOptions,
    ) -> LoadStatus {
        let attempts = outcome.attempts();
        match outcome.into_result() {
            Err(info) if info.is_cancelled() => self.discarded(generation),
            Ok(value) => {
                let notify = self.hooks.on_success.is_some().then(|| value.clone());
                if !self.cell.commit_value(generation, value) {
                    return self.discarded(generation);
                }
                debug!(resource = %self.name, generation, attempts, "load succeeded");
                self.bus
                    .publish(self.event(EventKind::LoadSucceeded).with_generation(generation));
                if let Some(value) = notify {
                    self.hooks.success(&value);
                }
                LoadStatus::Succeeded
            }
            Err(info) => {
                if !self.cell.commit_error(generation, info.message.clone()) {
                    return self.discarded(generation);
                }
                debug!(
                    resource = %self.name,
                    generation,
                    attempts,
                    kind = info.kind.as_label(),
                    error = %info,
                    "load failed"
                );
                self.failed_event(generation, &info);
                self.hooks.error(&info.message);
                self.schedule_auto_retry(generation, &info.message, fetcher, opts);
                LoadStatus::Failed
            }
        }
    }

    fn schedule_auto_retry(
        self: &Arc<Self>,
        generation: u64,
        message: &str,
        fetcher: FetcherRef<T>,
        opts: LoadOptions,
    ) {
        let Some(delay) = self.config.auto_retry.delay() else {
            return;
        };
        if !message.contains("network") {
            return;
        }

        let token = CancellationToken::new();
        {
            let mut flight = lock(&self.flight);
            if !self.cell.is_current(generation) {
                return;
            }
            if let Some(prev) = flight.auto_retry.replace(token.clone()) {
                prev.cancel();
            }
        }

        debug!(resource = %self.name, generation, delay_ms = delay.as_millis() as u64, "auto-retry scheduled");
        self.bus.publish(
            self.event(EventKind::AutoRetryScheduled)
                .with_generation(generation)
                .with_delay(delay),
        );

        let shared = Arc::clone(self);
        tokio::spawn(async move {
            select! {
                _ = token.cancelled() => {}
                _ = time::sleep(delay) => {
                    let _ = shared.run_load(fetcher, opts).await;
                }
            }
        });
    }

    fn last(&self) -> Option<(FetcherRef<T>, LoadOptions)> {
        lock(&self.flight).last.clone()
    }

    fn reset(&self) -> u64 {
        let generation = {
            let mut flight = lock(&self.flight);
            flight.cancel_all();
            self.cell.reset()
        };
        self.bus
            .publish(self.event(EventKind::ResourceReset).with_generation(generation));
        generation
    }
}

/// Generation-guarded async resource.
///
/// Cheap to clone; clones share the same snapshot and in-flight state.
///
/// # Example
/// ```rust
/// use loadvisor::{FetchError, FetchFn, FetcherRef, LoadStatus, Resource, ResourceConfig};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let orders: Resource<Vec<u32>> = Resource::builder(ResourceConfig::named("orders"))
///     .empty_when_len_zero()
///     .build();
///
/// let fetch: FetcherRef<Vec<u32>> = FetchFn::arc("orders", |_ctx: CancellationToken| async {
///     Ok::<Vec<u32>, FetchError>(vec![1, 2, 3])
/// });
///
/// assert_eq!(orders.load(fetch, Default::default()).await, LoadStatus::Succeeded);
/// let state = orders.snapshot();
/// assert_eq!(state.data, Some(vec![1, 2, 3]));
/// assert!(!state.is_empty);
/// # }
/// ```
pub struct Resource<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Resource<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for Resource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource").field("name", &self.shared.name).finish()
    }
}

impl<T: Clone + Send + Sync + 'static> Resource<T> {
    /// Starts building a resource.
    pub fn builder(config: ResourceConfig) -> ResourceBuilder<T> {
        ResourceBuilder::new(config)
    }

    /// Resource with no initial data, no callbacks and its own bus.
    pub fn new(config: ResourceConfig) -> Self {
        ResourceBuilder::new(config).build()
    }

    /// [`new`](Self::new) that rejects an invalid retry config.
    pub fn try_new(config: ResourceConfig) -> Result<Self, ConfigError> {
        ResourceBuilder::new(config).try_build()
    }

    pub(crate) fn from_shared(shared: Arc<Shared<T>>) -> Self {
        Self { shared }
    }

    pub(crate) fn shared(&self) -> &Arc<Shared<T>> {
        &self.shared
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn config(&self) -> &ResourceConfig {
        &self.shared.config
    }

    /// Bus carrying this resource's diagnostic events.
    pub fn bus(&self) -> &Bus {
        &self.shared.bus
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> ResourceState<T> {
        self.shared.cell.snapshot()
    }

    /// Receiver notified on every committed change.
    pub fn watch(&self) -> watch::Receiver<ResourceState<T>> {
        self.shared.cell.watch()
    }

    /// Loads through `fetcher`, superseding any earlier load.
    ///
    /// Resolves once this load settles. A superseded load resolves with
    /// [`LoadStatus::Discarded`] and leaves the snapshot alone.
    pub async fn load(&self, fetcher: FetcherRef<T>, opts: LoadOptions) -> LoadStatus {
        Arc::clone(&self.shared).run_load(fetcher, opts).await
    }

    /// [`load`](Self::load) with `config.load` as options.
    pub async fn load_default(&self, fetcher: FetcherRef<T>) -> LoadStatus {
        let opts = self.shared.config.load;
        self.load(fetcher, opts).await
    }

    /// Repeats the last load with `preserve_data = true`.
    pub async fn reload(&self) -> LoadStatus {
        let Some((fetcher, opts)) = self.shared.last() else {
            debug!(resource = %self.shared.name, "reload without a previous fetcher");
            self.shared.bus.publish(self.shared.event(EventKind::ReloadSkipped));
            return LoadStatus::Skipped;
        };
        let opts = LoadOptions {
            preserve_data: true,
            ..opts
        };
        self.load(fetcher, opts).await
    }

    /// Cancels in-flight work and the auto-retry timer, restores the initial
    /// snapshot and returns the new generation.
    ///
    /// The last fetcher is kept, so `reload` still works afterwards.
    pub fn reset(&self) -> u64 {
        self.shared.reset()
    }

    /// Replaces `data` directly; clears `error` and `loading`.
    pub fn set_data(&self, value: T) {
        self.shared.cell.set_data(value);
    }

    /// Surfaces `message` as the current error; clears `loading`.
    pub fn set_error(&self, message: impl Into<String>) {
        self.shared.cell.set_error(message.into());
    }

    pub fn clear_error(&self) {
        self.shared.cell.clear_error();
    }

    /// New push-subscription registry feeding this resource.
    pub fn subscriptions(&self) -> SubscriptionRegistry<T> {
        SubscriptionRegistry::new(self.clone())
    }
}
