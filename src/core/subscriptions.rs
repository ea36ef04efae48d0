//! # Push subscriptions feeding a resource.
//!
//! [`SubscriptionRegistry`] registers long-lived listeners whose callbacks write
//! into a [`Resource`] snapshot, and releases them all at teardown.
//!
//! ## Architecture
//! ```text
//! setup_realtime_listener_with(setup, transform)
//!   ├─► capture my_gen (resource generation) + epoch (registry)
//!   ├─► reserve id in `active`, loading = true
//!   ├─► setup(pusher) (panic caught)
//!   │     ├─ Ok(unsub)  ─► store unsub under id ─► SubscriptionOpened
//!   │     └─ Err/panic  ─► drop id, error state, on_error ─► no-op handle
//!   │
//!   └─► pusher.push(raw)
//!         ├─ transform(raw)
//!         └─ [entries lock] epoch unchanged && id active ─► commit_value(my_gen, value)
//!
//! cleanup()
//!   ├─► [entries lock] epoch += 1, drain `active`
//!   └─► call each unsub once (failures and panics logged, never propagated)
//! ```
//!
//! ## Rules
//! - A push commits only under the generation captured at setup; any later
//!   `load` or `reset` silences the listener. The first silenced push
//!   publishes `SubscriptionStale`; the listener stays registered until released.
//! - Pushes after `cleanup` (or after their own handle was released) are ignored.
//! - Every stored unsubscribe function runs at most once.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tracing::{debug, warn};

use crate::core::lock;
use crate::core::panic_message;
use crate::core::resource::Resource;
use crate::error::{ErrorInfo, ErrorKind, FetchError};
use crate::events::{Bus, Event, EventKind};

/// Releases one push listener.
pub type Unsubscribe = Box<dyn FnOnce() -> Result<(), FetchError> + Send>;

/// Callback handed to a subscription setup; each `push` offers a new value.
pub struct Pusher<K> {
    sink: Arc<dyn Fn(K) + Send + Sync>,
}

impl<K> Clone for Pusher<K> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
        }
    }
}

impl<K> Pusher<K> {
    /// Offers a value to the resource. Ignored once the listener is stale.
    pub fn push(&self, value: K) {
        (self.sink)(value);
    }
}

struct Entries {
    next_id: u64,
    epoch: u64,
    active: HashMap<u64, Option<Unsubscribe>>,
}

/// Registry of push listeners attached to one resource.
pub struct SubscriptionRegistry<T> {
    resource: Resource<T>,
    entries: Arc<Mutex<Entries>>,
}

impl<T> fmt::Debug for SubscriptionRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let active = lock(&self.entries).active.len();
        f.debug_struct("SubscriptionRegistry")
            .field("resource", &self.resource)
            .field("active", &active)
            .finish()
    }
}

impl<T: Clone + Send + Sync + 'static> SubscriptionRegistry<T> {
    pub fn new(resource: Resource<T>) -> Self {
        Self {
            resource,
            entries: Arc::new(Mutex::new(Entries {
                next_id: 1,
                epoch: 0,
                active: HashMap::new(),
            })),
        }
    }

    pub fn resource(&self) -> &Resource<T> {
        &self.resource
    }

    /// Number of listeners not yet released.
    pub fn active(&self) -> usize {
        lock(&self.entries).active.len()
    }

    /// Registers a listener whose pushes are committed as-is.
    pub fn setup_realtime_listener<S>(&self, setup: S) -> SubscriptionHandle
    where
        S: FnOnce(Pusher<T>) -> Result<Unsubscribe, FetchError>,
    {
        self.setup_realtime_listener_with(setup, |value: T| value)
    }

    /// Registers a listener whose raw pushes go through `transform` first.
    pub fn setup_realtime_listener_with<K, S, M>(&self, setup: S, transform: M) -> SubscriptionHandle
    where
        K: 'static,
        S: FnOnce(Pusher<K>) -> Result<Unsubscribe, FetchError>,
        M: Fn(K) -> T + Send + Sync + 'static,
    {
        let shared = self.resource.shared();
        let generation = shared.cell.generation();
        let (id, epoch) = {
            let mut entries = lock(&self.entries);
            let id = entries.next_id;
            entries.next_id += 1;
            entries.active.insert(id, None);
            (id, entries.epoch)
        };
        shared.cell.mark_loading();

        let weak_shared = Arc::downgrade(shared);
        let weak_entries = Arc::downgrade(&self.entries);
        let reported = AtomicBool::new(false);
        let sink = move |raw: K| {
            let (Some(shared), Some(entries)) = (weak_shared.upgrade(), weak_entries.upgrade()) else {
                return;
            };
            let value = transform(raw);
            let entries = lock(&entries);
            if entries.epoch != epoch || !entries.active.contains_key(&id) {
                debug!(resource = %shared.name, id, "push after release ignored");
                return;
            }
            if shared.cell.commit_value(generation, value) {
                return;
            }
            debug!(resource = %shared.name, id, generation, "stale push ignored");
            if !reported.swap(true, Ordering::Relaxed) {
                warn!(resource = %shared.name, id, generation, "subscription silenced by a newer load");
                shared.bus.publish(
                    Event::new(EventKind::SubscriptionStale)
                        .with_resource(Arc::clone(&shared.name))
                        .with_key(id.to_string())
                        .with_generation(generation),
                );
            }
        };
        let pusher = Pusher {
            sink: Arc::new(sink),
        };

        let failure = match catch_unwind(AssertUnwindSafe(|| setup(pusher))) {
            Ok(Ok(unsub)) => {
                let slot = {
                    let mut entries = lock(&self.entries);
                    match entries.active.get_mut(&id) {
                        Some(slot) => {
                            *slot = Some(unsub);
                            None
                        }
                        None => Some(unsub),
                    }
                };
                // cleaned up while setup was running
                if let Some(unsub) = slot {
                    release(unsub, id, &shared.bus, &shared.name);
                    return SubscriptionHandle::noop(id, shared.bus.clone(), Arc::clone(&shared.name));
                }
                shared.bus.publish(
                    Event::new(EventKind::SubscriptionOpened)
                        .with_resource(Arc::clone(&shared.name))
                        .with_key(id.to_string()),
                );
                return SubscriptionHandle {
                    id,
                    entries: Arc::downgrade(&self.entries),
                    bus: shared.bus.clone(),
                    resource: Arc::clone(&shared.name),
                };
            }
            Ok(Err(err)) => err.to_string(),
            Err(payload) => panic_message(payload.as_ref()),
        };

        lock(&self.entries).active.remove(&id);
        warn!(resource = %shared.name, id, error = %failure, "subscription setup failed");
        shared.cell.set_error(failure.clone());
        shared.failed_event(generation, &ErrorInfo::new(ErrorKind::Fatal, failure.as_str()));
        shared.hooks.error(&failure);
        SubscriptionHandle::noop(id, shared.bus.clone(), Arc::clone(&shared.name))
    }

    /// Releases every active listener exactly once and returns how many
    /// unsubscribe functions ran. A second call is a no-op.
    pub fn cleanup(&self) -> usize {
        let mut drained: Vec<(u64, Option<Unsubscribe>)> = {
            let mut entries = lock(&self.entries);
            entries.epoch += 1;
            entries.active.drain().collect()
        };
        drained.sort_unstable_by_key(|(id, _)| *id);

        let shared = self.resource.shared();
        let mut released = 0;
        for (id, unsub) in drained {
            if let Some(unsub) = unsub {
                release(unsub, id, &shared.bus, &shared.name);
                released += 1;
            }
        }
        released
    }
}

/// Release capability for one listener.
///
/// Dropping the handle does not release the listener; the registry's
/// `cleanup` does.
pub struct SubscriptionHandle {
    id: u64,
    entries: Weak<Mutex<Entries>>,
    bus: Bus,
    resource: Arc<str>,
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

impl SubscriptionHandle {
    fn noop(id: u64, bus: Bus, resource: Arc<str>) -> Self {
        Self {
            id,
            entries: Weak::new(),
            bus,
            resource,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether the listener is still registered.
    ///
    /// A listener silenced by a later `load` or `reset` stays registered (and
    /// active) until it is unsubscribed or the registry is cleaned up; its
    /// pushes are ignored. The first such push publishes
    /// [`EventKind::SubscriptionStale`].
    pub fn is_active(&self) -> bool {
        self.entries
            .upgrade()
            .is_some_and(|entries| lock(&entries).active.contains_key(&self.id))
    }

    /// Releases this listener now. Returns `false` if it was already released
    /// (or never registered).
    pub fn unsubscribe(&self) -> bool {
        let Some(entries) = self.entries.upgrade() else {
            return false;
        };
        let taken = lock(&entries).active.remove(&self.id);
        match taken {
            Some(Some(unsub)) => {
                release(unsub, self.id, &self.bus, &self.resource);
                true
            }
            _ => false,
        }
    }
}

/// Runs one unsubscribe function, swallowing failures and panics.
fn release(unsub: Unsubscribe, id: u64, bus: &Bus, resource: &Arc<str>) -> bool {
    let failure = match catch_unwind(AssertUnwindSafe(unsub)) {
        Ok(Ok(())) => {
            bus.publish(
                Event::new(EventKind::SubscriptionClosed)
                    .with_resource(Arc::clone(resource))
                    .with_key(id.to_string()),
            );
            return true;
        }
        Ok(Err(err)) => err.to_string(),
        Err(payload) => panic_message(payload.as_ref()),
    };
    warn!(resource = %resource, id, error = %failure, "unsubscribe failed");
    bus.publish(
        Event::new(EventKind::UnsubscribeFailed)
            .with_resource(Arc::clone(resource))
            .with_key(id.to_string())
            .with_reason(failure),
    );
    false
}
