//! # Resource snapshot and the generation-guarded state cell.
//!
//! [`ResourceState`] is the plain snapshot a view renders. [`StateCell`] owns it
//! inside a [`tokio::sync::watch`] channel so that every reader sees whole
//! snapshots and every commit is a single check-and-write.
//!
//! ## Generation rules
//! ```text
//! begin()  ──► generation += 1 ──► returns my_gen
//! reset()  ──► generation += 1 ──► initial snapshot restored
//!
//! commit_*(my_gen, ..)
//!     ├─ state.generation == my_gen ──► write, notify receivers, true
//!     └─ otherwise                  ──► untouched, false
//! ```
//!
//! The comparison and the write happen inside one `send_if_modified` call, so a
//! stale settlement can never interleave with a newer `begin`.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::watch;

use crate::config::LoadOptions;

/// Snapshot of one resource.
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceState<T> {
    /// Last committed value (or the initial one).
    pub data: Option<T>,
    /// A load is in flight and asked for the loading flag.
    pub loading: bool,
    /// Message of the last surfaced failure.
    pub error: Option<String>,
    /// Result of the emptiness check on `data`.
    pub is_empty: bool,
    /// Wall-clock time of the last committed value.
    pub last_updated: Option<SystemTime>,
    /// Number of settled loads and pushes committed since creation or reset.
    pub retry_count: u32,
    /// Strictly increasing load counter.
    pub generation: u64,
}

/// Display phase derived from a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing loaded yet.
    Idle,
    /// A load is in flight.
    Loading,
    /// A value has been committed.
    Success,
    /// The last load surfaced a failure.
    Error,
}

impl<T> ResourceState<T> {
    /// Current display phase. `Loading` wins over `Error`, which wins over `Success`.
    pub fn phase(&self) -> Phase {
        if self.loading {
            Phase::Loading
        } else if self.error.is_some() {
            Phase::Error
        } else if self.last_updated.is_some() {
            Phase::Success
        } else {
            Phase::Idle
        }
    }
}

/// Collections that know whether they hold anything.
///
/// Used by [`ResourceBuilder::empty_when_len_zero`](crate::ResourceBuilder::empty_when_len_zero).
pub trait IsEmpty {
    fn is_empty_value(&self) -> bool;
}

impl<T> IsEmpty for Vec<T> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T> IsEmpty for VecDeque<T> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl IsEmpty for String {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V, S> IsEmpty for HashMap<K, V, S> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V> IsEmpty for BTreeMap<K, V> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T, S> IsEmpty for HashSet<T, S> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T> IsEmpty for BTreeSet<T> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T> IsEmpty for Option<T> {
    fn is_empty_value(&self) -> bool {
        self.is_none()
    }
}

/// Emptiness predicate supplied by the caller.
pub(crate) type EmptyCheck<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Owner of a resource snapshot.
pub(crate) struct StateCell<T> {
    tx: watch::Sender<ResourceState<T>>,
    initial: ResourceState<T>,
    check_empty: Option<EmptyCheck<T>>,
}

impl<T: Clone + Send + Sync + 'static> StateCell<T> {
    pub(crate) fn new(initial_data: Option<T>, check_empty: Option<EmptyCheck<T>>) -> Self {
        let is_empty = empty_with(check_empty.as_ref(), initial_data.as_ref());
        let initial = ResourceState {
            data: initial_data,
            loading: false,
            error: None,
            is_empty,
            last_updated: None,
            retry_count: 0,
            generation: 0,
        };
        let (tx, _rx) = watch::channel(initial.clone());
        Self {
            tx,
            initial,
            check_empty,
        }
    }

    pub(crate) fn snapshot(&self) -> ResourceState<T> {
        self.tx.borrow().clone()
    }

    pub(crate) fn watch(&self) -> watch::Receiver<ResourceState<T>> {
        self.tx.subscribe()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.tx.borrow().generation
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.generation() == generation
    }

    fn is_empty_value(&self, value: &T) -> bool {
        empty_with(self.check_empty.as_ref(), Some(value))
    }

    /// Starts a load: bumps the generation and applies the loading options.
    ///
    /// Clearing the data also raises `is_empty`; preserved data keeps its flag.
    pub(crate) fn begin(&self, opts: &LoadOptions) -> u64 {
        let mut next = 0;
        self.tx.send_modify(|s| {
            s.generation += 1;
            next = s.generation;
            if !opts.preserve_data {
                s.data = None;
                s.is_empty = true;
            }
            s.loading = opts.show_loading_state;
            s.error = None;
        });
        next
    }

    /// Commits a settled value if `generation` is still current.
    pub(crate) fn commit_value(&self, generation: u64, value: T) -> bool {
        self.commit_partial(generation, value, None)
    }

    /// Commits a settled value together with an optional error message.
    pub(crate) fn commit_partial(&self, generation: u64, value: T, error: Option<String>) -> bool {
        let is_empty = self.is_empty_value(&value);
        self.tx.send_if_modified(move |s| {
            if s.generation != generation {
                return false;
            }
            s.data = Some(value);
            s.is_empty = is_empty;
            s.last_updated = Some(SystemTime::now());
            s.loading = false;
            s.error = error;
            s.retry_count = s.retry_count.saturating_add(1);
            true
        })
    }

    /// Commits a settled failure if `generation` is still current.
    pub(crate) fn commit_error(&self, generation: u64, message: String) -> bool {
        self.tx.send_if_modified(move |s| {
            if s.generation != generation {
                return false;
            }
            s.loading = false;
            s.error = Some(message);
            s.retry_count = s.retry_count.saturating_add(1);
            true
        })
    }

    /// Lowers the loading flag of an unsettled load if `generation` is still current.
    pub(crate) fn abandon(&self, generation: u64) -> bool {
        self.tx
            .send_if_modified(|s| s.generation == generation && std::mem::replace(&mut s.loading, false))
    }

    /// Restores the initial snapshot under a new generation.
    pub(crate) fn reset(&self) -> u64 {
        let mut next = 0;
        self.tx.send_modify(|s| {
            next = s.generation + 1;
            *s = ResourceState {
                generation: next,
                ..self.initial.clone()
            };
        });
        next
    }

    pub(crate) fn set_data(&self, value: T) {
        let is_empty = self.is_empty_value(&value);
        self.tx.send_modify(move |s| {
            s.data = Some(value);
            s.is_empty = is_empty;
            s.last_updated = Some(SystemTime::now());
            s.loading = false;
            s.error = None;
        });
    }

    pub(crate) fn set_error(&self, message: String) {
        self.tx.send_modify(move |s| {
            s.error = Some(message);
            s.loading = false;
        });
    }

    pub(crate) fn clear_error(&self) {
        self.tx.send_if_modified(|s| s.error.take().is_some());
    }

    /// Raises the loading flag without starting a new generation.
    pub(crate) fn mark_loading(&self) {
        self.tx.send_if_modified(|s| !std::mem::replace(&mut s.loading, true));
    }
}

fn empty_with<T>(check: Option<&EmptyCheck<T>>, data: Option<&T>) -> bool {
    match (data, check) {
        (None, _) => true,
        (Some(value), Some(check)) => check(value),
        (Some(_), None) => false,
    }
}
