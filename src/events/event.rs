//! # Diagnostic events emitted by resources, registries and subscribers.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Load events**: one load's flow (started, attempt failed, retry, timeout, settled, discarded)
//! - **Subscription events**: push listeners opened, closed, silenced, failing to unsubscribe
//! - **Subscriber events**: delivery problems inside [`SubscriberSet`](crate::SubscriberSet)
//!
//! The [`Event`] struct carries additional metadata such as the resource name,
//! the load generation, attempt numbers and delays.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use loadvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::RetryScheduled)
//!     .with_resource("orders")
//!     .with_attempt(2)
//!     .with_delay(Duration::from_millis(400))
//!     .with_reason("unavailable");
//!
//! assert_eq!(ev.kind, EventKind::RetryScheduled);
//! assert_eq!(ev.resource.as_deref(), Some("orders"));
//! assert_eq!(ev.delay_ms, Some(400));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::error::ErrorKind;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of diagnostic events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Load events ===
    /// A load (or multi-source load) began.
    ///
    /// Sets: `resource`, `generation`
    LoadStarted,

    /// One attempt failed inside the retry executor.
    ///
    /// Sets: `resource`, `key` (multi-source), `attempt`, `reason`
    AttemptFailed,

    /// Backoff scheduled before the next attempt.
    ///
    /// Sets: `resource`, `key` (multi-source), `attempt` (the failed one), `delay_ms`, `reason`
    RetryScheduled,

    /// The composite operation lost its deadline race.
    ///
    /// Sets: `resource`, `key` (multi-source), `timeout_ms`, `generation`
    TimeoutHit,

    /// The load committed a value.
    ///
    /// Sets: `resource`, `generation`
    LoadSucceeded,

    /// The load committed an error.
    ///
    /// Sets: `resource`, `generation`, `reason`, `error_kind`
    LoadFailed,

    /// The load settled after being superseded; nothing was committed.
    ///
    /// Sets: `resource`, `generation`
    LoadDiscarded,

    /// One key of a multi-source load failed.
    ///
    /// Sets: `resource`, `key`, `reason`, `error_kind`
    SourceFailed,

    /// A deferred re-load was scheduled after a network failure.
    ///
    /// Sets: `resource`, `generation`, `delay_ms`
    AutoRetryScheduled,

    /// `reload()` was called before any fetcher was supplied.
    ///
    /// Sets: `resource`
    ReloadSkipped,

    /// The resource was restored to its initial snapshot.
    ///
    /// Sets: `resource`, `generation`
    ResourceReset,

    // === Subscription events ===
    /// A push listener was registered.
    ///
    /// Sets: `resource`, `key` (subscription id)
    SubscriptionOpened,

    /// A push listener was released.
    ///
    /// Sets: `resource`, `key` (subscription id)
    SubscriptionClosed,

    /// A listener pushed after a later `load` or `reset` silenced it.
    /// Published on the first ignored push only; the listener stays registered.
    ///
    /// Sets: `resource`, `key` (subscription id), `generation` (captured at setup)
    SubscriptionStale,

    /// An unsubscribe function failed or panicked; the failure was swallowed.
    ///
    /// Sets: `resource`, `key` (subscription id), `reason`
    UnsubscribeFailed,

    // === Subscriber events ===
    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `resource` (subscriber name), `reason`
    SubscriberOverflow,

    /// Subscriber panicked during event processing.
    ///
    /// Sets: `resource` (subscriber name), `reason`
    SubscriberPanicked,
}

/// Diagnostic event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the resource (or subscriber) concerned.
    pub resource: Option<Arc<str>>,
    /// Source key for multi-source loads, subscription id for listeners.
    pub key: Option<Arc<str>>,
    /// Load generation the event belongs to.
    pub generation: Option<u64>,
    /// Attempt number (starting from 1).
    pub attempt: Option<u32>,
    /// Backoff delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Deadline in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Human-readable reason (error messages, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Classification of the failure, for failure events.
    pub error_kind: Option<ErrorKind>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            resource: None,
            key: None,
            generation: None,
            attempt: None,
            delay_ms: None,
            timeout_ms: None,
            reason: None,
            error_kind: None,
        }
    }

    #[inline]
    pub fn with_resource(mut self, resource: impl Into<Arc<str>>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    #[inline]
    pub fn with_key(mut self, key: impl Into<Arc<str>>) -> Self {
        self.key = Some(key.into());
        self
    }

    #[inline]
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = Some(generation);
        self
    }

    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a backoff delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a deadline (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[inline]
    pub fn with_error_kind(mut self, kind: ErrorKind) -> Self {
        self.error_kind = Some(kind);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_resource(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_resource(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::new(EventKind::LoadStarted);
        let b = Event::new(EventKind::LoadStarted);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_delay_saturates() {
        let ev = Event::new(EventKind::RetryScheduled).with_delay(Duration::from_secs(u64::MAX));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }
}
