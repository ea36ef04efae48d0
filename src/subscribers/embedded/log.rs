//! # LogWriter: events rendered through `tracing`
//!
//! A minimal subscriber that turns incoming [`Event`]s into `tracing` records.
//! Use it for demos and debugging; install a `tracing` subscriber to see output.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! DEBUG loadvisor: load started resource="orders" generation=1
//!  INFO loadvisor: retry scheduled resource="orders" attempt=1 delay_ms=1000 reason="backend (unavailable)"
//!  WARN loadvisor: timeout hit resource="orders" timeout_ms=50
//!  INFO loadvisor: load succeeded resource="orders" generation=1
//!  WARN loadvisor: source failed resource="overview" key="stats" reason="quota"
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let resource = e.resource.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::LoadStarted => {
                debug!(target: "loadvisor", resource, generation = ?e.generation, "load started");
            }
            EventKind::AttemptFailed => {
                debug!(
                    target: "loadvisor",
                    resource,
                    key = ?e.key,
                    attempt = ?e.attempt,
                    reason,
                    "attempt failed"
                );
            }
            EventKind::RetryScheduled => {
                info!(
                    target: "loadvisor",
                    resource,
                    key = ?e.key,
                    attempt = ?e.attempt,
                    delay_ms = ?e.delay_ms,
                    reason,
                    "retry scheduled"
                );
            }
            EventKind::TimeoutHit => {
                warn!(target: "loadvisor", resource, key = ?e.key, timeout_ms = ?e.timeout_ms, "timeout hit");
            }
            EventKind::LoadSucceeded => {
                info!(target: "loadvisor", resource, generation = ?e.generation, "load succeeded");
            }
            EventKind::LoadFailed => {
                warn!(
                    target: "loadvisor",
                    resource,
                    generation = ?e.generation,
                    kind = e.error_kind.map(|k| k.as_label()).unwrap_or("-"),
                    reason,
                    "load failed"
                );
            }
            EventKind::LoadDiscarded => {
                debug!(target: "loadvisor", resource, generation = ?e.generation, "load discarded");
            }
            EventKind::SourceFailed => {
                warn!(target: "loadvisor", resource, key = ?e.key, reason, "source failed");
            }
            EventKind::AutoRetryScheduled => {
                info!(target: "loadvisor", resource, delay_ms = ?e.delay_ms, "auto-retry scheduled");
            }
            EventKind::ReloadSkipped => {
                debug!(target: "loadvisor", resource, "reload skipped");
            }
            EventKind::ResourceReset => {
                info!(target: "loadvisor", resource, generation = ?e.generation, "resource reset");
            }
            EventKind::SubscriptionOpened => {
                info!(target: "loadvisor", resource, id = ?e.key, "subscription opened");
            }
            EventKind::SubscriptionClosed => {
                info!(target: "loadvisor", resource, id = ?e.key, "subscription closed");
            }
            EventKind::SubscriptionStale => {
                warn!(
                    target: "loadvisor",
                    resource,
                    id = ?e.key,
                    generation = ?e.generation,
                    "push from silenced subscription ignored"
                );
            }
            EventKind::UnsubscribeFailed => {
                warn!(target: "loadvisor", resource, id = ?e.key, reason, "unsubscribe failed");
            }
            EventKind::SubscriberOverflow => {
                warn!(target: "loadvisor", subscriber = resource, reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                error!(target: "loadvisor", subscriber = resource, reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
