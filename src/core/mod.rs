//! Load core: composition of fetch, retry, deadline and generation-guarded state.
//!
//! The public types of this module are re-exported at the crate root.
//!
//! Internal modules:
//! - [`cancellable`]: one fetch under a fresh child token;
//! - [`retry`]: bounded retries with exponential backoff;
//! - [`deadline`]: races the composite operation against a timer;
//! - [`pipeline`]: stacks the three above and publishes attempt events;
//! - [`state`]: snapshot cell with the generation check-and-commit;
//! - [`resource`]: the loader (`load`, `reload`, `reset`, mutators, auto-retry);
//! - [`builder`]: construction of a resource with callbacks;
//! - [`subscriptions`]: push listeners feeding a resource;
//! - [`multi`]: keyed fan-out of independent loads folded into one map.

use std::any::Any;
use std::sync::{Mutex, MutexGuard, PoisonError};

mod builder;
mod cancellable;
mod deadline;
mod multi;
mod outcome;
mod pipeline;
mod resource;
mod retry;
mod state;
mod subscriptions;

pub use builder::ResourceBuilder;
pub use cancellable::CancellableOperation;
pub use deadline::{TimeoutGuard, with_deadline};
pub use multi::MultiSource;
pub use outcome::OperationOutcome;
pub use resource::{LoadStatus, Resource};
pub use retry::{RetryAttempt, RetryExecutor, RetryObserver};
pub use state::{IsEmpty, Phase, ResourceState};
pub use subscriptions::{Pusher, SubscriptionHandle, SubscriptionRegistry, Unsubscribe};

/// Locks a short-lived mutex, recovering the guard if a holder panicked.
///
/// Never held across an `.await`.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Renders a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
