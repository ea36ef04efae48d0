//! Diagnostic events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Resource`, `MultiSource`, the load pipeline,
//!   `SubscriptionRegistry`, `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: `SubscriberSet` (fans out to [`Subscribe`](crate::Subscribe) impls)
//!   and any receiver obtained from [`Bus::subscribe`].

mod bus;
mod event;

pub use bus::{Bus, ResourceEvents};
pub use event::{Event, EventKind};
