//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out
//! and (with the `logging` feature) the built-in `LogWriter`.
//!
//! ## Architecture
//! ```text
//! Resource / MultiSource / SubscriptionRegistry
//!         │ publish(Event)
//!         ▼
//!        Bus ──► SubscriberSet::listen ──► per-subscriber queue ──► Subscribe::on_event
//!                                                 │
//!                                     ┌───────────┼───────────┐
//!                                     ▼           ▼           ▼
//!                                 LogWriter    Metrics      Custom
//! ```

#[cfg(feature = "logging")]
mod embedded;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
