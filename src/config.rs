//! # Resource configuration.
//!
//! Provides [`ResourceConfig`], the centralized settings of one
//! [`Resource`](crate::Resource), and the per-call [`LoadOptions`].
//!
//! Config is used in two ways:
//! 1. **Resource creation**: `Resource::builder(config)`
//! 2. **Load defaults**: `Resource::load_default(fetcher)` uses `config.load`
//!
//! ## Sentinel values
//! - `LoadOptions::timeout = 0s` → no deadline
//! - `AutoRetry::delay = 0s` → auto-retry disabled even if `enabled`
//! - `bus_capacity = 0` → clamped to 1

use std::time::Duration;

use crate::policies::RetryConfig;

/// Per-call options for [`Resource::load`](crate::Resource::load).
///
/// ## Field semantics
/// - `skip_retry`: run the fetcher once, bypassing the retry executor
/// - `show_loading_state`: set `loading = true` while in flight (`false` for background refreshes)
/// - `preserve_data`: keep the previous `data` visible while in flight
/// - `timeout`: deadline for the whole composite operation (`0s` = none)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadOptions {
    pub skip_retry: bool,
    pub show_loading_state: bool,
    pub preserve_data: bool,
    pub timeout: Duration,
}

impl Default for LoadOptions {
    /// Retries on, loading flag shown, data cleared, 10s deadline.
    fn default() -> Self {
        Self {
            skip_retry: false,
            show_loading_state: true,
            preserve_data: false,
            timeout: Duration::from_millis(10_000),
        }
    }
}

impl LoadOptions {
    /// Options for a silent refresh: previous data stays, no loading flag.
    pub fn background() -> Self {
        Self {
            show_loading_state: false,
            preserve_data: true,
            ..Self::default()
        }
    }

    /// Returns the deadline as an `Option`.
    ///
    /// - `None` → no deadline
    /// - `Some(d)` → the composite operation is raced against `d`
    #[inline]
    pub fn deadline(&self) -> Option<Duration> {
        if self.timeout == Duration::ZERO {
            None
        } else {
            Some(self.timeout)
        }
    }
}

/// Deferred re-load after a connectivity failure.
///
/// When enabled, a failed load whose message contains `"network"` schedules
/// one more `load` with the same arguments after `delay`. Any later `load` or
/// `reset` cancels the pending timer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AutoRetry {
    pub enabled: bool,
    pub delay: Duration,
}

impl AutoRetry {
    /// Enabled auto-retry with the given delay.
    pub fn after(delay: Duration) -> Self {
        Self {
            enabled: true,
            delay,
        }
    }

    /// Returns the delay when auto-retry is active.
    #[inline]
    pub fn delay(&self) -> Option<Duration> {
        if self.enabled && self.delay > Duration::ZERO {
            Some(self.delay)
        } else {
            None
        }
    }
}

/// Configuration for one resource.
///
/// Defines:
/// - **Identity**: `name` used in events and logs
/// - **Retry**: attempt budget, backoff and classifier
/// - **Load defaults**: options used by `load_default`
/// - **Auto-retry**: deferred re-load after network failures
/// - **Event system**: bus capacity when the resource owns its bus
#[derive(Clone, Debug)]
pub struct ResourceConfig {
    /// Name reported in events and logs.
    pub name: String,

    /// Retry policy applied by the executor.
    pub retry: RetryConfig,

    /// Default options for [`Resource::load_default`](crate::Resource::load_default).
    pub load: LoadOptions,

    /// Deferred re-load policy.
    pub auto_retry: AutoRetry,

    /// Capacity of the event bus created for this resource.
    ///
    /// Ignored when a shared bus is supplied via
    /// [`ResourceBuilder::with_bus`](crate::ResourceBuilder::with_bus).
    pub bus_capacity: usize,
}

impl ResourceConfig {
    /// Default configuration with the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for ResourceConfig {
    /// Default configuration:
    ///
    /// - `name = "resource"`
    /// - `retry = RetryConfig::default()`
    /// - `load = LoadOptions::default()`
    /// - `auto_retry` disabled
    /// - `bus_capacity = 256`
    fn default() -> Self {
        Self {
            name: "resource".to_string(),
            retry: RetryConfig::default(),
            load: LoadOptions::default(),
            auto_retry: AutoRetry::default(),
            bus_capacity: 256,
        }
    }
}
