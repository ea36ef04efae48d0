use std::sync::Arc;

use tracing::warn;

use crate::config::ResourceConfig;
use crate::core::resource::{ErrorHook, Hooks, Resource, Shared, SuccessHook};
use crate::core::state::{EmptyCheck, IsEmpty, StateCell};
use crate::error::ConfigError;
use crate::events::Bus;

/// Builder for constructing a [`Resource`] with optional callbacks.
pub struct ResourceBuilder<T> {
    cfg: ResourceConfig,
    initial: Option<T>,
    check_empty: Option<EmptyCheck<T>>,
    on_success: Option<SuccessHook<T>>,
    on_error: Option<ErrorHook>,
    bus: Option<Bus>,
}

impl<T: Clone + Send + Sync + 'static> ResourceBuilder<T> {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: ResourceConfig) -> Self {
        Self {
            cfg,
            initial: None,
            check_empty: None,
            on_success: None,
            on_error: None,
            bus: None,
        }
    }

    /// Value shown before the first load and restored by `reset`.
    pub fn initial_data(mut self, value: T) -> Self {
        self.initial = Some(value);
        self
    }

    /// Emptiness predicate applied to committed data.
    ///
    /// Without one, the resource is empty only while `data` is absent.
    pub fn check_empty<F>(mut self, check: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.check_empty = Some(Arc::new(check));
        self
    }

    /// Called with the committed value after every successful load.
    pub fn on_success<F>(mut self, hook: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(hook));
        self
    }

    /// Called with the error message after every surfaced failure.
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }

    /// Publishes events on a shared bus instead of a private one.
    ///
    /// `config.bus_capacity` is ignored in that case.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Builds the resource after checking `config.retry`.
    ///
    /// # Errors
    /// [`ConfigError`] when `initial_delay > max_delay` or `backoff_factor <= 1`.
    pub fn try_build(self) -> Result<Resource<T>, ConfigError> {
        self.cfg.retry.validate()?;
        Ok(self.assemble())
    }

    /// Builds the resource.
    ///
    /// An invalid retry config is reported with `warn!` and used as given;
    /// prefer [`try_build`](Self::try_build) to reject it.
    pub fn build(self) -> Resource<T> {
        if let Err(err) = self.cfg.retry.validate() {
            warn!(resource = %self.cfg.name, error = %err, label = err.as_label(), "invalid retry config");
        }
        self.assemble()
    }

    fn assemble(self) -> Resource<T> {
        let bus = self
            .bus
            .unwrap_or_else(|| Bus::new(self.cfg.bus_capacity_clamped()));
        let cell = StateCell::new(self.initial, self.check_empty);
        let hooks = Hooks {
            on_success: self.on_success,
            on_error: self.on_error,
        };
        Resource::from_shared(Arc::new(Shared::new(self.cfg, cell, hooks, bus)))
    }
}

impl<T: IsEmpty + Clone + Send + Sync + 'static> ResourceBuilder<T> {
    /// Treats a committed collection as empty when it holds no elements.
    pub fn empty_when_len_zero(self) -> Self {
        self.check_empty(|value: &T| value.is_empty_value())
    }
}
