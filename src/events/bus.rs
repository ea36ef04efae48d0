//! # Diagnostic bus shared by resources.
//!
//! Every [`Resource`](crate::Resource), its pipeline runs and its subscription
//! registry publish onto one [`Bus`]. Several resources may share a bus
//! (see [`ResourceBuilder::with_bus`](crate::ResourceBuilder::with_bus)), in
//! which case [`Bus::subscribe_to`] narrows a receiver down to one of them.
//!
//! ```text
//!   Resource("orders")  ──┐
//!   Resource("stats")   ──┼──► Bus ──► SubscriberSet::listen ──► LogWriter, ...
//!   SubscriptionRegistry ─┘     └────► subscribe_to("orders") ──► one resource only
//! ```
//!
//! Publishing never waits. The channel keeps the last `capacity` events;
//! a receiver that falls further behind sees `RecvError::Lagged(n)`. Events
//! published while nobody listens are gone.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};

use super::event::Event;

/// Broadcast channel for diagnostic events. Cloning shares the channel.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Bus holding at most `capacity` undelivered events (at least 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Receiver for every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Receiver that only yields events of the resource named `resource`.
    pub fn subscribe_to(&self, resource: impl Into<Arc<str>>) -> ResourceEvents {
        ResourceEvents {
            resource: resource.into(),
            rx: self.tx.subscribe(),
        }
    }

    /// Number of live receivers.
    pub fn receivers(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Events of one resource, taken from a shared [`Bus`].
#[derive(Debug)]
pub struct ResourceEvents {
    resource: Arc<str>,
    rx: broadcast::Receiver<Event>,
}

impl ResourceEvents {
    /// Next event for this resource; `None` once the bus is gone.
    ///
    /// Lagged gaps are skipped.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.rx.recv().await {
                Ok(ev) if ev.resource.as_deref() == Some(&*self.resource) => return Some(ev),
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Already-buffered events for this resource, without waiting.
    pub fn drain(&mut self) -> Vec<Event> {
        let mut out = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(ev) if ev.resource.as_deref() == Some(&*self.resource) => out.push(ev),
                Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return out,
            }
        }
    }
}
