use std::sync::Arc;

use super::{drainer::Drainer, DrainerConfig};
use crate::{
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing a [`Drainer`] with optional subscribers.
pub struct DrainerBuilder {
    cfg: DrainerConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl DrainerBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: DrainerConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers.
    ///
    /// Subscribers receive lifecycle events (connects, work exits, recovery
    /// pauses, shutdown) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the drainer: event bus, registry and subscriber workers.
    ///
    /// Must be called within a tokio runtime.
    pub fn build(self) -> Arc<Drainer> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = SubscriberSet::new(self.subscribers, bus.clone());
        Arc::new(Drainer::new_internal(self.cfg, bus, subs))
    }
}
