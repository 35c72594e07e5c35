//! # The `Subscribe` trait.
//!
//! A subscriber observes drainer lifecycle events from its own worker task,
//! fed by a bounded queue of [`Subscribe::queue_capacity`] events. A slow or
//! panicking subscriber never stalls a work loop or another subscriber: when
//! its queue is full the event is dropped for it alone (`SubscriberOverflow`),
//! and a panic is caught and reported as `SubscriberPanicked`.
//!
//! [`Subscribe::accepts`] filters before queueing, so a subscriber interested
//! only in failures does not spend queue slots on every recovery pause.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use drainvisor::{Event, EventKind, Subscribe};
//!
//! struct ExitAudit;
//!
//! #[async_trait]
//! impl Subscribe for ExitAudit {
//!     async fn on_event(&self, ev: &Event) {
//!         println!("work {:?} ended: {:?}", ev.work, ev.reason);
//!     }
//!
//!     fn accepts(&self, ev: &Event) -> bool {
//!         matches!(ev.kind, EventKind::WorkExited | EventKind::WorkFailed)
//!     }
//!
//!     fn name(&self) -> &'static str { "exit-audit" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Observer of drainer lifecycle events.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one accepted event. Events arrive in publish order.
    async fn on_event(&self, event: &Event);

    /// Whether `event` should be queued for this subscriber. Default: all events.
    fn accepts(&self, _event: &Event) -> bool {
        true
    }

    /// Short name used in logs and in overflow/panic events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Queue capacity (minimum 1). Default: 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
