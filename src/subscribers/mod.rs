//! # Event subscribers.
//!
//! Plug custom handlers into the drainer's lifecycle events.
//!
//! ```text
//! Drainer / Registry / Work ── publish(Event) ──► Bus ──► subscriber_listener
//!                                                               │
//!                                                     SubscriberSet::emit(&Event)
//!                                                   ┌───────────┼───────────┐
//!                                                   ▼           ▼           ▼
//!                                              [queue S1]  [queue S2]  [queue SN]
//!                                                   │           │           │
//!                                             on_event()  on_event()  on_event()
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use async_trait::async_trait;
//! use drainvisor::{Event, EventKind, Subscribe};
//!
//! struct FailureCounter;
//!
//! #[async_trait]
//! impl Subscribe for FailureCounter {
//!     async fn on_event(&self, ev: &Event) {
//!         if matches!(ev.kind, EventKind::WorkFailed) {
//!             // bump a counter, page someone, ...
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "failure-counter" }
//! }
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscriber;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
