//! Runtime core: connection ownership, work registry and shutdown.
//!
//! The public API from this module is [`Drainer`], its [`DrainerBuilder`] and
//! [`DrainerConfig`].
//!
//! Internal modules:
//! - [`registry`]: live works, the connection handle and the shutdown barrier;
//! - [`drainer`]: public operations, event publishing, subscriber fan-out;
//! - [`dispose`]: deferred close of replaced connections;
//! - [`builder`]: wiring of bus, subscribers and registry.

mod builder;
mod config;
mod dispose;
mod drainer;
mod registry;

pub use builder::DrainerBuilder;
pub use config::DrainerConfig;
pub use drainer::Drainer;
