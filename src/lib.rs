//! # drainvisor
//!
//! **Drainvisor** supervises consumers of blocking broker queues.
//!
//! Each [`Work`] drains one queue key into one [`Sink`]: it pops payloads with
//! a bounded blocking pop, writes them in FIFO order, and retries failed pops
//! and writes through a recovery policy the caller can steer. All works of a
//! [`Drainer`] share one broker connection that can be replaced while they run.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │    Work      │   │    Work      │   │    Work      │
//!     │ key "jobs"   │   │ key "audit"  │   │ key "mail"   │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼ drain()          ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Drainer                                                          │
//! │  - Registry (live keys, TaskTracker barrier, closed flag)         │
//! │  - ConnectionHandle (lock-free, swapped on connect/close)         │
//! │  - Bus (broadcast lifecycle events)                               │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        ▼                  ▼                  ▼               │
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   │
//!     │  WorkRunner  │   │  WorkRunner  │   │  WorkRunner  │   │
//!     │ (pop/write)  │   │ (pop/write)  │   │ (pop/write)  │   │
//!     └┬─────────────┘   └┬─────────────┘   └┬─────────────┘   │
//!      │ RecoveryScheduled│ WorkExited       │ WorkFailed      │ Connected, Redirected,
//!      ▼                  ▼                  ▼                 ▼ ShutdownRequested, ...
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       subscriber_listener ──► SubscriberSet ──► on_event()
//! ```
//!
//! ### Work loop
//! ```text
//! loop {
//!   ├─► conn = handle.load()          (None ─► exit cleanly)
//!   ├─► brpop(key, poll_timeout)
//!   │       ├─ timeout      ─► continue
//!   │       ├─ Err          ─► recovery (hook / pause) ─► continue or exit
//!   │       └─ payloads     ─► for each: before_write? ─► write until fully accepted
//!   │                                    ├─ write Err while open    ─► recovery, resume at offset
//!   │                                    ├─ write Err while closing ─► bounded attempts, then exit
//!   │                                    └─ done ─► after_write
//! }
//! on exit: flush sink, on_exit(err), deregister
//! ```
//!
//! ## Features
//! | Area              | Description                                              | Key types / traits                       |
//! |-------------------|----------------------------------------------------------|------------------------------------------|
//! | **Drainer**       | Connection ownership, registration, graceful shutdown.   | [`Drainer`], [`DrainerBuilder`]          |
//! | **Works**         | Per-key loop with write hooks and recovery control.      | [`Work`], [`OnError`], [`WorkError`]     |
//! | **Brokers**       | Blocking-pop connections: Redis and in-memory.           | [`Connection`], [`MemoryBroker`]         |
//! | **Sinks**         | Byte destinations with partial-write resume.             | [`Sink`], [`WriterSink`]                 |
//! | **Subscriber API**| Hook into lifecycle events.                              | [`Subscribe`], [`Event`]                 |
//! | **Configuration** | Poll/recovery timings, shutdown budget, disposal grace.  | [`DrainerConfig`]                        |
//!
//! ## Optional features
//! - `redis` _(default)_: [`RedisConnection`] and [`Drainer::connect`].
//! - `logging`: exports a simple built-in [`LogWriter`] subscriber.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use drainvisor::{Drainer, DrainerConfig, MemoryBroker, Work, WorkError, WriterSink};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = DrainerConfig {
//!         poll_timeout: Duration::from_millis(50),
//!         ..DrainerConfig::default()
//!     };
//!
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn drainvisor::Subscribe>> = vec![Arc::new(drainvisor::LogWriter::new())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn drainvisor::Subscribe>> = Vec::new();
//!
//!     let drainer = Drainer::builder(cfg).with_subscribers(subs).build();
//!
//!     let broker = MemoryBroker::new();
//!     drainer.attach(Arc::new(broker.connection("memory://local"))).await?;
//!
//!     let work = Work::new("jobs", WriterSink::new(Vec::new()))
//!         .on_error(|_err| Err(WorkError::recover_now()));
//!     drainer.drain(work).await?;
//!
//!     broker.push("jobs", b"hello".to_vec()).await;
//!     drainer.close().await?;
//!     Ok(())
//! }
//! ```
mod broker;
mod core;
mod error;
mod events;
mod sinks;
mod subscribers;
mod works;

// ---- Public re-exports ----

pub use broker::{
    ConnectOptions, Connection, ConnectionHandle, ConnectionRef, MemoryBroker, MemoryConnection,
    PopReply,
};
pub use core::{Drainer, DrainerBuilder, DrainerConfig};
pub use error::{BrokerError, DrainError, SinkError, WorkError};
pub use events::{Bus, Event, EventKind};
pub use sinks::{Sink, WriterSink};
pub use subscribers::{Subscribe, SubscriberSet};
pub use works::{AfterWrite, BeforeWrite, OnError, OnExit, Work};

// Redis-backed connection, enabled by default.
#[cfg(feature = "redis")]
pub use broker::RedisConnection;

// Optional: expose a simple built-in logger subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
