//! # Works: one consumption loop per queue key.
//!
//! - [`Work`] — the caller-built description: key, sink, hooks, recovery override
//! - `recovery` — the error → pause/terminate decision shared by the pop and write paths
//! - `runner` — the loop itself, driven by the drainer's registry
//!
//! ## Lifecycle
//! ```text
//! Running ──error──► Recovering(sleep) ──► Running
//!    │
//!    └── handle closed ──► Closing (bounded write retries) ──► Exited ──► on_exit(err)
//! ```

mod recovery;
mod runner;
mod work;

pub(crate) use runner::WorkRunner;
pub use work::{AfterWrite, BeforeWrite, OnError, OnExit, Work};
