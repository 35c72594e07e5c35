//! # Work description and hooks.
//!
//! A [`Work`] binds a queue key to a [`Sink`] plus optional hooks. Hooks are
//! plain closures; leaving them unset is the common case and selects the
//! default behaviour described on each builder method.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use drainvisor::{Work, WorkError, WriterSink};
//!
//! let work = Work::new("jobs", WriterSink::new(Vec::new()))
//!     .before_write(|payload| !payload.is_empty())
//!     .on_error(|err| match err {
//!         WorkError::Broker(_) => Err(WorkError::recover_after(Duration::from_secs(1))),
//!         other => Err(other),
//!     })
//!     .with_recovery(Duration::from_millis(100));
//!
//! assert_eq!(work.key(), "jobs");
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::WorkError;
use crate::sinks::Sink;

/// Filter run before each write; returning `false` skips the payload.
pub type BeforeWrite = Arc<dyn Fn(&[u8]) -> bool + Send + Sync>;

/// Callback run once per successfully written payload.
pub type AfterWrite = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Error hook.
///
/// - `Ok(())` → handled, pause for the recovery duration;
/// - `Err(WorkError::Recover { sleep })` → pause exactly `sleep`;
/// - any other `Err` → terminal, the work stops.
pub type OnError = Arc<dyn Fn(WorkError) -> Result<(), WorkError> + Send + Sync>;

/// Exit hook, called once with the terminal error (`None` on clean shutdown).
pub type OnExit = Arc<dyn Fn(Option<&WorkError>) + Send + Sync>;

#[derive(Clone, Default)]
pub(crate) struct Hooks {
    pub(crate) before_write: Option<BeforeWrite>,
    pub(crate) after_write: Option<AfterWrite>,
    pub(crate) on_error: Option<OnError>,
    pub(crate) on_exit: Option<OnExit>,
}

/// One queue key drained into one sink.
pub struct Work {
    pub(crate) key: Arc<str>,
    pub(crate) sink: Box<dyn Sink>,
    pub(crate) hooks: Hooks,
    pub(crate) recovery: Option<Duration>,
}

impl Work {
    /// Creates a work draining `key` into `sink`, with no hooks.
    pub fn new(key: impl Into<Arc<str>>, sink: impl Sink) -> Self {
        Self {
            key: key.into(),
            sink: Box::new(sink),
            hooks: Hooks::default(),
            recovery: None,
        }
    }

    /// Queue key this work drains.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Skips payloads for which `f` returns `false` (no write, no `after_write`).
    #[must_use]
    pub fn before_write<F>(mut self, f: F) -> Self
    where
        F: Fn(&[u8]) -> bool + Send + Sync + 'static,
    {
        self.hooks.before_write = Some(Arc::new(f));
        self
    }

    /// Runs `f` after each payload is fully written.
    #[must_use]
    pub fn after_write<F>(mut self, f: F) -> Self
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        self.hooks.after_write = Some(Arc::new(f));
        self
    }

    /// Replaces the default error policy (log, then pause for the recovery duration).
    #[must_use]
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(WorkError) -> Result<(), WorkError> + Send + Sync + 'static,
    {
        self.hooks.on_error = Some(Arc::new(f));
        self
    }

    /// Runs `f` once when the loop exits, whatever the cause.
    #[must_use]
    pub fn on_exit<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&WorkError>) + Send + Sync + 'static,
    {
        self.hooks.on_exit = Some(Arc::new(f));
        self
    }

    /// Overrides the drainer's recovery pause for this work. Zero keeps the default.
    #[must_use]
    pub fn with_recovery(mut self, recovery: Duration) -> Self {
        self.recovery = Some(recovery);
        self
    }
}

impl fmt::Debug for Work {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Work")
            .field("key", &self.key)
            .field("before_write", &self.hooks.before_write.is_some())
            .field("after_write", &self.hooks.after_write.is_some())
            .field("on_error", &self.hooks.on_error.is_some())
            .field("on_exit", &self.hooks.on_exit.is_some())
            .field("recovery", &self.recovery)
            .finish()
    }
}
