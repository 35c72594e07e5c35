//! Error types used by the drainer runtime, its works, brokers and sinks.
//!
//! - [`DrainError`] — errors returned synchronously by [`Drainer`](crate::Drainer) operations.
//! - [`WorkError`] — errors observed inside a consumption loop (hooks, logs, exit hook).
//! - [`BrokerError`] — failures reported by a [`Connection`](crate::Connection).
//! - [`SinkError`] — failures reported by a [`Sink`](crate::Sink).
//!
//! Every enum exposes `as_label` (stable snake_case, for logs and events).

use std::fmt::Display;
use std::time::Duration;

use thiserror::Error;

/// # Errors returned by the drainer itself.
///
/// These are registration- and connection-time failures; errors inside a
/// running work never surface here.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum DrainError {
    /// The drainer has been closed, or no connection was ever installed.
    #[error("drainer closed")]
    Closed,

    /// A work is already registered under this key.
    #[error("work already registered for key {key:?}")]
    DuplicateKey {
        /// The conflicting queue key.
        key: String,
    },

    /// A connection is installed and reconnecting is disabled by config.
    #[error("drainer already connected")]
    AlreadyConnected,

    /// Building or health-checking a new connection failed.
    #[error("connect failed: {0}")]
    Connect(#[source] BrokerError),
}

impl DrainError {
    /// Returns a short stable label (snake_case) for use in logs/events.
    ///
    /// # Example
    /// ```
    /// use drainvisor::DrainError;
    ///
    /// let err = DrainError::DuplicateKey { key: "jobs".into() };
    /// assert_eq!(err.as_label(), "drain_duplicate_key");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            DrainError::Closed => "drain_closed",
            DrainError::DuplicateKey { .. } => "drain_duplicate_key",
            DrainError::AlreadyConnected => "drain_already_connected",
            DrainError::Connect(_) => "drain_connect_failed",
        }
    }
}

/// # Errors reported by a broker connection.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// The broker could not be reached or the connection dropped.
    #[error("broker unavailable: {0}")]
    Unavailable(String),

    /// The broker did not answer within the configured I/O timeout.
    #[error("broker timed out after {timeout:?}")]
    Timeout {
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The broker rejected or failed a command.
    #[error("broker command failed: {0}")]
    Command(String),

    /// The connection has been disposed.
    #[error("connection closed")]
    Closed,
}

impl BrokerError {
    /// Returns a short stable label (snake_case) for use in logs/events.
    pub fn as_label(&self) -> &'static str {
        match self {
            BrokerError::Unavailable(_) => "broker_unavailable",
            BrokerError::Timeout { .. } => "broker_timeout",
            BrokerError::Command(_) => "broker_command_failed",
            BrokerError::Closed => "broker_closed",
        }
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for BrokerError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_timeout()
            || e.is_io_error()
            || e.is_connection_dropped()
            || e.is_connection_refusal()
        {
            BrokerError::Unavailable(e.to_string())
        } else {
            BrokerError::Command(e.to_string())
        }
    }
}

/// # Failure reported by a sink write.
///
/// `accepted` counts the bytes the sink took before failing; the work resumes
/// from that offset on the next attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("sink write failed after {accepted} bytes: {error}")]
pub struct SinkError {
    /// Bytes accepted before the failure.
    pub accepted: usize,
    /// The underlying error message.
    pub error: String,
}

impl SinkError {
    /// Creates an error with no bytes accepted.
    pub fn new(error: impl Display) -> Self {
        Self {
            accepted: 0,
            error: error.to_string(),
        }
    }

    /// Records how many bytes the sink accepted before failing.
    #[must_use]
    pub fn with_accepted(mut self, accepted: usize) -> Self {
        self.accepted = accepted;
        self
    }
}

impl From<std::io::Error> for SinkError {
    fn from(e: std::io::Error) -> Self {
        SinkError::new(e)
    }
}

/// # Errors observed by a running work.
///
/// `Broker` and `Sink` are transient and go through the recovery policy.
/// `Recover` and `Fatal` are produced by an `on_error` hook to steer it.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum WorkError {
    /// Dequeue failed.
    #[error("dequeue failed: {0}")]
    Broker(#[from] BrokerError),

    /// Sink write failed.
    #[error("write failed: {0}")]
    Sink(#[from] SinkError),

    /// Recovery signal: pause exactly `sleep` before retrying (zero means no pause).
    #[error("sleep {sleep:?} for recovery")]
    Recover {
        /// Requested pause.
        sleep: Duration,
    },

    /// Non-recoverable error; stops the work.
    #[error("fatal error: {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },
}

impl WorkError {
    /// Recovery signal asking the work to sleep `sleep` before retrying.
    pub fn recover_after(sleep: Duration) -> Self {
        WorkError::Recover { sleep }
    }

    /// Recovery signal asking the work to retry immediately.
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use drainvisor::WorkError;
    ///
    /// assert_eq!(WorkError::recover_now().recovery_sleep(), Some(Duration::ZERO));
    /// ```
    pub fn recover_now() -> Self {
        WorkError::Recover {
            sleep: Duration::ZERO,
        }
    }

    /// Terminal error carrying a message.
    pub fn fatal(error: impl Display) -> Self {
        WorkError::Fatal {
            error: error.to_string(),
        }
    }

    /// Returns the requested pause if this is a recovery signal.
    pub fn recovery_sleep(&self) -> Option<Duration> {
        match self {
            WorkError::Recover { sleep } => Some(*sleep),
            _ => None,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/events.
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkError::Broker(_) => "work_dequeue_failed",
            WorkError::Sink(_) => "work_write_failed",
            WorkError::Recover { .. } => "work_recover",
            WorkError::Fatal { .. } => "work_fatal",
        }
    }
}
