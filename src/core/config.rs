//! # Drainer configuration.
//!
//! Provides [`DrainerConfig`], the settings shared by a drainer and all of its works.
//!
//! ## Sentinel values
//! - `shutdown_write_attempts = 0` → treated as 1
//! - `bus_capacity = 0` → treated as 1

use std::time::Duration;

/// Global configuration for a [`Drainer`](crate::Drainer).
///
/// ## Field semantics
/// - `poll_timeout`: bounded wait of each blocking pop; also bounds shutdown latency
/// - `recovery`: default pause after a handled error (a work may override it)
/// - `shutdown_write_attempts`: per-payload failure count at which a closing work gives up
/// - `dispose_grace`: how long a replaced connection lives when it has no I/O timeout
/// - `dispose_margin`: added to a connection's I/O timeout to size its disposal grace
/// - `bus_capacity`: lifecycle event ring buffer size
/// - `allow_reconnect`: whether connect/attach/redirect may replace a live connection
#[derive(Clone, Debug)]
pub struct DrainerConfig {
    /// Bounded wait of each blocking pop.
    ///
    /// A pop that times out without data is not an error. Closing the drainer
    /// is observed at the next iteration, so this is also the worst-case
    /// shutdown latency of an idle work. The Redis backend rounds it up to
    /// whole seconds.
    pub poll_timeout: Duration,

    /// Pause after an error handled by the default policy or by a hook returning `Ok(())`.
    pub recovery: Duration,

    /// Failed write attempts of one payload after which a closing work gives up.
    ///
    /// Failures before the close count too: a payload that already failed this
    /// many times is abandoned at its first failure after close. While open,
    /// writes are retried indefinitely.
    pub shutdown_write_attempts: u32,

    /// Disposal delay for a replaced connection that reports no I/O timeout.
    pub dispose_grace: Duration,

    /// Safety margin added to a connection's I/O timeout before disposal.
    pub dispose_margin: Duration,

    /// Capacity of the lifecycle event bus.
    pub bus_capacity: usize,

    /// When `false`, connecting a drainer that already has a connection fails
    /// with [`DrainError::AlreadyConnected`](crate::DrainError::AlreadyConnected).
    pub allow_reconnect: bool,
}

impl DrainerConfig {
    /// Returns the shutdown write budget clamped to a minimum of 1.
    #[inline]
    pub fn shutdown_write_attempts_clamped(&self) -> u32 {
        self.shutdown_write_attempts.max(1)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Grace period before disposing a replaced connection.
    ///
    /// - `Some(t)` → `t + dispose_margin`
    /// - `None` → `dispose_grace`
    #[inline]
    pub fn dispose_after(&self, io_timeout: Option<Duration>) -> Duration {
        match io_timeout {
            Some(t) => t.saturating_add(self.dispose_margin),
            None => self.dispose_grace,
        }
    }
}

impl Default for DrainerConfig {
    /// Default configuration:
    ///
    /// - `poll_timeout = 1s`
    /// - `recovery = 250ms`
    /// - `shutdown_write_attempts = 3`
    /// - `dispose_grace = 60s`
    /// - `dispose_margin = 1s`
    /// - `bus_capacity = 1024`
    /// - `allow_reconnect = true` (connect is a hot reconnect)
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_secs(1),
            recovery: Duration::from_millis(250),
            shutdown_write_attempts: 3,
            dispose_grace: Duration::from_secs(60),
            dispose_margin: Duration::from_secs(1),
            bus_capacity: 1024,
            allow_reconnect: true,
        }
    }
}
