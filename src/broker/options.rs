//! # Connection options consumed by `Drainer::connect`.

use std::time::Duration;

/// Where and how to reach the broker.
///
/// ## Field semantics
/// - `url`: broker endpoint, e.g. `redis://127.0.0.1:6379/0`
/// - `read_timeout` / `write_timeout`: per-command bounds (`None` = unbounded);
///   the larger of the two also sizes the disposal grace of a replaced connection
/// - `connect_timeout`: bound on establishing a socket (`None` = unbounded)
/// - `pool_size`: idle connections kept for blocking pops (min 1)
#[derive(Clone, Debug)]
pub struct ConnectOptions {
    /// Broker endpoint.
    pub url: String,
    /// Per-command read bound.
    pub read_timeout: Option<Duration>,
    /// Per-command write bound.
    pub write_timeout: Option<Duration>,
    /// Socket establishment bound.
    pub connect_timeout: Option<Duration>,
    /// Idle connections kept for blocking pops.
    pub pool_size: usize,
}

impl ConnectOptions {
    /// Options for `url` with no timeouts and a pool of 8.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            read_timeout: None,
            write_timeout: None,
            connect_timeout: None,
            pool_size: 8,
        }
    }

    /// Sets the read timeout.
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Sets the write timeout.
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the idle pool size.
    #[must_use]
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    /// The larger of the read and write timeouts, if either is set.
    #[inline]
    pub fn io_timeout(&self) -> Option<Duration> {
        match (self.read_timeout, self.write_timeout) {
            (Some(r), Some(w)) => Some(r.max(w)),
            (r, w) => r.or(w),
        }
    }

    /// Pool size clamped to a minimum of 1.
    #[inline]
    pub fn pool_size_clamped(&self) -> usize {
        self.pool_size.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_timeout_takes_larger() {
        let opts = ConnectOptions::new("redis://localhost")
            .with_read_timeout(Duration::from_secs(3))
            .with_write_timeout(Duration::from_secs(5));
        assert_eq!(opts.io_timeout(), Some(Duration::from_secs(5)));

        let opts =
            ConnectOptions::new("redis://localhost").with_read_timeout(Duration::from_secs(2));
        assert_eq!(opts.io_timeout(), Some(Duration::from_secs(2)));
        assert_eq!(ConnectOptions::new("redis://localhost").io_timeout(), None);
    }

    #[test]
    fn test_pool_size_clamped() {
        let opts = ConnectOptions::new("redis://localhost").with_pool_size(0);
        assert_eq!(opts.pool_size_clamped(), 1);
    }
}
