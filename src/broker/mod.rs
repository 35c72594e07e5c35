//! # Broker connections.
//!
//! The drainer consumes the broker only through the [`Connection`] trait:
//! a bounded blocking pop, a push and a health check. Two implementations ship
//! with the crate:
//! - [`RedisConnection`] (feature `redis`) — `BRPOP`/`LPUSH`/`PING` on a Redis server;
//! - [`MemoryBroker`] — in-process lists with the same semantics, for tests and embedding.
//!
//! ## Ordering
//! Producers push at the head and works pop from the tail, so a single producer
//! per key observes FIFO delivery.
//!
//! ```text
//! producer ── lpush ──► [ v3 v2 v1 ] ── brpop ──► Work ──► Sink
//! ```

mod handle;
mod memory;
mod options;
#[cfg(feature = "redis")]
mod redis_broker;

pub use handle::ConnectionHandle;
pub use memory::{MemoryBroker, MemoryConnection};
pub use options::ConnectOptions;
#[cfg(feature = "redis")]
pub use redis_broker::RedisConnection;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::BrokerError;

/// Shared reference to a live broker connection.
pub type ConnectionRef = Arc<dyn Connection>;

/// # Broker connection contract.
///
/// Implementations must tolerate concurrent calls from many works; a work
/// fetches the current connection once per dequeue and may keep using it for
/// a moment after it has been swapped out.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    /// Human-readable endpoint used in logs and events.
    fn endpoint(&self) -> &str;

    /// Pops from the tail of `key`, waiting at most `timeout` for data.
    ///
    /// Returns `Ok(None)` when nothing arrived before the timeout.
    async fn brpop(&self, key: &str, timeout: Duration) -> Result<Option<PopReply>, BrokerError>;

    /// Pushes `payload` onto the head of `key`.
    async fn lpush(&self, key: &str, payload: &[u8]) -> Result<(), BrokerError>;

    /// Lightweight round trip used before installing a fresh connection.
    async fn ping(&self) -> Result<(), BrokerError>;

    /// Configured read/write timeout, if any. Feeds the disposal grace period.
    fn io_timeout(&self) -> Option<Duration> {
        None
    }

    /// Releases the connection's resources. Called once the disposal grace has passed.
    async fn close(&self) {}
}

/// Reply of a successful blocking pop: a flat sequence alternating key and value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PopReply {
    flat: Vec<Vec<u8>>,
}

impl PopReply {
    /// Wraps a flat `[key, value, key, value, ...]` reply.
    pub fn new(flat: Vec<Vec<u8>>) -> Self {
        Self { flat }
    }

    /// Builds a reply from `(key, value)` pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Vec<u8>>,
        V: Into<Vec<u8>>,
    {
        let mut flat = Vec::new();
        for (k, v) in pairs {
            flat.push(k.into());
            flat.push(v.into());
        }
        Self { flat }
    }

    /// Values in reply order; a trailing key without a value is ignored.
    pub fn values(&self) -> impl Iterator<Item = &[u8]> {
        self.flat.chunks_exact(2).map(|pair| pair[1].as_slice())
    }

    /// Number of complete key/value pairs.
    pub fn len(&self) -> usize {
        self.flat.len() / 2
    }

    /// True if the reply carries no complete pair.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_skip_keys() {
        let reply = PopReply::from_pairs([("q", "a"), ("q", "b")]);
        let values: Vec<&[u8]> = reply.values().collect();
        assert_eq!(values, vec![b"a".as_slice(), b"b".as_slice()]);
        assert_eq!(reply.len(), 2);
    }

    #[test]
    fn test_dangling_key_ignored() {
        let reply = PopReply::new(vec![b"q".to_vec(), b"a".to_vec(), b"q".to_vec()]);
        assert_eq!(reply.values().count(), 1);
        assert!(!reply.is_empty());
        assert!(PopReply::new(vec![b"q".to_vec()]).is_empty());
    }
}
