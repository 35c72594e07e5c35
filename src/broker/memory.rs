//! # In-process list broker.
//!
//! [`MemoryBroker`] keeps named lists in memory with Redis list semantics
//! (`lpush` at the head, `brpop` from the tail) and hands out
//! [`MemoryConnection`]s bound to it. Connections carry fault injection knobs
//! so recovery and reconnect paths can be exercised without a server.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use super::{Connection, PopReply};
use crate::error::BrokerError;

#[derive(Default)]
struct Shared {
    lists: Mutex<HashMap<String, VecDeque<Vec<u8>>>>,
    pushed: Notify,
}

/// In-memory broker shared by all connections created from it.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    shared: Arc<Shared>,
}

impl MemoryBroker {
    /// Creates an empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new connection named `endpoint`.
    pub fn connection(&self, endpoint: impl Into<String>) -> MemoryConnection {
        MemoryConnection {
            endpoint: endpoint.into(),
            shared: Arc::clone(&self.shared),
            io_timeout: None,
            healthy: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            failing_pops: AtomicUsize::new(0),
            pops: AtomicUsize::new(0),
        }
    }

    /// Pushes `payload` onto the head of `key`.
    pub async fn push(&self, key: &str, payload: impl Into<Vec<u8>>) {
        self.shared
            .lists
            .lock()
            .await
            .entry(key.to_string())
            .or_default()
            .push_front(payload.into());
        self.shared.pushed.notify_waiters();
    }

    /// Number of items waiting in `key`.
    pub async fn len(&self, key: &str) -> usize {
        self.shared
            .lists
            .lock()
            .await
            .get(key)
            .map_or(0, VecDeque::len)
    }

    async fn pop_tail(&self, key: &str) -> Option<Vec<u8>> {
        let mut lists = self.shared.lists.lock().await;
        let list = lists.get_mut(key)?;
        let value = list.pop_back();
        if list.is_empty() {
            lists.remove(key);
        }
        value
    }
}

/// Connection to a [`MemoryBroker`].
pub struct MemoryConnection {
    endpoint: String,
    shared: Arc<Shared>,
    io_timeout: Option<Duration>,
    healthy: AtomicBool,
    closed: AtomicBool,
    failing_pops: AtomicUsize,
    pops: AtomicUsize,
}

impl MemoryConnection {
    /// Reports `timeout` as the connection's I/O timeout.
    #[must_use]
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = Some(timeout);
        self
    }

    /// Makes `ping` fail while `healthy` is false.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Makes the next `n` pops fail with [`BrokerError::Unavailable`].
    pub fn fail_next_pops(&self, n: usize) {
        self.failing_pops.store(n, Ordering::SeqCst);
    }

    /// Number of pops served (successful or timed out) by this connection.
    pub fn pops(&self) -> usize {
        self.pops.load(Ordering::SeqCst)
    }

    /// True once [`Connection::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn broker(&self) -> MemoryBroker {
        MemoryBroker {
            shared: Arc::clone(&self.shared),
        }
    }

    fn take_injected_failure(&self) -> bool {
        self.failing_pops
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn brpop(&self, key: &str, timeout: Duration) -> Result<Option<PopReply>, BrokerError> {
        if self.is_closed() {
            return Err(BrokerError::Closed);
        }
        if self.take_injected_failure() {
            return Err(BrokerError::Unavailable(format!(
                "{}: injected pop failure",
                self.endpoint
            )));
        }

        let deadline = Instant::now() + timeout;
        let broker = self.broker();
        let popped = loop {
            let pushed = self.shared.pushed.notified();
            tokio::pin!(pushed);
            pushed.as_mut().enable();

            if let Some(value) = broker.pop_tail(key).await {
                break Some(value);
            }
            if tokio::time::timeout_at(deadline, pushed).await.is_err() {
                break None;
            }
        };

        self.pops.fetch_add(1, Ordering::SeqCst);
        Ok(popped.map(|value| PopReply::from_pairs([(key.as_bytes().to_vec(), value)])))
    }

    async fn lpush(&self, key: &str, payload: &[u8]) -> Result<(), BrokerError> {
        if self.is_closed() {
            return Err(BrokerError::Closed);
        }
        self.broker().push(key, payload.to_vec()).await;
        Ok(())
    }

    async fn ping(&self) -> Result<(), BrokerError> {
        if self.is_closed() {
            return Err(BrokerError::Closed);
        }
        if !self.healthy.load(Ordering::SeqCst) {
            return Err(BrokerError::Unavailable(format!(
                "{}: health check failed",
                self.endpoint
            )));
        }
        Ok(())
    }

    fn io_timeout(&self) -> Option<Duration> {
        self.io_timeout
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
