//! # Redis-backed connection.
//!
//! [`RedisConnection`] maps the [`Connection`] contract onto Redis lists:
//! `BRPOP` for the blocking pop, `LPUSH` for the push and `PING` for the
//! health check.
//!
//! ## Architecture
//! ```text
//! ping / lpush ──► shared MultiplexedConnection
//! brpop        ──► idle pool ──checkout──► dedicated MultiplexedConnection ──checkin──┐
//!                      ▲                                                             │
//!                      └─────────────────────────────────────────────────────────────┘
//! ```
//! A blocking pop occupies its socket until data arrives or the wait ends, so
//! pops never share a socket with each other or with pushes.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Client;
use tokio::sync::Mutex;
use tracing::debug;

use super::{Connection, ConnectOptions, PopReply};
use crate::error::BrokerError;

/// Whole seconds sent to `BRPOP` for `timeout`.
///
/// Servers before 6.0 reject fractional timeouts, so the wait is rounded up
/// and never below one second (zero would block forever).
fn pop_wait_secs(timeout: Duration) -> u64 {
    let secs = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
    secs.max(1)
}

/// Connection to a Redis server.
pub struct RedisConnection {
    opts: ConnectOptions,
    client: Client,
    shared: MultiplexedConnection,
    idle: Mutex<Vec<MultiplexedConnection>>,
    closed: AtomicBool,
}

impl RedisConnection {
    /// Opens a connection described by `opts`. Does not health-check it.
    pub async fn open(opts: &ConnectOptions) -> Result<Self, BrokerError> {
        let client = Client::open(opts.url.as_str())?;
        let shared = dial(&client, opts.connect_timeout).await?;
        debug!(endpoint = %opts.url, "redis connection opened");

        Ok(Self {
            opts: opts.clone(),
            client,
            shared,
            idle: Mutex::new(Vec::with_capacity(opts.pool_size_clamped())),
            closed: AtomicBool::new(false),
        })
    }

    async fn checkout(&self) -> Result<MultiplexedConnection, BrokerError> {
        if let Some(conn) = self.idle.lock().await.pop() {
            return Ok(conn);
        }
        dial(&self.client, self.opts.connect_timeout).await
    }

    async fn checkin(&self, conn: MultiplexedConnection) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let mut idle = self.idle.lock().await;
        if idle.len() < self.opts.pool_size_clamped() {
            idle.push(conn);
        }
    }

    fn ensure_open(&self) -> Result<(), BrokerError> {
        if self.closed.load(Ordering::Acquire) {
            Err(BrokerError::Closed)
        } else {
            Ok(())
        }
    }
}

/// Opens one multiplexed socket, bounded by `connect_timeout` when set.
async fn dial(
    client: &Client,
    connect_timeout: Option<Duration>,
) -> Result<MultiplexedConnection, BrokerError> {
    bounded(connect_timeout, client.get_multiplexed_async_connection()).await
}

/// Awaits `fut`, failing with [`BrokerError::Timeout`] after `limit`.
async fn bounded<T, F>(limit: Option<Duration>, fut: F) -> Result<T, BrokerError>
where
    F: Future<Output = redis::RedisResult<T>>,
{
    match limit {
        Some(timeout) => match tokio::time::timeout(timeout, fut).await {
            Ok(res) => res.map_err(BrokerError::from),
            Err(_) => Err(BrokerError::Timeout { timeout }),
        },
        None => fut.await.map_err(BrokerError::from),
    }
}

#[async_trait]
impl Connection for RedisConnection {
    fn endpoint(&self) -> &str {
        &self.opts.url
    }

    async fn brpop(&self, key: &str, timeout: Duration) -> Result<Option<PopReply>, BrokerError> {
        self.ensure_open()?;
        let wait = pop_wait_secs(timeout);
        let limit = self
            .opts
            .read_timeout
            .map(|read| Duration::from_secs(wait) + read);

        let mut conn = self.checkout().await?;
        let reply: Option<Vec<Vec<u8>>> = bounded(
            limit,
            redis::cmd("BRPOP")
                .arg(key)
                .arg(wait)
                .query_async(&mut conn),
        )
        .await?;
        // a failed socket is dropped instead of returned to the pool
        self.checkin(conn).await;

        Ok(reply.map(PopReply::new))
    }

    async fn lpush(&self, key: &str, payload: &[u8]) -> Result<(), BrokerError> {
        self.ensure_open()?;
        let mut conn = self.shared.clone();
        let _len: i64 = bounded(
            self.opts.write_timeout,
            redis::cmd("LPUSH").arg(key).arg(payload).query_async(&mut conn),
        )
        .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), BrokerError> {
        self.ensure_open()?;
        let mut conn = self.shared.clone();
        let _pong: String = bounded(
            self.opts.io_timeout(),
            redis::cmd("PING").query_async(&mut conn),
        )
        .await?;
        Ok(())
    }

    fn io_timeout(&self) -> Option<Duration> {
        self.opts.io_timeout()
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.idle.lock().await.clear();
        debug!(endpoint = %self.opts.url, "redis connection closed");
    }
}
