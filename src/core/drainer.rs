//! # Drainer: owns the connection handle, the works, and graceful shutdown.
//!
//! A [`Drainer`] binds any number of [`Work`]s (one per queue key) to a single
//! replaceable broker connection and stops them all on [`Drainer::close`].
//!
//! ## Lifecycle
//! ```text
//!   new/build ──► (unconnected) ──connect/attach/redirect──► (connected)
//!                                                              │   ▲
//!                                        drain(work) ─► spawn  │   │ reconnect: swap handle,
//!                                                              │   │ retire old after grace
//!                                                              ▼   │
//!   close() ─► ShutdownRequested ─► handle := None ─► wait every work ─► dispose ─► AllStopped
//! ```
//!
//! ## Rules
//! - A reconnect never interrupts a running work: each loop iteration loads the
//!   handle once, and the replaced connection stays open for
//!   [`DrainerConfig::dispose_after`] so in-flight pops can finish.
//! - `close` is terminal; `drain`, `connect`, `attach`, `redirect` and a second
//!   `close` all fail with [`DrainError::Closed`] afterwards.
//! - Idle works notice `close` within one `poll_timeout`.
//!
//! ## Example
//! ```no_run
//! use drainvisor::{Drainer, DrainerConfig, MemoryBroker, Work, WriterSink};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let broker = MemoryBroker::new();
//!     let drainer = Drainer::new(DrainerConfig::default());
//!     drainer.attach(Arc::new(broker.connection("memory://local"))).await?;
//!
//!     drainer.drain(Work::new("jobs", WriterSink::new(tokio::io::stdout()))).await?;
//!     broker.push("jobs", b"hello\n".to_vec()).await;
//!
//!     drainer.close().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[cfg(feature = "redis")]
use crate::broker::{ConnectOptions, RedisConnection};
use crate::broker::ConnectionRef;
use crate::core::{dispose, registry::Registry, DrainerBuilder, DrainerConfig};
use crate::error::DrainError;
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::SubscriberSet;
use crate::works::Work;

/// Drains blocking broker queues into sinks, one task per queue key.
pub struct Drainer {
    cfg: DrainerConfig,
    bus: Bus,
    registry: Arc<Registry>,
    listener: CancellationToken,
}

impl Drainer {
    /// Creates an unconnected drainer without subscribers.
    ///
    /// Must be called within a tokio runtime.
    pub fn new(cfg: DrainerConfig) -> Arc<Self> {
        Self::builder(cfg).build()
    }

    /// Returns a builder for a drainer with subscribers.
    pub fn builder(cfg: DrainerConfig) -> DrainerBuilder {
        DrainerBuilder::new(cfg)
    }

    pub(crate) fn new_internal(cfg: DrainerConfig, bus: Bus, subs: SubscriberSet) -> Self {
        let listener = CancellationToken::new();
        if !subs.is_empty() {
            subscriber_listener(&bus, subs, listener.clone());
        }
        Self {
            registry: Registry::new(bus.clone()),
            cfg,
            bus,
            listener,
        }
    }

    /// Dials a Redis server and installs the connection after a health check.
    ///
    /// On failure the previous connection (if any) stays installed.
    #[cfg(feature = "redis")]
    pub async fn connect(&self, opts: &ConnectOptions) -> Result<(), DrainError> {
        self.ensure_can_install().await?;
        match RedisConnection::open(opts).await {
            Ok(conn) => self.attach(Arc::new(conn)).await,
            Err(e) => {
                warn!(url = %opts.url, error = %e, "connect failed");
                self.bus.publish(
                    Event::new(EventKind::ConnectFailed)
                        .with_endpoint(opts.url.as_str())
                        .with_reason(e.to_string()),
                );
                Err(DrainError::Connect(e))
            }
        }
    }

    /// Health-checks `conn` with a ping and installs it.
    ///
    /// On failure the previous connection (if any) stays installed.
    pub async fn attach(&self, conn: ConnectionRef) -> Result<(), DrainError> {
        self.ensure_can_install().await?;
        if let Err(e) = conn.ping().await {
            warn!(endpoint = conn.endpoint(), error = %e, "health check failed");
            self.bus.publish(
                Event::new(EventKind::ConnectFailed)
                    .with_endpoint(conn.endpoint())
                    .with_reason(e.to_string()),
            );
            return Err(DrainError::Connect(e));
        }
        self.install(conn, EventKind::Connected).await
    }

    /// Installs a caller-supplied connection without a health check.
    pub async fn redirect(&self, conn: ConnectionRef) -> Result<(), DrainError> {
        self.install(conn, EventKind::Redirected).await
    }

    /// Registers `work` and starts draining its queue.
    ///
    /// # Errors
    /// - [`DrainError::Closed`] if the drainer is closed or not yet connected;
    /// - [`DrainError::DuplicateKey`] if a work already drains this key.
    pub async fn drain(&self, work: Work) -> Result<(), DrainError> {
        self.registry.register(work, &self.cfg).await
    }

    /// Stops intake, waits for every work to exit, then disposes the connection.
    ///
    /// Returns [`DrainError::Closed`] when called more than once, or before any
    /// connection was ever installed (the drainer then stays usable).
    pub async fn close(&self) -> Result<(), DrainError> {
        let evicted = self.registry.shutdown().await?;
        info!("drainer closing");
        self.bus.publish(Event::new(EventKind::ShutdownRequested));

        self.registry.wait_idle().await;
        if let Some(conn) = evicted {
            dispose::retire(conn, std::time::Duration::ZERO, &self.bus).await;
        }

        info!("all works stopped");
        self.bus.publish(Event::new(EventKind::AllStopped));
        Ok(())
    }

    /// Sorted keys of the works currently draining.
    pub async fn works(&self) -> Vec<String> {
        self.registry.list().await
    }

    /// Number of works currently draining.
    pub async fn len(&self) -> usize {
        self.registry.len().await
    }

    /// True if no work is draining.
    pub async fn is_empty(&self) -> bool {
        self.registry.len().await == 0
    }

    /// True once [`close`](Self::close) has been called.
    pub async fn is_closed(&self) -> bool {
        self.registry.is_closed().await
    }

    /// True while a connection is installed.
    pub fn is_connected(&self) -> bool {
        self.registry.is_connected()
    }

    /// Subscribes to the lifecycle event stream.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// The configuration this drainer was built with.
    pub fn config(&self) -> &DrainerConfig {
        &self.cfg
    }

    async fn ensure_can_install(&self) -> Result<(), DrainError> {
        if self.registry.is_closed().await {
            return Err(DrainError::Closed);
        }
        if !self.cfg.allow_reconnect && self.registry.is_connected() {
            return Err(DrainError::AlreadyConnected);
        }
        Ok(())
    }

    async fn install(&self, conn: ConnectionRef, kind: EventKind) -> Result<(), DrainError> {
        let endpoint: Arc<str> = Arc::from(conn.endpoint());
        let replaced = self.registry.install(conn, self.cfg.allow_reconnect).await?;

        info!(endpoint = %endpoint, replaced = replaced.is_some(), "connection installed");
        self.bus.publish(Event::new(kind).with_endpoint(Arc::clone(&endpoint)));

        if let Some(old) = replaced {
            let grace = self.cfg.dispose_after(old.io_timeout());
            debug!(
                endpoint = old.endpoint(),
                grace_ms = grace.as_millis() as u64,
                "retiring replaced connection"
            );
            dispose::retire_later(old, grace, self.bus.clone());
        }
        Ok(())
    }
}

impl Drop for Drainer {
    fn drop(&mut self) {
        self.listener.cancel();
    }
}

/// Forwards bus events to the subscriber set until `stop` fires.
///
/// Events already queued on the bus are delivered before stopping.
fn subscriber_listener(bus: &Bus, set: SubscriberSet, stop: CancellationToken) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                res = rx.recv() => match res {
                    Ok(ev) => set.emit(&ev),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "subscriber listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = stop.cancelled() => break,
            }
        }
        set.shutdown().await;
    });
}
