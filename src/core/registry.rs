//! # Work registry: the drainer's mutable runtime state.
//!
//! The registry owns:
//! - the shared [`ConnectionHandle`];
//! - the set of live work keys;
//! - a [`TaskTracker`] with one task per work;
//! - the terminal `closed` flag.
//!
//! ## Architecture
//! ```text
//! register(work) ─┐                       ┌─► tracker.spawn(runner.run())
//!                 ├─► lock state ─────────┤          │
//! install(conn) ──┤   (closed? dup key?)  │          ▼ exit (clean/error/panic)
//! shutdown() ─────┘                       │   deregister(key) ─► WorkExited / WorkFailed
//!                                         └─► handle.swap(..)
//! wait_idle() ─► tracker.wait()  (returns once every runner has deregistered)
//! ```
//!
//! ## Rules
//! - The state lock is taken only for registration, deregistration, install and
//!   the close transition; never across broker or sink I/O.
//! - Spawning happens under the lock, so a work is never spawned after `shutdown`.
//! - A runner removes its own key before its tracked task completes.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Mutex;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::broker::{ConnectionHandle, ConnectionRef};
use crate::core::DrainerConfig;
use crate::error::{DrainError, WorkError};
use crate::events::{Bus, Event, EventKind};
use crate::works::{Work, WorkRunner};

struct State {
    works: HashSet<Arc<str>>,
    closed: bool,
    ever_connected: bool,
}

/// Registry of live works bound to one connection handle.
pub(crate) struct Registry {
    state: Mutex<State>,
    handle: Arc<ConnectionHandle>,
    tracker: TaskTracker,
    bus: Bus,
}

impl Registry {
    /// Creates an empty, unconnected registry.
    pub(crate) fn new(bus: Bus) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                works: HashSet::new(),
                closed: false,
                ever_connected: false,
            }),
            handle: Arc::new(ConnectionHandle::new()),
            tracker: TaskTracker::new(),
            bus,
        })
    }

    /// Installs `conn`, returning the connection it replaced.
    pub(crate) async fn install(
        &self,
        conn: ConnectionRef,
        allow_reconnect: bool,
    ) -> Result<Option<ConnectionRef>, DrainError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(DrainError::Closed);
        }
        if !allow_reconnect && !self.handle.is_closed() {
            return Err(DrainError::AlreadyConnected);
        }
        state.ever_connected = true;
        Ok(self.handle.swap(Some(conn)))
    }

    /// Registers `work` and spawns its runner.
    pub(crate) async fn register(
        self: &Arc<Self>,
        work: Work,
        cfg: &DrainerConfig,
    ) -> Result<(), DrainError> {
        let key = Arc::clone(&work.key);
        let mut state = self.state.lock().await;

        let refused = if state.closed || self.handle.is_closed() {
            Some(DrainError::Closed)
        } else if state.works.contains(&key) {
            Some(DrainError::DuplicateKey {
                key: key.to_string(),
            })
        } else {
            None
        };
        if let Some(err) = refused {
            drop(state);
            self.bus.publish(
                Event::new(EventKind::WorkRejected)
                    .with_work(key)
                    .with_reason(err.as_label()),
            );
            return Err(err);
        }

        state.works.insert(Arc::clone(&key));
        let on_exit = work.hooks.on_exit.clone();
        let runner = WorkRunner::new(work, Arc::clone(&self.handle), cfg, self.bus.clone());
        let me = Arc::clone(self);
        let task_key = Arc::clone(&key);
        self.tracker.spawn(async move {
            let outcome = AssertUnwindSafe(runner.run()).catch_unwind().await;
            let err = match outcome {
                Ok(err) => err,
                Err(_panic) => {
                    let err = WorkError::fatal("work_panicked");
                    warn!(work = %task_key, "work panicked");
                    if let Some(on_exit) = &on_exit {
                        // a panicking exit hook must not skip deregistration
                        let _ = panic::catch_unwind(AssertUnwindSafe(|| on_exit(Some(&err))));
                    }
                    Some(err)
                }
            };
            me.deregister(&task_key, err.as_ref()).await;
        });
        drop(state);

        debug!(work = %key, "work registered");
        self.bus.publish(Event::new(EventKind::WorkAdded).with_work(key));
        Ok(())
    }

    /// Removes a finished work and reports how it ended.
    async fn deregister(&self, key: &Arc<str>, err: Option<&WorkError>) {
        self.state.lock().await.works.remove(key);

        let ev = match err {
            None => Event::new(EventKind::WorkExited),
            Some(e) => Event::new(EventKind::WorkFailed).with_reason(e.to_string()),
        };
        self.bus.publish(ev.with_work(Arc::clone(key)));
    }

    /// Marks the registry closed and empties the handle.
    ///
    /// Returns the evicted connection, or [`DrainError::Closed`] if already
    /// closed or never connected. A never-connected registry stays open.
    pub(crate) async fn shutdown(&self) -> Result<Option<ConnectionRef>, DrainError> {
        let mut state = self.state.lock().await;
        if state.closed || !state.ever_connected {
            return Err(DrainError::Closed);
        }
        state.closed = true;
        self.tracker.close();
        Ok(self.handle.swap(None))
    }

    /// Waits until every spawned runner has exited and deregistered.
    pub(crate) async fn wait_idle(&self) {
        self.tracker.wait().await;
    }

    /// Returns sorted list of live work keys.
    pub(crate) async fn list(&self) -> Vec<String> {
        let state = self.state.lock().await;
        let mut keys: Vec<String> = state.works.iter().map(|k| k.to_string()).collect();
        keys.sort_unstable();
        keys
    }

    /// Number of live works.
    pub(crate) async fn len(&self) -> usize {
        self.state.lock().await.works.len()
    }

    /// True once `shutdown` has run.
    pub(crate) async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    /// True while a connection is installed.
    pub(crate) fn is_connected(&self) -> bool {
        !self.handle.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::MemoryBroker;
    use crate::sinks::WriterSink;
    use std::time::Duration;

    fn fast_config() -> DrainerConfig {
        DrainerConfig {
            poll_timeout: Duration::from_millis(20),
            ..DrainerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_register_requires_connection() {
        let registry = Registry::new(Bus::new(8));
        let err = registry
            .register(Work::new("q", WriterSink::new(Vec::new())), &fast_config())
            .await
            .unwrap_err();
        assert!(matches!(err, DrainError::Closed));
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test]
    async fn test_install_respects_reconnect_flag() {
        let broker = MemoryBroker::new();
        let registry = Registry::new(Bus::new(8));

        let first = registry
            .install(Arc::new(broker.connection("a")), false)
            .await
            .unwrap();
        assert!(first.is_none());
        assert!(registry.is_connected());

        let second = registry
            .install(Arc::new(broker.connection("b")), false)
            .await;
        assert!(matches!(second, Err(DrainError::AlreadyConnected)));

        let prev = registry
            .install(Arc::new(broker.connection("c")), true)
            .await
            .unwrap();
        assert_eq!(prev.map(|c| c.endpoint().to_string()).as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_shutdown_evicts_and_waits() {
        let broker = MemoryBroker::new();
        let registry = Registry::new(Bus::new(8));
        registry
            .install(Arc::new(broker.connection("a")), true)
            .await
            .unwrap();
        registry
            .register(Work::new("q", WriterSink::new(Vec::new())), &fast_config())
            .await
            .unwrap();
        assert_eq!(registry.list().await, vec!["q".to_string()]);

        let evicted = registry.shutdown().await.unwrap();
        assert!(evicted.is_some());
        registry.wait_idle().await;

        assert_eq!(registry.len().await, 0);
        assert!(registry.is_closed().await);
        assert!(matches!(registry.shutdown().await, Err(DrainError::Closed)));
    }

    #[tokio::test]
    async fn test_shutdown_requires_prior_connection() {
        let broker = MemoryBroker::new();
        let registry = Registry::new(Bus::new(8));

        assert!(matches!(registry.shutdown().await, Err(DrainError::Closed)));
        assert!(!registry.is_closed().await);

        registry
            .install(Arc::new(broker.connection("late")), true)
            .await
            .unwrap();
        assert!(matches!(registry.shutdown().await, Ok(Some(_))));
        registry.wait_idle().await;
    }

    struct PanickingSink;

    #[async_trait::async_trait]
    impl crate::sinks::Sink for PanickingSink {
        async fn write(&mut self, _buf: &[u8]) -> Result<usize, crate::error::SinkError> {
            panic!("sink exploded");
        }
    }

    #[tokio::test]
    async fn test_panicking_work_still_reports_exit() {
        let broker = MemoryBroker::new();
        let registry = Registry::new(Bus::new(8));
        registry
            .install(Arc::new(broker.connection("a")), true)
            .await
            .unwrap();

        let exit = Arc::new(std::sync::Mutex::new(None));
        let seen = exit.clone();
        let work = Work::new("q", PanickingSink).on_exit(move |err| {
            *seen.lock().unwrap() = err.map(ToString::to_string);
        });
        registry.register(work, &fast_config()).await.unwrap();
        broker.push("q", "boom").await;

        let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
        while registry.len().await > 0 {
            assert!(tokio::time::Instant::now() < deadline, "work never deregistered");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(
            exit.lock().unwrap().as_deref(),
            Some("fatal error: work_panicked")
        );
        registry.shutdown().await.unwrap();
        registry.wait_idle().await;
    }
}
