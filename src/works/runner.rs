//! # WorkRunner: the consumption loop of one work.
//!
//! ## Architecture
//! ```text
//! loop {
//!   ├─► conn = handle.get()            (None ─► clean exit)
//!   ├─► conn.brpop(key, poll_timeout)
//!   │     ├─ Ok(None)  ─► continue      (nothing within the wait)
//!   │     ├─ Err(e)    ─► recover(e)    (pause, or stop on terminal)
//!   │     └─ Ok(reply) ─► for value in reply.values():
//!   │                        ├─ before_write(value) == false ─► skip
//!   │                        ├─ write until fully accepted
//!   │                        │     └─ failure ─► recover(e); once closing, give up
//!   │                        │                   when the payload has failed
//!   │                        │                   `shutdown_write_attempts` times
//!   │                        └─ after_write(value)
//! }
//! exit: flush sink (clean exit only) ─► on_exit(err)
//! ```
//!
//! ## Rules
//! - The connection is loaded **once per iteration**; a swap takes effect at the
//!   next pop while the current pop finishes on the old connection.
//! - Values are written in reply order; a payload is never written twice once
//!   fully accepted.
//! - Closing never interrupts an in-flight pop or write.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use super::recovery::Recovery;
use super::work::{Hooks, Work};
use crate::broker::ConnectionHandle;
use crate::core::DrainerConfig;
use crate::error::{SinkError, WorkError};
use crate::events::{Bus, Event, EventKind};
use crate::sinks::Sink;

/// Loop parameters taken from [`DrainerConfig`] when a work is registered.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RunnerParams {
    /// Bounded wait of each pop.
    pub poll_timeout: Duration,
    /// Failed writes of one payload after which a closing work gives up.
    pub shutdown_write_attempts: u32,
}

impl RunnerParams {
    pub(crate) fn from_config(cfg: &DrainerConfig) -> Self {
        Self {
            poll_timeout: cfg.poll_timeout,
            shutdown_write_attempts: cfg.shutdown_write_attempts_clamped(),
        }
    }
}

/// Drives one [`Work`] against the shared connection handle.
pub(crate) struct WorkRunner {
    key: Arc<str>,
    sink: Box<dyn Sink>,
    hooks: Hooks,
    recovery: Recovery,
    handle: Arc<ConnectionHandle>,
    params: RunnerParams,
    bus: Bus,
}

impl WorkRunner {
    pub(crate) fn new(
        work: Work,
        handle: Arc<ConnectionHandle>,
        cfg: &DrainerConfig,
        bus: Bus,
    ) -> Self {
        let Work {
            key,
            sink,
            hooks,
            recovery,
        } = work;
        let recovery = Recovery::new(hooks.on_error.clone(), recovery, cfg.recovery);

        Self {
            key,
            sink,
            hooks,
            recovery,
            handle,
            params: RunnerParams::from_config(cfg),
            bus,
        }
    }

    /// Runs until the handle closes or a terminal error, then fires `on_exit`.
    ///
    /// Returns the terminal error, `None` on clean shutdown.
    pub(crate) async fn run(mut self) -> Option<WorkError> {
        let err = match self.serve().await {
            Ok(()) => self.sink.flush().await.err().map(WorkError::Sink),
            Err(e) => Some(e),
        };
        if let Some(e) = &err {
            warn!(work = %self.key, error = %e, "work exited with error");
        }
        if let Some(on_exit) = &self.hooks.on_exit {
            on_exit(err.as_ref());
        }
        err
    }

    async fn serve(&mut self) -> Result<(), WorkError> {
        loop {
            let Some(conn) = self.handle.get() else {
                return Ok(());
            };
            let reply = match conn.brpop(&self.key, self.params.poll_timeout).await {
                Ok(Some(reply)) => reply,
                Ok(None) => continue,
                Err(e) => {
                    drop(conn);
                    self.recover(WorkError::Broker(e)).await?;
                    continue;
                }
            };
            drop(conn);

            for value in reply.values() {
                self.deliver(value).await?;
            }
        }
    }

    /// Writes one payload through the hooks, retrying from the unwritten offset.
    async fn deliver(&mut self, payload: &[u8]) -> Result<(), WorkError> {
        if let Some(before_write) = &self.hooks.before_write {
            if !before_write(payload) {
                return Ok(());
            }
        }

        let mut written = 0;
        let mut failures = 0;
        loop {
            let rest = &payload[written..];
            let failure = match self.sink.write(rest).await {
                Ok(n) if n >= rest.len() => break,
                Ok(0) => SinkError::new("sink accepted no bytes"),
                Ok(n) => {
                    written += n;
                    continue;
                }
                Err(e) => {
                    written += e.accepted.min(rest.len());
                    e
                }
            };

            // every failure of this payload counts, including those before close
            failures += 1;
            if self.handle.is_closed() && failures >= self.params.shutdown_write_attempts {
                return Err(WorkError::Sink(failure));
            }
            self.recover(WorkError::Sink(failure)).await?;
        }

        if let Some(after_write) = &self.hooks.after_write {
            after_write(payload);
        }
        Ok(())
    }

    /// Applies the recovery policy and sleeps the chosen pause.
    async fn recover(&mut self, err: WorkError) -> Result<(), WorkError> {
        let reason = err.to_string();
        let pause = self.recovery.decide(&self.key, err)?;

        self.bus.publish(
            Event::new(EventKind::RecoveryScheduled)
                .with_work(Arc::clone(&self.key))
                .with_reason(reason)
                .with_delay(pause),
        );
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
        Ok(())
    }
}
