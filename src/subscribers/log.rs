//! # LogWriter — renders events through `tracing`.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO  drainvisor: connected endpoint=redis://127.0.0.1:6379
//! INFO  drainvisor: work added work=jobs
//! WARN  drainvisor: recovery scheduled work=jobs delay_ms=250 reason=dequeue failed: ...
//! INFO  drainvisor: shutdown requested
//! INFO  drainvisor: all works stopped
//! ```

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let work = e.work.as_deref().unwrap_or("-");
        let endpoint = e.endpoint.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::Connected => info!(seq = e.seq, endpoint, "connected"),
            EventKind::Redirected => info!(seq = e.seq, endpoint, "redirected"),
            EventKind::ConnectFailed => warn!(seq = e.seq, endpoint, reason, "connect failed"),
            EventKind::ConnectionRetired => {
                debug!(seq = e.seq, endpoint, grace_ms = ?e.delay_ms, "connection retired")
            }
            EventKind::WorkAdded => info!(seq = e.seq, work, "work added"),
            EventKind::WorkRejected => warn!(seq = e.seq, work, reason, "work rejected"),
            EventKind::RecoveryScheduled => warn!(
                seq = e.seq,
                work,
                delay_ms = ?e.delay_ms,
                reason,
                "recovery scheduled"
            ),
            EventKind::WorkExited => info!(seq = e.seq, work, "work exited"),
            EventKind::WorkFailed => warn!(seq = e.seq, work, reason, "work failed"),
            EventKind::ShutdownRequested => info!(seq = e.seq, "shutdown requested"),
            EventKind::AllStopped => info!(seq = e.seq, "all works stopped"),
            EventKind::SubscriberOverflow => {
                warn!(seq = e.seq, subscriber = work, reason, "subscriber overflow")
            }
            EventKind::SubscriberPanicked => {
                warn!(seq = e.seq, subscriber = work, reason, "subscriber panicked")
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
