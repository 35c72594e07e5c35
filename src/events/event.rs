//! # Lifecycle events emitted by the drainer and its works.
//!
//! [`EventKind`] groups events into:
//! - **Connection events**: connect, redirect, failed health checks, disposal
//! - **Work events**: registration, recovery pauses, exit
//! - **Shutdown events**: close requested, every work stopped
//! - **Subscriber events**: overflow and panic isolation
//!
//! ## Ordering guarantees
//! Each event has a globally unique, monotonically increasing `seq`.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use drainvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::RecoveryScheduled)
//!     .with_work("jobs")
//!     .with_reason("broker unavailable")
//!     .with_delay(Duration::from_millis(250));
//!
//! assert_eq!(ev.work.as_deref(), Some("jobs"));
//! assert_eq!(ev.delay_ms, Some(250));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Connection events ===
    /// A connection passed its health check and was installed.
    ///
    /// Sets: `endpoint`
    Connected,

    /// Building or health-checking a connection failed; the previous one stays.
    ///
    /// Sets: `endpoint` (when known), `reason`
    ConnectFailed,

    /// A caller-supplied connection was installed without a health check.
    ///
    /// Sets: `endpoint`
    Redirected,

    /// A replaced connection was disposed after its grace period.
    ///
    /// Sets: `endpoint`, `delay_ms` (grace that elapsed)
    ConnectionRetired,

    // === Work events ===
    /// A work was registered and its loop spawned.
    ///
    /// Sets: `work`
    WorkAdded,

    /// Registration was refused.
    ///
    /// Sets: `work`, `reason` (error label)
    WorkRejected,

    /// A work handled an error and will pause before retrying.
    ///
    /// Sets: `work`, `reason`, `delay_ms`
    RecoveryScheduled,

    /// A work observed the closed handle and exited cleanly.
    ///
    /// Sets: `work`
    WorkExited,

    /// A work stopped on a terminal error.
    ///
    /// Sets: `work`, `reason`
    WorkFailed,

    // === Shutdown events ===
    /// Close was called; intake stopped and the handle emptied.
    ShutdownRequested,

    /// Every work has exited after close.
    AllStopped,

    // === Subscriber events ===
    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `work` (subscriber name), `reason`
    SubscriberOverflow,

    /// Subscriber panicked during event processing.
    ///
    /// Sets: `work` (subscriber name), `reason`
    SubscriberPanicked,
}

/// Lifecycle event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Queue key of the work, if applicable.
    pub work: Option<Arc<str>>,
    /// Broker endpoint, if applicable.
    pub endpoint: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Pause or grace in milliseconds (compact).
    pub delay_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            work: None,
            endpoint: None,
            reason: None,
            delay_ms: None,
        }
    }

    /// Attaches a work key.
    #[inline]
    pub fn with_work(mut self, work: impl Into<Arc<str>>) -> Self {
        self.work = Some(work.into());
        self
    }

    /// Attaches a broker endpoint.
    #[inline]
    pub fn with_endpoint(mut self, endpoint: impl Into<Arc<str>>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a delay (stored as milliseconds, saturating).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_work(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_work(subscriber)
            .with_reason(info)
    }

    /// True for events the subscriber machinery emits about itself.
    #[inline]
    pub fn is_subscriber_event(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}
