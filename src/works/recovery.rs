//! # Recovery policy.
//!
//! Decides, for one error, whether the work pauses and retries or stops.
//!
//! ```text
//! error ──► on_error set? ──no──► warn!, pause = recovery
//!                │
//!               yes ──► on_error(err)
//!                         ├─ Ok(())                    ─► pause = recovery
//!                         ├─ Err(Recover { sleep })    ─► pause = sleep (0 = none)
//!                         └─ Err(other)                ─► terminal
//! ```

use std::time::Duration;

use tracing::warn;

use super::work::OnError;
use crate::error::WorkError;

/// Per-work recovery settings.
#[derive(Clone)]
pub(crate) struct Recovery {
    hook: Option<OnError>,
    pause: Duration,
}

impl Recovery {
    /// `pause` is the work override when set and non-zero, else `fallback`.
    pub(crate) fn new(hook: Option<OnError>, over: Option<Duration>, fallback: Duration) -> Self {
        let pause = over.filter(|d| !d.is_zero()).unwrap_or(fallback);
        Self { hook, pause }
    }

    /// Returns the pause before retrying, or the terminal error.
    pub(crate) fn decide(&self, key: &str, err: WorkError) -> Result<Duration, WorkError> {
        let Some(hook) = &self.hook else {
            warn!(work = key, error = %err, "work error, retrying");
            return Ok(self.pause);
        };
        match hook(err) {
            Ok(()) => Ok(self.pause),
            Err(WorkError::Recover { sleep }) => Ok(sleep),
            Err(terminal) => Err(terminal),
        }
    }

    /// The default pause.
    #[cfg(test)]
    pub(crate) fn pause(&self) -> Duration {
        self.pause
    }
}
