//! # Atomically swappable connection reference.
//!
//! [`ConnectionHandle`] is shared by every work of a drainer. Works load it once
//! per dequeue; the drainer swaps it on connect/redirect and empties it on close.
//!
//! ## Rules
//! - `get` and `swap` never take a lock.
//! - `None` is the closed sentinel: a work that loads it exits.
//! - A swapped-out connection may still be in use by a work that loaded it
//!   just before the swap; the caller disposes of it after a grace period.

use std::sync::Arc;

use arc_swap::ArcSwapOption;

use super::ConnectionRef;

/// Lock-free cell holding the active connection, or nothing once closed.
pub struct ConnectionHandle {
    current: ArcSwapOption<ConnectionRef>,
}

impl ConnectionHandle {
    /// Creates a closed handle.
    pub fn new() -> Self {
        Self {
            current: ArcSwapOption::empty(),
        }
    }

    /// Returns the current connection, or `None` if closed.
    pub fn get(&self) -> Option<ConnectionRef> {
        self.current.load_full().map(|c| Arc::clone(&*c))
    }

    /// Installs `next` and returns the connection it replaced.
    pub fn swap(&self, next: Option<ConnectionRef>) -> Option<ConnectionRef> {
        self.current
            .swap(next.map(Arc::new))
            .map(|prev| Arc::clone(&*prev))
    }

    /// True if no connection is installed.
    pub fn is_closed(&self) -> bool {
        self.current.load().is_none()
    }
}

impl Default for ConnectionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let endpoint = self.get().map(|c| c.endpoint().to_string());
        f.debug_struct("ConnectionHandle")
            .field("endpoint", &endpoint)
            .finish()
    }
}
