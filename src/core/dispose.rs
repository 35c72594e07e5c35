//! Deferred disposal of replaced connections.
//!
//! A connection evicted by a reconnect may still be serving a blocking pop
//! that a work loaded just before the swap. It is closed only after a grace
//! period long enough for that call to finish (see
//! [`DrainerConfig::dispose_after`](crate::DrainerConfig::dispose_after)).

use std::time::Duration;

use tracing::debug;

use crate::broker::ConnectionRef;
use crate::events::{Bus, Event, EventKind};

/// Spawns a task that closes `conn` after `grace`.
pub(crate) fn retire_later(conn: ConnectionRef, grace: Duration, bus: Bus) {
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        retire(conn, grace, &bus).await;
    });
}

/// Closes `conn` now and reports it.
pub(crate) async fn retire(conn: ConnectionRef, grace: Duration, bus: &Bus) {
    conn.close().await;
    debug!(
        endpoint = conn.endpoint(),
        grace_ms = grace.as_millis() as u64,
        "connection retired"
    );
    bus.publish(
        Event::new(EventKind::ConnectionRetired)
            .with_endpoint(conn.endpoint())
            .with_delay(grace),
    );
}
