//! # Example: drain_and_reconnect
//!
//! One work drains an in-process queue to stdout while the drainer swaps its
//! broker connection underneath it.
//!
//! Demonstrates how to:
//! - Attach a [`MemoryConnection`] and start a [`Work`] over a [`WriterSink`].
//! - Hot-swap the connection with `attach` without losing payloads.
//! - Watch the old connection being retired, then `close` the drainer.
//!
//! ## Flow
//! ```text
//! Drainer::attach(primary)
//!     ├─► publish(Connected)
//!     └─► Drainer::drain(Work "jobs")
//!          └─► brpop(primary) ─► stdout ─► after_write
//! Drainer::attach(standby)
//!     ├─► publish(Connected)
//!     ├─► brpop(standby) ─► stdout ─► after_write
//!     └─► after io_timeout + margin: publish(ConnectionRetired "primary")
//! Drainer::close()
//!     ├─► publish(ShutdownRequested)
//!     ├─► work exits, publish(WorkExited)
//!     └─► publish(ConnectionRetired "standby"), publish(AllStopped)
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example drain_and_reconnect
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use drainvisor::{Drainer, DrainerConfig, EventKind, MemoryBroker, Work, WriterSink};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Short poll and disposal windows keep the demo snappy
    let cfg = DrainerConfig {
        poll_timeout: Duration::from_millis(100),
        dispose_margin: Duration::from_millis(50),
        ..DrainerConfig::default()
    };
    let drainer = Drainer::new(cfg);
    let mut events = drainer.events();

    // 2. One in-process broker, two connections to it
    let broker = MemoryBroker::new();
    let primary = broker
        .connection("primary")
        .with_io_timeout(Duration::from_millis(100));
    let standby = broker.connection("standby");
    drainer.attach(Arc::new(primary)).await?;

    // 3. Drain "jobs" to stdout, counting delivered payloads
    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = delivered.clone();
    let work = Work::new("jobs", WriterSink::new(tokio::io::stdout())).after_write(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    drainer.drain(work).await?;

    // 4. Produce, reconnect mid-stream, produce again
    for i in 1..=3 {
        broker.push("jobs", format!("before reconnect #{i}\n")).await;
    }
    drainer.attach(Arc::new(standby)).await?;
    for i in 1..=3 {
        broker.push("jobs", format!("after reconnect #{i}\n")).await;
    }

    // 5. Wait for every payload and for the primary to be retired
    while delivered.load(Ordering::SeqCst) < 6 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    loop {
        let ev = events.recv().await?;
        if ev.kind == EventKind::ConnectionRetired {
            println!("[demo] retired {:?}", ev.endpoint);
            break;
        }
    }

    // 6. Close: waits for the work to exit, then disposes the standby
    drainer.close().await?;
    println!("[demo] closed after {} payloads", delivered.load(Ordering::SeqCst));
    Ok(())
}
