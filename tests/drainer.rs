use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use drainvisor::{
    Connection, ConnectionRef, DrainError, Drainer, DrainerConfig, Event, EventKind,
    MemoryBroker, Sink, SinkError, Subscribe, Work, WorkError,
};

/// Sink recording every accepted byte; fails the next `fail_next` writes.
#[derive(Clone, Default)]
struct Capture {
    out: Arc<Mutex<Vec<u8>>>,
    fail_next: Arc<AtomicUsize>,
    attempts: Arc<AtomicUsize>,
}

impl Capture {
    fn failing(n: usize) -> Self {
        let sink = Self::default();
        sink.fail_next.store(n, Ordering::SeqCst);
        sink
    }

    fn output(&self) -> Vec<u8> {
        self.out.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sink for Capture {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(SinkError::new("sink down"));
        }
        self.out.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
}

fn fast_config() -> DrainerConfig {
    DrainerConfig {
        poll_timeout: Duration::from_millis(25),
        recovery: Duration::from_millis(5),
        dispose_grace: Duration::from_millis(50),
        dispose_margin: Duration::from_millis(10),
        ..DrainerConfig::default()
    }
}

async fn eventually(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(3);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

async fn connected(broker: &MemoryBroker, cfg: DrainerConfig) -> Arc<Drainer> {
    let drainer = Drainer::new(cfg);
    drainer
        .attach(Arc::new(broker.connection("primary")))
        .await
        .unwrap();
    drainer
}

#[tokio::test]
async fn test_payloads_are_written_in_push_order() {
    let broker = MemoryBroker::new();
    let drainer = connected(&broker, fast_config()).await;
    let sink = Capture::default();

    broker.push("jobs", "A").await;
    broker.push("jobs", "B").await;
    drainer.drain(Work::new("jobs", sink.clone())).await.unwrap();
    broker.push("jobs", "C").await;

    eventually("ABC", || sink.output() == b"ABC").await;
    drainer.close().await.unwrap();
    assert_eq!(broker.len("jobs").await, 0);
}

#[tokio::test]
async fn test_drain_requires_connection() {
    let drainer = Drainer::new(fast_config());
    let err = drainer
        .drain(Work::new("jobs", Capture::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, DrainError::Closed));
    assert!(!drainer.is_connected());
}

#[tokio::test]
async fn test_duplicate_key_is_rejected() {
    let broker = MemoryBroker::new();
    let drainer = connected(&broker, fast_config()).await;

    drainer.drain(Work::new("b", Capture::default())).await.unwrap();
    drainer.drain(Work::new("a", Capture::default())).await.unwrap();
    let err = drainer
        .drain(Work::new("a", Capture::default()))
        .await
        .unwrap_err();

    assert!(matches!(err, DrainError::DuplicateKey { ref key } if key == "a"));
    assert_eq!(drainer.works().await, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(drainer.len().await, 2);
    drainer.close().await.unwrap();
}

#[tokio::test]
async fn test_close_is_terminal() {
    let broker = MemoryBroker::new();
    let drainer = connected(&broker, fast_config()).await;
    drainer.drain(Work::new("jobs", Capture::default())).await.unwrap();

    drainer.close().await.unwrap();

    assert!(drainer.is_closed().await);
    assert!(!drainer.is_connected());
    assert!(drainer.is_empty().await);
    assert!(drainer.works().await.is_empty());
    assert!(matches!(
        drainer.drain(Work::new("jobs", Capture::default())).await,
        Err(DrainError::Closed)
    ));
    assert!(matches!(
        drainer.attach(Arc::new(broker.connection("late"))).await,
        Err(DrainError::Closed)
    ));
    assert!(matches!(drainer.close().await, Err(DrainError::Closed)));
}

#[tokio::test]
async fn test_close_before_connect_is_refused() {
    let broker = MemoryBroker::new();
    let drainer = Drainer::new(fast_config());

    assert!(matches!(drainer.close().await, Err(DrainError::Closed)));
    assert!(!drainer.is_closed().await);

    drainer
        .attach(Arc::new(broker.connection("late")))
        .await
        .unwrap();
    drainer.close().await.unwrap();
    assert!(drainer.is_closed().await);
}

#[tokio::test]
async fn test_close_waits_for_every_work() {
    let broker = MemoryBroker::new();
    let cfg = DrainerConfig {
        poll_timeout: Duration::from_millis(200),
        ..fast_config()
    };
    let drainer = connected(&broker, cfg).await;
    let exits = Arc::new(AtomicUsize::new(0));

    for key in ["a", "b", "c"] {
        let exits = exits.clone();
        let work = Work::new(key, Capture::default()).on_exit(move |err| {
            assert!(err.is_none());
            exits.fetch_add(1, Ordering::SeqCst);
        });
        drainer.drain(work).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(20)).await;

    let started = Instant::now();
    drainer.close().await.unwrap();

    assert_eq!(exits.load(Ordering::SeqCst), 3);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_reconnect_moves_pops_without_loss() {
    let broker = MemoryBroker::new();
    let old = Arc::new(broker.connection("old"));
    let new = Arc::new(broker.connection("new"));
    let drainer = Drainer::new(fast_config());
    drainer.attach(old.clone() as ConnectionRef).await.unwrap();

    let sink = Capture::default();
    drainer.drain(Work::new("jobs", sink.clone())).await.unwrap();

    for i in 0..5u8 {
        broker.push("jobs", vec![b'0' + i]).await;
    }
    drainer.attach(new.clone() as ConnectionRef).await.unwrap();
    for i in 5..10u8 {
        broker.push("jobs", vec![b'0' + i]).await;
    }

    eventually("all ten payloads", || sink.output().len() == 10).await;
    assert_eq!(sink.output(), b"0123456789");

    let pops_after_swap = new.pops();
    eventually("pops on new connection", || new.pops() > pops_after_swap).await;
    eventually("old connection retired", || old.is_closed()).await;
    assert!(!new.is_closed());

    drainer.close().await.unwrap();
    assert!(new.is_closed());
}

#[tokio::test]
async fn test_failed_health_check_keeps_current_connection() {
    let broker = MemoryBroker::new();
    let drainer = connected(&broker, fast_config()).await;
    let mut events = drainer.events();

    let bad = Arc::new(broker.connection("bad"));
    bad.set_healthy(false);
    let err = drainer.attach(bad.clone() as ConnectionRef).await.unwrap_err();
    assert!(matches!(err, DrainError::Connect(_)));

    let ev = events.recv().await.unwrap();
    assert_eq!(ev.kind, EventKind::ConnectFailed);
    assert_eq!(ev.endpoint.as_deref(), Some("bad"));

    let sink = Capture::default();
    drainer.drain(Work::new("jobs", sink.clone())).await.unwrap();
    broker.push("jobs", "still-served").await;
    eventually("delivery on primary", || sink.output() == b"still-served").await;
    assert_eq!(bad.pops(), 0);
    drainer.close().await.unwrap();
}

#[tokio::test]
async fn test_redirect_skips_health_check() {
    let broker = MemoryBroker::new();
    let drainer = connected(&broker, fast_config()).await;

    let sink = Capture::default();
    drainer.drain(Work::new("jobs", sink.clone())).await.unwrap();

    let target = Arc::new(broker.connection("target"));
    target.set_healthy(false);
    drainer.redirect(target.clone() as ConnectionRef).await.unwrap();
    assert!(drainer.is_connected());

    eventually("pops on redirected connection", || target.pops() > 0).await;
    broker.push("jobs", "via-target").await;
    eventually("delivery through target", || sink.output() == b"via-target").await;
    drainer.close().await.unwrap();
    assert!(target.is_closed());
}

#[tokio::test]
async fn test_already_connected_when_reconnect_disabled() {
    let broker = MemoryBroker::new();
    let cfg = DrainerConfig {
        allow_reconnect: false,
        ..fast_config()
    };
    let drainer = connected(&broker, cfg).await;

    let err = drainer
        .attach(Arc::new(broker.connection("second")))
        .await
        .unwrap_err();
    assert!(matches!(err, DrainError::AlreadyConnected));
    let err = drainer
        .redirect(Arc::new(broker.connection("third")))
        .await
        .unwrap_err();
    assert!(matches!(err, DrainError::AlreadyConnected));
    drainer.close().await.unwrap();
}

#[tokio::test]
async fn test_failed_writes_deliver_exactly_once() {
    let broker = MemoryBroker::new();
    let drainer = connected(&broker, fast_config()).await;
    let sink = Capture::failing(2);
    let after = Arc::new(AtomicUsize::new(0));
    let errors = Arc::new(AtomicUsize::new(0));

    let (after_hook, error_hook) = (after.clone(), errors.clone());
    let work = Work::new("jobs", sink.clone())
        .after_write(move |_| {
            after_hook.fetch_add(1, Ordering::SeqCst);
        })
        .on_error(move |err| {
            assert!(matches!(err, WorkError::Sink(_)));
            error_hook.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    drainer.drain(work).await.unwrap();
    broker.push("jobs", "payload").await;

    eventually("delivery", || after.load(Ordering::SeqCst) == 1).await;
    assert_eq!(sink.output(), b"payload");
    assert_eq!(sink.attempts.load(Ordering::SeqCst), 3);
    assert_eq!(errors.load(Ordering::SeqCst), 2);
    drainer.close().await.unwrap();
    assert_eq!(after.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_recover_now_retries_without_pause() {
    let broker = MemoryBroker::new();
    let cfg = DrainerConfig {
        recovery: Duration::from_secs(30),
        ..fast_config()
    };
    let drainer = connected(&broker, cfg).await;
    let sink = Capture::failing(5);

    let work = Work::new("jobs", sink.clone()).on_error(|_| Err(WorkError::recover_now()));
    drainer.drain(work).await.unwrap();

    let started = Instant::now();
    broker.push("jobs", "x").await;
    eventually("delivery", || sink.output() == b"x").await;
    assert!(started.elapsed() < Duration::from_secs(2));
    drainer.close().await.unwrap();
}

#[tokio::test]
async fn test_dequeue_errors_are_recovered() {
    let broker = MemoryBroker::new();
    let flaky = Arc::new(broker.connection("flaky"));
    flaky.fail_next_pops(2);
    let drainer = Drainer::new(fast_config());
    drainer.attach(flaky.clone() as ConnectionRef).await.unwrap();

    let errors = Arc::new(AtomicUsize::new(0));
    let error_hook = errors.clone();
    let sink = Capture::default();
    let work = Work::new("jobs", sink.clone()).on_error(move |err| {
        assert!(matches!(err, WorkError::Broker(_)));
        error_hook.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    drainer.drain(work).await.unwrap();
    broker.push("jobs", "after-errors").await;

    eventually("delivery", || sink.output() == b"after-errors").await;
    assert_eq!(errors.load(Ordering::SeqCst), 2);
    drainer.close().await.unwrap();
}

#[tokio::test]
async fn test_terminal_error_removes_work() {
    let broker = MemoryBroker::new();
    let drainer = connected(&broker, fast_config()).await;
    let exit_err = Arc::new(Mutex::new(None));
    let seen = exit_err.clone();

    let work = Work::new("jobs", Capture::failing(1))
        .on_error(|err| Err(WorkError::fatal(err)))
        .on_exit(move |err| {
            *seen.lock().unwrap() = err.map(|e| e.as_label());
        });
    drainer.drain(work).await.unwrap();
    broker.push("jobs", "x").await;

    eventually("exit hook", || exit_err.lock().unwrap().is_some()).await;
    assert_eq!(*exit_err.lock().unwrap(), Some("work_fatal"));

    let deadline = Instant::now() + Duration::from_secs(3);
    while !drainer.is_empty().await {
        assert!(Instant::now() < deadline, "work never deregistered");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    drainer.drain(Work::new("jobs", Capture::default())).await.unwrap();
    drainer.close().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_bounds_failing_writes() {
    let broker = MemoryBroker::new();
    let drainer = connected(&broker, fast_config()).await;
    let sink = Capture::failing(usize::MAX);
    let exit_err = Arc::new(Mutex::new(None));
    let seen = exit_err.clone();

    let work = Work::new("jobs", sink.clone()).on_exit(move |err| {
        *seen.lock().unwrap() = err.map(|e| e.as_label());
    });
    drainer.drain(work).await.unwrap();
    broker.push("jobs", "stuck").await;
    eventually("first attempts", || sink.attempts.load(Ordering::SeqCst) > 1).await;
    let before_close = sink.attempts.load(Ordering::SeqCst);

    tokio::time::timeout(Duration::from_secs(3), drainer.close())
        .await
        .expect("close must not hang on a broken sink")
        .unwrap();
    assert_eq!(*exit_err.lock().unwrap(), Some("work_write_failed"));
    assert!(sink.output().is_empty());
    // failures before close count toward the budget: two more tries at most
    assert!(sink.attempts.load(Ordering::SeqCst) - before_close <= 2);
}

struct Recorder {
    seen: Arc<Mutex<Vec<EventKind>>>,
}

#[async_trait]
impl Subscribe for Recorder {
    async fn on_event(&self, ev: &Event) {
        self.seen.lock().unwrap().push(ev.kind);
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

#[tokio::test]
async fn test_subscribers_observe_lifecycle() {
    let broker = MemoryBroker::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let drainer = Drainer::builder(fast_config())
        .with_subscribers(vec![Arc::new(Recorder { seen: seen.clone() })])
        .build();

    drainer
        .attach(Arc::new(broker.connection("primary")))
        .await
        .unwrap();
    drainer.drain(Work::new("jobs", Capture::default())).await.unwrap();
    drainer.close().await.unwrap();

    eventually("AllStopped", || {
        seen.lock().unwrap().contains(&EventKind::AllStopped)
    })
    .await;
    let kinds = seen.lock().unwrap().clone();
    for expected in [
        EventKind::Connected,
        EventKind::WorkAdded,
        EventKind::ShutdownRequested,
        EventKind::WorkExited,
        EventKind::ConnectionRetired,
    ] {
        assert!(kinds.contains(&expected), "missing {expected:?} in {kinds:?}");
    }
    let pos = |k: EventKind| kinds.iter().position(|x| *x == k).unwrap();
    assert!(pos(EventKind::Connected) < pos(EventKind::WorkAdded));
    assert!(pos(EventKind::WorkExited) < pos(EventKind::AllStopped));
}

#[tokio::test]
async fn test_connection_trait_object_is_usable_directly() {
    let broker = MemoryBroker::new();
    let conn: ConnectionRef = Arc::new(broker.connection("direct"));
    conn.lpush("q", b"one").await.unwrap();
    let reply = conn
        .brpop("q", Duration::from_millis(10))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply.values().collect::<Vec<_>>(), vec![b"one".as_slice()]);
}
