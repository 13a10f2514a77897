//! Pipeline lifecycle and end-to-end flow through chained stages.

use pipechain::{Pipeline, PipelineError, Stage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::thread;
use std::time::Duration;

/// Stage whose handler passes the item through and counts calls in `counter`.
fn counting_stage(name: &str, workers: usize, counter: &Arc<AtomicUsize>) -> Stage<u64> {
    let counter = Arc::clone(counter);
    Stage::with_handler(name, workers, move |x: &u64| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(*x)
    })
    .unwrap()
}

// --- lifecycle ---

#[test]
fn test_opened_transitions() {
    let pl = Pipeline::new();
    let calls = Arc::new(AtomicUsize::new(0));
    pl.append(counting_stage("only", 1, &calls)).unwrap();

    assert!(!pl.opened());
    pl.open().unwrap();
    assert!(pl.opened());
    pl.close().unwrap();
    assert!(!pl.opened());
}

#[test]
fn test_open_empty_chain_fails() {
    let pl: Pipeline<u64> = Pipeline::new();
    let err = pl.open().unwrap_err();
    assert!(err.is_lifecycle());
    assert!(!pl.opened());
}

#[test]
fn test_feed_before_open_fails() {
    let pl = Pipeline::new();
    let calls = Arc::new(AtomicUsize::new(0));
    pl.append(counting_stage("only", 1, &calls)).unwrap();
    assert!(pl.feed(1).unwrap_err().is_lifecycle());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_close_before_open_fails() {
    let pl = Pipeline::new();
    let calls = Arc::new(AtomicUsize::new(0));
    pl.append(counting_stage("only", 1, &calls)).unwrap();
    assert!(pl.close().unwrap_err().is_lifecycle());
}

#[test]
fn test_close_empty_pipeline_fails() {
    let pl: Pipeline<u64> = Pipeline::new();
    assert!(pl.close().unwrap_err().is_lifecycle());
}

#[test]
fn test_open_twice_fails() {
    let pl = Pipeline::new();
    let calls = Arc::new(AtomicUsize::new(0));
    pl.append(counting_stage("only", 1, &calls)).unwrap();
    pl.open().unwrap();
    assert!(pl.open().unwrap_err().is_lifecycle());
    assert!(pl.opened());
    pl.close().unwrap();
}

#[test]
fn test_append_after_open_fails_and_chain_unchanged() {
    let pl = Pipeline::new();
    let calls = Arc::new(AtomicUsize::new(0));
    pl.append(counting_stage("first", 1, &calls)).unwrap();
    pl.open().unwrap();

    let late = Arc::new(AtomicUsize::new(0));
    let err = pl.append(counting_stage("late", 1, &late)).unwrap_err();
    assert!(err.is_lifecycle());
    assert_eq!(pl.len(), 1);

    for i in 0..5 {
        pl.feed(i).unwrap();
    }
    pl.close().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert_eq!(late.load(Ordering::SeqCst), 0);
}

#[test]
fn test_closed_pipeline_rejects_everything() {
    let pl = Pipeline::new();
    let calls = Arc::new(AtomicUsize::new(0));
    pl.append(counting_stage("only", 1, &calls)).unwrap();
    pl.open().unwrap();
    pl.close().unwrap();

    assert!(pl.feed(1).unwrap_err().is_lifecycle());
    assert!(pl.close().unwrap_err().is_lifecycle());
    assert!(pl.open().unwrap_err().is_lifecycle());
    let other = Arc::new(AtomicUsize::new(0));
    assert!(
        pl.append(counting_stage("again", 1, &other))
            .unwrap_err()
            .is_lifecycle()
    );
    assert!(!pl.opened());
}

#[test]
fn test_append_lifecycle_checked_before_configuration() {
    let pl = Pipeline::new();
    let calls = Arc::new(AtomicUsize::new(0));
    pl.append(counting_stage("only", 1, &calls)).unwrap();
    pl.open().unwrap();
    let err = pl.append(Stage::<u64>::new("unconfigured")).unwrap_err();
    assert!(matches!(err, PipelineError::Lifecycle(_)));
    pl.close().unwrap();
}

// --- flow ---

#[test]
fn test_every_item_passes_every_stage_once() {
    let stages = 5;
    let items = 1_000_u64;
    let calls = Arc::new(AtomicUsize::new(0));

    let pl = Pipeline::new();
    for s in 0..stages {
        pl.append(counting_stage(&format!("s{s}"), 2, &calls)).unwrap();
    }
    pl.open().unwrap();
    for i in 0..items {
        pl.feed(i).unwrap();
    }
    pl.close().unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), items as usize * stages);
    for stats in pl.stats() {
        assert_eq!(stats.processed, items);
        assert_eq!(stats.failed, 0);
    }
}

#[test]
fn test_two_stage_example_scenario() {
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));
    let pl: Pipeline<Option<u64>> = Pipeline::new();

    let mut head = Stage::new("handler0");
    {
        let first = Arc::clone(&first);
        head.set_handler(move |x: &Option<u64>| {
            first.fetch_add(1, Ordering::SeqCst);
            Ok(*x)
        })
        .unwrap();
    }
    head.set_worker_count(2).unwrap();
    head.set_retry_limit(0).unwrap();

    let mut sink = Stage::new("handler1");
    {
        let second = Arc::clone(&second);
        sink.set_handler(move |_: &Option<u64>| {
            second.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        })
        .unwrap();
    }
    sink.set_worker_count(2).unwrap();
    sink.set_retry_limit(0).unwrap();

    pl.append(head).unwrap();
    pl.append(sink).unwrap();
    pl.open().unwrap();
    for i in 0..10 {
        pl.feed(Some(i)).unwrap();
    }
    pl.close().unwrap();

    assert!(!pl.opened());
    assert_eq!(first.load(Ordering::SeqCst), 10);
    assert_eq!(second.load(Ordering::SeqCst), 10);
}

#[test]
fn test_outputs_are_forwarded_downstream() {
    let seen = Arc::new(Mutex::new(Vec::new()));

    let pl = Pipeline::new();
    pl.append(Stage::with_handler("double", 3, |x: &u64| Ok(x * 2)).unwrap())
        .unwrap();
    pl.append(Stage::with_handler("add_one", 2, |x: &u64| Ok(x + 1)).unwrap())
        .unwrap();
    {
        let seen = Arc::clone(&seen);
        pl.append(
            Stage::with_handler("collect", 1, move |x: &u64| {
                seen.lock().unwrap().push(*x);
                Ok(*x)
            })
            .unwrap(),
        )
        .unwrap();
    }
    pl.open().unwrap();
    for i in 0..50 {
        pl.feed(i).unwrap();
    }
    pl.close().unwrap();

    let mut got = seen.lock().unwrap().clone();
    got.sort_unstable();
    let expected: Vec<u64> = (0..50).map(|i| i * 2 + 1).collect();
    assert_eq!(got, expected);

    let stats = pl.stats();
    assert_eq!(stats[0].forwarded, 50);
    assert_eq!(stats[1].forwarded, 50);
    assert_eq!(stats[2].forwarded, 0);
}

#[test]
fn test_no_invocations_after_close() {
    let calls = Arc::new(AtomicUsize::new(0));
    let pl = Pipeline::new();
    {
        let calls = Arc::clone(&calls);
        pl.append(
            Stage::with_handler("slow", 2, move |x: &u64| {
                thread::sleep(Duration::from_millis(1));
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(*x)
            })
            .unwrap(),
        )
        .unwrap();
    }
    pl.append(counting_stage("sink", 2, &Arc::new(AtomicUsize::new(0))))
        .unwrap();
    pl.open().unwrap();
    for i in 0..40 {
        pl.feed(i).unwrap();
    }
    pl.close().unwrap();

    let after_close = calls.load(Ordering::SeqCst);
    assert_eq!(after_close, 40);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(calls.load(Ordering::SeqCst), after_close);
}

#[test]
fn test_concurrent_feeders() {
    let calls = Arc::new(AtomicUsize::new(0));
    let pl = Pipeline::new();
    pl.append(counting_stage("a", 3, &calls)).unwrap();
    pl.append(counting_stage("b", 2, &calls)).unwrap();
    pl.open().unwrap();

    thread::scope(|s| {
        for t in 0..4_u64 {
            let pl = &pl;
            s.spawn(move || {
                for i in 0..250 {
                    pl.feed(t * 1_000 + i).unwrap();
                }
            });
        }
    });
    pl.close().unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2_000);
}

#[test]
fn test_drop_closes_open_pipeline() {
    let calls = Arc::new(AtomicUsize::new(0));
    {
        let pl = Pipeline::new();
        pl.append(counting_stage("a", 2, &calls)).unwrap();
        pl.append(counting_stage("b", 2, &calls)).unwrap();
        pl.open().unwrap();
        for i in 0..20 {
            pl.feed(i).unwrap();
        }
    }
    assert_eq!(calls.load(Ordering::SeqCst), 40);
}

// --- backpressure ---

#[test]
fn test_feed_blocks_when_head_queue_full() {
    let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(0);
    let pl = Pipeline::new();
    pl.append(
        Stage::with_handler("gated", 1, move |x: &u64| {
            let _ = gate_rx.recv();
            Ok(*x)
        })
        .unwrap(),
    )
    .unwrap();
    pl.open().unwrap();

    let fed = AtomicUsize::new(0);
    thread::scope(|s| {
        s.spawn(|| {
            for i in 0..3 {
                pl.feed(i).unwrap();
                fed.fetch_add(1, Ordering::SeqCst);
            }
        });
        // One item held by the worker, one in the queue (capacity = 1 worker), third blocked.
        thread::sleep(Duration::from_millis(200));
        let fed_while_gated = fed.load(Ordering::SeqCst);
        drop(gate_tx);
        assert_eq!(fed_while_gated, 2);
    });
    assert_eq!(fed.load(Ordering::SeqCst), 3);
    pl.close().unwrap();
    assert_eq!(pl.stats()[0].processed, 3);
}

#[test]
fn test_close_with_blocked_feed_and_opened_from_handler() {
    // The handler queries the pipeline it runs in while a feeder is blocked on the full head queue.
    let this: Arc<OnceLock<Weak<Pipeline<u64>>>> = Arc::new(OnceLock::new());
    let pl = Arc::new(Pipeline::new());
    {
        let this = Arc::clone(&this);
        pl.append(
            Stage::with_handler("checks-opened", 1, move |x: &u64| {
                thread::sleep(Duration::from_millis(20));
                let _ = this.get().and_then(Weak::upgrade).map(|p| p.opened());
                Ok(*x)
            })
            .unwrap(),
        )
        .unwrap();
    }
    let _ = this.set(Arc::downgrade(&pl));
    pl.open().unwrap();

    let fed = Arc::new(AtomicUsize::new(0));
    let feeder = {
        let pl = Arc::clone(&pl);
        let fed = Arc::clone(&fed);
        thread::spawn(move || {
            for i in 0..20 {
                if pl.feed(i).is_err() {
                    break;
                }
                fed.fetch_add(1, Ordering::SeqCst);
            }
        })
    };

    thread::sleep(Duration::from_millis(10));
    let (closed_tx, closed_rx) = crossbeam_channel::bounded(1);
    {
        let pl = Arc::clone(&pl);
        thread::spawn(move || {
            let _ = closed_tx.send(pl.close());
        });
    }
    let closed = closed_rx.recv_timeout(Duration::from_secs(5));
    assert!(matches!(closed, Ok(Ok(()))), "close did not finish: {closed:?}");

    feeder.join().unwrap();
    assert!(!pl.opened());
    // Every accepted feed was drained before the head stage stopped.
    assert_eq!(pl.stats()[0].processed, fed.load(Ordering::SeqCst) as u64);
}

#[test]
fn test_stage_statuses_follow_lifecycle() {
    use pipechain::pipeline::StageStatus;

    let pl = Pipeline::new();
    let calls = Arc::new(AtomicUsize::new(0));
    pl.append(counting_stage("a", 1, &calls)).unwrap();
    pl.append(counting_stage("b", 2, &calls)).unwrap();
    assert_eq!(pl.stage_statuses(), vec![StageStatus::Configured; 2]);

    pl.open().unwrap();
    assert_eq!(pl.stage_statuses(), vec![StageStatus::Running; 2]);

    pl.close().unwrap();
    assert_eq!(pl.stage_statuses(), vec![StageStatus::Closed; 2]);
}
