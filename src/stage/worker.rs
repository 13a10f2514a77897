//! Stage workers: pull items, run the handler, forward / requeue / drop, and take part in shutdown.

use crossbeam_channel::{Receiver, RecvTimeoutError, TrySendError, select};
use log::{trace, warn};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::queue::StageInlet;
use super::shutdown::WorkerSignals;
use super::stats::StageCounters;
use crate::error::{PipelineError, Result};
use crate::utils::config::DRAIN_POLL_INTERVAL;
use crate::{DeadLetter, DeadLetterFn, Handler, Item};

/// Everything a worker needs; cloned once per spawned thread.
pub struct WorkerContext<T> {
    pub stage: Arc<str>,
    pub handler: Handler<T>,
    pub retry_limit: u32,
    pub queue_rx: Receiver<Item<T>>,
    /// This stage's own inlet, used for requeue and pending accounting.
    pub own: StageInlet<T>,
    /// Next stage's inlet; `None` for the sink.
    pub next: Option<StageInlet<T>>,
    pub dead_letter: Option<DeadLetterFn<T>>,
    pub counters: Arc<StageCounters>,
}

impl<T> Clone for WorkerContext<T> {
    fn clone(&self) -> Self {
        Self {
            stage: Arc::clone(&self.stage),
            handler: Arc::clone(&self.handler),
            retry_limit: self.retry_limit,
            queue_rx: self.queue_rx.clone(),
            own: self.own.clone(),
            next: self.next.clone(),
            dead_letter: self.dead_letter.clone(),
            counters: Arc::clone(&self.counters),
        }
    }
}

/// Spawn one named worker thread running the stage loop. The worker reports done through
/// `signals` when it terminates.
pub fn spawn_stage_worker<T: Send + 'static>(
    ctx: &WorkerContext<T>,
    signals: WorkerSignals,
    index: usize,
) -> Result<JoinHandle<()>> {
    let ctx = ctx.clone();
    thread::Builder::new()
        .name(format!("{}-{}", ctx.stage, index))
        .spawn(move || stage_worker_loop(ctx, signals))
        .map_err(PipelineError::from)
}

enum Wake<T> {
    Item(Item<T>),
    Stop,
}

/// Wait on either an item or a stop token. After a stop token the worker drains, then reports done.
fn stage_worker_loop<T>(ctx: WorkerContext<T>, signals: WorkerSignals) {
    loop {
        let wake = select! {
            // The queue cannot disconnect while `ctx.own` holds a sender; treat it as a stop.
            recv(ctx.queue_rx) -> msg => msg.map_or(Wake::Stop, Wake::Item),
            recv(signals.stop_rx) -> _ => Wake::Stop,
        };
        match wake {
            Wake::Item(item) => process_item(&ctx, item),
            Wake::Stop => {
                drain(&ctx);
                break;
            }
        }
    }
    trace!("{}: worker {:?} exiting", ctx.stage, thread::current().name());
    signals.done();
}

/// Keep consuming until nothing is pending at this stage. Upstream is already shut down at this
/// point, so only this stage's own requeues can add work.
fn drain<T>(ctx: &WorkerContext<T>) {
    while ctx.own.pending() > 0 {
        match ctx.queue_rx.recv_timeout(DRAIN_POLL_INTERVAL) {
            Ok(item) => process_item(ctx, item),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Run the handler on one item until it is forwarded, sunk, requeued or dropped.
fn process_item<T>(ctx: &WorkerContext<T>, mut item: Item<T>) {
    loop {
        match invoke_handler(&ctx.handler, &item.payload) {
            Ok(output) => {
                ctx.counters.record_processed();
                if let Some(next) = &ctx.next {
                    match next.push(Item::new(output)) {
                        Ok(()) => ctx.counters.record_forwarded(),
                        Err(_) => warn!("{}: next stage queue closed, output lost", ctx.stage),
                    }
                }
                ctx.own.finish();
                return;
            }
            Err(err) => {
                ctx.counters.record_failed();
                item.retry_count += 1;
                if item.retry_count > ctx.retry_limit {
                    exhaust(ctx, item, err);
                    ctx.own.finish();
                    return;
                }
                trace!(
                    "{}: attempt {} failed, retrying: {:#}",
                    ctx.stage, item.retry_count, err
                );
                ctx.counters.record_retried();
                match ctx.own.requeue(item) {
                    Ok(()) => return,
                    // Queue full: every slot is taken, retry here instead of blocking on our own queue.
                    Err(TrySendError::Full(back)) => item = back,
                    Err(TrySendError::Disconnected(back)) => {
                        warn!("{}: own queue closed during retry", ctx.stage);
                        ctx.counters.record_dropped();
                        drop(back);
                        ctx.own.finish();
                        return;
                    }
                }
            }
        }
    }
}

/// Item ran out of attempts: hand it to the dead-letter callback, or drop it silently.
fn exhaust<T>(ctx: &WorkerContext<T>, item: Item<T>, err: anyhow::Error) {
    ctx.counters.record_dropped();
    let Some(dead_letter) = &ctx.dead_letter else {
        trace!(
            "{}: dropping item after {} attempts: {:#}",
            ctx.stage, item.retry_count, err
        );
        return;
    };
    let letter = DeadLetter {
        stage: ctx.stage.to_string(),
        payload: item.payload,
        attempts: item.retry_count,
        error: err,
    };
    if let Err(p) = panic::catch_unwind(AssertUnwindSafe(|| dead_letter(letter))) {
        warn!(
            "{}: dead-letter callback panicked: {}",
            ctx.stage,
            panic_message(p.as_ref())
        );
    }
}

/// Call the handler, turning a panic into an ordinary failure.
fn invoke_handler<T>(handler: &Handler<T>, payload: &T) -> anyhow::Result<T> {
    panic::catch_unwind(AssertUnwindSafe(|| handler(payload))).unwrap_or_else(|p| {
        let msg = panic_message(p.as_ref());
        warn!("handler panicked: {msg}");
        Err(anyhow::anyhow!("handler panicked: {msg}"))
    })
}

fn panic_message(p: &(dyn Any + Send)) -> String {
    if let Some(s) = p.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = p.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic>".to_string()
    }
}
