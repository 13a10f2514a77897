//! Stage chain as an arena: slots indexed by position, each holding the index of its successor.

use crossbeam_channel::Receiver;
use log::{debug, warn};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::error::{PipelineError, Result};
use crate::stage::{
    ShutdownSignals, StageConfig, StageCounters, StageInlet, WorkerContext, create_stage_queue,
    spawn_stage_worker,
};
use crate::{DeadLetterFn, Handler, Item};

/// Index of a stage in its chain.
pub type StageId = usize;

/// Per-stage lifecycle: `Configured -> Opening -> Running -> Draining -> Closed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageStatus {
    Configured,
    /// Workers are being spawned.
    Opening,
    Running,
    /// Stop tokens sent; workers finish pending items and report done.
    Draining,
    Closed,
}

/// A linked stage: settings plus the queue, signals and workers allocated for it.
pub struct StageSlot<T> {
    name: Arc<str>,
    handler: Handler<T>,
    worker_count: usize,
    retry_limit: u32,
    dead_letter: Option<DeadLetterFn<T>>,
    /// `None` once closed; dropping it (with all worker clones gone) disconnects the queue.
    inlet: Option<StageInlet<T>>,
    rx: Receiver<Item<T>>,
    signals: ShutdownSignals,
    counters: Arc<StageCounters>,
    next: Option<StageId>,
    workers: Vec<JoinHandle<()>>,
    status: StageStatus,
}

impl<T> StageSlot<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn next(&self) -> Option<StageId> {
        self.next
    }

    pub fn status(&self) -> StageStatus {
        self.status
    }

    pub fn live_workers(&self) -> usize {
        self.workers.len()
    }
}

/// Ordered stages owned by one pipeline. Head is slot 0.
pub struct Chain<T> {
    slots: Vec<StageSlot<T>>,
}

impl<T> Default for Chain<T> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<T: Send + 'static> Chain<T> {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, id: StageId) -> Option<&StageSlot<T>> {
        self.slots.get(id)
    }

    /// Allocate queue and signal channels for `config` and link it as the new tail.
    pub(crate) fn append(&mut self, config: StageConfig<T>) -> Arc<StageCounters> {
        let id = self.slots.len();
        let queue = create_stage_queue(config.worker_count);
        let counters = Arc::new(StageCounters::new(
            &config.name,
            config.worker_count,
            config.retry_limit,
        ));
        self.slots.push(StageSlot {
            name: Arc::from(config.name.as_str()),
            handler: config.handler,
            worker_count: config.worker_count,
            retry_limit: config.retry_limit,
            dead_letter: config.dead_letter,
            inlet: Some(queue.inlet),
            rx: queue.rx,
            signals: ShutdownSignals::new(config.worker_count),
            counters: Arc::clone(&counters),
            next: None,
            workers: Vec::new(),
            status: StageStatus::Configured,
        });
        if id > 0 {
            self.link(0, id);
        }
        counters
    }

    /// Walk from `from` to the current tail and point it at `to`. A set successor is never replaced.
    fn link(&mut self, from: StageId, to: StageId) {
        match self.slots[from].next {
            Some(next) => self.link(next, to),
            None => self.slots[from].next = Some(to),
        }
    }

    /// Stage ids in chain order, head first.
    pub fn order(&self) -> Vec<StageId> {
        let mut order = Vec::with_capacity(self.slots.len());
        let mut cursor = if self.slots.is_empty() { None } else { Some(0) };
        while let Some(id) = cursor {
            order.push(id);
            cursor = self.slots[id].next;
        }
        order
    }

    /// Status of every stage, in chain order.
    pub fn statuses(&self) -> Vec<StageStatus> {
        self.order().into_iter().map(|id| self.slots[id].status).collect()
    }

    pub fn head_inlet(&self) -> Option<StageInlet<T>> {
        self.slots.first().and_then(|slot| slot.inlet.clone())
    }

    /// Spawn workers for every stage, tail first, so each stage's consumer is live before its
    /// producers start. On failure, whatever was started is shut down again.
    pub fn open(&mut self) -> Result<()> {
        for &id in self.order().iter().rev() {
            if let Err(err) = self.open_stage(id) {
                warn!("open failed at stage {}: {}", self.slots[id].name, err);
                let _ = self.close();
                return Err(err);
            }
        }
        Ok(())
    }

    fn open_stage(&mut self, id: StageId) -> Result<()> {
        let next = self.slots[id]
            .next
            .and_then(|next| self.slots[next].inlet.clone());
        let slot = &mut self.slots[id];
        let Some(own) = slot.inlet.clone() else {
            return Err(PipelineError::lifecycle(format!(
                "stage {}: queue already closed",
                slot.name
            )));
        };
        let ctx = WorkerContext {
            stage: Arc::clone(&slot.name),
            handler: Arc::clone(&slot.handler),
            retry_limit: slot.retry_limit,
            queue_rx: slot.rx.clone(),
            own,
            next,
            dead_letter: slot.dead_letter.clone(),
            counters: Arc::clone(&slot.counters),
        };

        slot.status = StageStatus::Opening;
        for index in 0..slot.worker_count {
            let Some(signals) = slot.signals.worker_signals() else {
                break;
            };
            match spawn_stage_worker(&ctx, signals, index) {
                Ok(handle) => slot.workers.push(handle),
                Err(err) => {
                    slot.signals.seal();
                    return Err(err);
                }
            }
        }
        slot.signals.seal();
        slot.status = StageStatus::Running;
        debug!(
            "{}: opened with {} workers (retry limit {})",
            slot.name,
            slot.workers.len(),
            slot.retry_limit
        );
        Ok(())
    }

    /// Drain and stop every stage head to tail. Each stage is fully stopped before the next one
    /// begins closing. All stages are closed even if one reports an error; the first error wins.
    pub fn close(&mut self) -> Result<()> {
        let mut first_err = None;
        for id in self.order() {
            if let Err(err) = self.close_stage(id) {
                warn!("close: {}", err);
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn close_stage(&mut self, id: StageId) -> Result<()> {
        let slot = &mut self.slots[id];
        // A stage that failed while opening may have some workers; stop those too.
        if slot.workers.is_empty() {
            slot.inlet = None;
            slot.status = StageStatus::Closed;
            return Ok(());
        }

        slot.status = StageStatus::Draining;
        let mut result = slot.signals.stop_and_wait(&slot.name, slot.workers.len());
        for handle in slot.workers.drain(..) {
            if handle.join().is_err() && result.is_ok() {
                result = Err(PipelineError::WorkerPanicked(format!(
                    "stage {}: worker could not be joined",
                    slot.name
                )));
            }
        }
        slot.inlet = None;
        slot.status = StageStatus::Closed;

        let leftover = slot.rx.len();
        if leftover > 0 {
            warn!("{}: closed with {} items still queued", slot.name, leftover);
        }
        debug!("{}: closed", slot.name);
        result
    }
}
