//! Pipeline facade: chain construction, open/feed/close lifecycle, stats.

pub mod chain;
pub mod state;

pub use chain::{Chain, StageId, StageSlot, StageStatus};
pub use state::PipelineState;

use log::{debug, error};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread;

use crate::error::{PipelineError, Result};
use crate::stage::{Stage, StageCounters};
use crate::utils::config::DRAIN_POLL_INTERVAL;
use crate::{Item, StageStats};

/// A chain of stages, each with its own worker pool, fed from the head and drained on close.
///
/// All methods take `&self`, so a pipeline can be shared (e.g. in an `Arc`) between feeding
/// threads and the thread that closes it. Required order: `append`* → `open` → `feed`* → `close`.
pub struct Pipeline<T: Send + 'static> {
    state: RwLock<PipelineState<T>>,
    chain: Mutex<Chain<T>>,
    counters: RwLock<Vec<Arc<StageCounters>>>,
    /// Feeds that passed the state check and may still be pushing to the head queue.
    feeding: AtomicUsize,
}

/// Counts one feed as in flight until dropped.
struct FeedGuard<'a>(&'a AtomicUsize);

impl<'a> FeedGuard<'a> {
    fn enter(feeding: &'a AtomicUsize) -> Self {
        feeding.fetch_add(1, Ordering::SeqCst);
        Self(feeding)
    }
}

impl Drop for FeedGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<T: Send + 'static> Default for Pipeline<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Pipeline<T> {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(PipelineState::Unopened),
            chain: Mutex::new(Chain::default()),
            counters: RwLock::new(Vec::new()),
            feeding: AtomicUsize::new(0),
        }
    }

    /// Link `stage` as the new tail. Only allowed before [`open`](Self::open); a rejected stage
    /// leaves the chain untouched.
    pub fn append(&self, stage: Stage<T>) -> Result<()> {
        let state = self.write_state();
        if !matches!(*state, PipelineState::Unopened) {
            return Err(PipelineError::lifecycle(format!(
                "cannot append stage {}: pipeline already {}",
                stage.name(),
                state.label()
            )));
        }
        let config = stage.into_config()?;
        let name = config.name.clone();
        let counters = self.lock_chain().append(config);
        self.counters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(counters);
        debug!("appended stage {name}");
        Ok(())
    }

    /// Start every stage's workers, tail first. Once this returns `Ok`, each stage has exactly
    /// its configured number of live workers.
    pub fn open(&self) -> Result<()> {
        let mut state = self.write_state();
        match *state {
            PipelineState::Unopened => {}
            PipelineState::Open(_) | PipelineState::Closing => {
                return Err(PipelineError::lifecycle("pipeline already opened"));
            }
            PipelineState::Closed => {
                return Err(PipelineError::lifecycle(
                    "pipeline already closed and cannot be reopened",
                ));
            }
        }

        let mut chain = self.lock_chain();
        let Some(head) = chain.head_inlet() else {
            return Err(PipelineError::lifecycle(
                "must append a stage to the pipeline",
            ));
        };
        if let Err(err) = chain.open() {
            *state = PipelineState::Closed;
            return Err(err);
        }
        *state = PipelineState::Open(head);
        debug!("pipeline opened with {} stages", chain.len());
        Ok(())
    }

    /// Enqueue `payload` on the head stage. Blocks while the head queue is full; returns once
    /// the item is queued, not once it is processed.
    ///
    /// The state lock is released before the push, so a blocked feed never holds up
    /// [`opened`](Self::opened) or the start of [`close`](Self::close).
    pub fn feed(&self, payload: T) -> Result<()> {
        let (head, _in_flight) = {
            let state = self.read_state();
            let PipelineState::Open(head) = &*state else {
                return Err(PipelineError::lifecycle(format!(
                    "pipeline not opened ({})",
                    state.label()
                )));
            };
            (head.clone(), FeedGuard::enter(&self.feeding))
        };
        head.push(Item::new(payload))
            .map_err(|_| PipelineError::lifecycle("head stage queue closed"))
    }

    /// Stop accepting feeds, then drain and stop each stage head to tail. Blocks until every
    /// worker has terminated. No timeout: a stage whose items keep failing and retrying holds
    /// close until they succeed or run out of attempts.
    pub fn close(&self) -> Result<()> {
        {
            let mut state = self.write_state();
            match std::mem::replace(&mut *state, PipelineState::Closing) {
                PipelineState::Open(head) => drop(head),
                other => {
                    let label = other.label();
                    *state = other;
                    return Err(PipelineError::lifecycle(format!(
                        "pipeline not opened ({label})"
                    )));
                }
            }
        }
        self.wait_for_feeds();
        debug!("closing pipeline");
        let result = self.lock_chain().close();
        *self.write_state() = PipelineState::Closed;
        debug!("pipeline closed");
        result
    }

    /// Whether workers are live (open, or close still in progress).
    pub fn opened(&self) -> bool {
        self.read_state().opened()
    }

    /// Number of appended stages.
    pub fn len(&self) -> usize {
        self.counters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counter snapshot for every stage, in chain order.
    pub fn stats(&self) -> Vec<StageStats> {
        self.counters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|c| c.snapshot())
            .collect()
    }

    /// Wait until feeds admitted before `Closing` have pushed their item. Workers are still
    /// running at this point, so a feed blocked on a full head queue always gets through.
    /// Lifecycle status of every stage, in chain order. Waits while open or close is running.
    pub fn stage_statuses(&self) -> Vec<StageStatus> {
        self.lock_chain().statuses()
    }

    fn wait_for_feeds(&self) {
        while self.feeding.load(Ordering::SeqCst) > 0 {
            thread::sleep(DRAIN_POLL_INTERVAL);
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, PipelineState<T>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, PipelineState<T>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_chain(&self) -> MutexGuard<'_, Chain<T>> {
        self.chain.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Send + 'static> Drop for Pipeline<T> {
    fn drop(&mut self) {
        let open = matches!(
            *self.state.get_mut().unwrap_or_else(PoisonError::into_inner),
            PipelineState::Open(_)
        );
        if open && let Err(err) = self.close() {
            error!("closing pipeline on drop: {err}");
        }
    }
}
