//! Bounded stage queue plus the pending counter used by the drain protocol.

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::Item;

/// Producer side of a stage queue. Held by the pipeline (head stage), by the upstream stage's
/// workers (forwarding) and by the stage's own workers (requeue).
///
/// `pending` counts items accepted by the stage and not yet finished there: queued plus in-flight.
pub struct StageInlet<T> {
    tx: Sender<Item<T>>,
    pending: Arc<AtomicUsize>,
}

impl<T> Clone for StageInlet<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            pending: Arc::clone(&self.pending),
        }
    }
}

impl<T> StageInlet<T> {
    /// Enqueue an item coming from outside the stage. Blocks while the queue is full.
    /// Returns the item back if the queue is closed.
    pub fn push(&self, item: Item<T>) -> Result<(), Item<T>> {
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.tx.send(item).map_err(|err| {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            err.into_inner()
        })
    }

    /// Put a failed item back on its own stage's queue without blocking. The item stays
    /// pending either way; on `Full` the caller still owns it.
    pub fn requeue(&self, item: Item<T>) -> Result<(), TrySendError<Item<T>>> {
        self.tx.try_send(item)
    }

    /// Mark one pending item as finished at this stage (forwarded, sunk or dropped).
    pub fn finish(&self) {
        self.pending.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Items currently sitting in the queue (excludes in-flight ones).
    pub fn queued(&self) -> usize {
        self.tx.len()
    }

    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(0)
    }
}

/// Inlet and consumer side of a freshly allocated stage queue.
pub struct StageQueue<T> {
    pub inlet: StageInlet<T>,
    pub rx: Receiver<Item<T>>,
}

/// Allocate a stage queue. Capacity equals the worker count, which sets the backpressure threshold.
pub fn create_stage_queue<T>(capacity: usize) -> StageQueue<T> {
    let (tx, rx) = bounded::<Item<T>>(capacity);
    StageQueue {
        inlet: StageInlet {
            tx,
            pending: Arc::new(AtomicUsize::new(0)),
        },
        rx,
    }
}
