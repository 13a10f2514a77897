//! Public and internal types shared by stages and the pipeline.

use serde::Serialize;
use std::sync::Arc;

/// One unit of work in flight: payload plus the number of failed attempts so far.
#[derive(Clone, Debug)]
pub struct Item<T> {
    pub payload: T,
    pub retry_count: u32,
}

impl<T> Item<T> {
    /// Fresh item (fed or forwarded): no failed attempts yet.
    pub fn new(payload: T) -> Self {
        Item {
            payload,
            retry_count: 0,
        }
    }
}

/// Stage handler. Called concurrently by every worker of the stage, so it must be re-entrant.
///
/// Borrows the payload: on failure the same payload is retried, on success the output
/// becomes the payload of the next stage's item. Handlers receive no context or cancellation
/// token from `feed`: in-flight invocations are never cancelled.
pub type Handler<T> = Arc<dyn Fn(&T) -> anyhow::Result<T> + Send + Sync>;

/// Item that exhausted its retries, handed to the stage's dead-letter callback.
#[derive(Debug)]
pub struct DeadLetter<T> {
    /// Name of the stage that gave up on the item.
    pub stage: String,
    pub payload: T,
    /// Handler invocations made for this item at that stage (`retry_limit + 1`).
    pub attempts: u32,
    /// Error returned by the last attempt.
    pub error: anyhow::Error,
}

/// Callback receiving items that exhausted their retries. Without one they are dropped silently.
pub type DeadLetterFn<T> = Arc<dyn Fn(DeadLetter<T>) + Send + Sync>;

/// Point-in-time counters for one stage. Returned by [`Pipeline::stats`](crate::Pipeline::stats).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StageStats {
    pub name: String,
    pub workers: usize,
    pub retry_limit: u32,
    /// Handler successes.
    pub processed: u64,
    /// Handler failures (errors and caught panics).
    pub failed: u64,
    /// Failed items put back for another attempt.
    pub retried: u64,
    /// Successes enqueued on the next stage.
    pub forwarded: u64,
    /// Items that exhausted their retries.
    pub dropped: u64,
}

impl StageStats {
    /// Total handler invocations at this stage.
    pub fn invocations(&self) -> u64 {
        self.processed + self.failed
    }
}
