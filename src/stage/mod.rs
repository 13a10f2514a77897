//! Stage configuration and the stage engine: queue, workers, shutdown handshake, counters.

pub mod queue;
pub mod shutdown;
pub mod stats;
pub mod worker;

pub use queue::{StageInlet, StageQueue, create_stage_queue};
pub use shutdown::{ShutdownSignals, WorkerSignals};
pub use stats::StageCounters;
pub use worker::{WorkerContext, spawn_stage_worker};

use std::fmt;
use std::sync::Arc;

use crate::error::{PipelineError, Result};
use crate::{DeadLetter, DeadLetterFn, Handler};

/// A pipeline step before it is appended: name, handler, worker count, retry limit.
///
/// Each setter may be called once. Handler and worker count are required by
/// [`Pipeline::append`](crate::Pipeline::append); the retry limit defaults to 0.
pub struct Stage<T> {
    name: String,
    handler: Option<Handler<T>>,
    worker_count: Option<usize>,
    retry_limit: Option<u32>,
    dead_letter: Option<DeadLetterFn<T>>,
}

/// Validated stage settings, consumed when the stage is linked into a chain.
pub(crate) struct StageConfig<T> {
    pub name: String,
    pub handler: Handler<T>,
    pub worker_count: usize,
    pub retry_limit: u32,
    pub dead_letter: Option<DeadLetterFn<T>>,
}

impl<T: Send + 'static> Stage<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handler: None,
            worker_count: None,
            retry_limit: None,
            dead_letter: None,
        }
    }

    /// Shorthand for `new` + `set_worker_count` + `set_handler`.
    pub fn with_handler<F>(name: impl Into<String>, worker_count: usize, handler: F) -> Result<Self>
    where
        F: Fn(&T) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let mut stage = Self::new(name);
        stage.set_worker_count(worker_count)?;
        stage.set_handler(handler)?;
        Ok(stage)
    }

    pub fn set_handler<F>(&mut self, handler: F) -> Result<()>
    where
        F: Fn(&T) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        if self.handler.is_some() {
            return Err(PipelineError::config(format!(
                "stage {}: handler already set",
                self.name
            )));
        }
        self.handler = Some(Arc::new(handler));
        Ok(())
    }

    pub fn set_worker_count(&mut self, workers: usize) -> Result<()> {
        if self.worker_count.is_some() {
            return Err(PipelineError::config(format!(
                "stage {}: worker count already set",
                self.name
            )));
        }
        if workers < 1 {
            return Err(PipelineError::config(format!(
                "stage {}: worker count must be at least 1",
                self.name
            )));
        }
        self.worker_count = Some(workers);
        Ok(())
    }

    pub fn set_retry_limit(&mut self, retries: u32) -> Result<()> {
        if self.retry_limit.is_some() {
            return Err(PipelineError::config(format!(
                "stage {}: retry limit already set",
                self.name
            )));
        }
        self.retry_limit = Some(retries);
        Ok(())
    }

    /// Receive items that exhaust their retries instead of dropping them silently.
    /// Called from worker threads; a panic in the callback is logged and ignored.
    pub fn set_dead_letter<F>(&mut self, callback: F) -> Result<()>
    where
        F: Fn(DeadLetter<T>) + Send + Sync + 'static,
    {
        if self.dead_letter.is_some() {
            return Err(PipelineError::config(format!(
                "stage {}: dead-letter callback already set",
                self.name
            )));
        }
        self.dead_letter = Some(Arc::new(callback));
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn worker_count(&self) -> Option<usize> {
        self.worker_count
    }

    pub fn retry_limit(&self) -> u32 {
        self.retry_limit.unwrap_or(0)
    }

    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    /// Check required settings. Fails with a configuration error if handler or worker count is missing.
    pub(crate) fn into_config(self) -> Result<StageConfig<T>> {
        let Some(handler) = self.handler else {
            return Err(PipelineError::config(format!(
                "stage {}: handler required",
                self.name
            )));
        };
        let worker_count = match self.worker_count {
            Some(n) if n >= 1 => n,
            _ => {
                return Err(PipelineError::config(format!(
                    "stage {}: worker count required",
                    self.name
                )));
            }
        };
        Ok(StageConfig {
            name: self.name,
            handler,
            worker_count,
            retry_limit: self.retry_limit.unwrap_or(0),
            dead_letter: self.dead_letter,
        })
    }
}

impl<T> fmt::Debug for Stage<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("handler", &self.handler.is_some())
            .field("worker_count", &self.worker_count)
            .field("retry_limit", &self.retry_limit)
            .field("dead_letter", &self.dead_letter.is_some())
            .finish()
    }
}
