//! Structural and lifecycle errors returned by the pipeline API.
//!
//! Handler failures are plain [`anyhow::Error`] values; they never leave the stage that
//! produced them (see [`crate::stage::worker`]).

use thiserror::Error;

/// Errors returned synchronously by [`Stage`](crate::Stage) setters and [`Pipeline`](crate::Pipeline) operations.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Handler missing, worker count missing or zero, or a setter called twice.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Operation not allowed in the pipeline's current state.
    #[error("lifecycle error: {0}")]
    Lifecycle(String),

    /// More done signals than workers were observed while closing a stage.
    #[error("stage {stage}: got {observed} done signals, but only expected {expected}")]
    ShutdownInvariant {
        stage: String,
        expected: usize,
        observed: usize,
    },

    /// A worker terminated without reporting done, or could not be joined.
    #[error("worker thread panicked: {0}")]
    WorkerPanicked(String),

    /// The OS refused to spawn a worker thread.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl PipelineError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        PipelineError::Configuration(msg.into())
    }

    pub(crate) fn lifecycle(msg: impl Into<String>) -> Self {
        PipelineError::Lifecycle(msg.into())
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, PipelineError::Configuration(_))
    }

    pub fn is_lifecycle(&self) -> bool {
        matches!(self, PipelineError::Lifecycle(_))
    }
}

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
