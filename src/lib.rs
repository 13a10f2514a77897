//! Pipechain: in-process staged worker pipeline with bounded queues, per-stage retries and
//! coordinated graceful shutdown.
//!
//! A [`Pipeline`] owns a chain of [`Stage`]s. Each stage has a bounded queue (capacity = worker
//! count) and a pool of worker threads running its handler. Successful outputs move to the next
//! stage; the last stage is a sink. Failed items are retried up to the stage's retry limit, then
//! dropped (or handed to a dead-letter callback).
//!
//! ```ignore
//! let pipeline = Pipeline::new();
//! pipeline.append(Stage::with_handler("double", 2, |x: &u64| Ok(x * 2))?)?;
//! pipeline.append(Stage::with_handler("sink", 2, |x: &u64| Ok(*x))?)?;
//! pipeline.open()?;
//! for i in 0..10 {
//!     pipeline.feed(i)?;
//! }
//! pipeline.close()?;
//! ```

pub mod engine;
pub mod error;
pub mod pipeline;
pub mod stage;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use error::{PipelineError, Result};
pub use pipeline::Pipeline;
pub use stage::Stage;
pub use types::*;
