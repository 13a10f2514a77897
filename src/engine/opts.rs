//! Demo run options, layered from defaults, `pipechain.toml` and CLI flags.

use crate::utils::config::DemoDefaults;

/// One demo stage (CLI and `pipechain.toml`). Handlers pass integers through, optionally failing
/// every `fail_every`-th call and sleeping `delay_ms` per call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageOpts {
    pub name: String,
    pub workers: usize,
    pub retries: u32,
    /// Fail every n-th invocation at this stage (to exercise retries). `None` never fails.
    pub fail_every: Option<u64>,
    pub delay_ms: u64,
}

impl StageOpts {
    /// Default stage `stage-<i>` with `workers` workers and the default retry limit.
    pub fn numbered(i: usize, workers: usize) -> Self {
        StageOpts {
            name: format!("stage-{i}"),
            workers,
            retries: DemoDefaults::RETRIES,
            fail_every: None,
            delay_ms: 0,
        }
    }
}

/// Full options for a demo run (CLI flags layered over `pipechain.toml`).
#[derive(Clone, Debug, Default)]
pub struct RunOpts {
    /// Feed integers `0..items`.
    pub items: u64,
    pub stages: Vec<StageOpts>,
    /// Print the final report as JSON instead of text.
    pub json: bool,
    pub verbose: bool,
}
