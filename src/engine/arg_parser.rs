use clap::Parser;
use std::path::PathBuf;

/// Run a demo pipeline over integers and report per-stage counters.
#[derive(Clone, Parser)]
#[command(name = "pipechain")]
#[command(about = "Feed integers through a chain of worker-pool stages, then close and report.")]
pub struct Cli {
    /// Config file. Default: `pipechain.toml` in the working directory, or $PIPECHAIN_CONFIG.
    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Number of items to feed (integers 0..N).
    #[arg(long, short = 'n')]
    pub items: Option<u64>,

    /// Number of stages. Replaces the stage list from the config file.
    #[arg(long, short = 's')]
    pub stages: Option<usize>,

    /// Workers per stage (applies to every stage).
    #[arg(long, short = 'w')]
    pub workers: Option<usize>,

    /// Retry limit per stage (applies to every stage).
    #[arg(long, short = 'r')]
    pub retries: Option<u32>,

    /// Inject a handler failure every N-th call at each stage.
    #[arg(long, value_name = "N")]
    pub fail_every: Option<u64>,

    /// Sleep this many milliseconds in every handler call (makes backpressure visible).
    #[arg(long, value_name = "MS")]
    pub delay_ms: Option<u64>,

    /// Print the final report as JSON.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub json: Option<bool>,

    /// Verbose output.
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,
}
