//! CLI command handler: build the demo pipeline, feed, close, report.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use super::demo::build_demo_pipeline;
use super::opts::{RunOpts, StageOpts};
use super::progress::{ProgressBar, create_progress_bar, finish_progress, report_progress_batched};
use super::report::{RunReport, print_report};
use crate::engine::arg_parser::Cli;
use crate::utils::config::{DemoDefaults, PROGRESS_UPDATE_BATCH_SIZE, PackagePaths, WorkerLimits};
use crate::utils::{
    PipechainToml, apply_file_to_opts, file_verbose, find_pipechain_toml, load_pipechain_toml,
    setup_logging,
};
use crate::Pipeline;

/// Explicit config path: `--config`, else `$PIPECHAIN_CONFIG`.
fn config_path(cli: &Cli) -> Option<PathBuf> {
    cli.config.clone().or_else(|| {
        std::env::var(PackagePaths::get().config_env_var())
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
    })
}

fn load_config(cli: &Cli) -> Result<Option<PipechainToml>> {
    match config_path(cli) {
        Some(path) => load_pipechain_toml(&path).map(Some),
        None => find_pipechain_toml(Path::new(".")),
    }
}

fn default_opts() -> RunOpts {
    RunOpts {
        items: DemoDefaults::ITEMS,
        stages: (0..DemoDefaults::STAGES)
            .map(|i| StageOpts::numbered(i, DemoDefaults::WORKERS))
            .collect(),
        json: false,
        verbose: false,
    }
}

/// Layer CLI flags over `opts` (defaults + file). Per-stage flags apply to every stage.
pub fn apply_cli_to_opts(cli: &Cli, opts: &mut RunOpts) {
    if let Some(items) = cli.items {
        opts.items = items;
    }
    if let Some(n) = cli.stages {
        let workers = WorkerLimits::current().default_workers(n);
        opts.stages = (0..n).map(|i| StageOpts::numbered(i, workers)).collect();
    }
    for stage in &mut opts.stages {
        if let Some(w) = cli.workers {
            stage.workers = w;
        }
        if let Some(r) = cli.retries {
            stage.retries = r;
        }
        if cli.fail_every.is_some() {
            stage.fail_every = cli.fail_every;
        }
        if let Some(d) = cli.delay_ms {
            stage.delay_ms = d;
        }
    }
    if let Some(json) = cli.json {
        opts.json = json;
    }
    if let Some(verbose) = cli.verbose {
        opts.verbose = verbose;
    }
}

/// Defaults → config file → CLI flags. Also initializes logging.
fn setup_opts(cli: &Cli) -> Result<RunOpts> {
    let file = load_config(cli)?;
    let verbose = cli
        .verbose
        .or_else(|| file.as_ref().and_then(file_verbose))
        .unwrap_or(false);
    setup_logging(verbose);

    let mut opts = default_opts();
    if let Some(ref file) = file {
        debug!("Loaded {} stage(s) from config file", file.stage_count());
        apply_file_to_opts(file, &mut opts);
    }
    apply_cli_to_opts(cli, &mut opts);
    debug!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_uppercase(),
        opts
    );
    Ok(opts)
}

/// Feed `0..items` until done or `interrupted` is set. Returns the number of items fed.
fn feed_items(
    pipeline: &Pipeline<u64>,
    items: u64,
    interrupted: &AtomicBool,
    pb: Option<&ProgressBar>,
) -> Result<u64> {
    let mut fed = 0_u64;
    for i in 0..items {
        if interrupted.load(Ordering::SeqCst) {
            break;
        }
        pipeline.feed(i).context("feed item")?;
        fed += 1;
        report_progress_batched(pb, fed, PROGRESS_UPDATE_BATCH_SIZE);
    }
    finish_progress(pb, fed, PROGRESS_UPDATE_BATCH_SIZE);
    Ok(fed)
}

/// Run the demo: open, feed (Ctrl-C stops feeding early), close, print report.
pub fn handle_run(cli: &Cli) -> Result<()> {
    let opts = setup_opts(cli)?;
    let pipeline = build_demo_pipeline(&opts)?;

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = Arc::clone(&interrupted);
        ctrlc::set_handler(move || interrupted.store(true, Ordering::SeqCst))
            .context("install Ctrl-C handler")?;
    }

    let start = Instant::now();
    pipeline.open()?;
    info!(
        "Pipeline open: {} stage(s), feeding {} items",
        pipeline.len(),
        opts.items
    );

    let pb = (!opts.json && !opts.verbose && opts.items >= PROGRESS_UPDATE_BATCH_SIZE)
        .then(|| create_progress_bar(opts.items, "Feeding"));
    let fed = feed_items(&pipeline, opts.items, &interrupted, pb.as_ref())?;
    let was_interrupted = interrupted.load(Ordering::SeqCst);
    if was_interrupted {
        warn!("Interrupted after {fed} items; draining and closing");
    }

    pipeline.close().context("close pipeline")?;
    let report = RunReport {
        items_requested: opts.items,
        items_fed: fed,
        interrupted: was_interrupted,
        elapsed_ms: start.elapsed().as_millis(),
        stages: pipeline.stats(),
    };
    print_report(&report, opts.json)
}
