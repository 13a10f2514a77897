//! Demo pipeline over `u64` items, built from [`RunOpts`].

use anyhow::{Result, bail};
use log::{debug, trace, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::opts::{RunOpts, StageOpts};
use crate::{DeadLetter, Pipeline, Stage};

/// Build (but do not open) a pipeline with one stage per `opts.stages` entry.
/// Items that exhaust their retries are logged as warnings.
pub fn build_demo_pipeline(opts: &RunOpts) -> Result<Pipeline<u64>> {
    if opts.stages.is_empty() {
        bail!("at least one stage is required");
    }
    let pipeline = Pipeline::new();
    let last = opts.stages.len() - 1;
    for (i, s) in opts.stages.iter().enumerate() {
        let mut stage = Stage::new(s.name.clone());
        stage.set_worker_count(s.workers)?;
        stage.set_retry_limit(s.retries)?;
        stage.set_handler(demo_handler(s, i == last))?;
        stage.set_dead_letter(|letter: DeadLetter<u64>| {
            warn!(
                "{}: gave up on item {} after {} attempts: {:#}",
                letter.stage, letter.payload, letter.attempts, letter.error
            );
        })?;
        pipeline.append(stage)?;
    }
    Ok(pipeline)
}

/// Pass-through handler. Fails every `fail_every`-th call (counted per stage, across workers).
pub fn demo_handler(
    s: &StageOpts,
    is_sink: bool,
) -> impl Fn(&u64) -> Result<u64> + Send + Sync + 'static {
    let name = s.name.clone();
    let fail_every = s.fail_every.filter(|n| *n > 0);
    let delay = Duration::from_millis(s.delay_ms);
    let calls = AtomicU64::new(0);
    move |item: &u64| {
        let call = calls.fetch_add(1, Ordering::Relaxed) + 1;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        if let Some(n) = fail_every
            && call.is_multiple_of(n)
        {
            bail!("injected failure on call {call} (item {item})");
        }
        if is_sink {
            debug!("{name}: {item}");
        } else {
            trace!("{name}: {item}");
        }
        Ok(*item)
    }
}
