//! Pipechain CLI: run a demo pipeline over integers and report per-stage counters.

use anyhow::Result;
use clap::Parser;
use pipechain::engine::arg_parser::Cli;
use pipechain::engine::handle_run;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    // Optional .env so RUST_LOG / PIPECHAIN_CONFIG can live next to the config.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
