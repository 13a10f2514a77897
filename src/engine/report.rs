//! Final run report: text (colored) or JSON.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use crate::StageStats;

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub items_requested: u64,
    pub items_fed: u64,
    pub interrupted: bool,
    pub elapsed_ms: u128,
    pub stages: Vec<StageStats>,
}

impl RunReport {
    /// Items that made it through the last stage.
    pub fn completed(&self) -> u64 {
        self.stages.last().map(|s| s.processed).unwrap_or(0)
    }

    /// Items dropped anywhere in the chain after exhausting retries.
    pub fn dropped(&self) -> u64 {
        self.stages.iter().map(|s| s.dropped).sum()
    }
}

pub fn print_report(report: &RunReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    let label = format!("[{}]", env!("CARGO_PKG_NAME")).cyan().bold();
    println!(
        "{} fed {}/{} items in {} ms{}",
        label,
        report.items_fed,
        report.items_requested,
        report.elapsed_ms,
        if report.interrupted {
            " (interrupted)".yellow().to_string()
        } else {
            String::new()
        }
    );
    for s in &report.stages {
        println!(
            "  {:<16} workers={:<3} retries={:<3} processed={:<8} failed={:<6} retried={:<6} forwarded={:<8} dropped={}",
            s.name.bold(),
            s.workers,
            s.retry_limit,
            s.processed.to_string().green(),
            s.failed,
            s.retried,
            s.forwarded,
            if s.dropped > 0 {
                s.dropped.to_string().red()
            } else {
                s.dropped.to_string().normal()
            }
        );
    }
    println!(
        "{} completed {} items, dropped {}",
        label,
        report.completed(),
        report.dropped()
    );
    Ok(())
}
