//! Per-stage atomic counters, shared between a stage's workers and the pipeline.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::StageStats;

/// Counters for one stage. Updated by workers with relaxed ordering; read via [`StageCounters::snapshot`].
#[derive(Debug)]
pub struct StageCounters {
    name: String,
    workers: usize,
    retry_limit: u32,
    processed: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
    forwarded: AtomicU64,
    dropped: AtomicU64,
}

impl StageCounters {
    pub fn new(name: &str, workers: usize, retry_limit: u32) -> Self {
        Self {
            name: name.to_string(),
            workers,
            retry_limit,
            processed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            retried: AtomicU64::new(0),
            forwarded: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retried(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forwarded(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StageStats {
        StageStats {
            name: self.name.clone(),
            workers: self.workers,
            retry_limit: self.retry_limit,
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}
