//! Application configuration constants.
//! Tuning and defaults in one place.

use std::sync::OnceLock;
use std::time::Duration;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    config_filename: String,
    env_prefix: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                config_filename: format!("{pkg}.toml"),
                env_prefix: pkg.to_uppercase(),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    /// Config file looked up in the working directory when `--config` is not given.
    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }

    /// Environment variable holding an explicit config path (e.g. `PIPECHAIN_CONFIG`).
    pub fn config_env_var(&self) -> String {
        format!("{}_CONFIG", self.env_prefix)
    }
}

// ---- Worker threads ----

/// Worker count limits for stages that don't set one (CLI only; the library always requires it).
/// Use [`WorkerLimits::current()`] to fill `all_threads` from rayon; the rest are const.
#[derive(Clone, Copy, Debug)]
pub struct WorkerLimits {
    /// Available threads (from rayon); set by [`WorkerLimits::current()`].
    pub all_threads: usize,
    /// Upper bound for a default per-stage worker count.
    pub default_max: usize,
    /// Lower bound for a default per-stage worker count.
    pub floor: usize,
}

impl Default for WorkerLimits {
    fn default() -> Self {
        Self {
            all_threads: 0, // use current() to set from rayon
            default_max: Self::DEFAULT_MAX_WORKERS,
            floor: Self::FLOOR_WORKERS,
        }
    }
}

impl WorkerLimits {
    pub const DEFAULT_MAX_WORKERS: usize = 8;
    pub const FLOOR_WORKERS: usize = 1;

    /// Build limits with `all_threads` set from `rayon::current_num_threads()`.
    pub fn current() -> Self {
        Self {
            all_threads: rayon::current_num_threads(),
            ..Self::default()
        }
    }

    /// Default workers per stage: available threads split across stages, clamped to [floor, max].
    pub fn default_workers(&self, stages: usize) -> usize {
        (self.all_threads / stages.max(1)).clamp(self.floor, self.default_max)
    }
}

// ---- Shutdown ----

/// How long a stopping worker waits on an empty queue before re-checking the pending count.
pub const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

// ---- Demo run defaults: 2 stages x 2 workers, 10 items ----

pub struct DemoDefaults;

impl DemoDefaults {
    pub const ITEMS: u64 = 10;
    pub const STAGES: usize = 2;
    pub const WORKERS: usize = 2;
    pub const RETRIES: u32 = 0;
}

// ---- Progress ----

/// Feed progress bar is updated every this many items (reduce lock contention).
pub const PROGRESS_UPDATE_BATCH_SIZE: u64 = 100;
