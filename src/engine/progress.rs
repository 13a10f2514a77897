//! Progress bar for the feed loop.

use kdam::{Animation, Bar, BarExt};
use std::sync::{Arc, Mutex};

// Progress bar type alias
pub type ProgressBar = Arc<Mutex<Bar>>;

/// Create a progress bar over `total` items.
pub fn create_progress_bar(total: u64, desc: &'static str) -> ProgressBar {
    Arc::new(Mutex::new(kdam::tqdm!(
        total = total as usize,
        desc = desc,
        animation = Animation::Classic,
        unit = " items"
    )))
}

/// Update progress bar if available.
/// Uses try_lock to avoid blocking if mutex is contended; the bar catches up on the next update.
pub fn update_progress_bar(pb: &ProgressBar, n: u64) {
    if let Ok(mut pb) = pb.try_lock() {
        let _ = pb.update(n as usize);
    }
}

/// Report `done` items every `chunk_size`; call once per fed item.
pub fn report_progress_batched(pb: Option<&ProgressBar>, done: u64, chunk_size: u64) {
    if let Some(pb) = pb
        && done > 0
        && done.is_multiple_of(chunk_size)
    {
        update_progress_bar(pb, chunk_size);
    }
}

/// Final update for the remainder after batched updates, then move past the bar line.
pub fn finish_progress(pb: Option<&ProgressBar>, done: u64, chunk_size: u64) {
    if let Some(pb) = pb {
        let remaining = done % chunk_size;
        if let Ok(mut bar) = pb.lock() {
            if remaining > 0 {
                let _ = bar.update(remaining as usize);
            }
            let _ = bar.refresh();
        }
        eprintln!();
    }
}
