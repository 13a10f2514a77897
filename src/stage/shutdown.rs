//! Stop/done handshake between a stage and its workers.
//!
//! Kept apart from the data queue: the stop channel carries one token per worker, each worker
//! answers with one done signal once the stage has no pending items left.

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded};
use log::debug;

use crate::error::{PipelineError, Result};

/// Signal ends handed to one worker.
pub struct WorkerSignals {
    pub stop_rx: Receiver<()>,
    done_tx: Sender<()>,
}

impl WorkerSignals {
    /// Report this worker as terminated. Sent exactly once, right before the worker returns.
    pub fn done(self) {
        let _ = self.done_tx.send(());
    }
}

/// Counting stop and done channels for one stage, both sized to the worker count.
pub struct ShutdownSignals {
    stop_tx: Sender<()>,
    stop_rx: Receiver<()>,
    done_tx: Option<Sender<()>>,
    done_rx: Receiver<()>,
}

impl ShutdownSignals {
    pub fn new(workers: usize) -> Self {
        let (stop_tx, stop_rx) = bounded::<()>(workers);
        let (done_tx, done_rx) = bounded::<()>(workers);
        Self {
            stop_tx,
            stop_rx,
            done_tx: Some(done_tx),
            done_rx,
        }
    }

    /// Signal ends for one more worker. `None` once [`Self::seal`] has been called.
    pub fn worker_signals(&self) -> Option<WorkerSignals> {
        self.done_tx.as_ref().map(|done_tx| WorkerSignals {
            stop_rx: self.stop_rx.clone(),
            done_tx: done_tx.clone(),
        })
    }

    /// Drop our own done sender after spawning, so the done channel disconnects if every
    /// worker is gone, instead of blocking close forever.
    pub fn seal(&mut self) {
        self.done_tx = None;
    }

    /// Send one stop token per worker, then wait for `workers` done signals.
    /// Any done signal beyond that count is a protocol violation.
    pub fn stop_and_wait(&self, stage: &str, workers: usize) -> Result<()> {
        for _ in 0..workers {
            self.stop_tx
                .send(())
                .map_err(|_| PipelineError::lifecycle(format!("stage {stage}: stop channel closed")))?;
        }
        debug!("{stage}: sent {workers} stop signals, waiting for workers");

        let mut observed = 0_usize;
        while observed < workers {
            match self.done_rx.recv() {
                Ok(()) => observed += 1,
                Err(_) => break,
            }
        }
        loop {
            match self.done_rx.try_recv() {
                Ok(()) => observed += 1,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        if observed > workers {
            return Err(PipelineError::ShutdownInvariant {
                stage: stage.to_string(),
                expected: workers,
                observed,
            });
        }
        if observed < workers {
            return Err(PipelineError::WorkerPanicked(format!(
                "stage {stage}: only {observed} of {workers} workers reported done"
            )));
        }
        Ok(())
    }
}
