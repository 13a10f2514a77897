//! Pipeline lifecycle: Unopened → Open → Closing → Closed, no re-entry.

use crate::stage::StageInlet;

/// Current lifecycle state. `Open` carries the head stage's inlet so `feed` needs no other lock.
pub enum PipelineState<T> {
    Unopened,
    Open(StageInlet<T>),
    Closing,
    Closed,
}

impl<T> PipelineState<T> {
    /// True while workers are live: after a successful open and until close completes.
    pub fn opened(&self) -> bool {
        matches!(self, PipelineState::Open(_) | PipelineState::Closing)
    }

    pub fn label(&self) -> &'static str {
        match self {
            PipelineState::Unopened => "unopened",
            PipelineState::Open(_) => "open",
            PipelineState::Closing => "closing",
            PipelineState::Closed => "closed",
        }
    }
}
