//! Per-tick metrics returned by the scheduler.

use swept_core::FrameId;

use crate::error::SlotFault;

/// Summary of one scheduler tick.
///
/// Returned by [`TracerRegistry::tick`](crate::TracerRegistry::tick);
/// cheap enough to build every frame and log on demand.
#[derive(Clone, Debug, Default)]
pub struct TickReport {
    /// Frame this report describes.
    pub frame: FrameId,
    /// Slots in the dense array at the start of the pass.
    pub slots: usize,
    /// Slots that fired this frame.
    pub fired: usize,
    /// Oracle sweep queries issued across all slots.
    pub sweeps: usize,
    /// Sub-step batches handed to owners.
    pub batches_delivered: usize,
    /// Individual hits handed to owners.
    pub hits_delivered: usize,
    /// Slots appended from the staged list after the pass.
    pub added: usize,
    /// Slots removed by the deferred sweep after the pass.
    pub removed: usize,
    /// Per-slot degradations observed during the pass.
    pub faults: Vec<SlotFault>,
}

impl TickReport {
    /// Whether the tick completed without any slot degradation.
    pub fn is_clean(&self) -> bool {
        self.faults.is_empty()
    }
}
