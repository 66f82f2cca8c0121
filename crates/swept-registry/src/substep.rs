//! Swept-interval sub-stepping: interpolated sweep segments within one
//! frame's tracer movement.

use swept_core::{FilterSettings, HitRecord, Pose, ShapeDescriptor, SweepOracle};

use crate::handle::SlotCore;
use crate::slot::TracerState;

/// Results of one sub-step sweep, held in per-slot scratch until the
/// delivery phase.
#[derive(Clone, Debug)]
pub struct SubstepBatch {
    /// Pose at the start of the sub-step segment.
    pub start: Pose,
    /// Pose at the end of the sub-step segment.
    pub end: Pose,
    /// Midpoint pose handed to the oracle as the query orientation.
    pub mid: Pose,
    /// Contacts the oracle reported for this segment.
    pub hits: Vec<HitRecord>,
}

/// Sweep `shape` from `prev` to `current` in `substeps` interpolated
/// segments, invoking the oracle once per segment.
///
/// Polls the slot's lifecycle state every iteration: a cancellation
/// from user code (delivery callbacks run concurrently with nothing,
/// but an earlier slot's callback may have stopped this tracer) takes
/// effect before the next oracle call, within the same frame.
pub(crate) fn run_substeps(
    core: &SlotCore,
    prev: &Pose,
    current: &Pose,
    substeps: u32,
    shape: &ShapeDescriptor,
    filter: &FilterSettings,
    oracle: &dyn SweepOracle,
) -> Vec<SubstepBatch> {
    let mut batches = Vec::with_capacity(substeps as usize);
    let ratio = 1.0 / substeps as f32;

    for i in 0..substeps {
        if core.state() == TracerState::Stopped {
            break;
        }

        let start = Pose::interpolate(prev, current, ratio * i as f32);
        let end = Pose::interpolate(prev, current, ratio * (i + 1) as f32);
        let mid = Pose::midpoint(&start, &end);

        let hits = oracle.sweep(&start, &end, &mid, shape, filter);
        batches.push(SubstepBatch {
            start,
            end,
            mid,
            hits,
        });
    }
    batches
}
