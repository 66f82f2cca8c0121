//! Boundary traits between the scheduler and its collaborators.
//!
//! The registry is deliberately ignorant of how sweeps are executed,
//! where poses come from, and what owners do with hits. Each boundary
//! is a trait object held by the slot or passed into `tick()`:
//!
//! ```text
//! PoseSource ──sample()──▶ TracerRegistry ──sweep()──▶ SweepOracle
//!                              │
//!                              └──deliver()──▶ HitObserver (host)
//! ```

use crate::hit::{FilterSettings, HitRecord};
use crate::id::{FrameId, TracerTag};
use crate::pose::Pose;
use crate::shape::ShapeDescriptor;

/// Executes one swept-shape query against the world.
///
/// Pure from the scheduler's perspective: given the sub-step's start,
/// end, and midpoint poses plus geometry and filter settings, return
/// every contact along the sweep. Calls are synchronous and assumed
/// bounded-latency; phases 1–2 invoke this from worker threads, so
/// implementations must be `Sync`.
pub trait SweepOracle: Send + Sync {
    /// Sweep `shape` from `start` to `end`, using `mid` as the
    /// representative orientation for the query.
    fn sweep(
        &self,
        start: &Pose,
        end: &Pose,
        mid: &Pose,
        shape: &ShapeDescriptor,
        filter: &FilterSettings,
    ) -> Vec<HitRecord>;
}

/// Samples the current world pose of a tracer's attachment point.
///
/// Returns `None` when the source object has been destroyed or is
/// otherwise invalid this frame; the registry then stops the slot
/// rather than sweeping from stale data.
pub trait PoseSource: Send + Sync {
    /// The source's current world pose, if it still exists.
    fn sample(&self) -> Option<Pose>;
}

/// Receives per-sub-step hit batches from the delivery phase.
///
/// Implemented by the owning front-end (the host). The registry calls
/// `deliver` once per accumulated sub-step batch, in temporal order,
/// on the driver thread. Implementations may re-enter the registry
/// (stop/start/remove tracers); the registry honors a stop for the
/// remainder of the same delivery pass.
pub trait HitObserver: Send + Sync {
    /// Deliver one sub-step batch for the tracer identified by `tag`.
    ///
    /// `substep_dt` is the elapsed time since the tracer last fired,
    /// divided evenly across this frame's sub-step batches.
    fn deliver(&self, tag: &TracerTag, hits: &[HitRecord], substep_dt: f32, frame: FrameId);
}
