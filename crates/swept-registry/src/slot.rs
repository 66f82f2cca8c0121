//! Tracer slots: one registry entry per scheduled tracer.

use std::sync::{Arc, Weak};

use smallvec::SmallVec;
use swept_core::{
    FilterSettings, FrameId, HitObserver, Pose, PoseSource, ShapeDescriptor, SweepOracle,
    TracerTag,
};

use crate::error::SlotFault;
use crate::handle::SlotCore;
use crate::policy::TickPolicy;
use crate::substep::{run_substeps, SubstepBatch};

/// Lifecycle state of a tracer.
///
/// `Stopped → Active → PendingStop → Stopped`; `PendingStop` exists so
/// a deferred stop still flushes one final sweep before the tracer
/// goes quiet. Stored as an atomic in [`SlotCore`](crate::handle) so
/// the sub-step and delivery loops can poll it for cancellation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TracerState {
    /// Not firing. Initial state.
    Stopped = 0,
    /// Sampling and sweeping every qualifying frame.
    Active = 1,
    /// Will fire exactly one more flush sweep, then stop.
    PendingStop = 2,
}

impl TracerState {
    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Active,
            2 => Self::PendingStop,
            _ => Self::Stopped,
        }
    }
}

/// The two most recent sampled poses: a fixed 2-slot ring.
///
/// Sub-stepping needs exactly two; the scheduler never stores more.
#[derive(Clone, Debug, Default)]
pub struct PoseHistory {
    poses: SmallVec<[Pose; 2]>,
}

impl PoseHistory {
    /// Number of stored poses (0, 1, or 2).
    pub fn len(&self) -> usize {
        self.poses.len()
    }

    /// Whether no pose has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    /// Oldest stored pose, if any.
    pub fn oldest(&self) -> Option<&Pose> {
        self.poses.first()
    }

    /// Most recent stored pose, if any.
    pub fn latest(&self) -> Option<&Pose> {
        self.poses.last()
    }

    /// Append a pose. The flow of the pipeline guarantees at most two
    /// entries; if a third ever arrives it replaces the newest.
    pub(crate) fn push(&mut self, pose: Pose) {
        debug_assert!(self.poses.len() < 2, "pose history overflow");
        if self.poses.len() == 2 {
            self.poses[1] = pose;
        } else {
            self.poses.push(pose);
        }
    }

    /// Seed the "previous" entry: replaces the oldest pose, or starts
    /// the history if empty. Used on activation so the first sweep
    /// doesn't span from some stale location.
    pub(crate) fn seed(&mut self, pose: Pose) {
        if self.poses.is_empty() {
            self.poses.push(pose);
        } else {
            self.poses[0] = pose;
        }
    }

    /// Drop the oldest pose, keeping the newest as the next frame's
    /// "previous".
    pub(crate) fn ring_advance(&mut self) {
        if !self.poses.is_empty() {
            self.poses.remove(0);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.poses.clear();
    }
}

/// Authoring-time configuration projected into a slot.
///
/// Copied in at registration and whenever the front-end's fields
/// change; the pipeline never reads front-end state live. A `None`
/// shape marks a slot whose geometry derivation failed — it samples
/// poses but never sweeps.
#[derive(Clone)]
pub struct SlotConfig {
    /// Identifier delivered with every hit batch.
    pub tag: TracerTag,
    /// Swept geometry, or `None` when geometry derivation is disabled.
    pub shape: Option<ShapeDescriptor>,
    /// When the tracer fires.
    pub policy: TickPolicy,
    /// Query filter forwarded to the oracle.
    pub filter: FilterSettings,
    /// Where the tracer's pose comes from each frame.
    pub source: Option<Arc<dyn PoseSource>>,
}

impl SlotConfig {
    /// A default config for `tag`: match-tick policy, no shape, no
    /// source.
    pub fn new(tag: TracerTag) -> Self {
        Self {
            tag,
            shape: None,
            policy: TickPolicy::MatchTick,
            filter: FilterSettings::none(),
            source: None,
        }
    }
}

/// One scheduled tracer's full runtime state.
///
/// Owned exclusively by the registry's dense array. Front-ends reach a
/// slot only through its [`TracerHandle`](crate::TracerHandle); the
/// slot in turn holds a non-owning reference back to its owner for
/// delivery.
pub struct TracerSlot {
    core: Arc<SlotCore>,
    config: SlotConfig,
    owner: Weak<dyn HitObserver>,
    history: PoseHistory,
    batches: Vec<SubstepBatch>,
    /// Seconds since this slot last fired.
    elapsed: f32,
    fire_this_frame: bool,
}

impl TracerSlot {
    pub(crate) fn new(core: Arc<SlotCore>, config: SlotConfig, owner: Weak<dyn HitObserver>) -> Self {
        Self {
            core,
            config,
            owner,
            history: PoseHistory::default(),
            batches: Vec::new(),
            elapsed: 0.0,
            fire_this_frame: false,
        }
    }

    pub(crate) fn core(&self) -> &Arc<SlotCore> {
        &self.core
    }

    /// The slot's tag.
    pub fn tag(&self) -> &TracerTag {
        &self.config.tag
    }

    /// The slot's current config.
    pub fn config(&self) -> &SlotConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TracerState {
        self.core.state()
    }

    /// The stored pose history.
    pub fn history(&self) -> &PoseHistory {
        &self.history
    }

    /// Seconds accumulated since the last fire.
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub(crate) fn will_fire(&self) -> bool {
        self.fire_this_frame
    }

    pub(crate) fn apply_config(&mut self, config: SlotConfig) {
        self.config = config;
    }

    pub(crate) fn reset_elapsed(&mut self) {
        self.elapsed = 0.0;
    }

    pub(crate) fn seed_history(&mut self, pose: Pose) {
        self.history.seed(pose);
    }

    /// Phase 1: sample the source pose and evaluate the tick policy.
    ///
    /// Returns a fault if the source vanished this frame (the slot is
    /// stopped in that case).
    pub(crate) fn update_transform(&mut self, dt: f32) -> Option<SlotFault> {
        // Activation requested mid-pass (or on a staged slot): start
        // from a clean accumulator and history.
        if self.core.take_activation_pending() {
            self.elapsed = 0.0;
            self.history.clear();
        }

        if self.core.state() == TracerState::Stopped {
            return None;
        }

        let current = match self.config.source.as_ref().and_then(|s| s.sample()) {
            Some(pose) => pose,
            None => {
                self.core.set_state(TracerState::Stopped);
                self.fire_this_frame = false;
                return Some(SlotFault::InvalidSource {
                    tag: self.config.tag.clone(),
                });
            }
        };

        debug_assert!(!self.fire_this_frame, "fire flag leaked from previous frame");

        if self.history.is_empty() {
            self.history.push(current);
        }

        // A pending stop always flushes one final sweep, regardless of
        // tick policy.
        if self.core.state() == TracerState::PendingStop {
            self.fire_this_frame = true;
            self.history.push(current);
            return None;
        }

        let oldest = *self.history.oldest().expect("seeded above");
        if self
            .config
            .policy
            .should_fire(&oldest, &current, self.elapsed, dt)
        {
            self.history.push(current);
            self.fire_this_frame = true;
        }
        None
    }

    /// Phase 2: derive the sub-step count and run the sweeps.
    ///
    /// Accumulates elapsed time for every slot; firing slots with a
    /// degenerate history skip the sweep and report a fault.
    pub(crate) fn perform_sweeps(
        &mut self,
        oracle: &dyn SweepOracle,
        dt: f32,
    ) -> (usize, Option<SlotFault>) {
        let mut sweeps = 0;
        let mut fault = None;

        if self.fire_this_frame {
            if self.history.len() < 2 {
                fault = Some(SlotFault::DegenerateHistory {
                    tag: self.config.tag.clone(),
                });
            } else if let Some(shape) = self.config.shape {
                let prev = *self.history.oldest().expect("len checked");
                let current = *self.history.latest().expect("len checked");
                let substeps = self
                    .config
                    .policy
                    .substep_count(prev.distance_to(&current), dt);
                self.batches = run_substeps(
                    &self.core,
                    &prev,
                    &current,
                    substeps,
                    &shape,
                    &self.config.filter,
                    oracle,
                );
                sweeps = self.batches.len();
            }
        }

        self.elapsed += dt;
        (sweeps, fault)
    }

    /// Phase 3: hand accumulated batches to the owner and advance the
    /// slot's lifecycle. Returns `(batches_delivered, hits, fault)`.
    pub(crate) fn deliver(&mut self, frame: FrameId) -> (usize, usize, Option<SlotFault>) {
        if !self.fire_this_frame {
            return (0, 0, None);
        }

        let mut delivered = 0;
        let mut hits = 0;
        let mut fault = None;

        let substep_dt = self.elapsed / self.batches.len().max(1) as f32;
        match self.owner.upgrade() {
            Some(owner) => {
                for batch in &self.batches {
                    // Respect cancellations from user callbacks
                    // immediately, not one frame late.
                    if self.core.state() == TracerState::Stopped {
                        break;
                    }
                    owner.deliver(&self.config.tag, &batch.hits, substep_dt, frame);
                    delivered += 1;
                    hits += batch.hits.len();
                }
            }
            None => {
                fault = Some(SlotFault::MissingOwner {
                    tag: self.config.tag.clone(),
                });
            }
        }

        self.batches.clear();
        self.elapsed = 0.0;
        self.fire_this_frame = false;

        if self.core.state() == TracerState::PendingStop {
            self.core.set_state(TracerState::Stopped);
            self.history.clear();
        } else {
            self.history.ring_advance();
        }

        (delivered, hits, fault)
    }
}
