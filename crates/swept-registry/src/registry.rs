//! The tracer registry: dense slot storage plus the per-frame pipeline.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, Weak};

use rayon::prelude::*;
use tracing::warn;

use swept_core::{FrameId, HitObserver, SweepOracle};

use crate::error::{RegistryError, SlotFault};
use crate::handle::{SlotCore, TracerHandle, INVALID_INDEX};
use crate::report::TickReport;
use crate::slot::{SlotConfig, TracerSlot, TracerState};

/// Owns every scheduled tracer and drives the per-frame pipeline.
///
/// Slots live in a dense array addressed by `(index, generation)`
/// handles. Structural mutation uses swap-removal, so indices are not
/// stable across removal — handles track their slot through the shared
/// control word and stay valid until their own slot is removed.
///
/// All handle-addressed operations are safe to call from delivery
/// callbacks while a tick is running: structural requests are deferred
/// and applied in the sweep at the end of the same tick.
pub struct TracerRegistry {
    /// Dense slot array. Held locked for the duration of a tick pass.
    table: Mutex<Vec<TracerSlot>>,
    /// Slots allocated while a pass was running; appended in phase 4.
    staged: Mutex<Vec<TracerSlot>>,
    /// True while `tick` is between its first and last phase.
    in_pass: AtomicBool,
    frame: AtomicU64,
}

impl TracerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            table: Mutex::new(Vec::new()),
            staged: Mutex::new(Vec::new()),
            in_pass: AtomicBool::new(false),
            frame: AtomicU64::new(0),
        }
    }

    /// Number of slots in the dense array. Staged slots are not
    /// counted until the tick that appends them.
    pub fn len(&self) -> usize {
        self.table.lock().unwrap().len()
    }

    /// Whether the dense array is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register a new tracer slot and return its handle.
    ///
    /// The slot starts `Stopped`; call [`set_active`](Self::set_active)
    /// to arm it. During a tick the slot is staged and becomes visible
    /// to the pipeline on the next tick.
    pub fn allocate(&self, owner: Weak<dyn HitObserver>, config: SlotConfig) -> TracerHandle {
        let core = SlotCore::new();
        let slot = TracerSlot::new(core.clone(), config, owner);
        let handle = TracerHandle::from_core(core);

        if self.in_pass.load(Ordering::Acquire) {
            self.staged.lock().unwrap().push(slot);
        } else {
            let mut table = self.table.lock().unwrap();
            handle.core().set_index(table.len() as u32);
            table.push(slot);
        }
        handle
    }

    /// Replace the slot's projected config.
    ///
    /// During a tick the config is stashed on the control word and
    /// applied at the end of the pass, so a half-updated config is
    /// never observed mid-frame.
    pub fn update_config(
        &self,
        handle: &TracerHandle,
        config: SlotConfig,
    ) -> Result<(), RegistryError> {
        let core = handle.core();
        if core.is_dead() {
            return Err(RegistryError::StaleHandle { index: core.index() });
        }
        if self.in_pass.load(Ordering::Acquire) {
            core.stash_config(config);
            return Ok(());
        }

        let mut table = self.table.lock().unwrap();
        let index = core.index();
        if index == INVALID_INDEX {
            // Staged by another thread mid-tick; drained in phase 4.
            core.stash_config(config);
            return Ok(());
        }
        match table.get_mut(index as usize) {
            Some(slot) if slot.core().generation() == core.generation() => {
                slot.apply_config(config);
                Ok(())
            }
            _ => {
                warn!(%handle, "config update on stale tracer handle ignored");
                Err(RegistryError::StaleHandle { index })
            }
        }
    }

    /// Arm or disarm a tracer.
    ///
    /// Arming resets the elapsed accumulator and pose history on the
    /// next transform update, so the first sweep never spans from a
    /// stale location. Disarming with `immediate == false` lets the
    /// tracer flush one final sweep (`PendingStop`); `immediate == true`
    /// stops it on the spot, cancelling any remaining sub-steps or
    /// deliveries this frame.
    pub fn set_active(&self, handle: &TracerHandle, active: bool, immediate: bool) {
        let core = handle.core();
        if core.is_dead() {
            warn!(%handle, "activation change on stale tracer handle ignored");
            return;
        }
        if active {
            core.set_state(TracerState::Active);
            core.mark_activation_pending();
        } else {
            core.request_stop(immediate);
        }
    }

    /// Remove a tracer's slot from the registry.
    ///
    /// During a tick the removal is deferred to the end-of-pass sweep;
    /// the slot still participates in the current frame. A stale handle
    /// (generation mismatch or already removed) logs a warning and does
    /// nothing.
    pub fn request_removal(&self, handle: &TracerHandle) {
        let core = handle.core();
        if core.is_dead() {
            warn!(%handle, "removal of stale tracer handle ignored");
            return;
        }
        if self.in_pass.load(Ordering::Acquire) {
            core.mark_pending_removal();
            return;
        }

        let mut table = self.table.lock().unwrap();
        let index = core.index();
        if index == INVALID_INDEX {
            // Staged by another thread mid-tick; dropped in phase 4.
            core.mark_pending_removal();
            return;
        }
        let index = index as usize;
        match table.get(index) {
            Some(slot) if slot.core().generation() == core.generation() => {
                let removed = table.swap_remove(index);
                removed.core().detach();
                if index < table.len() {
                    table[index].core().set_index(index as u32);
                }
            }
            _ => warn!(%handle, "removal of stale tracer handle ignored"),
        }
    }

    /// Run `f` against the slot behind `handle`, if the handle is still
    /// valid. Intended for inspection; do not call during a tick.
    pub fn with_slot<R>(&self, handle: &TracerHandle, f: impl FnOnce(&TracerSlot) -> R) -> Option<R> {
        let table = self.table.lock().unwrap();
        let index = handle.core().index();
        if index == INVALID_INDEX {
            return None;
        }
        table
            .get(index as usize)
            .filter(|slot| slot.core().generation() == handle.generation())
            .map(f)
    }

    /// Advance every tracer by one frame.
    ///
    /// Runs the three pipeline phases and the structural sweep, then
    /// returns the tick's metrics. Phases 1 and 2 fan out across the
    /// rayon pool; phase 3 delivers sequentially in slot-index order on
    /// the calling thread, so observer callbacks run on the driver.
    pub fn tick(&self, dt: f32, oracle: &dyn SweepOracle) -> TickReport {
        let frame = FrameId(self.frame.fetch_add(1, Ordering::AcqRel));
        let mut table = self.table.lock().unwrap();
        self.in_pass.store(true, Ordering::Release);

        let mut report = TickReport {
            frame,
            slots: table.len(),
            ..TickReport::default()
        };

        // Phase 1: transform update.
        let faults: Vec<SlotFault> = table
            .par_iter_mut()
            .filter_map(|slot| slot.update_transform(dt))
            .collect();
        report.faults.extend(faults);
        report.fired = table.iter().filter(|slot| slot.will_fire()).count();

        // Phase 2: sweep execution.
        let sweep_results: Vec<(usize, Option<SlotFault>)> = table
            .par_iter_mut()
            .map(|slot| slot.perform_sweeps(oracle, dt))
            .collect();
        for (sweeps, fault) in sweep_results {
            report.sweeps += sweeps;
            report.faults.extend(fault);
        }

        // Phase 3: delivery, in index order.
        for slot in table.iter_mut() {
            let (batches, hits, fault) = slot.deliver(frame);
            report.batches_delivered += batches;
            report.hits_delivered += hits;
            report.faults.extend(fault);
        }

        // Phase 4: structural sweep. Appends first, so a slot both
        // allocated and removed inside this tick never lands.
        let staged: Vec<TracerSlot> = std::mem::take(&mut *self.staged.lock().unwrap());
        for slot in staged {
            if slot.core().is_pending_removal() {
                slot.core().detach();
                continue;
            }
            slot.core().set_index(table.len() as u32);
            table.push(slot);
            report.added += 1;
        }

        for index in (0..table.len()).rev() {
            if table[index].core().is_pending_removal() {
                let removed = table.swap_remove(index);
                removed.core().detach();
                if index < table.len() {
                    table[index].core().set_index(index as u32);
                }
                report.removed += 1;
            }
        }

        for slot in table.iter_mut() {
            if let Some(config) = slot.core().take_stashed_config() {
                slot.apply_config(config);
            }
        }

        self.in_pass.store(false, Ordering::Release);
        report
    }
}

impl Default for TracerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use swept_core::{HitObserver, HitRecord, TracerTag, Vec3};
    use swept_test_utils::{
        observer_weak, NullOracle, RecordingObserver, RecordingOracle, StaticPoseSource,
    };

    use crate::policy::TickPolicy;
    use crate::slot::TracerState;

    fn match_tick_config(tag: &str, source: Arc<StaticPoseSource>) -> SlotConfig {
        let mut config = SlotConfig::new(TracerTag::new(tag));
        config.shape = Some(swept_core::ShapeDescriptor::Sphere { radius: 0.5 });
        config.source = Some(source);
        config
    }

    #[test]
    fn allocate_assigns_dense_indices() {
        let registry = TracerRegistry::new();
        let observer = RecordingObserver::new();
        let src = StaticPoseSource::at_origin();
        let a = registry.allocate(observer_weak(&observer), match_tick_config("a", src.clone()));
        let b = registry.allocate(observer_weak(&observer), match_tick_config("b", src));
        assert_eq!(registry.len(), 2);
        assert_eq!(a.index(), Some(0));
        assert_eq!(b.index(), Some(1));
    }

    #[test]
    fn swap_removal_rewrites_displaced_handle() {
        let registry = TracerRegistry::new();
        let observer = RecordingObserver::new();
        let src = StaticPoseSource::at_origin();
        let _a = registry.allocate(observer_weak(&observer), match_tick_config("a", src.clone()));
        let b = registry.allocate(observer_weak(&observer), match_tick_config("b", src.clone()));
        let c = registry.allocate(observer_weak(&observer), match_tick_config("c", src));

        registry.request_removal(&b);
        assert_eq!(registry.len(), 2);
        assert_eq!(b.index(), None);
        // The tail slot was swapped into the vacated position and its
        // handle follows it.
        assert_eq!(c.index(), Some(1));
        assert_eq!(registry.with_slot(&c, |s| s.tag().to_string()).unwrap(), "c");

        // A second removal through the stale handle is a no-op.
        registry.request_removal(&b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn stale_handle_config_update_is_rejected() {
        let registry = TracerRegistry::new();
        let observer = RecordingObserver::new();
        let src = StaticPoseSource::at_origin();
        let h = registry.allocate(observer_weak(&observer), match_tick_config("t", src.clone()));
        registry.request_removal(&h);
        let err = registry
            .update_config(&h, match_tick_config("t", src))
            .unwrap_err();
        assert!(matches!(err, RegistryError::StaleHandle { .. }));
    }

    #[test]
    fn repeated_identical_config_updates_are_idempotent() {
        let registry = TracerRegistry::new();
        let observer = RecordingObserver::new();
        let src = StaticPoseSource::at_origin();
        let h = registry.allocate(observer_weak(&observer), match_tick_config("t", src.clone()));

        registry
            .update_config(&h, match_tick_config("t", src.clone()))
            .unwrap();
        registry
            .update_config(&h, match_tick_config("t", src))
            .unwrap();

        registry
            .with_slot(&h, |s| {
                assert_eq!(s.tag().as_str(), "t");
                assert_eq!(s.config().policy, TickPolicy::MatchTick);
                assert!(s.config().shape.is_some());
                assert!(s.history().is_empty());
                assert_eq!(s.elapsed(), 0.0);
            })
            .unwrap();
    }

    #[test]
    fn dropped_owner_surfaces_as_a_delivery_fault() {
        let registry = TracerRegistry::new();
        let observer = RecordingObserver::new();
        let src = StaticPoseSource::at_origin();
        let h = registry.allocate(observer_weak(&observer), match_tick_config("t", src));
        registry.set_active(&h, true, false);
        drop(observer);

        let report = registry.tick(0.016, &NullOracle);
        assert_eq!(report.faults.len(), 1);
        assert!(matches!(report.faults[0], SlotFault::MissingOwner { .. }));
        // The slot survives; removal stays the front-end's call.
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn match_tick_tracer_fires_every_frame() {
        let registry = TracerRegistry::new();
        let observer = RecordingObserver::new();
        let src = StaticPoseSource::at_origin();
        let h = registry.allocate(observer_weak(&observer), match_tick_config("t", src));
        registry.set_active(&h, true, false);

        let oracle = NullOracle;
        let report = registry.tick(0.016, &oracle);
        assert_eq!(report.fired, 1);
        assert_eq!(report.sweeps, 1);
        assert_eq!(report.batches_delivered, 1);
        assert!(report.is_clean());
        assert_eq!(observer.deliveries().len(), 1);

        registry.tick(0.016, &oracle);
        assert_eq!(observer.deliveries().len(), 2);
    }

    #[test]
    fn deferred_stop_flushes_one_final_sweep() {
        let registry = TracerRegistry::new();
        let observer = RecordingObserver::new();
        let src = StaticPoseSource::at_origin();
        let h = registry.allocate(observer_weak(&observer), match_tick_config("t", src));
        registry.set_active(&h, true, false);

        let oracle = NullOracle;
        registry.tick(0.016, &oracle);
        assert_eq!(observer.deliveries().len(), 1);

        registry.set_active(&h, false, false);
        assert_eq!(h.state(), TracerState::PendingStop);

        // The flush frame delivers exactly one more batch.
        let report = registry.tick(0.016, &oracle);
        assert_eq!(report.batches_delivered, 1);
        assert_eq!(h.state(), TracerState::Stopped);
        assert!(registry
            .with_slot(&h, |s| s.history().is_empty())
            .unwrap());

        // After the flush the tracer is quiet.
        let report = registry.tick(0.016, &oracle);
        assert_eq!(report.fired, 0);
        assert_eq!(observer.deliveries().len(), 2);
    }

    #[test]
    fn immediate_stop_skips_the_flush() {
        let registry = TracerRegistry::new();
        let observer = RecordingObserver::new();
        let src = StaticPoseSource::at_origin();
        let h = registry.allocate(observer_weak(&observer), match_tick_config("t", src));
        registry.set_active(&h, true, false);
        registry.set_active(&h, false, true);
        assert_eq!(h.state(), TracerState::Stopped);

        let report = registry.tick(0.016, &NullOracle);
        assert_eq!(report.fired, 0);
        assert!(observer.deliveries().is_empty());
    }

    #[test]
    fn fixed_rate_skips_frames_below_half_interval() {
        let registry = TracerRegistry::new();
        let observer = RecordingObserver::new();
        let src = StaticPoseSource::at_origin();
        let mut config = match_tick_config("t", src);
        config.policy = TickPolicy::FixedRate {
            interval: 1.0 / 30.0,
        };
        let h = registry.allocate(observer_weak(&observer), config);
        registry.set_active(&h, true, false);

        let oracle = NullOracle;
        // 10 ms frames against a 33 ms interval: the half-interval
        // trigger crosses on the second frame.
        let report = registry.tick(0.01, &oracle);
        assert_eq!(report.fired, 0);
        let report = registry.tick(0.01, &oracle);
        assert_eq!(report.fired, 1);

        // Delivery dt spans the whole accumulated window, not just the
        // firing frame.
        let deliveries = observer.deliveries();
        assert_eq!(deliveries.len(), 1);
        assert!((deliveries[0].substep_dt - 0.02).abs() < 1e-6);
    }

    #[test]
    fn distance_tracer_substeps_long_moves() {
        let registry = TracerRegistry::new();
        let observer = RecordingObserver::new();
        let src = StaticPoseSource::at_origin();
        let mut config = match_tick_config("t", src.clone());
        config.policy = TickPolicy::Distance { interval: 1.0 };
        let h = registry.allocate(observer_weak(&observer), config);
        registry.set_active(&h, true, false);

        let oracle = RecordingOracle::new();
        // First frame seeds history; no motion yet.
        let report = registry.tick(0.016, &oracle);
        assert_eq!(report.fired, 0);

        src.set(swept_core::Pose::from_translation(Vec3::new(4.0, 0.0, 0.0)));
        let report = registry.tick(0.016, &oracle);
        assert_eq!(report.fired, 1);
        assert_eq!(report.sweeps, 4);
        assert_eq!(report.batches_delivered, 4);
        assert_eq!(oracle.sweep_count(), 4);
    }

    #[test]
    fn vanished_source_stops_tracer_with_fault() {
        let registry = TracerRegistry::new();
        let observer = RecordingObserver::new();
        let src = StaticPoseSource::at_origin();
        let h = registry.allocate(observer_weak(&observer), match_tick_config("t", src.clone()));
        registry.set_active(&h, true, false);
        registry.tick(0.016, &NullOracle);

        src.vanish();
        let report = registry.tick(0.016, &NullOracle);
        assert_eq!(report.faults.len(), 1);
        assert!(matches!(report.faults[0], SlotFault::InvalidSource { .. }));
        assert_eq!(h.state(), TracerState::Stopped);
    }

    #[test]
    fn hits_flow_through_to_the_observer() {
        let registry = TracerRegistry::new();
        let observer = RecordingObserver::new();
        let src = StaticPoseSource::at_origin();
        let h = registry.allocate(observer_weak(&observer), match_tick_config("t", src));
        registry.set_active(&h, true, false);

        let oracle = RecordingOracle::new();
        oracle.push_hit(HitRecord::on_subject(swept_core::SubjectId(7)));
        let report = registry.tick(0.016, &oracle);
        assert_eq!(report.hits_delivered, 1);

        let deliveries = observer.deliveries();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].hits[0].subject, swept_core::SubjectId(7));
        assert_eq!(deliveries[0].frame, FrameId(0));
    }

    // Observer that mutates the registry from inside its delivery
    // callback, exercising the deferred-mutation paths.
    struct ReentrantObserver {
        registry: Arc<TracerRegistry>,
        handle: Mutex<Option<TracerHandle>>,
        action: ReentrantAction,
        calls: Mutex<usize>,
    }

    enum ReentrantAction {
        RemoveSelf,
        StopSelfImmediate,
        AllocateAnother,
    }

    impl ReentrantObserver {
        fn new(registry: Arc<TracerRegistry>, action: ReentrantAction) -> Arc<Self> {
            Arc::new(Self {
                registry,
                handle: Mutex::new(None),
                action,
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    impl HitObserver for ReentrantObserver {
        fn deliver(&self, _tag: &TracerTag, _hits: &[HitRecord], _dt: f32, _frame: FrameId) {
            *self.calls.lock().unwrap() += 1;
            let handle = self.handle.lock().unwrap().clone().unwrap();
            match self.action {
                ReentrantAction::RemoveSelf => self.registry.request_removal(&handle),
                ReentrantAction::StopSelfImmediate => {
                    self.registry.set_active(&handle, false, true)
                }
                ReentrantAction::AllocateAnother => {
                    let src = StaticPoseSource::at_origin();
                    let weak = Arc::downgrade(&(StaticObserver::arc() as Arc<dyn HitObserver>));
                    self.registry
                        .allocate(weak, match_tick_config("late", src));
                }
            }
        }
    }

    struct StaticObserver;
    impl StaticObserver {
        fn arc() -> Arc<Self> {
            Arc::new(Self)
        }
    }
    impl HitObserver for StaticObserver {
        fn deliver(&self, _: &TracerTag, _: &[HitRecord], _: f32, _: FrameId) {}
    }

    #[test]
    fn removal_from_callback_is_applied_after_the_pass() {
        let registry = Arc::new(TracerRegistry::new());
        let observer = ReentrantObserver::new(registry.clone(), ReentrantAction::RemoveSelf);
        let src = StaticPoseSource::at_origin();
        let weak = Arc::downgrade(&(observer.clone() as Arc<dyn HitObserver>));
        let h = registry.allocate(weak, match_tick_config("t", src));
        *observer.handle.lock().unwrap() = Some(h.clone());
        registry.set_active(&h, true, false);

        let report = registry.tick(0.016, &NullOracle);
        // The slot still delivered this frame before being swept.
        assert_eq!(observer.calls(), 1);
        assert_eq!(report.removed, 1);
        assert_eq!(registry.len(), 0);
        assert_eq!(h.index(), None);
    }

    #[test]
    fn immediate_stop_from_callback_cancels_remaining_batches() {
        let registry = Arc::new(TracerRegistry::new());
        let observer =
            ReentrantObserver::new(registry.clone(), ReentrantAction::StopSelfImmediate);
        let src = StaticPoseSource::at_origin();
        let weak = Arc::downgrade(&(observer.clone() as Arc<dyn HitObserver>));
        let mut config = match_tick_config("t", src.clone());
        config.policy = TickPolicy::Distance { interval: 1.0 };
        let h = registry.allocate(weak, config);
        *observer.handle.lock().unwrap() = Some(h.clone());
        registry.set_active(&h, true, false);

        let oracle = NullOracle;
        registry.tick(0.016, &oracle);
        src.set(swept_core::Pose::from_translation(Vec3::new(8.0, 0.0, 0.0)));
        let report = registry.tick(0.016, &oracle);

        // Eight sub-step sweeps ran, but the first delivery stopped the
        // tracer and the remaining seven batches were dropped.
        assert_eq!(report.sweeps, 8);
        assert_eq!(report.batches_delivered, 1);
        assert_eq!(observer.calls(), 1);
        assert_eq!(h.state(), TracerState::Stopped);
    }

    #[test]
    fn allocation_from_callback_lands_next_tick() {
        let registry = Arc::new(TracerRegistry::new());
        let observer = ReentrantObserver::new(registry.clone(), ReentrantAction::AllocateAnother);
        let src = StaticPoseSource::at_origin();
        let weak = Arc::downgrade(&(observer.clone() as Arc<dyn HitObserver>));
        let h = registry.allocate(weak, match_tick_config("t", src));
        *observer.handle.lock().unwrap() = Some(h.clone());
        registry.set_active(&h, true, false);

        let report = registry.tick(0.016, &NullOracle);
        assert_eq!(report.added, 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn restart_reseeds_history() {
        let registry = TracerRegistry::new();
        let observer = RecordingObserver::new();
        let src = StaticPoseSource::at_origin();
        let mut config = match_tick_config("t", src.clone());
        config.policy = TickPolicy::Distance { interval: 1.0 };
        let h = registry.allocate(observer_weak(&observer), config);
        registry.set_active(&h, true, false);
        registry.tick(0.016, &NullOracle);
        registry.set_active(&h, false, true);

        // Teleport while stopped, then rearm. The first armed frame
        // must not sweep across the teleport.
        src.set(swept_core::Pose::from_translation(Vec3::new(50.0, 0.0, 0.0)));
        registry.set_active(&h, true, false);
        let report = registry.tick(0.016, &NullOracle);
        assert_eq!(report.fired, 0);
        assert_eq!(
            registry.with_slot(&h, |s| s.history().len()).unwrap(),
            1
        );
    }
}
