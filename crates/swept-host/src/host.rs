//! The per-owner tracer front-end.

use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use tracing::warn;

use swept_core::{
    FilterSettings, FrameId, HitObserver, HitRecord, PoseSource, SubjectId, TracerTag,
};
use swept_registry::{SlotConfig, TickPolicy, TracerHandle, TracerRegistry};

use crate::cache::{FilterMode, HitCache};
use crate::config::{ConfigError, TracedSource, TracerDescriptor};

/// Owner-side event receiver.
///
/// `on_hit_detected` fires once per surfaced (non-duplicate) hit, on
/// the tick driver thread. Implementations may re-enter the host or
/// the registry from any callback.
pub trait HitSink: Send + Sync {
    /// A deduplicated hit surfaced by one of the owner's tracers.
    fn on_hit_detected(&self, tag: &TracerTag, hit: &HitRecord, substep_dt: f32, frame: FrameId);

    /// A tracer under `tag` was started.
    fn tracer_started(&self, _tag: &TracerTag) {}

    /// A tracer under `tag` was stopped.
    fn tracer_stopped(&self, _tag: &TracerTag) {}
}

struct TracerEntry {
    descriptor: TracerDescriptor,
    policy: TickPolicy,
    /// Cleared when the descriptor's source kind disagreed with the
    /// provider at registration; the slot then samples but never
    /// sweeps.
    shape_enabled: bool,
    source: Arc<dyn TracedSource>,
    handle: TracerHandle,
}

impl TracerEntry {
    fn slot_config(&self) -> SlotConfig {
        let source: Arc<dyn PoseSource> = self.source.clone();
        SlotConfig {
            tag: self.descriptor.tag.clone(),
            shape: self.shape_enabled.then_some(self.descriptor.shape),
            policy: self.policy,
            filter: self.descriptor.filter.clone(),
            source: Some(source),
        }
    }
}

/// One owning entity's collection of tracers.
///
/// Registers descriptors as registry slots, receives their raw hit
/// batches, runs them through the hit cache, and surfaces deduplicated
/// events to the owner's [`HitSink`]. Dropping the host removes all of
/// its slots (deferred-safe if a tick is running).
pub struct TracerHost {
    registry: Arc<TracerRegistry>,
    sink: Arc<dyn HitSink>,
    filter_mode: FilterMode,
    cache: Mutex<HitCache>,
    tracers: Mutex<IndexMap<TracerTag, Vec<TracerEntry>>>,
}

impl TracerHost {
    /// A host delivering to `sink`, deduplicating under `filter_mode`.
    pub fn new(
        registry: Arc<TracerRegistry>,
        sink: Arc<dyn HitSink>,
        filter_mode: FilterMode,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            sink,
            filter_mode,
            cache: Mutex::new(HitCache::new()),
            tracers: Mutex::new(IndexMap::new()),
        })
    }

    /// Register a tracer from its descriptor and pose provider.
    ///
    /// The slot starts stopped; arm it with
    /// [`start_tracers`](Self::start_tracers). A descriptor whose
    /// declared source kind disagrees with the provider is still
    /// registered, but with geometry derivation disabled — it samples
    /// poses and never sweeps.
    pub fn add_tracer(
        self: &Arc<Self>,
        descriptor: TracerDescriptor,
        source: Arc<dyn TracedSource>,
    ) -> Result<TracerHandle, ConfigError> {
        let policy = descriptor.policy.to_policy(&descriptor.tag)?;

        // The tracer map lock is never held across registry calls;
        // delivery callbacks take it while the registry's own lock is
        // held.
        {
            let tracers = self.tracers.lock().unwrap();
            if let Some(existing) = tracers.get(&descriptor.tag).and_then(|v| v.first()) {
                if existing.descriptor.source_kind != descriptor.source_kind {
                    return Err(ConfigError::DuplicateTagMismatch {
                        tag: descriptor.tag.clone(),
                    });
                }
            }
        }

        let shape_enabled = descriptor.source_kind == source.kind();
        if !shape_enabled {
            warn!(
                tag = %descriptor.tag,
                declared = %descriptor.source_kind,
                provided = %source.kind(),
                "tracer source kind mismatch; geometry derivation disabled"
            );
        }

        let source_dyn: Arc<dyn PoseSource> = source.clone();
        let config = SlotConfig {
            tag: descriptor.tag.clone(),
            shape: shape_enabled.then_some(descriptor.shape),
            policy,
            filter: descriptor.filter.clone(),
            source: Some(source_dyn),
        };
        let observer: Arc<dyn HitObserver> = self.clone();
        let handle = self.registry.allocate(Arc::downgrade(&observer), config);

        let entry = TracerEntry {
            descriptor,
            policy,
            shape_enabled,
            source,
            handle: handle.clone(),
        };
        self.tracers
            .lock()
            .unwrap()
            .entry(entry.descriptor.tag.clone())
            .or_default()
            .push(entry);
        Ok(handle)
    }

    /// Arm every tracer whose tag is in `tags`.
    ///
    /// With `reset_cache`, cache entries recorded under those tags are
    /// forgotten first, so the new burst re-surfaces subjects hit by
    /// the previous one. A tag set matching nothing logs a warning.
    pub fn start_tracers(&self, tags: &[TracerTag], reset_cache: bool) {
        if reset_cache {
            self.cache.lock().unwrap().reset_tags(tags);
        }

        let mut started = Vec::new();
        {
            let tracers = self.tracers.lock().unwrap();
            for tag in tags {
                if let Some(entries) = tracers.get(tag) {
                    for entry in entries {
                        self.registry.set_active(&entry.handle, true, false);
                        started.push(entry.descriptor.tag.clone());
                    }
                }
            }
        }
        if started.is_empty() {
            warn!(?tags, "start request matched no tracer tags");
            return;
        }
        for tag in started {
            self.sink.tracer_started(&tag);
        }
    }

    /// Disarm every tracer whose tag is in `tags`.
    ///
    /// `immediate == false` lets each tracer flush one final sweep.
    pub fn stop_tracers(&self, tags: &[TracerTag], immediate: bool) {
        let mut stopped = Vec::new();
        {
            let tracers = self.tracers.lock().unwrap();
            for tag in tags {
                if let Some(entries) = tracers.get(tag) {
                    for entry in entries {
                        self.registry.set_active(&entry.handle, false, immediate);
                        stopped.push(entry.descriptor.tag.clone());
                    }
                }
            }
        }
        if stopped.is_empty() {
            warn!(?tags, "stop request matched no tracer tags");
            return;
        }
        for tag in stopped {
            self.sink.tracer_stopped(&tag);
        }
    }

    /// Add `subject` to the ignore list of every tracer under `tag`,
    /// live. Typically the owner itself and the wielded object.
    pub fn add_ignored(&self, tag: &TracerTag, subject: SubjectId) {
        let mut updates = Vec::new();
        {
            let mut tracers = self.tracers.lock().unwrap();
            let Some(entries) = tracers.get_mut(tag) else {
                warn!(%tag, "ignore request matched no tracer tag");
                return;
            };
            for entry in entries {
                entry.descriptor.filter.ignore(subject);
                updates.push((entry.handle.clone(), entry.slot_config()));
            }
        }
        // Project the widened filters outside the map lock.
        for (handle, config) in updates {
            if self.registry.update_config(&handle, config).is_err() {
                warn!(%tag, "ignore update hit a stale tracer handle");
            }
        }
    }

    /// The first registered descriptor under `tag`, if any.
    pub fn find_config(&self, tag: &TracerTag) -> Option<TracerDescriptor> {
        self.tracers
            .lock()
            .unwrap()
            .get(tag)
            .and_then(|v| v.first())
            .map(|entry| entry.descriptor.clone())
    }

    /// Number of registered tracers across all tags.
    pub fn tracer_count(&self) -> usize {
        self.tracers.lock().unwrap().values().map(Vec::len).sum()
    }

    /// Forget every cached hit.
    pub fn reset_hit_cache(&self) {
        self.cache.lock().unwrap().reset();
    }

    fn filter_for(&self, tag: &TracerTag) -> FilterSettings {
        self.tracers
            .lock()
            .unwrap()
            .get(tag)
            .and_then(|v| v.first())
            .map(|entry| entry.descriptor.filter.clone())
            .unwrap_or_default()
    }
}

impl HitObserver for TracerHost {
    fn deliver(&self, tag: &TracerTag, hits: &[HitRecord], substep_dt: f32, frame: FrameId) {
        let filter = self.filter_for(tag);
        for hit in hits {
            if filter.is_ignored(hit.subject) {
                continue;
            }
            if self.filter_mode != FilterMode::None {
                let fresh = self.cache.lock().unwrap().check_and_record(
                    hit.subject,
                    tag,
                    frame,
                    self.filter_mode,
                );
                if !fresh {
                    continue;
                }
            }
            // Cache and map locks are released here: the sink may
            // re-enter the host.
            self.sink.on_hit_detected(tag, hit, substep_dt, frame);
        }
    }
}

impl Drop for TracerHost {
    fn drop(&mut self) {
        // Exclusive access; no lock needed.
        let tracers = self.tracers.get_mut().unwrap();
        for entries in tracers.values() {
            for entry in entries {
                self.registry.request_removal(&entry.handle);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swept_core::{Pose, ShapeDescriptor};
    use swept_registry::TickReport;
    use swept_test_utils::{NullOracle, RecordingOracle, StaticPoseSource};

    use crate::config::{PolicySpec, SourceKind};

    struct TestSource {
        inner: Arc<StaticPoseSource>,
        kind: SourceKind,
    }

    impl TestSource {
        fn fixed() -> Arc<Self> {
            Arc::new(Self {
                inner: StaticPoseSource::at_origin(),
                kind: SourceKind::Fixed,
            })
        }
    }

    impl PoseSource for TestSource {
        fn sample(&self) -> Option<Pose> {
            self.inner.sample()
        }
    }

    impl TracedSource for TestSource {
        fn kind(&self) -> SourceKind {
            self.kind
        }
    }

    #[derive(Default)]
    struct TestSink {
        hits: Mutex<Vec<(TracerTag, SubjectId, FrameId)>>,
        started: Mutex<Vec<TracerTag>>,
        stopped: Mutex<Vec<TracerTag>>,
    }

    impl HitSink for TestSink {
        fn on_hit_detected(
            &self,
            tag: &TracerTag,
            hit: &HitRecord,
            _substep_dt: f32,
            frame: FrameId,
        ) {
            self.hits
                .lock()
                .unwrap()
                .push((tag.clone(), hit.subject, frame));
        }

        fn tracer_started(&self, tag: &TracerTag) {
            self.started.lock().unwrap().push(tag.clone());
        }

        fn tracer_stopped(&self, tag: &TracerTag) {
            self.stopped.lock().unwrap().push(tag.clone());
        }
    }

    fn sword(tag: &str) -> TracerDescriptor {
        TracerDescriptor::new(
            tag,
            ShapeDescriptor::Sphere { radius: 0.5 },
            PolicySpec::MatchTick,
        )
    }

    fn setup(mode: FilterMode) -> (Arc<TracerRegistry>, Arc<TestSink>, Arc<TracerHost>) {
        let registry = Arc::new(TracerRegistry::new());
        let sink = Arc::new(TestSink::default());
        let host = TracerHost::new(registry.clone(), sink.clone(), mode);
        (registry, sink, host)
    }

    fn tick_hitting(registry: &TracerRegistry, subject: SubjectId) -> TickReport {
        let oracle = RecordingOracle::new();
        oracle.push_hit(HitRecord::on_subject(subject));
        registry.tick(0.016, &oracle)
    }

    #[test]
    fn per_tracer_mode_dedups_repeat_subjects() {
        let (registry, sink, host) = setup(FilterMode::SameSubjectPerTracer);
        host.add_tracer(sword("a"), TestSource::fixed()).unwrap();
        host.start_tracers(&[TracerTag::new("a")], false);

        tick_hitting(&registry, SubjectId(7));
        tick_hitting(&registry, SubjectId(7));
        assert_eq!(sink.hits.lock().unwrap().len(), 1);

        // A different subject still surfaces.
        tick_hitting(&registry, SubjectId(8));
        assert_eq!(sink.hits.lock().unwrap().len(), 2);
    }

    #[test]
    fn per_tracer_mode_keeps_tags_independent() {
        let (registry, sink, host) = setup(FilterMode::SameSubjectPerTracer);
        host.add_tracer(sword("a"), TestSource::fixed()).unwrap();
        host.add_tracer(sword("b"), TestSource::fixed()).unwrap();
        host.start_tracers(&[TracerTag::new("a"), TracerTag::new("b")], false);

        tick_hitting(&registry, SubjectId(7));
        // One event per tag for the same subject.
        assert_eq!(sink.hits.lock().unwrap().len(), 2);
    }

    #[test]
    fn across_tracers_mode_collapses_tags() {
        let (registry, sink, host) = setup(FilterMode::SameSubjectAcrossTracers);
        host.add_tracer(sword("a"), TestSource::fixed()).unwrap();
        host.add_tracer(sword("b"), TestSource::fixed()).unwrap();
        host.start_tracers(&[TracerTag::new("a"), TracerTag::new("b")], false);

        tick_hitting(&registry, SubjectId(7));
        assert_eq!(sink.hits.lock().unwrap().len(), 1);
    }

    #[test]
    fn none_mode_surfaces_every_hit() {
        let (registry, sink, host) = setup(FilterMode::None);
        host.add_tracer(sword("a"), TestSource::fixed()).unwrap();
        host.start_tracers(&[TracerTag::new("a")], false);

        tick_hitting(&registry, SubjectId(7));
        tick_hitting(&registry, SubjectId(7));
        assert_eq!(sink.hits.lock().unwrap().len(), 2);
    }

    #[test]
    fn duplicate_tag_requires_matching_source_kind() {
        let (_registry, _sink, host) = setup(FilterMode::None);
        host.add_tracer(sword("a"), TestSource::fixed()).unwrap();

        let mut articulated = sword("a");
        articulated.source_kind = SourceKind::Articulated;
        let err = host
            .add_tracer(articulated, TestSource::fixed())
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateTagMismatch { .. }));

        // Same kind under the same tag is allowed.
        host.add_tracer(sword("a"), TestSource::fixed()).unwrap();
        assert_eq!(host.tracer_count(), 2);
    }

    #[test]
    fn source_kind_mismatch_disables_geometry() {
        let (registry, sink, host) = setup(FilterMode::None);
        let mut descriptor = sword("a");
        descriptor.source_kind = SourceKind::Articulated;
        // Provider reports Fixed; the tracer registers but never
        // sweeps.
        host.add_tracer(descriptor, TestSource::fixed()).unwrap();
        host.start_tracers(&[TracerTag::new("a")], false);

        let oracle = RecordingOracle::new();
        oracle.push_hit(HitRecord::on_subject(SubjectId(7)));
        let report = registry.tick(0.016, &oracle);
        assert_eq!(report.sweeps, 0);
        assert_eq!(oracle.sweep_count(), 0);
        assert!(sink.hits.lock().unwrap().is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn start_with_reset_rescopes_only_named_tags() {
        let (registry, sink, host) = setup(FilterMode::SameSubjectPerTracer);
        host.add_tracer(sword("a"), TestSource::fixed()).unwrap();
        host.add_tracer(sword("b"), TestSource::fixed()).unwrap();
        host.start_tracers(&[TracerTag::new("a"), TracerTag::new("b")], false);

        tick_hitting(&registry, SubjectId(7));
        assert_eq!(sink.hits.lock().unwrap().len(), 2);

        // New burst on "a" only: its cache scope resets, "b" stays
        // suppressed.
        host.start_tracers(&[TracerTag::new("a")], true);
        tick_hitting(&registry, SubjectId(7));
        let hits = sink.hits.lock().unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[2].0, TracerTag::new("a"));
    }

    #[test]
    fn lifecycle_events_reach_the_sink() {
        let (_registry, sink, host) = setup(FilterMode::None);
        host.add_tracer(sword("a"), TestSource::fixed()).unwrap();
        host.start_tracers(&[TracerTag::new("a")], false);
        host.stop_tracers(&[TracerTag::new("a")], false);

        assert_eq!(sink.started.lock().unwrap().len(), 1);
        assert_eq!(sink.stopped.lock().unwrap().len(), 1);

        // Unknown tags warn without emitting events.
        host.start_tracers(&[TracerTag::new("nope")], false);
        assert_eq!(sink.started.lock().unwrap().len(), 1);
    }

    #[test]
    fn ignored_subjects_never_surface() {
        let (registry, sink, host) = setup(FilterMode::None);
        host.add_tracer(sword("a"), TestSource::fixed()).unwrap();
        host.add_ignored(&TracerTag::new("a"), SubjectId(7));
        host.start_tracers(&[TracerTag::new("a")], false);

        tick_hitting(&registry, SubjectId(7));
        assert!(sink.hits.lock().unwrap().is_empty());

        tick_hitting(&registry, SubjectId(8));
        assert_eq!(sink.hits.lock().unwrap().len(), 1);
    }

    #[test]
    fn dropping_the_host_removes_its_slots() {
        let (registry, _sink, host) = setup(FilterMode::None);
        host.add_tracer(sword("a"), TestSource::fixed()).unwrap();
        host.add_tracer(sword("b"), TestSource::fixed()).unwrap();
        assert_eq!(registry.len(), 2);

        drop(host);
        assert_eq!(registry.len(), 0);

        // The registry keeps ticking cleanly with the owner gone.
        let report = registry.tick(0.016, &NullOracle);
        assert!(report.is_clean());
    }
}
