//! Test utilities and mock types for swept development.
//!
//! Provides mock implementations of the core traits ([`PoseSource`],
//! [`SweepOracle`], [`HitObserver`]) that record their inputs so tests
//! can drive the pipeline without a physics backend.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::{Arc, Mutex, Weak};

use swept_core::{
    FilterSettings, FrameId, HitObserver, HitRecord, Pose, PoseSource, ShapeDescriptor,
    SweepOracle, TracerTag,
};

/// Mock [`PoseSource`] holding a settable pose.
///
/// Tests move the tracked object by calling
/// [`set`](StaticPoseSource::set) between ticks, or simulate the
/// tracked object disappearing with [`vanish`](StaticPoseSource::vanish).
pub struct StaticPoseSource {
    pose: Mutex<Option<Pose>>,
}

impl StaticPoseSource {
    pub fn new(pose: Pose) -> Arc<Self> {
        Arc::new(Self {
            pose: Mutex::new(Some(pose)),
        })
    }

    pub fn at_origin() -> Arc<Self> {
        Self::new(Pose::IDENTITY)
    }

    /// Move the source to a new pose.
    pub fn set(&self, pose: Pose) {
        *self.pose.lock().unwrap() = Some(pose);
    }

    /// Make every subsequent sample fail, as if the tracked object was
    /// destroyed.
    pub fn vanish(&self) {
        *self.pose.lock().unwrap() = None;
    }
}

impl PoseSource for StaticPoseSource {
    fn sample(&self) -> Option<Pose> {
        *self.pose.lock().unwrap()
    }
}

/// Mock [`SweepOracle`] that reports no hits.
pub struct NullOracle;

impl SweepOracle for NullOracle {
    fn sweep(
        &self,
        _start: &Pose,
        _end: &Pose,
        _mid: &Pose,
        _shape: &ShapeDescriptor,
        _filter: &FilterSettings,
    ) -> Vec<HitRecord> {
        Vec::new()
    }
}

/// One sweep query as the oracle saw it.
#[derive(Clone, Debug)]
pub struct SweepQuery {
    pub start: Pose,
    pub end: Pose,
    pub mid: Pose,
    pub shape: ShapeDescriptor,
}

/// Mock [`SweepOracle`] that records every query and returns a
/// configurable set of hits from each sweep.
pub struct RecordingOracle {
    queries: Mutex<Vec<SweepQuery>>,
    hits: Mutex<Vec<HitRecord>>,
}

impl RecordingOracle {
    pub fn new() -> Self {
        Self {
            queries: Mutex::new(Vec::new()),
            hits: Mutex::new(Vec::new()),
        }
    }

    /// Add a hit to the set returned by every subsequent sweep.
    pub fn push_hit(&self, hit: HitRecord) {
        self.hits.lock().unwrap().push(hit);
    }

    pub fn sweep_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    pub fn queries(&self) -> Vec<SweepQuery> {
        self.queries.lock().unwrap().clone()
    }
}

impl Default for RecordingOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl SweepOracle for RecordingOracle {
    fn sweep(
        &self,
        start: &Pose,
        end: &Pose,
        mid: &Pose,
        shape: &ShapeDescriptor,
        _filter: &FilterSettings,
    ) -> Vec<HitRecord> {
        self.queries.lock().unwrap().push(SweepQuery {
            start: *start,
            end: *end,
            mid: *mid,
            shape: *shape,
        });
        self.hits.lock().unwrap().clone()
    }
}

/// One batch as delivered to a [`RecordingObserver`].
#[derive(Clone, Debug)]
pub struct Delivery {
    pub tag: TracerTag,
    pub hits: Vec<HitRecord>,
    pub substep_dt: f32,
    pub frame: FrameId,
}

/// Mock [`HitObserver`] that records every delivered batch.
pub struct RecordingObserver {
    deliveries: Mutex<Vec<Delivery>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            deliveries: Mutex::new(Vec::new()),
        })
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }
}

impl HitObserver for RecordingObserver {
    fn deliver(&self, tag: &TracerTag, hits: &[HitRecord], substep_dt: f32, frame: FrameId) {
        self.deliveries.lock().unwrap().push(Delivery {
            tag: tag.clone(),
            hits: hits.to_vec(),
            substep_dt,
            frame,
        });
    }
}

/// Downgrade a recording observer into the `Weak<dyn HitObserver>`
/// form slot registration expects.
pub fn observer_weak(observer: &Arc<RecordingObserver>) -> Weak<dyn HitObserver> {
    let arc: Arc<dyn HitObserver> = observer.clone();
    Arc::downgrade(&arc)
}
