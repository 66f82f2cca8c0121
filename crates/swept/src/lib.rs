//! Swept: a per-frame swept-shape collision tracer scheduler.
//!
//! This is the top-level facade crate that re-exports the public API
//! from the sub-crates. For most users, adding `swept` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use swept::prelude::*;
//!
//! // A pose provider for a fixed mount point.
//! struct Mount;
//! impl PoseSource for Mount {
//!     fn sample(&self) -> Option<Pose> { Some(Pose::IDENTITY) }
//! }
//! impl TracedSource for Mount {
//!     fn kind(&self) -> SourceKind { SourceKind::Fixed }
//! }
//!
//! // An oracle that reports one contact per sweep.
//! struct World;
//! impl SweepOracle for World {
//!     fn sweep(
//!         &self,
//!         _start: &Pose,
//!         _end: &Pose,
//!         _mid: &Pose,
//!         _shape: &ShapeDescriptor,
//!         _filter: &FilterSettings,
//!     ) -> Vec<HitRecord> {
//!         vec![HitRecord::on_subject(SubjectId(1))]
//!     }
//! }
//!
//! // A sink that counts surfaced hits.
//! #[derive(Default)]
//! struct Counter(AtomicUsize);
//! impl HitSink for Counter {
//!     fn on_hit_detected(&self, _: &TracerTag, _: &HitRecord, _: f32, _: FrameId) {
//!         self.0.fetch_add(1, Ordering::Relaxed);
//!     }
//! }
//!
//! let registry = Arc::new(TracerRegistry::new());
//! let sink = Arc::new(Counter::default());
//! let host = TracerHost::new(registry.clone(), sink.clone(), FilterMode::SameSubjectPerTracer);
//!
//! let blade = TracerDescriptor::new(
//!     "sword.blade",
//!     ShapeDescriptor::Sphere { radius: 0.25 },
//!     PolicySpec::MatchTick,
//! );
//! host.add_tracer(blade, Arc::new(Mount)).unwrap();
//! host.start_tracers(&[TracerTag::new("sword.blade")], true);
//!
//! let report = registry.tick(1.0 / 60.0, &World);
//! assert_eq!(report.fired, 1);
//!
//! // The same subject on a later frame is deduplicated away.
//! registry.tick(1.0 / 60.0, &World);
//! assert_eq!(sink.0.load(Ordering::Relaxed), 1);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in
//! the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `swept-core` | IDs, pose math, shapes, boundary traits |
//! | [`registry`] | `swept-registry` | Slots, handles, policies, the tick pipeline |
//! | [`host`] | `swept-host` | Descriptors, hit cache, per-owner front-end |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types and boundary traits (`swept-core`).
///
/// Identifiers, [`types::Pose`] math, [`types::ShapeDescriptor`], hit
/// records, and the [`types::SweepOracle`] / [`types::PoseSource`] /
/// [`types::HitObserver`] traits.
pub use swept_core as types;

/// The tracer registry and tick pipeline (`swept-registry`).
///
/// [`registry::TracerRegistry`] owns the slots and runs the per-frame
/// phases; [`registry::TracerHandle`] is the stable reference a
/// front-end holds into it.
pub use swept_registry as registry;

/// Owner-side front-end (`swept-host`).
///
/// [`host::TracerHost`] registers [`host::TracerDescriptor`]s,
/// deduplicates hits through the [`host::HitCache`], and surfaces
/// events to a [`host::HitSink`].
pub use swept_host as host;

/// Common imports for typical usage.
///
/// ```rust
/// use swept::prelude::*;
/// ```
pub mod prelude {
    // Core types and traits
    pub use swept_core::{
        FilterSettings, FrameId, HitObserver, HitRecord, Pose, PoseSource, Quat, ShapeDescriptor,
        SubjectId, SweepOracle, TracerTag, Vec3,
    };

    // Registry
    pub use swept_registry::{
        SlotConfig, TickPolicy, TickReport, TracerHandle, TracerRegistry, TracerState,
    };

    // Host front-end
    pub use swept_host::{
        FilterMode, HitSink, PolicySpec, SourceKind, TracedSource, TracerDescriptor, TracerHost,
    };
}
