//! Core types and boundary traits for the swept tracer scheduler.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the fundamental abstractions used throughout the workspace: tracer
//! tags and subject identifiers, pose math, shape descriptors, hit
//! records, and the three traits that mark the scheduler's external
//! boundaries ([`SweepOracle`], [`PoseSource`], [`HitObserver`]).

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod hit;
pub mod id;
pub mod pose;
pub mod shape;
pub mod traits;

pub use hit::{FilterSettings, HitRecord};
pub use id::{FrameId, SubjectId, TracerTag};
pub use pose::Pose;
pub use shape::ShapeDescriptor;
pub use traits::{HitObserver, PoseSource, SweepOracle};

// Re-exported so downstream crates share one math version.
pub use glam::{Quat, Vec3};
