//! Swept-shape geometry descriptors.

use glam::Vec3;
use std::fmt;

/// Geometry swept through the world by one tracer.
///
/// Descriptors are plain data copied into the tracer slot at
/// registration; deriving them from skeletal bones, physics assets, or
/// mesh sockets is the front-end's job and out of the scheduler's
/// scope.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ShapeDescriptor {
    /// A sphere of the given radius.
    Sphere {
        /// Sphere radius.
        radius: f32,
    },
    /// A capsule aligned to the pose's local up axis.
    Capsule {
        /// Cylinder radius.
        radius: f32,
        /// Half the distance between the hemisphere centers.
        half_height: f32,
    },
    /// An oriented box.
    Box {
        /// Half extents along the pose's local axes.
        half_extents: Vec3,
    },
}

impl ShapeDescriptor {
    /// Radius of a sphere that bounds the shape, used by oracles that
    /// want a cheap broad-phase reject.
    pub fn bounding_radius(&self) -> f32 {
        match self {
            Self::Sphere { radius } => *radius,
            Self::Capsule {
                radius,
                half_height,
            } => radius + half_height,
            Self::Box { half_extents } => half_extents.length(),
        }
    }
}

impl fmt::Display for ShapeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sphere { radius } => write!(f, "sphere(r={radius})"),
            Self::Capsule {
                radius,
                half_height,
            } => write!(f, "capsule(r={radius}, hh={half_height})"),
            Self::Box { half_extents } => write!(f, "box({half_extents})"),
        }
    }
}
