//! World-space poses and the interpolation used for sub-stepping.

use glam::{Quat, Vec3};

/// A sampled world-space pose: translation plus rotation.
///
/// Scale is intentionally absent — swept shapes carry their own
/// dimensions in [`ShapeDescriptor`](crate::ShapeDescriptor), and the
/// original sampling path normalizes scale away before storing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    /// World-space position.
    pub translation: Vec3,
    /// World-space orientation (unit quaternion).
    pub rotation: Quat,
}

impl Pose {
    /// The identity pose at the origin.
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    /// Build a pose from a translation and rotation.
    pub fn new(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// Build a pose at `translation` with identity rotation.
    pub fn from_translation(translation: Vec3) -> Self {
        Self::new(translation, Quat::IDENTITY)
    }

    /// Linear distance to another pose's translation.
    pub fn distance_to(&self, other: &Pose) -> f32 {
        self.translation.distance(other.translation)
    }

    /// Interpolate between two poses at parameter `t` in `[0, 1]`.
    ///
    /// Translation is lerped; rotation uses a shortest-arc spherical
    /// blend, so sub-step orientation never swings the long way round
    /// between two samples.
    pub fn interpolate(a: &Pose, b: &Pose, t: f32) -> Pose {
        Pose {
            translation: a.translation.lerp(b.translation, t),
            rotation: a.rotation.slerp(b.rotation, t).normalize(),
        }
    }

    /// The pose halfway between `a` and `b`, used as the sweep query's
    /// representative orientation for one sub-step.
    pub fn midpoint(a: &Pose, b: &Pose) -> Pose {
        Self::interpolate(a, b, 0.5)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}
