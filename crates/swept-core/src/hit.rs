//! Hit records and per-tracer query filter settings.

use glam::Vec3;
use smallvec::SmallVec;

use crate::id::SubjectId;

/// One contact reported by the sweep oracle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HitRecord {
    /// The entity that was hit.
    pub subject: SubjectId,
    /// World-space impact point.
    pub position: Vec3,
    /// World-space surface normal at the impact point.
    pub normal: Vec3,
    /// Distance along the sweep at which the contact occurred.
    pub distance: f32,
}

impl HitRecord {
    /// Convenience constructor for a contact with no surface detail.
    pub fn on_subject(subject: SubjectId) -> Self {
        Self {
            subject,
            position: Vec3::ZERO,
            normal: Vec3::Z,
            distance: 0.0,
        }
    }
}

/// Query filter settings copied into the slot alongside the shape.
///
/// The ignored-subject list always contains the tracer's own source
/// and owner so a weapon never reports hitting its wielder. Most
/// tracers ignore one or two subjects, hence the inline capacity.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterSettings {
    /// Subjects whose hits are discarded before caching or delivery.
    pub ignored: SmallVec<[SubjectId; 4]>,
}

impl FilterSettings {
    /// Filter that ignores nothing.
    pub fn none() -> Self {
        Self::default()
    }

    /// Add a subject to the ignore list (idempotent).
    pub fn ignore(&mut self, subject: SubjectId) {
        if !self.ignored.contains(&subject) {
            self.ignored.push(subject);
        }
    }

    /// Whether hits on `subject` should be discarded.
    pub fn is_ignored(&self, subject: SubjectId) -> bool {
        self.ignored.contains(&subject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignore_is_idempotent() {
        let mut f = FilterSettings::none();
        f.ignore(SubjectId(7));
        f.ignore(SubjectId(7));
        assert_eq!(f.ignored.len(), 1);
        assert!(f.is_ignored(SubjectId(7)));
        assert!(!f.is_ignored(SubjectId(8)));
    }
}
