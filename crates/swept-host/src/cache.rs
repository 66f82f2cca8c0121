//! Hit cache: bounded append log suppressing duplicate notifications.

use tracing::warn;

use swept_core::{FrameId, SubjectId, TracerTag};

/// Default soft cap on cache entries. Growing past it usually means a
/// missing cache-reset call on the owner.
pub const DEFAULT_SOFT_CAP: usize = 2048;

/// Scope within which a repeat subject is suppressed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FilterMode {
    /// No filtering and no cache writes; every hit surfaces.
    #[default]
    None,
    /// Suppress a repeat subject only within the same tracer tag.
    SameSubjectPerTracer,
    /// Suppress a repeat subject across every tracer on the owner.
    SameSubjectAcrossTracers,
}

/// One remembered hit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HitCacheEntry {
    /// The subject that was hit.
    pub subject: SubjectId,
    /// Tag of the tracer that reported the hit.
    pub tag: TracerTag,
    /// Frame on which the hit was first surfaced.
    pub frame: FrameId,
}

/// Per-owner append log of surfaced hits.
///
/// Never pruned by age: entries leave only through an explicit reset
/// (full or tag-scoped) or the soft-cap overflow clear. Overflow is a
/// diagnostic, not an error — the cache clears itself and keeps
/// working, at the cost of re-surfacing previously seen subjects.
#[derive(Debug)]
pub struct HitCache {
    entries: Vec<HitCacheEntry>,
    soft_cap: usize,
}

impl HitCache {
    /// A cache with the default soft cap.
    pub fn new() -> Self {
        Self::with_soft_cap(DEFAULT_SOFT_CAP)
    }

    /// A cache with an explicit soft cap.
    pub fn with_soft_cap(soft_cap: usize) -> Self {
        Self {
            entries: Vec::new(),
            soft_cap,
        }
    }

    /// Number of remembered hits.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decide whether a hit on `subject` by the tracer `tag` is new
    /// under `mode`, recording it if so.
    ///
    /// Checks the soft cap on entry: a full cache is cleared with a
    /// warning, and the current hit is then recorded against the
    /// cleared cache. `FilterMode::None` always reports new and never
    /// writes.
    pub fn check_and_record(
        &mut self,
        subject: SubjectId,
        tag: &TracerTag,
        frame: FrameId,
        mode: FilterMode,
    ) -> bool {
        if mode == FilterMode::None {
            return true;
        }

        if self.entries.len() >= self.soft_cap {
            warn!(
                cap = self.soft_cap,
                "hit cache overflow, clearing; is a reset call missing?"
            );
            self.entries.clear();
        }

        let duplicate = self.entries.iter().any(|entry| {
            entry.subject == subject
                && match mode {
                    FilterMode::SameSubjectPerTracer => entry.tag == *tag,
                    FilterMode::SameSubjectAcrossTracers => true,
                    FilterMode::None => false,
                }
        });
        if duplicate {
            return false;
        }

        self.entries.push(HitCacheEntry {
            subject,
            tag: tag.clone(),
            frame,
        });
        true
    }

    /// Forget everything.
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// Forget only entries recorded under one of `tags`. Invoked when
    /// a tracer burst begins so the new burst re-surfaces subjects hit
    /// by the previous one.
    pub fn reset_tags(&mut self, tags: &[TracerTag]) {
        self.entries.retain(|entry| !tags.contains(&entry.tag));
    }
}

impl Default for HitCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(s: &str) -> TracerTag {
        TracerTag::new(s)
    }

    #[test]
    fn per_tracer_scope_suppresses_within_one_tag() {
        let mut cache = HitCache::new();
        let mode = FilterMode::SameSubjectPerTracer;
        assert!(cache.check_and_record(SubjectId(1), &tag("a"), FrameId(0), mode));
        assert!(!cache.check_and_record(SubjectId(1), &tag("a"), FrameId(1), mode));
        // Same subject under a different tag is a separate event.
        assert!(cache.check_and_record(SubjectId(1), &tag("b"), FrameId(1), mode));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn across_tracers_scope_suppresses_regardless_of_tag() {
        let mut cache = HitCache::new();
        let mode = FilterMode::SameSubjectAcrossTracers;
        assert!(cache.check_and_record(SubjectId(1), &tag("a"), FrameId(0), mode));
        assert!(!cache.check_and_record(SubjectId(1), &tag("b"), FrameId(0), mode));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn none_mode_never_writes() {
        let mut cache = HitCache::new();
        assert!(cache.check_and_record(SubjectId(1), &tag("a"), FrameId(0), FilterMode::None));
        assert!(cache.check_and_record(SubjectId(1), &tag("a"), FrameId(1), FilterMode::None));
        assert!(cache.is_empty());
    }

    #[test]
    fn overflow_clears_then_records_against_empty_cache() {
        let mut cache = HitCache::new();
        let mode = FilterMode::SameSubjectPerTracer;
        for i in 0..DEFAULT_SOFT_CAP as u64 {
            assert!(cache.check_and_record(SubjectId(i), &tag("a"), FrameId(0), mode));
        }
        assert_eq!(cache.len(), DEFAULT_SOFT_CAP);

        // Entry 2049 finds the cache at the cap, clears it, and lands
        // in the cleared cache.
        assert!(cache.check_and_record(SubjectId(99_999), &tag("a"), FrameId(1), mode));
        assert_eq!(cache.len(), 1);

        // Previously suppressed subjects surface again after the clear.
        assert!(cache.check_and_record(SubjectId(0), &tag("a"), FrameId(1), mode));
    }

    #[test]
    fn tag_scoped_reset_spares_other_tags() {
        let mut cache = HitCache::new();
        let mode = FilterMode::SameSubjectPerTracer;
        cache.check_and_record(SubjectId(1), &tag("a"), FrameId(0), mode);
        cache.check_and_record(SubjectId(1), &tag("b"), FrameId(0), mode);

        cache.reset_tags(&[tag("a")]);
        assert_eq!(cache.len(), 1);
        assert!(cache.check_and_record(SubjectId(1), &tag("a"), FrameId(1), mode));
        assert!(!cache.check_and_record(SubjectId(1), &tag("b"), FrameId(1), mode));
    }
}
