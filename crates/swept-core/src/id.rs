//! Strongly-typed identifiers for tracers, hit subjects, and frames.

use std::fmt;
use std::sync::Arc;

/// Identifier for a tracer, scoped to its owning host.
///
/// Tags are cheap to clone (shared string storage) and compared by
/// value. Several tracers on the same host may share a tag; hit-cache
/// filtering and start/stop requests address tracers by tag, not by
/// handle.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TracerTag(Arc<str>);

impl TracerTag {
    /// Create a tag from a string.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// The tag's textual name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TracerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TracerTag {
    fn from(v: &str) -> Self {
        Self::new(v)
    }
}

/// Identifies the entity a sweep hit (an actor, body, or collider).
///
/// Opaque to the scheduler: equality is all the hit cache needs to
/// suppress duplicate notifications for the same subject.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubjectId(pub u64);

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SubjectId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Monotonically increasing frame counter.
///
/// Incremented once per registry tick; recorded in hit-cache entries
/// and passed through to delivery callbacks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub u64);

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for FrameId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}
