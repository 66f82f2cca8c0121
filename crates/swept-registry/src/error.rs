//! Error and fault types for the registry.
//!
//! Nothing here is fatal to the scheduler: a [`RegistryError`] makes
//! one operation a no-op, and a [`SlotFault`] degrades one tracer for
//! one frame. Both are surfaced as warnings, never panics.

use std::error::Error;
use std::fmt;

use swept_core::TracerTag;

/// Errors from handle-addressed registry operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// The handle's generation no longer matches the slot at its
    /// index — the slot was removed (and possibly reused). The
    /// requested operation was not performed.
    StaleHandle {
        /// Index the handle pointed at.
        index: u32,
    },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StaleHandle { index } => {
                write!(f, "stale tracer handle (slot index {index})")
            }
        }
    }
}

impl Error for RegistryError {}

/// Per-slot, per-frame degradations recorded in the tick report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlotFault {
    /// The slot's pose source vanished this frame; the tracer was
    /// stopped.
    InvalidSource {
        /// Tag of the affected tracer.
        tag: TracerTag,
    },
    /// A sweep was scheduled with fewer than two stored poses; the
    /// sweep was skipped for this frame.
    DegenerateHistory {
        /// Tag of the affected tracer.
        tag: TracerTag,
    },
    /// The owning front-end was dropped without removing the slot;
    /// delivery was skipped.
    MissingOwner {
        /// Tag of the affected tracer.
        tag: TracerTag,
    },
}

impl SlotFault {
    /// Tag of the tracer the fault degraded.
    pub fn tag(&self) -> &TracerTag {
        match self {
            Self::InvalidSource { tag }
            | Self::DegenerateHistory { tag }
            | Self::MissingOwner { tag } => tag,
        }
    }
}

impl fmt::Display for SlotFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSource { tag } => {
                write!(f, "tracer '{tag}': pose source invalid, tracer stopped")
            }
            Self::DegenerateHistory { tag } => {
                write!(f, "tracer '{tag}': fewer than 2 stored poses, sweep skipped")
            }
            Self::MissingOwner { tag } => {
                write!(f, "tracer '{tag}': owner dropped, delivery skipped")
            }
        }
    }
}

impl Error for SlotFault {}
