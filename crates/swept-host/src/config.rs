//! Authoring-time tracer configuration records.

use std::error::Error;
use std::fmt;

use swept_core::{FilterSettings, PoseSource, ShapeDescriptor, TracerTag};
use swept_registry::TickPolicy;

/// What kind of attachment a tracer's pose is sampled from.
///
/// Declared in the descriptor and reported by the provider; the host
/// compares the two at registration. They can drift apart when content
/// is reconfigured (a tracer authored against an articulated joint but
/// bound to a fixed mount, or vice versa).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    /// A fixed mount point on the owner.
    Fixed,
    /// An animated joint whose pose changes independently of the owner.
    Articulated,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed => write!(f, "fixed"),
            Self::Articulated => write!(f, "articulated"),
        }
    }
}

/// A pose provider that knows what kind of attachment it samples.
pub trait TracedSource: PoseSource {
    /// The kind of attachment behind this provider.
    fn kind(&self) -> SourceKind;
}

/// Authoring-time tick policy, in the units a designer works in.
///
/// Converted to a [`TickPolicy`] (which stores intervals) at
/// registration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PolicySpec {
    /// Fire every frame.
    MatchTick,
    /// Fire every `distance` world units of motion.
    EveryDistance {
        /// World units between fires.
        distance: f32,
    },
    /// Fire `target_hz` times per second regardless of frame rate.
    FixedRate {
        /// Target fires per second.
        target_hz: f32,
    },
}

impl PolicySpec {
    /// Convert to the scheduler's interval-based policy.
    pub fn to_policy(self, tag: &TracerTag) -> Result<TickPolicy, ConfigError> {
        match self {
            Self::MatchTick => Ok(TickPolicy::MatchTick),
            Self::EveryDistance { distance } if distance > 0.0 => {
                Ok(TickPolicy::Distance { interval: distance })
            }
            Self::FixedRate { target_hz } if target_hz > 0.0 => Ok(TickPolicy::FixedRate {
                interval: 1.0 / target_hz,
            }),
            _ => Err(ConfigError::NonPositiveRate { tag: tag.clone() }),
        }
    }
}

/// One tracer's authoring-time record.
///
/// The host projects this into a registry slot at registration and on
/// every later change; the pipeline never reads it live.
#[derive(Clone, Debug)]
pub struct TracerDescriptor {
    /// Tag the tracer reports hits under. Several tracers may share
    /// one tag (a blade swept by tracers at several points).
    pub tag: TracerTag,
    /// Swept geometry.
    pub shape: ShapeDescriptor,
    /// When the tracer fires.
    pub policy: PolicySpec,
    /// Subjects whose hits are discarded.
    pub filter: FilterSettings,
    /// Kind of attachment the pose is expected to come from.
    pub source_kind: SourceKind,
}

impl TracerDescriptor {
    /// A descriptor with an empty filter and a fixed source kind.
    pub fn new(tag: impl Into<TracerTag>, shape: ShapeDescriptor, policy: PolicySpec) -> Self {
        Self {
            tag: tag.into(),
            shape,
            policy,
            filter: FilterSettings::none(),
            source_kind: SourceKind::Fixed,
        }
    }
}

/// Registration-time configuration errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A tracer with this tag already exists on the host, declared
    /// against a different source kind. Tags may be shared only by
    /// tracers of the same kind.
    DuplicateTagMismatch {
        /// The contested tag.
        tag: TracerTag,
    },
    /// The policy's distance or rate was zero or negative.
    NonPositiveRate {
        /// Tag of the rejected descriptor.
        tag: TracerTag,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateTagMismatch { tag } => write!(
                f,
                "tracer tag '{tag}' already registered with a different source kind"
            ),
            Self::NonPositiveRate { tag } => {
                write!(f, "tracer '{tag}': tick distance/rate must be positive")
            }
        }
    }
}

impl Error for ConfigError {}
