//! Tick policies: when a tracer fires and how many sub-steps it takes.

use swept_core::Pose;

/// Upper bound on sub-steps per slot per frame. Bounds worst-case
/// oracle cost under large frame-time spikes.
pub const MAX_SUBSTEPS: u32 = 10;

/// Decides whether a tracer fires on a given frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TickPolicy {
    /// Fire every frame, one sub-step. Sub-stepping is effectively
    /// disabled in this mode.
    MatchTick,
    /// Fire once the source has moved at least `interval` world units
    /// since the oldest stored pose; sub-step so no single sweep
    /// segment exceeds `interval`.
    Distance {
        /// Distance between fires, in world units.
        interval: f32,
    },
    /// Fire at a fixed target rate regardless of frame rate.
    ///
    /// The trigger is `elapsed + dt > interval / 2` — an intentional
    /// early-fire bias that keeps the average sampling phase aligned
    /// with the target rate. Do not "fix" this to a full interval.
    FixedRate {
        /// Seconds between fires (`1 / target_rate`).
        interval: f32,
    },
}

impl TickPolicy {
    /// Whether the tracer should fire this frame.
    ///
    /// `oldest` is the oldest stored pose, `current` the pose sampled
    /// this frame, `elapsed` the accumulated time since the last fire,
    /// and `dt` the frame delta.
    pub fn should_fire(&self, oldest: &Pose, current: &Pose, elapsed: f32, dt: f32) -> bool {
        match self {
            Self::MatchTick => true,
            Self::Distance { interval } => oldest.distance_to(current) >= *interval,
            Self::FixedRate { interval } => elapsed + dt > interval / 2.0,
        }
    }

    /// Sub-step count for a firing tracer, clamped to
    /// `1..=`[`MAX_SUBSTEPS`].
    ///
    /// `displacement` is the distance between the two stored poses.
    pub fn substep_count(&self, displacement: f32, dt: f32) -> u32 {
        let raw = match self {
            Self::MatchTick => 1,
            Self::Distance { interval } if *interval > 0.0 => {
                (displacement / interval).ceil() as u32
            }
            Self::FixedRate { interval } if *interval > 0.0 => (dt / interval).ceil() as u32,
            _ => 1,
        };
        raw.clamp(1, MAX_SUBSTEPS)
    }
}
