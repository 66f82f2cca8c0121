//! Generational tracer handles and the shared slot control word.
//!
//! A [`TracerHandle`] is the only reference a front-end ever holds
//! into the registry. It wraps an [`Arc<SlotCore>`] shared with the
//! slot itself, so swap-removal can rewrite the displaced slot's index
//! with a single atomic store and every outstanding handle observes
//! the new position immediately. The [`Generation`] is still validated
//! against the table entry on structural operations; a mismatch is a
//! data-integrity warning and the operation becomes a no-op.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use crate::slot::{SlotConfig, TracerState};

/// Counter for unique [`Generation`] allocation.
static GENERATION_COUNTER: AtomicU32 = AtomicU32::new(1);

/// Sentinel index for a core that is staged (not yet in the dense
/// array) or detached (removed from it).
pub(crate) const INVALID_INDEX: u32 = u32::MAX;

/// Opaque token invalidated on every reuse of a slot index.
///
/// Allocated from a process-wide monotonic counter, so two slots never
/// share a generation even across registries. A handle is valid only
/// while its generation matches the slot currently at its index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(u32);

impl Generation {
    /// Allocate a fresh, unique generation. Thread-safe.
    pub(crate) fn next() -> Self {
        Self(GENERATION_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shared control word for one tracer slot.
///
/// Holds the fields that must be readable and writable without the
/// registry's structural lock: the slot's current index, its lifecycle
/// state, and the deferred-mutation flags consumed by the pipeline.
/// The slot and every handle to it share one `Arc<SlotCore>`.
pub struct SlotCore {
    /// Current position in the dense array, or [`INVALID_INDEX`].
    index: AtomicU32,
    /// Fixed for the core's lifetime.
    generation: Generation,
    /// Lifecycle state, polled by the sub-step and delivery loops.
    state: AtomicU8,
    /// Set once the slot has been removed; distinguishes a dead core
    /// from one that is merely staged.
    dead: AtomicBool,
    /// Set when removal is requested during an active pass.
    pending_removal: AtomicBool,
    /// Set on every activation; the next transform update consumes it
    /// to reset the elapsed accumulator and clear pose history.
    activation_pending: AtomicBool,
    /// Config projected while a pass was running; drained by phase 4.
    pending_config: Mutex<Option<SlotConfig>>,
}

impl SlotCore {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            index: AtomicU32::new(INVALID_INDEX),
            generation: Generation::next(),
            state: AtomicU8::new(TracerState::Stopped as u8),
            dead: AtomicBool::new(false),
            pending_removal: AtomicBool::new(false),
            activation_pending: AtomicBool::new(false),
            pending_config: Mutex::new(None),
        })
    }

    pub(crate) fn generation(&self) -> Generation {
        self.generation
    }

    pub(crate) fn index(&self) -> u32 {
        self.index.load(Ordering::Acquire)
    }

    pub(crate) fn set_index(&self, index: u32) {
        self.index.store(index, Ordering::Release);
    }

    pub(crate) fn detach(&self) {
        self.set_state(TracerState::Stopped);
        self.index.store(INVALID_INDEX, Ordering::Release);
        self.dead.store(true, Ordering::Release);
    }

    pub(crate) fn is_dead(&self) -> bool {
        self.dead.load(Ordering::Acquire)
    }

    pub(crate) fn state(&self) -> TracerState {
        TracerState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: TracerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Stop transition: `Active` becomes `PendingStop` unless
    /// `immediate`; any other state goes straight to `Stopped`.
    pub(crate) fn request_stop(&self, immediate: bool) {
        if !immediate
            && self
                .state
                .compare_exchange(
                    TracerState::Active as u8,
                    TracerState::PendingStop as u8,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
        {
            return;
        }
        self.set_state(TracerState::Stopped);
    }

    pub(crate) fn mark_pending_removal(&self) {
        self.pending_removal.store(true, Ordering::Release);
    }

    pub(crate) fn is_pending_removal(&self) -> bool {
        self.pending_removal.load(Ordering::Acquire)
    }

    pub(crate) fn mark_activation_pending(&self) {
        self.activation_pending.store(true, Ordering::Release);
    }

    pub(crate) fn take_activation_pending(&self) -> bool {
        self.activation_pending.swap(false, Ordering::AcqRel)
    }

    /// Stash a config projected while a pass was running. Phase 4
    /// applies the most recent stash.
    pub(crate) fn stash_config(&self, config: SlotConfig) {
        *self.pending_config.lock().unwrap() = Some(config);
    }

    pub(crate) fn take_stashed_config(&self) -> Option<SlotConfig> {
        self.pending_config.lock().unwrap().take()
    }
}

/// Stable reference to a tracer slot across structural mutation.
///
/// Cheap to clone; safe to hold past the slot's removal (operations on
/// a stale handle are warnings and no-ops, never aliasing a new
/// tracer).
#[derive(Clone)]
pub struct TracerHandle {
    core: Arc<SlotCore>,
}

impl TracerHandle {
    pub(crate) fn from_core(core: Arc<SlotCore>) -> Self {
        Self { core }
    }

    pub(crate) fn core(&self) -> &Arc<SlotCore> {
        &self.core
    }

    /// The slot's current index in the registry's dense array, or
    /// `None` if the slot is staged or has been removed.
    pub fn index(&self) -> Option<u32> {
        match self.core.index() {
            INVALID_INDEX => None,
            i => Some(i),
        }
    }

    /// The handle's generation token.
    pub fn generation(&self) -> Generation {
        self.core.generation()
    }

    /// Current lifecycle state of the tracer.
    pub fn state(&self) -> TracerState {
        self.core.state()
    }

    /// Whether the tracer is currently `Active` or `PendingStop`.
    pub fn is_active(&self) -> bool {
        self.core.state() != TracerState::Stopped
    }
}

impl fmt::Display for TracerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index() {
            Some(i) => write!(f, "TracerHandle(idx={i}, gen={})", self.generation()),
            None => write!(f, "TracerHandle(detached, gen={})", self.generation()),
        }
    }
}

impl fmt::Debug for TracerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
