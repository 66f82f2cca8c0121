//! Tracer slot registry and the per-frame sweep pipeline.
//!
//! [`TracerRegistry`] owns a dense array of [`TracerSlot`]s and runs a
//! fixed three-phase pipeline once per frame, plus a structural sweep:
//!
//! ```text
//! tick(dt, oracle)
//! ├── phase 1  transform update   (parallel, per slot)
//! │             sample pose, evaluate tick policy, mark fire flag
//! ├── phase 2  sweep execution    (parallel, per slot)
//! │             derive sub-step count, interpolate, call oracle
//! ├── phase 3  delivery           (sequential, driver thread)
//! │             hand batches to owners, advance history/lifecycle
//! └── phase 4  deferred add/remove sweep (structural mutation)
//! ```
//!
//! Phases 1–2 never touch registry structure, so they fan out across
//! the rayon pool with one task per slot. Removal and allocation
//! requests that arrive while a pass is running are deferred onto the
//! slot's shared control word ([`handle::SlotCore`]) and a staging
//! list, and applied in phase 4.

#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod handle;
pub mod policy;
pub mod registry;
pub mod report;
pub mod slot;
pub mod substep;

pub use error::{RegistryError, SlotFault};
pub use handle::{Generation, TracerHandle};
pub use policy::{TickPolicy, MAX_SUBSTEPS};
pub use registry::TracerRegistry;
pub use report::TickReport;
pub use slot::{SlotConfig, TracerSlot, TracerState};
pub use substep::SubstepBatch;
