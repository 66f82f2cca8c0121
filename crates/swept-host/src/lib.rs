//! Owner-side tracer front-end.
//!
//! A [`TracerHost`] is one owning entity's view of the scheduler: it
//! turns authoring-time [`TracerDescriptor`]s into registry slots,
//! receives their raw hit batches, deduplicates them through a
//! [`HitCache`], and surfaces clean events to the owner's [`HitSink`].
//!
//! ```text
//! TracerDescriptor ──add_tracer()──▶ TracerHost ──allocate()──▶ registry
//!                                        ▲                         │
//!        HitSink ◀──on_hit_detected── HitCache ◀────deliver()──────┘
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod cache;
pub mod config;
pub mod host;

pub use cache::{FilterMode, HitCache, HitCacheEntry, DEFAULT_SOFT_CAP};
pub use config::{ConfigError, PolicySpec, SourceKind, TracedSource, TracerDescriptor};
pub use host::{HitSink, TracerHost};
