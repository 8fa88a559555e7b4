//! sl-store: durable job state for the transcoding pipeline.
//!
//! Provides the per-video status snapshot store (atomic JSON files under the
//! media root, one per video) and the registry of uploaded videos. The
//! snapshot is the single source of truth for transcode progress; nothing in
//! this crate infers state from directory listings.

pub mod model;
pub mod registry;
pub mod snapshot;

// Re-export the most commonly used items at the crate root.
pub use model::{JobState, TranscodeStatus, VariantRecord, VariantState};
pub use registry::{RegistryEntry, VideoRegistry};
pub use snapshot::SnapshotStore;
