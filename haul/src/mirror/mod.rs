//! Deferred publication of the journal to an external mirror.
//!
//! Movers mark their entity dirty through a [`MirrorHandle`] after each journal write. A
//! [`MirroredPublisher`] later rebuilds both journal tables from a [`crate::journal::Journal`]
//! snapshot, derives a schema manifest and hands everything to a [`MirrorTarget`] in one pass.

mod handle;
mod manifest;
mod publisher;
mod snapshot;
mod target;

pub use handle::MirrorHandle;
pub use manifest::{ManifestColumn, MirrorManifest, TableManifest, manifest_type};
pub use publisher::{MirroredPublisher, PublishOutcome};
pub use snapshot::{MirrorSnapshot, MirrorTable, RUN_EVENTS_TABLE, WATERMARKS_TABLE};
pub use target::{
    ConfiguredMirrorTarget, DirectoryMirrorTarget, MANIFEST_FILE, MemoryMirrorTarget,
    MirrorTarget,
};
