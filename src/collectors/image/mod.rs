//! Collection from volumes inside disk images.
//!
//! [`ImageCollector`] walks the main volume and then, when asked, each
//! selected snapshot store in ascending order. Files in snapshot stores are
//! only emitted when their timestamps differ from every earlier occurrence
//! of the same inode ([`SnapshotDeduplicator`]).

/// Image collector
pub mod collector;

/// Per-inode timestamp fingerprints for snapshot walks
pub mod dedup;

/// Offset resolution and snapshot store selection
pub mod source;

/// Worklist walk over one open volume
pub mod walker;

pub use collector::ImageCollector;
pub use dedup::SnapshotDeduplicator;
pub use source::{resolve_byte_offset, select_snapshot_stores, ImageSource};
pub use walker::VolumeWalker;
