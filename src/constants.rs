//! Global constants for the evidence collector.
//!
//! This module centralizes hardcoded values used across the collectors,
//! the storage backends and the command line front-end.

// Image addressing
/// Sector size used to convert a sector offset into a byte offset
pub const SECTOR_SIZE: u64 = 512;

// Traversal
/// Pseudo-entry the filesystem layer exposes for orphaned files
pub const ORPHAN_FILES_ENTRY: &str = "$OrphanFiles";

/// Names that never describe a real child of a directory
pub const SKIPPED_ENTRY_NAMES: &[&str] = &[".", "..", ORPHAN_FILES_ENTRY];

/// How many times a directory is opened before its subtree is abandoned
pub const MAX_DIRECTORY_OPEN_ATTEMPTS: u8 = 2;

/// Logical path of a volume's root directory
pub const ROOT_PATH: &str = "/";

// Queue
/// Default capacity of the bounded output queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

// NTFS
/// Difference between the NTFS epoch (1601-01-01) and the Unix epoch in seconds
pub const NTFS_UNIX_EPOCH_DIFF_SECS: i64 = 11_644_473_600;

/// NTFS timestamps count 100ns intervals
pub const NTFS_TICKS_PER_SECOND: u64 = 10_000_000;

/// Buffer size for reads against an image file (1MB)
pub const IMAGE_READ_BUFFER_SIZE: usize = 1024 * 1024;

// Filter files
/// Comment marker in collection filter files
pub const FILTER_COMMENT_PREFIX: char = '#';

// Default file names
pub const DEFAULT_CONFIG_NAME: &str = "collection.yaml";
