//! Access to the storage substrates the image collectors walk.
//!
//! The collectors only need a small contract from the filesystem layer:
//! open a volume (or one of its snapshot stores) at a byte offset inside a
//! container, count the snapshot stores, and list the entries of a directory
//! inode. [`StorageBackend`] and [`VolumeHandle`] capture that contract;
//! [`FilesystemCache`] memoizes open handles for one collection run.
//!
//! ## Backends
//!
//! - [`NtfsBackend`]: raw NTFS images read through the `ntfs` crate
//! - [`MemoryStorage`]: in-memory volumes and snapshot stores, used to
//!   simulate evidence in tests and benchmarks

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Filesystem cache keyed by container, offset and snapshot store
pub mod cache;

/// In-memory backend
pub mod memory;

/// NTFS image backend
pub mod ntfs_image;

pub use cache::{FilesystemCache, FilesystemHandle};
pub use memory::{MemoryStorage, MemoryVolume};
pub use ntfs_image::NtfsBackend;

use crate::constants::SKIPPED_ENTRY_NAMES;

/// Address of a file or directory's metadata within a volume
pub type Inode = u64;

/// Whole seconds plus a sub-second fraction, as stored by the filesystem
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TimeValue {
    pub seconds: i64,
    pub fraction: u64,
}

impl TimeValue {
    pub fn new(seconds: i64, fraction: u64) -> Self {
        Self { seconds, fraction }
    }
}

/// The four timestamps of an entry; absent values read as zero
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EntryTimestamps {
    pub accessed: Option<TimeValue>,
    pub created: Option<TimeValue>,
    pub modified: Option<TimeValue>,
    pub changed: Option<TimeValue>,
}

impl EntryTimestamps {
    /// All four timestamps set to the same value
    pub fn uniform(value: TimeValue) -> Self {
        Self {
            accessed: Some(value),
            created: Some(value),
            modified: Some(value),
            changed: Some(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    Regular,
    Directory,
    Symlink,
    Other,
}

/// Metadata of a directory entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMetadata {
    pub inode: Inode,
    pub entry_type: EntryType,
    pub timestamps: EntryTimestamps,
}

/// One entry of a directory listing
#[derive(Debug)]
pub struct DirEntry {
    /// Entry name; `None` when the name record is missing
    pub name: Option<String>,
    /// `false` when the name refers to an unallocated (deleted or reused) record
    pub allocated: bool,
    pub metadata: Result<EntryMetadata, StorageError>,
}

impl DirEntry {
    /// Whether the entry should take part in a walk at all.
    ///
    /// Nameless, unallocated and pseudo entries (`.`, `..`, `$OrphanFiles`)
    /// are dropped before their metadata is looked at.
    pub fn is_walkable(&self) -> bool {
        match &self.name {
            Some(name) if !name.is_empty() => {
                self.allocated && !SKIPPED_ENTRY_NAMES.contains(&name.as_str())
            }
            _ => false,
        }
    }
}

/// Errors reported by storage backends
#[derive(Debug)]
pub enum StorageError {
    /// The container or the filesystem inside it cannot be opened
    Open { container: PathBuf, reason: String },
    /// An I/O failure while reading filesystem structures
    Io(io::Error),
    /// The inode does not refer to a directory
    NotADirectory(Inode),
    /// The entry has no readable metadata record
    MissingMetadata,
    /// The backend cannot provide the requested substrate
    Unsupported(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Open { container, reason } => {
                write!(f, "unable to open filesystem in {}: {}", container.display(), reason)
            }
            StorageError::Io(e) => write!(f, "I/O error: {}", e),
            StorageError::NotADirectory(inode) => write!(f, "inode {} is not a directory", inode),
            StorageError::MissingMetadata => write!(f, "entry has no metadata"),
            StorageError::Unsupported(what) => write!(f, "unsupported: {}", what),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        StorageError::Io(e)
    }
}

/// An open volume (or snapshot store of a volume)
pub trait VolumeHandle: Send + Sync {
    fn root_inode(&self) -> Inode;

    /// List the entries of the directory at `inode`
    fn open_directory(&self, inode: Inode) -> Result<Vec<DirEntry>, StorageError>;
}

/// The low-level filesystem access layer
pub trait StorageBackend: Send + Sync {
    fn open_volume(&self, container: &Path, offset: u64) -> Result<Arc<dyn VolumeHandle>, StorageError>;

    fn open_snapshot(
        &self,
        container: &Path,
        offset: u64,
        store_number: u32,
    ) -> Result<Arc<dyn VolumeHandle>, StorageError>;

    fn count_snapshots(&self, container: &Path, offset: u64) -> Result<u32, StorageError>;
}

/// Join a directory's logical path and a child name with a forward slash
pub fn join_logical_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{}{}", parent, name)
    } else {
        format!("{}/{}", parent, name)
    }
}
