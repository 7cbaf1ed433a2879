//! In-memory storage backend.
//!
//! Volumes are described entry by entry, so tests and benchmarks can build
//! exactly the trees they need, including the damaged ones forensic images
//! produce: unallocated names, entries without metadata, directories whose
//! first reads fail, and snapshot stores that cannot be opened.
//!
//! # Examples
//!
//! ```
//! use evidence_collector::storage::{EntryTimestamps, MemoryStorage, MemoryVolume, StorageBackend};
//! use std::path::Path;
//!
//! let mut volume = MemoryVolume::new();
//! volume
//!     .add_directory(volume.root(), 10, "Windows")
//!     .add_file(10, 11, "notepad.exe", EntryTimestamps::default());
//!
//! let storage = MemoryStorage::new();
//! storage.add_volume("disk.raw", 0, volume);
//! assert!(storage.open_volume(Path::new("disk.raw"), 0).is_ok());
//! ```

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::storage::{
    DirEntry, EntryMetadata, EntryTimestamps, EntryType, Inode, StorageBackend, StorageError,
    VolumeHandle,
};

const DEFAULT_ROOT_INODE: Inode = 2;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A directory entry as stored in a [`MemoryVolume`]
#[derive(Debug, Clone)]
pub struct MemoryEntry {
    name: Option<String>,
    allocated: bool,
    metadata: Option<EntryMetadata>,
}

impl MemoryEntry {
    pub fn new(name: &str, inode: Inode, entry_type: EntryType, timestamps: EntryTimestamps) -> Self {
        Self {
            name: Some(name.to_string()),
            allocated: true,
            metadata: Some(EntryMetadata {
                inode,
                entry_type,
                timestamps,
            }),
        }
    }

    pub fn file(name: &str, inode: Inode, timestamps: EntryTimestamps) -> Self {
        Self::new(name, inode, EntryType::Regular, timestamps)
    }

    pub fn directory(name: &str, inode: Inode) -> Self {
        Self::new(name, inode, EntryType::Directory, EntryTimestamps::default())
    }

    /// An entry whose metadata record cannot be read
    pub fn without_metadata(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            allocated: true,
            metadata: None,
        }
    }

    /// An entry with no name record
    pub fn nameless(inode: Inode) -> Self {
        Self {
            name: None,
            ..Self::file("", inode, EntryTimestamps::default())
        }
    }

    /// Mark the entry as unallocated
    pub fn unallocated(mut self) -> Self {
        self.allocated = false;
        self
    }

    fn to_dir_entry(&self) -> DirEntry {
        DirEntry {
            name: self.name.clone(),
            allocated: self.allocated,
            metadata: self.metadata.clone().ok_or(StorageError::MissingMetadata),
        }
    }
}

/// A volume held in memory
#[derive(Debug)]
pub struct MemoryVolume {
    root: Inode,
    directories: HashMap<Inode, Vec<MemoryEntry>>,
    pending_failures: Mutex<HashMap<Inode, u32>>,
    directory_reads: Mutex<HashMap<Inode, usize>>,
}

impl Default for MemoryVolume {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryVolume {
    pub fn new() -> Self {
        Self::with_root(DEFAULT_ROOT_INODE)
    }

    pub fn with_root(root: Inode) -> Self {
        let mut directories = HashMap::new();
        directories.insert(root, Vec::new());
        Self {
            root,
            directories,
            pending_failures: Mutex::new(HashMap::new()),
            directory_reads: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> Inode {
        self.root
    }

    /// Add a raw entry to the directory `parent`
    pub fn add_entry(&mut self, parent: Inode, entry: MemoryEntry) -> &mut Self {
        if let Some(EntryMetadata {
            inode,
            entry_type: EntryType::Directory,
            ..
        }) = &entry.metadata
        {
            self.directories.entry(*inode).or_default();
        }
        self.directories.entry(parent).or_default().push(entry);
        self
    }

    pub fn add_directory(&mut self, parent: Inode, inode: Inode, name: &str) -> &mut Self {
        self.add_entry(parent, MemoryEntry::directory(name, inode))
    }

    pub fn add_file(
        &mut self,
        parent: Inode,
        inode: Inode,
        name: &str,
        timestamps: EntryTimestamps,
    ) -> &mut Self {
        self.add_entry(parent, MemoryEntry::file(name, inode, timestamps))
    }

    /// Make the next `count` reads of directory `inode` fail with an I/O error
    pub fn fail_reads(&mut self, inode: Inode, count: u32) -> &mut Self {
        lock(&self.pending_failures).insert(inode, count);
        self
    }

    /// How many times directory `inode` was opened, failed attempts included
    pub fn directory_reads(&self, inode: Inode) -> usize {
        lock(&self.directory_reads).get(&inode).copied().unwrap_or(0)
    }
}

impl VolumeHandle for MemoryVolume {
    fn root_inode(&self) -> Inode {
        self.root
    }

    fn open_directory(&self, inode: Inode) -> Result<Vec<DirEntry>, StorageError> {
        *lock(&self.directory_reads).entry(inode).or_insert(0) += 1;

        if let Some(remaining) = lock(&self.pending_failures).get_mut(&inode) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StorageError::Io(io::Error::new(
                    io::ErrorKind::Other,
                    format!("simulated read failure on directory {}", inode),
                )));
            }
        }

        self.directories
            .get(&inode)
            .map(|entries| entries.iter().map(MemoryEntry::to_dir_entry).collect())
            .ok_or(StorageError::NotADirectory(inode))
    }
}

type VolumeKey = (PathBuf, u64);

/// Backend serving [`MemoryVolume`]s by container path and offset
#[derive(Default)]
pub struct MemoryStorage {
    volumes: Mutex<HashMap<VolumeKey, Arc<MemoryVolume>>>,
    snapshots: Mutex<HashMap<VolumeKey, BTreeMap<u32, Option<Arc<MemoryVolume>>>>>,
    volume_opens: AtomicUsize,
    snapshot_opens: Mutex<Vec<u32>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the main volume at `offset`, returning a handle for inspection
    pub fn add_volume(&self, container: impl Into<PathBuf>, offset: u64, volume: MemoryVolume) -> Arc<MemoryVolume> {
        let volume = Arc::new(volume);
        lock(&self.volumes).insert((container.into(), offset), Arc::clone(&volume));
        volume
    }

    /// Register snapshot store `store_number` of the volume at `offset`
    pub fn add_snapshot(
        &self,
        container: impl Into<PathBuf>,
        offset: u64,
        store_number: u32,
        volume: MemoryVolume,
    ) -> Arc<MemoryVolume> {
        let volume = Arc::new(volume);
        lock(&self.snapshots)
            .entry((container.into(), offset))
            .or_default()
            .insert(store_number, Some(Arc::clone(&volume)));
        volume
    }

    /// Register a snapshot store that is counted but cannot be opened
    pub fn add_broken_snapshot(&self, container: impl Into<PathBuf>, offset: u64, store_number: u32) {
        lock(&self.snapshots)
            .entry((container.into(), offset))
            .or_default()
            .insert(store_number, None);
    }

    /// Number of successful main volume opens
    pub fn volume_open_count(&self) -> usize {
        self.volume_opens.load(Ordering::SeqCst)
    }

    /// Snapshot store numbers in the order they were opened
    pub fn opened_snapshots(&self) -> Vec<u32> {
        lock(&self.snapshot_opens).clone()
    }

    fn open_error(container: &Path, reason: &str) -> StorageError {
        StorageError::Open {
            container: container.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

impl StorageBackend for MemoryStorage {
    fn open_volume(&self, container: &Path, offset: u64) -> Result<Arc<dyn VolumeHandle>, StorageError> {
        let volume = lock(&self.volumes)
            .get(&(container.to_path_buf(), offset))
            .cloned()
            .ok_or_else(|| Self::open_error(container, &format!("no filesystem at offset {}", offset)))?;

        self.volume_opens.fetch_add(1, Ordering::SeqCst);
        Ok(volume as Arc<dyn VolumeHandle>)
    }

    fn open_snapshot(
        &self,
        container: &Path,
        offset: u64,
        store_number: u32,
    ) -> Result<Arc<dyn VolumeHandle>, StorageError> {
        let volume = lock(&self.snapshots)
            .get(&(container.to_path_buf(), offset))
            .and_then(|stores| stores.get(&store_number).cloned())
            .flatten()
            .ok_or_else(|| Self::open_error(container, &format!("snapshot store {} is unreadable", store_number)))?;

        lock(&self.snapshot_opens).push(store_number);
        Ok(volume as Arc<dyn VolumeHandle>)
    }

    fn count_snapshots(&self, container: &Path, offset: u64) -> Result<u32, StorageError> {
        let count = lock(&self.snapshots)
            .get(&(container.to_path_buf(), offset))
            .map(|stores| stores.len())
            .unwrap_or(0);
        Ok(count as u32)
    }
}
