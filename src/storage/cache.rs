//! Cache of open filesystem handles, keyed by container path, byte offset
//! and snapshot store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;

use crate::storage::{DirEntry, Inode, StorageBackend, StorageError, VolumeHandle};

/// An open volume at a given container path and byte offset
pub struct FilesystemHandle {
    container_path: PathBuf,
    offset: u64,
    store_number: Option<u32>,
    volume: Arc<dyn VolumeHandle>,
}

impl FilesystemHandle {
    pub fn container_path(&self) -> &Path {
        &self.container_path
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Snapshot store this handle reads from; `None` for the main volume
    pub fn store_number(&self) -> Option<u32> {
        self.store_number
    }

    pub fn root_inode(&self) -> Inode {
        self.volume.root_inode()
    }

    pub fn open_directory(&self, inode: Inode) -> Result<Vec<DirEntry>, StorageError> {
        self.volume.open_directory(inode)
    }
}

type HandleKey = (PathBuf, u64, Option<u32>);

/// Memoizes handles for the lifetime of one collection run.
///
/// Failed opens are not cached, so a later open of the same triple tries
/// again.
pub struct FilesystemCache {
    backend: Arc<dyn StorageBackend>,
    handles: HashMap<HandleKey, Arc<FilesystemHandle>>,
}

impl FilesystemCache {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            handles: HashMap::new(),
        }
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// Open the main volume (`store_number == None`) or one snapshot store
    pub fn open(
        &mut self,
        container: &Path,
        offset: u64,
        store_number: Option<u32>,
    ) -> Result<Arc<FilesystemHandle>, StorageError> {
        let key = (container.to_path_buf(), offset, store_number);
        if let Some(handle) = self.handles.get(&key) {
            return Ok(Arc::clone(handle));
        }

        debug!(
            "Opening filesystem in {} at offset {} (store {:?})",
            container.display(),
            offset,
            store_number
        );
        let volume = match store_number {
            Some(store) => self.backend.open_snapshot(container, offset, store)?,
            None => self.backend.open_volume(container, offset)?,
        };

        let handle = Arc::new(FilesystemHandle {
            container_path: container.to_path_buf(),
            offset,
            store_number,
            volume,
        });
        self.handles.insert(key, Arc::clone(&handle));
        Ok(handle)
    }

    /// Number of snapshot stores in the volume at `offset`
    pub fn count_snapshots(&self, container: &Path, offset: u64) -> Result<u32, StorageError> {
        self.backend.count_snapshots(container, offset)
    }

    /// Release every held handle, ending the run the cache served
    pub fn clear(&mut self) {
        if !self.handles.is_empty() {
            debug!("Releasing {} filesystem handle(s)", self.handles.len());
        }
        self.handles.clear();
    }

    /// Number of handles currently held
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
