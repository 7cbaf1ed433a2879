use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::constants::ROOT_PATH;
use crate::diagnostics::CollectorError;
use crate::filter::{AccessorEntry, AccessorEntryKind, DirectoryListing, FileAccessor};
use crate::models::PathDescriptor;
use crate::storage::{join_logical_path, EntryType, FilesystemHandle, StorageError};

/// Accessor over a directory of the live filesystem
pub struct LiveFileAccessor {
    mount_point: PathBuf,
}

impl LiveFileAccessor {
    pub fn new(mount_point: impl Into<PathBuf>) -> Self {
        Self {
            mount_point: mount_point.into(),
        }
    }
}

impl FileAccessor for LiveFileAccessor {
    fn root(&self) -> AccessorEntry {
        AccessorEntry {
            name: String::new(),
            path: self.mount_point.to_string_lossy().into_owned(),
            kind: AccessorEntryKind::Directory,
            inode: None,
        }
    }

    fn list_directory(&self, directory: &AccessorEntry) -> Result<DirectoryListing, CollectorError> {
        let read_dir = fs::read_dir(&directory.path).map_err(|e| CollectorError::DirectoryRead {
            path: directory.path.clone(),
            inode: directory.inode.unwrap_or_default(),
            store_number: None,
            source: StorageError::Io(e),
        })?;

        let mut listing = DirectoryListing::default();
        for entry in read_dir {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    listing.problems.push(CollectorError::EntryMetadata {
                        path: directory.path.clone(),
                        store_number: None,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            // Not following symlinks, so a link is never a file or directory here
            let kind = match entry.file_type() {
                Ok(file_type) if file_type.is_file() => AccessorEntryKind::File,
                Ok(file_type) if file_type.is_dir() => AccessorEntryKind::Directory,
                Ok(_) => AccessorEntryKind::Other,
                Err(e) => {
                    listing.problems.push(CollectorError::EntryMetadata {
                        path: entry.path().to_string_lossy().into_owned(),
                        store_number: None,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            listing.entries.push(AccessorEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: entry.path().to_string_lossy().into_owned(),
                kind,
                inode: None,
            });
        }

        listing.entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(listing)
    }

    fn describe(&self, file: &AccessorEntry) -> Result<PathDescriptor, CollectorError> {
        Ok(PathDescriptor::live(Path::new(&file.path)))
    }
}

/// Accessor over an open image volume or snapshot store
pub struct VolumeAccessor {
    handle: Arc<FilesystemHandle>,
}

impl VolumeAccessor {
    pub fn new(handle: Arc<FilesystemHandle>) -> Self {
        Self { handle }
    }

    fn missing_inode(&self, entry: &AccessorEntry) -> CollectorError {
        CollectorError::EntryMetadata {
            path: entry.path.clone(),
            store_number: self.handle.store_number(),
            reason: "entry has no inode".to_string(),
        }
    }
}

impl FileAccessor for VolumeAccessor {
    fn root(&self) -> AccessorEntry {
        AccessorEntry {
            name: String::new(),
            path: ROOT_PATH.to_string(),
            kind: AccessorEntryKind::Directory,
            inode: Some(self.handle.root_inode()),
        }
    }

    fn list_directory(&self, directory: &AccessorEntry) -> Result<DirectoryListing, CollectorError> {
        let inode = directory.inode.ok_or_else(|| self.missing_inode(directory))?;
        let store_number = self.handle.store_number();
        let entries = self
            .handle
            .open_directory(inode)
            .map_err(|source| CollectorError::DirectoryRead {
                path: directory.path.clone(),
                inode,
                store_number,
                source,
            })?;

        let mut listing = DirectoryListing::default();
        for entry in entries {
            if !entry.is_walkable() {
                continue;
            }
            let name = entry.name.unwrap_or_default();
            let path = join_logical_path(&directory.path, &name);
            let metadata = match entry.metadata {
                Ok(metadata) => metadata,
                Err(e) => {
                    listing.problems.push(CollectorError::EntryMetadata {
                        path,
                        store_number,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let kind = match metadata.entry_type {
                EntryType::Regular => AccessorEntryKind::File,
                EntryType::Directory => AccessorEntryKind::Directory,
                EntryType::Symlink | EntryType::Other => AccessorEntryKind::Other,
            };
            listing.entries.push(AccessorEntry {
                name,
                path,
                kind,
                inode: Some(metadata.inode),
            });
        }

        Ok(listing)
    }

    fn describe(&self, file: &AccessorEntry) -> Result<PathDescriptor, CollectorError> {
        let inode = file.inode.ok_or_else(|| self.missing_inode(file))?;
        Ok(PathDescriptor::from_image(
            &file.path,
            self.handle.container_path(),
            self.handle.offset(),
            inode,
            self.handle.store_number(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceType;
    use crate::diagnostics::ErrorKind;
    use crate::storage::memory::MemoryEntry;
    use crate::storage::{EntryTimestamps, FilesystemCache, MemoryStorage, MemoryVolume};

    #[test]
    fn test_live_listing_is_sorted() {
        let temp_dir = crate::test_utils::create_test_file_structure().unwrap();
        let accessor = LiveFileAccessor::new(temp_dir.path());

        let entries = accessor.list_directory(&accessor.root()).unwrap().entries;
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["dir1", "dir2", "file1.txt", "file2.log"]);
        assert_eq!(entries[0].kind, AccessorEntryKind::Directory);
        assert_eq!(entries[2].kind, AccessorEntryKind::File);
    }

    #[test]
    fn test_volume_accessor_describes_snapshot_files() {
        let mut volume = MemoryVolume::new();
        let root = volume.root();
        volume
            .add_directory(root, 10, "Windows")
            .add_file(10, 11, "win.ini", EntryTimestamps::default())
            .add_file(root, 12, ".", EntryTimestamps::default());

        let storage = MemoryStorage::new();
        storage.add_snapshot("disk.raw", 1024, 3, volume);
        let mut cache = FilesystemCache::new(Arc::new(storage));
        let handle = cache.open(Path::new("disk.raw"), 1024, Some(3)).unwrap();
        let accessor = VolumeAccessor::new(handle);

        let top = accessor.list_directory(&accessor.root()).unwrap().entries;
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].path, "/Windows");

        let files = accessor.list_directory(&top[0]).unwrap().entries;
        let descriptor = accessor.describe(&files[0]).unwrap();
        assert_eq!(descriptor.source_type(), SourceType::SnapshotImage);
        assert_eq!(descriptor.file_path(), "/Windows/win.ini");
        assert_eq!(descriptor.image_offset(), Some(1024));
        assert_eq!(descriptor.image_inode(), Some(11));
        assert_eq!(descriptor.snapshot_store_number(), Some(3));
    }

    #[test]
    fn test_unreadable_entries_are_returned_as_problems() {
        let mut volume = MemoryVolume::new();
        let root = volume.root();
        volume
            .add_entry(root, MemoryEntry::without_metadata("ghost.dat"))
            .add_file(root, 20, "kept.txt", EntryTimestamps::default())
            .add_directory(root, 21, "Locked")
            .fail_reads(21, u32::MAX);

        let storage = MemoryStorage::new();
        storage.add_volume("disk.raw", 0, volume);
        let mut cache = FilesystemCache::new(Arc::new(storage));
        let accessor = VolumeAccessor::new(cache.open(Path::new("disk.raw"), 0, None).unwrap());

        let listing = accessor.list_directory(&accessor.root()).unwrap();
        let names: Vec<_> = listing.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["kept.txt", "Locked"]);
        assert_eq!(listing.problems.len(), 1);
        assert_eq!(listing.problems[0].kind(), ErrorKind::EntryMetadata);

        let locked = &listing.entries[1];
        let err = accessor.list_directory(locked).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DirectoryRead);
    }

    #[test]
    fn test_missing_live_directory_is_a_read_error() {
        let accessor = LiveFileAccessor::new("/nonexistent/evidence");
        let err = accessor.list_directory(&accessor.root()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DirectoryRead);
    }
}
