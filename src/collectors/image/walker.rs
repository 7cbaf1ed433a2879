use std::collections::HashSet;

use log::debug;

use crate::collectors::collector::CollectionContext;
use crate::collectors::image::dedup::SnapshotDeduplicator;
use crate::constants::{MAX_DIRECTORY_OPEN_ATTEMPTS, ROOT_PATH};
use crate::diagnostics::CollectorError;
use crate::models::PathDescriptor;
use crate::storage::{join_logical_path, EntryType, FilesystemHandle, Inode, StorageError};

/// Where a pending directory stands in its open/retry cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenAttempt {
    First,
    Retry,
}

impl OpenAttempt {
    fn number(self) -> u8 {
        match self {
            OpenAttempt::First => 1,
            OpenAttempt::Retry => 2,
        }
    }

    /// Next state after a failed open; `None` means the subtree is abandoned
    fn after_failure(self, error: &StorageError) -> Option<Self> {
        let retryable = matches!(error, StorageError::Io(_));
        match self {
            OpenAttempt::First if retryable && self.number() < MAX_DIRECTORY_OPEN_ATTEMPTS => {
                Some(OpenAttempt::Retry)
            }
            _ => None,
        }
    }
}

#[derive(Debug)]
struct PendingDirectory {
    inode: Inode,
    path: String,
    attempt: OpenAttempt,
}

/// Walks every directory of one open volume and enqueues its regular files.
///
/// The walk keeps an explicit stack of pending directories. A directory's
/// entries are all classified before any of its subdirectories is opened,
/// and subdirectories are pushed in reverse so they come off the stack in
/// listing order.
pub struct VolumeWalker<'a> {
    handle: &'a FilesystemHandle,
    context: &'a mut CollectionContext,
    dedup: Option<&'a mut SnapshotDeduplicator>,
    visited: HashSet<Inode>,
}

impl<'a> VolumeWalker<'a> {
    pub fn new(handle: &'a FilesystemHandle, context: &'a mut CollectionContext) -> Self {
        Self {
            handle,
            context,
            dedup: None,
            visited: HashSet::new(),
        }
    }

    /// Suppress files whose timestamps were already seen in an earlier store
    pub fn with_deduplicator(mut self, dedup: &'a mut SnapshotDeduplicator) -> Self {
        self.dedup = Some(dedup);
        self
    }

    /// Walk from the root directory of the volume.
    ///
    /// Only a queue failure stops the walk early; everything else is
    /// reported and the walk moves on.
    pub fn walk(mut self) -> Result<(), CollectorError> {
        let root = self.handle.root_inode();
        self.visited.insert(root);

        let mut stack = vec![PendingDirectory {
            inode: root,
            path: ROOT_PATH.to_string(),
            attempt: OpenAttempt::First,
        }];

        while let Some(directory) = stack.pop() {
            let entries = match self.handle.open_directory(directory.inode) {
                Ok(entries) => entries,
                Err(source) => {
                    let next = directory.attempt.after_failure(&source);
                    self.context.report(CollectorError::DirectoryRead {
                        path: directory.path.clone(),
                        inode: directory.inode,
                        store_number: self.handle.store_number(),
                        source,
                    });

                    match next {
                        Some(attempt) => {
                            debug!("Reopening directory due to an I/O error: {}", directory.path);
                            stack.push(PendingDirectory { attempt, ..directory });
                        }
                        None => {
                            debug!("Abandoning directory: {}", directory.path);
                            self.context.stats_mut().directories_abandoned += 1;
                        }
                    }
                    continue;
                }
            };

            let mut subdirectories = Vec::new();
            for entry in entries {
                if !entry.is_walkable() {
                    continue;
                }
                let name = entry.name.as_deref().unwrap_or_default();
                let path = join_logical_path(&directory.path, name);

                let metadata = match entry.metadata {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        self.context.stats_mut().entries_skipped += 1;
                        self.context.report(CollectorError::EntryMetadata {
                            path,
                            store_number: self.handle.store_number(),
                            reason: e.to_string(),
                        });
                        continue;
                    }
                };

                match metadata.entry_type {
                    EntryType::Directory => {
                        if self.visited.insert(metadata.inode) {
                            subdirectories.push(PendingDirectory {
                                inode: metadata.inode,
                                path,
                                attempt: OpenAttempt::First,
                            });
                        } else {
                            debug!("Directory [{}] {} already walked, skipping", metadata.inode, path);
                        }
                    }
                    EntryType::Regular => {
                        if let Some(dedup) = self.dedup.as_deref_mut() {
                            if !dedup.record(metadata.inode, &metadata.timestamps) {
                                self.context.stats_mut().duplicates_skipped += 1;
                                continue;
                            }
                        }

                        let descriptor = PathDescriptor::from_image(
                            &path,
                            self.handle.container_path(),
                            self.handle.offset(),
                            metadata.inode,
                            self.handle.store_number(),
                        );
                        self.context.enqueue(&descriptor)?;
                    }
                    EntryType::Symlink | EntryType::Other => {}
                }
            }

            stack.extend(subdirectories.into_iter().rev());
        }

        Ok(())
    }
}
