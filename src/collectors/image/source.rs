//! Offset and snapshot store resolution shared by the image collectors.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;

use crate::collectors::collector::CollectionContext;
use crate::constants::SECTOR_SIZE;
use crate::diagnostics::CollectorError;
use crate::storage::{FilesystemCache, FilesystemHandle};

/// Byte offset of a volume given as a sector offset and/or a byte offset.
///
/// An explicit byte offset always wins, even when it is zero. Returns `None`
/// when the sector offset does not fit in a byte offset.
pub fn resolve_byte_offset(sector_offset: u64, byte_offset: Option<u64>, sector_size: u64) -> Option<u64> {
    // Some(0) is an explicit start of image, not "unset": it never falls back
    // to the sector offset.
    match byte_offset {
        Some(bytes) => Some(bytes),
        None => sector_offset.checked_mul(sector_size),
    }
}

/// Snapshot stores to walk, in ascending order.
///
/// With no explicit selection (or an empty one) every store `0..count` is
/// used. An explicit selection keeps only the numbers inside `1..=count`.
pub fn select_snapshot_stores(requested: Option<&[u32]>, count: u32) -> Vec<u32> {
    match requested {
        Some(stores) if !stores.is_empty() => {
            let mut selected: Vec<u32> = stores
                .iter()
                .copied()
                .filter(|store| (1..=count).contains(store))
                .collect();
            selected.sort_unstable();
            selected.dedup();
            selected
        }
        _ => (0..count).collect(),
    }
}

/// A volume inside a disk image, plus which of its snapshot stores to read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSource {
    container: PathBuf,
    sector_offset: u64,
    byte_offset: Option<u64>,
    snapshots: bool,
    snapshot_stores: Option<Vec<u32>>,
}

impl ImageSource {
    pub fn new(container: impl Into<PathBuf>) -> Self {
        Self {
            container: container.into(),
            sector_offset: 0,
            byte_offset: None,
            snapshots: false,
            snapshot_stores: None,
        }
    }

    pub fn with_sector_offset(mut self, sector_offset: u64) -> Self {
        self.sector_offset = sector_offset;
        self
    }

    pub fn with_byte_offset(mut self, byte_offset: u64) -> Self {
        self.byte_offset = Some(byte_offset);
        self
    }

    /// Also walk the snapshot stores of the volume
    pub fn with_snapshots(mut self, snapshots: bool) -> Self {
        self.snapshots = snapshots;
        self
    }

    /// Restrict snapshot collection to the given store numbers
    pub fn with_snapshot_stores(mut self, stores: Vec<u32>) -> Self {
        self.snapshot_stores = Some(stores);
        self
    }

    pub fn container(&self) -> &Path {
        &self.container
    }

    pub fn snapshots_enabled(&self) -> bool {
        self.snapshots
    }

    /// Effective byte offset of the volume
    pub fn byte_offset(&self) -> Result<u64, CollectorError> {
        resolve_byte_offset(self.sector_offset, self.byte_offset, SECTOR_SIZE).ok_or_else(|| {
            CollectorError::Configuration {
                path: self.container.clone(),
                reason: format!("sector offset {} is out of range", self.sector_offset),
            }
        })
    }

    /// Store numbers to walk; empty when snapshot collection is off.
    ///
    /// Failing to count the stores is reported to the context and yields none.
    pub fn snapshot_stores(
        &self,
        cache: &FilesystemCache,
        context: &mut CollectionContext,
        offset: u64,
    ) -> Vec<u32> {
        if !self.snapshots {
            return Vec::new();
        }

        let count = match cache.count_snapshots(&self.container, offset) {
            Ok(count) => count,
            Err(source) => {
                context.report(CollectorError::FilesystemOpen {
                    container: self.container.clone(),
                    offset,
                    store_number: None,
                    source,
                });
                return Vec::new();
            }
        };
        info!("Found {} snapshot store(s) in {}", count, self.container.display());

        select_snapshot_stores(self.snapshot_stores.as_deref(), count)
    }

    /// Open the main volume, reporting a failure to the context
    pub fn open_volume(
        &self,
        cache: &mut FilesystemCache,
        context: &mut CollectionContext,
        offset: u64,
    ) -> Result<Arc<FilesystemHandle>, CollectorError> {
        cache.open(&self.container, offset, None).map_err(|source| {
            context.fail(CollectorError::FilesystemOpen {
                container: self.container.clone(),
                offset,
                store_number: None,
                source,
            })
        })
    }

    /// Open one snapshot store; an unreadable store is reported and skipped
    pub fn open_store(
        &self,
        cache: &mut FilesystemCache,
        context: &mut CollectionContext,
        offset: u64,
        store_number: u32,
    ) -> Option<Arc<FilesystemHandle>> {
        match cache.open(&self.container, offset, Some(store_number)) {
            Ok(handle) => Some(handle),
            Err(source) => {
                context.stats_mut().snapshots_skipped += 1;
                context.report(CollectorError::FilesystemOpen {
                    container: self.container.clone(),
                    offset,
                    store_number: Some(store_number),
                    source,
                });
                None
            }
        }
    }
}
