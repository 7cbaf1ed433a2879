//! Test utilities for the evidence collector
//!
//! This module provides common testing helpers: temporary directory trees
//! for the live collectors and in-memory images for the image collectors.

#![cfg(test)]

use anyhow::Result;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Creates a temporary directory that is automatically cleaned up
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file structure in a temporary directory
pub fn create_test_file_structure() -> Result<TempDir> {
    let temp_dir = create_temp_dir()?;
    let base_path = temp_dir.path();

    // Create directory structure
    fs::create_dir_all(base_path.join("dir1/subdir1"))?;
    fs::create_dir_all(base_path.join("dir2"))?;

    // Create test files
    fs::write(base_path.join("file1.txt"), b"Test content 1")?;
    fs::write(base_path.join("file2.log"), b"Test log content")?;
    fs::write(base_path.join("dir1/file3.txt"), b"Test content 3")?;
    fs::write(base_path.join("dir1/subdir1/file4.txt"), b"Test content 4")?;
    fs::write(base_path.join("dir2/file5.log"), b"Another log file")?;

    Ok(temp_dir)
}

/// Small NTFS image (2 MiB, 512-byte clusters) from the `ntfs` crate's test data
pub fn ntfs_fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/testfs1")
}

/// In-memory disk images
pub mod images {
    use crate::storage::{EntryTimestamps, MemoryStorage, MemoryVolume, TimeValue};

    pub const TEST_IMAGE: &str = "evidence.raw";

    /// Timestamps with every field set to `seconds`
    pub fn stamps(seconds: i64) -> EntryTimestamps {
        EntryTimestamps::uniform(TimeValue::new(seconds, 0))
    }

    /// A small Windows-like volume with files at inodes 5 and 7
    pub fn windows_volume(time_5: i64, time_7: i64) -> MemoryVolume {
        let mut volume = MemoryVolume::new();
        let root = volume.root();
        volume
            .add_directory(root, 3, "Windows")
            .add_file(3, 5, "win.ini", stamps(time_5))
            .add_directory(root, 4, "Users")
            .add_file(4, 7, "ntuser.dat", stamps(time_7));
        volume
    }

    /// An image whose main volume and each snapshot store share the same layout
    pub fn image_with_stores(store_times: &[(i64, i64)]) -> MemoryStorage {
        let storage = MemoryStorage::new();
        storage.add_volume(TEST_IMAGE, 0, windows_volume(1, 1));
        for (store, (time_5, time_7)) in store_times.iter().enumerate() {
            storage.add_snapshot(TEST_IMAGE, 0, store as u32, windows_volume(*time_5, *time_7));
        }
        storage
    }
}
