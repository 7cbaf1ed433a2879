//! Path descriptors produced by the collectors.
//!
//! A [`PathDescriptor`] identifies one discovered file and tells a downstream
//! parser how to reach its content again. Which optional fields are set is
//! decided entirely by the [`SourceType`], so the only way to build one is
//! through the per-source constructors.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Storage substrate a descriptor was discovered on
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceType {
    LiveFilesystem,
    RawImage,
    SnapshotImage,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct PathDescriptor {
    source_type: SourceType,
    file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    container_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image_offset: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image_inode: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    snapshot_store_number: Option<u32>,
}

impl PathDescriptor {
    /// Describe a file on the live filesystem
    pub fn live(file_path: &Path) -> Self {
        Self {
            source_type: SourceType::LiveFilesystem,
            file_path: host_path(file_path),
            container_path: None,
            image_offset: None,
            image_inode: None,
            snapshot_store_number: None,
        }
    }

    /// Describe a file inside the main volume of a disk image
    pub fn raw_image(file_path: &str, container_path: &Path, image_offset: u64, inode: u64) -> Self {
        Self {
            source_type: SourceType::RawImage,
            file_path: normalize_path(file_path),
            container_path: Some(host_path(container_path)),
            image_offset: Some(image_offset),
            image_inode: Some(inode),
            snapshot_store_number: None,
        }
    }

    /// Describe a file inside one snapshot store of a disk image
    pub fn snapshot(
        file_path: &str,
        container_path: &Path,
        image_offset: u64,
        inode: u64,
        store_number: u32,
    ) -> Self {
        Self {
            source_type: SourceType::SnapshotImage,
            snapshot_store_number: Some(store_number),
            ..Self::raw_image(file_path, container_path, image_offset, inode)
        }
    }

    /// Describe an image file, picking the source type from the store number
    pub fn from_image(
        file_path: &str,
        container_path: &Path,
        image_offset: u64,
        inode: u64,
        store_number: Option<u32>,
    ) -> Self {
        match store_number {
            Some(store) => Self::snapshot(file_path, container_path, image_offset, inode, store),
            None => Self::raw_image(file_path, container_path, image_offset, inode),
        }
    }

    pub fn source_type(&self) -> SourceType {
        self.source_type
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn container_path(&self) -> Option<&str> {
        self.container_path.as_deref()
    }

    pub fn image_offset(&self) -> Option<u64> {
        self.image_offset
    }

    pub fn image_inode(&self) -> Option<u64> {
        self.image_inode
    }

    pub fn snapshot_store_number(&self) -> Option<u32> {
        self.snapshot_store_number
    }

    /// Serialize into the wire form placed on the output queue
    pub fn to_wire(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse a descriptor back from its wire form
    pub fn from_wire(wire: &str) -> Result<Self> {
        serde_json::from_str(wire).context("Failed to parse path descriptor")
    }
}

/// Normalize a path for storage (convert backslashes to forward slashes)
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Render a path of the host filesystem for storage.
///
/// Backslashes are separators only on Windows; elsewhere they are ordinary
/// name characters and are kept.
#[cfg(windows)]
pub fn host_path(path: &Path) -> String {
    normalize_path(&path.to_string_lossy())
}

#[cfg(not(windows))]
pub fn host_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
