//! Targeted collection filters.
//!
//! A [`PathFilter`] turns a filter specification into the descriptors of the
//! files it selects. It reaches the substrate through a [`FileAccessor`], so
//! the same filter runs against a live mount point ([`LiveFileAccessor`])
//! or an open image volume ([`VolumeAccessor`]).
//!
//! ## Filter files
//!
//! [`CollectionFilter`] reads one path per line. Each `/`-separated segment
//! is a case-insensitive regular expression matched against a whole entry
//! name; `{name}` placeholders are replaced with configured path variables.
//!
//! ```text
//! # Registry hives
//! /{systemroot}/System32/config/(SAM|SYSTEM|SOFTWARE)
//! /Users/.+/NTUSER\.DAT
//! ```

use anyhow::Result;

use crate::diagnostics::CollectorError;
use crate::models::PathDescriptor;
use crate::storage::Inode;

/// Live filesystem and image volume accessors
pub mod accessor;

/// Filter files of per-segment regular expressions
pub mod collection_filter;

pub use accessor::{LiveFileAccessor, VolumeAccessor};
pub use collection_filter::CollectionFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessorEntryKind {
    File,
    Directory,
    Other,
}

/// An entry as seen through a [`FileAccessor`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessorEntry {
    pub name: String,
    pub path: String,
    pub kind: AccessorEntryKind,
    pub inode: Option<Inode>,
}

/// Children of a directory, plus the entries that could not be inspected
#[derive(Debug, Default)]
pub struct DirectoryListing {
    pub entries: Vec<AccessorEntry>,
    pub problems: Vec<CollectorError>,
}

/// Read-only view of a substrate for filters
pub trait FileAccessor {
    /// The directory filter paths are anchored at
    fn root(&self) -> AccessorEntry;

    /// Children of a directory entry, in listing order.
    ///
    /// Fails only when the directory itself cannot be read; unreadable
    /// children are dropped and returned as problems.
    fn list_directory(&self, directory: &AccessorEntry) -> Result<DirectoryListing, CollectorError>;

    /// Descriptor for a file entry
    fn describe(&self, file: &AccessorEntry) -> Result<PathDescriptor, CollectorError>;
}

/// Files selected by a filter, and the traversal errors met on the way
#[derive(Debug, Default)]
pub struct FilterOutput {
    pub descriptors: Vec<PathDescriptor>,
    pub problems: Vec<CollectorError>,
}

/// Produces the descriptors of the files a filter selects.
///
/// An `Err` means the filter could not be evaluated at all. Unreadable
/// directories and entries end up in [`FilterOutput::problems`] instead.
pub trait PathFilter: Send + Sync {
    fn path_descriptors(&self, accessor: &dyn FileAccessor) -> Result<FilterOutput>;
}
