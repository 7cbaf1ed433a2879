use std::collections::{HashMap, HashSet};

use crate::storage::{EntryTimestamps, Inode};
use crate::utils::hash::timestamp_fingerprint;

/// Timestamp fingerprints seen per inode during one snapshot collection.
///
/// Stores must be fed in ascending order: a file is suppressed when an
/// earlier store already produced the same inode with the same timestamps.
/// Only timestamps are compared, so two different files that share an inode
/// and all four timestamps are treated as one.
#[derive(Debug, Default)]
pub struct SnapshotDeduplicator {
    seen: HashMap<Inode, HashSet<String>>,
}

impl SnapshotDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a file; returns `false` if it was already seen unchanged
    pub fn record(&mut self, inode: Inode, timestamps: &EntryTimestamps) -> bool {
        self.seen
            .entry(inode)
            .or_default()
            .insert(timestamp_fingerprint(timestamps))
    }

    /// Number of distinct inodes seen
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
