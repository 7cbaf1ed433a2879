//! Collection errors and the sink they are reported to.
//!
//! Collection is best-effort: a damaged directory or an unreadable snapshot
//! store costs only that part of the evidence. Such errors never abort a
//! run; they are handed to an [`ErrorSink`] injected into the collector.
//! [`LogSink`] writes them to the `log` facade, [`RecordingSink`] keeps them
//! for inspection.

use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

use log::{error, warn};

use crate::queue::QueueError;
use crate::storage::{Inode, StorageError};

#[derive(Debug)]
pub enum CollectorError {
    /// A volume or snapshot store cannot be opened
    FilesystemOpen {
        container: PathBuf,
        offset: u64,
        store_number: Option<u32>,
        source: StorageError,
    },
    /// Listing a directory failed
    DirectoryRead {
        path: String,
        inode: Inode,
        store_number: Option<u32>,
        source: StorageError,
    },
    /// A single entry could not be inspected
    EntryMetadata {
        path: String,
        store_number: Option<u32>,
        reason: String,
    },
    /// The collector was pointed at something it cannot collect from
    Configuration { path: PathBuf, reason: String },
    /// The output queue rejected an item
    Queue(QueueError),
    /// `collect()` was called on an instance that already ran
    AlreadyCollected,
}

/// Kind of a [`CollectorError`], without its context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    FilesystemOpen,
    DirectoryRead,
    EntryMetadata,
    Configuration,
    Queue,
    AlreadyCollected,
}

impl CollectorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CollectorError::FilesystemOpen { .. } => ErrorKind::FilesystemOpen,
            CollectorError::DirectoryRead { .. } => ErrorKind::DirectoryRead,
            CollectorError::EntryMetadata { .. } => ErrorKind::EntryMetadata,
            CollectorError::Configuration { .. } => ErrorKind::Configuration,
            CollectorError::Queue(_) => ErrorKind::Queue,
            CollectorError::AlreadyCollected => ErrorKind::AlreadyCollected,
        }
    }
}

fn store_label(store_number: &Option<u32>) -> String {
    match store_number {
        Some(store) => format!(" [snapshot store {}]", store),
        None => String::new(),
    }
}

impl fmt::Display for CollectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectorError::FilesystemOpen {
                container,
                offset,
                store_number,
                source,
            } => write!(
                f,
                "Unable to open filesystem in {} at offset {}{}: {}",
                container.display(),
                offset,
                store_label(store_number),
                source
            ),
            CollectorError::DirectoryRead {
                path,
                inode,
                store_number,
                source,
            } => write!(
                f,
                "Unable to read directory {} [{}]{}: {}",
                path,
                inode,
                store_label(store_number),
                source
            ),
            CollectorError::EntryMetadata {
                path,
                store_number,
                reason,
            } => write!(
                f,
                "Problem reading entry {}{}: {}",
                path,
                store_label(store_number),
                reason
            ),
            CollectorError::Configuration { path, reason } => {
                write!(f, "Unable to collect from {}: {}", path.display(), reason)
            }
            CollectorError::Queue(e) => write!(f, "Unable to queue descriptor: {}", e),
            CollectorError::AlreadyCollected => write!(f, "Collection already ran on this collector"),
        }
    }
}

impl std::error::Error for CollectorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CollectorError::FilesystemOpen { source, .. } => Some(source),
            CollectorError::DirectoryRead { source, .. } => Some(source),
            CollectorError::Queue(e) => Some(e),
            _ => None,
        }
    }
}

impl From<QueueError> for CollectorError {
    fn from(e: QueueError) -> Self {
        CollectorError::Queue(e)
    }
}

/// Receiver of non-fatal collection errors
pub trait ErrorSink: Send + Sync {
    fn report(&self, error: &CollectorError);
}

/// Forwards every error to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ErrorSink for LogSink {
    fn report(&self, err: &CollectorError) {
        match err.kind() {
            ErrorKind::EntryMetadata => warn!("{}", err),
            _ => error!("{}", err),
        }
    }
}

/// An error captured by [`RecordingSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedError {
    pub kind: ErrorKind,
    pub message: String,
}

/// Keeps reported errors in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    errors: Mutex<Vec<RecordedError>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> Vec<RecordedError> {
        self.errors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of recorded errors of the given kind
    pub fn count(&self, kind: ErrorKind) -> usize {
        self.errors().iter().filter(|e| e.kind == kind).count()
    }
}

impl ErrorSink for RecordingSink {
    fn report(&self, error: &CollectorError) {
        self.errors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(RecordedError {
                kind: error.kind(),
                message: error.to_string(),
            });
    }
}
