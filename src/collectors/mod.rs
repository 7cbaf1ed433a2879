//! Collector implementations.
//!
//! Every collector discovers files in one source and places a serialized
//! [`PathDescriptor`](crate::models::PathDescriptor) per file on an
//! [`OutputQueue`]. Running a collector always ends with the queue closed.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        Collector (collect/run)          │
//! ├───────────────────┬─────────────────────┤
//! │   Full walk       │   Targeted (filter) │
//! │ ┌───────────────┐ │ ┌─────────────────┐ │
//! │ │ DirectFile    │ │ │ TargetedFile    │ │
//! │ │ Image         │ │ │ TargetedImage   │ │
//! │ └───────────────┘ │ └─────────────────┘ │
//! ├───────────────────┴─────────────────────┤
//! │  ImageSource (offset, snapshot stores)  │
//! ├─────────────────────────────────────────┤
//! │  FilesystemCache / StorageBackend       │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Usage Example
//!
//! ```
//! use evidence_collector::collectors::collector::Collector;
//! use evidence_collector::collectors::image::{ImageCollector, ImageSource};
//! use evidence_collector::queue::ChannelQueue;
//! use evidence_collector::storage::{EntryTimestamps, MemoryStorage, MemoryVolume};
//! use std::sync::Arc;
//!
//! let mut volume = MemoryVolume::new();
//! volume.add_file(volume.root(), 5, "boot.ini", EntryTimestamps::default());
//! let storage = MemoryStorage::new();
//! storage.add_volume("disk.raw", 0, volume);
//!
//! let (queue, receiver) = ChannelQueue::unbounded();
//! let mut collector =
//!     ImageCollector::with_backend(Arc::new(queue), ImageSource::new("disk.raw"), Arc::new(storage));
//! collector.run();
//!
//! assert_eq!(receiver.collect_descriptors()?.len(), 1);
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;

/// Core collector trait and shared collection state
pub mod collector;

/// Live filesystem collector
pub mod file;

/// Disk image and snapshot store collector
pub mod image;

/// Filter driven collectors
pub mod targeted;

pub use collector::{CollectionStats, Collector};
pub use file::DirectFileCollector;
pub use image::ImageCollector;
pub use targeted::{TargetedFileCollector, TargetedImageCollector};

use crate::config::{CollectionConfig, SourceKind};
use crate::diagnostics::ErrorSink;
use crate::filter::collection_filter::ensure_not_empty;
use crate::filter::{CollectionFilter, PathFilter};
use crate::queue::OutputQueue;
use crate::storage::{NtfsBackend, StorageBackend};

/// Build the collector a configuration asks for.
///
/// `backend` serves image sources; `None` reads raw NTFS images.
pub fn build_collector(
    config: &CollectionConfig,
    queue: Arc<dyn OutputQueue>,
    sink: Arc<dyn ErrorSink>,
    backend: Option<Arc<dyn StorageBackend>>,
) -> Result<Box<dyn Collector>> {
    config.validate().context("Invalid collection configuration")?;

    let filter: Option<Arc<dyn PathFilter>> = match &config.filter_file {
        Some(path) => {
            let filter = CollectionFilter::from_file(path, &config.path_variables)?;
            ensure_not_empty(&filter, path)?;
            info!("Using filter file {} ({} paths)", path.display(), filter.len());
            Some(Arc::new(filter) as Arc<dyn PathFilter>)
        }
        None => None,
    };
    let backend = backend.unwrap_or_else(|| Arc::new(NtfsBackend::new()) as Arc<dyn StorageBackend>);

    let collector: Box<dyn Collector> = match (config.source_kind, filter) {
        (SourceKind::Directory, None) => {
            Box::new(DirectFileCollector::new(queue, &config.source).with_error_sink(sink))
        }
        (SourceKind::Directory, Some(filter)) => {
            Box::new(TargetedFileCollector::new(queue, &config.source, filter).with_error_sink(sink))
        }
        (SourceKind::Image, None) => Box::new(
            ImageCollector::with_backend(queue, config.image_source(), backend).with_error_sink(sink),
        ),
        (SourceKind::Image, Some(filter)) => Box::new(
            TargetedImageCollector::with_backend(queue, config.image_source(), filter, backend)
                .with_error_sink(sink),
        ),
    };
    Ok(collector)
}
