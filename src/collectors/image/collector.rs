use std::sync::Arc;

use log::info;

use crate::collectors::collector::{CollectionContext, CollectionStats, Collector};
use crate::collectors::image::dedup::SnapshotDeduplicator;
use crate::collectors::image::source::ImageSource;
use crate::collectors::image::walker::VolumeWalker;
use crate::diagnostics::{CollectorError, ErrorSink};
use crate::queue::OutputQueue;
use crate::storage::{FilesystemCache, NtfsBackend, StorageBackend};

/// Collects every regular file of a volume inside a disk image, and
/// optionally of each of its snapshot stores
pub struct ImageCollector {
    source: ImageSource,
    cache: FilesystemCache,
    context: CollectionContext,
}

impl ImageCollector {
    /// Collector reading raw NTFS images
    pub fn new(queue: Arc<dyn OutputQueue>, source: ImageSource) -> Self {
        Self::with_backend(queue, source, Arc::new(NtfsBackend::new()))
    }

    pub fn with_backend(
        queue: Arc<dyn OutputQueue>,
        source: ImageSource,
        backend: Arc<dyn StorageBackend>,
    ) -> Self {
        Self::with_cache(queue, source, FilesystemCache::new(backend))
    }

    pub fn with_cache(queue: Arc<dyn OutputQueue>, source: ImageSource, cache: FilesystemCache) -> Self {
        Self {
            source,
            cache,
            context: CollectionContext::new(queue),
        }
    }

    pub fn with_error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.context.set_error_sink(sink);
        self
    }

    pub fn source(&self) -> &ImageSource {
        &self.source
    }

    pub fn cache(&self) -> &FilesystemCache {
        &self.cache
    }

    fn collect_image(&mut self) -> Result<(), CollectorError> {
        let offset = match self.source.byte_offset() {
            Ok(offset) => offset,
            Err(e) => return Err(self.context.fail(e)),
        };
        info!(
            "Collecting from image file: {} at offset {}",
            self.source.container().display(),
            offset
        );

        let volume = self.source.open_volume(&mut self.cache, &mut self.context, offset)?;
        VolumeWalker::new(&volume, &mut self.context).walk()?;

        let stores = self.source.snapshot_stores(&self.cache, &mut self.context, offset);
        if stores.is_empty() {
            return Ok(());
        }

        let total = stores.len();
        let mut dedup = SnapshotDeduplicator::new();
        for (index, store_number) in stores.into_iter().enumerate() {
            info!(
                "Collecting from snapshot store number: {} ({}/{})",
                store_number,
                index + 1,
                total
            );
            let Some(handle) = self
                .source
                .open_store(&mut self.cache, &mut self.context, offset, store_number)
            else {
                continue;
            };

            VolumeWalker::new(&handle, &mut self.context)
                .with_deduplicator(&mut dedup)
                .walk()?;
        }

        Ok(())
    }
}

impl Collector for ImageCollector {
    fn collect(&mut self) -> Result<(), CollectorError> {
        self.context.begin()?;
        let result = self.collect_image();
        self.cache.clear();
        result
    }

    fn queue(&self) -> &dyn OutputQueue {
        self.context.queue()
    }

    fn stats(&self) -> &CollectionStats {
        self.context.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{ErrorKind, RecordingSink};
    use crate::models::SourceType;
    use crate::queue::ChannelQueue;
    use crate::storage::{EntryTimestamps, MemoryStorage, MemoryVolume, TimeValue};
    use crate::test_utils::images;

    fn volume_with(files: &[(u64, &str, i64)]) -> MemoryVolume {
        let mut volume = MemoryVolume::new();
        let root = volume.root();
        for (inode, name, time) in files {
            volume.add_file(root, *inode, name, EntryTimestamps::uniform(TimeValue::new(*time, 0)));
        }
        volume
    }

    #[test]
    fn test_main_volume_only_without_snapshots() {
        let storage = MemoryStorage::new();
        storage.add_volume("disk.raw", 32256, volume_with(&[(5, "a.txt", 1)]));
        storage.add_snapshot("disk.raw", 32256, 0, volume_with(&[(6, "b.txt", 1)]));
        let storage = Arc::new(storage);

        let (queue, receiver) = ChannelQueue::unbounded();
        let source = ImageSource::new("disk.raw").with_sector_offset(63);
        let mut collector = ImageCollector::with_backend(Arc::new(queue), source, storage.clone());
        collector.run();

        let descriptors = receiver.collect_descriptors().unwrap();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].source_type(), SourceType::RawImage);
        assert_eq!(descriptors[0].image_offset(), Some(32256));
        assert_eq!(descriptors[0].image_inode(), Some(5));
        assert!(storage.opened_snapshots().is_empty());
    }

    #[test]
    fn test_unreadable_store_is_skipped() {
        let storage = MemoryStorage::new();
        storage.add_volume("disk.raw", 0, MemoryVolume::new());
        storage.add_broken_snapshot("disk.raw", 0, 0);
        storage.add_snapshot("disk.raw", 0, 1, volume_with(&[(9, "late.txt", 3)]));

        let (queue, receiver) = ChannelQueue::unbounded();
        let sink = Arc::new(RecordingSink::new());
        let source = ImageSource::new("disk.raw").with_snapshots(true);
        let mut collector = ImageCollector::with_backend(Arc::new(queue), source, Arc::new(storage))
            .with_error_sink(sink.clone());
        collector.run();

        let descriptors = receiver.collect_descriptors().unwrap();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].snapshot_store_number(), Some(1));
        assert_eq!(collector.stats().snapshots_skipped, 1);
        assert_eq!(sink.count(ErrorKind::FilesystemOpen), 1);
    }

    #[test]
    fn test_main_volume_is_never_deduplicated() {
        let storage = MemoryStorage::new();
        storage.add_volume("disk.raw", 0, volume_with(&[(5, "a.txt", 1)]));
        storage.add_snapshot("disk.raw", 0, 0, volume_with(&[(5, "a.txt", 1)]));

        let (queue, receiver) = ChannelQueue::unbounded();
        let source = ImageSource::new("disk.raw").with_snapshots(true);
        ImageCollector::with_backend(Arc::new(queue), source, Arc::new(storage)).run();

        let stores: Vec<_> = receiver
            .collect_descriptors()
            .unwrap()
            .iter()
            .map(|d| d.snapshot_store_number())
            .collect();
        assert_eq!(stores, vec![None, Some(0)]);
    }

    #[test]
    fn test_unchanged_snapshot_files_are_suppressed() {
        let storage = images::image_with_stores(&[(10, 20), (10, 21)]);
        let (queue, receiver) = ChannelQueue::unbounded();
        let source = ImageSource::new(images::TEST_IMAGE).with_snapshots(true);
        let mut collector = ImageCollector::with_backend(Arc::new(queue), source, Arc::new(storage));
        collector.run();

        let found: Vec<_> = receiver
            .collect_descriptors()
            .unwrap()
            .iter()
            .map(|d| (d.snapshot_store_number(), d.image_inode().unwrap_or_default()))
            .collect();
        assert_eq!(
            found,
            vec![(None, 5), (None, 7), (Some(0), 5), (Some(0), 7), (Some(1), 7)]
        );
        assert_eq!(collector.stats().duplicates_skipped, 1);
    }

    #[test]
    fn test_collect_twice_is_rejected() {
        let storage = MemoryStorage::new();
        storage.add_volume("disk.raw", 0, volume_with(&[(5, "a.txt", 1)]));

        let (queue, receiver) = ChannelQueue::unbounded();
        let mut collector =
            ImageCollector::with_backend(Arc::new(queue), ImageSource::new("disk.raw"), Arc::new(storage));
        assert!(collector.collect().is_ok());
        assert!(matches!(collector.collect(), Err(CollectorError::AlreadyCollected)));
        collector.close();

        assert_eq!(receiver.collect_descriptors().unwrap().len(), 1);
    }

    #[test]
    fn test_handles_are_released_after_run() {
        let storage = images::image_with_stores(&[(10, 20)]);
        let (queue, receiver) = ChannelQueue::unbounded();
        let source = ImageSource::new(images::TEST_IMAGE).with_snapshots(true);
        let mut collector = ImageCollector::with_backend(Arc::new(queue), source, Arc::new(storage));
        collector.run();

        assert_eq!(receiver.collect_descriptors().unwrap().len(), 4);
        assert!(collector.cache().is_empty());
    }
}
