use std::sync::Arc;

use log::info;

use crate::collectors::collector::{CollectionContext, CollectionStats, Collector};
use crate::collectors::image::ImageSource;
use crate::collectors::targeted::enqueue_filtered;
use crate::diagnostics::{CollectorError, ErrorSink};
use crate::filter::{PathFilter, VolumeAccessor};
use crate::queue::OutputQueue;
use crate::storage::{FilesystemCache, NtfsBackend, StorageBackend};

/// Collects the files a filter selects from a disk image and, optionally,
/// from each selected snapshot store
pub struct TargetedImageCollector {
    source: ImageSource,
    filter: Arc<dyn PathFilter>,
    cache: FilesystemCache,
    context: CollectionContext,
}

impl TargetedImageCollector {
    pub fn new(queue: Arc<dyn OutputQueue>, source: ImageSource, filter: Arc<dyn PathFilter>) -> Self {
        Self::with_backend(queue, source, filter, Arc::new(NtfsBackend::new()))
    }

    pub fn with_backend(
        queue: Arc<dyn OutputQueue>,
        source: ImageSource,
        filter: Arc<dyn PathFilter>,
        backend: Arc<dyn StorageBackend>,
    ) -> Self {
        Self::with_cache(queue, source, filter, FilesystemCache::new(backend))
    }

    pub fn with_cache(
        queue: Arc<dyn OutputQueue>,
        source: ImageSource,
        filter: Arc<dyn PathFilter>,
        cache: FilesystemCache,
    ) -> Self {
        Self {
            source,
            filter,
            cache,
            context: CollectionContext::new(queue),
        }
    }

    pub fn with_error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.context.set_error_sink(sink);
        self
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
            "Collecting filtered files from image file: {} at offset {}",
            self.source.container().display(),
            offset
        );

        let volume = self.source.open_volume(&mut self.cache, &mut self.context, offset)?;
        enqueue_filtered(
            &mut self.context,
            self.filter.as_ref(),
            &VolumeAccessor::new(volume),
            None,
        )?;

        let stores = self.source.snapshot_stores(&self.cache, &mut self.context, offset);
        let total = stores.len();
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

            enqueue_filtered(
                &mut self.context,
                self.filter.as_ref(),
                &VolumeAccessor::new(handle),
                Some(store_number),
            )?;
        }

        Ok(())
    }
}

impl Collector for TargetedImageCollector {
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
