use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;

use crate::collectors::collector::{CollectionContext, CollectionStats, Collector};
use crate::collectors::targeted::enqueue_filtered;
use crate::diagnostics::{CollectorError, ErrorSink};
use crate::filter::{LiveFileAccessor, PathFilter};
use crate::queue::OutputQueue;

/// Collects the files a filter selects below a live mount point
pub struct TargetedFileCollector {
    mount_point: PathBuf,
    filter: Arc<dyn PathFilter>,
    context: CollectionContext,
}

impl TargetedFileCollector {
    pub fn new(queue: Arc<dyn OutputQueue>, mount_point: impl Into<PathBuf>, filter: Arc<dyn PathFilter>) -> Self {
        Self {
            mount_point: mount_point.into(),
            filter,
            context: CollectionContext::new(queue),
        }
    }

    pub fn with_error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.context.set_error_sink(sink);
        self
    }

    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }
}

impl Collector for TargetedFileCollector {
    fn collect(&mut self) -> Result<(), CollectorError> {
        self.context.begin()?;

        if !self.mount_point.is_dir() {
            return Err(self.context.fail(CollectorError::Configuration {
                path: self.mount_point.clone(),
                reason: "mount point is not a directory".to_string(),
            }));
        }

        debug!("Collecting filtered files below {}", self.mount_point.display());
        let accessor = LiveFileAccessor::new(&self.mount_point);
        enqueue_filtered(&mut self.context, self.filter.as_ref(), &accessor, None)
    }

    fn queue(&self) -> &dyn OutputQueue {
        self.context.queue()
    }

    fn stats(&self) -> &CollectionStats {
        self.context.stats()
    }
}
