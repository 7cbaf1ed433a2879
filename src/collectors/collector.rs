use std::sync::Arc;

use log::{debug, error};
use serde::Serialize;

use crate::diagnostics::{CollectorError, ErrorSink, LogSink};
use crate::models::PathDescriptor;
use crate::queue::OutputQueue;

/// Contract shared by every collector.
///
/// `collect()` discovers files and enqueues one descriptor per file;
/// `run()` collects and then closes the queue, whatever `collect()` returned,
/// so consumers always observe end-of-stream exactly once.
pub trait Collector: Send {
    /// Discover all files and place their descriptors on the queue.
    ///
    /// Only the first call does any work; later calls fail with
    /// [`CollectorError::AlreadyCollected`].
    fn collect(&mut self) -> Result<(), CollectorError>;

    fn queue(&self) -> &dyn OutputQueue;

    fn stats(&self) -> &CollectionStats;

    /// Signal end-of-stream on the output queue
    fn close(&self) {
        self.queue().close();
    }

    /// Run the collector and then close the queue
    fn run(&mut self) {
        if let Err(e) = self.collect() {
            error!("Collection ended early: {}", e);
        }
        self.close();
        debug!("Collector finished: {:?}", self.stats());
    }
}

/// Counters kept while a collector runs
#[derive(Serialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct CollectionStats {
    pub files_enqueued: u64,
    /// Snapshot files suppressed because their timestamps were already seen
    pub duplicates_skipped: u64,
    /// Entries dropped because they could not be inspected
    pub entries_skipped: u64,
    /// Directories given up on after the retry failed
    pub directories_abandoned: u64,
    pub snapshots_skipped: u64,
    pub errors_reported: u64,
}

/// Queue, error sink and counters of one collector instance
pub struct CollectionContext {
    queue: Arc<dyn OutputQueue>,
    sink: Arc<dyn ErrorSink>,
    stats: CollectionStats,
    started: bool,
}

impl CollectionContext {
    pub fn new(queue: Arc<dyn OutputQueue>) -> Self {
        Self {
            queue,
            sink: Arc::new(LogSink),
            stats: CollectionStats::default(),
            started: false,
        }
    }

    pub fn set_error_sink(&mut self, sink: Arc<dyn ErrorSink>) {
        self.sink = sink;
    }

    pub fn queue(&self) -> &dyn OutputQueue {
        self.queue.as_ref()
    }

    pub fn stats(&self) -> &CollectionStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut CollectionStats {
        &mut self.stats
    }

    /// Mark the start of collection; fails if collection already started
    pub fn begin(&mut self) -> Result<(), CollectorError> {
        if self.started {
            return Err(CollectorError::AlreadyCollected);
        }
        self.started = true;
        Ok(())
    }

    pub fn report(&mut self, error: CollectorError) {
        self.stats.errors_reported += 1;
        self.sink.report(&error);
    }

    /// Report an error that ends this collection, handing it back to the caller
    pub fn fail(&mut self, error: CollectorError) -> CollectorError {
        self.stats.errors_reported += 1;
        self.sink.report(&error);
        error
    }

    /// Serialize and enqueue one descriptor
    pub fn enqueue(&mut self, descriptor: &PathDescriptor) -> Result<(), CollectorError> {
        let wire = match descriptor.to_wire() {
            Ok(wire) => wire,
            Err(e) => {
                self.stats.entries_skipped += 1;
                self.report(CollectorError::EntryMetadata {
                    path: descriptor.file_path().to_string(),
                    store_number: descriptor.snapshot_store_number(),
                    reason: e.to_string(),
                });
                return Ok(());
            }
        };

        if let Err(e) = self.queue.queue_item(wire) {
            return Err(self.fail(CollectorError::Queue(e)));
        }
        self.stats.files_enqueued += 1;
        Ok(())
    }
}
