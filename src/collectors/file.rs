use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use walkdir::WalkDir;

use crate::collectors::collector::{CollectionContext, CollectionStats, Collector};
use crate::diagnostics::{CollectorError, ErrorSink};
use crate::models::PathDescriptor;
use crate::queue::OutputQueue;

/// Collects every regular file below a directory of the live filesystem
pub struct DirectFileCollector {
    root: PathBuf,
    context: CollectionContext,
}

impl DirectFileCollector {
    /// Create a collector for `root`, which may be a directory or a single file
    pub fn new(queue: Arc<dyn OutputQueue>, root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            context: CollectionContext::new(queue),
        }
    }

    pub fn with_error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.context.set_error_sink(sink);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn walk_directory(&mut self) -> Result<(), CollectorError> {
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| self.root.display().to_string());
                    self.context.stats_mut().entries_skipped += 1;
                    self.context.report(CollectorError::EntryMetadata {
                        path,
                        store_number: None,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            // Symlinks report their own type here, so they are never collected
            if entry.file_type().is_file() {
                self.context.enqueue(&PathDescriptor::live(entry.path()))?;
            }
        }

        Ok(())
    }
}

impl Collector for DirectFileCollector {
    fn collect(&mut self) -> Result<(), CollectorError> {
        self.context.begin()?;
        debug!("Collecting from directory [{}]", self.root.display());

        match fs::metadata(&self.root) {
            Ok(metadata) if metadata.is_file() => {
                let descriptor = PathDescriptor::live(&self.root);
                self.context.enqueue(&descriptor)
            }
            Ok(metadata) if metadata.is_dir() => self.walk_directory(),
            Ok(_) => Err(self.context.fail(CollectorError::Configuration {
                path: self.root.clone(),
                reason: "neither a file nor a directory".to_string(),
            })),
            Err(e) => Err(self.context.fail(CollectorError::Configuration {
                path: self.root.clone(),
                reason: format!("neither a file nor a directory ({})", e),
            })),
        }
    }

    fn queue(&self) -> &dyn OutputQueue {
        self.context.queue()
    }

    fn stats(&self) -> &CollectionStats {
        self.context.stats()
    }
}
