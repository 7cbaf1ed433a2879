//! Collectors driven by a [`PathFilter`](crate::filter::PathFilter) instead
//! of a full walk.
//!
//! Descriptors are enqueued in the order the filter produces them. Snapshot
//! stores of an image are filtered one after another without deduplication.

/// Filtered collection from the live filesystem
pub mod file;

/// Filtered collection from disk images and their snapshot stores
pub mod image;

pub use file::TargetedFileCollector;
pub use image::TargetedImageCollector;

use std::path::PathBuf;

use crate::collectors::collector::CollectionContext;
use crate::diagnostics::{CollectorError, ErrorKind};
use crate::filter::{FileAccessor, PathFilter};

/// Run `filter` over `accessor` and enqueue its output.
///
/// Unreadable directories and entries met by the filter are reported and
/// counted. A filter that cannot be evaluated is reported and produces
/// nothing. Only a queue failure is returned.
pub(crate) fn enqueue_filtered(
    context: &mut CollectionContext,
    filter: &dyn PathFilter,
    accessor: &dyn FileAccessor,
    store_number: Option<u32>,
) -> Result<(), CollectorError> {
    let output = match filter.path_descriptors(accessor) {
        Ok(output) => output,
        Err(e) => {
            let store = match store_number {
                Some(store) => format!(" in snapshot store {}", store),
                None => String::new(),
            };
            context.report(CollectorError::Configuration {
                path: PathBuf::from(accessor.root().path),
                reason: format!("filter failed{}: {:#}", store, e),
            });
            return Ok(());
        }
    };

    for problem in output.problems {
        match problem.kind() {
            ErrorKind::DirectoryRead => context.stats_mut().directories_abandoned += 1,
            ErrorKind::EntryMetadata => context.stats_mut().entries_skipped += 1,
            _ => {}
        }
        context.report(problem);
    }

    for descriptor in &output.descriptors {
        context.enqueue(descriptor)?;
    }
    Ok(())
}
