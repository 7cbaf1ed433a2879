//! Integration tests for collection from a real NTFS image.
//!
//! `tests/data/testfs1` is the 2 MiB test volume shipped with the `ntfs`
//! crate: the metadata files, four user files and `many_subdirs` with 512
//! empty directories.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tempfile::NamedTempFile;

use evidence_collector::collectors::collector::Collector;
use evidence_collector::collectors::image::{ImageCollector, ImageSource};
use evidence_collector::diagnostics::RecordingSink;
use evidence_collector::models::SourceType;
use evidence_collector::queue::ChannelQueue;

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/testfs1")
}

#[test]
fn test_walk_of_ntfs_image() -> Result<()> {
    let (queue, receiver) = ChannelQueue::unbounded();
    let sink = Arc::new(RecordingSink::new());
    let mut collector = ImageCollector::new(Arc::new(queue), ImageSource::new(fixture())).with_error_sink(sink.clone());
    collector.run();

    let descriptors = receiver.collect_descriptors()?;
    let found: Vec<_> = descriptors
        .iter()
        .map(|d| (d.file_path(), d.image_inode().unwrap_or(u64::MAX)))
        .collect();
    assert_eq!(
        found,
        vec![
            ("/$AttrDef", 4),
            ("/$BadClus", 8),
            ("/$Bitmap", 6),
            ("/$Boot", 7),
            ("/$LogFile", 2),
            ("/$MFT", 0),
            ("/$MFTMirr", 1),
            ("/$Secure", 9),
            ("/$UpCase", 10),
            ("/$Volume", 3),
            ("/1000-bytes-file", 66),
            ("/empty-file", 64),
            ("/file-with-12345", 65),
            ("/sparse-file", 67),
            ("/$Extend/$ObjId", 25),
            ("/$Extend/$Quota", 24),
            ("/$Extend/$Reparse", 26),
        ]
    );

    let container = fixture().to_string_lossy().into_owned();
    for descriptor in &descriptors {
        assert_eq!(descriptor.source_type(), SourceType::RawImage);
        assert_eq!(descriptor.container_path(), Some(container.as_str()));
        assert_eq!(descriptor.image_offset(), Some(0));
    }
    assert!(sink.errors().is_empty());
    assert_eq!(collector.stats().files_enqueued, 17);
    Ok(())
}

#[test]
fn test_ntfs_image_at_sector_offset() -> Result<()> {
    let mut image = NamedTempFile::new()?;
    image.write_all(&vec![0u8; 2048 * 512])?;
    image.write_all(&std::fs::read(fixture())?)?;
    image.flush()?;

    let (queue, receiver) = ChannelQueue::unbounded();
    let source = ImageSource::new(image.path()).with_sector_offset(2048).with_snapshots(true);
    ImageCollector::new(Arc::new(queue), source).run();

    let descriptors = receiver.collect_descriptors()?;
    assert_eq!(descriptors.len(), 17);
    assert!(descriptors.iter().all(|d| d.image_offset() == Some(1_048_576)));
    assert!(descriptors.iter().all(|d| d.snapshot_store_number().is_none()));
    Ok(())
}
