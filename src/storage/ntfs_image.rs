//! Raw NTFS image backend built on the `ntfs` crate.
//!
//! The volume is read through [`OffsetReader`], which shifts every seek by the
//! partition's byte offset so the parser sees the volume starting at 0.
//! Volume shadow snapshots are not readable here: `count_snapshots` reports
//! none and `open_snapshot` fails with [`StorageError::Unsupported`].

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::{Arc, Mutex};

use log::debug;
use ntfs::structured_values::{NtfsFileAttributeFlags, NtfsFileNamespace};
use ntfs::{KnownNtfsFileRecordNumber, Ntfs, NtfsFile, NtfsFileFlags, NtfsTime};

use crate::constants::{IMAGE_READ_BUFFER_SIZE, NTFS_TICKS_PER_SECOND, NTFS_UNIX_EPOCH_DIFF_SECS};
use crate::storage::{
    DirEntry, EntryMetadata, EntryTimestamps, EntryType, Inode, StorageBackend, StorageError,
    TimeValue, VolumeHandle,
};

/// Reader that exposes a window of `inner` starting at `base`
pub struct OffsetReader<R> {
    inner: R,
    base: u64,
}

impl<R: Seek> OffsetReader<R> {
    pub fn new(mut inner: R, base: u64) -> io::Result<Self> {
        inner.seek(SeekFrom::Start(base))?;
        Ok(Self { inner, base })
    }
}

impl<R: Read> Read for OffsetReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Seek> Seek for OffsetReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let absolute = match pos {
            SeekFrom::Start(relative) => {
                let target = self.base.checked_add(relative).ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidInput, "seek past the end of the address space")
                })?;
                self.inner.seek(SeekFrom::Start(target))?
            }
            other => self.inner.seek(other)?,
        };

        absolute
            .checked_sub(self.base)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "seek before the start of the volume"))
    }
}

type ImageReader = BufReader<OffsetReader<File>>;

fn ntfs_error(e: ntfs::NtfsError) -> StorageError {
    StorageError::Io(io::Error::new(io::ErrorKind::Other, e.to_string()))
}

/// Convert an NTFS timestamp (100ns ticks since 1601) into Unix seconds and
/// a nanosecond fraction
pub fn nt_time_value(ticks: u64) -> TimeValue {
    let seconds = (ticks / NTFS_TICKS_PER_SECOND) as i64 - NTFS_UNIX_EPOCH_DIFF_SECS;
    let fraction = (ticks % NTFS_TICKS_PER_SECOND) * 100;
    TimeValue::new(seconds, fraction)
}

fn time_value(time: NtfsTime) -> Option<TimeValue> {
    match time.nt_timestamp() {
        0 => None,
        ticks => Some(nt_time_value(ticks)),
    }
}

// Short names duplicate the Win32 entry for the same record
fn is_listed_namespace(namespace: NtfsFileNamespace) -> bool {
    namespace != NtfsFileNamespace::Dos
}

/// An index entry names a live file only while the record is in use and has
/// not been reused since the entry was written
fn is_allocated(flags: NtfsFileFlags, record_sequence: u16, reference_sequence: u16) -> bool {
    flags.contains(NtfsFileFlags::IN_USE) && record_sequence == reference_sequence
}

fn classify(is_directory: bool, attributes: NtfsFileAttributeFlags) -> EntryType {
    if is_directory {
        EntryType::Directory
    } else if attributes.contains(NtfsFileAttributeFlags::REPARSE_POINT) {
        EntryType::Symlink
    } else {
        EntryType::Regular
    }
}

/// An NTFS volume opened from an image file
pub struct NtfsVolume {
    ntfs: Ntfs,
    reader: Mutex<ImageReader>,
}

impl NtfsVolume {
    fn entry_metadata(file: &NtfsFile, inode: Inode) -> Result<EntryMetadata, StorageError> {
        let info = file.info().map_err(ntfs_error)?;

        Ok(EntryMetadata {
            inode,
            entry_type: classify(file.is_directory(), info.file_attributes()),
            timestamps: EntryTimestamps {
                accessed: time_value(info.access_time()),
                created: time_value(info.creation_time()),
                modified: time_value(info.modification_time()),
                changed: time_value(info.mft_record_modification_time()),
            },
        })
    }
}

impl VolumeHandle for NtfsVolume {
    fn root_inode(&self) -> Inode {
        KnownNtfsFileRecordNumber::RootDirectory as Inode
    }

    fn open_directory(&self, inode: Inode) -> Result<Vec<DirEntry>, StorageError> {
        let mut guard = self.reader.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let reader = &mut *guard;

        let directory = self.ntfs.file(reader, inode).map_err(ntfs_error)?;
        if !directory.is_directory() {
            return Err(StorageError::NotADirectory(inode));
        }

        let index = directory.directory_index(reader).map_err(ntfs_error)?;
        let mut iter = index.entries();
        let mut entries = Vec::new();

        while let Some(entry) = iter.next(reader) {
            let entry = entry.map_err(ntfs_error)?;

            let file_name = match entry.key() {
                Some(Ok(file_name)) => file_name,
                Some(Err(e)) => {
                    entries.push(DirEntry {
                        name: None,
                        allocated: true,
                        metadata: Err(ntfs_error(e)),
                    });
                    continue;
                }
                None => continue,
            };

            if !is_listed_namespace(file_name.namespace()) {
                continue;
            }

            let name = file_name.name().to_string_lossy();
            let reference = entry.file_reference();
            let record_number = reference.file_record_number();

            let (allocated, metadata) = match self.ntfs.file(reader, record_number) {
                Ok(file) => (
                    is_allocated(file.flags(), file.sequence_number(), reference.sequence_number()),
                    Self::entry_metadata(&file, record_number),
                ),
                Err(e) => (true, Err(ntfs_error(e))),
            };

            entries.push(DirEntry {
                name: Some(name),
                allocated,
                metadata,
            });
        }

        Ok(entries)
    }
}

/// Backend reading NTFS volumes from raw image files
#[derive(Debug, Default, Clone, Copy)]
pub struct NtfsBackend;

impl NtfsBackend {
    pub fn new() -> Self {
        NtfsBackend
    }

    fn open_error(container: &Path, reason: impl ToString) -> StorageError {
        StorageError::Open {
            container: container.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

impl StorageBackend for NtfsBackend {
    fn open_volume(&self, container: &Path, offset: u64) -> Result<Arc<dyn VolumeHandle>, StorageError> {
        let file = File::open(container).map_err(|e| Self::open_error(container, e))?;
        let window = OffsetReader::new(file, offset).map_err(|e| Self::open_error(container, e))?;
        let mut reader = BufReader::with_capacity(IMAGE_READ_BUFFER_SIZE, window);

        let mut ntfs = Ntfs::new(&mut reader).map_err(|e| Self::open_error(container, e))?;
        ntfs.read_upcase_table(&mut reader)
            .map_err(|e| Self::open_error(container, e))?;

        debug!("Opened NTFS volume in {} at offset {}", container.display(), offset);
        Ok(Arc::new(NtfsVolume {
            ntfs,
            reader: Mutex::new(reader),
        }) as Arc<dyn VolumeHandle>)
    }

    fn open_snapshot(
        &self,
        container: &Path,
        _offset: u64,
        store_number: u32,
    ) -> Result<Arc<dyn VolumeHandle>, StorageError> {
        Err(StorageError::Unsupported(format!(
            "snapshot store {} of {}: shadow copies are not readable by the NTFS backend",
            store_number,
            container.display()
        )))
    }

    fn count_snapshots(&self, container: &Path, offset: u64) -> Result<u32, StorageError> {
        debug!(
            "No snapshot reader for {} at offset {}, reporting zero stores",
            container.display(),
            offset
        );
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ntfs_fixture;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    fn root_listing(volume: &dyn VolumeHandle) -> Vec<DirEntry> {
        volume.open_directory(volume.root_inode()).unwrap()
    }

    fn find<'a>(entries: &'a [DirEntry], name: &str) -> &'a DirEntry {
        entries
            .iter()
            .find(|entry| entry.name.as_deref() == Some(name))
            .unwrap_or_else(|| panic!("{} not listed", name))
    }

    #[test]
    fn test_offset_reader_shifts_reads() {
        let data: Vec<u8> = (0u8..=255).collect();
        let mut reader = OffsetReader::new(Cursor::new(data), 16).unwrap();

        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [16, 17, 18, 19]);

        assert_eq!(reader.seek(SeekFrom::Start(100)).unwrap(), 100);
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [116, 117, 118, 119]);

        assert_eq!(reader.seek(SeekFrom::Current(-8)).unwrap(), 96);
        assert!(reader.seek(SeekFrom::Current(-200)).is_err());
    }

    #[test]
    fn test_nt_time_value_conversion() {
        // 2009-07-25 23:00:00.1234567 UTC
        let ticks = (1_248_562_800 + NTFS_UNIX_EPOCH_DIFF_SECS) as u64 * NTFS_TICKS_PER_SECOND + 1_234_567;
        let value = nt_time_value(ticks);
        assert_eq!(value.seconds, 1_248_562_800);
        assert_eq!(value.fraction, 123_456_700);
    }

    #[test]
    fn test_non_ntfs_image_fails_to_open() {
        let mut image = NamedTempFile::new().unwrap();
        image.write_all(&vec![0u8; 64 * 1024]).unwrap();
        image.flush().unwrap();

        let result = NtfsBackend::new().open_volume(image.path(), 0);
        assert!(matches!(result, Err(StorageError::Open { .. })));
    }

    #[test]
    fn test_missing_image_fails_to_open() {
        let result = NtfsBackend::new().open_volume(Path::new("/nonexistent/disk.raw"), 0);
        assert!(matches!(result, Err(StorageError::Open { .. })));
    }

    #[test]
    fn test_snapshots_are_not_supported() {
        let backend = NtfsBackend::new();
        assert_eq!(backend.count_snapshots(Path::new("disk.raw"), 0).unwrap(), 0);
        assert!(matches!(
            backend.open_snapshot(Path::new("disk.raw"), 0, 1),
            Err(StorageError::Unsupported(_))
        ));
    }

    #[test]
    fn test_dos_names_are_dropped() {
        assert!(!is_listed_namespace(NtfsFileNamespace::Dos));
        assert!(is_listed_namespace(NtfsFileNamespace::Win32));
        assert!(is_listed_namespace(NtfsFileNamespace::Win32AndDos));
        assert!(is_listed_namespace(NtfsFileNamespace::Posix));
    }

    #[test]
    fn test_allocation_needs_in_use_and_matching_sequence() {
        assert!(is_allocated(NtfsFileFlags::IN_USE, 3, 3));
        assert!(is_allocated(NtfsFileFlags::IN_USE | NtfsFileFlags::IS_DIRECTORY, 1, 1));
        assert!(!is_allocated(NtfsFileFlags::empty(), 3, 3));
        // Record reused after the index entry was written
        assert!(!is_allocated(NtfsFileFlags::IN_USE, 4, 3));
    }

    #[test]
    fn test_reparse_points_are_symlinks() {
        assert_eq!(classify(false, NtfsFileAttributeFlags::REPARSE_POINT), EntryType::Symlink);
        assert_eq!(classify(false, NtfsFileAttributeFlags::empty()), EntryType::Regular);
        assert_eq!(classify(true, NtfsFileAttributeFlags::REPARSE_POINT), EntryType::Directory);
    }

    #[test]
    fn test_fixture_root_listing() {
        let volume = NtfsBackend::new().open_volume(&ntfs_fixture(), 0).unwrap();
        assert_eq!(volume.root_inode(), 5);

        let entries = root_listing(volume.as_ref());
        let walkable: Vec<_> = entries
            .iter()
            .filter(|entry| entry.is_walkable())
            .filter_map(|entry| entry.name.as_deref())
            .collect();
        assert!(walkable.contains(&"$MFT"));
        assert!(walkable.contains(&"empty-file"));
        assert!(walkable.contains(&"many_subdirs"));
        assert!(!walkable.contains(&"."));
        assert_eq!(walkable.len(), 16);

        let subdirs = find(&entries, "many_subdirs");
        let metadata = subdirs.metadata.as_ref().unwrap();
        assert_eq!(metadata.inode, 68);
        assert_eq!(metadata.entry_type, EntryType::Directory);
    }

    #[test]
    fn test_fixture_standard_information_timestamps() {
        let volume = NtfsBackend::new().open_volume(&ntfs_fixture(), 0).unwrap();
        let entries = root_listing(volume.as_ref());

        let empty_file = find(&entries, "empty-file");
        assert!(empty_file.allocated);
        let metadata = empty_file.metadata.as_ref().unwrap();
        assert_eq!(metadata.inode, 64);
        assert_eq!(metadata.entry_type, EntryType::Regular);
        // 2021-01-01 12:37:00 UTC
        assert_eq!(metadata.timestamps.modified, Some(TimeValue::new(1_609_504_620, 0)));
        assert_eq!(metadata.timestamps.created, Some(TimeValue::new(1_674_506_712, 81_095_700)));
        assert_eq!(metadata.timestamps.accessed, Some(TimeValue::new(1_674_506_712, 81_095_700)));
        assert_eq!(metadata.timestamps.changed, Some(TimeValue::new(1_674_506_712, 81_537_500)));

        // mkntfs leaves the $MFT times zeroed
        let mft = find(&entries, "$MFT").metadata.as_ref().unwrap();
        assert_eq!(mft.inode, 0);
        assert_eq!(mft.timestamps, EntryTimestamps::default());
    }

    #[test]
    fn test_fixture_file_is_not_a_directory() {
        let volume = NtfsBackend::new().open_volume(&ntfs_fixture(), 0).unwrap();
        assert!(matches!(volume.open_directory(64), Err(StorageError::NotADirectory(64))));
    }

    #[test]
    fn test_fixture_behind_partition_offset() {
        let mut image = NamedTempFile::new().unwrap();
        image.write_all(&vec![0u8; 63 * 512]).unwrap();
        image.write_all(&std::fs::read(ntfs_fixture()).unwrap()).unwrap();
        image.flush().unwrap();

        let volume = NtfsBackend::new().open_volume(image.path(), 63 * 512).unwrap();
        let entries = root_listing(volume.as_ref());
        assert_eq!(
            find(&entries, "file-with-12345").metadata.as_ref().unwrap().inode,
            65
        );
    }
}
