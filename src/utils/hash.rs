use sha2::{Digest, Sha256};

use crate::storage::{EntryTimestamps, TimeValue};

/// Calculate a fingerprint of a file's four timestamps.
///
/// Used to tell whether a file seen in a snapshot store changed since an
/// earlier store. Only timestamps are hashed, never content, so two different
/// files sharing all four timestamps get the same fingerprint.
pub fn timestamp_fingerprint(timestamps: &EntryTimestamps) -> String {
    let mut hasher = Sha256::new();

    let fields = [
        ("atime", timestamps.accessed),
        ("crtime", timestamps.created),
        ("mtime", timestamps.modified),
        ("ctime", timestamps.changed),
    ];
    for (label, value) in fields {
        let TimeValue { seconds, fraction } = value.unwrap_or_default();
        hasher.update(format!("{}:{}.{}", label, seconds, fraction).as_bytes());
    }

    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn stamps(a: i64, c: i64, m: i64, ch: i64) -> EntryTimestamps {
        EntryTimestamps {
            accessed: Some(TimeValue::new(a, 0)),
            created: Some(TimeValue::new(c, 0)),
            modified: Some(TimeValue::new(m, 0)),
            changed: Some(TimeValue::new(ch, 0)),
        }
    }

    #[test]
    fn test_fingerprint_is_sha256_hex() {
        let fingerprint = timestamp_fingerprint(&EntryTimestamps::default());
        assert_eq!(fingerprint.len(), 64);
        assert!(fingerprint.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_absent_timestamps_count_as_zero() {
        let zeros = EntryTimestamps::uniform(TimeValue::new(0, 0));
        assert_eq!(
            timestamp_fingerprint(&EntryTimestamps::default()),
            timestamp_fingerprint(&zeros)
        );
    }

    #[test]
    fn test_fields_are_not_interchangeable() {
        assert_ne!(
            timestamp_fingerprint(&stamps(1, 2, 3, 4)),
            timestamp_fingerprint(&stamps(2, 1, 3, 4))
        );
    }

    #[test]
    fn test_fraction_changes_fingerprint() {
        let mut changed = stamps(1, 2, 3, 4);
        changed.modified = Some(TimeValue::new(3, 1));
        assert_ne!(
            timestamp_fingerprint(&stamps(1, 2, 3, 4)),
            timestamp_fingerprint(&changed)
        );
    }

    proptest! {
        #[test]
        fn prop_fingerprint_is_deterministic(a in any::<i64>(), c in any::<i64>(), m in any::<i64>(), ch in any::<i64>()) {
            prop_assert_eq!(
                timestamp_fingerprint(&stamps(a, c, m, ch)),
                timestamp_fingerprint(&stamps(a, c, m, ch))
            );
        }

        #[test]
        fn prop_any_changed_pair_changes_fingerprint(base in any::<i64>(), delta in 1i64..1_000_000, field in 0usize..4) {
            let original = stamps(base, base, base, base);
            let mut changed = original;
            let shifted = Some(TimeValue::new(base.wrapping_add(delta), 0));
            match field {
                0 => changed.accessed = shifted,
                1 => changed.created = shifted,
                2 => changed.modified = shifted,
                _ => changed.changed = shifted,
            }
            prop_assert_ne!(timestamp_fingerprint(&original), timestamp_fingerprint(&changed));
        }
    }
}
