//! Utility functions shared by the collectors.
//!
//! ## Components
//!
//! - **Hashing**: timestamp fingerprints used to suppress unchanged files
//!   across snapshot stores
//!
//! ```
//! use evidence_collector::storage::{EntryTimestamps, TimeValue};
//! use evidence_collector::utils::hash::timestamp_fingerprint;
//!
//! let stamps = EntryTimestamps::uniform(TimeValue::new(1_248_562_800, 0));
//! assert_eq!(timestamp_fingerprint(&stamps), timestamp_fingerprint(&stamps));
//! ```

pub mod hash;
