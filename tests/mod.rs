//! Integration test modules for the evidence collector.
//!
//! This module organizes all integration tests that verify
//! end-to-end functionality of the collectors.

mod ntfs_collection;
