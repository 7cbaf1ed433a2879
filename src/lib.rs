//! # evidence-collector
//!
//! The acquisition front-end of a forensic artifact extraction pipeline:
//! discovers every file inside a piece of evidence and hands a normalized
//! description of each one to downstream parsers.
//!
//! ## Overview
//!
//! A collector is bound to an output queue. Running it walks the evidence,
//! places one serialized [`PathDescriptor`](models::PathDescriptor) per
//! regular file on the queue, and closes the queue when it is done, so
//! consumers always see end-of-stream exactly once.
//!
//! ## Features
//!
//! - **Live directories**: full walk of a directory tree or a single file
//! - **Disk images**: walk of a volume at a sector or byte offset
//! - **Snapshot stores**: each store walked in ascending order, with files
//!   whose timestamps did not change since an earlier store suppressed
//! - **Targeted collection**: filter files of per-segment regular
//!   expressions instead of full walks
//! - **Best-effort traversal**: damaged directories are retried once and
//!   then skipped; unreadable stores are skipped
//!
//! ## Usage
//!
//! ```no_run
//! use evidence_collector::collectors::collector::Collector;
//! use evidence_collector::collectors::DirectFileCollector;
//! use evidence_collector::queue::ChannelQueue;
//! use std::sync::Arc;
//! use std::thread;
//!
//! # fn main() -> anyhow::Result<()> {
//! let (queue, receiver) = ChannelQueue::bounded(1024);
//! let consumer = thread::spawn(move || receiver.iter().count());
//!
//! DirectFileCollector::new(Arc::new(queue), "/mnt/evidence").run();
//!
//! println!("Discovered {} files", consumer.join().unwrap_or(0));
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`cli`]: Command-line interface definitions and argument parsing
//! - [`models`]: Path descriptors and their wire form
//! - [`collectors`]: Collector contract and implementations
//! - [`storage`]: Volume access, handle cache and storage backends
//! - [`queue`]: Output queue between collectors and consumers
//! - [`diagnostics`]: Collection errors and error sinks
//! - [`filter`]: Targeted collection filters
//! - [`config`]: Configuration management
//! - [`utils`]: Hashing helpers
//! - [`constants`]: Application-wide constants

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Core data models and structures used throughout the application
pub mod models;

/// Collectors for live directories, disk images and snapshot stores
pub mod collectors;

/// Storage backends and the filesystem handle cache
pub mod storage;

/// Output queue shared with downstream consumers
pub mod queue;

/// Collection errors and where they are reported
pub mod diagnostics;

/// Path filters for targeted collection
pub mod filter;

/// Utility functions
pub mod utils;

/// Configuration management
pub mod config;

/// Application constants and configuration values
pub mod constants;

/// Test utilities and helpers
#[cfg(test)]
pub mod test_utils;
