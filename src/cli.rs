use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::{CollectionConfig, SourceKind};
use crate::constants::DEFAULT_CONFIG_NAME;

/// Command-line arguments for the evidence collector.
///
/// Every option can also be set in the YAML configuration file; options
/// given on the command line take precedence.
#[derive(Parser, Debug)]
#[clap(
    name = "evidence-collector",
    about = "Discover files in directories, disk images and volume snapshots"
)]
pub struct Args {
    /// Path to configuration YAML file
    #[clap(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Directory, file or disk image to collect from
    #[clap(short, long)]
    pub source: Option<PathBuf>,

    /// Kind of source
    #[clap(long, value_enum)]
    pub source_kind: Option<SourceKindArg>,

    /// Volume offset in 512-byte sectors
    #[clap(long)]
    pub sector_offset: Option<u64>,

    /// Volume offset in bytes (overrides --sector-offset)
    #[clap(long)]
    pub byte_offset: Option<u64>,

    /// Also collect from the volume's snapshot stores
    #[clap(long)]
    pub snapshots: bool,

    /// Only collect from these snapshot stores (comma-separated)
    #[clap(long, value_delimiter = ',')]
    pub stores: Option<Vec<u32>>,

    /// Filter file for targeted collection
    #[clap(short, long)]
    pub filter: Option<PathBuf>,

    /// Write descriptors to this file instead of stdout
    #[clap(short, long)]
    pub output: Option<PathBuf>,

    /// Capacity of the output queue
    #[clap(long)]
    pub queue_capacity: Option<usize>,

    /// Verbose logging
    #[clap(short, long)]
    pub verbose: bool,

    /// Subcommands
    #[clap(subcommand)]
    pub command: Option<Commands>,
}

/// Source kind as given on the command line
#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum SourceKindArg {
    /// Live directory tree or single file
    Directory,
    /// Raw disk image
    Image,
}

impl From<SourceKindArg> for SourceKind {
    fn from(arg: SourceKindArg) -> Self {
        match arg {
            SourceKindArg::Directory => SourceKind::Directory,
            SourceKindArg::Image => SourceKind::Image,
        }
    }
}

/// Available subcommands for the collector.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a default configuration file
    InitConfig {
        /// Path to output configuration file
        #[clap(default_value = DEFAULT_CONFIG_NAME)]
        path: PathBuf,
    },
}

impl Args {
    /// Apply command-line overrides on top of a loaded configuration
    pub fn apply_to(&self, config: &mut CollectionConfig) {
        if let Some(source) = &self.source {
            config.source = source.clone();
        }
        if let Some(kind) = self.source_kind {
            config.source_kind = kind.into();
        }
        if let Some(sector_offset) = self.sector_offset {
            config.sector_offset = sector_offset;
        }
        if let Some(byte_offset) = self.byte_offset {
            config.byte_offset = Some(byte_offset);
        }
        if self.snapshots {
            config.snapshots = true;
        }
        if let Some(stores) = &self.stores {
            config.snapshot_stores = Some(stores.clone());
        }
        if let Some(filter) = &self.filter {
            config.filter_file = Some(filter.clone());
        }
        if let Some(capacity) = self.queue_capacity {
            config.queue_capacity = capacity;
        }
    }
}
