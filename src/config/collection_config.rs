use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::collectors::image::ImageSource;
use crate::constants::DEFAULT_QUEUE_CAPACITY;

/// What the collection source points at
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// A live directory tree or a single file
    #[default]
    Directory,
    /// A raw disk image
    Image,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CollectionConfig {
    #[serde(default)]
    pub source_kind: SourceKind,
    #[serde(default)]
    pub source: PathBuf,
    /// Volume offset in 512-byte sectors
    #[serde(default)]
    pub sector_offset: u64,
    /// Volume offset in bytes; takes precedence over `sector_offset`
    #[serde(default)]
    pub byte_offset: Option<u64>,
    /// Also collect from the snapshot stores of the volume
    #[serde(default)]
    pub snapshots: bool,
    #[serde(default)]
    pub snapshot_stores: Option<Vec<u32>>,
    /// Filter file for targeted collection
    #[serde(default)]
    pub filter_file: Option<PathBuf>,
    /// Values for `{name}` placeholders in the filter file
    #[serde(default)]
    pub path_variables: HashMap<String, String>,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

impl Default for CollectionConfig {
    fn default() -> Self {
        let mut path_variables = HashMap::new();
        path_variables.insert("systemroot".to_string(), "/Windows".to_string());

        Self {
            source_kind: SourceKind::Directory,
            source: PathBuf::from("."),
            sector_offset: 0,
            byte_offset: None,
            snapshots: false,
            snapshot_stores: None,
            filter_file: None,
            path_variables,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl CollectionConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config: CollectionConfig =
            serde_yaml::from_str(&content).context("Failed to parse YAML config")?;

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save_to_yaml_file(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml).context(format!("Failed to write config to {}", path.display()))?;

        info!("Saved configuration to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.as_os_str().is_empty() {
            bail!("No collection source configured");
        }
        if self.queue_capacity == 0 {
            bail!("Queue capacity must be at least 1");
        }
        if self.source_kind == SourceKind::Directory && (self.snapshots || self.snapshot_stores.is_some()) {
            bail!("Snapshot collection requires an image source");
        }
        Ok(())
    }

    /// Image source described by this configuration
    pub fn image_source(&self) -> ImageSource {
        let mut source = ImageSource::new(&self.source)
            .with_sector_offset(self.sector_offset)
            .with_snapshots(self.snapshots);
        if let Some(byte_offset) = self.byte_offset {
            source = source.with_byte_offset(byte_offset);
        }
        if let Some(stores) = &self.snapshot_stores {
            source = source.with_snapshot_stores(stores.clone());
        }
        source
    }
}

/// Load a configuration file, creating it with defaults if it does not exist.
///
/// Without a path the built-in defaults are used.
pub fn load_or_create_config(config_path: Option<&Path>) -> Result<CollectionConfig> {
    match config_path {
        Some(path) if path.exists() => CollectionConfig::from_yaml_file(path),
        Some(path) => {
            info!("Creating default config at {}", path.display());
            let default_config = CollectionConfig::default();
            default_config.save_to_yaml_file(path)?;
            Ok(default_config)
        }
        None => {
            debug!("No config path provided, using default configuration");
            Ok(CollectionConfig::default())
        }
    }
}
