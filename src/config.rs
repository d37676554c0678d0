//! Operator service configuration, stored as JSON in the platform config dir

use anyhow::{anyhow, bail, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_file: PathBuf,
}

impl ConfigPaths {
    pub fn new() -> Result<Self> {
        let project_dirs = ProjectDirs::from("com", "TollRoad", "TollRoad")
            .ok_or_else(|| anyhow!("Unable to determine toll road config directory"))?;

        let config_file = project_dirs.config_dir().join("config.json");

        Ok(Self { config_file })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct TollRoadConfig {
    /// Most trips a single route price update settles; `None` settles the whole queue
    pub route_price_drain_limit: Option<usize>,
    /// Trips settled per route on each background drain pass
    pub drain_batch_size: usize,
    pub drain_interval_secs: u64,
    /// Buffered notifications per subscriber before lagging ones drop
    pub event_channel_capacity: usize,
    /// SQLite event store; `None` keeps notifications in memory only
    pub database_path: Option<PathBuf>,
}

impl Default for TollRoadConfig {
    fn default() -> Self {
        Self {
            route_price_drain_limit: None,
            drain_batch_size: 50,
            drain_interval_secs: 30,
            event_channel_capacity: 1000,
            database_path: None,
        }
    }
}

impl TollRoadConfig {
    pub fn validate(&self) -> Result<()> {
        if self.route_price_drain_limit == Some(0) {
            bail!("route_price_drain_limit must be positive when set");
        }
        if self.drain_batch_size == 0 {
            bail!("drain_batch_size must be positive");
        }
        if self.drain_interval_secs == 0 {
            bail!("drain_interval_secs must be positive");
        }
        if self.event_channel_capacity == 0 {
            bail!("event_channel_capacity must be positive");
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Configuration from the platform config dir, falling back to defaults
    pub fn load_or_default() -> Self {
        let paths = match ConfigPaths::new() {
            Ok(paths) => paths,
            Err(e) => {
                log::warn!("Using default configuration: {}", e);
                return Self::default();
            }
        };

        if !paths.config_file.exists() {
            return Self::default();
        }

        match Self::load(&paths.config_file) {
            Ok(config) => {
                log::info!("Loaded configuration from {}", paths.config_file.display());
                config
            }
            Err(e) => {
                log::error!(
                    "Failed to load configuration from {}: {}",
                    paths.config_file.display(),
                    e
                );
                Self::default()
            }
        }
    }
}
