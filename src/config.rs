// Configuration loaded from YAML

use crate::store::StoreOptions;
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const APP_NAME: &str = "agentlog";

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "AGENTLOG_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file
    pub database: PathBuf,
    /// Lock wait per store operation, in milliseconds
    pub busy_timeout_ms: u64,
    /// Legacy task log read by `migrate` when no file is given
    pub migrate_source: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: PathBuf::from("tasks.db"),
            busy_timeout_ms: 5000,
            migrate_source: PathBuf::from("comunication.md"),
        }
    }
}

impl Config {
    /// Load configuration
    ///
    /// Uses `explicit` if given, then `$AGENTLOG_CONFIG`, then
    /// `<config dir>/agentlog/config.yml` if it exists. Falls back to
    /// defaults when no file is found.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load_from(Path::new(&path));
        }

        match default_config_file() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific YAML file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        debug!(path = ?path, database = ?config.database, "Loaded config");
        Ok(config)
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
        }
    }
}

/// `<config dir>/agentlog/config.yml`, if the platform has a config dir
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME).join("config.yml"))
}
