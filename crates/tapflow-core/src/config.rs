//! Application configuration
//!
//! Stored as JSON in the user config directory. A missing or unreadable file
//! yields the defaults.

use crate::error::{CoreError, Result};
use crate::logging::LogConfig;
use crate::sticky::DEFAULT_VERSION;
use crate::storage::{JsonFileBackend, StorageScope};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Configuration of the tap tempo application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TapflowConfig {
    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
    /// File backing the local storage area; `None` uses the data directory
    #[serde(default)]
    pub store_path: Option<PathBuf>,
    /// Storage area for the tempo settings
    #[serde(default)]
    pub scope: StorageScope,
    /// Version tag of the stored settings
    #[serde(default = "default_version")]
    pub version: String,
    /// Follow changes other processes make to the store file
    #[serde(default = "default_true")]
    pub watch_store: bool,
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for TapflowConfig {
    fn default() -> Self {
        Self {
            log: LogConfig::default(),
            store_path: None,
            scope: StorageScope::Local,
            version: default_version(),
            watch_store: true,
        }
    }
}

impl TapflowConfig {
    /// Default config file location
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("TapFlow");
            p.push("config.json");
            p
        })
    }

    /// Load from the default location
    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from_path(&path))
            .unwrap_or_default()
    }

    /// Load from `path`, falling back to defaults
    pub fn load_from_path(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        let parsed: Result<Self> = fs::read_to_string(path)
            .map_err(CoreError::from)
            .and_then(|content| serde_json::from_str(&content).map_err(CoreError::from));
        match parsed {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring config file {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Save to the default location
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()
            .ok_or_else(|| CoreError::Config("no user config directory".to_string()))?;
        self.save_to_path(&path)
    }

    /// Save to `path`, creating its directory
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Store file to use: configured path or the data directory default
    pub fn resolved_store_path(&self) -> Option<PathBuf> {
        self.store_path
            .clone()
            .or_else(JsonFileBackend::default_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TapflowConfig::default();
        assert_eq!(config.scope, StorageScope::Local);
        assert_eq!(config.version, "default");
        assert!(config.watch_store);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("TapFlow").join("config.json");
        let config = TapflowConfig {
            scope: StorageScope::Session,
            version: "v2".to_string(),
            store_path: Some(dir.path().join("store.json")),
            ..Default::default()
        };
        config.save_to_path(&path).unwrap();
        assert_eq!(TapflowConfig::load_from_path(&path), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "scope": "session" }"#).unwrap();

        let config = TapflowConfig::load_from_path(&path);
        assert_eq!(config.scope, StorageScope::Session);
        assert_eq!(config.version, "default");
        assert_eq!(config.log, LogConfig::default());
    }

    #[test]
    fn test_malformed_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ nope").unwrap();
        assert_eq!(TapflowConfig::load_from_path(&path), TapflowConfig::default());
    }
}
