//! Command-line argument parsing.

use clap::Parser;
use std::path::PathBuf;
use tapflow_core::{StorageScope, TapflowConfig};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "tapflow")]
#[command(about = "Tap along to find the tempo", long_about = None)]
pub struct Args {
    /// Storage area for the settings: local (shared) or session (this run only)
    #[arg(long, value_name = "SCOPE")]
    pub scope: Option<StorageScope>,

    /// Version tag of the stored settings
    #[arg(long, value_name = "TAG")]
    pub version_tag: Option<String>,

    /// JSON file backing the local storage area
    #[arg(long, value_name = "PATH")]
    pub store: Option<PathBuf>,

    /// Keep settings in memory only
    #[arg(long)]
    pub no_persist: bool,

    /// Ignore changes other processes make to the store file
    #[arg(long)]
    pub no_watch: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Config file to use instead of the default location
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write the effective configuration back to the config file
    #[arg(long)]
    pub save_config: bool,
}

impl Args {
    /// Load the config file and apply the command-line overrides
    pub fn resolve_config(&self) -> TapflowConfig {
        let mut config = match &self.config {
            Some(path) => TapflowConfig::load_from_path(path),
            None => TapflowConfig::load(),
        };
        self.apply(&mut config);
        config
    }

    /// Override config values given on the command line
    pub fn apply(&self, config: &mut TapflowConfig) {
        if let Some(scope) = self.scope {
            config.scope = scope;
        }
        if let Some(version) = &self.version_tag {
            config.version = version.clone();
        }
        if let Some(store) = &self.store {
            config.store_path = Some(store.clone());
        }
        if self.no_watch {
            config.watch_store = false;
        }
        if let Some(level) = &self.log_level {
            config.log.level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let args = Args::parse_from([
            "tapflow",
            "--scope",
            "session",
            "--version-tag",
            "v2",
            "--no-watch",
            "--log-level",
            "debug",
        ]);
        let mut config = TapflowConfig::default();
        args.apply(&mut config);

        assert_eq!(config.scope, StorageScope::Session);
        assert_eq!(config.version, "v2");
        assert!(!config.watch_store);
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_no_flags_keep_config() {
        let args = Args::parse_from(["tapflow"]);
        let mut config = TapflowConfig {
            version: "v7".to_string(),
            ..Default::default()
        };
        args.apply(&mut config);
        assert_eq!(config.version, "v7");
        assert!(config.watch_store);
    }

    #[test]
    fn test_rejects_unknown_scope() {
        assert!(Args::try_parse_from(["tapflow", "--scope", "disk"]).is_err());
    }
}
