//! Logging configuration
//!
//! Describes where logs go and how verbose they are. The subscriber itself is
//! installed by the application; this module only owns the settings and the
//! log directory housekeeping.

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

/// File name prefix of log files
pub const LOG_FILE_PREFIX: &str = "tapflow_";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Level name (error, warn, info, debug, trace)
    pub level: String,
    /// Log to stderr
    #[serde(default = "default_true")]
    pub console_output: bool,
    /// Log to a file in `log_dir`
    #[serde(default)]
    pub file_output: bool,
    /// Directory for log files
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Number of log files kept by [`LogConfig::cleanup_old_logs`]
    #[serde(default = "default_max_log_files")]
    pub max_log_files: usize,
}

fn default_true() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|p| p.join("TapFlow").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

fn default_max_log_files() -> usize {
    7
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_output: true,
            file_output: false,
            log_dir: default_log_dir(),
            max_log_files: default_max_log_files(),
        }
    }
}

impl LogConfig {
    /// Parse `level`, falling back to INFO for unknown names
    pub fn parse_level(&self) -> LevelFilter {
        self.level.parse().unwrap_or(LevelFilter::INFO)
    }

    /// Create the log directory if file output is enabled
    pub fn ensure_log_directory(&self) -> io::Result<()> {
        if self.file_output {
            fs::create_dir_all(&self.log_dir)?;
        }
        Ok(())
    }

    /// Log file for today
    pub fn current_log_path(&self) -> PathBuf {
        let date = Local::now().format("%Y-%m-%d");
        self.log_dir
            .join(format!("{}{}.log", LOG_FILE_PREFIX, date))
    }

    /// Delete the oldest log files beyond `max_log_files`.
    ///
    /// Returns the number of removed files.
    pub fn cleanup_old_logs(&self) -> io::Result<usize> {
        if !self.log_dir.exists() {
            return Ok(0);
        }
        let mut logs: Vec<PathBuf> = fs::read_dir(&self.log_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with(LOG_FILE_PREFIX) && n.ends_with(".log"))
                    .unwrap_or(false)
            })
            .collect();
        if logs.len() <= self.max_log_files {
            return Ok(0);
        }

        // Date-stamped names sort chronologically
        logs.sort();
        let excess = logs.len() - self.max_log_files;
        for path in &logs[..excess] {
            fs::remove_file(path)?;
        }
        Ok(excess)
    }
}
