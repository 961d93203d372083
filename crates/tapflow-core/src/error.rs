//! Error types for the core library
use thiserror::Error;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// Storage cannot be used at all (disabled, unreadable location, ...)
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// I/O error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// File watcher error
    #[cfg(feature = "watch")]
    #[error("Watch error: {0}")]
    WatchError(#[from] notify::Error),
}

/// Core error types
#[derive(Error, Debug)]
pub enum CoreError {
    /// Storage layer failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration could not be read or written
    #[error("Config error: {0}")]
    Config(String),

    /// I/O error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
