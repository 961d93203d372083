//! TapFlow Core - tap tempo tracking and persisted settings
//!
//! This crate contains:
//! - Tempo calculation over tap timestamps (instantaneous and average BPM)
//! - The tap session tracker and its tempo history
//! - Storage areas with cross-context change notification
//! - Sticky values: versioned, persisted, synchronized settings
//! - Configuration, logging settings and display helpers

#![warn(missing_docs)]

pub mod config;
pub mod display;
pub mod error;
pub mod logging;
pub mod reactive;
pub mod settings;
pub mod sticky;
pub mod storage;
pub mod tempo;
pub mod tracker;

// --- Re-exports grouped by category ---

// Tempo
pub use tempo::{
    add_tap, append_to_history, compute_average, compute_instantaneous, Tap, TapSequence,
    TempoHistory, TempoSample,
};
pub use tracker::TempoTracker;

// Storage & Settings
pub use settings::{SettingChange, TempoSettings};
pub use sticky::{StickyDefault, StickyOptions, StickyValue, StoredRecord};
pub use storage::{
    AreaHandle, ContextId, DisabledBackend, JsonFileBackend, MemoryBackend, Origin, StorageArea,
    StorageBackend, StorageContext, StorageEvent, StorageScope, Subscription,
};
#[cfg(feature = "watch")]
pub use storage::FileWatcher;

// Errors, Config & Logging
pub use config::TapflowConfig;
pub use error::{CoreError, Result, StorageError};
pub use logging::LogConfig;
