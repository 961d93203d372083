//! Persisted tempo settings
//!
//! Window size and reference tempo live in storage as sticky values so they
//! survive restarts and follow changes made in other contexts.

use crate::error::StorageError;
use crate::sticky::{StickyOptions, StickyValue};
use crate::storage::{StorageContext, StorageEvent, StorageScope};
use std::ops::RangeInclusive;
use tracing::debug;

/// Storage key of the rolling window size
pub const WINDOW_SIZE_KEY: &str = "window-size";
/// Storage key of the reference tempo
pub const REFERENCE_TEMPO_KEY: &str = "reference-tempo";

/// Default rolling window size in beats
pub const DEFAULT_WINDOW_SIZE: u32 = 8;
/// Default reference tempo in BPM
pub const DEFAULT_REFERENCE_TEMPO: u32 = 120;

/// Range offered for the window size
pub const WINDOW_SIZE_RANGE: RangeInclusive<u32> = 2..=16;
/// Range offered for the reference tempo (0 means no reference)
pub const REFERENCE_TEMPO_RANGE: RangeInclusive<u32> = 0..=300;

/// Clamp a requested window size to [`WINDOW_SIZE_RANGE`]
pub fn clamp_window_size(value: u32) -> u32 {
    value.clamp(*WINDOW_SIZE_RANGE.start(), *WINDOW_SIZE_RANGE.end())
}

/// Clamp a requested reference tempo to [`REFERENCE_TEMPO_RANGE`]
pub fn clamp_reference_tempo(value: u32) -> u32 {
    value.clamp(*REFERENCE_TEMPO_RANGE.start(), *REFERENCE_TEMPO_RANGE.end())
}

/// Which setting a change notification touched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingChange {
    /// Window size changed
    WindowSize(u32),
    /// Reference tempo changed
    ReferenceTempo(u32),
}

/// The two persisted tempo settings
#[derive(Debug)]
pub struct TempoSettings {
    window_size: StickyValue<u32>,
    reference_tempo: StickyValue<u32>,
}

impl TempoSettings {
    /// Bind both settings to `context`
    pub fn new(context: &StorageContext, scope: StorageScope, version: &str) -> Self {
        Self {
            window_size: StickyValue::new(
                DEFAULT_WINDOW_SIZE,
                WINDOW_SIZE_KEY,
                context,
                StickyOptions::scoped(scope).with_version(version),
            ),
            reference_tempo: StickyValue::new(
                DEFAULT_REFERENCE_TEMPO,
                REFERENCE_TEMPO_KEY,
                context,
                StickyOptions::scoped(scope).with_version(version),
            ),
        }
    }

    /// Load both settings from storage and start listening
    pub fn activate(&mut self) -> Result<(), StorageError> {
        self.window_size.activate()?;
        self.reference_tempo.activate()?;
        Ok(())
    }

    /// Load both settings, falling back to in-memory values if storage fails.
    ///
    /// Returns false if any setting ended up in memory only.
    pub fn activate_or_fallback(&mut self) -> bool {
        self.window_size.activate_or_fallback();
        self.reference_tempo.activate_or_fallback();
        for value in [&self.window_size, &self.reference_tempo] {
            debug!(
                key = value.key(),
                version = value.version(),
                scope = %value.scope(),
                persistent = value.is_persistent(),
                "Setting ready"
            );
        }
        self.is_persistent()
    }

    /// Whether both settings are backed by storage
    pub fn is_persistent(&self) -> bool {
        self.window_size.is_persistent() && self.reference_tempo.is_persistent()
    }

    /// Current window size (default until loaded)
    pub fn window_size(&self) -> u32 {
        self.window_size.get_or(DEFAULT_WINDOW_SIZE)
    }

    /// Current reference tempo (default until loaded)
    pub fn reference_tempo(&self) -> u32 {
        self.reference_tempo.get_or(DEFAULT_REFERENCE_TEMPO)
    }

    /// Set the window size, clamped to its range. Returns the stored value.
    pub fn set_window_size(&mut self, value: u32) -> u32 {
        let value = clamp_window_size(value);
        self.window_size.set(value);
        value
    }

    /// Set the reference tempo, clamped to its range. Returns the stored value.
    pub fn set_reference_tempo(&mut self, value: u32) -> u32 {
        let value = clamp_reference_tempo(value);
        self.reference_tempo.set(value);
        value
    }

    /// Apply pending changes from other contexts
    pub fn sync(&mut self) -> Vec<SettingChange> {
        let mut changes = Vec::new();
        if self.window_size.sync() {
            changes.push(SettingChange::WindowSize(self.window_size()));
        }
        if self.reference_tempo.sync() {
            changes.push(SettingChange::ReferenceTempo(self.reference_tempo()));
        }
        changes
    }

    /// Apply a single notification received on one of the settings' event channels
    pub fn handle_event(&mut self, event: &StorageEvent) -> Option<SettingChange> {
        if self.window_size.handle_event(event) {
            Some(SettingChange::WindowSize(self.window_size()))
        } else if self.reference_tempo.handle_event(event) {
            Some(SettingChange::ReferenceTempo(self.reference_tempo()))
        } else {
            None
        }
    }

    /// Underlying sticky window size
    pub fn window_size_value(&self) -> &StickyValue<u32> {
        &self.window_size
    }

    /// Underlying sticky reference tempo
    pub fn reference_tempo_value(&self) -> &StickyValue<u32> {
        &self.reference_tempo
    }
}
