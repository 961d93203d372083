//! In-memory and disabled backends

use super::{Result, StorageBackend};
use crate::error::StorageError;
use std::collections::BTreeMap;

/// Plain map, lives as long as the process
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    items: BTreeMap<String, String>,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<()> {
        self.items.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.items.keys().cloned().collect())
    }
}

/// Storage switched off (e.g. by policy). Every call fails.
#[derive(Debug, Clone)]
pub struct DisabledBackend {
    reason: String,
}

impl DisabledBackend {
    /// Create a backend that reports `reason` on every access
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn error(&self) -> StorageError {
        StorageError::Unavailable(self.reason.clone())
    }
}

impl Default for DisabledBackend {
    fn default() -> Self {
        Self::new("storage is disabled")
    }
}

impl StorageBackend for DisabledBackend {
    fn get_item(&self, _key: &str) -> Result<Option<String>> {
        Err(self.error())
    }

    fn set_item(&mut self, _key: &str, _value: &str) -> Result<()> {
        Err(self.error())
    }

    fn remove_item(&mut self, _key: &str) -> Result<()> {
        Err(self.error())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Err(self.error())
    }
}
