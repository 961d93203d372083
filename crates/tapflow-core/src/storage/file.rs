//! JSON file backend
//!
//! The whole area is one JSON object `{ key: value }` written on every
//! mutation. Writes go to a temporary sibling first and are renamed into
//! place so readers in other processes never see a half-written file.

use super::{Result, StorageBackend};
use crate::error::StorageError;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File-backed storage area
#[derive(Debug)]
pub struct JsonFileBackend {
    path: PathBuf,
    items: BTreeMap<String, String>,
}

impl JsonFileBackend {
    /// Open (or start) the store at `path`, creating its directory
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    StorageError::Unavailable(format!("cannot create {:?}: {}", parent, e))
                })?;
            }
        }
        let items = read_items(&path)?.unwrap_or_default();
        info!("Opened storage file {:?} ({} keys)", path, items.len());
        Ok(Self { path, items })
    }

    /// Default location in the user data directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|p| p.join("TapFlow").join("local_storage.json"))
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `items` to disk and adopt them only once the write succeeded,
    /// so a failed write leaves memory and file in agreement.
    fn commit(&mut self, items: BTreeMap<String, String>) -> Result<()> {
        let content = serde_json::to_string_pretty(&items)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;
        self.items = items;
        debug!("Saved storage file {:?}", self.path);
        Ok(())
    }
}

/// Read the map stored at `path`. `Ok(None)` if there is no usable file.
fn read_items(path: &Path) -> Result<Option<BTreeMap<String, String>>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(StorageError::Unavailable(format!(
                "cannot read {:?}: {}",
                path, e
            )))
        }
    };
    if content.trim().is_empty() {
        return Ok(None);
    }
    match serde_json::from_str(&content) {
        Ok(items) => Ok(Some(items)),
        Err(e) => {
            warn!("Ignoring malformed storage file {:?}: {}", path, e);
            Ok(None)
        }
    }
}

impl StorageBackend for JsonFileBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        let mut items = self.items.clone();
        items.insert(key.to_string(), value.to_string());
        self.commit(items)
    }

    fn remove_item(&mut self, key: &str) -> Result<()> {
        if !self.items.contains_key(key) {
            return Ok(());
        }
        let mut items = self.items.clone();
        items.remove(key);
        self.commit(items)
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.items.keys().cloned().collect())
    }

    fn reload(&mut self) -> Result<Vec<(String, Option<String>)>> {
        // A malformed or missing file keeps the current view
        let Some(fresh) = read_items(&self.path)? else {
            return Ok(Vec::new());
        };

        let mut changes = Vec::new();
        for (key, value) in &fresh {
            if self.items.get(key) != Some(value) {
                changes.push((key.clone(), Some(value.clone())));
            }
        }
        for key in self.items.keys() {
            if !fresh.contains_key(key) {
                changes.push((key.clone(), None));
            }
        }
        self.items = fresh;
        Ok(changes)
    }
}
