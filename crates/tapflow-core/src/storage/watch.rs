//! Cross-process change detection for file-backed areas

use super::StorageArea;
use crate::error::StorageError;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Keeps a storage area in step with its backing file.
///
/// When another process rewrites the file, the area reloads it and every
/// listener in this process receives one event per changed key. Our own
/// writes reload to an identical map and produce no events. Dropping the
/// watcher stops it.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    path: PathBuf,
}

impl FileWatcher {
    /// Start watching `path` on behalf of `area`
    pub fn spawn(area: StorageArea, path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let file_name = path.file_name().map(|name| name.to_os_string());
        let watched_dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    warn!("Storage file watch error: {}", e);
                    return;
                }
            };
            if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                return;
            }
            let touches_store = event
                .paths
                .iter()
                .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
            if !touches_store {
                return;
            }
            match area.refresh() {
                Ok(0) => {}
                Ok(changed) => debug!(changed, "Picked up external storage changes"),
                Err(e) => warn!("Failed to reload storage file: {}", e),
            }
        })?;
        watcher.watch(&watched_dir, RecursiveMode::NonRecursive)?;
        debug!("Watching storage file {:?}", path);

        Ok(Self {
            _watcher: watcher,
            path,
        })
    }

    /// Watched file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("path", &self.path)
            .finish()
    }
}
