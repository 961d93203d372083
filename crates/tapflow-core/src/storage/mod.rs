//! Keyed string storage with cross-context change notification
//!
//! Models the two storage areas a page sees: a `local` area shared by every
//! context of an origin and a `session` area private to one context. A write
//! notifies listeners of *other* contexts only, and only when the stored
//! string actually changed. Notifications travel over channels so each
//! context drains them on its own event loop.

mod file;
mod memory;
#[cfg(feature = "watch")]
mod watch;

pub use file::JsonFileBackend;
pub use memory::{DisabledBackend, MemoryBackend};
#[cfg(feature = "watch")]
pub use watch::FileWatcher;

use crate::error::StorageError;
use crossbeam_channel::{unbounded, Receiver, Sender, TryIter};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Which storage area a value lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageScope {
    /// Durable, shared by every context of the origin
    #[default]
    Local,
    /// Private to one context, gone when it ends
    Session,
}

impl StorageScope {
    /// Lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Session => "session",
        }
    }
}

impl fmt::Display for StorageScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageScope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "session" => Ok(Self::Session),
            other => Err(format!("unknown storage scope '{}'", other)),
        }
    }
}

/// Change notification for one key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    /// Changed key
    pub key: String,
    /// New serialized value, `None` if the key was removed
    pub new_value: Option<String>,
    /// Area the change happened in
    pub scope: StorageScope,
}

/// A key/value string store behind a [`StorageArea`]
pub trait StorageBackend: Send {
    /// Read a key
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Write a key
    fn set_item(&mut self, key: &str, value: &str) -> Result<()>;

    /// Delete a key
    fn remove_item(&mut self, key: &str) -> Result<()>;

    /// All stored keys
    fn keys(&self) -> Result<Vec<String>>;

    /// Pick up changes made outside this process.
    ///
    /// Returns `(key, new_value)` for every key that changed since the last
    /// load. Backends without an external side return nothing.
    fn reload(&mut self) -> Result<Vec<(String, Option<String>)>> {
        Ok(Vec::new())
    }
}

/// Identity of one storage consumer (a tab, a process, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    /// Allocate a process-unique id
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

type ListenerId = u64;

struct Listener {
    id: ListenerId,
    context: ContextId,
    sender: Sender<StorageEvent>,
}

struct AreaInner {
    scope: StorageScope,
    backend: Box<dyn StorageBackend>,
    listeners: Vec<Listener>,
    next_listener: ListenerId,
}

impl AreaInner {
    /// Deliver to every listener not owned by `origin`, pruning dead ones
    fn dispatch(&mut self, origin: Option<ContextId>, key: &str, new_value: Option<String>) {
        let event = StorageEvent {
            key: key.to_string(),
            new_value,
            scope: self.scope,
        };
        self.listeners.retain(|listener| {
            if Some(listener.context) == origin {
                return true;
            }
            listener.sender.send(event.clone()).is_ok()
        });
        trace!(key, listeners = self.listeners.len(), "Storage event dispatched");
    }
}

/// A shared storage area: one backend plus its change listeners
#[derive(Clone)]
pub struct StorageArea {
    inner: Arc<Mutex<AreaInner>>,
}

impl StorageArea {
    /// Wrap a backend
    pub fn new(scope: StorageScope, backend: impl StorageBackend + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(AreaInner {
                scope,
                backend: Box::new(backend),
                listeners: Vec::new(),
                next_listener: 0,
            })),
        }
    }

    /// In-memory area
    pub fn in_memory(scope: StorageScope) -> Self {
        Self::new(scope, MemoryBackend::new())
    }

    /// Scope of this area
    pub fn scope(&self) -> StorageScope {
        self.inner.lock().scope
    }

    /// Read a key
    pub fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.inner.lock().backend.get_item(key)
    }

    /// Write a key on behalf of `origin`
    pub fn set_item(&self, origin: ContextId, key: &str, value: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        let previous = inner.backend.get_item(key)?;
        if previous.as_deref() == Some(value) {
            return Ok(());
        }
        inner.backend.set_item(key, value)?;
        debug!(key, %origin, "Storage item changed");
        inner.dispatch(Some(origin), key, Some(value.to_string()));
        Ok(())
    }

    /// Delete a key on behalf of `origin`
    pub fn remove_item(&self, origin: ContextId, key: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        let previous = inner.backend.get_item(key)?;
        inner.backend.remove_item(key)?;
        if previous.is_some() {
            inner.dispatch(Some(origin), key, None);
        }
        Ok(())
    }

    /// All stored keys
    pub fn keys(&self) -> Result<Vec<String>> {
        self.inner.lock().backend.keys()
    }

    /// Register a listener for changes made by contexts other than `context`
    pub fn subscribe(&self, context: ContextId) -> Subscription {
        let (sender, receiver) = unbounded();
        let mut inner = self.inner.lock();
        let id = inner.next_listener;
        inner.next_listener += 1;
        inner.listeners.push(Listener {
            id,
            context,
            sender,
        });
        debug!(%context, listener = id, scope = %inner.scope, "Storage listener registered");
        Subscription {
            id,
            area: Arc::downgrade(&self.inner),
            receiver,
        }
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    /// Reload the backend and notify every listener of external changes.
    ///
    /// Returns the number of changed keys.
    pub fn refresh(&self) -> Result<usize> {
        let mut inner = self.inner.lock();
        let changes = inner.backend.reload()?;
        for (key, new_value) in &changes {
            inner.dispatch(None, key, new_value.clone());
        }
        if !changes.is_empty() {
            debug!(changed = changes.len(), "Storage area refreshed from backend");
        }
        Ok(changes.len())
    }
}

impl fmt::Debug for StorageArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("StorageArea")
            .field("scope", &inner.scope)
            .field("listeners", &inner.listeners.len())
            .finish()
    }
}

/// Registered change listener; dropping it deregisters the listener
pub struct Subscription {
    id: ListenerId,
    area: Weak<Mutex<AreaInner>>,
    receiver: Receiver<StorageEvent>,
}

impl Subscription {
    /// Channel the events arrive on
    pub fn receiver(&self) -> &Receiver<StorageEvent> {
        &self.receiver
    }

    /// Drain pending events without blocking
    pub fn try_iter(&self) -> TryIter<'_, StorageEvent> {
        self.receiver.try_iter()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(area) = self.area.upgrade() {
            let mut inner = area.lock();
            inner.listeners.retain(|listener| listener.id != self.id);
            debug!(listener = self.id, "Storage listener removed");
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("pending", &self.receiver.len())
            .finish()
    }
}

/// A storage area as seen from one context
#[derive(Debug, Clone)]
pub struct AreaHandle {
    area: StorageArea,
    context: ContextId,
}

impl AreaHandle {
    /// Scope of the underlying area
    pub fn scope(&self) -> StorageScope {
        self.area.scope()
    }

    /// Read a key
    pub fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.area.get_item(key)
    }

    /// Write a key
    pub fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.area.set_item(self.context, key, value)
    }

    /// Delete a key
    pub fn remove_item(&self, key: &str) -> Result<()> {
        self.area.remove_item(self.context, key)
    }

    /// Listen for changes made by other contexts
    pub fn subscribe(&self) -> Subscription {
        self.area.subscribe(self.context)
    }
}

/// One storage consumer with its local and session areas
#[derive(Debug, Clone)]
pub struct StorageContext {
    id: ContextId,
    local: StorageArea,
    session: StorageArea,
}

impl StorageContext {
    /// New context on a shared local area with a fresh in-memory session area
    pub fn new(local: StorageArea) -> Self {
        Self::with_session(local, StorageArea::in_memory(StorageScope::Session))
    }

    /// New context with an explicit session area
    pub fn with_session(local: StorageArea, session: StorageArea) -> Self {
        let id = ContextId::next();
        debug!(context = %id, "Storage context opened");
        Self { id, local, session }
    }

    /// Context id
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Area for `scope`, bound to this context
    pub fn area(&self, scope: StorageScope) -> AreaHandle {
        let area = match scope {
            StorageScope::Local => self.local.clone(),
            StorageScope::Session => self.session.clone(),
        };
        AreaHandle {
            area,
            context: self.id,
        }
    }
}

/// Contexts sharing one local area
#[derive(Debug, Clone)]
pub struct Origin {
    local: StorageArea,
}

impl Origin {
    /// Origin on top of a local backend
    pub fn new(backend: impl StorageBackend + 'static) -> Self {
        Self {
            local: StorageArea::new(StorageScope::Local, backend),
        }
    }

    /// Origin with in-memory local storage
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    /// Open a new context (a "tab")
    pub fn open_context(&self) -> StorageContext {
        StorageContext::new(self.local.clone())
    }

    /// The shared local area
    pub fn local_area(&self) -> &StorageArea {
        &self.local
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_is_not_notified() {
        let origin = Origin::in_memory();
        let a = origin.open_context();
        let b = origin.open_context();

        let sub_a = a.area(StorageScope::Local).subscribe();
        let sub_b = b.area(StorageScope::Local).subscribe();

        a.area(StorageScope::Local).set_item("k", "1").unwrap();

        assert_eq!(sub_a.try_iter().count(), 0);
        let events: Vec<_> = sub_b.try_iter().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].key, "k");
        assert_eq!(events[0].new_value.as_deref(), Some("1"));
    }

    #[test]
    fn test_unchanged_write_is_silent() {
        let origin = Origin::in_memory();
        let a = origin.open_context();
        let b = origin.open_context();
        let sub_b = b.area(StorageScope::Local).subscribe();

        a.area(StorageScope::Local).set_item("k", "1").unwrap();
        a.area(StorageScope::Local).set_item("k", "1").unwrap();
        assert_eq!(sub_b.try_iter().count(), 1);
    }

    #[test]
    fn test_remove_notifies_with_none() {
        let origin = Origin::in_memory();
        let a = origin.open_context();
        let b = origin.open_context();
        a.area(StorageScope::Local).set_item("k", "1").unwrap();

        let sub_b = b.area(StorageScope::Local).subscribe();
        a.area(StorageScope::Local).remove_item("k").unwrap();
        a.area(StorageScope::Local).remove_item("k").unwrap();

        let events: Vec<_> = sub_b.try_iter().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].new_value, None);
    }

    #[test]
    fn test_subscription_drop_deregisters() {
        let origin = Origin::in_memory();
        let ctx = origin.open_context();
        for _ in 0..10 {
            let _sub = ctx.area(StorageScope::Local).subscribe();
            assert_eq!(origin.local_area().listener_count(), 1);
        }
        assert_eq!(origin.local_area().listener_count(), 0);
    }

    #[test]
    fn test_session_areas_are_private() {
        let origin = Origin::in_memory();
        let a = origin.open_context();
        let b = origin.open_context();

        a.area(StorageScope::Session).set_item("k", "1").unwrap();
        assert_eq!(b.area(StorageScope::Session).get_item("k").unwrap(), None);
        assert_eq!(
            a.area(StorageScope::Session).get_item("k").unwrap().as_deref(),
            Some("1")
        );
    }

    #[test]
    fn test_scope_parsing() {
        assert_eq!("local".parse::<StorageScope>(), Ok(StorageScope::Local));
        assert_eq!("Session".parse::<StorageScope>(), Ok(StorageScope::Session));
        assert!("disk".parse::<StorageScope>().is_err());
    }
}
