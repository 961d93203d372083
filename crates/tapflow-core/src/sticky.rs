//! Persisted values that stay in sync across contexts
//!
//! A [`StickyValue`] starts uninitialized and reports its server state (if
//! any). [`StickyValue::activate`] adopts the stored record when its version
//! tag matches, otherwise the default, and writes the adopted record straight
//! back. From then on every change is persisted, and changes other contexts
//! make to the same key are picked up through [`StickyValue::sync`] or
//! [`StickyValue::handle_event`].
//!
//! Records are stored as `{"value": <T>, "version": "<tag>"}`.

use crate::error::StorageError;
use crate::storage::{AreaHandle, StorageContext, StorageEvent, StorageScope, Subscription};
use crossbeam_channel::Receiver;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, info, warn};

/// Version tag used when none is given
pub const DEFAULT_VERSION: &str = "default";

/// Stored shape of a sticky value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord<T> {
    /// The value itself
    pub value: T,
    /// Schema tag
    pub version: String,
}

/// Default of a sticky value: a literal or a factory evaluated on demand
pub enum StickyDefault<T> {
    /// Literal value
    Value(T),
    /// Factory, only invoked when no stored value can be used
    Lazy(Box<dyn Fn() -> T + Send>),
}

impl<T: Clone> StickyDefault<T> {
    /// Wrap a factory
    pub fn lazy(factory: impl Fn() -> T + Send + 'static) -> Self {
        Self::Lazy(Box::new(factory))
    }

    fn evaluate(&self) -> T {
        match self {
            Self::Value(value) => value.clone(),
            Self::Lazy(factory) => factory(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for StickyDefault<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

/// Optional settings of a sticky value
#[derive(Debug, Clone)]
pub struct StickyOptions<T> {
    /// Storage area to use
    pub scope: StorageScope,
    /// Schema tag; records with another tag are ignored
    pub version: String,
    /// Value reported before activation
    pub server_state: Option<T>,
}

impl<T> Default for StickyOptions<T> {
    fn default() -> Self {
        Self {
            scope: StorageScope::Local,
            version: DEFAULT_VERSION.to_string(),
            server_state: None,
        }
    }
}

impl<T> StickyOptions<T> {
    /// Options for `scope` with default version
    pub fn scoped(scope: StorageScope) -> Self {
        Self {
            scope,
            ..Self::default()
        }
    }

    /// Set the version tag
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Set the server state
    pub fn with_server_state(mut self, server_state: T) -> Self {
        self.server_state = Some(server_state);
        self
    }
}

/// A value persisted under a key and synchronized with other contexts
pub struct StickyValue<T> {
    key: String,
    version: String,
    area: AreaHandle,
    default: StickyDefault<T>,
    server_state: Option<T>,
    value: Option<T>,
    subscription: Option<Subscription>,
    memory_only: bool,
}

impl<T> StickyValue<T>
where
    T: Serialize + DeserializeOwned + Clone + PartialEq + fmt::Debug,
{
    /// Create an uninitialized value bound to `context`
    pub fn new(
        default: T,
        key: impl Into<String>,
        context: &StorageContext,
        options: StickyOptions<T>,
    ) -> Self {
        Self::with_default(StickyDefault::Value(default), key, context, options)
    }

    /// Like [`new`](Self::new), but the default comes from `factory`, which
    /// only runs if no stored value can be used
    pub fn new_lazy(
        factory: impl Fn() -> T + Send + 'static,
        key: impl Into<String>,
        context: &StorageContext,
        options: StickyOptions<T>,
    ) -> Self {
        Self::with_default(StickyDefault::lazy(factory), key, context, options)
    }

    /// Create an uninitialized value with an explicit [`StickyDefault`]
    pub fn with_default(
        default: StickyDefault<T>,
        key: impl Into<String>,
        context: &StorageContext,
        options: StickyOptions<T>,
    ) -> Self {
        Self {
            key: key.into(),
            version: options.version,
            area: context.area(options.scope),
            default,
            server_state: options.server_state,
            value: None,
            subscription: None,
            memory_only: false,
        }
    }

    /// Storage key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Version tag
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Storage scope
    pub fn scope(&self) -> StorageScope {
        self.area.scope()
    }

    /// Current value, or the server state before initialization
    pub fn get(&self) -> Option<&T> {
        self.value.as_ref().or(self.server_state.as_ref())
    }

    /// Current value or `fallback` if there is none yet
    pub fn get_or(&self, fallback: T) -> T {
        self.get().cloned().unwrap_or(fallback)
    }

    /// Whether a concrete value has been adopted
    pub fn is_initialized(&self) -> bool {
        self.value.is_some()
    }

    /// Whether the value is backed by storage and listening for changes
    pub fn is_persistent(&self) -> bool {
        self.subscription.is_some()
    }

    /// Initialize from storage (or the default) and start listening.
    ///
    /// Fails if the storage area cannot be read or written. Calling it again
    /// after success is a no-op. A value set before activation wins over the
    /// stored one; a value kept in memory after a failed activation does not.
    pub fn activate(&mut self) -> Result<&T, StorageError> {
        if self.subscription.is_none() {
            if self.value.is_none() || self.memory_only {
                let stored = self.area.get_item(&self.key)?;
                match stored.as_deref().and_then(|raw| self.decode(raw)) {
                    Some(value) => {
                        info!(key = %self.key, ?value, "Restored stored value");
                        self.value = Some(value);
                    }
                    None if self.value.is_none() => {
                        let value = self.default.evaluate();
                        info!(key = %self.key, ?value, "Using default value");
                        self.value = Some(value);
                    }
                    None => {}
                }
            }
            self.write()?;
            self.subscription = Some(self.area.subscribe());
            self.memory_only = false;
        }
        let default = &self.default;
        let value: &T = self.value.get_or_insert_with(|| default.evaluate());
        Ok(value)
    }

    /// Like [`activate`](Self::activate), but keeps working in memory if
    /// storage is unavailable.
    pub fn activate_or_fallback(&mut self) -> &T {
        if let Err(e) = self.activate().map(|_| ()) {
            warn!(
                key = %self.key,
                "Storage unavailable ({}), keeping value in memory only", e
            );
            self.memory_only = true;
        }
        let default = &self.default;
        self.value.get_or_insert_with(|| default.evaluate())
    }

    /// Stop listening for changes from other contexts. The value is kept.
    pub fn deactivate(&mut self) {
        if self.subscription.take().is_some() {
            debug!(key = %self.key, "Sticky value deactivated");
        }
    }

    /// Replace the value and persist it
    pub fn set(&mut self, value: T) {
        self.commit(value);
    }

    /// Derive the new value from the previous one and persist it
    pub fn update(&mut self, f: impl FnOnce(&T) -> T) {
        let next = match self.get() {
            Some(previous) => f(previous),
            None => f(&self.default.evaluate()),
        };
        self.commit(next);
    }

    /// Channel on which changes from other contexts arrive
    pub fn events(&self) -> Option<&Receiver<StorageEvent>> {
        self.subscription.as_ref().map(Subscription::receiver)
    }

    /// Apply every pending change from other contexts.
    ///
    /// Returns true if the value changed.
    pub fn sync(&mut self) -> bool {
        let events: Vec<StorageEvent> = match &self.subscription {
            Some(subscription) => subscription.try_iter().collect(),
            None => return false,
        };
        let mut changed = false;
        for event in &events {
            changed |= self.handle_event(event);
        }
        changed
    }

    /// Apply one change notification.
    ///
    /// Events for other keys, removals and records with another version tag
    /// are ignored. Returns true if the value changed.
    pub fn handle_event(&mut self, event: &StorageEvent) -> bool {
        if event.key != self.key || self.memory_only {
            return false;
        }
        let Some(raw) = event.new_value.as_deref() else {
            return false;
        };
        let Some(value) = self.decode(raw) else {
            return false;
        };
        let changed = self.value.as_ref() != Some(&value);
        debug!(key = %self.key, ?value, changed, "Adopting value from another context");
        // Written back even if equal; the area stays silent for unchanged data
        self.commit(value);
        changed
    }

    fn commit(&mut self, value: T) {
        self.value = Some(value);
        if self.memory_only {
            return;
        }
        if let Err(e) = self.write() {
            error!(key = %self.key, "Failed to persist value: {}", e);
        }
    }

    fn write(&self) -> Result<(), StorageError> {
        let Some(value) = &self.value else {
            return Ok(());
        };
        let record = StoredRecord {
            value,
            version: self.version.clone(),
        };
        let raw = serde_json::to_string(&record)?;
        self.area.set_item(&self.key, &raw)
    }

    fn decode(&self, raw: &str) -> Option<T> {
        match serde_json::from_str::<StoredRecord<T>>(raw) {
            Ok(record) if record.version == self.version => Some(record.value),
            Ok(record) => {
                debug!(
                    key = %self.key,
                    stored = %record.version,
                    expected = %self.version,
                    "Ignoring stored value with other version"
                );
                None
            }
            Err(e) => {
                warn!(key = %self.key, "Ignoring malformed stored value: {}", e);
                None
            }
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for StickyValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StickyValue")
            .field("key", &self.key)
            .field("version", &self.version)
            .field("value", &self.value)
            .field("server_state", &self.server_state)
            .field("persistent", &self.subscription.is_some())
            .finish()
    }
}
