//! Lifecycle glue for UI components.
//!
//! A [`PersistedStore`] is what a component holds: it builds the engine and
//! loads once on mount, rebuilds it when the channel identity changes, and
//! disposes it on unmount (drop). The observable itself outlives rebinds, so
//! anything watching it keeps working when the channel moves.

use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;
use stow_core::{Host, StorageKind};
use tracing::debug;
use web_time::Duration;

use super::DEFAULT_DEBOUNCE;
use super::engine::StoredObservable;
use crate::reactive::Observable;

/// How to mount a [`PersistedStore`].
pub struct PersistedStoreOptions<T> {
    pub key: String,
    /// Produces the initial value. Called once, at mount.
    pub get_initial_value: Box<dyn FnOnce() -> T>,
    pub debounce: Duration,
    pub storage_kind: StorageKind,
}

impl<T> PersistedStoreOptions<T> {
    pub fn new(key: impl Into<String>, get_initial_value: impl FnOnce() -> T + 'static) -> Self {
        Self {
            key: key.into(),
            get_initial_value: Box::new(get_initial_value),
            debounce: DEFAULT_DEBOUNCE,
            storage_kind: StorageKind::default(),
        }
    }

    #[must_use]
    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    #[must_use]
    pub fn storage_kind(mut self, storage_kind: StorageKind) -> Self {
        self.storage_kind = storage_kind;
        self
    }
}

impl<T> fmt::Debug for PersistedStoreOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistedStoreOptions")
            .field("key", &self.key)
            .field("debounce", &self.debounce)
            .field("storage_kind", &self.storage_kind)
            .finish_non_exhaustive()
    }
}

/// A mounted, persisted value.
pub struct PersistedStore<T> {
    value: Observable<T>,
    debounce: Duration,
    engine: StoredObservable<T>,
}

impl<T> PersistedStore<T>
where
    T: Serialize + DeserializeOwned + Clone + PartialEq + 'static,
{
    /// Build the engine and load the stored value.
    pub fn mount(host: &Host, options: PersistedStoreOptions<T>) -> Self {
        let PersistedStoreOptions {
            key,
            get_initial_value,
            debounce,
            storage_kind,
        } = options;
        let value = Observable::new(get_initial_value());
        let engine = StoredObservable::bind(host, value.clone(), key, debounce, storage_kind, None);
        engine.load_initial_value();
        Self {
            value,
            debounce,
            engine,
        }
    }

    /// Move to another channel.
    ///
    /// Nothing happens when `key` and `storage_kind` match the current
    /// channel. Otherwise the current engine is disposed and a new one is
    /// opened over the same value and loaded. Returns whether it rebound.
    pub fn rebind(&mut self, host: &Host, key: &str, storage_kind: StorageKind) -> bool {
        if self.engine.key() == key && self.engine.storage_kind() == storage_kind {
            return false;
        }
        debug!(
            from = self.engine.key(),
            to = key,
            kind = %storage_kind,
            "rebinding persisted store"
        );
        self.engine.dispose();
        self.engine = StoredObservable::bind(
            host,
            self.value.clone(),
            key.to_owned(),
            self.debounce,
            storage_kind,
            None,
        );
        self.engine.load_initial_value();
        true
    }
}

impl<T> PersistedStore<T> {
    #[must_use]
    pub fn value(&self) -> &Observable<T> {
        &self.value
    }

    #[must_use]
    pub fn engine(&self) -> &StoredObservable<T> {
        &self.engine
    }

    #[must_use]
    pub fn key(&self) -> &str {
        self.engine.key()
    }

    #[must_use]
    pub fn storage_kind(&self) -> StorageKind {
        self.engine.storage_kind()
    }

    /// Dispose the engine. Same as dropping the store.
    pub fn unmount(self) {}
}

impl<T: fmt::Debug> fmt::Debug for PersistedStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistedStore")
            .field("engine", &self.engine)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use stow_core::{LabClock, StorageHandle};

    fn store(host: &Host, kind: StorageKind) -> StorageHandle {
        host.storage().handle(kind).cloned().unwrap()
    }

    fn mount(host: &Host, key: &str) -> PersistedStore<Value> {
        PersistedStore::mount(
            host,
            PersistedStoreOptions::new(key, || json!({"name": "default", "count": 1})),
        )
    }

    #[test]
    fn mount_loads_stored_value() {
        let host = Host::lab(&LabClock::new());
        store(&host, StorageKind::Primary)
            .set_item("profile", r#"{"name":"stored"}"#)
            .unwrap();
        let mounted = mount(&host, "profile");
        assert!(mounted.engine().is_loaded());
        assert_eq!(mounted.value().get(), json!({"name": "stored", "count": 1}));
    }

    #[test]
    fn initial_value_factory_runs_once() {
        use std::cell::Cell;
        use std::rc::Rc;

        let host = Host::lab(&LabClock::new());
        let calls = Rc::new(Cell::new(0));
        let c = Rc::clone(&calls);
        let mut mounted = PersistedStore::mount(
            &host,
            PersistedStoreOptions::new("a", move || {
                c.set(c.get() + 1);
                json!({})
            }),
        );
        mounted.rebind(&host, "b", StorageKind::Primary);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn rebind_same_channel_is_noop() {
        let host = Host::lab(&LabClock::new());
        let mut mounted = mount(&host, "k");
        assert!(!mounted.rebind(&host, "k", StorageKind::Primary));
        assert_eq!(host.events().unwrap().listener_count(), 1);
    }

    #[test]
    fn rebind_moves_channel_and_keeps_observable() {
        let host = Host::lab(&LabClock::new());
        let primary = store(&host, StorageKind::Primary);
        primary.set_item("b", r#"{"count":5}"#).unwrap();

        let mut mounted = mount(&host, "a");
        let watched = mounted.value().clone();
        mounted.value().set(json!({"name": "edited", "count": 1}));

        assert!(mounted.rebind(&host, "b", StorageKind::Primary));
        assert_eq!(mounted.key(), "b");
        assert_eq!(host.events().unwrap().listener_count(), 1);
        // The old channel's pending write was cancelled.
        host.scheduler().run_until_idle();
        assert_eq!(primary.get_item("a").unwrap(), None);
        // The new channel merged its stored copy into the current value.
        assert!(watched.ptr_eq(mounted.value()));
        assert_eq!(watched.get(), json!({"name": "edited", "count": 5}));
    }

    #[test]
    fn rebind_on_kind_change() {
        let host = Host::lab(&LabClock::new());
        let mut mounted = PersistedStore::mount(
            &host,
            PersistedStoreOptions::new("k", || json!({"v": 0})).debounce(Duration::from_millis(10)),
        );
        assert!(mounted.rebind(&host, "k", StorageKind::Session));
        assert_eq!(mounted.storage_kind(), StorageKind::Session);
        mounted.value().set(json!({"v": 1}));
        host.scheduler().advance(Duration::from_millis(10));
        assert_eq!(
            store(&host, StorageKind::Session).get_item("k").unwrap().as_deref(),
            Some(r#"{"v":1}"#)
        );
        assert_eq!(store(&host, StorageKind::Primary).get_item("k").unwrap(), None);
    }

    #[test]
    fn unmount_disposes() {
        let host = Host::lab(&LabClock::new());
        let mounted = mount(&host, "k");
        let value = mounted.value().clone();
        value.set(json!({"name": "late"}));
        mounted.unmount();
        assert_eq!(host.events().unwrap().listener_count(), 0);
        host.scheduler().run_until_idle();
        assert_eq!(store(&host, StorageKind::Primary).get_item("k").unwrap(), None);
    }
}
