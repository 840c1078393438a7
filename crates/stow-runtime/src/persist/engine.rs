//! The synchronization engine.
//!
//! [`StoredObservable::create`] resolves the channel's store on a [`Host`]
//! and returns one of two engines behind the same interface:
//!
//! - **persisted**: write-behind on change, a change listener on the host's
//!   notification hub, a one-shot initial load, and a disposer.
//! - **memory-only**: the store is unavailable or the host cannot observe
//!   foreign writes. Load and dispose do nothing; the value still works.
//!
//! ```
//! use serde_json::json;
//! use stow_core::{Host, LabClock};
//! use stow_runtime::{StoredObservable, StoredObservableOptions};
//! use web_time::Duration;
//!
//! let clock = LabClock::new();
//! let host = Host::lab(&clock);
//! let cart = StoredObservable::create(&host, StoredObservableOptions::new("cart", json!({"items": []})));
//! cart.load_initial_value();
//! cart.value().set(json!({"items": [1]}));
//! host.scheduler().advance(Duration::from_millis(300));
//! let primary = host.storage().handle(Default::default()).unwrap();
//! assert_eq!(primary.get_item("cart").unwrap().as_deref(), Some(r#"{"items":[1]}"#));
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use stow_core::{Host, ListenerId, StorageEvent, StorageEvents, StorageHandle, StorageKind};
use tracing::{debug, trace};
use web_time::Duration;

use super::codec::{assign_into, encode_item, read_and_merge, write_encoded};
use super::debounce::Debouncer;
use super::filter::ChangeFilter;
use super::settings::SyncSettings;
use super::{DEFAULT_DEBOUNCE, UpdateHandler};
use crate::reactive::{Observable, Subscription};

/// Everything needed to open a channel.
pub struct StoredObservableOptions<T> {
    pub key: String,
    pub initial_value: T,
    /// Quiet period before a burst of changes is written.
    pub debounce: Duration,
    pub storage_kind: StorageKind,
    /// Applies foreign writes. `None` means [`assign_into`].
    pub on_update: Option<UpdateHandler<T>>,
}

impl<T> StoredObservableOptions<T> {
    /// Options with the default debounce and the primary store.
    pub fn new(key: impl Into<String>, initial_value: T) -> Self {
        Self {
            key: key.into(),
            initial_value,
            debounce: DEFAULT_DEBOUNCE,
            storage_kind: StorageKind::default(),
            on_update: None,
        }
    }

    /// Options with timing and placement taken from `settings`.
    pub fn from_settings(key: impl Into<String>, initial_value: T, settings: &SyncSettings) -> Self {
        Self::new(key, initial_value).with_settings(settings)
    }

    #[must_use]
    pub fn with_settings(self, settings: &SyncSettings) -> Self {
        self.debounce(settings.debounce())
            .storage_kind(settings.storage_kind)
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

    #[must_use]
    pub fn on_update(mut self, handler: impl Fn(Value, &Observable<T>) + 'static) -> Self {
        self.on_update = Some(Rc::new(handler));
        self
    }
}

impl<T: Default> StoredObservableOptions<T> {
    /// Options starting from `T::default()`.
    pub fn with_default(key: impl Into<String>) -> Self {
        Self::new(key, T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for StoredObservableOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredObservableOptions")
            .field("key", &self.key)
            .field("initial_value", &self.initial_value)
            .field("debounce", &self.debounce)
            .field("storage_kind", &self.storage_kind)
            .field("on_update", &self.on_update.is_some())
            .finish()
    }
}

/// Resources of a channel backed by a live store.
struct Persisted {
    storage: StorageHandle,
    events: Rc<StorageEvents>,
    listener: ListenerId,
    writer: RefCell<Option<Subscription>>,
    debouncer: Rc<Debouncer>,
    loaded: Cell<bool>,
    disposed: Rc<Cell<bool>>,
}

impl Persisted {
    fn dispose(&self, key: &str) {
        if self.disposed.replace(true) {
            trace!(key, "already disposed");
            return;
        }
        self.events.remove_listener(self.listener);
        self.writer.borrow_mut().take();
        if self.debouncer.cancel() {
            debug!(key, "pending write cancelled");
        }
        debug!(key, "channel disposed");
    }
}

enum Channel {
    Persisted(Persisted),
    MemoryOnly,
}

/// An observable value kept in sync with one `(key, storage kind)` channel.
///
/// Dropping the engine disposes it.
pub struct StoredObservable<T> {
    key: String,
    storage_kind: StorageKind,
    value: Observable<T>,
    channel: Channel,
}

impl<T> StoredObservable<T>
where
    T: Serialize + DeserializeOwned + Clone + PartialEq + 'static,
{
    /// Open the channel described by `options` on `host`.
    ///
    /// Never fails: without a usable store the engine is memory-only.
    pub fn create(host: &Host, options: StoredObservableOptions<T>) -> Self {
        let StoredObservableOptions {
            key,
            initial_value,
            debounce,
            storage_kind,
            on_update,
        } = options;
        Self::bind(
            host,
            Observable::new(initial_value),
            key,
            debounce,
            storage_kind,
            on_update,
        )
    }

    /// Open a channel over an existing observable.
    pub(crate) fn bind(
        host: &Host,
        value: Observable<T>,
        key: String,
        debounce: Duration,
        storage_kind: StorageKind,
        on_update: Option<UpdateHandler<T>>,
    ) -> Self {
        let storage = host.storage().resolve(storage_kind);
        let (Some(storage), Some(events)) = (storage, host.events()) else {
            debug!(%key, kind = %storage_kind, "storage unavailable, keeping value in memory");
            return Self {
                key,
                storage_kind,
                value,
                channel: Channel::MemoryOnly,
            };
        };

        let disposed = Rc::new(Cell::new(false));

        let debouncer = {
            let (key, storage, value, disposed) =
                (key.clone(), storage.clone(), value.clone(), Rc::clone(&disposed));
            Rc::new(Debouncer::new(host.scheduler().clone(), debounce, move || {
                if disposed.get() {
                    return;
                }
                // Storage writes notify peers synchronously; release the value first.
                let encoded = value.with(|current| encode_item(&key, current));
                write_encoded(&key, encoded, &storage);
            }))
        };
        let writer = {
            let (debouncer, disposed) = (Rc::clone(&debouncer), Rc::clone(&disposed));
            value.subscribe(move |_: &T| {
                if !disposed.get() {
                    debouncer.trigger();
                }
            })
        };

        let on_update: UpdateHandler<T> = match on_update {
            Some(handler) => handler,
            None => Rc::new(assign_into::<T>),
        };
        let listener = {
            let forward = ChangeFilter::new(key.clone(), storage.clone())
                .into_listener(on_update, value.clone());
            let disposed = Rc::clone(&disposed);
            events.add_listener(move |event: &StorageEvent| {
                if !disposed.get() {
                    forward(event);
                }
            })
        };

        debug!(%key, kind = %storage_kind, "channel opened");
        Self {
            key,
            storage_kind,
            value,
            channel: Channel::Persisted(Persisted {
                storage,
                events: Rc::clone(events),
                listener,
                writer: RefCell::new(Some(writer)),
                debouncer,
                loaded: Cell::new(false),
                disposed,
            }),
        }
    }

    /// Merge the stored copy into the value, once.
    ///
    /// Stored fields win when truthy; falsy stored fields only fill in
    /// fields the value lacks or holds falsy. Later calls do nothing, as do
    /// calls after [`dispose`](Self::dispose).
    pub fn load_initial_value(&self) {
        let Channel::Persisted(persisted) = &self.channel else {
            return;
        };
        if persisted.disposed.get() {
            trace!(key = %self.key, "load after dispose ignored");
            return;
        }
        if persisted.loaded.replace(true) {
            trace!(key = %self.key, "already loaded");
            return;
        }
        let merged = read_and_merge(&self.key, &persisted.storage, self.value.get());
        self.value.set(merged);
    }
}

impl<T> StoredObservable<T> {
    /// The synchronized value. Mutate it through its setters.
    #[must_use]
    pub fn value(&self) -> &Observable<T> {
        &self.value
    }

    /// Stop syncing. Idempotent.
    ///
    /// A pending write is cancelled; the value stays usable in memory.
    pub fn dispose(&self) {
        if let Channel::Persisted(persisted) = &self.channel {
            persisted.dispose(&self.key);
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn storage_kind(&self) -> StorageKind {
        self.storage_kind
    }

    /// Whether the channel is backed by a store.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        matches!(self.channel, Channel::Persisted(_))
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        match &self.channel {
            Channel::Persisted(persisted) => persisted.loaded.get(),
            Channel::MemoryOnly => false,
        }
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        match &self.channel {
            Channel::Persisted(persisted) => persisted.disposed.get(),
            Channel::MemoryOnly => false,
        }
    }

    /// Whether a debounced write is waiting to fire.
    #[must_use]
    pub fn has_pending_write(&self) -> bool {
        match &self.channel {
            Channel::Persisted(persisted) => persisted.debouncer.is_pending(),
            Channel::MemoryOnly => false,
        }
    }

    /// The store backing the channel, if any.
    #[must_use]
    pub fn storage(&self) -> Option<&StorageHandle> {
        match &self.channel {
            Channel::Persisted(persisted) => Some(&persisted.storage),
            Channel::MemoryOnly => None,
        }
    }
}

impl<T> Drop for StoredObservable<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<T: fmt::Debug> fmt::Debug for StoredObservable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredObservable")
            .field("key", &self.key)
            .field("storage_kind", &self.storage_kind)
            .field("value", &self.value)
            .field("persisted", &self.is_persisted())
            .field("loaded", &self.is_loaded())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
