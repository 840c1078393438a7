//! Storage change notifications.
//!
//! A [`StorageEvent`] reports that a shared store was modified by another
//! execution context. Each host owns one [`StorageEvents`] hub; listeners are
//! registered on it and identified by a [`ListenerId`] so they can be
//! removed again. There is no process-wide registry.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::storage::StorageHandle;

/// A change made to a store by some other context.
#[derive(Clone, Debug, Default)]
pub struct StorageEvent {
    /// Store the change applies to, as seen by the receiving context.
    pub origin: Option<StorageHandle>,
    /// Changed key. `None` when the whole store was cleared.
    pub key: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl StorageEvent {
    /// A change of `key` in `origin`.
    #[must_use]
    pub fn new(origin: &StorageHandle, key: impl Into<String>) -> Self {
        Self {
            origin: Some(origin.clone()),
            key: Some(key.into()),
            old_value: None,
            new_value: None,
        }
    }

    /// A `clear()` of `origin`.
    #[must_use]
    pub fn cleared(origin: &StorageHandle) -> Self {
        Self {
            origin: Some(origin.clone()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_old_value(mut self, old_value: impl Into<String>) -> Self {
        self.old_value = Some(old_value.into());
        self
    }

    #[must_use]
    pub fn with_new_value(mut self, new_value: impl Into<String>) -> Self {
        self.new_value = Some(new_value.into());
        self
    }
}

/// Identifies a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Rc<dyn Fn(&StorageEvent)>;

/// Per-host listener hub for [`StorageEvent`]s.
#[derive(Default)]
pub struct StorageEvents {
    next_id: Cell<u64>,
    listeners: RefCell<Vec<(ListenerId, Listener)>>,
}

impl StorageEvents {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener`. Listeners run in registration order.
    pub fn add_listener(&self, listener: impl Fn(&StorageEvent) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        trace!(listener = id.0, "storage listener added");
        id
    }

    /// Unregister a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        let removed = listeners.len() != before;
        if removed {
            trace!(listener = id.0, "storage listener removed");
        }
        removed
    }

    /// Deliver `event` to every listener registered when dispatch starts.
    ///
    /// Listeners may add or remove listeners while running; those changes
    /// take effect from the next dispatch. Returns the number of listeners
    /// invoked.
    pub fn dispatch(&self, event: &StorageEvent) -> usize {
        let snapshot: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        for listener in &snapshot {
            listener(event);
        }
        snapshot.len()
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

impl fmt::Debug for StorageEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageEvents")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
