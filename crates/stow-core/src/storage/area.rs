//! A store shared by several execution contexts.
//!
//! [`SharedArea`] holds one set of entries and hands out a distinct view per
//! context. A change made through one view is reported to every *other*
//! attached view's [`StorageEvents`] hub, with the event's origin set to the
//! receiving view. The writing view is never notified of its own changes.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::trace;

use super::{MemoryStorage, Storage, StorageHandle};
use crate::error::Result;
use crate::event::{StorageEvent, StorageEvents};

/// Entries shared by every attached view.
#[derive(Debug, Default)]
pub struct SharedArea {
    backend: MemoryStorage,
    views: RefCell<Vec<Weak<AreaView>>>,
}

impl SharedArea {
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    #[must_use]
    pub fn with_quota(limit: usize) -> Rc<Self> {
        Rc::new(Self {
            backend: MemoryStorage::with_quota(limit),
            views: RefCell::default(),
        })
    }

    /// The backing entries, bypassing change notification.
    #[must_use]
    pub fn backend(&self) -> &MemoryStorage {
        &self.backend
    }

    /// Open a view whose foreign changes are delivered to `events`.
    pub fn attach(self: &Rc<Self>, events: &Rc<StorageEvents>) -> StorageHandle {
        let view = Rc::new(AreaView {
            area: Rc::clone(self),
            events: Rc::downgrade(events),
        });
        let mut views = self.views.borrow_mut();
        views.retain(|v| v.strong_count() > 0);
        views.push(Rc::downgrade(&view));
        StorageHandle::from_rc(view)
    }

    /// Number of live views.
    #[must_use]
    pub fn view_count(&self) -> usize {
        self.views
            .borrow()
            .iter()
            .filter(|v| v.strong_count() > 0)
            .count()
    }

    fn broadcast(
        &self,
        writer: &AreaView,
        key: Option<&str>,
        old_value: Option<String>,
        new_value: Option<String>,
    ) {
        let targets: Vec<(Rc<AreaView>, Rc<StorageEvents>)> = self
            .views
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|view| !std::ptr::eq(Rc::as_ptr(view), writer))
            .filter_map(|view| view.events.upgrade().map(|events| (view, events)))
            .collect();

        trace!(key, peers = targets.len(), "shared area change");
        for (view, events) in targets {
            let event = StorageEvent {
                origin: Some(StorageHandle::from_rc(view)),
                key: key.map(str::to_owned),
                old_value: old_value.clone(),
                new_value: new_value.clone(),
            };
            events.dispatch(&event);
        }
    }
}

/// One context's view of a [`SharedArea`].
#[derive(Debug)]
struct AreaView {
    area: Rc<SharedArea>,
    events: Weak<StorageEvents>,
}

impl Storage for AreaView {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.area.backend.get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let old = self.area.backend.get_item(key)?;
        self.area.backend.set_item(key, value)?;
        if old.as_deref() != Some(value) {
            self.area
                .broadcast(self, Some(key), old, Some(value.to_owned()));
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let old = self.area.backend.get_item(key)?;
        self.area.backend.remove_item(key)?;
        if old.is_some() {
            self.area.broadcast(self, Some(key), old, None);
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let had_entries = !self.area.backend.is_empty();
        self.area.backend.clear()?;
        if had_entries {
            self.area.broadcast(self, None, None, None);
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.area.backend.len()
    }
}
