//! The environment a synchronized value runs in.
//!
//! A [`Host`] bundles the stores a context can reach, its change
//! notification hub (if the platform has one), and its event loop. Every
//! resource is owned by the host value; nothing is process-global.

use std::rc::Rc;

use crate::event::StorageEvents;
use crate::storage::accessor::StorageAccessor;
use crate::storage::{MemoryStorage, SharedArea, StorageHandle};
use crate::timer::{LabClock, Scheduler};

#[derive(Debug, Clone)]
pub struct Host {
    storage: StorageAccessor,
    events: Option<Rc<StorageEvents>>,
    scheduler: Scheduler,
}

impl Host {
    /// A host with the given stores and a fresh notification hub.
    #[must_use]
    pub fn new(storage: StorageAccessor, scheduler: Scheduler) -> Self {
        Self {
            storage,
            events: Some(Rc::new(StorageEvents::new())),
            scheduler,
        }
    }

    /// A host with fresh, private in-memory primary and session stores.
    #[must_use]
    pub fn in_memory(scheduler: Scheduler) -> Self {
        let storage = StorageAccessor::new()
            .with_primary(StorageHandle::new(MemoryStorage::new()))
            .with_session(StorageHandle::new(MemoryStorage::new()));
        Self::new(storage, scheduler)
    }

    /// [`Host::in_memory`] driven by a lab clock.
    #[must_use]
    pub fn lab(clock: &LabClock) -> Self {
        Self::in_memory(Scheduler::lab(clock))
    }

    /// Drop the change-notification mechanism, as on platforms that have
    /// storage but no way to observe foreign writes.
    #[must_use]
    pub fn without_events(mut self) -> Self {
        self.events = None;
        self
    }

    #[must_use]
    pub fn storage(&self) -> &StorageAccessor {
        &self.storage
    }

    #[must_use]
    pub fn events(&self) -> Option<&Rc<StorageEvents>> {
        self.events.as_ref()
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }
}

/// Several execution contexts sharing one primary store.
///
/// Each context opened with [`SharedOrigin::open_context`] gets its own view
/// of the shared primary area (so it is notified of the others' writes) and
/// a private session store. All contexts share one scheduler.
#[derive(Debug, Clone)]
pub struct SharedOrigin {
    primary: Rc<SharedArea>,
    scheduler: Scheduler,
}

impl SharedOrigin {
    #[must_use]
    pub fn new(scheduler: Scheduler) -> Self {
        Self::with_area(SharedArea::new(), scheduler)
    }

    #[must_use]
    pub fn with_area(primary: Rc<SharedArea>, scheduler: Scheduler) -> Self {
        Self { primary, scheduler }
    }

    #[must_use]
    pub fn primary_area(&self) -> &Rc<SharedArea> {
        &self.primary
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Open a new context on this origin.
    #[must_use]
    pub fn open_context(&self) -> Host {
        let events = Rc::new(StorageEvents::new());
        let session = SharedArea::new().attach(&events);
        let storage = StorageAccessor::new()
            .with_primary(self.primary.attach(&events))
            .with_session(session);
        Host {
            storage,
            events: Some(events),
            scheduler: self.scheduler.clone(),
        }
    }
}
