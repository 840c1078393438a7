//! Trailing-edge debouncing on a [`Scheduler`].
//!
//! Every [`Debouncer::trigger`] cancels the pending run and schedules a new
//! one `delay` later, so a burst of triggers collapses into a single run
//! after the last of them. The action runs at fire time and therefore sees
//! whatever state exists then, not the state at any individual trigger.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use stow_core::{Scheduler, TimerHandle};
use web_time::Duration;

struct DebouncerInner {
    scheduler: Scheduler,
    delay: Duration,
    action: Box<dyn Fn()>,
    pending: RefCell<Option<TimerHandle>>,
    fired: Cell<u64>,
}

pub struct Debouncer {
    inner: Rc<DebouncerInner>,
}

impl Debouncer {
    pub fn new(scheduler: Scheduler, delay: Duration, action: impl Fn() + 'static) -> Self {
        Self {
            inner: Rc::new(DebouncerInner {
                scheduler,
                delay,
                action: Box::new(action),
                pending: RefCell::new(None),
                fired: Cell::new(0),
            }),
        }
    }

    /// Restart the countdown.
    pub fn trigger(&self) {
        self.cancel();
        // The queued task only holds a weak reference; dropping the
        // debouncer leaves it inert.
        let weak: Weak<DebouncerInner> = Rc::downgrade(&self.inner);
        let handle = self.inner.scheduler.schedule(self.inner.delay, move || {
            if let Some(inner) = weak.upgrade() {
                inner.pending.borrow_mut().take();
                inner.fired.set(inner.fired.get() + 1);
                (inner.action)();
            }
        });
        *self.inner.pending.borrow_mut() = Some(handle);
    }

    /// Drop the pending run, if any. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        self.inner
            .pending
            .borrow_mut()
            .take()
            .is_some_and(|handle| handle.cancel())
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.inner
            .pending
            .borrow()
            .as_ref()
            .is_some_and(TimerHandle::is_pending)
    }

    /// Number of times the action has run.
    #[must_use]
    pub fn fire_count(&self) -> u64 {
        self.inner.fired.get()
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.inner.delay
    }
}

impl fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.inner.delay)
            .field("pending", &self.is_pending())
            .field("fired", &self.inner.fired.get())
            .finish()
    }
}
