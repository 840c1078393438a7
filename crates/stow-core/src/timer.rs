//! Host event loop: deferred tasks on a single thread.
//!
//! A [`Scheduler`] is an explicit timer queue. Tasks are scheduled with a
//! delay and run later, when the owner calls [`Scheduler::run_due`] (or one
//! of the helpers built on it). Nothing ever runs inside
//! [`Scheduler::schedule`] itself, so a task always fires on a later turn
//! than the code that scheduled it.
//!
//! # Time source
//!
//! In production the scheduler reads `web_time::Instant::now()`. Tests use a
//! [`LabClock`] that only moves when advanced, which makes debounce timing
//! fully reproducible.
//!
//! # Invariants
//!
//! 1. A cancelled task never runs.
//! 2. Due tasks run ordered by due time, then by scheduling order.
//! 3. Tasks scheduled by a running task are honoured within the same
//!    `run_due` call if they are already due.
//!
//! # Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use stow_core::timer::{LabClock, Scheduler};
//! use web_time::Duration;
//!
//! let clock = LabClock::new();
//! let scheduler = Scheduler::lab(&clock);
//! let fired = Rc::new(Cell::new(false));
//! let flag = Rc::clone(&fired);
//! scheduler.schedule(Duration::from_millis(300), move || flag.set(true));
//!
//! assert_eq!(scheduler.advance(Duration::from_millis(299)), 0);
//! assert_eq!(scheduler.advance(Duration::from_millis(1)), 1);
//! assert!(fired.get());
//! ```

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;
use web_time::{Duration, Instant};

// ─── Time source ─────────────────────────────────────────────────────────────

/// A manually-advanceable clock for deterministic tests.
///
/// All schedulers sharing the same `LabClock` see the same time.
#[derive(Debug, Clone)]
pub struct LabClock {
    epoch: Instant,
    offset_us: Arc<AtomicU64>,
}

impl LabClock {
    /// Create a new lab clock starting at `Instant::now()`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            offset_us: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Advance the lab clock by `delta`.
    pub fn advance(&self, delta: Duration) {
        let us = delta.as_micros().min(u64::MAX as u128) as u64;
        self.offset_us.fetch_add(us, Ordering::Release);
    }

    /// Move the clock forward to `at`. Never moves it backwards.
    pub fn advance_to(&self, at: Instant) {
        let now = self.now();
        if at > now {
            self.advance(at - now);
        }
    }

    /// Current lab time.
    #[must_use]
    pub fn now(&self) -> Instant {
        let offset = Duration::from_micros(self.offset_us.load(Ordering::Acquire));
        self.epoch + offset
    }
}

impl Default for LabClock {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
enum TimeSource {
    /// Real wall-clock time.
    Real,
    /// Deterministic lab clock for testing.
    Lab(LabClock),
}

impl TimeSource {
    fn now(&self) -> Instant {
        match self {
            Self::Real => Instant::now(),
            Self::Lab(clock) => clock.now(),
        }
    }
}

// ─── Scheduler ───────────────────────────────────────────────────────────────

type Task = Box<dyn FnOnce()>;

/// Queue position: due time first, then a sequence number for FIFO ties.
type Slot = (Instant, u64);

/// Stand-in due offset for delays too large to add to an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(u32::MAX as u64);

struct SchedulerInner {
    time: TimeSource,
    next_seq: Cell<u64>,
    queue: RefCell<BTreeMap<Slot, Task>>,
}

/// Single-threaded timer queue.
///
/// Cloning yields another handle to the **same** queue.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<SchedulerInner>,
}

impl Scheduler {
    /// A scheduler driven by wall-clock time.
    #[must_use]
    pub fn real() -> Self {
        Self::with_time(TimeSource::Real)
    }

    /// A scheduler driven by `clock`.
    #[must_use]
    pub fn lab(clock: &LabClock) -> Self {
        Self::with_time(TimeSource::Lab(clock.clone()))
    }

    fn with_time(time: TimeSource) -> Self {
        Self {
            inner: Rc::new(SchedulerInner {
                time,
                next_seq: Cell::new(0),
                queue: RefCell::new(BTreeMap::new()),
            }),
        }
    }

    /// Current time according to this scheduler's time source.
    #[must_use]
    pub fn now(&self) -> Instant {
        self.inner.time.now()
    }

    /// Whether this scheduler uses a lab clock.
    #[must_use]
    pub fn is_lab(&self) -> bool {
        matches!(self.inner.time, TimeSource::Lab(_))
    }

    /// Run `task` once `delay` has elapsed.
    pub fn schedule(&self, delay: Duration, task: impl FnOnce() + 'static) -> TimerHandle {
        let seq = self.inner.next_seq.get();
        self.inner.next_seq.set(seq + 1);
        let now = self.now();
        // Delays past the representable range park the task far in the future.
        let due = now
            .checked_add(delay)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        let slot = (due, seq);
        self.inner.queue.borrow_mut().insert(slot, Box::new(task));
        trace!(seq, delay_us = delay.as_micros() as u64, "task scheduled");
        TimerHandle {
            slot,
            scheduler: Rc::downgrade(&self.inner),
        }
    }

    /// Run every task that is due now. Returns the number of tasks run.
    pub fn run_due(&self) -> usize {
        let mut ran = 0;
        loop {
            let now = self.now();
            // Release the borrow before running so tasks can schedule more.
            let task = {
                let mut queue = self.inner.queue.borrow_mut();
                let due_now = queue
                    .first_key_value()
                    .is_some_and(|(&(due, _), _)| due <= now);
                if due_now {
                    queue.pop_first().map(|(_, task)| task)
                } else {
                    None
                }
            };
            let Some(task) = task else {
                break;
            };
            task();
            ran += 1;
        }
        ran
    }

    /// Let `delta` pass, then run what became due.
    ///
    /// With a lab clock this moves the clock. With real time it sleeps.
    pub fn advance(&self, delta: Duration) -> usize {
        match &self.inner.time {
            TimeSource::Lab(clock) => clock.advance(delta),
            TimeSource::Real => std::thread::sleep(delta),
        }
        self.run_due()
    }

    /// Run tasks until the queue is empty, waiting for each in turn.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while let Some(due) = self.next_due() {
            match &self.inner.time {
                TimeSource::Lab(clock) => clock.advance_to(due),
                TimeSource::Real => {
                    let wait = due.saturating_duration_since(Instant::now());
                    if !wait.is_zero() {
                        std::thread::sleep(wait);
                    }
                }
            }
            ran += self.run_due();
        }
        ran
    }

    /// Number of tasks waiting to run.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    /// Due time of the earliest pending task.
    #[must_use]
    pub fn next_due(&self) -> Option<Instant> {
        self.inner.queue.borrow().keys().next().map(|&(due, _)| due)
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("time", &self.inner.time)
            .field("pending", &self.pending())
            .finish()
    }
}

// ─── TimerHandle ─────────────────────────────────────────────────────────────

/// Handle to one scheduled task.
///
/// Dropping the handle does **not** cancel the task; cancellation is always
/// explicit.
#[derive(Debug)]
pub struct TimerHandle {
    slot: Slot,
    scheduler: Weak<SchedulerInner>,
}

impl TimerHandle {
    /// Remove the task if it has not run yet. Returns `true` if it was
    /// pending.
    pub fn cancel(&self) -> bool {
        let Some(inner) = self.scheduler.upgrade() else {
            return false;
        };
        let removed = inner.queue.borrow_mut().remove(&self.slot).is_some();
        if removed {
            trace!(seq = self.slot.1, "task cancelled");
        }
        removed
    }

    /// Whether the task is still waiting to run.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.scheduler
            .upgrade()
            .is_some_and(|inner| inner.queue.borrow().contains_key(&self.slot))
    }

    /// When the task is (or was) due.
    #[must_use]
    pub fn due(&self) -> Instant {
        self.slot.0
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
