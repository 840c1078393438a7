#![forbid(unsafe_code)]

//! Core: storage handles, capability probing, change notifications, and the
//! host event loop.
//!
//! Everything here is single-threaded. Handles are `Rc`-based and a [`Host`]
//! bundles the three resources a synchronized value needs from its
//! environment: a [`StorageAccessor`], an optional [`StorageEvents`] hub, and
//! a [`Scheduler`].

pub mod error;
pub mod event;
pub mod host;
#[cfg(feature = "tracing-json")]
pub mod logging;
pub mod storage;
pub mod timer;

pub use error::{Result, StorageError};
pub use event::{ListenerId, StorageEvent, StorageEvents};
pub use host::{Host, SharedOrigin};
pub use storage::accessor::StorageAccessor;
pub use storage::{StorageHandle, StorageKind};
pub use timer::{LabClock, Scheduler, TimerHandle};
