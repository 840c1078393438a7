//! Keeping an [`Observable`] in sync with a persistent store.
//!
//! # Design
//!
//! A [`StoredObservable`] owns one channel, identified by `(key, storage
//! kind)`. Data moves in two directions:
//!
//! - **value to store**: every effective change of the observable triggers a
//!   trailing-edge [`Debouncer`]; when it fires, the whole current value is
//!   encoded and written at `key`.
//! - **store to value**: a listener on the host's notification hub passes
//!   foreign writes through a [`ChangeFilter`] and hands the decoded payload
//!   to the channel's [`UpdateHandler`].
//!
//! The initial load is separate and lazy: [`StoredObservable::load_initial_value`]
//! merges the stored copy into the current value once, preferring truthy
//! fields from either side.
//!
//! # Invariants
//!
//! 1. At most one read-and-merge per engine.
//! 2. After disposal nothing is written and no notification is applied; a
//!    pending write is cancelled.
//! 3. Failures of the store or the codec are logged and never surface from
//!    the engine's operations.
//!
//! When the store is unavailable, or the host cannot observe foreign writes,
//! the engine is memory-only and its load and dispose do nothing.

pub mod binding;
pub mod codec;
pub mod debounce;
pub mod engine;
pub mod error;
pub mod filter;
pub mod settings;

use std::rc::Rc;

use serde_json::Value;
use web_time::Duration;

use crate::reactive::Observable;

pub use binding::{PersistedStore, PersistedStoreOptions};
pub use debounce::Debouncer;
pub use engine::{StoredObservable, StoredObservableOptions};
pub use error::SyncError;
pub use filter::ChangeFilter;
pub use settings::SyncSettings;

/// Quiet period used when a channel does not set one.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Applies a decoded foreign write to a channel's observable.
///
/// The default is [`codec::assign_into`].
pub type UpdateHandler<T> = Rc<dyn Fn(Value, &Observable<T>)>;
