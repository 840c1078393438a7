#![forbid(unsafe_code)]

//! Observable values that persist themselves to a key-value store and pick
//! up changes other contexts make to it.
//!
//! - [`reactive`]: the [`Observable`] value type with change subscriptions.
//! - [`persist`]: the synchronization engine ([`StoredObservable`]) and its
//!   codec, notification filter, debouncer, and UI binding helper.

pub mod persist;
pub mod reactive;

pub use persist::{
    PersistedStore, PersistedStoreOptions, StoredObservable, StoredObservableOptions, SyncError,
    SyncSettings, UpdateHandler,
};
pub use reactive::{Observable, Subscription};
