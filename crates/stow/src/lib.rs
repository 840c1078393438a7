#![forbid(unsafe_code)]

//! Stow public facade crate.
//!
//! Observable values that survive reloads and follow writes made by other
//! contexts sharing the same store.
//!
//! ```
//! use stow::prelude::*;
//! use serde_json::json;
//! use web_time::Duration;
//!
//! let origin = SharedOrigin::new(Scheduler::lab(&LabClock::new()));
//! let (tab_a, tab_b) = (origin.open_context(), origin.open_context());
//!
//! let a = StoredObservable::create(&tab_a, StoredObservableOptions::new("cart", json!({"items": []})));
//! let b = StoredObservable::create(&tab_b, StoredObservableOptions::new("cart", json!({"items": []})));
//! a.load_initial_value();
//! b.load_initial_value();
//!
//! a.value().set(json!({"items": [1]}));
//! origin.scheduler().advance(Duration::from_millis(300));
//! assert_eq!(b.value().get(), json!({"items": [1]}));
//! ```

pub use stow_core as core;
pub use stow_runtime as runtime;

pub mod prelude {
    pub use stow_core::{
        Host, LabClock, Scheduler, SharedOrigin, StorageAccessor, StorageHandle, StorageKind,
    };
    pub use stow_runtime::{
        Observable, PersistedStore, PersistedStoreOptions, StoredObservable,
        StoredObservableOptions, SyncSettings,
    };
}
