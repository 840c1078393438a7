//! Declarative sync settings.
//!
//! Applications that keep their configuration in JSON can describe a
//! channel's timing and store there and apply it with
//! [`StoredObservableOptions::from_settings`](super::StoredObservableOptions::from_settings).
//!
//! ```
//! use stow_runtime::SyncSettings;
//! use stow_core::StorageKind;
//!
//! let settings = SyncSettings::from_json(r#"{"storage_kind":"session"}"#).unwrap();
//! assert_eq!(settings.debounce_ms, 300);
//! assert_eq!(settings.storage_kind, StorageKind::Session);
//! ```

use serde::{Deserialize, Serialize};
use stow_core::StorageKind;
use web_time::Duration;

use super::DEFAULT_DEBOUNCE;

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE.as_millis() as u64
}

/// Channel timing and placement, minus the key and initial value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncSettings {
    /// Quiet period before a mutation burst is written, in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default)]
    pub storage_kind: StorageKind,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            storage_kind: StorageKind::default(),
        }
    }
}

impl SyncSettings {
    /// Parse settings from JSON. Missing fields take their defaults.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
