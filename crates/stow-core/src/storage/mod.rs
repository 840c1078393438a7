//! Persistent key-value stores and the handles that identify them.
//!
//! A [`Storage`] is a string-to-string store with whole-value writes. Handles
//! are compared by identity: two handles refer to the same store only when
//! they wrap the same object, regardless of kind or contents. Change
//! notifications rely on this to tell one physical store from another.

pub mod accessor;
pub mod area;
pub mod file;
pub mod memory;

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use area::SharedArea;
pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Which persistent store a channel lives in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Long-lived store shared by every context of an origin.
    #[default]
    Primary,
    /// Store scoped to a single context's session.
    Session,
}

impl StorageKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Session => "session",
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A string key-value store.
///
/// Methods take `&self`; implementations use interior mutability since
/// handles are shared between owners on one thread.
pub trait Storage {
    /// Read the text stored at `key`.
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Overwrite the text stored at `key`.
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Removing an absent key succeeds.
    fn remove_item(&self, key: &str) -> Result<()>;

    /// Remove every entry.
    fn clear(&self) -> Result<()>;

    /// Number of stored entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shared handle to a [`Storage`] object.
///
/// Cloning yields another handle to the **same** store.
#[derive(Clone)]
pub struct StorageHandle {
    inner: Rc<dyn Storage>,
}

impl StorageHandle {
    pub fn new(storage: impl Storage + 'static) -> Self {
        Self {
            inner: Rc::new(storage),
        }
    }

    #[must_use]
    pub fn from_rc(inner: Rc<dyn Storage>) -> Self {
        Self { inner }
    }

    /// Whether both handles point at the same store object.
    #[must_use]
    pub fn same_store(&self, other: &StorageHandle) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.inner), Rc::as_ptr(&other.inner))
    }

    pub fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.inner.get_item(key)
    }

    pub fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.inner.set_item(key, value)
    }

    pub fn remove_item(&self, key: &str) -> Result<()> {
        self.inner.remove_item(key)
    }

    pub fn clear(&self) -> Result<()> {
        self.inner.clear()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for StorageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageHandle")
            .field("addr", &Rc::as_ptr(&self.inner).cast::<()>())
            .field("len", &self.inner.len())
            .finish()
    }
}
