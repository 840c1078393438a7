//! In-memory [`Storage`] with an optional byte quota.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use super::Storage;
use crate::error::{Result, StorageError};

/// Ordered in-memory store.
///
/// The quota counts key and value bytes of every entry. A write that would
/// push the total past the limit fails with [`StorageError::QuotaExceeded`]
/// and leaves the store untouched. After [`revoke`](Self::revoke) every
/// operation fails with [`StorageError::Revoked`].
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RefCell<BTreeMap<String, String>>,
    quota: Cell<Option<usize>>,
    revoked: Cell<bool>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_quota(limit: usize) -> Self {
        let storage = Self::new();
        storage.quota.set(Some(limit));
        storage
    }

    /// Change (or lift, with `None`) the byte quota.
    pub fn set_quota(&self, limit: Option<usize>) {
        self.quota.set(limit);
    }

    /// Make every further operation fail.
    pub fn revoke(&self) {
        self.revoked.set(true);
    }

    #[must_use]
    pub fn is_revoked(&self) -> bool {
        self.revoked.get()
    }

    /// Bytes currently used by keys and values.
    #[must_use]
    pub fn used_bytes(&self) -> usize {
        self.entries
            .borrow()
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }

    fn ensure_live(&self) -> Result<()> {
        if self.revoked.get() {
            return Err(StorageError::Revoked);
        }
        Ok(())
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.ensure_live()?;
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.ensure_live()?;
        if let Some(limit) = self.quota.get() {
            let existing = self
                .entries
                .borrow()
                .get(key)
                .map_or(0, |old| key.len() + old.len());
            let needed = self.used_bytes() - existing + key.len() + value.len();
            if needed > limit {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_owned(),
                    needed,
                    limit,
                });
            }
        }
        self.entries
            .borrow_mut()
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.ensure_live()?;
        self.entries.borrow_mut().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.ensure_live()?;
        self.entries.borrow_mut().clear();
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get_item("k").unwrap(), None);
        storage.set_item("k", "v").unwrap();
        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("v"));
        assert_eq!(storage.len(), 1);
        storage.remove_item("k").unwrap();
        assert!(storage.is_empty());
        storage.remove_item("missing").unwrap();
    }

    #[test]
    fn quota_rejects_oversized_write() {
        let storage = MemoryStorage::with_quota(8);
        storage.set_item("ab", "cdef").unwrap();
        assert_eq!(storage.used_bytes(), 6);
        let err = storage.set_item("xy", "z").unwrap_err();
        assert!(err.is_quota_exceeded());
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn quota_accounts_for_replaced_value() {
        let storage = MemoryStorage::with_quota(8);
        storage.set_item("ab", "cdef").unwrap();
        // Replacing shrinks usage before the new value is counted.
        storage.set_item("ab", "cdefgh").unwrap();
        assert_eq!(storage.used_bytes(), 8);
        assert!(storage.set_item("ab", "cdefghi").is_err());
    }

    #[test]
    fn lifting_quota_allows_writes() {
        let storage = MemoryStorage::with_quota(1);
        assert!(storage.set_item("k", "v").is_err());
        storage.set_quota(None);
        storage.set_item("k", "v").unwrap();
    }

    #[test]
    fn revoked_storage_fails_everything() {
        let storage = MemoryStorage::new();
        storage.set_item("k", "v").unwrap();
        storage.revoke();
        assert!(storage.is_revoked());
        assert!(matches!(storage.get_item("k"), Err(StorageError::Revoked)));
        assert!(matches!(
            storage.set_item("k", "w"),
            Err(StorageError::Revoked)
        ));
        assert!(matches!(storage.remove_item("k"), Err(StorageError::Revoked)));
        assert!(matches!(storage.clear(), Err(StorageError::Revoked)));
    }
}
