//! Storage capability probing.
//!
//! A store may exist but be unusable: disabled by the user, restricted in a
//! private session, or full. [`StorageAccessor::resolve`] only hands out a
//! handle after a write/remove probe succeeds. A quota failure still counts
//! as usable when the store already holds entries, since existing data can
//! be read and overwritten.

use tracing::debug;

use super::{StorageHandle, StorageKind};

/// Key written and removed by the probe.
pub const PROBE_KEY: &str = "__storage_test__";

/// Probe whether `handle` accepts writes.
#[must_use]
pub fn probe(handle: &StorageHandle) -> bool {
    let outcome = handle
        .set_item(PROBE_KEY, PROBE_KEY)
        .and_then(|()| handle.remove_item(PROBE_KEY));
    match outcome {
        Ok(()) => true,
        Err(err) if err.is_quota_exceeded() => {
            let usable = !handle.is_empty();
            debug!(usable, error = %err, "storage probe hit quota");
            usable
        }
        Err(err) => {
            debug!(error = %err, "storage probe failed");
            false
        }
    }
}

/// The stores a host exposes, one optional handle per [`StorageKind`].
///
/// An absent handle models a platform without that storage API.
#[derive(Debug, Clone, Default)]
pub struct StorageAccessor {
    primary: Option<StorageHandle>,
    session: Option<StorageHandle>,
}

impl StorageAccessor {
    /// An accessor with no stores at all.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_store(mut self, kind: StorageKind, handle: StorageHandle) -> Self {
        *self.slot_mut(kind) = Some(handle);
        self
    }

    #[must_use]
    pub fn with_primary(self, handle: StorageHandle) -> Self {
        self.with_store(StorageKind::Primary, handle)
    }

    #[must_use]
    pub fn with_session(self, handle: StorageHandle) -> Self {
        self.with_store(StorageKind::Session, handle)
    }

    /// The raw handle for `kind`, without probing.
    #[must_use]
    pub fn handle(&self, kind: StorageKind) -> Option<&StorageHandle> {
        match kind {
            StorageKind::Primary => self.primary.as_ref(),
            StorageKind::Session => self.session.as_ref(),
        }
    }

    /// Probe `kind` and return its handle if usable.
    #[must_use]
    pub fn resolve(&self, kind: StorageKind) -> Option<StorageHandle> {
        let Some(handle) = self.handle(kind) else {
            debug!(%kind, "storage kind not provided by host");
            return None;
        };
        probe(handle).then(|| handle.clone())
    }

    #[must_use]
    pub fn is_available(&self, kind: StorageKind) -> bool {
        self.resolve(kind).is_some()
    }

    /// Run `f` with the store for `kind` when it is usable.
    pub fn with_storage<R>(
        &self,
        kind: StorageKind,
        f: impl FnOnce(&StorageHandle) -> R,
    ) -> Option<R> {
        self.resolve(kind).map(|handle| f(&handle))
    }

    /// Run `f` with the store for `kind`, or `fallback` when it is unusable.
    pub fn with_storage_or_else<R>(
        &self,
        kind: StorageKind,
        f: impl FnOnce(&StorageHandle) -> R,
        fallback: impl FnOnce() -> R,
    ) -> R {
        match self.resolve(kind) {
            Some(handle) => f(&handle),
            None => fallback(),
        }
    }

    fn slot_mut(&mut self, kind: StorageKind) -> &mut Option<StorageHandle> {
        match kind {
            StorageKind::Primary => &mut self.primary,
            StorageKind::Session => &mut self.session,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::storage::{MemoryStorage, Storage};

    fn accessor_with(primary: MemoryStorage) -> (StorageAccessor, Rc<MemoryStorage>) {
        let backend = Rc::new(primary);
        let handle = StorageHandle::from_rc(backend.clone());
        (StorageAccessor::new().with_primary(handle), backend)
    }

    #[test]
    fn resolves_usable_store() {
        let (accessor, backend) = accessor_with(MemoryStorage::new());
        let handle = accessor.resolve(StorageKind::Primary).expect("usable");
        assert!(handle.same_store(accessor.handle(StorageKind::Primary).unwrap()));
        // Probe leaves nothing behind.
        assert!(backend.is_empty());
    }

    #[test]
    fn missing_kind_is_unavailable() {
        let (accessor, _) = accessor_with(MemoryStorage::new());
        assert!(accessor.resolve(StorageKind::Session).is_none());
        assert!(!accessor.is_available(StorageKind::Session));
    }

    #[test]
    fn revoked_store_is_unavailable() {
        let (accessor, backend) = accessor_with(MemoryStorage::new());
        backend.revoke();
        assert!(accessor.resolve(StorageKind::Primary).is_none());
    }

    #[test]
    fn full_empty_store_is_unavailable() {
        let (accessor, _) = accessor_with(MemoryStorage::with_quota(0));
        assert!(accessor.resolve(StorageKind::Primary).is_none());
    }

    #[test]
    fn full_store_with_entries_is_degraded_but_usable() {
        let (accessor, backend) = accessor_with(MemoryStorage::new());
        backend.set_item("existing", "data").unwrap();
        backend.set_quota(Some(backend.used_bytes()));
        assert!(accessor.resolve(StorageKind::Primary).is_some());
    }

    #[test]
    fn with_storage_runs_callback() {
        let (accessor, _) = accessor_with(MemoryStorage::new());
        let calls = std::cell::Cell::new(0);
        let out = accessor.with_storage(StorageKind::Primary, |h| {
            calls.set(calls.get() + 1);
            h.len() + 42
        });
        assert_eq!(out, Some(42));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn with_storage_falls_back_without_store() {
        let (accessor, _) = accessor_with(MemoryStorage::new());
        let out = accessor.with_storage_or_else(StorageKind::Session, |_| 1, || 442);
        assert_eq!(out, 442);
        assert_eq!(accessor.with_storage(StorageKind::Session, |_| 1), None);
    }
}
