use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorageError>;

/// Failure raised by a [`Storage`](crate::storage::Storage) backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage quota exceeded writing {key:?} ({needed} bytes, limit {limit})")]
    QuotaExceeded {
        key: String,
        needed: usize,
        limit: usize,
    },

    #[error("storage handle has been revoked")]
    Revoked,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl StorageError {
    /// Whether this is a quota failure. The capability probe treats these as
    /// "degraded but usable" when the store already holds entries.
    #[must_use]
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }
}
