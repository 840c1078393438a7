use stow_core::StorageError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

/// Failure inside the persistence path.
///
/// These never escape [`StoredObservable`](super::StoredObservable): every
/// one is logged at the boundary where it occurs and the in-memory value is
/// left as it was.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("unable to encode value for {key:?}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unable to write {key:?} to storage: {source}")]
    Write {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("unable to read {key:?} from storage: {source}")]
    Read {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("stored text for {key:?} is not valid JSON: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("stored value for {key:?} is not an object")]
    NotAnObject { key: String },

    #[error("merged value for {key:?} does not fit the target type: {source}")]
    Incompatible {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl SyncError {
    /// The channel key the failure happened on.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Encode { key, .. }
            | Self::Write { key, .. }
            | Self::Read { key, .. }
            | Self::Decode { key, .. }
            | Self::NotAnObject { key }
            | Self::Incompatible { key, .. } => key,
        }
    }

    /// Whether this failure happened while producing stored text.
    #[must_use]
    pub fn is_write_side(&self) -> bool {
        matches!(self, Self::Encode { .. } | Self::Write { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_and_side() {
        let err = SyncError::Write {
            key: "cart".into(),
            source: StorageError::Revoked,
        };
        assert_eq!(err.key(), "cart");
        assert!(err.is_write_side());
        assert_eq!(
            err.to_string(),
            "unable to write \"cart\" to storage: storage handle has been revoked"
        );

        let err = SyncError::NotAnObject { key: "k".into() };
        assert!(!err.is_write_side());
        assert_eq!(err.to_string(), "stored value for \"k\" is not an object");
    }

    #[test]
    fn decode_error_keeps_source() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = SyncError::Decode {
            key: "k".into(),
            source,
        };
        assert!(std::error::Error::source(&err).is_some());
    }
}
