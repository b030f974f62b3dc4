//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A value or snapshot could not be encoded or decoded as JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The write would push the key/value area past its quota.
    #[error("quota exceeded: {needed} bytes needed, quota is {quota} bytes")]
    QuotaExceeded {
        /// Total size the area would have after the write.
        needed: usize,
        /// Configured quota of the area.
        quota: usize,
    },

    /// A document write carried a stale (or missing) revision.
    #[error("document update conflict for key {key}")]
    Conflict {
        /// Document key.
        key: String,
    },

    /// The requested document does not exist.
    #[error("document not found: {key}")]
    NotFound {
        /// Document key.
        key: String,
    },

    /// The document database was destroyed and not yet recreated.
    #[error("database has been destroyed")]
    Destroyed,
}

impl StorageError {
    /// Returns true if a write failed because of a revision mismatch.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Conflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_detection() {
        assert!(StorageError::Conflict { key: "users".into() }.is_conflict());
        assert!(!StorageError::Destroyed.is_conflict());
    }

    #[test]
    fn error_display() {
        let err = StorageError::QuotaExceeded {
            needed: 10,
            quota: 5,
        };
        assert!(err.to_string().contains("10"));
        assert!(err.to_string().contains("5"));
    }
}
