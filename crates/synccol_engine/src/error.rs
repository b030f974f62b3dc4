//! Error types for the sync engine.

use std::sync::Arc;
use synccol_storage::StorageError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
///
/// Errors are `Clone` so they can travel through shared (multi-awaiter)
/// futures.
#[derive(Error, Debug, Clone)]
pub enum SyncError {
    /// Network or transport error.
    #[error("network error: {message}")]
    Network {
        /// Error message.
        message: String,
        /// Whether the request can be retried.
        retryable: bool,
    },

    /// A request did not complete within its timeout.
    #[error("request timed out")]
    Timeout,

    /// The device reports no connectivity.
    #[error("device is offline")]
    Offline,

    /// A response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// The collection was never initialized (or was cleared by a reset).
    #[error("Collection {name} does not exist")]
    NotFound {
        /// Collection name.
        name: String,
    },

    /// The collection is registered with a different model type.
    #[error("collection {name} is registered with model {registered}, not {requested}")]
    ModelMismatch {
        /// Collection name.
        name: String,
        /// Model type the collection was registered with.
        registered: &'static str,
        /// Model type that was asked for.
        requested: &'static str,
    },

    /// Local storage failed.
    #[error("storage error: {0}")]
    Storage(#[source] Arc<StorageError>),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Creates a retryable network error.
    pub fn network_retryable(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable network error.
    pub fn network_fatal(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Network { retryable, .. } => *retryable,
            SyncError::Timeout => true,
            _ => false,
        }
    }
}

impl From<StorageError> for SyncError {
    fn from(err: StorageError) -> Self {
        SyncError::Storage(Arc::new(err))
    }
}
