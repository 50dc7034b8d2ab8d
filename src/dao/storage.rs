use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or rejected the request.
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A live record already exists under this key.
    #[error("record `{key}` already exists")]
    AlreadyExists { key: String },
    /// The stored record moved past the version the caller loaded.
    #[error("record `{key}` changed concurrently (expected version {expected})")]
    VersionConflict { key: String, expected: u64 },
    /// The record disappeared between load and write.
    #[error("record `{key}` no longer exists")]
    Missing { key: String },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
