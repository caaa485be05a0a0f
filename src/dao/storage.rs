use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying platform.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend cannot be reached at all.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Human readable description of the outage.
        message: String,
        /// Underlying backend failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The backend refused the write (row ownership, constraint violation).
    #[error("storage rejected the operation: {message}")]
    Rejected {
        /// Reason reported by the backend.
        message: String,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct a rejection error carrying the backend's reason.
    pub fn rejected(message: impl Into<String>) -> Self {
        StorageError::Rejected {
            message: message.into(),
        }
    }
}
