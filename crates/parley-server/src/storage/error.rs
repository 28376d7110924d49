//! Registration store errors.

use thiserror::Error;

/// Errors from a registration store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Stored record could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error (file system, database, etc.)
    #[error("I/O error: {0}")]
    Io(String),

    /// A thread panicked while holding the in-memory store's lock
    #[error("registration store lock poisoned")]
    Poisoned,
}
