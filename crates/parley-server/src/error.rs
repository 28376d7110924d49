//! Runtime error types.

use parley_proto::ProtocolError;
use thiserror::Error;

use crate::{router_error::DriverError, storage::StorageError};

/// Errors raised by the production runtime.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration error (invalid bind address, missing TLS certs, etc.).
    ///
    /// Fatal at startup. Fix configuration and restart.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport/network error (connection failure, I/O error, etc.).
    ///
    /// Fatal for the affected connection only, unless raised while binding.
    #[error("transport error: {0}")]
    Transport(String),

    /// A peer sent bytes that are not a valid frame or payload.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Registration store failure.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The router reported an internal inconsistency.
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    /// Unexpected state in the runtime itself.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(
            ServerError::Config("missing key".into()).to_string(),
            "configuration error: missing key"
        );
        assert_eq!(
            ServerError::from(ProtocolError::InvalidMagic).to_string(),
            "protocol error: invalid magic number"
        );
        assert_eq!(
            ServerError::from(StorageError::Poisoned).to_string(),
            "storage error: registration store lock poisoned"
        );
    }
}
