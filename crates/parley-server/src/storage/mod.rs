//! Username registration.
//!
//! A username must be claimed here before a connection may use it and is
//! released when the connection disconnects or logs out. The trait is
//! synchronous; claims are tiny and happen once per handshake.

mod error;
mod memory;
mod redb;

pub use error::StorageError;
pub use memory::MemoryRegistrations;
use serde::{Deserialize, Serialize};

pub use self::redb::RedbRegistrations;

/// Record kept for each claimed username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRegistration {
    /// Unix timestamp (seconds) of the claim.
    pub claimed_at_secs: u64,
}

/// Store of claimed usernames.
///
/// Must be Clone (shared by every connection task), Send + Sync, and
/// synchronous. Implementations share state internally, so clones see the
/// same claims.
pub trait RegistrationStore: Clone + Send + Sync + 'static {
    /// Claim `username`.
    ///
    /// Returns `false`, leaving the existing claim untouched, if the name is
    /// already taken.
    fn claim(&self, username: &str, claimed_at_secs: u64) -> Result<bool, StorageError>;

    /// Release `username`. Returns `false` if it was not claimed.
    fn release(&self, username: &str) -> Result<bool, StorageError>;

    /// Whether `username` is currently claimed.
    fn is_registered(&self, username: &str) -> Result<bool, StorageError>;

    /// Claim record for `username`, if any.
    fn registration(&self, username: &str) -> Result<Option<StoredRegistration>, StorageError>;

    /// All claimed usernames, sorted.
    fn registered(&self) -> Result<Vec<String>, StorageError>;

    /// Drop every claim. Returns how many were dropped.
    ///
    /// Called at startup: claims left by a previous process belong to
    /// connections that no longer exist.
    fn clear(&self) -> Result<usize, StorageError>;
}
