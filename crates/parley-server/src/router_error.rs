//! Router error types.
//!
//! [`RouterError`] covers requests the router refuses. None of them is a
//! failure of the driver: each is turned into a log line and, where the
//! client can act on it, a message to that one client.
//!
//! [`DriverError`] is what `process_event` actually returns. Apart from the
//! wrapped refusals, which never escape, it only reports internal
//! inconsistencies.

use parley_proto::RoomId;
use thiserror::Error;

use crate::driver::{MAX_IDENTITY_LEN, MAX_MESSAGE_LEN};

/// A request the router refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    /// The session has no identity yet (or gave it up).
    #[error("session {0} has no identity")]
    UnregisteredConnection(u64),

    /// The named identity is not connected.
    #[error("User {0} is not available.")]
    UnknownTarget(String),

    /// The session is not a member of the room it addressed.
    #[error("session {session_id} is not in room {room}")]
    NotInRoom {
        /// Sender
        session_id: u64,
        /// Addressed room
        room: RoomId,
    },

    /// The identity is bound to another session.
    #[error("identity already in use: {0}")]
    IdentityTaken(String),

    /// The session already has an identity.
    #[error("session {0} is already registered")]
    AlreadyRegistered(u64),

    /// The proposed identity is longer than any the router accepts.
    #[error("username must be at most {max} bytes", max = MAX_IDENTITY_LEN)]
    IdentityTooLong {
        /// Identity that was turned away
        identity: String,
    },

    /// A private chat named an identity longer than any that can exist.
    #[error("username must be at most {max} bytes", max = MAX_IDENTITY_LEN)]
    TargetTooLong {
        /// Length of the named identity, in bytes
        len: usize,
    },

    /// Chat text over the length limit.
    #[error("message too long: {len} bytes (max {max})", max = MAX_MESSAGE_LEN)]
    MessageTooLong {
        /// Length of the text, in bytes
        len: usize,
    },

    /// The connection limit is reached.
    #[error("server is full")]
    ServerFull {
        /// Identity that was turned away
        identity: String,
    },
}

/// Errors returned by `ServerDriver::process_event`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// Refused request. Converted to actions before leaving the driver.
    #[error(transparent)]
    Router(#[from] RouterError),

    /// Registry state contradicts a check made earlier in the same event.
    #[error("registry inconsistency: {0}")]
    Inconsistent(String),
}
