//! Server to client payloads.

use serde::{Deserialize, Serialize};

use crate::RoomId;

/// System notice shown inside a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerMessage {
    /// Notice text
    pub text: String,
    /// Room the notice belongs to
    pub room: RoomId,
}

/// Chat text from a user, fanned out to the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Sender identity
    pub identity: String,
    /// Message body
    pub text: String,
    /// Room the message was sent to
    pub room: RoomId,
}

/// Someone started or stopped typing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTyping {
    /// Identity of the typist
    pub identity: String,
    /// Current indicator state
    pub is_typing: bool,
    /// Room the indicator applies to
    pub room: RoomId,
}

/// Full roster of connected identities, sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserList {
    /// Connected identities
    pub identities: Vec<String>,
}

/// The requester's view should switch to this private room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateRoomCreated {
    /// Private room name
    pub room: RoomId,
}

/// Request rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Human-readable reason
    pub text: String,
}

impl ErrorMessage {
    /// Build from anything displayable.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}
