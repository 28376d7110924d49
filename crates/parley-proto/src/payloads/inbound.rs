//! Client to server payloads.

use serde::{Deserialize, Serialize};

use crate::RoomId;

/// First frame on every stream: the name the client wants to use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    /// Proposed display name
    pub username: String,
}

/// Chat text (or a slash command) addressed to a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessage {
    /// Target room; the sender must be a member
    pub room: RoomId,
    /// Message body, verbatim
    pub text: String,
}

/// Typing indicator change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Typing {
    /// Room the indicator applies to
    pub room: RoomId,
    /// `true` when typing starts, `false` when it stops
    pub is_typing: bool,
}

/// Ask for a private room with another connected user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartPrivateChat {
    /// Identity of the other participant
    pub target: String,
}

/// Release the username while keeping the transport open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Logout {
    /// Username being given up; must match the session's identity
    pub username: String,
}
