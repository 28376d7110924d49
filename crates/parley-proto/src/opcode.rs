//! Operation codes.
//!
//! Inbound (client to server) codes live in `0x00xx`, outbound (server to
//! client) codes in `0x01xx`.

/// Frame operation code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Opcode {
    /// Handshake carrying the proposed username
    Hello = 0x0001,
    /// Chat text addressed to a room
    SendMessage = 0x0010,
    /// Typing indicator for a room
    Typing = 0x0011,
    /// Request a private room with another user
    StartPrivateChat = 0x0012,
    /// Give up the username without closing the transport
    Logout = 0x0013,

    /// System notice scoped to a room
    ServerMessage = 0x0100,
    /// Chat text fanned out to a room
    ChatMessage = 0x0101,
    /// Someone started or stopped typing
    UserTyping = 0x0102,
    /// Full roster of connected identities
    UserList = 0x0103,
    /// The requester should switch its view to a private room
    PrivateRoomCreated = 0x0104,
    /// Error addressed to a single client
    Error = 0x01FF,
}

impl Opcode {
    /// Raw wire value.
    #[must_use]
    pub const fn to_u16(self) -> u16 {
        self as u16
    }

    /// Parse a raw wire value. `None` if unassigned.
    #[must_use]
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0001 => Some(Self::Hello),
            0x0010 => Some(Self::SendMessage),
            0x0011 => Some(Self::Typing),
            0x0012 => Some(Self::StartPrivateChat),
            0x0013 => Some(Self::Logout),
            0x0100 => Some(Self::ServerMessage),
            0x0101 => Some(Self::ChatMessage),
            0x0102 => Some(Self::UserTyping),
            0x0103 => Some(Self::UserList),
            0x0104 => Some(Self::PrivateRoomCreated),
            0x01FF => Some(Self::Error),
            _ => None,
        }
    }

    /// Whether clients are allowed to send this opcode.
    #[must_use]
    pub const fn is_inbound(self) -> bool {
        self.to_u16() < 0x0100
    }
}
