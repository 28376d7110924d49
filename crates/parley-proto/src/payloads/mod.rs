//! CBOR-encoded chat events.
//!
//! Headers are raw binary; payloads are CBOR. The opcode in the header
//! selects the payload struct, so only the struct body is serialized and
//! there is no variant tag on the wire.
//!
//! # Invariants
//!
//! Each payload variant maps to exactly one opcode (enforced by match
//! exhaustiveness).

pub mod inbound;
pub mod outbound;

use bytes::BufMut;
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    Frame, FrameHeader, Opcode,
    errors::{ProtocolError, Result},
};

/// Every chat event that can travel in a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    // Client to server
    /// Handshake
    Hello(inbound::Hello),
    /// Chat text or command
    SendMessage(inbound::SendMessage),
    /// Typing indicator
    Typing(inbound::Typing),
    /// Private room request
    StartPrivateChat(inbound::StartPrivateChat),
    /// Username release
    Logout(inbound::Logout),

    // Server to client
    /// Room-scoped system notice
    ServerMessage(outbound::ServerMessage),
    /// Fanned-out chat text
    ChatMessage(outbound::ChatMessage),
    /// Typing indicator of another user
    UserTyping(outbound::UserTyping),
    /// Roster update
    UserList(outbound::UserList),
    /// Switch to a private room
    PrivateRoomCreated(outbound::PrivateRoomCreated),
    /// Rejection
    Error(outbound::ErrorMessage),
}

impl Payload {
    /// Opcode for this payload type.
    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        match self {
            Self::Hello(_) => Opcode::Hello,
            Self::SendMessage(_) => Opcode::SendMessage,
            Self::Typing(_) => Opcode::Typing,
            Self::StartPrivateChat(_) => Opcode::StartPrivateChat,
            Self::Logout(_) => Opcode::Logout,
            Self::ServerMessage(_) => Opcode::ServerMessage,
            Self::ChatMessage(_) => Opcode::ChatMessage,
            Self::UserTyping(_) => Opcode::UserTyping,
            Self::UserList(_) => Opcode::UserList,
            Self::PrivateRoomCreated(_) => Opcode::PrivateRoomCreated,
            Self::Error(_) => Opcode::Error,
        }
    }

    /// Encode the inner struct (no variant tag) into `dst`.
    ///
    /// Size is not checked here; [`Frame::encode`] enforces the limit.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::CborEncode` if serialization fails
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        let mut writer = dst.writer();

        match self {
            Self::Hello(inner) => ciborium::ser::into_writer(inner, &mut writer),
            Self::SendMessage(inner) => ciborium::ser::into_writer(inner, &mut writer),
            Self::Typing(inner) => ciborium::ser::into_writer(inner, &mut writer),
            Self::StartPrivateChat(inner) => ciborium::ser::into_writer(inner, &mut writer),
            Self::Logout(inner) => ciborium::ser::into_writer(inner, &mut writer),
            Self::ServerMessage(inner) => ciborium::ser::into_writer(inner, &mut writer),
            Self::ChatMessage(inner) => ciborium::ser::into_writer(inner, &mut writer),
            Self::UserTyping(inner) => ciborium::ser::into_writer(inner, &mut writer),
            Self::UserList(inner) => ciborium::ser::into_writer(inner, &mut writer),
            Self::PrivateRoomCreated(inner) => ciborium::ser::into_writer(inner, &mut writer),
            Self::Error(inner) => ciborium::ser::into_writer(inner, &mut writer),
        }
        .map_err(|e| ProtocolError::CborEncode(e.to_string()))
    }

    /// Decode payload bytes for `opcode`.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::PayloadTooLarge` if `bytes` exceed 64 KiB (checked
    ///   before any CBOR parsing)
    /// - `ProtocolError::CborDecode` if the bytes don't match the struct
    pub fn decode(opcode: Opcode, bytes: &[u8]) -> Result<Self> {
        if bytes.len() > FrameHeader::MAX_PAYLOAD_SIZE as usize {
            return Err(ProtocolError::PayloadTooLarge {
                size: bytes.len(),
                max: FrameHeader::MAX_PAYLOAD_SIZE as usize,
            });
        }

        let payload = match opcode {
            Opcode::Hello => Self::Hello(cbor(bytes)?),
            Opcode::SendMessage => Self::SendMessage(cbor(bytes)?),
            Opcode::Typing => Self::Typing(cbor(bytes)?),
            Opcode::StartPrivateChat => Self::StartPrivateChat(cbor(bytes)?),
            Opcode::Logout => Self::Logout(cbor(bytes)?),
            Opcode::ServerMessage => Self::ServerMessage(cbor(bytes)?),
            Opcode::ChatMessage => Self::ChatMessage(cbor(bytes)?),
            Opcode::UserTyping => Self::UserTyping(cbor(bytes)?),
            Opcode::UserList => Self::UserList(cbor(bytes)?),
            Opcode::PrivateRoomCreated => Self::PrivateRoomCreated(cbor(bytes)?),
            Opcode::Error => Self::Error(cbor(bytes)?),
        };

        Ok(payload)
    }

    /// Encode into a frame with the matching opcode.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::CborEncode` if serialization fails
    pub fn into_frame(self) -> Result<Frame> {
        let mut buf = Vec::new();
        self.encode(&mut buf)?;
        Ok(Frame::new(FrameHeader::new(self.opcode()), buf))
    }

    /// Parse the typed payload out of a frame.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::UnknownOpcode` if the header opcode is unassigned
    /// - Any error from [`Payload::decode`]
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let opcode = frame
            .header
            .opcode_enum()
            .ok_or_else(|| ProtocolError::UnknownOpcode(frame.header.opcode()))?;
        Self::decode(opcode, &frame.payload)
    }

    /// Encode straight to wire bytes.
    ///
    /// # Errors
    ///
    /// Any encoding error from [`Payload::into_frame`] or [`Frame::encode`].
    pub fn to_wire(self) -> Result<bytes::Bytes> {
        self.into_frame()?.to_bytes()
    }
}

fn cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::CborDecode(e.to_string()))
}

/// Encode any serializable value as CBOR.
///
/// # Errors
///
/// - `ProtocolError::CborEncode` if serialization fails
pub fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf)
        .map_err(|e| ProtocolError::CborEncode(e.to_string()))?;
    Ok(buf)
}
