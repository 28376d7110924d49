//! Parley wire protocol.
//!
//! Every message on the wire is a [`Frame`]: a fixed 12-byte binary header
//! followed by a CBOR payload. The header carries the [`Opcode`], which alone
//! determines how the payload is decoded, so payloads never carry a variant
//! tag of their own.
//!
//! # Components
//!
//! - [`FrameHeader`]: zero-copy header (magic, version, opcode, payload size)
//! - [`Frame`]: header plus raw payload bytes
//! - [`Payload`]: typed view of every inbound and outbound chat event
//! - [`RoomId`]: room names shared by both directions

mod errors;
mod frame;
mod header;
mod opcode;
pub mod payloads;
mod room;

pub use errors::{ProtocolError, Result};
pub use frame::Frame;
pub use header::FrameHeader;
pub use opcode::Opcode;
pub use payloads::Payload;
pub use room::RoomId;

/// ALPN identifier negotiated by client and server during the TLS handshake.
pub const ALPN_PROTOCOL: &[u8] = b"parley";
