//! Property-based tests for frame and payload codecs
//!
//! Frames travel back to back on one stream, so these check that a reader
//! can always split a byte stream into the frames that were written, and that
//! truncated or corrupted input is rejected rather than misread.

use parley_proto::{
    Frame, FrameHeader, Payload, ProtocolError, RoomId,
    payloads::{inbound, outbound},
};
use proptest::prelude::*;

fn room() -> impl Strategy<Value = RoomId> {
    prop_oneof![Just(RoomId::general()), (any::<u64>(), any::<u64>()).prop_map(|(a, b)| {
        RoomId::from(format!("{}-{}", a.min(b), a.max(b)))
    })]
}

fn name() -> impl Strategy<Value = String> {
    "[a-z]{1,12}"
}

fn payload() -> impl Strategy<Value = Payload> {
    prop_oneof![
        name().prop_map(|username| Payload::Hello(inbound::Hello { username })),
        (room(), ".{0,64}").prop_map(|(room, text)| Payload::SendMessage(inbound::SendMessage {
            room,
            text
        })),
        (room(), any::<bool>())
            .prop_map(|(room, is_typing)| Payload::Typing(inbound::Typing { room, is_typing })),
        name().prop_map(|target| Payload::StartPrivateChat(inbound::StartPrivateChat { target })),
        name().prop_map(|username| Payload::Logout(inbound::Logout { username })),
        (".{0,64}", room()).prop_map(|(text, room)| Payload::ServerMessage(
            outbound::ServerMessage { text, room }
        )),
        (name(), ".{0,64}", room()).prop_map(|(identity, text, room)| Payload::ChatMessage(
            outbound::ChatMessage { identity, text, room }
        )),
        (name(), any::<bool>(), room()).prop_map(|(identity, is_typing, room)| {
            Payload::UserTyping(outbound::UserTyping { identity, is_typing, room })
        }),
        prop::collection::vec(name(), 0..8)
            .prop_map(|identities| Payload::UserList(outbound::UserList { identities })),
        room().prop_map(|room| Payload::PrivateRoomCreated(outbound::PrivateRoomCreated { room })),
        ".{0,32}".prop_map(|text| Payload::Error(outbound::ErrorMessage { text })),
    ]
}

/// Split a buffer of back-to-back frames the way the server's reader does.
fn split_stream(mut buf: &[u8]) -> Result<Vec<Frame>, ProtocolError> {
    let mut frames = Vec::new();
    while !buf.is_empty() {
        let len = Frame::encoded_len(buf)?;
        let frame = Frame::decode(buf)?;
        frames.push(frame);
        buf = &buf[len..];
    }
    Ok(frames)
}

#[test]
fn prop_stream_of_payloads_splits_back() {
    proptest!(|(payloads in prop::collection::vec(payload(), 1..16))| {
        let mut wire = Vec::new();
        for payload in &payloads {
            let frame = payload.clone().into_frame().expect("frame");
            frame.encode(&mut wire).expect("encode");
        }

        let frames = split_stream(&wire).expect("split");
        prop_assert_eq!(frames.len(), payloads.len());

        for (frame, expected) in frames.iter().zip(&payloads) {
            prop_assert_eq!(frame.header.opcode_enum(), Some(expected.opcode()));
            prop_assert_eq!(&Payload::from_frame(frame).expect("payload"), expected);
        }
    });
}

#[test]
fn prop_truncated_frame_rejected() {
    proptest!(|(event in payload(), cut in 1usize..64)| {
        let wire = event.to_wire().expect("wire");
        let keep = wire.len().saturating_sub(cut);

        let result = Frame::decode(&wire[..keep]);
        if keep < FrameHeader::SIZE {
            let is_short = matches!(result, Err(ProtocolError::FrameTooShort { .. }));
            prop_assert!(is_short);
        } else {
            let is_truncated = matches!(result, Err(ProtocolError::FrameTruncated { .. }));
            prop_assert!(is_truncated);
        }
    });
}

#[test]
fn prop_arbitrary_bytes_never_panic() {
    proptest!(|(bytes in prop::collection::vec(any::<u8>(), 0..256))| {
        if let Ok(frame) = Frame::decode(&bytes) {
            let _ = Payload::from_frame(&frame);
        }
    });
}

#[test]
fn prop_corrupted_magic_rejected() {
    proptest!(|(event in payload(), flip in 0usize..4, bits in 1u8..=255)| {
        let mut wire = event.to_wire().expect("wire").to_vec();
        wire[flip] ^= bits;

        prop_assert_eq!(Frame::decode(&wire), Err(ProtocolError::InvalidMagic));
    });
}
