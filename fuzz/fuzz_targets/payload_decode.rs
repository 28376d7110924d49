//! Fuzz target for Payload::decode
//!
//! Feeds malformed CBOR, oversized collections and payloads of the wrong
//! type to every opcode. Decoding must return an error, never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use parley_proto::{Opcode, Payload};

const OPCODES: [Opcode; 11] = [
    Opcode::Hello,
    Opcode::SendMessage,
    Opcode::Typing,
    Opcode::StartPrivateChat,
    Opcode::Logout,
    Opcode::ServerMessage,
    Opcode::ChatMessage,
    Opcode::UserTyping,
    Opcode::UserList,
    Opcode::PrivateRoomCreated,
    Opcode::Error,
];

fuzz_target!(|data: &[u8]| {
    for opcode in OPCODES {
        if let Ok(payload) = Payload::decode(opcode, data) {
            assert_eq!(payload.opcode(), opcode);
        }
    }
});
