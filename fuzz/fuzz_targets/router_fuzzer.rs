//! Fuzz target for the presence and room router
//!
//! # Invariants
//!
//! - Every identity maps to a session that maps back to it
//! - Broadcast recipients are non-empty, ascending and members of the room
//! - Disconnecting every session leaves only an empty general room
//! - The router never reports an internal inconsistency

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use parley_proto::RoomId;
use parley_server::{
    DriverConfig, PrivateJoin, ServerAction, ServerDriver, ServerEvent, SystemEnv, pair_key,
};

const NAMES: [&str; 4] = ["alice", "bob", "carol", ""];
const SESSIONS: u64 = 8;

#[derive(Debug, Arbitrary)]
struct Scenario {
    immediate: bool,
    max_connections: u8,
    ops: Vec<Op>,
}

#[derive(Debug, Arbitrary)]
enum Op {
    Connect { session: u8, name: u8 },
    Disconnect { session: u8 },
    Logout { name: u8 },
    Private { session: u8, name: u8 },
    Typing { session: u8, peer: Option<u8>, is_typing: bool },
    Message { session: u8, peer: Option<u8>, text: String },
}

fn session(raw: u8) -> u64 {
    u64::from(raw) % SESSIONS
}

fn name(raw: u8) -> String {
    NAMES[usize::from(raw) % NAMES.len()].to_owned()
}

fn room(session_id: u64, peer: Option<u8>) -> RoomId {
    peer.map_or_else(RoomId::general, |peer| pair_key(session_id, session(peer)))
}

fn event(op: Op) -> ServerEvent {
    match op {
        Op::Connect { session: s, name: n } => {
            ServerEvent::Connect { session_id: session(s), identity: Some(name(n)) }
        },
        Op::Disconnect { session: s } => ServerEvent::Disconnect { session_id: session(s) },
        Op::Logout { name: n } => ServerEvent::Logout { identity: name(n) },
        Op::Private { session: s, name: n } => {
            ServerEvent::StartPrivateChat { session_id: session(s), target: name(n) }
        },
        Op::Typing { session: s, peer, is_typing } => {
            let session_id = session(s);
            ServerEvent::Typing { session_id, room: room(session_id, peer), is_typing }
        },
        Op::Message { session: s, peer, text } => {
            let session_id = session(s);
            ServerEvent::Message { session_id, room: room(session_id, peer), text }
        },
    }
}

fuzz_target!(|scenario: Scenario| {
    let private_join =
        if scenario.immediate { PrivateJoin::Immediate } else { PrivateJoin::OnRequest };
    let config = DriverConfig {
        max_connections: usize::from(scenario.max_connections % 6),
        private_join,
    };
    let mut driver = ServerDriver::new(SystemEnv::new(), config);

    for op in scenario.ops {
        let actions = driver.process_event(event(op)).expect("router inconsistency");

        for action in &actions {
            if let ServerAction::Broadcast { room, recipients, .. } = action {
                assert!(!recipients.is_empty());
                assert!(recipients.windows(2).all(|w| w[0] < w[1]));
                assert!(recipients.iter().all(|&s| driver.is_member(s, room)));
            }
        }

        for identity in driver.identities() {
            let session_id = driver.session_of(&identity).expect("identity without session");
            assert_eq!(driver.identity_of(session_id), Some(identity.as_str()));
        }
    }

    for session_id in 0..SESSIONS {
        driver.process_event(ServerEvent::Disconnect { session_id }).expect("router inconsistency");
    }

    assert_eq!(driver.identity_count(), 0);
    assert_eq!(driver.room_count(), 1);
});
