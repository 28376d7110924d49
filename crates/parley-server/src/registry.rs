//! Connection registry: who is connected, under which name, in which rooms.
//!
//! The registry keeps four maps mutually consistent:
//!
//! - session → identity and identity → session (presence)
//! - room → sessions (for fan-out) and session → rooms (for cleanup)
//!
//! plus a per-room set of identities currently typing. Every mutation goes
//! through a method here, so the maps never drift apart. The shared room
//! exists from construction and is never removed; private rooms are dropped
//! as soon as their last member leaves.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use parley_proto::RoomId;

/// What was torn down when a session left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    /// Session that left
    pub session_id: u64,
    /// Identity it was bound to
    pub identity: String,
    /// Rooms it was a member of
    pub rooms: BTreeSet<RoomId>,
}

/// Registry of identified sessions and their room memberships.
#[derive(Debug)]
pub struct ConnectionRegistry {
    /// Session ID → identity
    identities: HashMap<u64, String>,
    /// Identity → session ID. Enforces one session per identity
    sessions: HashMap<String, u64>,
    /// Room → member sessions, ordered for deterministic fan-out
    rooms: BTreeMap<RoomId, BTreeSet<u64>>,
    /// Session ID → rooms joined
    session_rooms: HashMap<u64, BTreeSet<RoomId>>,
    /// Room → identities currently typing
    typing: HashMap<RoomId, BTreeSet<String>>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    /// Create a registry holding only the (empty) shared room.
    pub fn new() -> Self {
        let mut rooms = BTreeMap::new();
        rooms.insert(RoomId::general(), BTreeSet::new());

        Self {
            identities: HashMap::new(),
            sessions: HashMap::new(),
            rooms,
            session_rooms: HashMap::new(),
            typing: HashMap::new(),
        }
    }

    /// Bind `identity` to `session_id`.
    ///
    /// Returns `false`, changing nothing, if the session is already
    /// registered or the identity is bound to any session.
    pub fn register(&mut self, session_id: u64, identity: &str) -> bool {
        if self.identities.contains_key(&session_id) || self.sessions.contains_key(identity) {
            return false;
        }

        self.identities.insert(session_id, identity.to_owned());
        self.sessions.insert(identity.to_owned(), session_id);
        self.session_rooms.insert(session_id, BTreeSet::new());
        true
    }

    /// Remove a session from presence, every room and every typing set.
    ///
    /// Returns `None` if the session was not registered, so calling this
    /// twice is harmless.
    pub fn unregister(&mut self, session_id: u64) -> Option<Departure> {
        let identity = self.identities.remove(&session_id)?;
        self.sessions.remove(&identity);
        let rooms = self.session_rooms.remove(&session_id).unwrap_or_default();

        for room in &rooms {
            if let Some(members) = self.rooms.get_mut(room) {
                members.remove(&session_id);
                if members.is_empty() && !room.is_general() {
                    self.rooms.remove(room);
                }
            }
        }

        self.typing.retain(|_, typists| {
            typists.remove(&identity);
            !typists.is_empty()
        });

        Some(Departure { session_id, identity, rooms })
    }

    /// Add a session to a room, creating the room if needed.
    ///
    /// Idempotent. Returns `false` if the session is not registered.
    pub fn join(&mut self, session_id: u64, room: &RoomId) -> bool {
        let Some(joined) = self.session_rooms.get_mut(&session_id) else {
            return false;
        };

        joined.insert(room.clone());
        self.rooms.entry(room.clone()).or_default().insert(session_id);
        true
    }

    /// Whether `session_id` is a member of `room`.
    pub fn is_member(&self, session_id: u64, room: &RoomId) -> bool {
        self.rooms.get(room).is_some_and(|members| members.contains(&session_id))
    }

    /// Members of `room` in ascending session order. Empty for unknown rooms.
    pub fn members<'a>(&'a self, room: &RoomId) -> impl Iterator<Item = u64> + use<'a> {
        self.rooms.get(room).into_iter().flat_map(|members| members.iter().copied())
    }

    /// Rooms `session_id` has joined.
    pub fn rooms_for_session(&self, session_id: u64) -> impl Iterator<Item = &RoomId> {
        self.session_rooms.get(&session_id).into_iter().flatten()
    }

    /// Identity bound to a session.
    pub fn identity_of(&self, session_id: u64) -> Option<&str> {
        self.identities.get(&session_id).map(String::as_str)
    }

    /// Session bound to an identity.
    pub fn session_of(&self, identity: &str) -> Option<u64> {
        self.sessions.get(identity).copied()
    }

    /// Whether the session has an identity.
    pub fn has_session(&self, session_id: u64) -> bool {
        self.identities.contains_key(&session_id)
    }

    /// All connected identities, sorted.
    pub fn identities(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sessions.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Number of connected identities.
    pub fn identity_count(&self) -> usize {
        self.identities.len()
    }

    /// Number of rooms, the shared room included.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Whether a room currently exists.
    pub fn has_room(&self, room: &RoomId) -> bool {
        self.rooms.contains_key(room)
    }

    /// Record that `identity` started or stopped typing in `room`.
    pub fn set_typing(&mut self, room: &RoomId, identity: &str, is_typing: bool) {
        if is_typing {
            self.typing.entry(room.clone()).or_default().insert(identity.to_owned());
        } else if let Some(typists) = self.typing.get_mut(room) {
            typists.remove(identity);
            if typists.is_empty() {
                self.typing.remove(room);
            }
        }
    }

    /// Identities currently typing in `room`, sorted.
    pub fn typing_in(&self, room: &RoomId) -> Vec<String> {
        self.typing.get(room).map(|typists| typists.iter().cloned().collect()).unwrap_or_default()
    }
}
