//! Presence and room router.
//!
//! The driver is a sans-IO state machine: the runtime feeds it
//! [`ServerEvent`]s and executes the [`ServerAction`]s it returns. It owns
//! the [`ConnectionRegistry`] and decides who hears what; it never touches a
//! socket, a clock or a file directly.
//!
//! # Fan-out
//!
//! Broadcast recipients are resolved against room membership at the moment
//! the action is produced and listed in ascending session order. A broadcast
//! with no recipients is not emitted at all.
//!
//! # Frame size
//!
//! Every outbound payload must fit in one frame. Identities are capped at
//! [`MAX_IDENTITY_LEN`] bytes and chat text at [`MAX_MESSAGE_LEN`], and the
//! number of identities at [`MAX_CONNECTIONS_LIMIT`], which is the largest
//! user list that still fits.

use std::{fmt, str::FromStr, time::Instant};

use parley_proto::{
    FrameHeader, Payload, RoomId,
    payloads::outbound::{
        ChatMessage, ErrorMessage, PrivateRoomCreated, ServerMessage, UserList, UserTyping,
    },
};

use crate::{
    command::{Command, CommandContext},
    env::Environment,
    registry::{ConnectionRegistry, Departure},
    room::pair_key,
    router_error::{DriverError, RouterError},
};

/// How the target of a private chat request joins the private room.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PrivateJoin {
    /// Only the requester joins. The target joins when it makes the same
    /// request itself.
    #[default]
    OnRequest,
    /// Both sides join at once. The target receives room traffic but no
    /// notice.
    Immediate,
}

impl FromStr for PrivateJoin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on-request" => Ok(Self::OnRequest),
            "immediate" => Ok(Self::Immediate),
            other => Err(format!("unknown private join policy '{other}' (on-request|immediate)")),
        }
    }
}

impl fmt::Display for PrivateJoin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnRequest => f.write_str("on-request"),
            Self::Immediate => f.write_str("immediate"),
        }
    }
}

/// Longest identity accepted, in bytes.
pub const MAX_IDENTITY_LEN: usize = 32;

/// Longest chat text accepted, in bytes.
pub const MAX_MESSAGE_LEN: usize = 16 * 1024;

/// Most identities the router will hold.
///
/// A CBOR `UserList` costs at most 15 bytes of framing (map, key, array
/// header) plus 2 + [`MAX_IDENTITY_LEN`] bytes per name.
pub const MAX_CONNECTIONS_LIMIT: usize =
    (FrameHeader::MAX_PAYLOAD_SIZE as usize - 16) / (MAX_IDENTITY_LEN + 2);

/// Router configuration.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Maximum number of identified sessions. Clamped to
    /// [`MAX_CONNECTIONS_LIMIT`].
    pub max_connections: usize,
    /// Private room join policy
    pub private_join: PrivateJoin,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self { max_connections: MAX_CONNECTIONS_LIMIT, private_join: PrivateJoin::default() }
    }
}

/// Events the router processes.
///
/// Produced by the runtime from handshakes, decoded frames and closed
/// streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// A session completed its handshake
    Connect {
        /// Session assigned by the runtime
        session_id: u64,
        /// Proposed identity. `None` or blank leaves the session anonymous
        identity: Option<String>,
    },

    /// The transport of a session went away
    Disconnect {
        /// Session that closed
        session_id: u64,
    },

    /// A session asked for a private room with another identity
    StartPrivateChat {
        /// Requester
        session_id: u64,
        /// Identity to pair with
        target: String,
    },

    /// A session's typing indicator changed
    Typing {
        /// Typist
        session_id: u64,
        /// Room the indicator applies to
        room: RoomId,
        /// New state
        is_typing: bool,
    },

    /// A session sent chat text or a command
    Message {
        /// Sender
        session_id: u64,
        /// Addressed room
        room: RoomId,
        /// Verbatim text
        text: String,
    },

    /// An identity was given up without closing the transport
    Logout {
        /// Identity to release
        identity: String,
    },
}

/// Actions the runtime executes on behalf of the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerAction {
    /// Send a payload to one session
    SendToSession {
        /// Target session
        session_id: u64,
        /// Payload to send
        payload: Payload,
    },

    /// Send the same payload to several members of a room
    Broadcast {
        /// Room the payload belongs to
        room: RoomId,
        /// Recipients, ascending, never empty
        recipients: Vec<u64>,
        /// Payload to send
        payload: Payload,
    },

    /// Free the identity in the registration store
    ReleaseIdentity {
        /// Identity to free
        identity: String,
    },

    /// Close a session's transport
    CloseConnection {
        /// Session to close
        session_id: u64,
        /// Reason for closure
        reason: String,
    },

    /// Diagnostic line
    Log {
        /// Log level
        level: LogLevel,
        /// Message to log
        message: String,
        /// When the event occurred
        timestamp: Instant,
    },
}

/// Log levels for router diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug information
    Debug,
    /// Informational message
    Info,
    /// Warning
    Warn,
    /// Error
    Error,
}

/// The presence and room router.
pub struct ServerDriver<E>
where
    E: Environment,
{
    /// Presence and room state
    registry: ConnectionRegistry,
    /// Environment (time)
    env: E,
    /// Router configuration
    config: DriverConfig,
}

impl<E> ServerDriver<E>
where
    E: Environment,
{
    /// Create a router with an empty shared room.
    pub fn new(env: E, mut config: DriverConfig) -> Self {
        config.max_connections = config.max_connections.min(MAX_CONNECTIONS_LIMIT);
        Self { registry: ConnectionRegistry::new(), env, config }
    }

    /// Process one event and return the actions to execute, in order.
    ///
    /// Refused requests come back as log and notification actions, not as
    /// errors. An `Err` means the registry contradicted itself.
    pub fn process_event(&mut self, event: ServerEvent) -> Result<Vec<ServerAction>, DriverError> {
        let origin = match &event {
            ServerEvent::Connect { session_id, .. }
            | ServerEvent::Disconnect { session_id }
            | ServerEvent::StartPrivateChat { session_id, .. }
            | ServerEvent::Typing { session_id, .. }
            | ServerEvent::Message { session_id, .. } => Some(*session_id),
            ServerEvent::Logout { .. } => None,
        };

        let result = match event {
            ServerEvent::Connect { session_id, identity } => {
                self.handle_connect(session_id, identity)
            },
            ServerEvent::Disconnect { session_id } => self.handle_disconnect(session_id),
            ServerEvent::StartPrivateChat { session_id, target } => {
                self.handle_start_private_chat(session_id, &target)
            },
            ServerEvent::Typing { session_id, room, is_typing } => {
                self.handle_typing(session_id, &room, is_typing)
            },
            ServerEvent::Message { session_id, room, text } => {
                self.handle_message(session_id, &room, &text)
            },
            ServerEvent::Logout { identity } => self.handle_logout(&identity),
        };

        match result {
            Ok(actions) => Ok(actions),
            Err(DriverError::Router(refusal)) => Ok(self.refuse(origin, refusal)),
            Err(err) => Err(err),
        }
    }

    fn handle_connect(
        &mut self,
        session_id: u64,
        identity: Option<String>,
    ) -> Result<Vec<ServerAction>, DriverError> {
        let Some(identity) = identity.filter(|name| !name.trim().is_empty()) else {
            return Ok(vec![self.log(
                LogLevel::Warn,
                format!("session {session_id} connected without a username"),
            )]);
        };

        if identity.len() > MAX_IDENTITY_LEN {
            return Err(RouterError::IdentityTooLong { identity }.into());
        }
        if self.registry.has_session(session_id) {
            return Err(RouterError::AlreadyRegistered(session_id).into());
        }
        if self.registry.session_of(&identity).is_some() {
            return Err(RouterError::IdentityTaken(identity).into());
        }
        if self.registry.identity_count() >= self.config.max_connections {
            return Err(RouterError::ServerFull { identity }.into());
        }

        let general = RoomId::general();
        if !self.registry.register(session_id, &identity) || !self.registry.join(session_id, &general)
        {
            return Err(DriverError::Inconsistent(format!(
                "session {session_id} passed connect checks but could not be registered"
            )));
        }

        let mut actions = vec![ServerAction::SendToSession {
            session_id,
            payload: notice(
                format!(
                    "{identity}, welcome to the general chat! Use /help to see the available \
                     commands."
                ),
                &general,
            ),
        }];

        actions.extend(self.broadcast(
            &general,
            Some(session_id),
            notice(format!("{identity} has joined the chat."), &general),
        ));
        actions.extend(self.broadcast(&general, None, self.user_list()));
        actions.push(
            self.log(LogLevel::Info, format!("{identity} connected (session {session_id})")),
        );

        Ok(actions)
    }

    fn handle_disconnect(&mut self, session_id: u64) -> Result<Vec<ServerAction>, DriverError> {
        match self.registry.unregister(session_id) {
            Some(departure) => Ok(self.announce_departure(departure, "disconnected")),
            None => Ok(vec![self.log(
                LogLevel::Debug,
                format!("unidentified session {session_id} disconnected"),
            )]),
        }
    }

    fn handle_logout(&mut self, identity: &str) -> Result<Vec<ServerAction>, DriverError> {
        let Some(session_id) = self.registry.session_of(identity) else {
            return Ok(vec![
                self.log(LogLevel::Debug, format!("logout for unknown identity {identity}")),
            ]);
        };

        let departure = self.registry.unregister(session_id).ok_or_else(|| {
            DriverError::Inconsistent(format!("{identity} mapped to unknown session {session_id}"))
        })?;

        Ok(self.announce_departure(departure, "logged out"))
    }

    fn announce_departure(&self, departure: Departure, how: &str) -> Vec<ServerAction> {
        let Departure { session_id, identity, rooms } = departure;
        let general = RoomId::general();

        let mut actions = Vec::new();
        actions.extend(self.broadcast(
            &general,
            None,
            notice(format!("{identity} has left the chat."), &general),
        ));
        actions.extend(self.broadcast(&general, None, self.user_list()));
        actions.push(ServerAction::ReleaseIdentity { identity: identity.clone() });
        actions.push(self.log(
            LogLevel::Info,
            format!("{identity} {how} (session {session_id}, left {} rooms)", rooms.len()),
        ));
        actions
    }

    fn handle_start_private_chat(
        &mut self,
        session_id: u64,
        target: &str,
    ) -> Result<Vec<ServerAction>, DriverError> {
        if !self.registry.has_session(session_id) {
            return Err(RouterError::UnregisteredConnection(session_id).into());
        }
        if target.len() > MAX_IDENTITY_LEN {
            return Err(RouterError::TargetTooLong { len: target.len() }.into());
        }
        let target_session = self
            .registry
            .session_of(target)
            .ok_or_else(|| RouterError::UnknownTarget(target.to_owned()))?;

        let room = pair_key(session_id, target_session);
        let mut joined = self.registry.join(session_id, &room);
        if self.config.private_join == PrivateJoin::Immediate {
            joined &= self.registry.join(target_session, &room);
        }
        if !joined {
            return Err(DriverError::Inconsistent(format!(
                "registered sessions {session_id}/{target_session} could not join {room}"
            )));
        }

        Ok(vec![
            ServerAction::SendToSession {
                session_id,
                payload: notice(format!("You are now in a private chat with {target}."), &room),
            },
            ServerAction::SendToSession {
                session_id,
                payload: Payload::PrivateRoomCreated(PrivateRoomCreated { room: room.clone() }),
            },
            self.log(LogLevel::Info, format!("session {session_id} opened private room {room}")),
        ])
    }

    fn handle_typing(
        &mut self,
        session_id: u64,
        room: &RoomId,
        is_typing: bool,
    ) -> Result<Vec<ServerAction>, DriverError> {
        if !self.registry.is_member(session_id, room) {
            return Err(RouterError::NotInRoom { session_id, room: room.clone() }.into());
        }
        let identity = self.identity(session_id)?;

        self.registry.set_typing(room, &identity, is_typing);

        let payload = Payload::UserTyping(UserTyping { identity, is_typing, room: room.clone() });
        Ok(self.broadcast(room, Some(session_id), payload).into_iter().collect())
    }

    fn handle_message(
        &mut self,
        session_id: u64,
        room: &RoomId,
        text: &str,
    ) -> Result<Vec<ServerAction>, DriverError> {
        if !self.registry.has_session(session_id) {
            return Err(RouterError::UnregisteredConnection(session_id).into());
        }
        if !self.registry.is_member(session_id, room) {
            return Err(RouterError::NotInRoom { session_id, room: room.clone() }.into());
        }
        if text.len() > MAX_MESSAGE_LEN {
            return Err(RouterError::MessageTooLong { len: text.len() }.into());
        }
        let identity = self.identity(session_id)?;

        if let Some(command) = Command::parse(text) {
            let reply = command.reply(&CommandContext {
                identity: &identity,
                connected: self.registry.identity_count(),
                wall_clock_secs: self.env.wall_clock_secs(),
            });
            return Ok(vec![
                ServerAction::SendToSession { session_id, payload: notice(reply, room) },
                self.log(LogLevel::Debug, format!("{identity} ran {command:?} in {room}")),
            ]);
        }

        self.registry.set_typing(room, &identity, false);

        let payload =
            Payload::ChatMessage(ChatMessage { identity, text: text.to_owned(), room: room.clone() });
        Ok(self.broadcast(room, None, payload).into_iter().collect())
    }

    /// Turn a refused request into diagnostics and client feedback.
    fn refuse(&self, origin: Option<u64>, refusal: RouterError) -> Vec<ServerAction> {
        let reason = refusal.to_string();

        match (refusal, origin) {
            (RouterError::NotInRoom { .. }, _) => vec![self.log(LogLevel::Debug, reason)],
            (RouterError::UnknownTarget(_), Some(session_id)) => vec![
                ServerAction::SendToSession {
                    session_id,
                    payload: notice(reason.clone(), &RoomId::general()),
                },
                self.log(LogLevel::Debug, format!("session {session_id}: {reason}")),
            ],
            (RouterError::IdentityTaken(_) | RouterError::AlreadyRegistered(_), Some(session_id)) => {
                vec![
                    ServerAction::SendToSession {
                        session_id,
                        payload: Payload::Error(ErrorMessage::new(reason.clone())),
                    },
                    self.log(LogLevel::Warn, format!("rejected session {session_id}: {reason}")),
                ]
            },
            (
                RouterError::ServerFull { identity } | RouterError::IdentityTooLong { identity },
                Some(session_id),
            ) => vec![
                ServerAction::SendToSession {
                    session_id,
                    payload: Payload::Error(ErrorMessage::new(reason.clone())),
                },
                ServerAction::ReleaseIdentity { identity },
                ServerAction::CloseConnection { session_id, reason: reason.clone() },
                self.log(LogLevel::Warn, format!("turned away session {session_id}: {reason}")),
            ],
            (
                RouterError::TargetTooLong { .. } | RouterError::MessageTooLong { .. },
                Some(session_id),
            ) => vec![
                ServerAction::SendToSession {
                    session_id,
                    payload: Payload::Error(ErrorMessage::new(reason.clone())),
                },
                self.log(LogLevel::Debug, format!("session {session_id}: {reason}")),
            ],
            (_, _) => vec![self.log(LogLevel::Warn, reason)],
        }
    }

    /// Broadcast to the members of `room`, optionally skipping one session.
    /// `None` when nobody would receive it.
    fn broadcast(
        &self,
        room: &RoomId,
        except: Option<u64>,
        payload: Payload,
    ) -> Option<ServerAction> {
        let recipients: Vec<u64> =
            self.registry.members(room).filter(|&member| Some(member) != except).collect();

        if recipients.is_empty() {
            return None;
        }

        Some(ServerAction::Broadcast { room: room.clone(), recipients, payload })
    }

    fn user_list(&self) -> Payload {
        Payload::UserList(UserList { identities: self.registry.identities() })
    }

    fn identity(&self, session_id: u64) -> Result<String, DriverError> {
        self.registry.identity_of(session_id).map(str::to_owned).ok_or_else(|| {
            DriverError::Inconsistent(format!("member session {session_id} has no identity"))
        })
    }

    fn log(&self, level: LogLevel, message: String) -> ServerAction {
        ServerAction::Log { level, message, timestamp: self.env.now() }
    }

    /// Identity bound to a session.
    pub fn identity_of(&self, session_id: u64) -> Option<&str> {
        self.registry.identity_of(session_id)
    }

    /// Session bound to an identity.
    pub fn session_of(&self, identity: &str) -> Option<u64> {
        self.registry.session_of(identity)
    }

    /// Connected identities, sorted.
    pub fn identities(&self) -> Vec<String> {
        self.registry.identities()
    }

    /// Number of connected identities.
    pub fn identity_count(&self) -> usize {
        self.registry.identity_count()
    }

    /// Members of a room, ascending.
    pub fn sessions_in_room(&self, room: &RoomId) -> Vec<u64> {
        self.registry.members(room).collect()
    }

    /// Whether a session is in a room.
    pub fn is_member(&self, session_id: u64, room: &RoomId) -> bool {
        self.registry.is_member(session_id, room)
    }

    /// Number of rooms, the shared room included.
    pub fn room_count(&self) -> usize {
        self.registry.room_count()
    }

    /// Identities currently typing in a room.
    pub fn typing_in(&self, room: &RoomId) -> Vec<String> {
        self.registry.typing_in(room)
    }

    /// Active configuration.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }
}

impl<E> fmt::Debug for ServerDriver<E>
where
    E: Environment,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerDriver")
            .field("identity_count", &self.registry.identity_count())
            .field("room_count", &self.registry.room_count())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn notice(text: String, room: &RoomId) -> Payload {
    Payload::ServerMessage(ServerMessage { text, room: room.clone() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct TestEnv;

    impl Environment for TestEnv {
        fn now(&self) -> Instant {
            Instant::now()
        }

        fn wall_clock_secs(&self) -> u64 {
            1_700_000_000
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            use rand::RngCore;
            rand::thread_rng().fill_bytes(buffer);
        }
    }

    fn driver() -> ServerDriver<TestEnv> {
        ServerDriver::new(TestEnv, DriverConfig::default())
    }

    fn connect(driver: &mut ServerDriver<TestEnv>, session_id: u64, name: &str) -> Vec<ServerAction> {
        driver
            .process_event(ServerEvent::Connect { session_id, identity: Some(name.to_owned()) })
            .unwrap()
    }

    fn without_logs(actions: Vec<ServerAction>) -> Vec<ServerAction> {
        actions.into_iter().filter(|a| !matches!(a, ServerAction::Log { .. })).collect()
    }

    fn general_notice(text: &str) -> Payload {
        notice(text.to_owned(), &RoomId::general())
    }

    #[test]
    fn connect_registers_and_greets() {
        let mut driver = driver();

        let actions = without_logs(connect(&mut driver, 1, "alice"));

        assert_eq!(driver.identity_of(1), Some("alice"));
        assert!(driver.is_member(1, &RoomId::general()));
        assert_eq!(actions, vec![
            ServerAction::SendToSession {
                session_id: 1,
                payload: general_notice(
                    "alice, welcome to the general chat! Use /help to see the available commands."
                ),
            },
            ServerAction::Broadcast {
                room: RoomId::general(),
                recipients: vec![1],
                payload: Payload::UserList(UserList { identities: vec!["alice".into()] }),
            },
        ]);
    }

    #[test]
    fn second_connect_announces_to_others() {
        let mut driver = driver();
        connect(&mut driver, 1, "alice");

        let actions = without_logs(connect(&mut driver, 2, "bob"));

        assert_eq!(actions[1], ServerAction::Broadcast {
            room: RoomId::general(),
            recipients: vec![1],
            payload: general_notice("bob has joined the chat."),
        });
        assert_eq!(actions[2], ServerAction::Broadcast {
            room: RoomId::general(),
            recipients: vec![1, 2],
            payload: Payload::UserList(UserList { identities: vec!["alice".into(), "bob".into()] }),
        });
    }

    #[test]
    fn blank_username_only_logs() {
        let mut driver = driver();

        for identity in [None, Some(String::new()), Some("   ".to_owned())] {
            let actions = driver.process_event(ServerEvent::Connect { session_id: 1, identity }).unwrap();
            assert!(matches!(actions.as_slice(), [ServerAction::Log { level: LogLevel::Warn, .. }]));
        }

        assert_eq!(driver.identity_count(), 0);
        assert!(driver.sessions_in_room(&RoomId::general()).is_empty());
    }

    #[test]
    fn duplicate_identity_rejected_without_release() {
        let mut driver = driver();
        connect(&mut driver, 1, "alice");

        let actions = without_logs(connect(&mut driver, 2, "alice"));

        assert_eq!(actions, vec![ServerAction::SendToSession {
            session_id: 2,
            payload: Payload::Error(ErrorMessage::new("identity already in use: alice")),
        }]);
        assert_eq!(driver.session_of("alice"), Some(1));
    }

    #[test]
    fn duplicate_session_rejected() {
        let mut driver = driver();
        connect(&mut driver, 1, "alice");

        let actions = without_logs(connect(&mut driver, 1, "alicia"));

        assert!(matches!(actions.as_slice(), [ServerAction::SendToSession {
            session_id: 1,
            payload: Payload::Error(_)
        }]));
        assert_eq!(driver.session_of("alicia"), None);
        assert_eq!(driver.identity_of(1), Some("alice"));
    }

    #[test]
    fn full_server_turns_away_and_closes() {
        let config = DriverConfig { max_connections: 1, ..Default::default() };
        let mut driver = ServerDriver::new(TestEnv, config);
        connect(&mut driver, 1, "alice");

        let actions = without_logs(connect(&mut driver, 2, "bob"));

        assert_eq!(actions, vec![
            ServerAction::SendToSession {
                session_id: 2,
                payload: Payload::Error(ErrorMessage::new("server is full")),
            },
            ServerAction::ReleaseIdentity { identity: "bob".into() },
            ServerAction::CloseConnection { session_id: 2, reason: "server is full".into() },
        ]);
        assert_eq!(driver.identity_count(), 1);
    }

    #[test]
    fn disconnect_announces_and_releases() {
        let mut driver = driver();
        connect(&mut driver, 1, "alice");
        connect(&mut driver, 2, "bob");

        let actions =
            without_logs(driver.process_event(ServerEvent::Disconnect { session_id: 2 }).unwrap());

        assert_eq!(actions, vec![
            ServerAction::Broadcast {
                room: RoomId::general(),
                recipients: vec![1],
                payload: general_notice("bob has left the chat."),
            },
            ServerAction::Broadcast {
                room: RoomId::general(),
                recipients: vec![1],
                payload: Payload::UserList(UserList { identities: vec!["alice".into()] }),
            },
            ServerAction::ReleaseIdentity { identity: "bob".into() },
        ]);
        assert_eq!(driver.session_of("bob"), None);
    }

    #[test]
    fn disconnect_of_last_user_still_releases() {
        let mut driver = driver();
        connect(&mut driver, 1, "alice");

        let actions =
            without_logs(driver.process_event(ServerEvent::Disconnect { session_id: 1 }).unwrap());

        assert_eq!(actions, vec![ServerAction::ReleaseIdentity { identity: "alice".into() }]);
    }

    #[test]
    fn disconnect_unknown_is_debug_only() {
        let mut driver = driver();

        let actions = driver.process_event(ServerEvent::Disconnect { session_id: 9 }).unwrap();

        assert!(matches!(actions.as_slice(), [ServerAction::Log { level: LogLevel::Debug, .. }]));
    }

    #[test]
    fn private_chat_default_joins_requester_only() {
        let mut driver = driver();
        connect(&mut driver, 5, "alice");
        connect(&mut driver, 3, "bob");

        let actions = without_logs(
            driver
                .process_event(ServerEvent::StartPrivateChat { session_id: 5, target: "bob".into() })
                .unwrap(),
        );

        let room = RoomId::from("3-5");
        assert_eq!(actions, vec![
            ServerAction::SendToSession {
                session_id: 5,
                payload: notice("You are now in a private chat with bob.".into(), &room),
            },
            ServerAction::SendToSession {
                session_id: 5,
                payload: Payload::PrivateRoomCreated(PrivateRoomCreated { room: room.clone() }),
            },
        ]);
        assert!(driver.is_member(5, &room));
        assert!(!driver.is_member(3, &room));
    }

    #[test]
    fn private_chat_immediate_joins_both() {
        let config = DriverConfig { private_join: PrivateJoin::Immediate, ..Default::default() };
        let mut driver = ServerDriver::new(TestEnv, config);
        connect(&mut driver, 1, "alice");
        connect(&mut driver, 2, "bob");

        driver
            .process_event(ServerEvent::StartPrivateChat { session_id: 1, target: "bob".into() })
            .unwrap();

        assert_eq!(driver.sessions_in_room(&RoomId::from("1-2")), vec![1, 2]);
    }

    #[test]
    fn private_chat_unknown_target() {
        let mut driver = driver();
        connect(&mut driver, 1, "alice");

        let actions = without_logs(
            driver
                .process_event(ServerEvent::StartPrivateChat { session_id: 1, target: "zed".into() })
                .unwrap(),
        );

        assert_eq!(actions, vec![ServerAction::SendToSession {
            session_id: 1,
            payload: general_notice("User zed is not available."),
        }]);
        assert_eq!(driver.room_count(), 1);
    }

    #[test]
    fn private_chat_from_unregistered_is_dropped() {
        let mut driver = driver();
        connect(&mut driver, 1, "alice");

        let actions = driver
            .process_event(ServerEvent::StartPrivateChat { session_id: 2, target: "alice".into() })
            .unwrap();

        assert!(matches!(actions.as_slice(), [ServerAction::Log { level: LogLevel::Warn, .. }]));
    }

    #[test]
    fn typing_excludes_sender_and_tracks_flag() {
        let mut driver = driver();
        connect(&mut driver, 1, "alice");
        connect(&mut driver, 2, "bob");

        let actions = driver
            .process_event(ServerEvent::Typing {
                session_id: 1,
                room: RoomId::general(),
                is_typing: true,
            })
            .unwrap();

        assert_eq!(actions, vec![ServerAction::Broadcast {
            room: RoomId::general(),
            recipients: vec![2],
            payload: Payload::UserTyping(UserTyping {
                identity: "alice".into(),
                is_typing: true,
                room: RoomId::general(),
            }),
        }]);
        assert_eq!(driver.typing_in(&RoomId::general()), vec!["alice"]);
    }

    #[test]
    fn typing_outside_room_is_ignored() {
        let mut driver = driver();
        connect(&mut driver, 1, "alice");

        let actions = driver
            .process_event(ServerEvent::Typing {
                session_id: 1,
                room: RoomId::from("1-2"),
                is_typing: true,
            })
            .unwrap();

        assert!(matches!(actions.as_slice(), [ServerAction::Log { level: LogLevel::Debug, .. }]));
        assert!(driver.typing_in(&RoomId::from("1-2")).is_empty());
    }

    #[test]
    fn message_reaches_everyone_including_sender() {
        let mut driver = driver();
        connect(&mut driver, 1, "alice");
        connect(&mut driver, 2, "bob");
        driver
            .process_event(ServerEvent::Typing {
                session_id: 1,
                room: RoomId::general(),
                is_typing: true,
            })
            .unwrap();

        let actions = driver
            .process_event(ServerEvent::Message {
                session_id: 1,
                room: RoomId::general(),
                text: "hi".into(),
            })
            .unwrap();

        assert_eq!(actions, vec![ServerAction::Broadcast {
            room: RoomId::general(),
            recipients: vec![1, 2],
            payload: Payload::ChatMessage(ChatMessage {
                identity: "alice".into(),
                text: "hi".into(),
                room: RoomId::general(),
            }),
        }]);
        assert!(driver.typing_in(&RoomId::general()).is_empty());
    }

    #[test]
    fn command_answers_only_sender() {
        let mut driver = driver();
        connect(&mut driver, 1, "alice");
        connect(&mut driver, 2, "bob");

        let actions = without_logs(
            driver
                .process_event(ServerEvent::Message {
                    session_id: 2,
                    room: RoomId::general(),
                    text: "/date".into(),
                })
                .unwrap(),
        );

        assert_eq!(actions, vec![ServerAction::SendToSession {
            session_id: 2,
            payload: general_notice("Current date: 2023-11-14 22:13:20 UTC"),
        }]);
    }

    #[test]
    fn message_from_unregistered_is_dropped() {
        let mut driver = driver();

        let actions = driver
            .process_event(ServerEvent::Message {
                session_id: 1,
                room: RoomId::general(),
                text: "hi".into(),
            })
            .unwrap();

        assert!(matches!(actions.as_slice(), [ServerAction::Log { level: LogLevel::Warn, .. }]));
    }

    #[test]
    fn logout_behaves_like_disconnect() {
        let mut driver = driver();
        connect(&mut driver, 1, "alice");
        connect(&mut driver, 2, "bob");
        driver
            .process_event(ServerEvent::StartPrivateChat { session_id: 1, target: "bob".into() })
            .unwrap();

        let actions = without_logs(
            driver.process_event(ServerEvent::Logout { identity: "alice".into() }).unwrap(),
        );

        assert_eq!(actions.last(), Some(&ServerAction::ReleaseIdentity {
            identity: "alice".into()
        }));
        assert_eq!(driver.identity_of(1), None);
        assert_eq!(driver.room_count(), 1);

        // Session 1 is anonymous now; its messages go nowhere.
        let actions = driver
            .process_event(ServerEvent::Message {
                session_id: 1,
                room: RoomId::general(),
                text: "still here".into(),
            })
            .unwrap();
        assert!(matches!(actions.as_slice(), [ServerAction::Log { .. }]));
    }

    #[test]
    fn logout_unknown_identity_is_noop() {
        let mut driver = driver();

        let actions = driver.process_event(ServerEvent::Logout { identity: "ghost".into() }).unwrap();

        assert!(matches!(actions.as_slice(), [ServerAction::Log { level: LogLevel::Debug, .. }]));
    }

    #[test]
    fn overlong_identity_is_turned_away() {
        let mut driver = driver();
        let name = "x".repeat(MAX_IDENTITY_LEN + 1);

        let actions = without_logs(connect(&mut driver, 1, &name));

        assert_eq!(actions, vec![
            ServerAction::SendToSession {
                session_id: 1,
                payload: Payload::Error(ErrorMessage::new("username must be at most 32 bytes")),
            },
            ServerAction::ReleaseIdentity { identity: name },
            ServerAction::CloseConnection {
                session_id: 1,
                reason: "username must be at most 32 bytes".into(),
            },
        ]);
        assert_eq!(driver.identity_count(), 0);
    }

    #[test]
    fn identity_at_limit_is_accepted() {
        let mut driver = driver();

        connect(&mut driver, 1, &"x".repeat(MAX_IDENTITY_LEN));

        assert_eq!(driver.identity_count(), 1);
    }

    #[test]
    fn overlong_message_is_refused_to_sender_only() {
        let mut driver = driver();
        connect(&mut driver, 1, "alice");
        connect(&mut driver, 2, "bob");

        let actions = without_logs(
            driver
                .process_event(ServerEvent::Message {
                    session_id: 1,
                    room: RoomId::general(),
                    text: "y".repeat(MAX_MESSAGE_LEN + 1),
                })
                .unwrap(),
        );

        assert_eq!(actions, vec![ServerAction::SendToSession {
            session_id: 1,
            payload: Payload::Error(ErrorMessage::new("message too long: 16385 bytes (max 16384)")),
        }]);
    }

    #[test]
    fn overlong_target_is_not_echoed() {
        let mut driver = driver();
        connect(&mut driver, 1, "alice");

        let actions = without_logs(
            driver
                .process_event(ServerEvent::StartPrivateChat {
                    session_id: 1,
                    target: "z".repeat(60_000),
                })
                .unwrap(),
        );

        assert_eq!(actions, vec![ServerAction::SendToSession {
            session_id: 1,
            payload: Payload::Error(ErrorMessage::new("username must be at most 32 bytes")),
        }]);
    }

    #[test]
    fn connection_limit_is_clamped() {
        let config = DriverConfig { max_connections: 10_000, ..Default::default() };
        let driver = ServerDriver::new(TestEnv, config);

        assert_eq!(driver.config().max_connections, MAX_CONNECTIONS_LIMIT);
        assert_eq!(DriverConfig::default().max_connections, MAX_CONNECTIONS_LIMIT);
    }

    #[test]
    fn private_join_parses() {
        assert_eq!("on-request".parse::<PrivateJoin>(), Ok(PrivateJoin::OnRequest));
        assert_eq!("immediate".parse::<PrivateJoin>(), Ok(PrivateJoin::Immediate));
        assert!("both".parse::<PrivateJoin>().is_err());
        assert_eq!(PrivateJoin::Immediate.to_string(), "immediate");
    }
}
