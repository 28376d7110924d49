//! Parley presence and room router.
//!
//! Tracks which connected session owns which username, which rooms exist and
//! who belongs to each, and fans chat traffic out to the members of a room.
//!
//! # Architecture
//!
//! [`ServerDriver`] is a sans-IO state machine: it consumes [`ServerEvent`]s
//! and returns [`ServerAction`]s. [`Server`] is the production runtime around
//! it, executing those actions over Quinn QUIC streams on Tokio.
//!
//! # Components
//!
//! - [`ServerDriver`]: presence, rooms, commands (pure logic, no I/O)
//! - [`ConnectionRegistry`]: session/identity mapping and room membership
//! - [`Server`]: production runtime that executes driver actions
//! - [`QuinnTransport`]: QUIC transport via Quinn
//! - [`RegistrationStore`]: username claims (memory or redb)
//! - [`SystemEnv`]: production environment (real time, OS RNG)

mod command;
mod driver;
mod env;
mod error;
mod registry;
mod room;
mod router_error;
pub mod storage;
mod system_env;
mod transport;

use std::{collections::HashMap, sync::Arc, time::Duration};

use bytes::{Bytes, BytesMut};
pub use command::{Command, CommandContext, HELP_TEXT};
pub use driver::{
    DriverConfig, LogLevel, MAX_CONNECTIONS_LIMIT, MAX_IDENTITY_LEN, MAX_MESSAGE_LEN, PrivateJoin,
    ServerAction, ServerDriver, ServerEvent,
};
pub use env::Environment;
pub use error::ServerError;
use parley_proto::{
    Frame, FrameHeader, Payload,
    payloads::{inbound::Hello, outbound::ErrorMessage},
};
pub use registry::{ConnectionRegistry, Departure};
pub use room::pair_key;
pub use router_error::{DriverError, RouterError};
pub use storage::{MemoryRegistrations, RedbRegistrations, RegistrationStore, StorageError};
pub use system_env::SystemEnv;
use tokio::sync::{Mutex, RwLock, mpsc};
pub use transport::{QuinnConnection, QuinnTransport};

/// Error text sent when a handshake names a username someone else holds.
pub const USERNAME_IN_USE: &str = "username already in use";

/// How long a closing connection gets to flush its last frames.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

type SharedDriver = Arc<Mutex<ServerDriver<SystemEnv>>>;

/// Work queued for a session's writer task.
#[derive(Debug)]
enum Outbound {
    /// Encoded frame to write
    Frame(Bytes),
    /// Flush what is queued, then close the connection
    Close(String),
}

/// Shared state for all connections.
struct SharedState<R> {
    /// Outbound queue of every live session. Each queue is drained by one
    /// writer task, so frames reach a client in the order they were queued.
    sessions: RwLock<HashMap<u64, mpsc::UnboundedSender<Outbound>>>,
    /// Claimed usernames
    registrations: R,
}

impl<R> SharedState<R> {
    fn new(registrations: R) -> Self {
        Self { sessions: RwLock::new(HashMap::new()), registrations }
    }

    /// Queue `item` for `session_id`. Dropped if the session is gone.
    async fn enqueue(&self, session_id: u64, item: Outbound) {
        let sessions = self.sessions.read().await;
        let Some(outbound) = sessions.get(&session_id) else {
            tracing::debug!("Session {} not found, dropping {:?}", session_id, item);
            return;
        };
        if outbound.send(item).is_err() {
            tracing::debug!("Writer for session {} has stopped", session_id);
        }
    }
}

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:4433")
    pub bind_address: String,
    /// Path to TLS certificate (PEM format)
    pub cert_path: Option<String>,
    /// Path to TLS private key (PEM format)
    pub key_path: Option<String>,
    /// Redb file for username claims. In memory when `None`
    pub registrations_path: Option<String>,
    /// Router configuration
    pub driver: DriverConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4433".to_string(),
            cert_path: None,
            key_path: None,
            registrations_path: None,
            driver: DriverConfig::default(),
        }
    }
}

/// Production Parley server.
///
/// Wraps [`ServerDriver`] with Quinn QUIC transport, the system environment
/// and a registration store.
pub struct Server<R>
where
    R: RegistrationStore,
{
    /// The action-based router
    driver: ServerDriver<SystemEnv>,
    /// QUIC endpoint
    transport: QuinnTransport,
    /// Environment
    env: SystemEnv,
    /// Username claims
    registrations: R,
}

impl<R> Server<R>
where
    R: RegistrationStore,
{
    /// Create and bind a new server.
    ///
    /// Claims left in `registrations` by a previous process are dropped.
    pub fn bind(config: ServerRuntimeConfig, registrations: R) -> Result<Self, ServerError> {
        let stale = registrations.clear()?;
        if stale > 0 {
            tracing::info!("Dropped {} stale username claims", stale);
        }

        let env = SystemEnv::new();
        let driver = ServerDriver::new(env.clone(), config.driver);

        let transport = QuinnTransport::bind(
            &config.bind_address,
            config.cert_path.as_deref(),
            config.key_path.as_deref(),
        )?;

        Ok(Self { driver, transport, env, registrations })
    }

    /// Run the server, accepting connections and processing frames.
    ///
    /// Runs until the endpoint is closed.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!(
            "Server starting on {} (private join: {}, max connections: {})",
            self.transport.local_addr()?,
            self.driver.config().private_join,
            self.driver.config().max_connections
        );

        let env = self.env;
        let driver = Arc::new(Mutex::new(self.driver));
        let shared = Arc::new(SharedState::new(self.registrations));

        loop {
            match self.transport.accept().await {
                Ok(Some(conn)) => {
                    let driver = Arc::clone(&driver);
                    let shared = Arc::clone(&shared);
                    let env = env.clone();

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, driver, shared, env).await {
                            tracing::error!("Connection error: {}", e);
                        }
                    });
                },
                Ok(None) => {
                    tracing::info!("Endpoint closed, shutting down");
                    return Ok(());
                },
                Err(e) => {
                    tracing::error!("Accept error: {}", e);
                },
            }
        }
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ServerError> {
        self.transport.local_addr()
    }

    /// The generated certificate when running without PEM files.
    pub fn self_signed_certificate(&self) -> Option<&rustls::pki_types::CertificateDer<'static>> {
        self.transport.self_signed_certificate()
    }
}

/// Handle a single QUIC connection from handshake to disconnect.
async fn handle_connection<R: RegistrationStore>(
    conn: QuinnConnection,
    driver: SharedDriver,
    shared: Arc<SharedState<R>>,
    env: SystemEnv,
) -> Result<(), ServerError> {
    let outbound_stream = conn
        .open_uni()
        .await
        .map_err(|e| ServerError::Internal(format!("Failed to open outbound stream: {e}")))?;

    let (outbound, queue) = mpsc::unbounded_channel();
    let session_id = {
        let mut sessions = shared.sessions.write().await;
        let session_id = fresh_session_id(&sessions, &env);
        sessions.insert(session_id, outbound);
        session_id
    };

    tracing::debug!("New connection {} from {}", session_id, conn.remote_addr());

    tokio::spawn(write_outbound(session_id, outbound_stream, conn.clone(), queue));

    let result = match conn.accept_bi().await {
        Ok((send, recv)) => {
            // Everything the server says goes out on the unidirectional stream.
            drop(send);
            serve_session(session_id, recv, &driver, &shared, &env).await
        },
        Err(e) => {
            tracing::debug!("Connection {} closed before handshake: {}", session_id, e);
            Ok(())
        },
    };

    // Dropping the queue's last sender lets the writer finish the stream.
    shared.sessions.write().await.remove(&session_id);

    dispatch(&driver, &shared, ServerEvent::Disconnect { session_id }).await?;

    result
}

/// Draw a session id not held by any live session.
fn fresh_session_id(
    taken: &HashMap<u64, mpsc::UnboundedSender<Outbound>>,
    env: &impl Environment,
) -> u64 {
    loop {
        let session_id = env.random_u64();
        if !taken.contains_key(&session_id) {
            return session_id;
        }
        tracing::debug!("Session id {} already in use, drawing again", session_id);
    }
}

/// Perform the handshake, then feed frames to the router until the stream
/// ends or carries something malformed.
async fn serve_session<R: RegistrationStore>(
    session_id: u64,
    mut recv: quinn::RecvStream,
    driver: &SharedDriver,
    shared: &SharedState<R>,
    env: &SystemEnv,
) -> Result<(), ServerError> {
    let mut buf = BytesMut::with_capacity(FrameHeader::SIZE + 1024);

    let Some(hello) = read_payload(session_id, &mut recv, &mut buf).await else {
        return Ok(());
    };

    let username = match hello {
        Payload::Hello(Hello { username }) => username,
        other => {
            tracing::warn!("Session {} skipped the handshake ({:?})", session_id, other.opcode());
            return Ok(());
        },
    };

    let identity = if username.trim().is_empty() {
        None
    } else if shared.registrations.claim(&username, env.wall_clock_secs())? {
        Some(username)
    } else {
        tracing::info!("Session {} asked for {}, which is taken", session_id, username);
        refuse_handshake(session_id, shared).await;
        return Ok(());
    };

    dispatch(driver, shared, ServerEvent::Connect { session_id, identity }).await?;

    while let Some(payload) = read_payload(session_id, &mut recv, &mut buf).await {
        let event = match payload {
            Payload::SendMessage(msg) => {
                ServerEvent::Message { session_id, room: msg.room, text: msg.text }
            },
            Payload::Typing(typing) => ServerEvent::Typing {
                session_id,
                room: typing.room,
                is_typing: typing.is_typing,
            },
            Payload::StartPrivateChat(request) => {
                ServerEvent::StartPrivateChat { session_id, target: request.target }
            },
            Payload::Logout(logout) => {
                let own =
                    driver.lock().await.identity_of(session_id) == Some(logout.username.as_str());
                if !own {
                    tracing::warn!(
                        "Session {} tried to log out {}, which it does not own",
                        session_id,
                        logout.username
                    );
                    continue;
                }
                ServerEvent::Logout { identity: logout.username }
            },
            Payload::Hello(_) => {
                tracing::debug!("Session {} repeated its handshake, ignoring", session_id);
                continue;
            },
            other => {
                tracing::warn!("Session {} sent server-only {:?}", session_id, other.opcode());
                break;
            },
        };

        dispatch(driver, shared, event).await?;
    }

    Ok(())
}

/// Tell a client its username is taken and close the connection.
async fn refuse_handshake<R>(session_id: u64, shared: &SharedState<R>) {
    if let Some(bytes) = encode(Payload::Error(ErrorMessage::new(USERNAME_IN_USE))) {
        shared.enqueue(session_id, Outbound::Frame(bytes)).await;
    }
    shared.enqueue(session_id, Outbound::Close(USERNAME_IN_USE.to_string())).await;
    shared.sessions.write().await.remove(&session_id);
}

/// Read one frame and decode its payload.
///
/// Returns `None` when the stream ends or the bytes are malformed; either
/// way the stream is done.
async fn read_payload(
    session_id: u64,
    recv: &mut quinn::RecvStream,
    buf: &mut BytesMut,
) -> Option<Payload> {
    buf.clear();
    buf.resize(FrameHeader::SIZE, 0);

    if let Err(e) = recv.read_exact(&mut buf[..]).await {
        tracing::debug!("Session {} read ended: {}", session_id, e);
        return None;
    }

    let payload_size = match FrameHeader::from_bytes(&buf[..]) {
        Ok(header) => header.payload_size() as usize,
        Err(e) => {
            tracing::warn!("Session {} sent an invalid header: {}", session_id, e);
            return None;
        },
    };

    if payload_size > 0 {
        buf.resize(FrameHeader::SIZE + payload_size, 0);
        if let Err(e) = recv.read_exact(&mut buf[FrameHeader::SIZE..]).await {
            tracing::debug!("Session {} payload read failed: {}", session_id, e);
            return None;
        }
    }

    match Frame::decode(&buf[..]).and_then(|frame| Payload::from_frame(&frame)) {
        Ok(payload) => Some(payload),
        Err(e) => {
            tracing::warn!("Session {} sent a malformed frame: {}", session_id, e);
            None
        },
    }
}

/// Process one event and execute its actions under a single driver lock.
///
/// Actions only queue frames, so a client that stops reading never holds up
/// the lock.
async fn dispatch<R: RegistrationStore>(
    driver: &SharedDriver,
    shared: &SharedState<R>,
    event: ServerEvent,
) -> Result<(), ServerError> {
    let mut driver = driver.lock().await;
    match driver.process_event(event) {
        Ok(actions) => {
            execute_actions(actions, shared).await;
            Ok(())
        },
        Err(e) => {
            tracing::error!("Router inconsistency: {}", e);
            Err(e.into())
        },
    }
}

/// Execute router actions.
///
/// A failing action is logged and skipped; the rest still run.
async fn execute_actions<R: RegistrationStore>(
    actions: Vec<ServerAction>,
    shared: &SharedState<R>,
) {
    for action in actions {
        match action {
            ServerAction::SendToSession { session_id, payload } => {
                let Some(bytes) = encode(payload) else {
                    continue;
                };
                shared.enqueue(session_id, Outbound::Frame(bytes)).await;
            },

            ServerAction::Broadcast { room, recipients, payload } => {
                let Some(bytes) = encode(payload) else {
                    continue;
                };
                let sessions = shared.sessions.read().await;
                for session_id in recipients {
                    let Some(outbound) = sessions.get(&session_id) else {
                        continue;
                    };
                    if outbound.send(Outbound::Frame(bytes.clone())).is_err() {
                        tracing::debug!(%room, "Writer for session {} has stopped", session_id);
                    }
                }
            },

            ServerAction::ReleaseIdentity { identity } => {
                if let Err(e) = shared.registrations.release(&identity) {
                    tracing::error!("Failed to release {}: {}", identity, e);
                }
            },

            ServerAction::CloseConnection { session_id, reason } => {
                tracing::info!("Closing connection {}: {}", session_id, reason);
                shared.enqueue(session_id, Outbound::Close(reason)).await;
                shared.sessions.write().await.remove(&session_id);
            },

            ServerAction::Log { level, message, .. } => match level {
                LogLevel::Debug => tracing::debug!("{}", message),
                LogLevel::Info => tracing::info!("{}", message),
                LogLevel::Warn => tracing::warn!("{}", message),
                LogLevel::Error => tracing::error!("{}", message),
            },
        }
    }
}

/// Frame a payload. `None`, with an error logged, if it does not fit.
fn encode(payload: Payload) -> Option<Bytes> {
    let opcode = payload.opcode();
    match payload.to_wire() {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            tracing::error!("Dropping {:?} payload: {}", opcode, e);
            None
        },
    }
}

/// Drain a session's queue onto its outbound stream.
///
/// The queue is unbounded: QUIC flow control is the only backpressure, and
/// a client that never reads grows its queue without limit.
async fn write_outbound(
    session_id: u64,
    mut stream: quinn::SendStream,
    conn: QuinnConnection,
    mut queue: mpsc::UnboundedReceiver<Outbound>,
) {
    while let Some(item) = queue.recv().await {
        match item {
            Outbound::Frame(bytes) => {
                if let Err(e) = stream.write_all(&bytes).await {
                    tracing::debug!("Write to session {} failed: {}", session_id, e);
                    return;
                }
            },
            Outbound::Close(reason) => {
                flush_and_close(&mut stream, &conn, &reason).await;
                return;
            },
        }
    }

    let _ = stream.finish();
}

/// Finish the outbound stream, give the peer a moment to read it, then close.
async fn flush_and_close(stream: &mut quinn::SendStream, conn: &QuinnConnection, reason: &str) {
    if stream.finish().is_ok() {
        let _ = tokio::time::timeout(CLOSE_GRACE, stream.stopped()).await;
    }
    conn.close(0u32.into(), reason.as_bytes());
}
