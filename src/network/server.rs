//! WebSocket Duel Server
//!
//! Transport layer in front of the duel engine. Each connection gets a
//! session id, client messages become duel events, and the engine's
//! notifications come back through [`ConnectionRegistry`].

use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};

use crate::core::ids::{DuelCode, SessionId};
use crate::duel::events::{DuelEvent, EventSender};
use crate::duel::notify::{Notification, Notifier, NotifyError};
use crate::network::protocol::{ClientMessage, ErrorCode, ServerError, ServerMessage};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Per-connection outbound message buffer.
    pub outbound_buffer: usize,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
            outbound_buffer: 64,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: env_parse("DUEL_BIND_ADDR").unwrap_or(defaults.bind_addr),
            max_connections: env_parse("DUEL_MAX_CONNECTIONS").unwrap_or(defaults.max_connections),
            outbound_buffer: env_parse::<usize>("DUEL_OUTBOUND_BUFFER")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.outbound_buffer),
            version: defaults.version,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring invalid {}={:?}", key, raw);
            None
        }
    }
}

/// Duel server errors.
#[derive(Debug, thiserror::Error)]
pub enum DuelServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

// =============================================================================
// CONNECTION REGISTRY
// =============================================================================

/// Outbound channels of all live connections, keyed by session.
///
/// This is the [`Notifier`] the duel engine delivers through. Sends use
/// `try_send`, so a slow client never stalls the engine.
pub struct ConnectionRegistry {
    clients: RwLock<BTreeMap<SessionId, mpsc::Sender<ServerMessage>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            clients: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register a connection's outbound channel.
    pub fn register(&self, session: SessionId, sender: mpsc::Sender<ServerMessage>) {
        self.clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session, sender);
    }

    /// Forget a connection.
    pub fn unregister(&self, session: &SessionId) {
        self.clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session);
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.clients.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no connection is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queue `message` for every recipient without waiting.
    pub fn send(&self, recipients: &[SessionId], message: &ServerMessage) -> Result<(), NotifyError> {
        let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);
        let mut not_connected = Vec::new();
        let mut full = Vec::new();

        for session in recipients {
            match clients.get(session) {
                Some(sender) => match sender.try_send(message.clone()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => full.push(*session),
                    Err(mpsc::error::TrySendError::Closed(_)) => not_connected.push(*session),
                },
                None => not_connected.push(*session),
            }
        }

        if !not_connected.is_empty() {
            Err(NotifyError::NotConnected(not_connected))
        } else if !full.is_empty() {
            Err(NotifyError::BufferFull(full))
        } else {
            Ok(())
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for ConnectionRegistry {
    fn notify(&self, recipients: &[SessionId], notification: &Notification) -> Result<(), NotifyError> {
        debug!("Sending {} to {} recipient(s)", notification.name(), recipients.len());
        self.send(recipients, &ServerMessage::from(notification.clone()))
    }
}

// =============================================================================
// MESSAGE ROUTING
// =============================================================================

/// What to do with one client message.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Routed {
    /// Hand to the duel engine.
    Event(DuelEvent),
    /// Answer the client directly.
    Reply(ServerMessage),
}

/// Translate a client message into an engine event or a direct reply.
///
/// `duels` collects every duel this connection asked to create or join, so
/// a dropped connection can leave all of them. Codes the store rejected only
/// produce stale exit events, which the engine drops.
fn route_client_message(
    session: SessionId,
    msg: ClientMessage,
    duels: &mut BTreeSet<DuelCode>,
) -> Routed {
    if let Err(e) = msg.validate() {
        return Routed::Reply(ServerMessage::Error(e));
    }

    match msg {
        ClientMessage::CreateDuel {
            cube_size,
            inspection_time,
            scramble_length,
        } => {
            let code = DuelCode::generate();
            duels.insert(code.clone());
            Routed::Event(DuelEvent::created(
                code,
                session,
                cube_size,
                inspection_time,
                scramble_length,
            ))
        }
        ClientMessage::JoinDuel { duel_code } => {
            let code = DuelCode::new(duel_code);
            duels.insert(code.clone());
            Routed::Event(DuelEvent::joined(code, session))
        }
        ClientMessage::Ready { duel_code } => {
            Routed::Event(DuelEvent::ready(DuelCode::new(duel_code), session))
        }
        ClientMessage::SolveFinished { duel_code, time_ms } => {
            Routed::Event(DuelEvent::solved(DuelCode::new(duel_code), session, time_ms))
        }
        ClientMessage::ExitDuel { duel_code } => {
            let code = DuelCode::new(duel_code);
            duels.remove(&code);
            Routed::Event(DuelEvent::exited(code, session))
        }
        ClientMessage::Ping { timestamp } => Routed::Reply(ServerMessage::Pong {
            timestamp,
            server_time: chrono::Utc::now().timestamp_millis().max(0) as u64,
        }),
    }
}

/// Tell a client beyond the connection limit why it is turned away.
async fn reject_overloaded(stream: TcpStream, addr: SocketAddr) {
    let mut ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            debug!("Handshake with rejected client {} failed: {}", addr, e);
            return;
        }
    };

    let refusal = ServerMessage::Error(ServerError::new(
        ErrorCode::ServerOverloaded,
        "Server is at capacity, try again later",
    ));
    if let Ok(text) = refusal.to_json() {
        let _ = ws.send(Message::Text(text)).await;
    }
    let _ = ws.close(None).await;
}

// =============================================================================
// SERVER
// =============================================================================

/// The duel server.
pub struct DuelServer {
    /// Server configuration.
    config: ServerConfig,
    /// Live connections; also the engine's notifier.
    registry: Arc<ConnectionRegistry>,
    /// Producer side of the engine's event queue.
    events: EventSender,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl DuelServer {
    /// Create a new duel server.
    pub fn new(config: ServerConfig, registry: Arc<ConnectionRegistry>, events: EventSender) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            registry,
            events,
            shutdown_tx,
        }
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(&self) -> Result<(), DuelServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener until shutdown.
    #[instrument(skip_all)]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), DuelServerError> {
        info!("Duel server listening on {}", listener.local_addr()?);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.registry.len() >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                tokio::spawn(reject_overloaded(stream, addr));
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let registry = self.registry.clone();
        let events = self.events.clone();
        let config = self.config.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let session = SessionId::random();
            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(config.outbound_buffer);

            registry.register(session, msg_tx.clone());
            let _ = msg_tx
                .send(ServerMessage::Welcome {
                    session_id: session.to_uuid_string(),
                    server_version: config.version.clone(),
                })
                .await;
            debug!("Client {} assigned session {}", addr, session);

            // Spawn message sender task
            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            let mut duels: BTreeSet<DuelCode> = BTreeSet::new();

            // Handle incoming messages
            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let client_msg = match ClientMessage::from_json(&text) {
                                    Ok(m) => m,
                                    Err(e) => {
                                        debug!("Invalid message from {}: {}", addr, e);
                                        let _ = msg_tx.try_send(ServerMessage::Error(ServerError::new(
                                            ErrorCode::InvalidInput,
                                            "Invalid message format",
                                        )));
                                        continue;
                                    }
                                };

                                match route_client_message(session, client_msg, &mut duels) {
                                    Routed::Event(event) => {
                                        if let Err(e) = events.send(event) {
                                            error!("{}", e);
                                            let _ = msg_tx.try_send(ServerMessage::Error(ServerError::new(
                                                ErrorCode::InternalError,
                                                "Duel service unavailable",
                                            )));
                                        }
                                    }
                                    Routed::Reply(reply) => {
                                        let _ = msg_tx.try_send(reply);
                                    }
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                error!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = msg_tx.try_send(ServerMessage::Shutdown {
                            reason: "Server shutting down".to_string(),
                        });
                        break;
                    }
                }
            }

            // Session ended: leave every duel it may still be part of
            registry.unregister(&session);
            for code in duels {
                if let Err(e) = events.send(DuelEvent::exited(code, session)) {
                    debug!("Exit not delivered on disconnect: {}", e);
                }
            }

            // Let queued messages (e.g. the shutdown notice) flush
            drop(msg_tx);
            let _ = sender_task.await;

            info!("Client {} (session {}) cleaned up", addr, session);
        });
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scramble::RandomScrambler;
    use crate::duel::engine::{DuelEngine, EngineConfig};
    use crate::duel::events::{event_queue, DuelEventKind};
    use crate::duel::record::MatchOutcome;
    use std::time::Duration;

    const SESSION: SessionId = SessionId::new([7; 16]);

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.outbound_buffer, 64);
        assert_eq!(config.bind_addr.port(), 8080);
    }

    #[tokio::test]
    async fn test_server_creation() {
        let (events, _rx) = event_queue();
        let server = DuelServer::new(
            ServerConfig::default(),
            Arc::new(ConnectionRegistry::new()),
            events,
        );
        assert_eq!(server.connection_count(), 0);
        server.shutdown();
    }

    #[tokio::test]
    async fn test_registry_delivers_notifications() {
        let registry = ConnectionRegistry::new();
        let (tx, mut rx) = mpsc::channel(4);
        registry.register(SESSION, tx);

        let code = DuelCode::new("ABC234");
        registry
            .notify(&[SESSION], &Notification::DuelStarted { duel_code: code.clone() })
            .unwrap();

        assert_eq!(rx.recv().await, Some(ServerMessage::DuelStarted { duel_code: code }));
    }

    #[tokio::test]
    async fn test_registry_reports_missing_and_full() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::channel(1);
        registry.register(SESSION, tx);
        let stranger = SessionId::new([8; 16]);
        let note = Notification::DuelCancelled {
            duel_code: DuelCode::new("ABC234"),
        };

        assert_eq!(
            registry.notify(&[stranger], &note),
            Err(NotifyError::NotConnected(vec![stranger]))
        );

        registry.notify(&[SESSION], &note).unwrap();
        assert_eq!(
            registry.notify(&[SESSION], &note),
            Err(NotifyError::BufferFull(vec![SESSION]))
        );

        registry.unregister(&SESSION);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_registry_attempts_every_recipient() {
        let registry = ConnectionRegistry::new();
        let (tx, mut rx) = mpsc::channel(4);
        registry.register(SESSION, tx);
        let gone = SessionId::new([9; 16]);

        let result = registry.notify(
            &[gone, SESSION],
            &Notification::DuelStarted {
                duel_code: DuelCode::new("ABC234"),
            },
        );
        assert_eq!(result, Err(NotifyError::NotConnected(vec![gone])));
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_route_create_tracks_duel() {
        let mut duels = BTreeSet::new();
        let routed = route_client_message(
            SESSION,
            ClientMessage::CreateDuel {
                cube_size: 3,
                inspection_time: 15,
                scramble_length: None,
            },
            &mut duels,
        );

        match routed {
            Routed::Event(event) => {
                assert!(duels.contains(&event.duel_code));
                assert_eq!(event.session_id, SESSION);
                assert_eq!(
                    event.kind,
                    DuelEventKind::DuelCreated {
                        cube_size: 3,
                        inspection_time: 15,
                        scramble_length: None,
                    }
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_route_invalid_create_replies_error() {
        let mut duels = BTreeSet::new();
        let routed = route_client_message(
            SESSION,
            ClientMessage::CreateDuel {
                cube_size: 12,
                inspection_time: 0,
                scramble_length: None,
            },
            &mut duels,
        );
        assert!(matches!(
            routed,
            Routed::Reply(ServerMessage::Error(ServerError { code: ErrorCode::InvalidInput, .. }))
        ));
        assert!(duels.is_empty());
    }

    #[test]
    fn test_route_join_and_exit() {
        let mut duels = BTreeSet::new();
        let routed = route_client_message(
            SESSION,
            ClientMessage::JoinDuel {
                duel_code: "abc234".to_string(),
            },
            &mut duels,
        );
        assert_eq!(routed, Routed::Event(DuelEvent::joined(DuelCode::new("ABC234"), SESSION)));
        assert!(duels.contains(&DuelCode::new("ABC234")));

        let routed = route_client_message(
            SESSION,
            ClientMessage::ExitDuel {
                duel_code: "ABC234".to_string(),
            },
            &mut duels,
        );
        assert_eq!(routed, Routed::Event(DuelEvent::exited(DuelCode::new("ABC234"), SESSION)));
        assert!(duels.is_empty());
    }

    #[test]
    fn test_route_later_requests_keep_earlier_duels() {
        let mut duels = BTreeSet::new();
        let created = match route_client_message(
            SESSION,
            ClientMessage::CreateDuel {
                cube_size: 3,
                inspection_time: 0,
                scramble_length: None,
            },
            &mut duels,
        ) {
            Routed::Event(event) => event.duel_code,
            other => panic!("unexpected {other:?}"),
        };

        route_client_message(
            SESSION,
            ClientMessage::JoinDuel {
                duel_code: "NOPE22".to_string(),
            },
            &mut duels,
        );
        route_client_message(
            SESSION,
            ClientMessage::CreateDuel {
                cube_size: 2,
                inspection_time: 0,
                scramble_length: None,
            },
            &mut duels,
        );

        assert_eq!(duels.len(), 3);
        assert!(duels.contains(&created));
        assert!(duels.contains(&DuelCode::new("NOPE22")));
    }

    #[test]
    fn test_route_ping() {
        let mut duels = BTreeSet::new();
        let routed = route_client_message(SESSION, ClientMessage::Ping { timestamp: 42 }, &mut duels);
        assert!(matches!(routed, Routed::Reply(ServerMessage::Pong { timestamp: 42, .. })));
        assert!(duels.is_empty());
    }

    // -------------------------------------------------------------------------
    // End-to-end over real sockets
    // -------------------------------------------------------------------------

    type Client = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn connect(addr: SocketAddr) -> (Client, String) {
        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .unwrap();
        match recv(&mut ws).await {
            ServerMessage::Welcome { session_id, .. } => (ws, session_id),
            other => panic!("expected welcome, got {other:?}"),
        }
    }

    async fn send(ws: &mut Client, msg: ClientMessage) {
        ws.send(Message::Text(msg.to_json().unwrap())).await.unwrap();
    }

    async fn recv(ws: &mut Client) -> ServerMessage {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
                .await
                .expect("timed out waiting for server")
                .expect("stream ended")
                .unwrap();
            if let Message::Text(text) = frame {
                return ServerMessage::from_json(&text).unwrap();
            }
        }
    }

    async fn start_stack() -> (Arc<DuelServer>, DuelEngine, SocketAddr) {
        start_stack_with(ServerConfig::default()).await
    }

    async fn start_stack_with(config: ServerConfig) -> (Arc<DuelServer>, DuelEngine, SocketAddr) {
        let registry = Arc::new(ConnectionRegistry::new());
        let engine = DuelEngine::start(
            EngineConfig::default(),
            registry.clone(),
            Box::new(RandomScrambler::new(99)),
        );
        let server = Arc::new(DuelServer::new(
            config,
            registry,
            engine.events(),
        ));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let serving = server.clone();
        tokio::spawn(async move { serving.serve(listener).await });

        (server, engine, addr)
    }

    #[tokio::test]
    async fn test_duel_over_websocket() {
        let (server, engine, addr) = start_stack().await;

        let (mut host, _) = connect(addr).await;
        let (mut challenger, _) = connect(addr).await;

        send(
            &mut host,
            ClientMessage::CreateDuel {
                cube_size: 3,
                inspection_time: 15,
                scramble_length: None,
            },
        )
        .await;
        let code = match recv(&mut host).await {
            ServerMessage::DuelCreated { duel_code } => duel_code,
            other => panic!("expected duel_created, got {other:?}"),
        };

        send(
            &mut challenger,
            ClientMessage::JoinDuel {
                duel_code: code.to_string().to_lowercase(),
            },
        )
        .await;
        for ws in [&mut host, &mut challenger] {
            match recv(ws).await {
                ServerMessage::DuelReady {
                    duel_code,
                    scramble,
                    cube_size,
                    inspection_time,
                } => {
                    assert_eq!(duel_code, code);
                    assert_eq!(scramble.split(' ').count(), 20);
                    assert_eq!(cube_size, 3);
                    assert_eq!(inspection_time, 15);
                }
                other => panic!("expected duel_ready, got {other:?}"),
            }
        }

        for ws in [&mut host, &mut challenger] {
            send(ws, ClientMessage::Ready { duel_code: code.to_string() }).await;
        }
        for ws in [&mut host, &mut challenger] {
            assert_eq!(
                recv(ws).await,
                ServerMessage::DuelStarted { duel_code: code.clone() }
            );
        }

        send(
            &mut host,
            ClientMessage::SolveFinished {
                duel_code: code.to_string(),
                time_ms: 9000,
            },
        )
        .await;
        send(
            &mut challenger,
            ClientMessage::SolveFinished {
                duel_code: code.to_string(),
                time_ms: 8500,
            },
        )
        .await;

        match recv(&mut host).await {
            ServerMessage::DuelEnded(info) => {
                assert_eq!(info.outcome, MatchOutcome::Lost);
                assert_eq!(info.opponent_time_ms, 8500);
            }
            other => panic!("expected duel_ended, got {other:?}"),
        }
        match recv(&mut challenger).await {
            ServerMessage::DuelEnded(info) => {
                assert!(info.is_winner);
                assert_eq!(info.opponent_time_ms, 9000);
            }
            other => panic!("expected duel_ended, got {other:?}"),
        }
        assert!(engine.store().get(&code).await.is_none());

        server.shutdown();
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_disconnect_cancels_duel() {
        let (server, engine, addr) = start_stack().await;

        let (mut host, _) = connect(addr).await;
        let (mut challenger, _) = connect(addr).await;

        send(
            &mut host,
            ClientMessage::CreateDuel {
                cube_size: 2,
                inspection_time: 0,
                scramble_length: Some(5),
            },
        )
        .await;
        let code = match recv(&mut host).await {
            ServerMessage::DuelCreated { duel_code } => duel_code,
            other => panic!("expected duel_created, got {other:?}"),
        };
        send(&mut challenger, ClientMessage::JoinDuel { duel_code: code.to_string() }).await;
        recv(&mut host).await;
        recv(&mut challenger).await;

        // Host drops the socket without exiting
        drop(host);

        assert_eq!(
            recv(&mut challenger).await,
            ServerMessage::DuelCancelled { duel_code: code.clone() }
        );
        assert!(engine.store().get(&code).await.is_none());

        server.shutdown();
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_disconnect_after_failed_join_still_cancels() {
        let (server, engine, addr) = start_stack().await;

        let (mut host, _) = connect(addr).await;
        let (mut challenger, _) = connect(addr).await;

        send(
            &mut host,
            ClientMessage::CreateDuel {
                cube_size: 3,
                inspection_time: 0,
                scramble_length: None,
            },
        )
        .await;
        let code = match recv(&mut host).await {
            ServerMessage::DuelCreated { duel_code } => duel_code,
            other => panic!("expected duel_created, got {other:?}"),
        };
        send(&mut challenger, ClientMessage::JoinDuel { duel_code: code.to_string() }).await;
        recv(&mut host).await;
        recv(&mut challenger).await;

        // Mistyped code: rejected by the store, no reply
        send(
            &mut host,
            ClientMessage::JoinDuel {
                duel_code: "NOPE22".to_string(),
            },
        )
        .await;
        drop(host);

        assert_eq!(
            recv(&mut challenger).await,
            ServerMessage::DuelCancelled { duel_code: code.clone() }
        );
        assert!(engine.store().get(&code).await.is_none());

        server.shutdown();
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_connection_limit_replies_overloaded() {
        let config = ServerConfig {
            max_connections: 1,
            ..ServerConfig::default()
        };
        let (server, engine, addr) = start_stack_with(config).await;

        let (_first, _) = connect(addr).await;
        let (mut second, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .unwrap();

        assert!(matches!(
            recv(&mut second).await,
            ServerMessage::Error(ServerError { code: ErrorCode::ServerOverloaded, .. })
        ));
        assert_eq!(server.connection_count(), 1);

        server.shutdown();
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_malformed_message_gets_error() {
        let (server, engine, addr) = start_stack().await;
        let (mut client, _) = connect(addr).await;

        client.send(Message::Text("{\"type\":\"nope\"}".to_string())).await.unwrap();
        assert!(matches!(
            recv(&mut client).await,
            ServerMessage::Error(ServerError { code: ErrorCode::InvalidInput, .. })
        ));

        server.shutdown();
        engine.shutdown().await;
    }
}
