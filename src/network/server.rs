//! WebSocket Game Server
//!
//! Accepts WebSocket connections, routes lobby requests to the room
//! registry and in-room messages to the connection's room.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::interval;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, instrument, warn};

use crate::game::state::SessionId;
use crate::game::tick::RoomConfig;
use crate::network::protocol::{
    ClientMessage, ErrorCode, JoinedInfo, Outbound, ServerError, ServerMessage,
};
use crate::network::registry::{RegistryError, RoomRegistry};
use crate::network::room::{RoomHandle, RoomPhase};

/// Default listen port.
pub const DEFAULT_PORT: u16 = 2567;

/// Capacity of each connection's outbound queue.
const OUTBOUND_BUFFER: usize = 256;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// How often disposed rooms are pruned.
    pub cleanup_interval: Duration,
    /// Configuration for every room.
    pub room: RoomConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            max_connections: 1000,
            cleanup_interval: Duration::from_secs(10),
            room: RoomConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read `HOST`, `PORT`, `MAX_CONNECTIONS` and `MAX_CLIENTS_PER_ROOM`.
    pub fn from_env() -> Result<Self, GameServerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GameServerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        let host: IpAddr = parse_var(&lookup, "HOST")?.unwrap_or(config.bind_addr.ip());
        let port: u16 = parse_var(&lookup, "PORT")?.unwrap_or(DEFAULT_PORT);
        config.bind_addr = SocketAddr::new(host, port);

        if let Some(max) = parse_var(&lookup, "MAX_CONNECTIONS")? {
            config.max_connections = max;
        }
        if let Some(max) = parse_var(&lookup, "MAX_CLIENTS_PER_ROOM")? {
            config.room.max_clients = max;
        }
        Ok(config)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>, GameServerError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| GameServerError::Config(format!("{} has invalid value {:?}", key, raw))),
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Registry error.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// Connected client bookkeeping.
struct ConnectedClient {
    /// Session id assigned on connect.
    session_id: SessionId,
    /// Connection time.
    connected_at: Instant,
}

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Live rooms.
    registry: Arc<RoomRegistry>,
    /// Connected clients.
    clients: Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let registry = Arc::new(RoomRegistry::new(config.room.clone()));

        Self {
            config,
            registry,
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Bind the configured address and serve until shutdown.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("Game server listening on {}", self.config.bind_addr);
        self.serve(listener).await
    }

    /// Serve on an already bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        let cleanup_registry = self.registry.clone();
        let cleanup_interval = self.config.cleanup_interval;
        let cleanup_handle = tokio::spawn(async move {
            Self::run_cleanup_loop(cleanup_registry, cleanup_interval).await;
        });

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let clients_count = self.clients.read().await.len();
                            if clients_count >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
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

        cleanup_handle.abort();
        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let clients = self.clients.clone();
        let registry = self.registry.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let session_id: SessionId = uuid::Uuid::new_v4().to_string();
            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (out_tx, mut out_rx) = mpsc::channel::<Outbound>(OUTBOUND_BUFFER);

            clients.write().await.insert(addr, ConnectedClient {
                session_id: session_id.clone(),
                connected_at: Instant::now(),
            });

            // Writer: serialize queued messages; a Close ends the connection
            let mut sender_task = tokio::spawn(async move {
                while let Some(outbound) = out_rx.recv().await {
                    match outbound {
                        Outbound::Message(msg) => {
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
                        Outbound::Close => {
                            let frame = CloseFrame {
                                code: CloseCode::Normal,
                                reason: "room closed".into(),
                            };
                            let _ = ws_sender.send(Message::Close(Some(frame))).await;
                            break;
                        }
                    }
                }
            });

            let mut connection = Connection {
                session_id: session_id.clone(),
                room: None,
                sender: out_tx,
            };

            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                match ClientMessage::from_json(&text) {
                                    Ok(client_msg) => connection.handle_message(client_msg, &registry).await,
                                    Err(e) => debug!("Dropped malformed message from {}: {}", addr, e),
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
                    _ = &mut sender_task => {
                        debug!("Writer for {} finished", addr);
                        break;
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }

            connection.leave_room().await;
            sender_task.abort();

            if let Some(client) = clients.write().await.remove(&addr) {
                info!(
                    "Client {} ({}) cleaned up after {:?}",
                    addr,
                    client.session_id,
                    client.connected_at.elapsed()
                );
            }
        });
    }

    /// Prune disposed rooms periodically.
    async fn run_cleanup_loop(registry: Arc<RoomRegistry>, period: Duration) {
        let mut interval = interval(period);

        loop {
            interval.tick().await;
            registry.cleanup().await;
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Get live room count.
    pub async fn room_count(&self) -> usize {
        self.registry.room_count().await
    }
}

// =============================================================================
// CONNECTION
// =============================================================================

/// One connection's lobby state.
struct Connection {
    session_id: SessionId,
    /// Room this connection is in.
    room: Option<RoomHandle>,
    /// Outbound queue shared with the writer task.
    sender: mpsc::Sender<Outbound>,
}

impl Connection {
    /// Current room, unless it has been disposed.
    fn active_room(&self) -> Option<&RoomHandle> {
        self.room
            .as_ref()
            .filter(|h| h.status().phase != RoomPhase::Disposed)
    }

    async fn handle_message(&mut self, msg: ClientMessage, registry: &RoomRegistry) {
        match msg {
            ClientMessage::JoinOrCreate(request) => {
                if self.reject_if_in_room() {
                    return;
                }
                let result = registry
                    .join_or_create(request, self.session_id.clone(), self.sender.clone())
                    .await;
                self.finish_join(result);
            }
            ClientMessage::Create(request) => {
                if self.reject_if_in_room() {
                    return;
                }
                let result = registry
                    .create_and_join(request, self.session_id.clone(), self.sender.clone())
                    .await;
                self.finish_join(result);
            }
            ClientMessage::JoinById { room_id } => {
                if self.reject_if_in_room() {
                    return;
                }
                let result = registry
                    .join_by_id(&room_id, self.session_id.clone(), self.sender.clone())
                    .await;
                self.finish_join(result);
            }
            ClientMessage::ListRooms => {
                let rooms = registry.list_rooms().await;
                self.send(ServerMessage::Rooms { rooms });
            }
            ClientMessage::Leave => {
                self.leave_room().await;
            }
            other => match (other.into_action(), self.active_room()) {
                (Some(action), Some(room)) => room.action(self.session_id.clone(), action).await,
                _ => debug!("Dropped in-room message from {} outside a room", self.session_id),
            },
        }
    }

    fn reject_if_in_room(&self) -> bool {
        if let Some(room) = self.active_room() {
            self.send(ServerMessage::Error(ServerError::new(
                ErrorCode::AlreadyInRoom,
                format!("Already in room {}", room.id),
            )));
            return true;
        }
        false
    }

    fn finish_join(&mut self, result: Result<(RoomHandle, JoinedInfo), RegistryError>) {
        match result {
            Ok((handle, _)) => {
                self.room = Some(handle);
            }
            Err(e) => {
                debug!("Join failed for {}: {}", self.session_id, e);
                self.send(ServerMessage::Error(e.to_server_error()));
            }
        }
    }

    async fn leave_room(&mut self) {
        if let Some(room) = self.room.take() {
            room.leave(self.session_id.clone()).await;
        }
    }

    fn send(&self, message: ServerMessage) {
        if let Err(e) = self.sender.try_send(Outbound::Message(message)) {
            warn!("Dropped lobby reply for {}: {}", self.session_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_tungstenite::connect_async;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 2567);
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.room.max_clients, 10);
    }

    #[test]
    fn test_server_config_from_lookup() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "9000"),
            ("MAX_CLIENTS_PER_ROOM", "4"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.room.max_clients, 4);
        assert_eq!(config.max_connections, 1000);

        let err = ServerConfig::from_lookup(lookup(&[("PORT", "http")])).unwrap_err();
        assert!(matches!(err, GameServerError::Config(_)));
    }

    #[tokio::test]
    async fn test_server_creation() {
        let server = GameServer::new(ServerConfig::default());
        assert_eq!(server.connection_count().await, 0);
        assert_eq!(server.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_join_over_websocket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Arc::new(GameServer::new(ServerConfig::default()));
        let serving = server.clone();
        tokio::spawn(async move { serving.serve(listener).await });

        let (mut ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
        ws.send(Message::Text("garbage".into())).await.unwrap();
        ws.send(Message::Text(r#"{"type":"joinOrCreate","roomName":"battle_royale"}"#.into()))
            .await
            .unwrap();

        let mut kinds = Vec::new();
        while kinds.len() < 4 {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    let msg = ServerMessage::from_json(&text).unwrap();
                    kinds.push(msg);
                }
                Some(Ok(_)) => continue,
                other => panic!("Connection ended early: {:?}", other),
            }
        }

        assert!(matches!(kinds[0], ServerMessage::Joined(_)));
        assert!(matches!(kinds[1], ServerMessage::State(_)));
        assert!(matches!(kinds[2], ServerMessage::ZoneShrink(_)));
        assert!(matches!(kinds[3], ServerMessage::AmmoUpdate { ammo: 0, .. }));
        assert_eq!(server.room_count().await, 1);

        server.shutdown();
    }
}
