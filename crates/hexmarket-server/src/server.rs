//! WebSocket server and connection handling.

use crate::config::ServerConfig;
use crate::protocol::{ClientMessage, MatchInfo, ServerMessage};
use crate::room::{MatchRoom, RoomError};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use hexmarket_core::Command;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Server state shared across all connections.
pub struct ServerState {
    pub config: ServerConfig,
    /// All open matches; an entry guard serializes commands for its match
    pub matches: DashMap<Uuid, MatchRoom>,
    /// Mapping from connection ID to the match it watches
    pub connection_matches: DashMap<Uuid, Uuid>,
    /// Mapping from connection ID to its message sender
    pub senders: DashMap<Uuid, mpsc::UnboundedSender<ServerMessage>>,
}

impl ServerState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            matches: DashMap::new(),
            connection_matches: DashMap::new(),
            senders: DashMap::new(),
        }
    }

    /// Send a message to a specific connection.
    pub fn send_to(&self, connection: Uuid, msg: ServerMessage) {
        if let Some(sender) = self.senders.get(&connection) {
            let _ = sender.send(msg);
        }
    }

    fn send_error(&self, connection: Uuid, err: RoomError) {
        let msg = match err {
            RoomError::Rejected(reason) => ServerMessage::Rejected {
                reason: reason.to_string(),
            },
            other => ServerMessage::Error {
                message: other.to_string(),
            },
        };
        self.send_to(connection, msg);
    }

    fn deliver(&self, updates: Vec<(Uuid, ServerMessage)>) {
        for (connection, msg) in updates {
            self.send_to(connection, msg);
        }
    }

    pub fn list_matches(&self) -> Vec<MatchInfo> {
        self.matches.iter().map(|m| m.to_info()).collect()
    }

    /// Open a match watched by `owner`
    pub fn create_match(&self, owner: Uuid) -> Result<Uuid, RoomError> {
        if self.connection_matches.contains_key(&owner) {
            return Err(RoomError::AlreadyInMatch);
        }
        if self.matches.len() >= self.config.max_matches {
            return Err(RoomError::TooManyMatches);
        }
        let id = Uuid::new_v4();
        let mut room = MatchRoom::new(id)?;
        room.add_viewer(owner)?;
        self.matches.insert(id, room);
        self.connection_matches.insert(owner, id);
        info!(match_id = %id, "match created");
        Ok(id)
    }
}

/// Run the WebSocket server.
pub async fn run_server(state: Arc<ServerState>) -> anyhow::Result<()> {
    let addr = state.config.addr;
    let listener = TcpListener::bind(addr).await?;
    info!("Hexmarket server listening on {}", addr);

    while let Ok((stream, peer_addr)) = listener.accept().await {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }

    Ok(())
}

/// Handle a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<ServerState>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    info!("New WebSocket connection from {}", addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let connection = Uuid::new_v4();

    // Outgoing messages go through a channel so handlers never await the socket
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    state.senders.insert(connection, tx);

    let welcome = ServerMessage::Welcome { player_id: connection };
    ws_sender.send(Message::Text(serde_json::to_string(&welcome)?)).await?;

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(text) => {
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(e) => error!("Failed to encode message: {}", e),
            }
        }
    });

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => handle_message(connection, client_msg, &state),
                Err(e) => {
                    warn!("Invalid message from {}: {}", connection, e);
                    state.send_to(
                        connection,
                        ServerMessage::Error {
                            message: format!("Malformed message: {e}"),
                        },
                    );
                }
            },
            Ok(Message::Close(_)) => {
                info!("Client {} closing connection", connection);
                break;
            }
            Ok(Message::Ping(_)) => state.send_to(connection, ServerMessage::Pong),
            Err(e) => {
                error!("WebSocket error from {}: {}", connection, e);
                break;
            }
            _ => {}
        }
    }

    handle_disconnect(connection, &state);
    state.senders.remove(&connection);
    send_task.abort();

    info!("Connection closed for {}", connection);
    Ok(())
}

/// Handle a client message.
pub(crate) fn handle_message(connection: Uuid, msg: ClientMessage, state: &ServerState) {
    match msg {
        ClientMessage::CreateMatch => match state.create_match(connection) {
            Ok(match_id) => {
                state.send_to(connection, ServerMessage::MatchCreated { match_id });
                if let Some(room) = state.matches.get(&match_id) {
                    let updates = room.updates(&[]);
                    drop(room);
                    state.deliver(updates);
                }
            }
            Err(e) => state.send_error(connection, e),
        },

        ClientMessage::JoinMatch { match_id } => {
            if state.connection_matches.contains_key(&connection) {
                state.send_error(connection, RoomError::AlreadyInMatch);
                return;
            }
            let Some(mut room) = state.matches.get_mut(&match_id) else {
                state.send_error(connection, RoomError::MatchNotFound);
                return;
            };
            match room.add_viewer(connection) {
                Ok(()) => {
                    let snapshot = room.snapshot_for(connection);
                    drop(room);
                    state.connection_matches.insert(connection, match_id);
                    state.send_to(
                        connection,
                        ServerMessage::Snapshot {
                            state: Box::new(snapshot),
                        },
                    );
                }
                Err(e) => state.send_error(connection, e),
            }
        }

        ClientMessage::Command { command } => handle_command(connection, command, state),

        ClientMessage::ListMatches => {
            let matches = state.list_matches();
            state.send_to(connection, ServerMessage::MatchList { matches });
        }

        ClientMessage::Ping => state.send_to(connection, ServerMessage::Pong),
    }
}

/// Apply one command under the match guard, then fan out per-viewer updates
fn handle_command(connection: Uuid, command: Command, state: &ServerState) {
    let Some(match_id) = state.connection_matches.get(&connection).map(|m| *m) else {
        state.send_error(connection, RoomError::NotInMatch);
        return;
    };
    let Some(mut room) = state.matches.get_mut(&match_id) else {
        state.send_error(connection, RoomError::MatchNotFound);
        return;
    };

    match room.apply(connection, command) {
        Ok(events) => {
            let updates = room.updates(&events);
            drop(room);
            state.deliver(updates);
        }
        Err(e) => {
            drop(room);
            state.send_error(connection, e);
        }
    }
}

/// Handle a connection going away.
fn handle_disconnect(connection: Uuid, state: &ServerState) {
    let Some((_, match_id)) = state.connection_matches.remove(&connection) else {
        return;
    };
    let Some(mut room) = state.matches.get_mut(&match_id) else {
        return;
    };

    let (events, occupied) = room.remove_viewer(connection);
    if occupied {
        let updates = room.updates(&events);
        drop(room);
        state.deliver(updates);
    } else {
        drop(room);
        state.matches.remove(&match_id);
        info!(match_id = %match_id, "match closed");
    }
}
