//! WebSocket protocol messages for Hexmarket.

use hexmarket_core::{Command, GameEvent, GamePhase, GameSnapshot};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    /// Open a new match and watch it
    CreateMatch,

    /// Watch an existing match; seats are taken with a `Join` command
    JoinMatch { match_id: Uuid },

    /// Submit an engine command to the watched match
    Command { command: Command },

    /// Request the match list
    ListMatches,

    /// Ping for keepalive
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    /// Connection id, also used as the player id inside matches
    Welcome { player_id: Uuid },

    MatchCreated { match_id: Uuid },

    /// The match as this connection may see it
    Snapshot { state: Box<GameSnapshot> },

    /// The last command was refused; nothing changed
    Rejected { reason: String },

    /// Events produced by an accepted command
    Events { events: Vec<GameEvent> },

    MatchList { matches: Vec<MatchInfo> },

    Pong,

    /// Transport-level failure (unknown match, malformed message)
    Error { message: String },
}

/// Match summary for the lobby browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchInfo {
    pub id: Uuid,
    pub phase: GamePhase,
    /// Seated player names in seat order
    pub players: Vec<String>,
    /// Open connections watching the match
    pub viewers: usize,
}
