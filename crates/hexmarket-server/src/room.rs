//! Match management.

use hexmarket_core::{Command, GameError, GameEvent, GamePhase, GameSnapshot, GameState};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::protocol::{MatchInfo, ServerMessage};

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Match not found")]
    MatchNotFound,

    #[error("Not watching a match")]
    NotInMatch,

    #[error("Already watching a match")]
    AlreadyInMatch,

    #[error("Too many open matches")]
    TooManyMatches,

    /// The engine refused the command
    #[error("{0}")]
    Rejected(#[from] GameError),
}

/// One match: the engine state plus the connections watching it.
pub struct MatchRoom {
    pub id: Uuid,
    pub game: GameState,
    /// Connections in the order they arrived
    pub viewers: Vec<Uuid>,
}

impl MatchRoom {
    pub fn new(id: Uuid) -> Result<Self, RoomError> {
        Ok(Self::with_game(id, GameState::new()?))
    }

    pub fn with_game(id: Uuid, game: GameState) -> Self {
        Self {
            id,
            game,
            viewers: Vec::new(),
        }
    }

    pub fn add_viewer(&mut self, viewer: Uuid) -> Result<(), RoomError> {
        if self.viewers.contains(&viewer) {
            return Err(RoomError::AlreadyInMatch);
        }
        self.viewers.push(viewer);
        Ok(())
    }

    /// Drop a connection, giving up its seat while the match is still in the lobby.
    /// Returns the events of that departure and whether anyone is left watching.
    pub fn remove_viewer(&mut self, viewer: Uuid) -> (Vec<GameEvent>, bool) {
        self.viewers.retain(|v| *v != viewer);
        let player = viewer.to_string();
        let mut events = Vec::new();
        if self.game.phase == GamePhase::Lobby && self.game.seat_of(&player).is_some() {
            if let Ok(left) = self.game.apply(&player, Command::Leave) {
                events = left;
            }
        }
        (events, !self.viewers.is_empty())
    }

    /// Run one command for `player` against the match
    pub fn apply(&mut self, player: Uuid, command: Command) -> Result<Vec<GameEvent>, RoomError> {
        if !self.viewers.contains(&player) {
            return Err(RoomError::NotInMatch);
        }
        let name = command.name();
        let events = self.game.apply(&player.to_string(), command)?;
        debug!(match_id = %self.id, %player, command = name, events = events.len(), "command applied");
        if self.game.is_finished() {
            info!(match_id = %self.id, "match finished");
        }
        Ok(events)
    }

    pub fn snapshot_for(&self, viewer: Uuid) -> GameSnapshot {
        self.game.snapshot_for(Some(&viewer.to_string()))
    }

    /// The events and fresh snapshot each viewer should receive, redacted per viewer
    pub fn updates(&self, events: &[GameEvent]) -> Vec<(Uuid, ServerMessage)> {
        let mut out = Vec::new();
        for viewer in &self.viewers {
            let id = viewer.to_string();
            if !events.is_empty() {
                out.push((
                    *viewer,
                    ServerMessage::Events {
                        events: events.iter().map(|e| e.redacted_for(Some(&id))).collect(),
                    },
                ));
            }
            out.push((
                *viewer,
                ServerMessage::Snapshot {
                    state: Box::new(self.snapshot_for(*viewer)),
                },
            ));
        }
        out
    }

    pub fn to_info(&self) -> MatchInfo {
        MatchInfo {
            id: self.id,
            phase: self.game.phase.clone(),
            players: self.game.players.iter().map(|p| p.name.clone()).collect(),
            viewers: self.viewers.len(),
        }
    }
}
