//! Per-viewer projection of the game state.
//!
//! Every viewer gets the full public state plus their own private fields:
//! hand, development cards and victory point cards. Other players are shown
//! as counts. Unrevealed cloud hexes hide what they hold.

use crate::actions::{GameEvent, TradeOffer};
use crate::board::{Board, HexTile, Port, TileKind};
use crate::draft::DraftState;
use crate::game::{GamePhase, GameState, RollState, SetupCursor};
use crate::graph::{BoardGraph, EdgeId, HexId, VertexId};
use crate::hex::HexCoord;
use crate::player::{DevCard, Player, PlayerColor, PlayerId, ResourceHand, TeamId};
use crate::settings::GameSettings;
use crate::spells::SpellState;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Log entries included in a snapshot
pub const LOG_TAIL: usize = 50;

/// A hex as players see it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileFace {
    pub id: HexId,
    pub coord: HexCoord,
    pub center: (f64, f64),
    /// `None` while the tile is an unrevealed cloud
    pub kind: Option<TileKind>,
    pub cloud: bool,
    pub number: Option<u8>,
    pub placeholder: bool,
}

impl From<&HexTile> for TileFace {
    fn from(tile: &HexTile) -> Self {
        let cloud = matches!(tile.kind, TileKind::Cloud(_));
        Self {
            id: tile.id.clone(),
            coord: tile.coord,
            center: tile.center,
            kind: (!cloud).then_some(tile.kind),
            cloud,
            number: tile.number,
            placeholder: tile.placeholder,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardView {
    pub graph: BoardGraph,
    pub tiles: Vec<TileFace>,
    pub ports: Vec<Port>,
    pub robber: Option<HexId>,
}

impl From<&Board> for BoardView {
    fn from(board: &Board) -> Self {
        Self {
            graph: board.graph.clone(),
            tiles: board.tiles.iter().map(TileFace::from).collect(),
            ports: board.ports.clone(),
            robber: board.robber.clone(),
        }
    }
}

/// A player as seen by one viewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub color: PlayerColor,
    pub team: Option<TeamId>,
    pub ready: bool,
    /// Cards in hand, gold included
    pub resource_count: u32,
    pub dev_card_count: usize,
    pub roads: BTreeSet<EdgeId>,
    pub settlements: BTreeSet<VertexId>,
    pub cities: BTreeSet<VertexId>,
    pub played_knights: u32,
    pub longest_road: u32,
    /// Points everyone can see (no victory point cards)
    pub public_victory_points: u32,
    pub has_longest_road: bool,
    pub has_largest_army: bool,
    pub bonus_roads: u8,

    // Only filled in for the viewer
    pub resources: Option<ResourceHand>,
    pub dev_cards: Option<Vec<DevCard>>,
    pub fresh_dev_cards: Option<Vec<DevCard>>,
    pub victory_points: Option<u32>,
}

impl PlayerView {
    pub fn new(player: &Player, viewer: Option<&str>) -> Self {
        let own = viewer == Some(player.id.as_str());
        Self {
            id: player.id.clone(),
            name: player.name.clone(),
            color: player.color,
            team: player.team,
            ready: player.ready,
            resource_count: player.resources.total() + player.resources.gold,
            dev_card_count: player.dev_card_count(),
            roads: player.roads.clone(),
            settlements: player.settlements.clone(),
            cities: player.cities.clone(),
            played_knights: player.played_knights,
            longest_road: player.longest_road,
            public_victory_points: player.victory_points.saturating_sub(player.vp_cards()),
            has_longest_road: player.has_longest_road,
            has_largest_army: player.has_largest_army,
            bonus_roads: player.bonus_roads,
            resources: own.then_some(player.resources),
            dev_cards: own.then(|| player.dev_cards.clone()),
            fresh_dev_cards: own.then(|| player.dev_cards_bought_this_turn.clone()),
            victory_points: own.then_some(player.victory_points),
        }
    }
}

/// Everything one viewer is allowed to see
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub viewer: Option<PlayerId>,
    pub phase: GamePhase,
    pub settings: GameSettings,
    pub board: BoardView,
    pub vertex_owners: BTreeMap<VertexId, PlayerId>,
    pub edge_owners: BTreeMap<EdgeId, PlayerId>,
    pub players: Vec<PlayerView>,
    /// Seat index of the player to act
    pub current: usize,
    pub active_player: Option<PlayerId>,
    pub turn_number: u32,
    pub setup: SetupCursor,
    pub roll: RollState,
    pub ready_check: bool,
    pub trade_offers: Vec<TradeOffer>,
    pub dev_deck_size: usize,
    pub draft: Option<DraftState>,
    pub spells: Option<SpellState>,
    /// Most recent events, oldest first
    pub log: Vec<GameEvent>,
}

impl GameSnapshot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl GameState {
    /// Project the state for `viewer` (`None` for a spectator)
    pub fn snapshot_for(&self, viewer: Option<&str>) -> GameSnapshot {
        let skip = self.log.len().saturating_sub(LOG_TAIL);
        GameSnapshot {
            viewer: viewer.map(str::to_string),
            phase: self.phase.clone(),
            settings: self.settings.clone(),
            board: BoardView::from(&self.board),
            vertex_owners: self.vertex_owners.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            edge_owners: self.edge_owners.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            players: self.players.iter().map(|p| PlayerView::new(p, viewer)).collect(),
            current: self.current,
            active_player: self.active_player().cloned(),
            turn_number: self.turn_number,
            setup: self.setup.clone(),
            roll: self.roll.clone(),
            ready_check: self.ready_check,
            trade_offers: self.trade_offers.clone(),
            dev_deck_size: self.dev_deck.len(),
            draft: self.draft.clone(),
            spells: self.spells.clone(),
            log: self.log[skip..].iter().map(|e| e.redacted_for(viewer)).collect(),
        }
    }
}
