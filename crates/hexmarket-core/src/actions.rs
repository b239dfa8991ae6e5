//! Commands players can send and the events they produce.
//!
//! `Command` is the closed set of actions the engine accepts; the transport
//! decodes one per message and hands it to [`crate::GameState::apply`].

use crate::board::{HexSpec, PortSpec, Resource};
use crate::game::{GamePhase, Winner};
use crate::graph::{EdgeId, HexId, VertexId};
use crate::player::{PlayerColor, PlayerId, ResourceHand, TeamId};
use crate::settings::{GameSettings, SettingsUpdate};
use crate::spells::{SpellCast, SpellKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Piece kind for the build command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuildKind {
    Road,
    Settlement,
    City,
}

/// All possible commands a player can send
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    // ==================== Lobby ====================
    /// Take a seat
    Join { name: String },
    /// Give up a seat
    Leave,
    SetColor { color: PlayerColor },
    /// Pick a team (team mode only); `None` leaves the team
    SetTeam { team: Option<TeamId> },
    Ready { ready: bool },
    /// Open the ready check
    Start,
    UpdateSettings { settings: SettingsUpdate },
    /// Replace the board with a custom layout
    SetCustomBoard {
        hexes: Vec<HexSpec>,
        #[serde(default)]
        ports: Option<Vec<PortSpec>>,
    },
    /// Throw the match away and start over
    Reset {
        #[serde(default)]
        keep_settings: bool,
    },

    // ==================== Building ====================
    Build {
        kind: BuildKind,
        #[serde(default)]
        vertex: Option<VertexId>,
        #[serde(default)]
        edge: Option<EdgeId>,
    },

    // ==================== Turn ====================
    Roll,
    EndTurn,
    /// Resolve a discard obligation after a 7
    Discard { resources: ResourceHand },
    MoveRobber {
        hex: HexId,
        #[serde(default)]
        target: Option<PlayerId>,
    },
    /// Convert one unit of gold into a tradable resource
    ChooseGold { resource: Resource },

    // ==================== Development Cards ====================
    BuyDevCard,
    /// Play a knight and move the robber in one step
    PlayKnight {
        hex: HexId,
        #[serde(default)]
        target: Option<PlayerId>,
    },
    PlayMonopoly { resource: Resource },
    PlayYearOfPlenty { first: Resource, second: Resource },
    PlayRoadBuilding,

    // ==================== Trading ====================
    OfferTrade {
        #[serde(default)]
        to: Option<PlayerId>,
        give: ResourceHand,
        get: ResourceHand,
    },
    RespondTrade { offer_id: u32, accept: bool },
    FinalizeTrade { offer_id: u32, with: PlayerId },
    CancelTrade { offer_id: u32 },
    /// Trade with the bank at 4:1 or a better harbor/spell rate
    BankTrade { give: Resource, get: Resource },

    // ==================== Team Mode ====================
    CastSpell { cast: SpellCast },
    DraftBid { amount: u32 },
    DraftPass,
    PlaceDraftTile { hex: HexId, tile: String },
    DraftSpellPick { spell: SpellKind },
}

impl Command {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Command::Join { .. } => "join",
            Command::Leave => "leave",
            Command::SetColor { .. } => "set_color",
            Command::SetTeam { .. } => "set_team",
            Command::Ready { .. } => "ready",
            Command::Start => "start",
            Command::UpdateSettings { .. } => "update_settings",
            Command::SetCustomBoard { .. } => "set_custom_board",
            Command::Reset { .. } => "reset",
            Command::Build { .. } => "build",
            Command::Roll => "roll",
            Command::EndTurn => "end_turn",
            Command::Discard { .. } => "discard",
            Command::MoveRobber { .. } => "move_robber",
            Command::ChooseGold { .. } => "choose_gold",
            Command::BuyDevCard => "buy_dev_card",
            Command::PlayKnight { .. } => "play_knight",
            Command::PlayMonopoly { .. } => "play_monopoly",
            Command::PlayYearOfPlenty { .. } => "play_year_of_plenty",
            Command::PlayRoadBuilding => "play_road_building",
            Command::OfferTrade { .. } => "offer_trade",
            Command::RespondTrade { .. } => "respond_trade",
            Command::FinalizeTrade { .. } => "finalize_trade",
            Command::CancelTrade { .. } => "cancel_trade",
            Command::BankTrade { .. } => "bank_trade",
            Command::CastSpell { .. } => "cast_spell",
            Command::DraftBid { .. } => "draft_bid",
            Command::DraftPass => "draft_pass",
            Command::PlaceDraftTile { .. } => "place_draft_tile",
            Command::DraftSpellPick { .. } => "draft_spell_pick",
        }
    }
}

/// An open trade offer between players
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeOffer {
    pub id: u32,
    /// Player making the offer
    pub from: PlayerId,
    /// Specific player to trade with, or None for open offer
    pub to: Option<PlayerId>,
    /// Resources the offerer hands over
    pub give: ResourceHand,
    /// Resources the offerer wants back
    pub get: ResourceHand,
    /// Players who currently accept
    pub accepted_by: BTreeSet<PlayerId>,
}

impl TradeOffer {
    /// Check if offer is valid (non-empty on both sides, no gold)
    pub fn is_valid(&self) -> bool {
        !self.give.is_empty() && !self.get.is_empty() && self.give.gold == 0 && self.get.gold == 0
    }

    /// Whether `player` may respond to this offer
    pub fn is_open_to(&self, player: &str) -> bool {
        self.from != player && self.to.as_deref().map_or(true, |to| to == player)
    }
}

/// Events that occur as a result of commands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GameEvent {
    // ==================== Lobby ====================
    PlayerJoined { player: PlayerId, name: String, color: PlayerColor },
    PlayerLeft { player: PlayerId },
    ColorChanged { player: PlayerId, color: PlayerColor },
    TeamChanged { player: PlayerId, team: Option<TeamId> },
    ReadyChanged { player: PlayerId, ready: bool },
    ReadyCheckOpened,
    SettingsUpdated { settings: GameSettings },
    BoardReplaced,
    GameReset,
    PhaseChanged { phase: GamePhase },

    // ==================== Building ====================
    SettlementBuilt { player: PlayerId, vertex: VertexId },
    CityBuilt { player: PlayerId, vertex: VertexId },
    RoadBuilt { player: PlayerId, edge: EdgeId },
    /// A road uncovered a cloud hex
    CloudRevealed { player: PlayerId, hex: HexId, resource: Resource },

    // ==================== Production & Robber ====================
    DiceRolled { player: PlayerId, roll: (u8, u8), total: u8 },
    /// Resources were distributed after a dice roll or a setup placement
    ResourcesDistributed { distributions: Vec<(PlayerId, Resource, u32)> },
    /// A dev-bonus hex paid out development cards
    DevCardsDistributed { player: PlayerId, count: u32 },
    DiscardRequired { owed: BTreeMap<PlayerId, u32> },
    CardsDiscarded { player: PlayerId, count: u32 },
    RobberMoved { player: PlayerId, from: Option<HexId>, to: HexId },
    ResourceStolen {
        thief: PlayerId,
        victim: PlayerId,
        /// Hidden from other players in snapshots
        resource: Option<Resource>,
    },
    GoldChosen { player: PlayerId, resource: Resource },

    // ==================== Development Cards ====================
    DevCardBought { player: PlayerId },
    KnightPlayed { player: PlayerId },
    MonopolyPlayed { player: PlayerId, resource: Resource, total: u32 },
    YearOfPlentyPlayed { player: PlayerId, resources: (Resource, Resource) },
    RoadBuildingPlayed { player: PlayerId },

    // ==================== Trading ====================
    TradeOffered { offer: TradeOffer },
    TradeResponded { offer_id: u32, player: PlayerId, accept: bool },
    TradeCompleted { offer_id: u32, from: PlayerId, with: PlayerId },
    TradeCancelled { offer_id: u32 },
    BankTraded {
        player: PlayerId,
        gave: Resource,
        gave_count: u32,
        received: Resource,
    },

    // ==================== Turn Management ====================
    TurnEnded { player: PlayerId, next_player: PlayerId },
    LongestRoadChanged {
        previous: Option<PlayerId>,
        current: Option<PlayerId>,
        length: u32,
    },
    LargestArmyChanged {
        previous: Option<PlayerId>,
        current: Option<PlayerId>,
        knights: u32,
    },
    GameWon { winner: Winner, victory_points: u32 },

    // ==================== Draft ====================
    DraftBidPlaced { team: TeamId, tile: String, amount: u32 },
    DraftTileAwarded { team: TeamId, tile: String, price: u32 },
    DraftTurnPassed { team: TeamId },
    DraftTilePlaced { team: TeamId, tile: String, hex: HexId },
    DraftSpellPicked { team: TeamId, spell: SpellKind },

    // ==================== Spells ====================
    SpellCast { player: PlayerId, team: TeamId, spell: SpellKind },
    /// A modifier ran out or was consumed
    ModifierExpired { team: TeamId, spell: SpellKind },
    CardsForced { player: PlayerId, target: PlayerId, count: u32 },
}

impl GameEvent {
    /// Copy of this event as `viewer` is allowed to see it
    pub fn redacted_for(&self, viewer: Option<&str>) -> GameEvent {
        match self {
            GameEvent::ResourceStolen { thief, victim, .. }
                if viewer != Some(thief.as_str()) && viewer != Some(victim.as_str()) =>
            {
                GameEvent::ResourceStolen {
                    thief: thief.clone(),
                    victim: victim.clone(),
                    resource: None,
                }
            }
            other => other.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_json_shape() {
        let cmd: Command = serde_json::from_str(r#"{"type":"build","kind":"road","edge":"e3"}"#).unwrap();
        assert_eq!(
            cmd,
            Command::Build {
                kind: BuildKind::Road,
                vertex: None,
                edge: Some("e3".into()),
            }
        );

        let cmd: Command = serde_json::from_str(r#"{"type":"reset"}"#).unwrap();
        assert_eq!(cmd, Command::Reset { keep_settings: false });
        assert_eq!(cmd.name(), "reset");
    }

    #[test]
    fn test_offer_validity() {
        let mut offer = TradeOffer {
            id: 0,
            from: "a".into(),
            to: None,
            give: ResourceHand::with_amounts(1, 0, 0, 0, 0),
            get: ResourceHand::with_amounts(0, 1, 0, 0, 0),
            accepted_by: BTreeSet::new(),
        };
        assert!(offer.is_valid());
        assert!(offer.is_open_to("b"));
        assert!(!offer.is_open_to("a"));

        offer.to = Some("c".into());
        assert!(!offer.is_open_to("b"));

        offer.give.gold = 1;
        assert!(!offer.is_valid());
    }

    #[test]
    fn test_steal_redaction() {
        let event = GameEvent::ResourceStolen {
            thief: "a".into(),
            victim: "b".into(),
            resource: Some(Resource::Ore),
        };
        assert_eq!(event.redacted_for(Some("a")), event);
        assert_eq!(event.redacted_for(Some("b")), event);
        assert!(matches!(
            event.redacted_for(Some("c")),
            GameEvent::ResourceStolen { resource: None, .. }
        ));
    }
}
