//! Core game state machine.
//!
//! This module contains the main `GameState` struct, the error type shared by
//! every command handler, the command dispatcher and the lobby/turn
//! bookkeeping. The rule-specific handlers live in their own modules and
//! extend `GameState` with further `impl` blocks:
//!
//! - [`crate::build`]: roads, settlements, cities
//! - [`crate::production`]: dice, discards, robber, gold
//! - [`crate::dev_cards`]: buying and playing development cards
//! - [`crate::trade`]: player offers and bank trades
//! - [`crate::draft`] / [`crate::spells`]: team mode
//!
//! Every handler validates first and mutates only once nothing can fail, so a
//! rejected command never changes the state.

use crate::actions::{Command, GameEvent, TradeOffer};
use crate::board::{Board, BoardError};
use crate::draft::DraftState;
use crate::graph::{EdgeId, VertexId};
use crate::player::{DevCard, Player, PlayerColor, PlayerId, TeamId};
use crate::settings::{GameSettings, SettingsError, SettingsUpdate};
use crate::spells::SpellState;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{debug, info};

/// Seats per match
pub const MAX_PLAYERS: usize = 4;

/// Players needed to start
pub const MIN_PLAYERS: usize = 2;

/// Game phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "camelCase")]
pub enum GamePhase {
    /// Roster assembly, readiness and settings
    Lobby,
    /// Team tile auction, placement and spell draft
    Draft,
    /// Two snake-ordered rounds of free placements
    Setup,
    /// Main loop
    Turn,
    /// Game is over; only a reset leaves this phase
    Finished { winner: Winner },
}

/// Who won the match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum Winner {
    Player(PlayerId),
    Team(TeamId),
}

/// What is being placed during setup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SetupStep {
    #[default]
    Settlement,
    Road,
}

/// Position in the two setup rounds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupCursor {
    /// 1 or 2
    pub round: u8,
    /// Placements finished in this round
    pub index: usize,
    pub step: SetupStep,
    /// Settlement placed in this step, which the setup road must touch
    pub last_settlement: Option<VertexId>,
}

impl Default for SetupCursor {
    fn default() -> Self {
        Self {
            round: 1,
            index: 0,
            step: SetupStep::Settlement,
            last_settlement: None,
        }
    }
}

/// Dice and the obligations a roll leaves behind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollState {
    pub has_rolled: bool,
    pub last_roll: Option<(u8, u8)>,
    /// Cards each player still owes after a 7
    pub pending_discards: BTreeMap<PlayerId, u32>,
    /// The turn-holder must move the robber
    pub awaiting_robber: bool,
    /// Gold units waiting to be converted
    pub pending_gold: BTreeMap<PlayerId, u32>,
    /// The next robber move steals twice
    pub double_steal: bool,
}

impl RollState {
    pub fn awaiting_discard(&self) -> bool {
        !self.pending_discards.is_empty()
    }
}

/// Reasons a command is rejected. The display text is sent to the player.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum GameError {
    #[error("Invalid action for current phase")]
    InvalidPhase,

    #[error("Not your turn")]
    NotYourTurn,

    #[error("You are not seated in this match")]
    UnknownPlayer,

    #[error("Player {0} is not seated in this match")]
    NoSuchPlayer(PlayerId),

    #[error("Already seated")]
    AlreadyJoined,

    #[error("Match is full")]
    MatchFull,

    #[error("Name cannot be empty")]
    EmptyName,

    #[error("Color already taken")]
    ColorTaken,

    #[error("Teams are only available in team mode")]
    TeamModeOff,

    #[error("Team {0} does not exist")]
    InvalidTeam(TeamId),

    #[error("Need at least {0} players")]
    NotEnoughPlayers(usize),

    #[error("Every player must join a team and both teams need players")]
    TeamsIncomplete,

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Board(#[from] BoardError),

    #[error("Roll the dice first")]
    MustRollFirst,

    #[error("Dice already rolled this turn")]
    AlreadyRolled,

    #[error("Waiting for discards or the robber")]
    ObligationPending,

    #[error("Choose resources for your gold first")]
    GoldPending,

    #[error("No gold to convert")]
    NoGold,

    #[error("Nothing to discard")]
    NoDiscardOwed,

    #[error("Must discard exactly {expected} cards")]
    WrongDiscardCount { expected: u32 },

    #[error("The robber is not waiting to move")]
    RobberNotPending,

    #[error("Invalid placement location")]
    InvalidLocation,

    #[error("Location already occupied")]
    Occupied,

    #[error("Too close to another settlement")]
    DistanceRule,

    #[error("Must connect to your own road or building")]
    NotConnected,

    #[error("Setup road must touch the settlement just placed")]
    SetupRoadDetached,

    #[error("Cannot afford this")]
    CannotAfford,

    #[error("No pieces remaining")]
    NoPiecesRemaining,

    #[error("No development cards left in deck")]
    EmptyDeck,

    #[error("Don't have that card")]
    NoSuchCard,

    #[error("Already played a development card this turn")]
    DevCardAlreadyPlayed,

    #[error("Invalid trade")]
    InvalidTrade,

    #[error("Gold cannot be traded")]
    GoldNotTradable,

    #[error("No such trade offer")]
    NoSuchOffer,

    #[error("That player has not accepted the offer")]
    NotAccepted,

    #[error("The robber cannot go there")]
    InvalidRobberHex,

    #[error("That hex is protected by a safe haven")]
    ProtectedHex,

    #[error("Cannot steal from that player")]
    InvalidVictim,

    #[error("Not your team's turn")]
    NotYourTeamsTurn,

    #[error("Bid must be more than {0}")]
    BidTooLow(u32),

    #[error("Not enough funds")]
    InsufficientFunds,

    #[error("Cannot pass without a standing bid")]
    NoStandingBid,

    #[error("That slot does not belong to your team")]
    NotYourSlot,

    #[error("Your team does not hold that tile")]
    TileNotOwned,

    #[error("Placement is locked")]
    PlacementLocked,

    #[error("That spell is not in the pool")]
    SpellNotInPool,

    #[error("Spells are only available in team mode")]
    SpellsDisabled,

    #[error("Your team holds no charge of that spell")]
    NoSpellCharge,

    #[error("Your team already cast a spell this round")]
    SpellAlreadyCast,

    #[error("Your team already has that effect active")]
    ModifierActive,

    #[error("Invalid spell target: {0}")]
    InvalidSpellTarget(String),

    #[error("Game is over")]
    GameOver,
}

/// The complete game state of one match
#[derive(Debug, Clone)]
pub struct GameState {
    pub settings: GameSettings,
    pub phase: GamePhase,
    pub board: Board,
    /// Seated players in seat order
    pub players: Vec<Player>,
    /// Owner of each settlement/city vertex
    pub vertex_owners: HashMap<VertexId, PlayerId>,
    /// Owner of each road edge
    pub edge_owners: HashMap<EdgeId, PlayerId>,
    /// Seat of the turn-holder in the `Turn` phase
    pub current: usize,
    /// Turn number (starts at 1)
    pub turn_number: u32,
    pub setup: SetupCursor,
    pub roll: RollState,
    /// `Start` was accepted; the game begins once everyone is ready
    pub ready_check: bool,
    pub dev_deck: Vec<DevCard>,
    pub dev_played_this_turn: bool,
    /// Type of the last development card played by anyone
    pub last_dev_card: Option<DevCard>,
    pub trade_offers: Vec<TradeOffer>,
    pub next_offer_id: u32,
    pub draft: Option<DraftState>,
    pub spells: Option<SpellState>,
    /// Every accepted event in order
    pub log: Vec<GameEvent>,
    pub(crate) rng: StdRng,
}

impl GameState {
    /// Create a new match seeded from entropy
    pub fn new() -> Result<Self, GameError> {
        Self::with_rng(GameSettings::default(), StdRng::from_entropy())
    }

    /// Create a deterministic match (tests, replays)
    pub fn with_seed(seed: u64) -> Result<Self, GameError> {
        Self::with_rng(GameSettings::default(), StdRng::seed_from_u64(seed))
    }

    fn with_rng(settings: GameSettings, mut rng: StdRng) -> Result<Self, GameError> {
        let board = Board::standard(&mut rng)?;
        let dev_deck = DevCard::shuffled_deck(&mut rng);
        Ok(Self {
            settings,
            phase: GamePhase::Lobby,
            board,
            players: Vec::new(),
            vertex_owners: HashMap::new(),
            edge_owners: HashMap::new(),
            current: 0,
            turn_number: 0,
            setup: SetupCursor::default(),
            roll: RollState::default(),
            ready_check: false,
            dev_deck,
            dev_played_this_turn: false,
            last_dev_card: None,
            trade_offers: Vec::new(),
            next_offer_id: 0,
            draft: None,
            spells: None,
            log: Vec::new(),
            rng,
        })
    }

    // ==================== Queries ====================

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn seat_of(&self, id: &str) -> Option<usize> {
        self.players.iter().position(|p| p.id == id)
    }

    pub(crate) fn seat(&self, id: &str) -> Result<usize, GameError> {
        self.seat_of(id).ok_or(GameError::UnknownPlayer)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, GamePhase::Finished { .. })
    }

    /// Seat placing during setup (round 2 runs in reverse)
    pub fn setup_seat(&self) -> usize {
        let n = self.players.len();
        match self.setup.round {
            1 => self.setup.index,
            _ => n.saturating_sub(1).saturating_sub(self.setup.index),
        }
    }

    /// The player allowed to act right now, if any
    pub fn active_player(&self) -> Option<&PlayerId> {
        let seat = match self.phase {
            GamePhase::Setup => self.setup_seat(),
            GamePhase::Turn => self.current,
            _ => return None,
        };
        self.players.get(seat).map(|p| &p.id)
    }

    /// Team of a player when team mode is on
    pub fn team_of(&self, id: &str) -> Option<TeamId> {
        if !self.settings.team_mode {
            return None;
        }
        self.player(id).and_then(|p| p.team)
    }

    /// Whether two distinct players are on the same team
    pub fn are_teammates(&self, a: &str, b: &str) -> bool {
        a != b && matches!((self.team_of(a), self.team_of(b)), (Some(x), Some(y)) if x == y)
    }

    /// Summed victory points of a team
    pub fn team_points(&self, team: TeamId) -> u32 {
        self.players
            .iter()
            .filter(|p| p.team == Some(team))
            .map(|p| p.victory_points)
            .sum()
    }

    // ==================== Command Gates ====================

    /// The actor holds the turn in the `Turn` phase; returns their seat
    pub(crate) fn require_turn_holder(&self, actor: &str) -> Result<usize, GameError> {
        if self.phase != GamePhase::Turn {
            return Err(GameError::InvalidPhase);
        }
        let seat = self.seat(actor)?;
        if seat != self.current {
            return Err(GameError::NotYourTurn);
        }
        Ok(seat)
    }

    /// No discard or robber obligation is outstanding
    pub(crate) fn require_clear_obligations(&self) -> Result<(), GameError> {
        if self.roll.awaiting_discard() || self.roll.awaiting_robber {
            return Err(GameError::ObligationPending);
        }
        Ok(())
    }

    pub(crate) fn require_no_gold(&self, actor: &str) -> Result<(), GameError> {
        if self.roll.pending_gold.get(actor).copied().unwrap_or(0) > 0 {
            return Err(GameError::GoldPending);
        }
        Ok(())
    }

    /// Gate for building, buying and trading after the roll
    pub(crate) fn require_main_action(&self, actor: &str) -> Result<usize, GameError> {
        let seat = self.require_turn_holder(actor)?;
        self.require_clear_obligations()?;
        self.require_no_gold(actor)?;
        if !self.roll.has_rolled {
            return Err(GameError::MustRollFirst);
        }
        Ok(seat)
    }

    // ==================== Dispatch ====================

    /// Apply a command on behalf of `actor`.
    ///
    /// On success the events are appended to the log and returned; derived
    /// statistics are refreshed and the game may finish. On failure the
    /// state is untouched.
    pub fn apply(&mut self, actor: &str, command: Command) -> Result<Vec<GameEvent>, GameError> {
        let command_name = command.name();
        if self.is_finished() && !matches!(command, Command::Reset { .. }) {
            return Err(GameError::GameOver);
        }

        let result = match command {
            Command::Join { name } => self.handle_join(actor, name),
            Command::Leave => self.handle_leave(actor),
            Command::SetColor { color } => self.handle_set_color(actor, color),
            Command::SetTeam { team } => self.handle_set_team(actor, team),
            Command::Ready { ready } => self.handle_ready(actor, ready),
            Command::Start => self.handle_start(actor),
            Command::UpdateSettings { settings } => self.handle_update_settings(actor, settings),
            Command::SetCustomBoard { hexes, ports } => self.handle_custom_board(actor, hexes, ports),
            Command::Reset { keep_settings } => self.handle_reset(keep_settings),
            Command::Build { kind, vertex, edge } => self.handle_build(actor, kind, vertex, edge),
            Command::Roll => self.handle_roll(actor),
            Command::EndTurn => self.handle_end_turn(actor),
            Command::Discard { resources } => self.handle_discard(actor, resources),
            Command::MoveRobber { hex, target } => self.handle_move_robber(actor, hex, target),
            Command::ChooseGold { resource } => self.handle_choose_gold(actor, resource),
            Command::BuyDevCard => self.handle_buy_dev_card(actor),
            Command::PlayKnight { hex, target } => self.handle_play_knight(actor, hex, target),
            Command::PlayMonopoly { resource } => self.handle_play_monopoly(actor, resource),
            Command::PlayYearOfPlenty { first, second } => {
                self.handle_play_year_of_plenty(actor, first, second)
            }
            Command::PlayRoadBuilding => self.handle_play_road_building(actor),
            Command::OfferTrade { to, give, get } => self.handle_offer_trade(actor, to, give, get),
            Command::RespondTrade { offer_id, accept } => {
                self.handle_respond_trade(actor, offer_id, accept)
            }
            Command::FinalizeTrade { offer_id, with } => {
                self.handle_finalize_trade(actor, offer_id, with)
            }
            Command::CancelTrade { offer_id } => self.handle_cancel_trade(actor, offer_id),
            Command::BankTrade { give, get } => self.handle_bank_trade(actor, give, get),
            Command::CastSpell { cast } => self.handle_cast_spell(actor, cast),
            Command::DraftBid { amount } => self.handle_draft_bid(actor, amount),
            Command::DraftPass => self.handle_draft_pass(actor),
            Command::PlaceDraftTile { hex, tile } => self.handle_place_draft_tile(actor, hex, tile),
            Command::DraftSpellPick { spell } => self.handle_draft_spell_pick(actor, spell),
        };

        match result {
            Ok(mut events) => {
                events.extend(self.recompute_stats());
                debug!(%actor, command = command_name, events = events.len(), "command accepted");
                self.log.extend(events.iter().cloned());
                Ok(events)
            }
            Err(err) => {
                debug!(%actor, command = command_name, %err, "command rejected");
                Err(err)
            }
        }
    }

    pub(crate) fn enter_phase(&mut self, phase: GamePhase, events: &mut Vec<GameEvent>) {
        info!(?phase, "phase changed");
        self.phase = phase.clone();
        events.push(GameEvent::PhaseChanged { phase });
    }

    // ==================== Lobby ====================

    fn require_lobby(&self) -> Result<(), GameError> {
        if self.phase != GamePhase::Lobby {
            return Err(GameError::InvalidPhase);
        }
        Ok(())
    }

    fn handle_join(&mut self, actor: &str, name: String) -> Result<Vec<GameEvent>, GameError> {
        self.require_lobby()?;
        if self.seat_of(actor).is_some() {
            return Err(GameError::AlreadyJoined);
        }
        if self.players.len() >= MAX_PLAYERS {
            return Err(GameError::MatchFull);
        }
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(GameError::EmptyName);
        }
        let taken: Vec<PlayerColor> = self.players.iter().map(|p| p.color).collect();
        let color = PlayerColor::first_free(&taken).ok_or(GameError::MatchFull)?;

        self.players.push(Player::new(actor.to_string(), name.clone(), color));
        Ok(vec![GameEvent::PlayerJoined {
            player: actor.to_string(),
            name,
            color,
        }])
    }

    fn handle_leave(&mut self, actor: &str) -> Result<Vec<GameEvent>, GameError> {
        self.require_lobby()?;
        let seat = self.seat(actor)?;
        let previous = self.ready_check;
        let player = self.players.remove(seat);
        let mut events = vec![GameEvent::PlayerLeft {
            player: actor.to_string(),
        }];
        if self.ready_check && self.players.len() < MIN_PLAYERS {
            self.ready_check = false;
        }
        if let Err(err) = self.try_begin(&mut events) {
            self.players.insert(seat, player);
            self.ready_check = previous;
            return Err(err);
        }
        Ok(events)
    }

    fn handle_set_color(&mut self, actor: &str, color: PlayerColor) -> Result<Vec<GameEvent>, GameError> {
        self.require_lobby()?;
        let seat = self.seat(actor)?;
        if self.players.iter().any(|p| p.id != actor && p.color == color) {
            return Err(GameError::ColorTaken);
        }
        self.players[seat].color = color;
        Ok(vec![GameEvent::ColorChanged {
            player: actor.to_string(),
            color,
        }])
    }

    fn handle_set_team(&mut self, actor: &str, team: Option<TeamId>) -> Result<Vec<GameEvent>, GameError> {
        self.require_lobby()?;
        let seat = self.seat(actor)?;
        if !self.settings.team_mode {
            return Err(GameError::TeamModeOff);
        }
        if let Some(t) = team {
            if t > 1 {
                return Err(GameError::InvalidTeam(t));
            }
        }
        self.players[seat].team = team;
        Ok(vec![GameEvent::TeamChanged {
            player: actor.to_string(),
            team,
        }])
    }

    fn handle_ready(&mut self, actor: &str, ready: bool) -> Result<Vec<GameEvent>, GameError> {
        self.require_lobby()?;
        let seat = self.seat(actor)?;
        let previous = self.players[seat].ready;
        self.players[seat].ready = ready;
        let mut events = vec![GameEvent::ReadyChanged {
            player: actor.to_string(),
            ready,
        }];
        if let Err(err) = self.try_begin(&mut events) {
            self.players[seat].ready = previous;
            return Err(err);
        }
        Ok(events)
    }

    fn handle_start(&mut self, actor: &str) -> Result<Vec<GameEvent>, GameError> {
        self.require_lobby()?;
        self.seat(actor)?;
        if self.players.len() < MIN_PLAYERS {
            return Err(GameError::NotEnoughPlayers(MIN_PLAYERS));
        }
        if self.settings.team_mode {
            let all_assigned = self.players.iter().all(|p| p.team.is_some());
            let has = |t: TeamId| self.players.iter().any(|p| p.team == Some(t));
            if !all_assigned || !has(0) || !has(1) {
                return Err(GameError::TeamsIncomplete);
            }
        }

        let previous = self.ready_check;
        self.ready_check = true;
        let mut events = vec![GameEvent::ReadyCheckOpened];
        if let Err(err) = self.try_begin(&mut events) {
            self.ready_check = previous;
            return Err(err);
        }
        Ok(events)
    }

    /// Leave the lobby once the ready check is open and everyone is ready.
    /// Nothing changes when the draft map cannot be built.
    fn try_begin(&mut self, events: &mut Vec<GameEvent>) -> Result<(), GameError> {
        if !self.ready_check
            || self.players.len() < MIN_PLAYERS
            || !self.players.iter().all(|p| p.ready)
        {
            return Ok(());
        }
        let draft_board = if self.settings.uses_draft() {
            Some(Board::draft_template(&mut self.rng)?)
        } else {
            None
        };

        self.ready_check = false;
        if self.settings.team_mode {
            self.spells = Some(SpellState::default());
        }
        match draft_board {
            Some(board) => {
                self.board = board;
                let mut draft = DraftState::new(&self.board, &mut self.rng);
                draft.first_picker = self.settings.spell_draft_first_team;
                self.draft = Some(draft);
                self.enter_phase(GamePhase::Draft, events);
            }
            None => self.enter_setup(events),
        }
        Ok(())
    }

    pub(crate) fn enter_setup(&mut self, events: &mut Vec<GameEvent>) {
        self.setup = SetupCursor::default();
        self.enter_phase(GamePhase::Setup, events);
    }

    fn handle_update_settings(
        &mut self,
        actor: &str,
        update: SettingsUpdate,
    ) -> Result<Vec<GameEvent>, GameError> {
        self.require_lobby()?;
        self.seat(actor)?;
        let settings = self.settings.updated(&update)?;
        self.settings = settings.clone();
        Ok(vec![GameEvent::SettingsUpdated { settings }])
    }

    fn handle_custom_board(
        &mut self,
        actor: &str,
        hexes: Vec<crate::board::HexSpec>,
        ports: Option<Vec<crate::board::PortSpec>>,
    ) -> Result<Vec<GameEvent>, GameError> {
        self.require_lobby()?;
        self.seat(actor)?;
        self.board = Board::custom(&hexes, ports)?;
        Ok(vec![GameEvent::BoardReplaced])
    }

    fn handle_reset(&mut self, keep_settings: bool) -> Result<Vec<GameEvent>, GameError> {
        let settings = if keep_settings {
            self.settings.clone()
        } else {
            GameSettings::default()
        };
        let seed: u64 = self.rng.gen();
        *self = Self::with_rng(settings, StdRng::seed_from_u64(seed))?;
        info!(keep_settings, "match reset");
        Ok(vec![GameEvent::GameReset])
    }

    // ==================== Setup & Turn Cursor ====================

    /// Move past a finished setup placement pair; enters `Turn` after the last one
    pub(crate) fn advance_setup(&mut self, events: &mut Vec<GameEvent>) {
        self.setup.step = SetupStep::Settlement;
        self.setup.last_settlement = None;
        self.setup.index += 1;
        if self.setup.index < self.players.len() {
            return;
        }
        if self.setup.round == 1 {
            self.setup.round = 2;
            self.setup.index = 0;
            return;
        }

        self.current = 0;
        self.turn_number = 1;
        // Gold from starting resources and reveals is still owed a choice
        self.roll = RollState {
            pending_gold: std::mem::take(&mut self.roll.pending_gold),
            ..RollState::default()
        };
        self.enter_phase(GamePhase::Turn, events);
    }

    fn handle_end_turn(&mut self, actor: &str) -> Result<Vec<GameEvent>, GameError> {
        let seat = self.require_turn_holder(actor)?;
        if !self.roll.has_rolled {
            return Err(GameError::MustRollFirst);
        }
        self.require_clear_obligations()?;
        if !self.roll.pending_gold.is_empty() {
            return Err(GameError::GoldPending);
        }

        let player = &mut self.players[seat];
        player.end_turn();
        player.bonus_roads = 0;
        self.trade_offers.clear();
        self.dev_played_this_turn = false;

        let mut events = Vec::new();
        if let Some(spells) = self.spells.as_mut() {
            for modifier in spells.end_turn() {
                events.push(GameEvent::ModifierExpired {
                    team: modifier.team,
                    spell: modifier.kind.spell(),
                });
            }
        }

        self.current = (self.current + 1) % self.players.len();
        self.turn_number += 1;
        self.roll = RollState {
            last_roll: self.roll.last_roll,
            ..RollState::default()
        };

        events.insert(
            0,
            GameEvent::TurnEnded {
                player: actor.to_string(),
                next_player: self.players[self.current].id.clone(),
            },
        );
        Ok(events)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::actions::BuildKind;

    /// Seat the given players and open the ready check with everyone ready
    pub fn lobby_with(seed: u64, names: &[&str]) -> GameState {
        let mut game = GameState::with_seed(seed).unwrap();
        for name in names {
            game.apply(name, Command::Join { name: name.to_string() }).unwrap();
        }
        game
    }

    /// Place both setup rounds using the first legal spots
    pub fn finish_setup(game: &mut GameState) {
        while game.phase == GamePhase::Setup {
            let actor = game.active_player().cloned().unwrap();
            let vertex = game.valid_settlement_vertices(&actor).into_iter().next().unwrap();
            game.apply(
                &actor,
                Command::Build {
                    kind: BuildKind::Settlement,
                    vertex: Some(vertex),
                    edge: None,
                },
            )
            .unwrap();
            let edge = game.valid_road_edges(&actor).into_iter().next().unwrap();
            game.apply(
                &actor,
                Command::Build {
                    kind: BuildKind::Road,
                    vertex: None,
                    edge: Some(edge),
                },
            )
            .unwrap();
        }
    }

    /// A two-player match at the start of the first turn
    pub fn turn_game(seed: u64) -> GameState {
        let mut game = lobby_with(seed, &["a", "b"]);
        game.apply("a", Command::Start).unwrap();
        game.apply("a", Command::Ready { ready: true }).unwrap();
        game.apply("b", Command::Ready { ready: true }).unwrap();
        finish_setup(&mut game);
        assert_eq!(game.phase, GamePhase::Turn);
        game
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::settings::MapMode;

    #[test]
    fn test_join_assigns_colors_and_caps_seats() {
        let mut game = lobby_with(1, &["a", "b", "c", "d"]);
        assert_eq!(game.players[1].color, PlayerColor::Blue);
        assert_eq!(
            game.apply("e", Command::Join { name: "e".into() }),
            Err(GameError::MatchFull)
        );
        assert_eq!(
            game.apply("a", Command::Join { name: "a".into() }),
            Err(GameError::AlreadyJoined)
        );
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut game = GameState::with_seed(1).unwrap();
        assert_eq!(
            game.apply("a", Command::Join { name: "  ".into() }),
            Err(GameError::EmptyName)
        );
        assert!(game.players.is_empty());
    }

    #[test]
    fn test_start_needs_two_players() {
        let mut game = lobby_with(1, &["a"]);
        assert_eq!(game.apply("a", Command::Start), Err(GameError::NotEnoughPlayers(2)));
    }

    #[test]
    fn test_readiness_before_start_counts() {
        let mut game = lobby_with(1, &["a", "b"]);
        game.apply("a", Command::Ready { ready: true }).unwrap();
        game.apply("b", Command::Ready { ready: true }).unwrap();
        assert_eq!(game.phase, GamePhase::Lobby);
        game.apply("b", Command::Start).unwrap();
        assert_eq!(game.phase, GamePhase::Setup);
    }

    #[test]
    fn test_team_mode_start_requires_both_teams() {
        let mut game = lobby_with(1, &["a", "b"]);
        game.apply(
            "a",
            Command::UpdateSettings {
                settings: SettingsUpdate {
                    team_mode: Some(true),
                    ..Default::default()
                },
            },
        )
        .unwrap();
        game.apply("a", Command::SetTeam { team: Some(0) }).unwrap();
        game.apply("b", Command::SetTeam { team: Some(0) }).unwrap();
        assert_eq!(game.apply("a", Command::Start), Err(GameError::TeamsIncomplete));

        game.apply("b", Command::SetTeam { team: Some(1) }).unwrap();
        assert!(game.apply("a", Command::Start).is_ok());
    }

    #[test]
    fn test_set_team_requires_team_mode() {
        let mut game = lobby_with(1, &["a", "b"]);
        assert_eq!(
            game.apply("a", Command::SetTeam { team: Some(0) }),
            Err(GameError::TeamModeOff)
        );
    }

    #[test]
    fn test_settings_are_lobby_only() {
        let mut game = turn_game(2);
        let update = SettingsUpdate {
            win_points: Some(5),
            ..Default::default()
        };
        assert_eq!(
            game.apply("a", Command::UpdateSettings { settings: update }),
            Err(GameError::InvalidPhase)
        );
    }

    #[test]
    fn test_setup_snake_order() {
        let mut game = lobby_with(3, &["a", "b", "c"]);
        game.apply("a", Command::Start).unwrap();
        for id in ["a", "b", "c"] {
            game.apply(id, Command::Ready { ready: true }).unwrap();
        }
        let mut order = Vec::new();
        while game.phase == GamePhase::Setup {
            let actor = game.active_player().cloned().unwrap();
            order.push(actor.clone());
            let vertex = game.valid_settlement_vertices(&actor).into_iter().next().unwrap();
            game.apply(
                &actor,
                Command::Build {
                    kind: crate::actions::BuildKind::Settlement,
                    vertex: Some(vertex),
                    edge: None,
                },
            )
            .unwrap();
            let edge = game.valid_road_edges(&actor).into_iter().next().unwrap();
            game.apply(
                &actor,
                Command::Build {
                    kind: crate::actions::BuildKind::Road,
                    vertex: None,
                    edge: Some(edge),
                },
            )
            .unwrap();
        }
        assert_eq!(order, vec!["a", "b", "c", "c", "b", "a"]);
        assert_eq!(game.current, 0);
        assert!(!game.roll.has_rolled);
    }

    #[test]
    fn test_setup_gold_is_chosen_during_first_turn() {
        let mut game = lobby_with(7, &["a", "b"]);
        let hexes = crate::hex::HexCoord::new(0, 0)
            .spiral(2)
            .into_iter()
            .map(|c| {
                crate::board::HexSpec::new(
                    c.q,
                    c.r,
                    crate::board::TileKind::Resource(crate::board::Resource::Gold),
                    Some(5),
                )
            })
            .collect();
        game.apply("a", Command::SetCustomBoard { hexes, ports: None }).unwrap();
        game.apply("a", Command::Start).unwrap();
        game.apply("a", Command::Ready { ready: true }).unwrap();
        game.apply("b", Command::Ready { ready: true }).unwrap();
        finish_setup(&mut game);

        assert_eq!(game.phase, GamePhase::Turn);
        let owed = game.players[0].resources.gold;
        assert!(owed > 0);
        assert_eq!(game.roll.pending_gold.get("a"), Some(&owed));
        assert_eq!(game.apply("a", Command::Roll), Err(GameError::GoldPending));

        for _ in 0..owed {
            game.apply(
                "a",
                Command::ChooseGold {
                    resource: crate::board::Resource::Ore,
                },
            )
            .unwrap();
        }
        assert_eq!(game.players[0].resources.ore, owed);
        assert!(!game.roll.pending_gold.contains_key("a"));
        game.apply(
            "b",
            Command::ChooseGold {
                resource: crate::board::Resource::Wool,
            },
        )
        .unwrap();
        assert_eq!(game.players[1].resources.wool, 1);
        assert!(game.apply("a", Command::Roll).is_ok());
    }

    #[test]
    fn test_end_turn_requires_roll() {
        let mut game = turn_game(4);
        assert_eq!(game.apply("a", Command::EndTurn), Err(GameError::MustRollFirst));
        assert_eq!(game.apply("b", Command::EndTurn), Err(GameError::NotYourTurn));
    }

    #[test]
    fn test_reset_keeps_settings_on_request() {
        let mut game = lobby_with(5, &["a", "b"]);
        game.apply(
            "a",
            Command::UpdateSettings {
                settings: SettingsUpdate {
                    win_points: Some(8),
                    team_mode: Some(true),
                    map_mode: Some(MapMode::Draft),
                    ..Default::default()
                },
            },
        )
        .unwrap();

        game.apply("a", Command::Reset { keep_settings: true }).unwrap();
        assert_eq!(game.phase, GamePhase::Lobby);
        assert!(game.players.is_empty());
        assert_eq!(game.settings.win_points, 8);
        assert_eq!(game.log, vec![GameEvent::GameReset]);

        game.apply("x", Command::Reset { keep_settings: false }).unwrap();
        assert_eq!(game.settings, GameSettings::default());
    }

    #[test]
    fn test_rejected_command_leaves_log_untouched() {
        let mut game = lobby_with(6, &["a", "b"]);
        let before = game.log.len();
        assert!(game.apply("zz", Command::Leave).is_err());
        assert_eq!(game.log.len(), before);
    }
}
