//! Team draft: tile auction, island placement and the spell draft.
//!
//! The draft runs between the lobby and setup when a team match uses the
//! draft map. Teams first bid play money for a pool of tiles, then fill
//! their own island's placeholder slots with what they won, then pick spells
//! in snake order.

use crate::actions::GameEvent;
use crate::board::{Board, Resource, TileKind, STANDARD_NUMBERS};
use crate::game::{GameError, GamePhase, GameState};
use crate::graph::HexId;
use crate::player::TeamId;
use crate::spells::SpellKind;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Tiles auctioned per match
pub const POOL_SIZE: usize = 12;
/// Starting funds of each team
pub const TEAM_FUNDS: u32 = 100;
pub const MIN_BID: u32 = 1;
/// Once a team wins this many tiles, the rest go to the other team
pub const TILE_CAP: usize = 6;
/// Distinct spells offered in the spell draft
pub const SPELL_POOL_SIZE: usize = 8;
/// Spells each team picks
pub const SPELL_QUOTA: usize = 3;

/// Draw weights for auctioned tiles
const TILE_WEIGHTS: [(TileKind, u32); 7] = [
    (TileKind::Resource(Resource::Brick), 3),
    (TileKind::Resource(Resource::Lumber), 3),
    (TileKind::Resource(Resource::Wool), 3),
    (TileKind::Resource(Resource::Grain), 3),
    (TileKind::Resource(Resource::Ore), 3),
    (TileKind::Resource(Resource::Gold), 1),
    (TileKind::DevBonus, 1),
];

fn other(team: TeamId) -> TeamId {
    1 - team
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftTile {
    pub id: String,
    pub kind: TileKind,
    pub number: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DraftStage {
    Auction,
    Placement,
    Spells,
    Complete,
}

/// State of the tile currently on the block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auction {
    /// Index into the pool
    pub tile: usize,
    /// Team that must bid or pass
    pub turn: TeamId,
    /// Highest bid so far
    pub high_bid: Option<(TeamId, u32)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftState {
    pub stage: DraftStage,
    pub pool: Vec<DraftTile>,
    pub auction: Auction,
    pub funds: [u32; 2],
    /// Tile ids won by each team
    pub won: [Vec<String>; 2],
    /// Placeholder hexes belonging to each team's island
    pub slots: [Vec<HexId>; 2],
    /// Slot hex -> tile id
    pub placements: BTreeMap<HexId, String>,
    pub locked: [bool; 2],
    pub spell_pool: Vec<SpellKind>,
    pub spell_picks: usize,
    pub first_picker: TeamId,
}

impl DraftState {
    pub fn new(board: &Board, rng: &mut StdRng) -> Self {
        let weights = WeightedIndex::new(TILE_WEIGHTS.iter().map(|(_, w)| *w));
        let mut numbers = STANDARD_NUMBERS.to_vec();
        numbers.shuffle(rng);

        let pool = (0..POOL_SIZE)
            .map(|i| {
                let kind = match &weights {
                    Ok(dist) => TILE_WEIGHTS[dist.sample(rng)].0,
                    Err(_) => TileKind::Resource(Resource::Grain),
                };
                DraftTile {
                    id: format!("t{i}"),
                    kind,
                    number: numbers.get(i).copied(),
                }
            })
            .collect();

        let slot_tiles: Vec<_> = board.tiles.iter().filter(|t| t.placeholder).collect();
        let centroid = if slot_tiles.is_empty() {
            0.0
        } else {
            slot_tiles.iter().map(|t| t.center.1).sum::<f64>() / slot_tiles.len() as f64
        };
        let mut slots: [Vec<HexId>; 2] = Default::default();
        for tile in slot_tiles {
            let team = if tile.center.1 < centroid { 0 } else { 1 };
            slots[team].push(tile.id.clone());
        }

        let spell_pool = SpellKind::ALL
            .choose_multiple(rng, SPELL_POOL_SIZE)
            .copied()
            .collect();

        Self {
            stage: DraftStage::Auction,
            pool,
            auction: Auction {
                tile: 0,
                turn: 0,
                high_bid: None,
            },
            funds: [TEAM_FUNDS; 2],
            won: Default::default(),
            slots,
            placements: BTreeMap::new(),
            locked: [false; 2],
            spell_pool,
            spell_picks: 0,
            first_picker: 0,
        }
    }

    pub fn current_tile(&self) -> Option<&DraftTile> {
        match self.stage {
            DraftStage::Auction => self.pool.get(self.auction.tile),
            _ => None,
        }
    }

    /// Team picking the `n`th spell: f, o, o, f, f, o
    pub fn spell_picker(&self, n: usize) -> TeamId {
        let forward = (n / 2) % 2 == 0;
        if forward == (n % 2 == 0) {
            self.first_picker
        } else {
            other(self.first_picker)
        }
    }

    fn award(&mut self, team: TeamId, price: u32, events: &mut Vec<GameEvent>) {
        let Some(tile) = self.pool.get(self.auction.tile) else {
            return;
        };
        let id = tile.id.clone();
        self.funds[team as usize] = self.funds[team as usize].saturating_sub(price);
        self.won[team as usize].push(id.clone());
        events.push(GameEvent::DraftTileAwarded { team, tile: id, price });

        self.auction.tile += 1;
        self.auction.turn = (self.auction.tile % 2) as TeamId;
        self.auction.high_bid = None;
    }

    /// Resolve tiles that need no bidding, until a team can act or the pool runs out
    fn settle(&mut self, events: &mut Vec<GameEvent>) {
        while self.auction.tile < self.pool.len() {
            if let Some(full) = (0..=1).find(|t| self.won[*t as usize].len() >= TILE_CAP) {
                self.award(other(full), 0, events);
                continue;
            }
            if self.auction.high_bid.is_some() {
                return;
            }
            let turn = self.auction.turn;
            if self.funds[turn as usize] >= MIN_BID {
                return;
            }
            if self.funds[other(turn) as usize] >= MIN_BID {
                self.auction.turn = other(turn);
                events.push(GameEvent::DraftTurnPassed { team: turn });
                return;
            }
            let poorer = if self.won[1].len() < self.won[0].len() { 1 } else { 0 };
            self.award(poorer, 0, events);
        }
        self.stage = DraftStage::Placement;
    }

    fn bid(&mut self, team: TeamId, amount: u32) -> Result<Vec<GameEvent>, GameError> {
        if self.stage != DraftStage::Auction {
            return Err(GameError::InvalidPhase);
        }
        if team != self.auction.turn {
            return Err(GameError::NotYourTeamsTurn);
        }
        let floor = self.auction.high_bid.map_or(MIN_BID - 1, |(_, a)| a);
        if amount <= floor {
            return Err(GameError::BidTooLow(floor));
        }
        if amount > self.funds[team as usize] {
            return Err(GameError::InsufficientFunds);
        }

        let tile = self.pool[self.auction.tile].id.clone();
        self.auction.high_bid = Some((team, amount));
        self.auction.turn = other(team);
        Ok(vec![GameEvent::DraftBidPlaced { team, tile, amount }])
    }

    fn pass(&mut self, team: TeamId) -> Result<Vec<GameEvent>, GameError> {
        if self.stage != DraftStage::Auction {
            return Err(GameError::InvalidPhase);
        }
        if team != self.auction.turn {
            return Err(GameError::NotYourTeamsTurn);
        }
        let (winner, price) = self.auction.high_bid.ok_or(GameError::NoStandingBid)?;

        let mut events = Vec::new();
        self.award(winner, price, &mut events);
        self.settle(&mut events);
        Ok(events)
    }

    fn place(&mut self, board: &mut Board, team: TeamId, hex: HexId, tile: String) -> Result<Vec<GameEvent>, GameError> {
        if self.stage != DraftStage::Placement {
            return Err(GameError::InvalidPhase);
        }
        let t = team as usize;
        if self.locked[t] {
            return Err(GameError::PlacementLocked);
        }
        if !self.slots[t].contains(&hex) {
            return Err(GameError::NotYourSlot);
        }
        let placed_elsewhere = self.placements.values().any(|p| *p == tile);
        if !self.won[t].contains(&tile) || placed_elsewhere {
            return Err(GameError::TileNotOwned);
        }
        let Some(drafted) = self.pool.iter().find(|d| d.id == tile).cloned() else {
            return Err(GameError::TileNotOwned);
        };
        let Some(slot) = board.tile_mut(&hex) else {
            return Err(GameError::NotYourSlot);
        };

        // A tile already in the slot goes back to the team's unplaced tiles
        slot.kind = drafted.kind;
        slot.number = drafted.number;
        slot.placeholder = false;
        self.placements.insert(hex.clone(), tile.clone());
        if self.slots[t].iter().all(|s| self.placements.contains_key(s)) {
            self.locked[t] = true;
        }
        if self.locked == [true, true] {
            self.stage = DraftStage::Spells;
            info!("draft map complete");
        }
        Ok(vec![GameEvent::DraftTilePlaced { team, tile, hex }])
    }
}

impl GameState {
    /// The actor's team and the running draft
    fn draft_team(&self, actor: &str) -> Result<TeamId, GameError> {
        if self.phase != GamePhase::Draft || self.draft.is_none() {
            return Err(GameError::InvalidPhase);
        }
        self.seat(actor)?;
        self.team_of(actor).ok_or(GameError::NotYourTeamsTurn)
    }

    pub(crate) fn handle_draft_bid(&mut self, actor: &str, amount: u32) -> Result<Vec<GameEvent>, GameError> {
        let team = self.draft_team(actor)?;
        let draft = self.draft.as_mut().ok_or(GameError::InvalidPhase)?;
        draft.bid(team, amount)
    }

    pub(crate) fn handle_draft_pass(&mut self, actor: &str) -> Result<Vec<GameEvent>, GameError> {
        let team = self.draft_team(actor)?;
        let draft = self.draft.as_mut().ok_or(GameError::InvalidPhase)?;
        draft.pass(team)
    }

    pub(crate) fn handle_place_draft_tile(
        &mut self,
        actor: &str,
        hex: HexId,
        tile: String,
    ) -> Result<Vec<GameEvent>, GameError> {
        let team = self.draft_team(actor)?;
        let draft = self.draft.as_mut().ok_or(GameError::InvalidPhase)?;
        draft.place(&mut self.board, team, hex, tile)
    }

    pub(crate) fn handle_draft_spell_pick(&mut self, actor: &str, spell: SpellKind) -> Result<Vec<GameEvent>, GameError> {
        let team = self.draft_team(actor)?;
        let draft = self.draft.as_mut().ok_or(GameError::InvalidPhase)?;
        if draft.stage != DraftStage::Spells {
            return Err(GameError::InvalidPhase);
        }
        if draft.spell_picker(draft.spell_picks) != team {
            return Err(GameError::NotYourTeamsTurn);
        }
        let index = draft
            .spell_pool
            .iter()
            .position(|s| *s == spell)
            .ok_or(GameError::SpellNotInPool)?;

        draft.spell_pool.remove(index);
        draft.spell_picks += 1;
        let done = draft.spell_picks >= 2 * SPELL_QUOTA;
        if done {
            draft.stage = DraftStage::Complete;
        }
        self.spells.get_or_insert_with(Default::default).charges[team as usize].push(spell);

        let mut events = vec![GameEvent::DraftSpellPicked { team, spell }];
        if done {
            self.enter_setup(&mut events);
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Command;
    use crate::game::test_support::*;
    use crate::settings::{MapMode, SettingsUpdate};

    /// Two-player draft match: "a" on team 0, "b" on team 1
    fn draft_game(seed: u64) -> GameState {
        let mut game = lobby_with(seed, &["a", "b"]);
        game.apply(
            "a",
            Command::UpdateSettings {
                settings: SettingsUpdate {
                    team_mode: Some(true),
                    map_mode: Some(MapMode::Draft),
                    ..Default::default()
                },
            },
        )
        .unwrap();
        game.apply("a", Command::SetTeam { team: Some(0) }).unwrap();
        game.apply("b", Command::SetTeam { team: Some(1) }).unwrap();
        game.apply("a", Command::Start).unwrap();
        game.apply("a", Command::Ready { ready: true }).unwrap();
        game.apply("b", Command::Ready { ready: true }).unwrap();
        assert_eq!(game.phase, GamePhase::Draft);
        game
    }

    fn member(team: TeamId) -> &'static str {
        if team == 0 {
            "a"
        } else {
            "b"
        }
    }

    fn draft(game: &GameState) -> &DraftState {
        game.draft.as_ref().unwrap()
    }

    /// Sell the tile on the block to `winner` for as little as possible
    fn sell_to(game: &mut GameState, winner: TeamId) {
        let opener = draft(game).auction.turn;
        if opener == winner {
            game.apply(member(winner), Command::DraftBid { amount: 1 }).unwrap();
        } else {
            game.apply(member(opener), Command::DraftBid { amount: 1 }).unwrap();
            game.apply(member(winner), Command::DraftBid { amount: 2 }).unwrap();
        }
        game.apply(member(other(winner)), Command::DraftPass).unwrap();
    }

    #[test]
    fn test_draft_starts_with_pool_and_slots() {
        let game = draft_game(80);
        let draft = draft(&game);
        assert_eq!(draft.pool.len(), POOL_SIZE);
        assert_eq!(draft.slots[0].len(), TILE_CAP);
        assert_eq!(draft.slots[1].len(), TILE_CAP);
        assert_eq!(draft.spell_pool.len(), SPELL_POOL_SIZE);
        assert_eq!(draft.auction.turn, 0);
    }

    #[test]
    fn test_pass_needs_standing_bid() {
        let mut game = draft_game(81);
        assert_eq!(game.apply("a", Command::DraftPass), Err(GameError::NoStandingBid));
        assert_eq!(
            game.apply("b", Command::DraftBid { amount: 5 }),
            Err(GameError::NotYourTeamsTurn)
        );
    }

    #[test]
    fn test_bids_must_rise_within_funds() {
        let mut game = draft_game(82);
        assert_eq!(
            game.apply("a", Command::DraftBid { amount: 101 }),
            Err(GameError::InsufficientFunds)
        );
        game.apply("a", Command::DraftBid { amount: 10 }).unwrap();
        assert_eq!(
            game.apply("b", Command::DraftBid { amount: 10 }),
            Err(GameError::BidTooLow(10))
        );
        game.apply("b", Command::DraftPass).unwrap();

        let draft = draft(&game);
        assert_eq!(draft.funds, [90, 100]);
        assert_eq!(draft.won[0], vec!["t0".to_string()]);
        assert_eq!(draft.auction.tile, 1);
        assert_eq!(draft.auction.turn, 1);
    }

    #[test]
    fn test_broke_team_hands_over_the_turn() {
        let mut game = draft_game(83);
        game.apply("a", Command::DraftBid { amount: 100 }).unwrap();
        game.apply("b", Command::DraftPass).unwrap();
        // Tile 1 opens with team 1, tile 2 would open with team 0 who is broke
        sell_to(&mut game, 1);
        let draft = draft(&game);
        assert_eq!(draft.funds[0], 0);
        assert_eq!(draft.auction.turn, 1);
        assert!(draft.funds.iter().all(|f| *f <= TEAM_FUNDS));
    }

    #[test]
    fn test_cap_awards_remainder() {
        let mut game = draft_game(84);
        for _ in 0..TILE_CAP {
            sell_to(&mut game, 0);
        }
        let draft = draft(&game);
        assert_eq!(draft.won[0].len(), TILE_CAP);
        assert_eq!(draft.won[1].len(), POOL_SIZE - TILE_CAP);
        assert_eq!(draft.stage, DraftStage::Placement);
    }

    fn finish_auction(game: &mut GameState) {
        for i in 0..TILE_CAP {
            sell_to(game, (i % 2) as TeamId);
        }
        while draft(game).stage == DraftStage::Auction {
            let turn = draft(game).auction.turn;
            sell_to(game, turn);
        }
    }

    #[test]
    fn test_placement_rules() {
        let mut game = draft_game(85);
        finish_auction(&mut game);
        let d = draft(&game).clone();
        let own_slot = d.slots[0][0].clone();
        let their_slot = d.slots[1][0].clone();
        let tile = d.won[0][0].clone();

        assert_eq!(
            game.apply(
                "a",
                Command::PlaceDraftTile {
                    hex: their_slot,
                    tile: tile.clone()
                }
            ),
            Err(GameError::NotYourSlot)
        );
        assert_eq!(
            game.apply(
                "a",
                Command::PlaceDraftTile {
                    hex: own_slot.clone(),
                    tile: d.won[1][0].clone()
                }
            ),
            Err(GameError::TileNotOwned)
        );

        game.apply(
            "a",
            Command::PlaceDraftTile {
                hex: own_slot.clone(),
                tile: tile.clone(),
            },
        )
        .unwrap();
        let placed = game.board.tile(&own_slot).unwrap();
        assert!(!placed.placeholder);
        let drafted = d.pool.iter().find(|t| t.id == tile).unwrap();
        assert_eq!(placed.kind, drafted.kind);

        // Swapping a different tile into the same slot frees the first one
        game.apply(
            "a",
            Command::PlaceDraftTile {
                hex: own_slot.clone(),
                tile: d.won[0][1].clone(),
            },
        )
        .unwrap();
        assert_eq!(draft(&game).placements.get(&own_slot), Some(&d.won[0][1]));
        assert!(!draft(&game).placements.values().any(|t| *t == tile));
    }

    fn fill_islands(game: &mut GameState) {
        for team in 0..=1u8 {
            let d = draft(game).clone();
            for (slot, tile) in d.slots[team as usize].iter().zip(&d.won[team as usize]) {
                game.apply(
                    member(team),
                    Command::PlaceDraftTile {
                        hex: slot.clone(),
                        tile: tile.clone(),
                    },
                )
                .unwrap();
            }
        }
    }

    #[test]
    fn test_full_islands_lock_and_open_spell_draft() {
        let mut game = draft_game(86);
        finish_auction(&mut game);
        fill_islands(&mut game);

        let d = draft(&game).clone();
        assert_eq!(d.locked, [true, true]);
        assert_eq!(d.stage, DraftStage::Spells);
        assert!(game.board.tiles.iter().all(|t| !t.placeholder));
        assert_eq!(
            game.apply(
                "a",
                Command::PlaceDraftTile {
                    hex: d.slots[0][0].clone(),
                    tile: d.won[0][1].clone()
                }
            ),
            Err(GameError::PlacementLocked)
        );
    }

    #[test]
    fn test_spell_draft_snake_order_enters_setup() {
        let mut game = draft_game(87);
        finish_auction(&mut game);
        fill_islands(&mut game);

        let expected = [0, 1, 1, 0, 0, 1];
        for (n, team) in expected.iter().enumerate() {
            assert_eq!(draft(&game).spell_picker(n), *team);
            let spell = draft(&game).spell_pool[0];
            if n == 0 {
                assert_eq!(
                    game.apply("b", Command::DraftSpellPick { spell }),
                    Err(GameError::NotYourTeamsTurn)
                );
            }
            game.apply(member(*team), Command::DraftSpellPick { spell }).unwrap();
        }

        assert_eq!(game.phase, GamePhase::Setup);
        let spells = game.spells.as_ref().unwrap();
        assert_eq!(spells.charges[0].len(), SPELL_QUOTA);
        assert_eq!(spells.charges[1].len(), SPELL_QUOTA);
        assert_eq!(draft(&game).spell_pool.len(), SPELL_POOL_SIZE - 2 * SPELL_QUOTA);
    }
}
