//! Team spells.
//!
//! A spell is a one-shot team ability drafted before setup. Casting happens
//! on the caster's own turn before the roll, at most once per team per round.
//! Spells either act immediately or install a [`Modifier`] that later rules
//! consult and consume.

use crate::actions::GameEvent;
use crate::board::{Resource, TileKind};
use crate::game::{GameError, GameState};
use crate::graph::HexId;
use crate::player::{costs, DevCard, PlayerId, ResourceHand, TeamId};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Turns a safe haven protects its hex
pub const SAFE_HAVEN_TURNS: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SpellKind {
    SwapNumbers,
    ShiftNumber,
    RotateHexes,
    SafeHaven,
    ForcedNumber,
    Reroll,
    GoldRush,
    Transmute,
    CheapTrade,
    Substitute,
    HarborGift,
    DoubleSteal,
    LateRobber,
    ForcedDiscard,
    Echo,
}

impl SpellKind {
    pub const ALL: [SpellKind; 15] = [
        SpellKind::SwapNumbers,
        SpellKind::ShiftNumber,
        SpellKind::RotateHexes,
        SpellKind::SafeHaven,
        SpellKind::ForcedNumber,
        SpellKind::Reroll,
        SpellKind::GoldRush,
        SpellKind::Transmute,
        SpellKind::CheapTrade,
        SpellKind::Substitute,
        SpellKind::HarborGift,
        SpellKind::DoubleSteal,
        SpellKind::LateRobber,
        SpellKind::ForcedDiscard,
        SpellKind::Echo,
    ];
}

/// A spell together with its targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "spell", rename_all = "camelCase")]
pub enum SpellCast {
    SwapNumbers { hex_a: HexId, hex_b: HexId },
    ShiftNumber { hex: HexId, up: bool },
    RotateHexes { hexes: [HexId; 3] },
    SafeHaven { hex: HexId },
    ForcedNumber { number: u8 },
    Reroll,
    GoldRush,
    Transmute { from: Resource, to: Resource },
    CheapTrade,
    Substitute { waive: Resource, pay_with: Resource },
    HarborGift { teammate: PlayerId },
    DoubleSteal,
    LateRobber,
    ForcedDiscard {
        target: PlayerId,
        first: Resource,
        second: Resource,
    },
    Echo {
        #[serde(default)]
        first: Option<Resource>,
        #[serde(default)]
        second: Option<Resource>,
    },
}

impl SpellCast {
    pub fn kind(&self) -> SpellKind {
        match self {
            SpellCast::SwapNumbers { .. } => SpellKind::SwapNumbers,
            SpellCast::ShiftNumber { .. } => SpellKind::ShiftNumber,
            SpellCast::RotateHexes { .. } => SpellKind::RotateHexes,
            SpellCast::SafeHaven { .. } => SpellKind::SafeHaven,
            SpellCast::ForcedNumber { .. } => SpellKind::ForcedNumber,
            SpellCast::Reroll => SpellKind::Reroll,
            SpellCast::GoldRush => SpellKind::GoldRush,
            SpellCast::Transmute { .. } => SpellKind::Transmute,
            SpellCast::CheapTrade => SpellKind::CheapTrade,
            SpellCast::Substitute { .. } => SpellKind::Substitute,
            SpellCast::HarborGift { .. } => SpellKind::HarborGift,
            SpellCast::DoubleSteal => SpellKind::DoubleSteal,
            SpellCast::LateRobber => SpellKind::LateRobber,
            SpellCast::ForcedDiscard { .. } => SpellKind::ForcedDiscard,
            SpellCast::Echo { .. } => SpellKind::Echo,
        }
    }
}

/// When an installed modifier goes away
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "turns", rename_all = "camelCase")]
pub enum Lifetime {
    /// Removed when the rule it changes is applied
    UntilUsed,
    /// Removed when the current turn ends (or earlier, when used)
    EndOfTurn,
    /// Removed after this many turn ends
    Turns(u32),
}

/// Rule change left behind by a spell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ModifierKind {
    SafeHaven { hex: HexId },
    ForcedNumber { number: u8 },
    Reroll,
    GoldRush,
    CheapTrade,
    Substitute { waive: Resource, pay_with: Resource },
    HarborGift { teammate: PlayerId },
    DoubleSteal,
    LateRobber,
}

impl ModifierKind {
    /// Spell that installs this modifier
    pub fn spell(&self) -> SpellKind {
        match self {
            ModifierKind::SafeHaven { .. } => SpellKind::SafeHaven,
            ModifierKind::ForcedNumber { .. } => SpellKind::ForcedNumber,
            ModifierKind::Reroll => SpellKind::Reroll,
            ModifierKind::GoldRush => SpellKind::GoldRush,
            ModifierKind::CheapTrade => SpellKind::CheapTrade,
            ModifierKind::Substitute { .. } => SpellKind::Substitute,
            ModifierKind::HarborGift { .. } => SpellKind::HarborGift,
            ModifierKind::DoubleSteal => SpellKind::DoubleSteal,
            ModifierKind::LateRobber => SpellKind::LateRobber,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifier {
    pub team: TeamId,
    pub caster: PlayerId,
    pub kind: ModifierKind,
    pub lifetime: Lifetime,
}

/// Spell bookkeeping for both teams
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellState {
    /// Unspent charges per team (a multiset)
    pub charges: [Vec<SpellKind>; 2],
    pub cast_this_round: [bool; 2],
    /// Rolls since the cast flags were last cleared
    pub rolls_this_round: usize,
    pub modifiers: Vec<Modifier>,
}

impl SpellState {
    /// Count a roll; once every seat has rolled, both teams may cast again
    pub fn note_roll(&mut self, seats: usize) {
        self.rolls_this_round += 1;
        if self.rolls_this_round >= seats {
            self.rolls_this_round = 0;
            self.cast_this_round = [false; 2];
        }
    }

    /// Age modifiers at a turn end and return the ones that expired
    pub fn end_turn(&mut self) -> Vec<Modifier> {
        let mut expired = Vec::new();
        let mut kept = Vec::new();
        for mut modifier in self.modifiers.drain(..) {
            let done = match &mut modifier.lifetime {
                Lifetime::UntilUsed => false,
                Lifetime::EndOfTurn => true,
                Lifetime::Turns(n) => {
                    *n = n.saturating_sub(1);
                    *n == 0
                }
            };
            if done {
                expired.push(modifier);
            } else {
                kept.push(modifier);
            }
        }
        self.modifiers = kept;
        expired
    }

    pub fn has_modifier(&self, team: TeamId, spell: SpellKind) -> bool {
        self.modifiers
            .iter()
            .any(|m| m.team == team && m.kind.spell() == spell)
    }

    fn has_charge(&self, team: TeamId, spell: SpellKind) -> bool {
        self.charges[team as usize].contains(&spell)
    }

    fn spend_charge(&mut self, team: TeamId, spell: SpellKind) {
        let charges = &mut self.charges[team as usize];
        if let Some(pos) = charges.iter().position(|s| *s == spell) {
            charges.remove(pos);
        }
        self.cast_this_round[team as usize] = true;
    }
}

fn invalid(reason: &str) -> GameError {
    GameError::InvalidSpellTarget(reason.to_string())
}

fn is_hot(number: u8) -> bool {
    matches!(number, 6..=8)
}

impl GameState {
    // ==================== Modifier Hooks ====================

    fn remove_modifier(&mut self, index: usize, events: &mut Vec<GameEvent>) -> Option<ModifierKind> {
        let spells = self.spells.as_mut()?;
        let modifier = spells.modifiers.remove(index);
        events.push(GameEvent::ModifierExpired {
            team: modifier.team,
            spell: modifier.kind.spell(),
        });
        Some(modifier.kind)
    }

    /// Remove the caster's modifier of the given spell, if any
    pub(crate) fn consume_modifier(
        &mut self,
        caster: &str,
        spell: SpellKind,
        events: &mut Vec<GameEvent>,
    ) -> Option<ModifierKind> {
        let index = self
            .spells
            .as_ref()?
            .modifiers
            .iter()
            .position(|m| m.caster == caster && m.kind.spell() == spell)?;
        self.remove_modifier(index, events)
    }

    pub fn is_safe_haven(&self, hex: &str) -> bool {
        self.spells.as_ref().is_some_and(|s| {
            s.modifiers
                .iter()
                .any(|m| matches!(&m.kind, ModifierKind::SafeHaven { hex: h } if h == hex))
        })
    }

    /// On a 2 or 12, every member of a gold-rushing team with a building gets one gold
    pub(crate) fn gold_rush_payout(&mut self, total: u8) -> Vec<GameEvent> {
        if total != 2 && total != 12 {
            return Vec::new();
        }
        let Some(spells) = self.spells.as_ref() else {
            return Vec::new();
        };
        let teams: Vec<TeamId> = spells
            .modifiers
            .iter()
            .filter(|m| m.kind == ModifierKind::GoldRush)
            .map(|m| m.team)
            .collect();

        let seats: Vec<usize> = (0..self.players.len())
            .filter(|&i| {
                let p = &self.players[i];
                p.has_building() && p.team.is_some_and(|t| teams.contains(&t))
            })
            .collect();
        let mut distributions = Vec::new();
        for seat in seats {
            self.grant_resource(seat, Resource::Gold, 1);
            distributions.push((self.players[seat].id.clone(), Resource::Gold, 1));
        }
        if distributions.is_empty() {
            return Vec::new();
        }
        vec![GameEvent::ResourcesDistributed { distributions }]
    }

    fn substitute_for(&self, actor: &str) -> Option<(Resource, Resource)> {
        self.spells.as_ref()?.modifiers.iter().find_map(|m| match &m.kind {
            ModifierKind::Substitute { waive, pay_with } if m.caster == actor => Some((*waive, *pay_with)),
            _ => None,
        })
    }

    /// Settlement price for `actor`, and whether a substitution applied
    pub(crate) fn settlement_cost(&self, actor: &str) -> (ResourceHand, bool) {
        let mut cost = costs::settlement();
        match self.substitute_for(actor) {
            Some((waive, pay_with)) => {
                cost.set(waive, cost.get(waive).saturating_sub(1));
                cost.add(pay_with, 1);
                (cost, true)
            }
            None => (cost, false),
        }
    }

    pub(crate) fn consume_substitute(&mut self, actor: &str) -> Vec<GameEvent> {
        let mut events = Vec::new();
        self.consume_modifier(actor, SpellKind::Substitute, &mut events);
        events
    }

    fn trade_discount_index(&self, actor: &str) -> Option<usize> {
        let modifiers = &self.spells.as_ref()?.modifiers;
        modifiers
            .iter()
            .position(|m| m.kind == ModifierKind::CheapTrade && m.caster == actor)
            .or_else(|| {
                modifiers.iter().position(
                    |m| matches!(&m.kind, ModifierKind::HarborGift { teammate } if teammate == actor),
                )
            })
    }

    /// `actor` may make their next bank trade at 2:1
    pub(crate) fn has_trade_discount(&self, actor: &str) -> bool {
        self.trade_discount_index(actor).is_some()
    }

    pub(crate) fn consume_trade_discount(&mut self, actor: &str, events: &mut Vec<GameEvent>) {
        if let Some(index) = self.trade_discount_index(actor) {
            self.remove_modifier(index, events);
        }
    }

    // ==================== Casting ====================

    pub(crate) fn handle_cast_spell(&mut self, actor: &str, cast: SpellCast) -> Result<Vec<GameEvent>, GameError> {
        if !self.settings.team_mode {
            return Err(GameError::SpellsDisabled);
        }
        let seat = self.require_turn_holder(actor)?;
        if self.roll.has_rolled {
            return Err(GameError::AlreadyRolled);
        }
        self.require_clear_obligations()?;
        let team = self.team_of(actor).ok_or(GameError::SpellsDisabled)?;
        let spell = cast.kind();
        let spells = self.spells.as_ref().ok_or(GameError::SpellsDisabled)?;
        if !spells.has_charge(team, spell) {
            return Err(GameError::NoSpellCharge);
        }
        if spells.cast_this_round[team as usize] {
            return Err(GameError::SpellAlreadyCast);
        }
        if spells.has_modifier(team, spell) {
            return Err(GameError::ModifierActive);
        }
        self.validate_cast(actor, seat, &cast)?;

        if let Some(spells) = self.spells.as_mut() {
            spells.spend_charge(team, spell);
        }
        debug!(%actor, team, ?spell, "spell cast");
        let mut events = vec![GameEvent::SpellCast {
            player: actor.to_string(),
            team,
            spell,
        }];
        events.extend(self.apply_cast(actor, seat, team, cast));
        Ok(events)
    }

    /// Spell-specific targeting rules; never mutates
    fn validate_cast(&self, actor: &str, seat: usize, cast: &SpellCast) -> Result<(), GameError> {
        match cast {
            SpellCast::SwapNumbers { hex_a, hex_b } => {
                if hex_a == hex_b {
                    return Err(invalid("pick two different hexes"));
                }
                if !self.board.has_cold_number(hex_a) || !self.board.has_cold_number(hex_b) {
                    return Err(invalid("both hexes need a number other than 6 or 8"));
                }
            }
            SpellCast::ShiftNumber { hex, up } => {
                if !self.board.has_cold_number(hex) {
                    return Err(invalid("hex needs a number other than 6 or 8"));
                }
                let number = self.board.tile(hex).and_then(|t| t.number).unwrap_or(0);
                match shifted(number, *up) {
                    Some(n) if !is_hot(n) => {}
                    _ => return Err(invalid("shifted number must stay in 2-12 and avoid 6, 7 and 8")),
                }
            }
            SpellCast::RotateHexes { hexes } => {
                let tiles: Vec<_> = hexes.iter().filter_map(|h| self.board.tile(h)).collect();
                if tiles.len() != 3 || tiles.iter().any(|t| !t.is_land()) {
                    return Err(invalid("rotate needs three land hexes"));
                }
                let adjacent = |a: usize, b: usize| tiles[a].coord.is_adjacent(&tiles[b].coord);
                if !(adjacent(0, 1) && adjacent(1, 2) && adjacent(0, 2)) {
                    return Err(invalid("hexes must be mutually adjacent"));
                }
            }
            SpellCast::SafeHaven { hex } => {
                if !self.board.is_land_hex(hex) {
                    return Err(invalid("safe haven needs a land hex"));
                }
            }
            SpellCast::ForcedNumber { number } => {
                if !(2..=12).contains(number) || *number == 7 {
                    return Err(invalid("number must be 2-12 and not 7"));
                }
            }
            SpellCast::Transmute { from, to } => {
                if !from.is_tradable() || !to.is_tradable() {
                    return Err(GameError::GoldNotTradable);
                }
                if from == to {
                    return Err(invalid("pick two different resources"));
                }
            }
            SpellCast::Substitute { waive, pay_with } => {
                if !waive.is_tradable() || !pay_with.is_tradable() {
                    return Err(GameError::GoldNotTradable);
                }
                if waive == pay_with || costs::settlement().get(*waive) == 0 {
                    return Err(invalid("waived resource must be part of the settlement cost"));
                }
            }
            SpellCast::HarborGift { teammate } => {
                if !self.are_teammates(actor, teammate) {
                    return Err(invalid("harbor gift goes to a teammate"));
                }
            }
            SpellCast::ForcedDiscard { target, first, second } => {
                if self.seat_of(target).is_none() {
                    return Err(GameError::NoSuchPlayer(target.clone()));
                }
                if target == actor || self.are_teammates(actor, target) {
                    return Err(invalid("target must be an opponent"));
                }
                if !first.is_tradable() || !second.is_tradable() {
                    return Err(GameError::GoldNotTradable);
                }
            }
            SpellCast::Echo { first, second } => match self.last_dev_card {
                Some(DevCard::Knight) => {
                    if !self.board.land_tiles().any(|t| {
                        self.board.robber.as_ref() != Some(&t.id) && !self.is_safe_haven(&t.id)
                    }) {
                        return Err(invalid("nowhere to move the robber"));
                    }
                }
                Some(DevCard::Monopoly) => match first {
                    Some(r) if r.is_tradable() => {}
                    Some(_) => return Err(GameError::GoldNotTradable),
                    None => return Err(invalid("name the resource to monopolize")),
                },
                Some(DevCard::YearOfPlenty) => match (first, second) {
                    (Some(a), Some(b)) if a.is_tradable() && b.is_tradable() => {}
                    (Some(_), Some(_)) => return Err(GameError::GoldNotTradable),
                    _ => return Err(invalid("name two resources")),
                },
                Some(DevCard::RoadBuilding) => {
                    if self.players[seat].roads_remaining() == 0 {
                        return Err(GameError::NoPiecesRemaining);
                    }
                }
                Some(DevCard::VictoryPoint) | None => {
                    return Err(invalid("no development card to echo"));
                }
            },
            SpellCast::Reroll
            | SpellCast::GoldRush
            | SpellCast::CheapTrade
            | SpellCast::DoubleSteal
            | SpellCast::LateRobber => {}
        }
        Ok(())
    }

    fn install(&mut self, team: TeamId, caster: &str, kind: ModifierKind, lifetime: Lifetime) {
        if let Some(spells) = self.spells.as_mut() {
            spells.modifiers.push(Modifier {
                team,
                caster: caster.to_string(),
                kind,
                lifetime,
            });
        }
    }

    fn apply_cast(&mut self, actor: &str, seat: usize, team: TeamId, cast: SpellCast) -> Vec<GameEvent> {
        let mut events = Vec::new();
        match cast {
            SpellCast::SwapNumbers { hex_a, hex_b } => {
                let a = self.board.tile(&hex_a).and_then(|t| t.number);
                let b = self.board.tile(&hex_b).and_then(|t| t.number);
                if let Some(tile) = self.board.tile_mut(&hex_a) {
                    tile.number = b;
                }
                if let Some(tile) = self.board.tile_mut(&hex_b) {
                    tile.number = a;
                }
            }
            SpellCast::ShiftNumber { hex, up } => {
                if let Some(tile) = self.board.tile_mut(&hex) {
                    tile.number = tile.number.and_then(|n| shifted(n, up));
                }
            }
            SpellCast::RotateHexes { hexes } => {
                let faces: Vec<(TileKind, Option<u8>)> = hexes
                    .iter()
                    .filter_map(|h| self.board.tile(h).map(|t| (t.kind, t.number)))
                    .collect();
                if faces.len() == 3 {
                    for (i, hex) in hexes.iter().enumerate() {
                        let (kind, number) = faces[(i + 2) % 3];
                        if let Some(tile) = self.board.tile_mut(hex) {
                            tile.kind = kind;
                            tile.number = number;
                        }
                    }
                }
            }
            SpellCast::SafeHaven { hex } => self.install(
                team,
                actor,
                ModifierKind::SafeHaven { hex },
                Lifetime::Turns(SAFE_HAVEN_TURNS),
            ),
            SpellCast::ForcedNumber { number } => {
                self.install(team, actor, ModifierKind::ForcedNumber { number }, Lifetime::UntilUsed)
            }
            SpellCast::Reroll => self.install(team, actor, ModifierKind::Reroll, Lifetime::UntilUsed),
            SpellCast::GoldRush => {
                let turns = self.players.len() as u32;
                self.install(team, actor, ModifierKind::GoldRush, Lifetime::Turns(turns))
            }
            SpellCast::Transmute { from, to } => {
                let resources = &mut self.players[seat].resources;
                let amount = resources.get(from);
                resources.set(from, 0);
                resources.add(to, amount);
            }
            SpellCast::CheapTrade => self.install(team, actor, ModifierKind::CheapTrade, Lifetime::EndOfTurn),
            SpellCast::Substitute { waive, pay_with } => self.install(
                team,
                actor,
                ModifierKind::Substitute { waive, pay_with },
                Lifetime::EndOfTurn,
            ),
            SpellCast::HarborGift { teammate } => {
                self.install(team, actor, ModifierKind::HarborGift { teammate }, Lifetime::UntilUsed)
            }
            SpellCast::DoubleSteal => self.install(team, actor, ModifierKind::DoubleSteal, Lifetime::UntilUsed),
            SpellCast::LateRobber => self.install(team, actor, ModifierKind::LateRobber, Lifetime::UntilUsed),
            SpellCast::ForcedDiscard { target, first, second } => {
                if let Some(victim) = self.seat_of(&target) {
                    let mut lost = ResourceHand::single(first, 1);
                    lost.add(second, 1);
                    let before = self.players[victim].resources.total();
                    self.players[victim].resources.subtract(&lost);
                    let count = before - self.players[victim].resources.total();
                    events.push(GameEvent::CardsForced {
                        player: actor.to_string(),
                        target,
                        count,
                    });
                }
            }
            SpellCast::Echo { first, second } => match self.last_dev_card {
                // Robber move only; an echoed knight does not join the army
                Some(DevCard::Knight) => self.roll.awaiting_robber = true,
                Some(DevCard::Monopoly) => {
                    if let Some(resource) = first {
                        events.push(self.monopoly_effect(seat, resource));
                    }
                }
                Some(DevCard::YearOfPlenty) => {
                    if let (Some(a), Some(b)) = (first, second) {
                        events.push(self.year_of_plenty_effect(seat, a, b));
                    }
                }
                Some(DevCard::RoadBuilding) => events.push(self.road_building_effect(seat)),
                Some(DevCard::VictoryPoint) | None => {}
            },
        }
        events
    }
}

fn shifted(number: u8, up: bool) -> Option<u8> {
    let n = if up { number.checked_add(1)? } else { number.checked_sub(1)? };
    (2..=12).contains(&n).then_some(n)
}
