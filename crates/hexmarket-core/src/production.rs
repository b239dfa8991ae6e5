//! Dice, production, discards, the robber and gold.

use crate::actions::GameEvent;
use crate::board::{Resource, TileKind};
use crate::game::{GameError, GamePhase, GameState};
use crate::graph::HexId;
use crate::player::{PlayerId, ResourceHand};
use crate::spells::{ModifierKind, SpellKind};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;

/// Dice showing `total` (2..=12)
pub fn dice_for(total: u8) -> (u8, u8) {
    let first = total.saturating_sub(1).clamp(1, 6);
    (first, total.saturating_sub(first).clamp(1, 6))
}

fn roll_dice<R: Rng>(rng: &mut R) -> (u8, u8) {
    (rng.gen_range(1..=6), rng.gen_range(1..=6))
}

/// Uniform over the 30 pairs that do not sum to 7
fn roll_dice_avoiding_seven<R: Rng>(rng: &mut R) -> (u8, u8) {
    let pairs: Vec<(u8, u8)> = (1..=6)
        .flat_map(|a| (1..=6).map(move |b| (a, b)))
        .filter(|(a, b)| a + b != 7)
        .collect();
    pairs.choose(rng).copied().unwrap_or((1, 1))
}

impl GameState {
    /// Credit a player; gold also becomes a pending conversion
    pub(crate) fn grant_resource(&mut self, seat: usize, resource: Resource, amount: u32) {
        let player = &mut self.players[seat];
        player.resources.add(resource, amount);
        if resource == Resource::Gold {
            *self.roll.pending_gold.entry(player.id.clone()).or_insert(0) += amount;
        }
    }

    // ==================== Roll ====================

    pub(crate) fn handle_roll(&mut self, actor: &str) -> Result<Vec<GameEvent>, GameError> {
        self.require_turn_holder(actor)?;
        if self.roll.has_rolled {
            return Err(GameError::AlreadyRolled);
        }
        self.require_clear_obligations()?;
        self.require_no_gold(actor)?;

        let mut events = Vec::new();
        let mut dice = match self.consume_modifier(actor, SpellKind::ForcedNumber, &mut events) {
            Some(ModifierKind::ForcedNumber { number }) => dice_for(number),
            _ => roll_dice(&mut self.rng),
        };
        // Reroll stays armed until a seven actually comes up
        if dice.0 + dice.1 == 7 && self.consume_modifier(actor, SpellKind::Reroll, &mut events).is_some() {
            dice = roll_dice_avoiding_seven(&mut self.rng);
        }

        let mut rolled = self.resolve_roll(actor, dice);
        rolled.extend(events);
        Ok(rolled)
    }

    /// Apply a roll of `dice` by the turn-holder `actor`
    pub(crate) fn resolve_roll(&mut self, actor: &str, dice: (u8, u8)) -> Vec<GameEvent> {
        let total = dice.0 + dice.1;
        self.roll.has_rolled = true;
        self.roll.last_roll = Some(dice);

        let mut events = vec![GameEvent::DiceRolled {
            player: actor.to_string(),
            roll: dice,
            total,
        }];

        let seats = self.players.len();
        if let Some(spells) = self.spells.as_mut() {
            spells.note_roll(seats);
        }
        events.extend(self.gold_rush_payout(total));

        if total == 7 {
            let limit = self.settings.discard_limit;
            let owed: BTreeMap<PlayerId, u32> = self
                .players
                .iter()
                .filter(|p| p.resources.total() > limit)
                .map(|p| (p.id.clone(), (p.resources.total() + 1) / 2))
                .collect();

            if self
                .consume_modifier(actor, SpellKind::DoubleSteal, &mut events)
                .is_some()
            {
                self.roll.double_steal = true;
            }

            if owed.is_empty() {
                self.roll.awaiting_robber = true;
            } else {
                events.push(GameEvent::DiscardRequired { owed: owed.clone() });
                self.roll.pending_discards = owed;
            }
        } else {
            events.extend(self.produce(total));
            if self
                .consume_modifier(actor, SpellKind::LateRobber, &mut events)
                .is_some()
            {
                self.roll.awaiting_robber = true;
            }
        }
        events
    }

    /// Pay out every hex showing `number`, except the one under the robber
    fn produce(&mut self, number: u8) -> Vec<GameEvent> {
        let mut resources: BTreeMap<(usize, Resource), u32> = BTreeMap::new();
        let mut cards: BTreeMap<usize, u32> = BTreeMap::new();

        for tile in &self.board.tiles {
            if tile.number != Some(number) || self.board.robber.as_ref() == Some(&tile.id) {
                continue;
            }
            for vertex in self.board.graph.vertices_of_hex(&tile.id) {
                let Some(seat) = self.vertex_owners.get(vertex).and_then(|o| self.seat_of(o)) else {
                    continue;
                };
                let amount = if self.players[seat].cities.contains(vertex) { 2 } else { 1 };
                match tile.kind {
                    TileKind::Resource(r) => *resources.entry((seat, r)).or_insert(0) += amount,
                    TileKind::DevBonus => *cards.entry(seat).or_insert(0) += amount,
                    _ => {}
                }
            }
        }

        let mut events = Vec::new();
        let mut distributions = Vec::new();
        for ((seat, resource), amount) in resources {
            self.grant_resource(seat, resource, amount);
            distributions.push((self.players[seat].id.clone(), resource, amount));
        }
        if !distributions.is_empty() {
            events.push(GameEvent::ResourcesDistributed { distributions });
        }

        for (seat, amount) in cards {
            // Only the turn-holder has to wait a turn; everyone else gets to play theirs next turn
            let on_turn = seat == self.current;
            let mut count = 0;
            for _ in 0..amount {
                let Some(card) = self.dev_deck.pop() else { break };
                let player = &mut self.players[seat];
                if on_turn {
                    player.dev_cards_bought_this_turn.push(card);
                } else {
                    player.dev_cards.push(card);
                }
                count += 1;
            }
            if count > 0 {
                events.push(GameEvent::DevCardsDistributed {
                    player: self.players[seat].id.clone(),
                    count,
                });
            }
        }
        events
    }

    // ==================== Discard ====================

    pub(crate) fn handle_discard(
        &mut self,
        actor: &str,
        resources: ResourceHand,
    ) -> Result<Vec<GameEvent>, GameError> {
        if self.phase != GamePhase::Turn {
            return Err(GameError::InvalidPhase);
        }
        let seat = self.seat(actor)?;
        let owed = *self
            .roll
            .pending_discards
            .get(actor)
            .ok_or(GameError::NoDiscardOwed)?;
        if resources.gold > 0 {
            return Err(GameError::GoldNotTradable);
        }
        if resources.total() != owed {
            return Err(GameError::WrongDiscardCount { expected: owed });
        }
        if !self.players[seat].resources.can_afford(&resources) {
            return Err(GameError::CannotAfford);
        }

        self.players[seat].resources.subtract(&resources);
        self.roll.pending_discards.remove(actor);
        if self.roll.pending_discards.is_empty() {
            self.roll.awaiting_robber = true;
        }
        Ok(vec![GameEvent::CardsDiscarded {
            player: actor.to_string(),
            count: owed,
        }])
    }

    // ==================== Robber ====================

    pub(crate) fn handle_move_robber(
        &mut self,
        actor: &str,
        hex: HexId,
        target: Option<PlayerId>,
    ) -> Result<Vec<GameEvent>, GameError> {
        self.require_turn_holder(actor)?;
        if self.roll.awaiting_discard() {
            return Err(GameError::ObligationPending);
        }
        if !self.roll.awaiting_robber {
            return Err(GameError::RobberNotPending);
        }
        self.check_robber_move(actor, &hex, target.as_deref())?;

        let steals = if self.roll.double_steal { 2 } else { 1 };
        self.roll.awaiting_robber = false;
        self.roll.double_steal = false;
        Ok(self.relocate_robber(actor, hex, target, steals))
    }

    /// Players the robber could steal from at `hex`
    pub fn robber_victims(&self, actor: &str, hex: &str) -> Vec<PlayerId> {
        let mut victims: Vec<PlayerId> = Vec::new();
        for vertex in self.board.graph.vertices_of_hex(hex) {
            let Some(owner) = self.vertex_owners.get(vertex) else {
                continue;
            };
            if owner == actor || self.are_teammates(actor, owner) || victims.contains(owner) {
                continue;
            }
            if self.player(owner).is_some_and(|p| p.resources.total() > 0) {
                victims.push(owner.clone());
            }
        }
        victims
    }

    /// Target must be a land hex other than the current one, not protected;
    /// a named victim must be stealable there
    pub(crate) fn check_robber_move(
        &self,
        actor: &str,
        hex: &str,
        target: Option<&str>,
    ) -> Result<(), GameError> {
        if !self.board.is_land_hex(hex) || self.board.robber.as_deref() == Some(hex) {
            return Err(GameError::InvalidRobberHex);
        }
        if self.is_safe_haven(hex) {
            return Err(GameError::ProtectedHex);
        }
        if let Some(target) = target {
            if !self.robber_victims(actor, hex).iter().any(|v| v == target) {
                return Err(GameError::InvalidVictim);
            }
        }
        Ok(())
    }

    /// Move the robber and steal from the named or a random victim
    pub(crate) fn relocate_robber(
        &mut self,
        actor: &str,
        hex: HexId,
        target: Option<PlayerId>,
        steals: u32,
    ) -> Vec<GameEvent> {
        let victim = match target {
            Some(target) => Some(target),
            None => {
                let victims = self.robber_victims(actor, &hex);
                victims.choose(&mut self.rng).cloned()
            }
        };
        let from = self.board.move_robber(hex.clone());
        let mut events = vec![GameEvent::RobberMoved {
            player: actor.to_string(),
            from,
            to: hex,
        }];

        let (Some(victim), Some(thief_seat)) = (victim, self.seat_of(actor)) else {
            return events;
        };
        let Some(victim_seat) = self.seat_of(&victim) else {
            return events;
        };
        for _ in 0..steals {
            let Some(resource) = self.players[victim_seat].resources.steal_random(&mut self.rng) else {
                break;
            };
            self.players[thief_seat].resources.add(resource, 1);
            events.push(GameEvent::ResourceStolen {
                thief: actor.to_string(),
                victim: victim.clone(),
                resource: Some(resource),
            });
        }
        events
    }

    // ==================== Gold ====================

    pub(crate) fn handle_choose_gold(
        &mut self,
        actor: &str,
        resource: Resource,
    ) -> Result<Vec<GameEvent>, GameError> {
        if !matches!(self.phase, GamePhase::Setup | GamePhase::Turn) {
            return Err(GameError::InvalidPhase);
        }
        let seat = self.seat(actor)?;
        let pending = self.roll.pending_gold.get(actor).copied().unwrap_or(0);
        if pending == 0 || self.players[seat].resources.gold == 0 {
            return Err(GameError::NoGold);
        }
        if !resource.is_tradable() {
            return Err(GameError::GoldNotTradable);
        }

        let player = &mut self.players[seat];
        player.resources.gold -= 1;
        player.resources.add(resource, 1);
        if pending == 1 {
            self.roll.pending_gold.remove(actor);
        } else {
            self.roll.pending_gold.insert(actor.to_string(), pending - 1);
        }
        Ok(vec![GameEvent::GoldChosen {
            player: actor.to_string(),
            resource,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Command;
    use crate::board::HexSpec;
    use crate::game::test_support::*;
    use crate::player::DevCard;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Two players in `Turn` on a three-hex board, no pieces placed
    fn custom_turn_game(hexes: Vec<HexSpec>) -> GameState {
        let mut game = lobby_with(11, &["a", "b"]);
        game.apply("a", Command::SetCustomBoard { hexes, ports: None }).unwrap();
        game.phase = GamePhase::Turn;
        game.turn_number = 1;
        game
    }

    fn three_sixes() -> GameState {
        custom_turn_game(vec![
            HexSpec::new(0, 0, TileKind::Resource(Resource::Ore), Some(6)),
            HexSpec::new(2, 0, TileKind::Resource(Resource::Gold), Some(6)),
            HexSpec::new(0, 2, TileKind::DevBonus, Some(6)),
        ])
    }

    /// A vertex touching only `hex`
    fn lone_vertex(game: &GameState, hex: &str) -> String {
        game.board
            .graph
            .vertices_of_hex(hex)
            .iter()
            .find(|v| game.board.graph.hexes_of_vertex(v).len() == 1)
            .unwrap()
            .clone()
    }

    fn give_settlement(game: &mut GameState, seat: usize, vertex: &str) {
        let id = game.players[seat].id.clone();
        game.players[seat].settlements.insert(vertex.to_string());
        game.vertex_owners.insert(vertex.to_string(), id);
    }

    fn give_city(game: &mut GameState, seat: usize, vertex: &str) {
        let id = game.players[seat].id.clone();
        game.players[seat].cities.insert(vertex.to_string());
        game.vertex_owners.insert(vertex.to_string(), id);
    }

    #[test]
    fn test_dice_for_totals() {
        for total in 2..=12 {
            let (a, b) = dice_for(total);
            assert_eq!(a + b, total);
            assert!((1..=6).contains(&a) && (1..=6).contains(&b));
        }
    }

    #[test]
    fn test_avoiding_seven() {
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..50 {
            let (a, b) = roll_dice_avoiding_seven(&mut rng);
            assert_ne!(a + b, 7);
        }
    }

    #[test]
    fn test_production_settlement_city_gold_and_cards() {
        let mut game = three_sixes();
        let ore = lone_vertex(&game, "h0");
        let gold = lone_vertex(&game, "h1");
        let bonus = lone_vertex(&game, "h2");
        give_settlement(&mut game, 0, &ore);
        give_city(&mut game, 1, &gold);
        give_settlement(&mut game, 0, &bonus);
        let deck = game.dev_deck.len();

        game.resolve_roll("a", (3, 3));

        assert_eq!(game.players[0].resources.ore, 1);
        assert_eq!(game.players[1].resources.gold, 2);
        assert_eq!(game.roll.pending_gold.get("b"), Some(&2));
        assert_eq!(game.players[0].dev_cards_bought_this_turn.len(), 1);
        assert_eq!(game.dev_deck.len(), deck - 1);
    }

    #[test]
    fn test_robber_blocks_production() {
        let mut game = three_sixes();
        let ore = lone_vertex(&game, "h0");
        give_settlement(&mut game, 0, &ore);
        game.board.robber = Some("h0".into());

        game.resolve_roll("a", (3, 3));
        assert_eq!(game.players[0].resources.ore, 0);
    }

    #[test]
    fn test_seven_with_nine_cards_owes_five() {
        let mut game = turn_game(12);
        game.players[0].resources = ResourceHand::with_amounts(1, 1, 1, 0, 0);
        game.players[1].resources = ResourceHand::with_amounts(2, 2, 2, 2, 1);

        game.resolve_roll("a", (3, 4));

        assert_eq!(game.roll.pending_discards.get("b"), Some(&5));
        assert!(game.roll.awaiting_discard());
        assert!(!game.roll.awaiting_robber);
        assert!(!game.roll.pending_discards.contains_key("a"));

        assert_eq!(game.apply("a", Command::EndTurn), Err(GameError::ObligationPending));
        assert_eq!(
            game.apply(
                "b",
                Command::Discard {
                    resources: ResourceHand::with_amounts(1, 1, 1, 1, 0)
                }
            ),
            Err(GameError::WrongDiscardCount { expected: 5 })
        );
        game.apply(
            "b",
            Command::Discard {
                resources: ResourceHand::with_amounts(2, 2, 1, 0, 0),
            },
        )
        .unwrap();
        assert_eq!(game.players[1].resources.total(), 4);
        assert!(game.roll.awaiting_robber);
    }

    #[test]
    fn test_seven_without_discards_goes_to_robber() {
        let mut game = turn_game(13);
        game.players[1].resources = ResourceHand::with_amounts(1, 1, 1, 1, 1);
        game.resolve_roll("a", (6, 1));
        assert!(!game.roll.awaiting_discard());
        assert!(game.roll.awaiting_robber);
    }

    #[test]
    fn test_move_robber_steals_from_named_victim() {
        let mut game = three_sixes();
        let gold = lone_vertex(&game, "h1");
        give_settlement(&mut game, 1, &gold);
        game.players[1].resources = ResourceHand::with_amounts(0, 0, 0, 0, 1);
        game.roll.has_rolled = true;
        game.roll.awaiting_robber = true;

        let events = game
            .apply(
                "a",
                Command::MoveRobber {
                    hex: "h1".into(),
                    target: Some("b".into()),
                },
            )
            .unwrap();

        assert!(events.iter().any(|e| matches!(e, GameEvent::ResourceStolen { .. })));
        assert_eq!(game.players[0].resources.wool, 1);
        assert!(game.players[1].resources.is_empty());
        assert_eq!(game.board.robber.as_deref(), Some("h1"));
        assert!(!game.roll.awaiting_robber);
    }

    #[test]
    fn test_robber_must_move_to_new_land_hex() {
        let mut game = three_sixes();
        game.board.robber = Some("h0".into());
        game.roll.awaiting_robber = true;
        let same = Command::MoveRobber {
            hex: "h0".into(),
            target: None,
        };
        assert_eq!(game.apply("a", same), Err(GameError::InvalidRobberHex));
        let missing = Command::MoveRobber {
            hex: "h42".into(),
            target: None,
        };
        assert_eq!(game.apply("a", missing), Err(GameError::InvalidRobberHex));
    }

    #[test]
    fn test_robber_rejects_victim_without_cards() {
        let mut game = three_sixes();
        let ore = lone_vertex(&game, "h0");
        give_settlement(&mut game, 1, &ore);
        game.roll.awaiting_robber = true;
        assert_eq!(
            game.apply(
                "a",
                Command::MoveRobber {
                    hex: "h0".into(),
                    target: Some("b".into()),
                }
            ),
            Err(GameError::InvalidVictim)
        );
    }

    #[test]
    fn test_gold_blocks_roll_until_chosen() {
        let mut game = three_sixes();
        game.players[0].resources.gold = 1;
        game.roll.pending_gold.insert("a".into(), 1);

        assert_eq!(game.apply("a", Command::Roll), Err(GameError::GoldPending));
        assert_eq!(
            game.apply("a", Command::ChooseGold { resource: Resource::Gold }),
            Err(GameError::GoldNotTradable)
        );
        game.apply("a", Command::ChooseGold { resource: Resource::Ore }).unwrap();
        assert_eq!(game.players[0].resources.ore, 1);
        assert_eq!(game.players[0].resources.gold, 0);
        assert!(game.roll.pending_gold.is_empty());
        assert!(game.apply("a", Command::Roll).is_ok());
    }

    #[test]
    fn test_bonus_card_off_turn_is_playable_on_own_turn() {
        let mut game = three_sixes();
        let bonus = lone_vertex(&game, "h2");
        give_settlement(&mut game, 1, &bonus);
        game.dev_deck = vec![DevCard::YearOfPlenty];

        game.resolve_roll("a", (3, 3));
        assert_eq!(game.players[1].dev_cards, vec![DevCard::YearOfPlenty]);
        assert!(game.players[1].dev_cards_bought_this_turn.is_empty());

        game.apply("a", Command::EndTurn).unwrap();
        game.apply(
            "b",
            Command::PlayYearOfPlenty {
                first: Resource::Ore,
                second: Resource::Wool,
            },
        )
        .unwrap();
        assert_eq!(game.players[1].resources, ResourceHand::with_amounts(0, 0, 1, 0, 1));
    }

    #[test]
    fn test_roll_only_once() {
        let mut game = turn_game(14);
        game.apply("a", Command::Roll).unwrap();
        assert!(matches!(
            game.apply("a", Command::Roll),
            Err(GameError::AlreadyRolled) | Err(GameError::ObligationPending)
        ));
    }
}
