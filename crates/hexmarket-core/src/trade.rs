//! Player-to-player trade negotiation and bank trades.
//!
//! Negotiation runs in three steps: the turn-holder offers, other players
//! accept (or withdraw), and the offerer finalizes with one of the accepting
//! players. Hands are checked again at finalize time since they may have
//! changed after the acceptance.

use crate::actions::{GameEvent, TradeOffer};
use crate::board::Resource;
use crate::game::{GameError, GamePhase, GameState};
use crate::player::{PlayerId, ResourceHand};
use std::collections::BTreeSet;

/// Bank rate without harbors or spells
pub const BANK_RATIO: u32 = 4;

/// Bank rate granted by trade spells
pub const DISCOUNT_RATIO: u32 = 2;

impl GameState {
    fn offer_index(&self, offer_id: u32) -> Result<usize, GameError> {
        self.trade_offers
            .iter()
            .position(|o| o.id == offer_id)
            .ok_or(GameError::NoSuchOffer)
    }

    pub(crate) fn handle_offer_trade(
        &mut self,
        actor: &str,
        to: Option<PlayerId>,
        give: ResourceHand,
        get: ResourceHand,
    ) -> Result<Vec<GameEvent>, GameError> {
        let seat = self.require_main_action(actor)?;
        if give.gold > 0 || get.gold > 0 {
            return Err(GameError::GoldNotTradable);
        }
        if let Some(to) = &to {
            if to == actor {
                return Err(GameError::InvalidTrade);
            }
            if self.seat_of(to).is_none() {
                return Err(GameError::NoSuchPlayer(to.clone()));
            }
        }
        let offer = TradeOffer {
            id: self.next_offer_id,
            from: actor.to_string(),
            to,
            give,
            get,
            accepted_by: BTreeSet::new(),
        };
        if !offer.is_valid() {
            return Err(GameError::InvalidTrade);
        }
        if !self.players[seat].resources.can_afford(&give) {
            return Err(GameError::CannotAfford);
        }

        self.next_offer_id += 1;
        self.trade_offers.push(offer.clone());
        Ok(vec![GameEvent::TradeOffered { offer }])
    }

    pub(crate) fn handle_respond_trade(
        &mut self,
        actor: &str,
        offer_id: u32,
        accept: bool,
    ) -> Result<Vec<GameEvent>, GameError> {
        if self.phase != GamePhase::Turn {
            return Err(GameError::InvalidPhase);
        }
        let seat = self.seat(actor)?;
        let index = self.offer_index(offer_id)?;
        let offer = &self.trade_offers[index];
        if !offer.is_open_to(actor) {
            return Err(GameError::InvalidTrade);
        }
        if accept && !self.players[seat].resources.can_afford(&offer.get) {
            return Err(GameError::CannotAfford);
        }

        let offer = &mut self.trade_offers[index];
        if accept {
            offer.accepted_by.insert(actor.to_string());
        } else {
            offer.accepted_by.remove(actor);
        }
        Ok(vec![GameEvent::TradeResponded {
            offer_id,
            player: actor.to_string(),
            accept,
        }])
    }

    pub(crate) fn handle_finalize_trade(
        &mut self,
        actor: &str,
        offer_id: u32,
        with: PlayerId,
    ) -> Result<Vec<GameEvent>, GameError> {
        let seat = self.require_main_action(actor)?;
        let index = self.offer_index(offer_id)?;
        let offer = &self.trade_offers[index];
        if offer.from != actor {
            return Err(GameError::NoSuchOffer);
        }
        if !offer.accepted_by.contains(&with) {
            return Err(GameError::NotAccepted);
        }
        let partner = self.seat(&with).map_err(|_| GameError::NoSuchPlayer(with.clone()))?;
        if !self.players[seat].resources.can_afford(&offer.give)
            || !self.players[partner].resources.can_afford(&offer.get)
        {
            return Err(GameError::CannotAfford);
        }

        let offer = self.trade_offers.remove(index);
        self.players[seat].resources.subtract(&offer.give);
        self.players[seat].resources.add_hand(&offer.get);
        self.players[partner].resources.subtract(&offer.get);
        self.players[partner].resources.add_hand(&offer.give);
        Ok(vec![GameEvent::TradeCompleted {
            offer_id,
            from: actor.to_string(),
            with,
        }])
    }

    pub(crate) fn handle_cancel_trade(&mut self, actor: &str, offer_id: u32) -> Result<Vec<GameEvent>, GameError> {
        if self.phase != GamePhase::Turn {
            return Err(GameError::InvalidPhase);
        }
        let index = self.offer_index(offer_id)?;
        if self.trade_offers[index].from != actor {
            return Err(GameError::NoSuchOffer);
        }
        self.trade_offers.remove(index);
        Ok(vec![GameEvent::TradeCancelled { offer_id }])
    }

    // ==================== Bank ====================

    /// Best harbor rate `player` controls for `give`, or the plain bank rate
    pub fn harbor_ratio(&self, player: &str, give: Resource) -> u32 {
        self.board
            .ports_controlled(|v| self.vertex_owners.get(v).is_some_and(|o| o == player))
            .iter()
            .filter_map(|p| p.kind.ratio_for(give))
            .min()
            .unwrap_or(BANK_RATIO)
            .min(BANK_RATIO)
    }

    /// Cards of `give` the bank wants from `player` for one card
    pub fn bank_ratio(&self, player: &str, give: Resource) -> u32 {
        let harbor = self.harbor_ratio(player, give);
        if self.has_trade_discount(player) {
            harbor.min(DISCOUNT_RATIO)
        } else {
            harbor
        }
    }

    pub(crate) fn handle_bank_trade(
        &mut self,
        actor: &str,
        give: Resource,
        get: Resource,
    ) -> Result<Vec<GameEvent>, GameError> {
        let seat = self.require_main_action(actor)?;
        if !give.is_tradable() || !get.is_tradable() {
            return Err(GameError::GoldNotTradable);
        }
        if give == get {
            return Err(GameError::InvalidTrade);
        }
        let harbor = self.harbor_ratio(actor, give);
        let ratio = self.bank_ratio(actor, give);
        if self.players[seat].resources.get(give) < ratio {
            return Err(GameError::CannotAfford);
        }

        let mut events = Vec::new();
        if ratio < harbor {
            self.consume_trade_discount(actor, &mut events);
        }
        let player = &mut self.players[seat];
        player.resources.subtract(&ResourceHand::single(give, ratio));
        player.resources.add(get, 1);
        events.insert(
            0,
            GameEvent::BankTraded {
                player: actor.to_string(),
                gave: give,
                gave_count: ratio,
                received: get,
            },
        );
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Command;
    use crate::board::PortKind;
    use crate::game::test_support::*;
    use crate::spells::{Lifetime, Modifier, ModifierKind, SpellState};

    fn offer(game: &mut GameState, give: ResourceHand, get: ResourceHand) -> u32 {
        game.apply("a", Command::OfferTrade { to: None, give, get }).unwrap();
        game.trade_offers.last().unwrap().id
    }

    fn rolled_game(seed: u64) -> GameState {
        let mut game = turn_game(seed);
        game.roll.has_rolled = true;
        game
    }

    #[test]
    fn test_offer_accept_finalize() {
        let mut game = rolled_game(60);
        game.players[0].resources = ResourceHand::with_amounts(2, 0, 0, 0, 0);
        game.players[1].resources = ResourceHand::with_amounts(0, 0, 1, 0, 0);
        let id = offer(
            &mut game,
            ResourceHand::single(Resource::Brick, 2),
            ResourceHand::single(Resource::Ore, 1),
        );

        game.apply("b", Command::RespondTrade { offer_id: id, accept: true }).unwrap();
        game.apply("a", Command::FinalizeTrade { offer_id: id, with: "b".into() })
            .unwrap();

        assert_eq!(game.players[0].resources, ResourceHand::with_amounts(0, 0, 1, 0, 0));
        assert_eq!(game.players[1].resources, ResourceHand::with_amounts(2, 0, 0, 0, 0));
        assert!(game.trade_offers.is_empty());
    }

    #[test]
    fn test_finalize_rechecks_hands() {
        let mut game = rolled_game(61);
        game.players[0].resources = ResourceHand::with_amounts(1, 0, 0, 0, 0);
        game.players[1].resources = ResourceHand::with_amounts(0, 0, 1, 0, 0);
        let id = offer(
            &mut game,
            ResourceHand::single(Resource::Brick, 1),
            ResourceHand::single(Resource::Ore, 1),
        );
        game.apply("b", Command::RespondTrade { offer_id: id, accept: true }).unwrap();
        game.players[1].resources = ResourceHand::new();

        let before = game.players.clone();
        assert_eq!(
            game.apply("a", Command::FinalizeTrade { offer_id: id, with: "b".into() }),
            Err(GameError::CannotAfford)
        );
        assert_eq!(game.players, before);
        assert_eq!(game.trade_offers.len(), 1);
    }

    #[test]
    fn test_finalize_needs_acceptance() {
        let mut game = rolled_game(62);
        game.players[0].resources = ResourceHand::with_amounts(1, 0, 0, 0, 0);
        let id = offer(
            &mut game,
            ResourceHand::single(Resource::Brick, 1),
            ResourceHand::single(Resource::Ore, 1),
        );
        assert_eq!(
            game.apply("a", Command::FinalizeTrade { offer_id: id, with: "b".into() }),
            Err(GameError::NotAccepted)
        );
        assert_eq!(
            game.apply("a", Command::RespondTrade { offer_id: id, accept: true }),
            Err(GameError::InvalidTrade)
        );
    }

    #[test]
    fn test_offers_reject_gold_and_empty_sides() {
        let mut game = rolled_game(63);
        game.players[0].resources = ResourceHand::with_amounts(1, 0, 0, 0, 0);
        let mut gold = ResourceHand::new();
        gold.gold = 1;
        assert_eq!(
            game.apply(
                "a",
                Command::OfferTrade {
                    to: None,
                    give: ResourceHand::single(Resource::Brick, 1),
                    get: gold
                }
            ),
            Err(GameError::GoldNotTradable)
        );
        assert_eq!(
            game.apply(
                "a",
                Command::OfferTrade {
                    to: None,
                    give: ResourceHand::single(Resource::Brick, 1),
                    get: ResourceHand::new()
                }
            ),
            Err(GameError::InvalidTrade)
        );
    }

    #[test]
    fn test_cancel_and_turn_end_clear_offers() {
        let mut game = rolled_game(64);
        game.players[0].resources = ResourceHand::with_amounts(1, 0, 0, 0, 0);
        let first = offer(
            &mut game,
            ResourceHand::single(Resource::Brick, 1),
            ResourceHand::single(Resource::Ore, 1),
        );
        assert_eq!(
            game.apply("b", Command::CancelTrade { offer_id: first }),
            Err(GameError::NoSuchOffer)
        );
        game.apply("a", Command::CancelTrade { offer_id: first }).unwrap();
        assert!(game.trade_offers.is_empty());

        offer(
            &mut game,
            ResourceHand::single(Resource::Brick, 1),
            ResourceHand::single(Resource::Ore, 1),
        );
        game.apply("a", Command::EndTurn).unwrap();
        assert!(game.trade_offers.is_empty());
    }

    #[test]
    fn test_bank_trade_four_to_one() {
        let mut game = rolled_game(65);
        game.vertex_owners.clear();
        game.players[0].resources = ResourceHand::with_amounts(0, 3, 0, 0, 0);
        assert_eq!(
            game.apply(
                "a",
                Command::BankTrade {
                    give: Resource::Lumber,
                    get: Resource::Ore
                }
            ),
            Err(GameError::CannotAfford)
        );
        game.players[0].resources = ResourceHand::with_amounts(0, 4, 0, 0, 0);
        game.apply(
            "a",
            Command::BankTrade {
                give: Resource::Lumber,
                get: Resource::Ore,
            },
        )
        .unwrap();
        assert_eq!(game.players[0].resources, ResourceHand::with_amounts(0, 0, 1, 0, 0));
    }

    #[test]
    fn test_harbor_lowers_ratio() {
        let mut game = rolled_game(66);
        game.vertex_owners.clear();
        let generic = game
            .board
            .ports
            .iter()
            .find(|p| p.kind.ratio() == 3)
            .unwrap()
            .vertex
            .clone();
        assert_eq!(game.bank_ratio("a", Resource::Wool), BANK_RATIO);
        game.vertex_owners.insert(generic, "a".into());
        assert_eq!(game.bank_ratio("a", Resource::Wool), 3);
        assert_eq!(game.bank_ratio("b", Resource::Wool), BANK_RATIO);
    }

    #[test]
    fn test_bridge_vertex_reaches_harbor_but_keeps_distance_rule() {
        let mut game = rolled_game(68);
        game.vertex_owners.clear();
        let port = game
            .board
            .ports
            .iter()
            .find(|p| p.kind.ratio() == 2 && !p.bridges.is_empty())
            .unwrap()
            .clone();
        let PortKind::Specific(resource) = port.kind else {
            unreachable!()
        };

        game.vertex_owners.insert(port.bridges[0].clone(), "a".into());
        assert_eq!(game.bank_ratio("a", resource), 2);

        // The anchor sits next to the bridge, so nobody can settle it now
        game.phase = GamePhase::Setup;
        assert!(!game.valid_settlement_vertices("b").contains(&port.vertex));
    }

    #[test]
    fn test_cheap_trade_is_used_up() {
        let mut game = rolled_game(67);
        game.vertex_owners.clear();
        game.spells = Some(SpellState {
            modifiers: vec![Modifier {
                team: 0,
                caster: "a".into(),
                kind: ModifierKind::CheapTrade,
                lifetime: Lifetime::EndOfTurn,
            }],
            ..Default::default()
        });
        game.players[0].resources = ResourceHand::with_amounts(4, 0, 0, 0, 0);

        let events = game
            .apply(
                "a",
                Command::BankTrade {
                    give: Resource::Brick,
                    get: Resource::Ore,
                },
            )
            .unwrap();
        assert!(matches!(events[0], GameEvent::BankTraded { gave_count: 2, .. }));
        assert!(matches!(events[1], GameEvent::ModifierExpired { .. }));
        assert_eq!(game.bank_ratio("a", Resource::Brick), BANK_RATIO);
    }
}
