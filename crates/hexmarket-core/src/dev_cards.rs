//! Buying and playing development cards.
//!
//! Cards may be played before or after the roll, one per turn, and never on
//! the turn they were bought. Card effects are split out so spells can replay
//! them.

use crate::actions::GameEvent;
use crate::board::Resource;
use crate::game::{GameError, GameState};
use crate::graph::HexId;
use crate::player::{costs, DevCard, PlayerId};

impl GameState {
    pub(crate) fn handle_buy_dev_card(&mut self, actor: &str) -> Result<Vec<GameEvent>, GameError> {
        let seat = self.require_main_action(actor)?;
        if self.dev_deck.is_empty() {
            return Err(GameError::EmptyDeck);
        }
        if !self.players[seat]
            .resources
            .can_afford(&costs::development_card())
        {
            return Err(GameError::CannotAfford);
        }

        let Some(card) = self.dev_deck.pop() else {
            return Err(GameError::EmptyDeck);
        };
        let player = &mut self.players[seat];
        player.resources.subtract(&costs::development_card());
        player.dev_cards_bought_this_turn.push(card);
        Ok(vec![GameEvent::DevCardBought {
            player: actor.to_string(),
        }])
    }

    /// Turn-holder, no obligation, nothing played yet, card held since before this turn
    fn require_card_play(&self, actor: &str, card: DevCard) -> Result<usize, GameError> {
        let seat = self.require_turn_holder(actor)?;
        self.require_clear_obligations()?;
        if self.dev_played_this_turn {
            return Err(GameError::DevCardAlreadyPlayed);
        }
        if !self.players[seat].has_playable_dev_card(card) {
            return Err(GameError::NoSuchCard);
        }
        Ok(seat)
    }

    fn mark_played(&mut self, seat: usize, card: DevCard) {
        self.players[seat].take_dev_card(card);
        self.dev_played_this_turn = true;
        self.last_dev_card = Some(card);
    }

    pub(crate) fn handle_play_knight(
        &mut self,
        actor: &str,
        hex: HexId,
        target: Option<PlayerId>,
    ) -> Result<Vec<GameEvent>, GameError> {
        let seat = self.require_card_play(actor, DevCard::Knight)?;
        self.check_robber_move(actor, &hex, target.as_deref())?;

        self.mark_played(seat, DevCard::Knight);
        self.players[seat].played_knights += 1;
        let mut events = vec![GameEvent::KnightPlayed {
            player: actor.to_string(),
        }];
        events.extend(self.relocate_robber(actor, hex, target, 1));
        Ok(events)
    }

    pub(crate) fn handle_play_monopoly(
        &mut self,
        actor: &str,
        resource: Resource,
    ) -> Result<Vec<GameEvent>, GameError> {
        if !resource.is_tradable() {
            return Err(GameError::GoldNotTradable);
        }
        let seat = self.require_card_play(actor, DevCard::Monopoly)?;
        self.mark_played(seat, DevCard::Monopoly);
        Ok(vec![self.monopoly_effect(seat, resource)])
    }

    pub(crate) fn handle_play_year_of_plenty(
        &mut self,
        actor: &str,
        first: Resource,
        second: Resource,
    ) -> Result<Vec<GameEvent>, GameError> {
        if !first.is_tradable() || !second.is_tradable() {
            return Err(GameError::GoldNotTradable);
        }
        let seat = self.require_card_play(actor, DevCard::YearOfPlenty)?;
        self.mark_played(seat, DevCard::YearOfPlenty);
        Ok(vec![self.year_of_plenty_effect(seat, first, second)])
    }

    pub(crate) fn handle_play_road_building(&mut self, actor: &str) -> Result<Vec<GameEvent>, GameError> {
        let seat = self.require_card_play(actor, DevCard::RoadBuilding)?;
        self.mark_played(seat, DevCard::RoadBuilding);
        Ok(vec![self.road_building_effect(seat)])
    }

    // ==================== Effects ====================

    /// Every other player hands over all of `resource`
    pub(crate) fn monopoly_effect(&mut self, seat: usize, resource: Resource) -> GameEvent {
        let mut total = 0;
        for (i, player) in self.players.iter_mut().enumerate() {
            if i != seat {
                total += player.resources.get(resource);
                player.resources.set(resource, 0);
            }
        }
        self.players[seat].resources.add(resource, total);
        GameEvent::MonopolyPlayed {
            player: self.players[seat].id.clone(),
            resource,
            total,
        }
    }

    pub(crate) fn year_of_plenty_effect(&mut self, seat: usize, first: Resource, second: Resource) -> GameEvent {
        let player = &mut self.players[seat];
        player.resources.add(first, 1);
        player.resources.add(second, 1);
        GameEvent::YearOfPlentyPlayed {
            player: player.id.clone(),
            resources: (first, second),
        }
    }

    /// Two free road placements, limited by pieces left
    pub(crate) fn road_building_effect(&mut self, seat: usize) -> GameEvent {
        let player = &mut self.players[seat];
        let grant = player.roads_remaining().min(2) as u8;
        player.bonus_roads = player.bonus_roads.saturating_add(grant);
        GameEvent::RoadBuildingPlayed {
            player: player.id.clone(),
        }
    }
}
