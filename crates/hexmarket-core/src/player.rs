//! Player state and resource management.
//!
//! This module contains:
//! - Player struct with resources, development cards, pieces and achievements
//! - ResourceHand for managing resource counts (five tradable resources plus gold)
//! - Development card types and the standard deck
//! - Building costs

use crate::board::Resource;
use crate::graph::{EdgeId, VertexId};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Opaque player identifier supplied by the transport
pub type PlayerId = String;

/// Team index (0 or 1) in team mode
pub type TeamId = u8;

/// Piece capacities per player
pub const MAX_ROADS: usize = 15;
pub const MAX_SETTLEMENTS: usize = 5;
pub const MAX_CITIES: usize = 4;

/// Player color for UI rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerColor {
    Red,
    Blue,
    Orange,
    White,
}

impl PlayerColor {
    pub const ALL: [PlayerColor; 4] = [
        PlayerColor::Red,
        PlayerColor::Blue,
        PlayerColor::Orange,
        PlayerColor::White,
    ];

    /// First color not in `taken`
    pub fn first_free(taken: &[PlayerColor]) -> Option<Self> {
        Self::ALL.into_iter().find(|c| !taken.contains(c))
    }
}

/// Development card types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DevCard {
    /// Move robber and steal, counts toward Largest Army
    Knight,
    /// Worth 1 VP, never played
    VictoryPoint,
    /// Build 2 roads for free
    RoadBuilding,
    /// Take any 2 resources from the bank
    YearOfPlenty,
    /// All other players give you all of one resource type
    Monopoly,
}

impl DevCard {
    /// Create the standard development card deck (25 cards)
    pub fn standard_deck() -> Vec<DevCard> {
        let mut deck = Vec::with_capacity(25);
        deck.extend(std::iter::repeat(DevCard::Knight).take(14));
        deck.extend(std::iter::repeat(DevCard::VictoryPoint).take(5));
        deck.extend(std::iter::repeat(DevCard::RoadBuilding).take(2));
        deck.extend(std::iter::repeat(DevCard::YearOfPlenty).take(2));
        deck.extend(std::iter::repeat(DevCard::Monopoly).take(2));
        deck
    }

    /// A freshly shuffled standard deck
    pub fn shuffled_deck<R: Rng>(rng: &mut R) -> Vec<DevCard> {
        let mut deck = Self::standard_deck();
        deck.shuffle(rng);
        deck
    }

    /// Whether this card can be played (VP cards are never "played")
    pub fn is_playable(&self) -> bool {
        !matches!(self, DevCard::VictoryPoint)
    }
}

/// A hand of resources
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceHand {
    pub brick: u32,
    pub lumber: u32,
    pub ore: u32,
    pub grain: u32,
    pub wool: u32,
    #[serde(default)]
    pub gold: u32,
}

impl ResourceHand {
    /// Create an empty hand
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a hand with specific tradable amounts
    pub fn with_amounts(brick: u32, lumber: u32, ore: u32, grain: u32, wool: u32) -> Self {
        Self {
            brick,
            lumber,
            ore,
            grain,
            wool,
            gold: 0,
        }
    }

    /// Create a hand with a single resource
    pub fn single(resource: Resource, amount: u32) -> Self {
        let mut hand = Self::new();
        hand.add(resource, amount);
        hand
    }

    /// Number of tradable cards (gold is held apart)
    pub fn total(&self) -> u32 {
        self.brick + self.lumber + self.ore + self.grain + self.wool
    }

    /// No tradable cards
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn get(&self, resource: Resource) -> u32 {
        match resource {
            Resource::Brick => self.brick,
            Resource::Lumber => self.lumber,
            Resource::Ore => self.ore,
            Resource::Grain => self.grain,
            Resource::Wool => self.wool,
            Resource::Gold => self.gold,
        }
    }

    pub fn set(&mut self, resource: Resource, count: u32) {
        match resource {
            Resource::Brick => self.brick = count,
            Resource::Lumber => self.lumber = count,
            Resource::Ore => self.ore = count,
            Resource::Grain => self.grain = count,
            Resource::Wool => self.wool = count,
            Resource::Gold => self.gold = count,
        }
    }

    pub fn add(&mut self, resource: Resource, amount: u32) {
        self.set(resource, self.get(resource) + amount);
    }

    /// Add another hand to this one
    pub fn add_hand(&mut self, other: &ResourceHand) {
        for (resource, amount) in other.iter_all() {
            self.add(resource, amount);
        }
    }

    /// Check if can afford a cost
    pub fn can_afford(&self, cost: &ResourceHand) -> bool {
        cost.iter_all().all(|(r, n)| self.get(r) >= n)
    }

    /// Subtract a cost, flooring each counter at zero.
    ///
    /// Callers check [`ResourceHand::can_afford`] first.
    pub fn subtract(&mut self, cost: &ResourceHand) {
        for (resource, amount) in cost.iter_all() {
            self.set(resource, self.get(resource).saturating_sub(amount));
        }
    }

    /// Non-zero tradable counters
    pub fn iter(&self) -> impl Iterator<Item = (Resource, u32)> + '_ {
        Resource::TRADABLE
            .into_iter()
            .map(|r| (r, self.get(r)))
            .filter(|(_, n)| *n > 0)
    }

    /// Non-zero counters including gold
    fn iter_all(&self) -> impl Iterator<Item = (Resource, u32)> + '_ {
        Resource::TRADABLE
            .into_iter()
            .chain(std::iter::once(Resource::Gold))
            .map(|r| (r, self.get(r)))
            .filter(|(_, n)| *n > 0)
    }

    /// Remove a random tradable card (for robber stealing)
    pub fn steal_random<R: Rng>(&mut self, rng: &mut R) -> Option<Resource> {
        let available: Vec<Resource> = self
            .iter()
            .flat_map(|(r, n)| std::iter::repeat(r).take(n as usize))
            .collect();

        let resource = *available.choose(rng)?;
        self.subtract(&ResourceHand::single(resource, 1));
        Some(resource)
    }
}

/// Building costs
pub mod costs {
    use super::ResourceHand;

    /// Cost to build a road: 1 brick, 1 lumber
    pub fn road() -> ResourceHand {
        ResourceHand::with_amounts(1, 1, 0, 0, 0)
    }

    /// Cost to build a settlement: 1 brick, 1 lumber, 1 grain, 1 wool
    pub fn settlement() -> ResourceHand {
        ResourceHand::with_amounts(1, 1, 0, 1, 1)
    }

    /// Cost to upgrade to city: 3 ore, 2 grain
    pub fn city() -> ResourceHand {
        ResourceHand::with_amounts(0, 0, 3, 2, 0)
    }

    /// Cost to buy a development card: 1 ore, 1 grain, 1 wool
    pub fn development_card() -> ResourceHand {
        ResourceHand::with_amounts(0, 0, 1, 1, 1)
    }
}

/// A single player's state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    /// Display name
    pub name: String,
    pub color: PlayerColor,
    /// Team in team mode
    pub team: Option<TeamId>,
    /// Ready check in the lobby
    pub ready: bool,
    pub resources: ResourceHand,
    /// Development cards that may be played
    pub dev_cards: Vec<DevCard>,
    /// Development cards bought this turn (can't be played same turn)
    pub dev_cards_bought_this_turn: Vec<DevCard>,
    pub roads: BTreeSet<EdgeId>,
    pub settlements: BTreeSet<VertexId>,
    pub cities: BTreeSet<VertexId>,
    /// Number of knights played (for Largest Army)
    pub played_knights: u32,
    /// Length of this player's longest road
    pub longest_road: u32,
    /// Derived total, refreshed after every command
    pub victory_points: u32,
    pub has_longest_road: bool,
    pub has_largest_army: bool,
    /// Free road placements left from road building
    pub bonus_roads: u8,
}

impl Player {
    pub fn new(id: PlayerId, name: String, color: PlayerColor) -> Self {
        Self {
            id,
            name,
            color,
            team: None,
            ready: false,
            resources: ResourceHand::new(),
            dev_cards: Vec::new(),
            dev_cards_bought_this_turn: Vec::new(),
            roads: BTreeSet::new(),
            settlements: BTreeSet::new(),
            cities: BTreeSet::new(),
            played_knights: 0,
            longest_road: 0,
            victory_points: 0,
            has_longest_road: false,
            has_largest_army: false,
            bonus_roads: 0,
        }
    }

    /// Victory point cards held, fresh or not
    pub fn vp_cards(&self) -> u32 {
        self.dev_cards
            .iter()
            .chain(&self.dev_cards_bought_this_turn)
            .filter(|c| matches!(c, DevCard::VictoryPoint))
            .count() as u32
    }

    /// Total victory points from pieces, cards and awards
    pub fn compute_victory_points(&self) -> u32 {
        let mut vp = self.settlements.len() as u32 + 2 * self.cities.len() as u32;
        vp += self.vp_cards();
        if self.has_longest_road {
            vp += 2;
        }
        if self.has_largest_army {
            vp += 2;
        }
        vp
    }

    /// All development cards in hand
    pub fn dev_card_count(&self) -> usize {
        self.dev_cards.len() + self.dev_cards_bought_this_turn.len()
    }

    pub fn roads_remaining(&self) -> usize {
        MAX_ROADS.saturating_sub(self.roads.len())
    }

    pub fn settlements_remaining(&self) -> usize {
        MAX_SETTLEMENTS.saturating_sub(self.settlements.len())
    }

    pub fn cities_remaining(&self) -> usize {
        MAX_CITIES.saturating_sub(self.cities.len())
    }

    /// Whether the player owns any settlement or city
    pub fn has_building(&self) -> bool {
        !self.settlements.is_empty() || !self.cities.is_empty()
    }

    /// Called at end of turn - move bought cards to playable pile
    pub fn end_turn(&mut self) {
        self.dev_cards.append(&mut self.dev_cards_bought_this_turn);
    }

    /// Check if player has a playable development card of given type
    pub fn has_playable_dev_card(&self, card: DevCard) -> bool {
        card.is_playable() && self.dev_cards.contains(&card)
    }

    /// Remove a playable card from hand
    pub fn take_dev_card(&mut self, card: DevCard) -> bool {
        match self.dev_cards.iter().position(|c| *c == card) {
            Some(pos) => {
                self.dev_cards.remove(pos);
                true
            }
            None => false,
        }
    }
}
