//! Road, settlement and city placement.
//!
//! Validation order for every build: the actor may act now, the piece is free
//! or paid, the cost is affordable, the spot is legal, a piece is left.

use crate::actions::{BuildKind, GameEvent};
use crate::board::TileKind;
use crate::game::{GameError, GamePhase, GameState, SetupStep};
use crate::graph::{EdgeId, VertexId};
use crate::player::costs;

impl GameState {
    pub(crate) fn handle_build(
        &mut self,
        actor: &str,
        kind: BuildKind,
        vertex: Option<VertexId>,
        edge: Option<EdgeId>,
    ) -> Result<Vec<GameEvent>, GameError> {
        match self.phase {
            GamePhase::Setup => self.handle_setup_build(actor, kind, vertex, edge),
            GamePhase::Turn => match kind {
                BuildKind::Road => self.build_road(actor, edge.ok_or(GameError::InvalidLocation)?),
                BuildKind::Settlement => {
                    self.build_settlement(actor, vertex.ok_or(GameError::InvalidLocation)?)
                }
                BuildKind::City => self.build_city(actor, vertex.ok_or(GameError::InvalidLocation)?),
            },
            _ => Err(GameError::InvalidPhase),
        }
    }

    // ==================== Setup ====================

    fn handle_setup_build(
        &mut self,
        actor: &str,
        kind: BuildKind,
        vertex: Option<VertexId>,
        edge: Option<EdgeId>,
    ) -> Result<Vec<GameEvent>, GameError> {
        let seat = self.seat(actor)?;
        if seat != self.setup_seat() {
            return Err(GameError::NotYourTurn);
        }

        match (kind, self.setup.step) {
            (BuildKind::Settlement, SetupStep::Settlement) => {
                let vertex = vertex.ok_or(GameError::InvalidLocation)?;
                self.check_settlement_spot(&vertex)?;
                if self.players[seat].settlements_remaining() == 0 {
                    return Err(GameError::NoPiecesRemaining);
                }

                let mut events = self.place_settlement(seat, &vertex);
                if self.setup.round == 2 {
                    events.extend(self.pay_starting_resources(seat, &vertex));
                }
                self.setup.step = SetupStep::Road;
                self.setup.last_settlement = Some(vertex);
                Ok(events)
            }
            (BuildKind::Road, SetupStep::Road) => {
                let edge = edge.ok_or(GameError::InvalidLocation)?;
                self.check_road_spot(&edge)?;
                let touches_last = match (self.board.graph.edge(&edge), &self.setup.last_settlement) {
                    (Some(e), Some(last)) => e.vertices.contains(last),
                    _ => false,
                };
                if !touches_last {
                    return Err(GameError::SetupRoadDetached);
                }
                if self.players[seat].roads_remaining() == 0 {
                    return Err(GameError::NoPiecesRemaining);
                }

                let mut events = self.place_road(seat, &edge);
                self.advance_setup(&mut events);
                Ok(events)
            }
            _ => Err(GameError::InvalidPhase),
        }
    }

    /// Round-2 settlements pay one unit per touching producing hex
    fn pay_starting_resources(&mut self, seat: usize, vertex: &str) -> Vec<GameEvent> {
        let resources: Vec<_> = self
            .board
            .tiles_at_vertex(vertex)
            .iter()
            .filter_map(|t| match t.kind {
                TileKind::Resource(r) => Some(r),
                _ => None,
            })
            .collect();

        let player = self.players[seat].id.clone();
        let mut distributions = Vec::new();
        for resource in resources {
            self.grant_resource(seat, resource, 1);
            distributions.push((player.clone(), resource, 1));
        }
        if distributions.is_empty() {
            return Vec::new();
        }
        vec![GameEvent::ResourcesDistributed { distributions }]
    }

    // ==================== Turn ====================

    fn build_road(&mut self, actor: &str, edge: EdgeId) -> Result<Vec<GameEvent>, GameError> {
        let seat = self.require_turn_holder(actor)?;
        self.require_clear_obligations()?;
        self.require_no_gold(actor)?;

        let free = self.players[seat].bonus_roads > 0;
        if !free {
            if !self.roll.has_rolled {
                return Err(GameError::MustRollFirst);
            }
            if !self.players[seat].resources.can_afford(&costs::road()) {
                return Err(GameError::CannotAfford);
            }
        }
        self.check_road_spot(&edge)?;
        if !self.road_connects(actor, &edge) {
            return Err(GameError::NotConnected);
        }
        if self.players[seat].roads_remaining() == 0 {
            return Err(GameError::NoPiecesRemaining);
        }

        let player = &mut self.players[seat];
        if free {
            player.bonus_roads -= 1;
        } else {
            player.resources.subtract(&costs::road());
        }
        Ok(self.place_road(seat, &edge))
    }

    fn build_settlement(&mut self, actor: &str, vertex: VertexId) -> Result<Vec<GameEvent>, GameError> {
        let seat = self.require_main_action(actor)?;
        let (cost, substituted) = self.settlement_cost(actor);
        if !self.players[seat].resources.can_afford(&cost) {
            return Err(GameError::CannotAfford);
        }
        self.check_settlement_spot(&vertex)?;
        let has_road = self
            .board
            .graph
            .edges_of_vertex(&vertex)
            .iter()
            .any(|e| self.edge_owners.get(e).is_some_and(|o| o == actor));
        if !has_road {
            return Err(GameError::NotConnected);
        }
        if self.players[seat].settlements_remaining() == 0 {
            return Err(GameError::NoPiecesRemaining);
        }

        self.players[seat].resources.subtract(&cost);
        let mut events = Vec::new();
        if substituted {
            events.extend(self.consume_substitute(actor));
        }
        events.extend(self.place_settlement(seat, &vertex));
        Ok(events)
    }

    fn build_city(&mut self, actor: &str, vertex: VertexId) -> Result<Vec<GameEvent>, GameError> {
        let seat = self.require_main_action(actor)?;
        if !self.players[seat].resources.can_afford(&costs::city()) {
            return Err(GameError::CannotAfford);
        }
        if !self.players[seat].settlements.contains(&vertex) {
            return Err(GameError::InvalidLocation);
        }
        if self.players[seat].cities_remaining() == 0 {
            return Err(GameError::NoPiecesRemaining);
        }

        let player = &mut self.players[seat];
        player.resources.subtract(&costs::city());
        player.settlements.remove(&vertex);
        player.cities.insert(vertex.clone());
        Ok(vec![GameEvent::CityBuilt {
            player: actor.to_string(),
            vertex,
        }])
    }

    // ==================== Placement Rules ====================

    /// Land vertex, unoccupied, and no building on a neighbouring vertex
    fn check_settlement_spot(&self, vertex: &str) -> Result<(), GameError> {
        if self.board.graph.vertex(vertex).is_none() || !self.board.vertex_on_land(vertex) {
            return Err(GameError::InvalidLocation);
        }
        if self.vertex_owners.contains_key(vertex) {
            return Err(GameError::Occupied);
        }
        let crowded = self
            .board
            .graph
            .neighbors_of_vertex(vertex)
            .iter()
            .any(|n| self.vertex_owners.contains_key(n));
        if crowded {
            return Err(GameError::DistanceRule);
        }
        Ok(())
    }

    /// Existing land edge without a road
    fn check_road_spot(&self, edge: &str) -> Result<(), GameError> {
        if self.board.graph.edge(edge).is_none() || !self.board.edge_on_land(edge) {
            return Err(GameError::InvalidLocation);
        }
        if self.edge_owners.contains_key(edge) {
            return Err(GameError::Occupied);
        }
        Ok(())
    }

    /// A road must touch the player's building, or the player's road through
    /// a vertex no opponent has built on
    fn road_connects(&self, player: &str, edge: &str) -> bool {
        let Some(edge) = self.board.graph.edge(edge) else {
            return false;
        };
        edge.vertices.iter().any(|v| match self.vertex_owners.get(v) {
            Some(owner) => owner == player,
            None => self
                .board
                .graph
                .edges_of_vertex(v)
                .iter()
                .any(|e| self.edge_owners.get(e).is_some_and(|o| o == player)),
        })
    }

    fn place_settlement(&mut self, seat: usize, vertex: &str) -> Vec<GameEvent> {
        let player = &mut self.players[seat];
        player.settlements.insert(vertex.to_string());
        self.vertex_owners.insert(vertex.to_string(), player.id.clone());
        vec![GameEvent::SettlementBuilt {
            player: player.id.clone(),
            vertex: vertex.to_string(),
        }]
    }

    /// Claim an edge and uncover any cloud hex it touches
    fn place_road(&mut self, seat: usize, edge: &str) -> Vec<GameEvent> {
        let player_id = self.players[seat].id.clone();
        self.players[seat].roads.insert(edge.to_string());
        self.edge_owners.insert(edge.to_string(), player_id.clone());

        let mut events = vec![GameEvent::RoadBuilt {
            player: player_id.clone(),
            edge: edge.to_string(),
        }];
        for hex in self.board.clouds_at_edge(edge) {
            if let Some(resource) = self.board.reveal_cloud(&hex) {
                self.grant_resource(seat, resource, 1);
                events.push(GameEvent::CloudRevealed {
                    player: player_id.clone(),
                    hex,
                    resource,
                });
            }
        }
        events
    }

    // ==================== Queries ====================

    /// Vertices where `player` could place a settlement right now
    pub fn valid_settlement_vertices(&self, player: &str) -> Vec<VertexId> {
        let setup = self.phase == GamePhase::Setup;
        self.board
            .graph
            .vertices
            .iter()
            .filter(|v| self.check_settlement_spot(&v.id).is_ok())
            .filter(|v| {
                setup
                    || self
                        .board
                        .graph
                        .edges_of_vertex(&v.id)
                        .iter()
                        .any(|e| self.edge_owners.get(e).is_some_and(|o| o == player))
            })
            .map(|v| v.id.clone())
            .collect()
    }

    /// Edges where `player` could place a road right now
    pub fn valid_road_edges(&self, player: &str) -> Vec<EdgeId> {
        if self.phase == GamePhase::Setup {
            let Some(last) = &self.setup.last_settlement else {
                return Vec::new();
            };
            return self
                .board
                .graph
                .edges_of_vertex(last)
                .iter()
                .filter(|e| self.check_road_spot(e).is_ok())
                .cloned()
                .collect();
        }
        self.board
            .graph
            .edges
            .iter()
            .filter(|e| self.check_road_spot(&e.id).is_ok() && self.road_connects(player, &e.id))
            .map(|e| e.id.clone())
            .collect()
    }
}
