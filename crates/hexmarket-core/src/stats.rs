//! Derived statistics: longest road, largest army, victory points, winner.
//!
//! Everything here is a pure function of ownership and counters, so it is
//! simply recomputed after every accepted command.

use crate::actions::GameEvent;
use crate::game::{GamePhase, GameState, Winner};
use crate::graph::{BoardGraph, EdgeId};
use crate::player::PlayerId;
use std::collections::{BTreeSet, HashSet};

/// Knights needed for largest army
pub const ARMY_MIN_KNIGHTS: u32 = 3;

/// Road length needed for longest road
pub const ROAD_MIN_LENGTH: u32 = 5;

/// Length of the longest trail through `roads`.
///
/// `blocked` marks vertices held by an opponent: a trail may end on one but
/// not pass through it. Coming back to the start vertex closes a loop and
/// ends the trail.
pub fn longest_road(graph: &BoardGraph, roads: &BTreeSet<EdgeId>, blocked: impl Fn(&str) -> bool) -> u32 {
    let starts: BTreeSet<&str> = roads
        .iter()
        .filter_map(|e| graph.edge(e))
        .flat_map(|e| e.vertices.iter().map(String::as_str))
        .collect();

    let mut best = 0;
    for start in starts {
        let mut used = HashSet::new();
        best = best.max(extend_trail(graph, roads, &blocked, start, start, &mut used));
    }
    best
}

fn extend_trail<'a>(
    graph: &'a BoardGraph,
    roads: &BTreeSet<EdgeId>,
    blocked: &impl Fn(&str) -> bool,
    start: &str,
    at: &str,
    used: &mut HashSet<&'a str>,
) -> u32 {
    let mut best = 0;
    for edge in graph.edges_of_vertex(at) {
        if !roads.contains(edge) || used.contains(edge.as_str()) {
            continue;
        }
        let Some(next) = graph.other_end(edge, at) else {
            continue;
        };
        used.insert(edge.as_str());
        let rest = if next == start || blocked(next.as_str()) {
            0
        } else {
            extend_trail(graph, roads, blocked, start, next, used)
        };
        used.remove(edge.as_str());
        best = best.max(1 + rest);
    }
    best
}

/// The single player strictly ahead of everyone at `value >= min`, if any
fn unique_leader(values: &[(PlayerId, u32)], min: u32) -> Option<PlayerId> {
    let max = values.iter().map(|(_, v)| *v).max()?;
    if max < min {
        return None;
    }
    let mut leaders = values.iter().filter(|(_, v)| *v == max);
    let leader = leaders.next()?;
    leaders.next().is_none().then(|| leader.0.clone())
}

impl GameState {
    /// Refresh road lengths, awards and points; finish the game on a winner
    pub(crate) fn recompute_stats(&mut self) -> Vec<GameEvent> {
        let mut events = Vec::new();

        let lengths: Vec<(PlayerId, u32)> = self
            .players
            .iter()
            .map(|p| {
                let length = longest_road(&self.board.graph, &p.roads, |v| {
                    self.vertex_owners.get(v).is_some_and(|o| *o != p.id)
                });
                (p.id.clone(), length)
            })
            .collect();
        let knights: Vec<(PlayerId, u32)> = self
            .players
            .iter()
            .map(|p| (p.id.clone(), p.played_knights))
            .collect();

        let road_holder = unique_leader(&lengths, ROAD_MIN_LENGTH);
        let army_holder = unique_leader(&knights, ARMY_MIN_KNIGHTS);
        let previous_road = self.players.iter().find(|p| p.has_longest_road).map(|p| p.id.clone());
        let previous_army = self.players.iter().find(|p| p.has_largest_army).map(|p| p.id.clone());

        for (player, (_, length)) in self.players.iter_mut().zip(&lengths) {
            player.longest_road = *length;
            player.has_longest_road = road_holder.as_deref() == Some(player.id.as_str());
            player.has_largest_army = army_holder.as_deref() == Some(player.id.as_str());
            player.victory_points = player.compute_victory_points();
        }

        if previous_road != road_holder {
            let length = lengths.iter().map(|(_, l)| *l).max().unwrap_or(0);
            events.push(GameEvent::LongestRoadChanged {
                previous: previous_road,
                current: road_holder,
                length,
            });
        }
        if previous_army != army_holder {
            let knights = knights.iter().map(|(_, k)| *k).max().unwrap_or(0);
            events.push(GameEvent::LargestArmyChanged {
                previous: previous_army,
                current: army_holder,
                knights,
            });
        }

        if matches!(self.phase, GamePhase::Setup | GamePhase::Turn) {
            if let Some((winner, victory_points)) = self.find_winner() {
                events.push(GameEvent::GameWon {
                    winner: winner.clone(),
                    victory_points,
                });
                self.enter_phase(GamePhase::Finished { winner }, &mut events);
            }
        }
        events
    }

    /// Team totals in team mode, otherwise players starting from the turn-holder
    fn find_winner(&self) -> Option<(Winner, u32)> {
        let target = self.settings.win_points;
        if self.settings.team_mode {
            return (0..=1)
                .map(|t| (t, self.team_points(t)))
                .find(|(_, points)| *points >= target)
                .map(|(t, points)| (Winner::Team(t), points));
        }
        let seats = self.players.len();
        (0..seats)
            .map(|i| &self.players[(self.current + i) % seats])
            .find(|p| p.victory_points >= target)
            .map(|p| (Winner::Player(p.id.clone()), p.victory_points))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::test_support::*;
    use crate::hex::HexCoord;

    fn ring() -> BoardGraph {
        BoardGraph::build(&[HexCoord::new(0, 0)])
    }

    /// `count` edges walked around the hex, with the vertices visited
    fn trail(graph: &BoardGraph, count: usize) -> (BTreeSet<EdgeId>, Vec<String>) {
        let mut edges = BTreeSet::new();
        let mut path = vec![graph.vertices[0].id.clone()];
        while edges.len() < count {
            let at = path.last().unwrap().clone();
            let edge = graph
                .edges_of_vertex(&at)
                .iter()
                .find(|e| !edges.contains(*e))
                .unwrap()
                .clone();
            path.push(graph.other_end(&edge, &at).unwrap().clone());
            edges.insert(edge);
        }
        (edges, path)
    }

    #[test]
    fn test_longest_road_basics() {
        let graph = ring();
        assert_eq!(longest_road(&graph, &BTreeSet::new(), |_| false), 0);
        assert_eq!(longest_road(&graph, &trail(&graph, 1).0, |_| false), 1);
        assert_eq!(longest_road(&graph, &trail(&graph, 4).0, |_| false), 4);
    }

    #[test]
    fn test_closed_loop_counts_every_edge() {
        let graph = ring();
        assert_eq!(longest_road(&graph, &trail(&graph, 6).0, |_| false), 6);
    }

    #[test]
    fn test_opponent_vertex_cuts_the_road() {
        let graph = ring();
        let (edges, path) = trail(&graph, 4);
        let middle = path[2].clone();
        assert_eq!(longest_road(&graph, &edges, |v| v == middle), 2);
        // An opponent at the end only stops the trail there
        let end = path[4].clone();
        assert_eq!(longest_road(&graph, &edges, |v| v == end), 4);
    }

    #[test]
    fn test_unique_leader() {
        let values = vec![("a".to_string(), 3), ("b".to_string(), 2)];
        assert_eq!(unique_leader(&values, 3), Some("a".to_string()));
        assert_eq!(unique_leader(&values, 4), None);
        let tied = vec![("a".to_string(), 4), ("b".to_string(), 4)];
        assert_eq!(unique_leader(&tied, 3), None);
        assert_eq!(unique_leader(&[], 3), None);
    }

    #[test]
    fn test_largest_army_requires_unique_three() {
        let mut game = turn_game(70);
        game.players[0].played_knights = 2;
        game.recompute_stats();
        assert!(!game.players[0].has_largest_army);

        game.players[0].played_knights = 3;
        let events = game.recompute_stats();
        assert!(game.players[0].has_largest_army);
        assert!(matches!(events[0], GameEvent::LargestArmyChanged { knights: 3, .. }));
        assert_eq!(game.players[0].victory_points, 4);

        game.players[1].played_knights = 3;
        game.recompute_stats();
        assert!(!game.players[0].has_largest_army);
        assert!(!game.players[1].has_largest_army);
    }

    #[test]
    fn test_reaching_target_finishes_the_game() {
        let mut game = turn_game(71);
        game.settings.win_points = 3;
        game.players[1].dev_cards.push(crate::player::DevCard::VictoryPoint);
        let events = game.recompute_stats();

        assert!(matches!(
            events.last(),
            Some(GameEvent::PhaseChanged {
                phase: GamePhase::Finished { .. }
            })
        ));
        assert_eq!(
            game.phase,
            GamePhase::Finished {
                winner: Winner::Player("b".into())
            }
        );
    }
}
