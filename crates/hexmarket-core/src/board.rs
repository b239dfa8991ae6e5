//! Game board: tiles, harbors and the robber on top of a [`BoardGraph`].
//!
//! This module contains:
//! - Resource and tile kinds
//! - The standard map, the team draft map and custom boards
//! - Harbor (port) placement around the rim
//! - Land/production queries used by the command handlers

use crate::graph::{BoardGraph, HexId, VertexId};
use crate::hex::HexCoord;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Resource types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Brick,
    Lumber,
    Ore,
    Grain,
    Wool,
    /// Never traded or discarded; converted into another resource by choice
    Gold,
}

impl Resource {
    /// Resources that can be traded, discarded and stolen
    pub const TRADABLE: [Resource; 5] = [
        Resource::Brick,
        Resource::Lumber,
        Resource::Ore,
        Resource::Grain,
        Resource::Wool,
    ];

    pub fn is_tradable(&self) -> bool {
        !matches!(self, Resource::Gold)
    }
}

/// Type of hex tile on the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "resource", rename_all = "camelCase")]
pub enum TileKind {
    /// Produces a resource when its number is rolled
    Resource(Resource),
    /// No production
    Desert,
    /// Not part of the playable land
    Water,
    /// Hides a resource until a road reaches it
    Cloud(Resource),
    /// Pays out development cards instead of resources
    DevBonus,
}

impl TileKind {
    pub fn is_land(&self) -> bool {
        !matches!(self, TileKind::Water)
    }

    /// Whether a number token may sit on this kind of tile
    pub fn takes_number(&self) -> bool {
        !matches!(self, TileKind::Desert | TileKind::Water)
    }
}

/// A single hex tile on the board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HexTile {
    pub id: HexId,
    pub coord: HexCoord,
    pub center: (f64, f64),
    pub kind: TileKind,
    /// Dice number that triggers production (2-12, None for desert/water)
    pub number: Option<u8>,
    /// Empty island slot waiting for a drafted tile
    #[serde(default)]
    pub placeholder: bool,
}

impl HexTile {
    pub fn is_land(&self) -> bool {
        self.kind.is_land()
    }
}

/// Harbor types for bank trading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortKind {
    /// 3:1 trade any resource
    Generic,
    /// 2:1 trade for a specific resource
    Specific(Resource),
}

impl PortKind {
    /// The exchange rate for this harbor
    pub fn ratio(&self) -> u32 {
        match self {
            PortKind::Generic => 3,
            PortKind::Specific(_) => 2,
        }
    }

    /// Rate this port gives when trading away `give`, if it applies
    pub fn ratio_for(&self, give: Resource) -> Option<u32> {
        match self {
            PortKind::Generic => Some(3),
            PortKind::Specific(r) if *r == give => Some(2),
            PortKind::Specific(_) => None,
        }
    }
}

/// Kinds cycled through by default port placement
const PORT_TEMPLATE: [PortKind; 9] = [
    PortKind::Generic,
    PortKind::Specific(Resource::Brick),
    PortKind::Generic,
    PortKind::Specific(Resource::Lumber),
    PortKind::Generic,
    PortKind::Specific(Resource::Wool),
    PortKind::Generic,
    PortKind::Specific(Resource::Grain),
    PortKind::Specific(Resource::Ore),
];

/// Harbor anchored on a rim vertex
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub id: String,
    pub vertex: VertexId,
    /// Extra vertices that also grant access to this harbor
    pub bridges: Vec<VertexId>,
    pub kind: PortKind,
}

impl Port {
    /// Whether `vertex` gives access to this harbor
    pub fn touches(&self, vertex: &str) -> bool {
        self.vertex == vertex || self.bridges.iter().any(|b| b == vertex)
    }
}

/// Hex description accepted by custom boards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HexSpec {
    pub q: i32,
    pub r: i32,
    pub kind: TileKind,
    #[serde(default)]
    pub number: Option<u8>,
    #[serde(default)]
    pub placeholder: bool,
}

impl HexSpec {
    pub fn new(q: i32, r: i32, kind: TileKind, number: Option<u8>) -> Self {
        Self {
            q,
            r,
            kind,
            number,
            placeholder: false,
        }
    }
}

/// Port description accepted by custom boards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortSpec {
    pub vertex: VertexId,
    #[serde(default)]
    pub bridges: Vec<VertexId>,
    pub kind: PortKind,
}

/// Reasons a board description is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum BoardError {
    #[error("board has no land hexes")]
    NoLand,

    #[error("hex ({0}, {1}) appears twice")]
    DuplicateHex(i32, i32),

    #[error("number {0} is not a valid token")]
    InvalidNumber(u8),

    #[error("hex ({0}, {1}) cannot carry a number token")]
    NumberOnBarrenHex(i32, i32),

    #[error("port references unknown vertex {0}")]
    UnknownPortVertex(String),
}

/// Standard dice number distribution
pub const STANDARD_NUMBERS: [u8; 18] = [2, 3, 3, 4, 4, 5, 5, 6, 6, 8, 8, 9, 9, 10, 10, 11, 11, 12];

/// The complete game board
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Board {
    pub graph: BoardGraph,
    /// Tiles in graph hex order (tile `i` is hex `h{i}`)
    pub tiles: Vec<HexTile>,
    pub ports: Vec<Port>,
    /// Current robber location
    pub robber: Option<HexId>,
}

impl Board {
    /// Build a board from hex descriptions without any ports
    pub fn from_specs(specs: &[HexSpec]) -> Result<Self, BoardError> {
        let mut seen = HashSet::new();
        for spec in specs {
            if !seen.insert((spec.q, spec.r)) {
                return Err(BoardError::DuplicateHex(spec.q, spec.r));
            }
            if let Some(n) = spec.number {
                if !(2..=12).contains(&n) || n == 7 {
                    return Err(BoardError::InvalidNumber(n));
                }
                if !spec.kind.takes_number() {
                    return Err(BoardError::NumberOnBarrenHex(spec.q, spec.r));
                }
            }
        }
        if !specs.iter().any(|s| s.kind.is_land()) {
            return Err(BoardError::NoLand);
        }

        let coords: Vec<HexCoord> = specs.iter().map(|s| HexCoord::new(s.q, s.r)).collect();
        let graph = BoardGraph::build(&coords);
        let tiles: Vec<HexTile> = graph
            .hexes
            .iter()
            .zip(specs)
            .map(|(node, spec)| HexTile {
                id: node.id.clone(),
                coord: node.coord,
                center: node.center,
                kind: spec.kind,
                number: spec.number,
                placeholder: spec.placeholder,
            })
            .collect();

        let robber = tiles
            .iter()
            .find(|t| t.kind == TileKind::Desert && !t.placeholder)
            .map(|t| t.id.clone());

        Ok(Self {
            graph,
            tiles,
            ports: Vec::new(),
            robber,
        })
    }

    /// Build a custom board; ports are used as given, or placed by default when absent
    pub fn custom(specs: &[HexSpec], ports: Option<Vec<PortSpec>>) -> Result<Self, BoardError> {
        let mut board = Self::from_specs(specs)?;
        match ports {
            Some(ports) => {
                for (i, spec) in ports.into_iter().enumerate() {
                    for v in std::iter::once(&spec.vertex).chain(spec.bridges.iter()) {
                        if board.graph.vertex(v).is_none() {
                            return Err(BoardError::UnknownPortVertex(v.clone()));
                        }
                    }
                    board.ports.push(Port {
                        id: format!("p{i}"),
                        vertex: spec.vertex,
                        bridges: spec.bridges,
                        kind: spec.kind,
                    });
                }
            }
            None => board.place_default_ports(),
        }
        Ok(board)
    }

    /// The standard 19-hex map with randomized tiles and numbers
    pub fn standard<R: Rng>(rng: &mut R) -> Result<Self, BoardError> {
        let land_coords = HexCoord::new(0, 0).spiral(2);

        let mut kinds: Vec<TileKind> = Vec::with_capacity(19);
        for (resource, count) in [
            (Resource::Lumber, 4),
            (Resource::Grain, 4),
            (Resource::Wool, 4),
            (Resource::Ore, 3),
            (Resource::Brick, 3),
        ] {
            kinds.extend(std::iter::repeat(TileKind::Resource(resource)).take(count));
        }
        kinds.push(TileKind::Desert);
        kinds.shuffle(rng);

        let resource_coords: Vec<HexCoord> = land_coords
            .iter()
            .zip(&kinds)
            .filter(|(_, k)| k.takes_number())
            .map(|(c, _)| *c)
            .collect();
        let numbers = assign_numbers_avoiding_adjacent_68(&resource_coords, &STANDARD_NUMBERS, rng);
        let number_at: HashMap<HexCoord, u8> = resource_coords.into_iter().zip(numbers).collect();

        let mut specs: Vec<HexSpec> = land_coords
            .iter()
            .zip(&kinds)
            .map(|(coord, kind)| HexSpec::new(coord.q, coord.r, *kind, number_at.get(coord).copied()))
            .collect();
        for coord in ocean_ring(&land_coords) {
            specs.push(HexSpec::new(coord.q, coord.r, TileKind::Water, None));
        }

        let mut board = Self::from_specs(&specs)?;
        board.place_default_ports();
        Ok(board)
    }

    /// Two islands of placeholder slots separated by a water channel.
    ///
    /// Each island has six slots and one cloud hex; a neutral desert sits at
    /// the origin and holds the robber.
    pub fn draft_template<R: Rng>(rng: &mut R) -> Result<Self, BoardError> {
        let top_island = [(0, -2), (1, -2), (2, -2), (-1, -1), (0, -1), (1, -1), (2, -1)];
        let bottom_island = [(-2, 1), (-1, 1), (0, 1), (1, 1), (-2, 2), (-1, 2), (0, 2)];
        let clouds = [(2, -2), (-2, 2)];

        let mut numbers = STANDARD_NUMBERS.to_vec();
        numbers.retain(|n| *n != 6 && *n != 8);
        numbers.shuffle(rng);
        let mut numbers = numbers.into_iter();

        let mut specs = Vec::new();
        for (q, r) in top_island.into_iter().chain(bottom_island) {
            if clouds.contains(&(q, r)) {
                let hidden = *Resource::TRADABLE.choose(rng).unwrap_or(&Resource::Grain);
                specs.push(HexSpec::new(q, r, TileKind::Cloud(hidden), numbers.next()));
            } else {
                specs.push(HexSpec {
                    placeholder: true,
                    ..HexSpec::new(q, r, TileKind::Desert, None)
                });
            }
        }
        specs.push(HexSpec::new(0, 0, TileKind::Desert, None));
        for q in [-2, -1, 1, 2] {
            specs.push(HexSpec::new(q, 0, TileKind::Water, None));
        }

        let land: Vec<HexCoord> = specs.iter().map(|s| HexCoord::new(s.q, s.r)).collect();
        for coord in ocean_ring(&land) {
            specs.push(HexSpec::new(coord.q, coord.r, TileKind::Water, None));
        }

        let mut board = Self::from_specs(&specs)?;
        board.place_default_ports();
        Ok(board)
    }

    // ==================== Ports ====================

    /// Rim vertices: touch land, but fewer than three land hexes
    pub fn rim_vertices(&self) -> Vec<VertexId> {
        self.graph
            .vertices
            .iter()
            .filter(|v| {
                let land = self.land_hex_count(&v.id);
                land > 0 && land < 3
            })
            .map(|v| v.id.clone())
            .collect()
    }

    /// Spread nine ports by angle around the land centroid
    pub fn place_default_ports(&mut self) {
        self.ports.clear();

        let land: Vec<&HexTile> = self.tiles.iter().filter(|t| t.is_land()).collect();
        if land.is_empty() {
            return;
        }
        let cx = land.iter().map(|t| t.center.0).sum::<f64>() / land.len() as f64;
        let cy = land.iter().map(|t| t.center.1).sum::<f64>() / land.len() as f64;

        let mut rim: Vec<(f64, VertexId)> = self
            .rim_vertices()
            .into_iter()
            .filter_map(|id| {
                let (x, y) = self.graph.vertex(&id)?.position;
                Some(((y - cy).atan2(x - cx), id))
            })
            .collect();
        rim.sort_by(|a, b| a.0.total_cmp(&b.0));
        if rim.is_empty() {
            return;
        }

        let count = PORT_TEMPLATE.len().min(rim.len());
        let step = rim.len() as f64 / count as f64;
        for (i, kind) in PORT_TEMPLATE.iter().take(count).enumerate() {
            let vertex = rim[(i as f64 * step) as usize].1.clone();
            let bridges = self
                .graph
                .neighbors_of_vertex(&vertex)
                .iter()
                .filter(|n| {
                    let land = self.land_hex_count(n);
                    land > 0 && land < 3
                })
                .cloned()
                .collect();
            self.ports.push(Port {
                id: format!("p{i}"),
                vertex,
                bridges,
                kind: *kind,
            });
        }
    }

    // ==================== Query Methods ====================

    pub fn tile(&self, id: &str) -> Option<&HexTile> {
        self.tiles.iter().find(|t| t.id == id)
    }

    pub fn tile_mut(&mut self, id: &str) -> Option<&mut HexTile> {
        self.tiles.iter_mut().find(|t| t.id == id)
    }

    pub fn land_tiles(&self) -> impl Iterator<Item = &HexTile> {
        self.tiles.iter().filter(|t| t.is_land())
    }

    pub fn is_land_hex(&self, id: &str) -> bool {
        self.tile(id).is_some_and(HexTile::is_land)
    }

    fn land_hex_count(&self, vertex: &str) -> usize {
        self.graph
            .hexes_of_vertex(vertex)
            .iter()
            .filter(|h| self.is_land_hex(h))
            .count()
    }

    /// Whether a vertex touches at least one land hex
    pub fn vertex_on_land(&self, vertex: &str) -> bool {
        self.land_hex_count(vertex) > 0
    }

    /// Whether an edge borders at least one land hex
    pub fn edge_on_land(&self, edge: &str) -> bool {
        self.graph.hexes_of_edge(edge).iter().any(|h| self.is_land_hex(h))
    }

    /// Land tiles around a vertex
    pub fn tiles_at_vertex(&self, vertex: &str) -> Vec<&HexTile> {
        self.graph
            .hexes_of_vertex(vertex)
            .iter()
            .filter_map(|h| self.tile(h))
            .filter(|t| t.is_land())
            .collect()
    }

    /// Unrevealed cloud hexes touching an edge
    pub fn clouds_at_edge(&self, edge: &str) -> Vec<HexId> {
        self.graph
            .hexes_of_edge(edge)
            .into_iter()
            .filter(|h| matches!(self.tile(h).map(|t| t.kind), Some(TileKind::Cloud(_))))
            .collect()
    }

    /// Turn a cloud into the resource it hides; returns that resource
    pub fn reveal_cloud(&mut self, hex: &str) -> Option<Resource> {
        let tile = self.tile_mut(hex)?;
        match tile.kind {
            TileKind::Cloud(hidden) => {
                tile.kind = TileKind::Resource(hidden);
                Some(hidden)
            }
            _ => None,
        }
    }

    /// Ports with at least one access vertex accepted by `controls`
    pub fn ports_controlled(&self, controls: impl Fn(&str) -> bool) -> Vec<&Port> {
        self.ports
            .iter()
            .filter(|p| controls(&p.vertex) || p.bridges.iter().any(|b| controls(b)))
            .collect()
    }

    /// Move the robber to a new hex, returning where it stood
    pub fn move_robber(&mut self, hex: HexId) -> Option<HexId> {
        self.robber.replace(hex)
    }

    /// Numbered land hexes whose token may be altered by spells
    pub fn has_cold_number(&self, hex: &str) -> bool {
        self.tile(hex)
            .and_then(|t| t.number)
            .is_some_and(|n| n != 6 && n != 8)
    }
}

/// Water hexes bordering the given land
fn ocean_ring(land: &[HexCoord]) -> Vec<HexCoord> {
    let occupied: HashSet<HexCoord> = land.iter().copied().collect();
    let mut ring = Vec::new();
    for coord in land {
        for neighbor in coord.neighbors() {
            if !occupied.contains(&neighbor) && !ring.contains(&neighbor) {
                ring.push(neighbor);
            }
        }
    }
    ring
}

/// Assign dice numbers to positions while trying to avoid 6 and 8 being adjacent
fn assign_numbers_avoiding_adjacent_68<R: Rng>(
    coords: &[HexCoord],
    numbers: &[u8],
    rng: &mut R,
) -> Vec<u8> {
    const MAX_ATTEMPTS: usize = 100;

    let mut shuffled = numbers.to_vec();
    for _ in 0..MAX_ATTEMPTS {
        shuffled.shuffle(rng);
        if is_valid_number_placement(coords, &shuffled) {
            break;
        }
    }
    shuffled
}

/// Check if a number placement is valid (no adjacent 6 and 8)
fn is_valid_number_placement(coords: &[HexCoord], numbers: &[u8]) -> bool {
    let hot: Vec<HexCoord> = coords
        .iter()
        .zip(numbers)
        .filter(|(_, n)| **n == 6 || **n == 8)
        .map(|(c, _)| *c)
        .collect();

    hot.iter()
        .enumerate()
        .all(|(i, a)| hot[i + 1..].iter().all(|b| !a.is_adjacent(b)))
}
