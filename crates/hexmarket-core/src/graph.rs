//! Hex/vertex/edge adjacency graph.
//!
//! The builder turns an ordered list of axial coordinates into a flat arena of
//! hexes, vertices and edges addressed by string ids. Vertices are deduplicated
//! by their rounded pixel position, edges by the sorted pair of their vertex
//! indices. Ids are handed out in allocation order (`h0`, `v0`, `e0`, ...), so
//! building from the same input order always reproduces the same ids.
//!
//! The graph knows nothing about resources, owners or rules.

use crate::hex::{HexCoord, HEX_SIZE};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type HexId = String;
pub type VertexId = String;
pub type EdgeId = String;

/// A hex cell in the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HexNode {
    pub id: HexId,
    pub coord: HexCoord,
    /// Pixel centre
    pub center: (f64, f64),
}

/// A corner shared by up to three hexes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub id: VertexId,
    pub position: (f64, f64),
}

/// A side between two vertices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub vertices: [VertexId; 2],
    /// Pixel midpoint
    pub position: (f64, f64),
}

/// The complete board topology
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoardGraph {
    pub hexes: Vec<HexNode>,
    pub vertices: Vec<Vertex>,
    pub edges: Vec<Edge>,
    /// Hexes touching each vertex
    pub vertex_hexes: HashMap<VertexId, Vec<HexId>>,
    /// Vertices one edge away from each vertex
    pub vertex_neighbors: HashMap<VertexId, Vec<VertexId>>,
    /// Edges ending at each vertex
    pub vertex_edges: HashMap<VertexId, Vec<EdgeId>>,
    /// The six corners of each hex
    pub hex_vertices: HashMap<HexId, Vec<VertexId>>,
    #[serde(skip)]
    hex_index: HashMap<HexId, usize>,
    #[serde(skip)]
    vertex_index: HashMap<VertexId, usize>,
    #[serde(skip)]
    edge_index: HashMap<EdgeId, usize>,
}

/// Rounded pixel position used to merge corners shared by neighbouring hexes
fn position_key(x: f64, y: f64) -> (i64, i64) {
    ((x * 10.0).round() as i64, (y * 10.0).round() as i64)
}

impl BoardGraph {
    /// Build the graph for the given hexes, in order
    pub fn build(coords: &[HexCoord]) -> Self {
        let mut graph = BoardGraph::default();
        let mut vertex_keys: HashMap<(i64, i64), usize> = HashMap::new();
        let mut edge_keys: HashMap<(usize, usize), usize> = HashMap::new();

        for (hex_idx, coord) in coords.iter().enumerate() {
            let hex_id = format!("h{hex_idx}");
            graph.hex_index.insert(hex_id.clone(), hex_idx);
            graph.hexes.push(HexNode {
                id: hex_id.clone(),
                coord: *coord,
                center: coord.to_pixel(HEX_SIZE),
            });

            let mut corner_indices = [0usize; 6];
            for (i, (x, y)) in coord.corners(HEX_SIZE).into_iter().enumerate() {
                let key = position_key(x, y);
                let idx = *vertex_keys.entry(key).or_insert_with(|| {
                    let idx = graph.vertices.len();
                    let id = format!("v{idx}");
                    graph.vertex_index.insert(id.clone(), idx);
                    graph.vertices.push(Vertex {
                        id,
                        position: (x, y),
                    });
                    idx
                });
                corner_indices[i] = idx;

                let vertex_id = graph.vertices[idx].id.clone();
                let touching = graph.vertex_hexes.entry(vertex_id.clone()).or_default();
                if !touching.contains(&hex_id) {
                    touching.push(hex_id.clone());
                }
                graph
                    .hex_vertices
                    .entry(hex_id.clone())
                    .or_default()
                    .push(vertex_id);
            }

            for i in 0..6 {
                let a = corner_indices[i];
                let b = corner_indices[(i + 1) % 6];
                let key = (a.min(b), a.max(b));
                if edge_keys.contains_key(&key) {
                    continue;
                }
                let idx = graph.edges.len();
                edge_keys.insert(key, idx);

                let va = graph.vertices[key.0].clone();
                let vb = graph.vertices[key.1].clone();
                let id = format!("e{idx}");
                graph.edge_index.insert(id.clone(), idx);
                graph.edges.push(Edge {
                    id: id.clone(),
                    vertices: [va.id.clone(), vb.id.clone()],
                    position: (
                        (va.position.0 + vb.position.0) / 2.0,
                        (va.position.1 + vb.position.1) / 2.0,
                    ),
                });

                graph.vertex_edges.entry(va.id.clone()).or_default().push(id.clone());
                graph.vertex_edges.entry(vb.id.clone()).or_default().push(id);
                graph
                    .vertex_neighbors
                    .entry(va.id.clone())
                    .or_default()
                    .push(vb.id.clone());
                graph.vertex_neighbors.entry(vb.id).or_default().push(va.id);
            }
        }

        graph
    }

    /// Rebuild the id lookup tables (they are not serialized)
    pub fn reindex(&mut self) {
        self.hex_index = self.hexes.iter().enumerate().map(|(i, h)| (h.id.clone(), i)).collect();
        self.vertex_index = self
            .vertices
            .iter()
            .enumerate()
            .map(|(i, v)| (v.id.clone(), i))
            .collect();
        self.edge_index = self.edges.iter().enumerate().map(|(i, e)| (e.id.clone(), i)).collect();
    }

    pub fn hex(&self, id: &str) -> Option<&HexNode> {
        self.hex_index.get(id).map(|&i| &self.hexes[i])
    }

    pub fn vertex(&self, id: &str) -> Option<&Vertex> {
        self.vertex_index.get(id).map(|&i| &self.vertices[i])
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edge_index.get(id).map(|&i| &self.edges[i])
    }

    pub fn hexes_of_vertex(&self, vertex: &str) -> &[HexId] {
        self.vertex_hexes.get(vertex).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn neighbors_of_vertex(&self, vertex: &str) -> &[VertexId] {
        self.vertex_neighbors.get(vertex).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn edges_of_vertex(&self, vertex: &str) -> &[EdgeId] {
        self.vertex_edges.get(vertex).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn vertices_of_hex(&self, hex: &str) -> &[VertexId] {
        self.hex_vertices.get(hex).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Hexes on either side of an edge (the hexes both endpoints touch)
    pub fn hexes_of_edge(&self, edge: &str) -> Vec<HexId> {
        let Some(edge) = self.edge(edge) else {
            return Vec::new();
        };
        let [a, b] = &edge.vertices;
        let b_hexes = self.hexes_of_vertex(b);
        self.hexes_of_vertex(a)
            .iter()
            .filter(|h| b_hexes.contains(h))
            .cloned()
            .collect()
    }

    /// The vertex at the other end of `edge` from `vertex`
    pub fn other_end(&self, edge: &str, vertex: &str) -> Option<&VertexId> {
        let edge = self.edge(edge)?;
        match &edge.vertices {
            [a, b] if a == vertex => Some(b),
            [a, b] if b == vertex => Some(a),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_hex() {
        let graph = BoardGraph::build(&[HexCoord::new(0, 0)]);
        assert_eq!(graph.hexes.len(), 1);
        assert_eq!(graph.vertices.len(), 6);
        assert_eq!(graph.edges.len(), 6);
        for v in &graph.vertices {
            assert_eq!(graph.neighbors_of_vertex(&v.id).len(), 2);
            assert_eq!(graph.edges_of_vertex(&v.id).len(), 2);
            assert_eq!(graph.hexes_of_vertex(&v.id), &["h0".to_string()]);
        }
    }

    #[test]
    fn test_two_hexes_share_an_edge() {
        let graph = BoardGraph::build(&[HexCoord::new(0, 0), HexCoord::new(1, 0)]);
        assert_eq!(graph.vertices.len(), 10);
        assert_eq!(graph.edges.len(), 11);

        let shared: Vec<_> = graph
            .edges
            .iter()
            .filter(|e| graph.hexes_of_edge(&e.id).len() == 2)
            .collect();
        assert_eq!(shared.len(), 1);
    }

    #[test]
    fn test_standard_radius_two_counts() {
        let coords = HexCoord::new(0, 0).spiral(2);
        let graph = BoardGraph::build(&coords);
        assert_eq!(graph.hexes.len(), 19);
        assert_eq!(graph.vertices.len(), 54);
        assert_eq!(graph.edges.len(), 72);
    }

    #[test]
    fn test_ids_are_deterministic() {
        let coords = HexCoord::new(0, 0).spiral(2);
        let a = BoardGraph::build(&coords);
        let b = BoardGraph::build(&coords);
        let ids_a: Vec<_> = a.edges.iter().map(|e| e.vertices.clone()).collect();
        let ids_b: Vec<_> = b.edges.iter().map(|e| e.vertices.clone()).collect();
        assert_eq!(ids_a, ids_b);
        assert_eq!(a.vertices.first().map(|v| v.id.as_str()), Some("v0"));
    }

    #[test]
    fn test_neighbors_are_symmetric() {
        let graph = BoardGraph::build(&HexCoord::new(0, 0).spiral(1));
        for v in &graph.vertices {
            for n in graph.neighbors_of_vertex(&v.id) {
                assert!(graph.neighbors_of_vertex(n).contains(&v.id));
            }
        }
    }

    #[test]
    fn test_other_end() {
        let graph = BoardGraph::build(&[HexCoord::new(0, 0)]);
        let edge = &graph.edges[0];
        let [a, b] = &edge.vertices;
        assert_eq!(graph.other_end(&edge.id, a), Some(b));
        assert_eq!(graph.other_end(&edge.id, b), Some(a));
        assert_eq!(graph.other_end(&edge.id, "nope"), None);
    }

    #[test]
    fn test_reindex_after_roundtrip() {
        let graph = BoardGraph::build(&[HexCoord::new(0, 0)]);
        let json = serde_json::to_string(&graph).unwrap();
        let mut back: BoardGraph = serde_json::from_str(&json).unwrap();
        assert!(back.vertex("v0").is_none());
        back.reindex();
        assert!(back.vertex("v0").is_some());
    }
}
