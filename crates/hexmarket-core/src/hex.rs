//! Hex coordinate system using axial coordinates (q, r).
//!
//! This module only knows about geometry:
//! - `HexCoord`: identifies a hex cell and its neighbours
//! - Pixel conversion for hex centres and corners (pointy-top layout)
//!
//! Vertices and edges are not coordinates here. They are discovered by the
//! graph builder from corner positions, see [`crate::graph`].

use serde::{Deserialize, Serialize};

/// Radius (centre to corner) of a hex in pixel space.
pub const HEX_SIZE: f64 = 60.0;

/// Axial coordinate for hex grid.
///
/// In axial coordinates:
/// - `q` increases going east (right)
/// - `r` increases going southeast
/// - The third coordinate `s` (not stored) satisfies: q + r + s = 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct HexCoord {
    /// Column (increases going east)
    pub q: i32,
    /// Row (increases going southeast)
    pub r: i32,
}

impl HexCoord {
    /// Create a new hex coordinate
    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    /// The implicit third coordinate (s = -q - r)
    pub const fn s(&self) -> i32 {
        -self.q - self.r
    }

    /// The six neighboring hexes in clockwise order starting from East
    pub fn neighbors(&self) -> [HexCoord; 6] {
        [
            HexCoord::new(self.q + 1, self.r),     // East
            HexCoord::new(self.q + 1, self.r - 1), // NorthEast
            HexCoord::new(self.q, self.r - 1),     // NorthWest
            HexCoord::new(self.q - 1, self.r),     // West
            HexCoord::new(self.q - 1, self.r + 1), // SouthWest
            HexCoord::new(self.q, self.r + 1),     // SouthEast
        ]
    }

    /// Distance to another hex (in hex steps)
    pub fn distance_to(&self, other: &HexCoord) -> u32 {
        let dq = (self.q - other.q).abs();
        let dr = (self.r - other.r).abs();
        let ds = (self.s() - other.s()).abs();
        ((dq + dr + ds) / 2) as u32
    }

    /// Whether two hexes share a side
    pub fn is_adjacent(&self, other: &HexCoord) -> bool {
        self.distance_to(other) == 1
    }

    /// All hexes within `radius` steps of this one, ring by ring
    pub fn spiral(&self, radius: u32) -> Vec<HexCoord> {
        let radius = radius as i32;
        let mut out = Vec::new();
        for r in -radius..=radius {
            for q in -radius..=radius {
                let hex = HexCoord::new(self.q + q, self.r + r);
                if self.distance_to(&hex) as i32 <= radius {
                    out.push(hex);
                }
            }
        }
        out.sort_by_key(|h| (self.distance_to(h), h.r, h.q));
        out
    }

    /// Convert to pixel coordinates (center of hex)
    /// Uses pointy-top orientation with the given hex size (radius)
    pub fn to_pixel(&self, hex_size: f64) -> (f64, f64) {
        let x = hex_size * (3.0_f64.sqrt() * self.q as f64 + 3.0_f64.sqrt() / 2.0 * self.r as f64);
        let y = hex_size * (3.0 / 2.0 * self.r as f64);
        (x, y)
    }

    /// The six corner positions, clockwise starting from the upper-right corner
    pub fn corners(&self, hex_size: f64) -> [(f64, f64); 6] {
        let (cx, cy) = self.to_pixel(hex_size);
        std::array::from_fn(|i| {
            let angle = (60.0 * i as f64 - 30.0).to_radians();
            (cx + hex_size * angle.cos(), cy + hex_size * angle.sin())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_hex_neighbors() {
        let center = HexCoord::new(0, 0);
        let neighbors = center.neighbors();

        let unique: HashSet<_> = neighbors.iter().collect();
        assert_eq!(unique.len(), 6);

        for neighbor in &neighbors {
            assert_eq!(center.distance_to(neighbor), 1);
            assert!(center.is_adjacent(neighbor));
        }
    }

    #[test]
    fn test_hex_distance() {
        let a = HexCoord::new(0, 0);
        assert_eq!(a.distance_to(&HexCoord::new(2, -1)), 2);
        assert_eq!(a.distance_to(&HexCoord::new(-3, 3)), 3);
    }

    #[test]
    fn test_spiral_sizes() {
        let origin = HexCoord::new(0, 0);
        assert_eq!(origin.spiral(0), vec![origin]);
        assert_eq!(origin.spiral(1).len(), 7);
        assert_eq!(origin.spiral(2).len(), 19);
        assert_eq!(origin.spiral(2)[0], origin);
    }

    #[test]
    fn test_adjacent_hexes_share_two_corners() {
        let a = HexCoord::new(0, 0).corners(HEX_SIZE);
        let b = HexCoord::new(1, 0).corners(HEX_SIZE);
        let shared = a
            .iter()
            .filter(|p| b.iter().any(|q| (p.0 - q.0).abs() < 0.01 && (p.1 - q.1).abs() < 0.01))
            .count();
        assert_eq!(shared, 2);
    }

    #[test]
    fn test_corners_are_hex_size_from_center() {
        let hex = HexCoord::new(2, -1);
        let (cx, cy) = hex.to_pixel(HEX_SIZE);
        for (x, y) in hex.corners(HEX_SIZE) {
            let d = ((x - cx).powi(2) + (y - cy).powi(2)).sqrt();
            assert!((d - HEX_SIZE).abs() < 1e-9);
        }
    }
}
