//! Voronoi tile vectors and the nearest-seed coloring rule.

use serde::{Deserialize, Serialize};

/// One rate surface: tile seeds paired with log10 effects.
///
/// Seeds and effects are kept index-aligned; birth and death splice both
/// vectors together so the pairing never drifts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tessellation {
    /// Tile seed positions.
    pub seeds: Vec<[f64; 2]>,
    /// Tile effects on the log10 scale.
    pub effects: Vec<f64>,
}

impl Tessellation {
    /// Creates a single-tile tessellation.
    pub fn single(seed: [f64; 2], effect: f64) -> Self {
        Self {
            seeds: vec![seed],
            effects: vec![effect],
        }
    }

    /// Returns the number of tiles.
    pub fn num_tiles(&self) -> usize {
        self.seeds.len()
    }

    /// Returns a copy with one tile's effect replaced.
    pub fn with_effect(&self, tile: usize, effect: f64) -> Self {
        let mut next = self.clone();
        next.effects[tile] = effect;
        next
    }

    /// Returns a copy with one tile's seed replaced.
    pub fn with_seed(&self, tile: usize, seed: [f64; 2]) -> Self {
        let mut next = self.clone();
        next.seeds[tile] = seed;
        next
    }

    /// Returns a copy with a new tile appended.
    pub fn with_birth(&self, seed: [f64; 2], effect: f64) -> Self {
        let mut next = self.clone();
        next.seeds.push(seed);
        next.effects.push(effect);
        next
    }

    /// Returns a copy with one tile removed.
    pub fn with_death(&self, tile: usize) -> Self {
        let mut next = self.clone();
        next.seeds.remove(tile);
        next.effects.remove(tile);
        next
    }
}

/// Maps every point to its nearest seed by Euclidean distance, breaking ties
/// toward the lowest tile index.
pub fn assign_colors(seeds: &[[f64; 2]], points: &[[f64; 2]]) -> Vec<usize> {
    points
        .iter()
        .map(|p| {
            let mut best = 0usize;
            let mut best_dist = f64::INFINITY;
            for (tile, seed) in seeds.iter().enumerate() {
                let dx = p[0] - seed[0];
                let dy = p[1] - seed[1];
                let dist = dx * dx + dy * dy;
                if dist < best_dist {
                    best_dist = dist;
                    best = tile;
                }
            }
            best
        })
        .collect()
}
