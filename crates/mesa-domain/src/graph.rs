//! Deme graph: coordinates, undirected edges, observed-prefix ordering.

use std::collections::BTreeSet;

use mesa_core::errors::{ErrorInfo, MesaError};
use serde::{Deserialize, Serialize};

/// Immutable population graph over demes.
///
/// Demes are indexed `0..num_demes()`; the first `num_observed()` indices are
/// the observed demes and carry sampled individuals. Edges are undirected,
/// deduplicated, and stored with the smaller endpoint first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemeGraph {
    coords: Vec<[f64; 2]>,
    edges: Vec<(usize, usize)>,
    num_observed: usize,
}

impl DemeGraph {
    /// Builds a graph from deme coordinates, undirected edges, and the count
    /// of observed demes occupying the index prefix.
    pub fn new(
        coords: Vec<[f64; 2]>,
        edges: Vec<(usize, usize)>,
        num_observed: usize,
    ) -> Result<Self, MesaError> {
        let num_demes = coords.len();
        if num_demes < 2 {
            return Err(MesaError::Domain(
                ErrorInfo::new("too-few-demes", "graph needs at least two demes")
                    .with_context("demes", num_demes.to_string()),
            ));
        }
        if num_observed < 2 || num_observed > num_demes {
            return Err(MesaError::Domain(
                ErrorInfo::new("bad-observed-count", "observed demes must number 2..=demes")
                    .with_context("observed", num_observed.to_string())
                    .with_context("demes", num_demes.to_string()),
            ));
        }
        for (idx, c) in coords.iter().enumerate() {
            if !c[0].is_finite() || !c[1].is_finite() {
                return Err(MesaError::Domain(
                    ErrorInfo::new("non-finite-coordinate", "deme coordinate is not finite")
                        .with_context("deme", idx.to_string()),
                ));
            }
        }
        let mut canonical = BTreeSet::new();
        for &(a, b) in &edges {
            if a >= num_demes || b >= num_demes {
                return Err(MesaError::Domain(
                    ErrorInfo::new("edge-out-of-range", "edge endpoint outside deme range")
                        .with_context("edge", format!("{a}-{b}")),
                ));
            }
            if a == b {
                return Err(MesaError::Domain(
                    ErrorInfo::new("self-loop", "self loops are not allowed")
                        .with_context("deme", a.to_string()),
                ));
            }
            canonical.insert((a.min(b), a.max(b)));
        }
        let edges: Vec<(usize, usize)> = canonical.into_iter().collect();
        let graph = Self {
            coords,
            edges,
            num_observed,
        };
        if !graph.is_connected() {
            return Err(MesaError::Domain(
                ErrorInfo::new("disconnected-graph", "deme graph must be connected")
                    .with_hint("resistance distances are undefined between components"),
            ));
        }
        Ok(graph)
    }

    /// Builds a regular `nx` by `ny` grid with unit spacing, rook plus
    /// diagonal adjacency, and every deme observed.
    pub fn grid(nx: usize, ny: usize) -> Result<Self, MesaError> {
        let num = nx * ny;
        let mut coords = Vec::with_capacity(num);
        for j in 0..ny {
            for i in 0..nx {
                coords.push([i as f64, j as f64]);
            }
        }
        let at = |i: usize, j: usize| j * nx + i;
        let mut edges = Vec::new();
        for j in 0..ny {
            for i in 0..nx {
                if i + 1 < nx {
                    edges.push((at(i, j), at(i + 1, j)));
                }
                if j + 1 < ny {
                    edges.push((at(i, j), at(i, j + 1)));
                }
                if i + 1 < nx && j + 1 < ny {
                    edges.push((at(i, j), at(i + 1, j + 1)));
                    edges.push((at(i + 1, j), at(i, j + 1)));
                }
            }
        }
        Self::new(coords, edges, num)
    }

    /// Returns the total number of demes.
    pub fn num_demes(&self) -> usize {
        self.coords.len()
    }

    /// Returns the number of observed demes (index prefix).
    pub fn num_observed(&self) -> usize {
        self.num_observed
    }

    /// Returns the coordinates of one deme.
    pub fn coord(&self, deme: usize) -> [f64; 2] {
        self.coords[deme]
    }

    /// Returns all deme coordinates.
    pub fn coords(&self) -> &[[f64; 2]] {
        &self.coords
    }

    /// Returns the canonical undirected edge list.
    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    fn is_connected(&self) -> bool {
        let n = self.coords.len();
        let mut adjacency = vec![Vec::new(); n];
        for &(a, b) in &self.edges {
            adjacency[a].push(b);
            adjacency[b].push(a);
        }
        let mut seen = vec![false; n];
        let mut stack = vec![0usize];
        seen[0] = true;
        let mut visited = 1usize;
        while let Some(node) = stack.pop() {
            for &next in &adjacency[node] {
                if !seen[next] {
                    seen[next] = true;
                    visited += 1;
                    stack.push(next);
                }
            }
        }
        visited == n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_shape() {
        let graph = DemeGraph::grid(3, 2).expect("grid");
        assert_eq!(graph.num_demes(), 6);
        assert_eq!(graph.num_observed(), 6);
        assert_eq!(graph.coord(4), [1.0, 1.0]);
        // 7 rook edges plus 4 diagonals.
        assert_eq!(graph.edges().len(), 11);
    }

    #[test]
    fn edges_are_deduplicated_and_canonical() {
        let coords = vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
        let graph =
            DemeGraph::new(coords, vec![(1, 0), (0, 1), (2, 1)], 2).expect("triangle path");
        assert_eq!(graph.edges(), &[(0, 1), (1, 2)]);
    }

    #[test]
    fn rejects_disconnected_graph() {
        let coords = vec![[0.0, 0.0], [1.0, 0.0], [5.0, 5.0], [6.0, 5.0]];
        let err = DemeGraph::new(coords, vec![(0, 1), (2, 3)], 4).unwrap_err();
        assert_eq!(err.info().code, "disconnected-graph");
    }

    #[test]
    fn rejects_self_loop_and_range() {
        let coords = vec![[0.0, 0.0], [1.0, 0.0]];
        assert_eq!(
            DemeGraph::new(coords.clone(), vec![(0, 0)], 2)
                .unwrap_err()
                .info()
                .code,
            "self-loop"
        );
        assert_eq!(
            DemeGraph::new(coords, vec![(0, 5)], 2).unwrap_err().info().code,
            "edge-out-of-range"
        );
    }
}
