//! Weighted directed graphs and the grid -> graph builder.
//!
//! Edge weights are finite and non-negative, or `f64::INFINITY` for an edge
//! that exists but can never be taken. Every edge's destination is a node of
//! the graph ([`Graph::connect`] refuses anything else).
//!
//! # Cost asymmetry
//!
//! [`GraphBuilder`] prices an edge by its *destination* cell only:
//! `weight(tile at destination) * cost(delta)`. Walking from a floor cell into
//! a wall is expensive, walking out of the wall back onto floor is cheap, so
//! `A -> B` and `B -> A` generally carry different weights. Distances in a
//! built graph are only a metric when every tile weight is the same.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;

use serde::{Deserialize, Serialize};
use tracing::debug;

use delve_ecs::spatial::Position;

use crate::geometry::Delta;
use crate::grid::Grid;
use crate::tile::{Tile, TileTable};
use crate::MapError;

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// Directed edge to `to`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge<N> {
    pub weight: f64,
    pub to: N,
}

/// Node set plus per-node ordered outgoing edge lists.
#[derive(Debug, Clone)]
pub struct Graph<N = Position> {
    /// Insertion order, for deterministic iteration.
    order: Vec<N>,
    edges: HashMap<N, Vec<Edge<N>>>,
}

impl<N> Default for Graph<N> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            edges: HashMap::new(),
        }
    }
}

impl<N: Copy + Eq + Hash + fmt::Debug> Graph<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. Adding an existing node is a no-op.
    pub fn add(&mut self, node: N) {
        if !self.edges.contains_key(&node) {
            self.edges.insert(node, Vec::new());
            self.order.push(node);
        }
    }

    pub fn contains(&self, node: N) -> bool {
        self.edges.contains_key(&node)
    }

    /// Directed edge `from -> to`. Both nodes must already exist.
    pub fn connect(&mut self, from: N, to: N, weight: f64) -> Result<(), MapError> {
        if !self.edges.contains_key(&to) {
            return Err(MapError::unknown_node(to));
        }
        let outgoing = self
            .edges
            .get_mut(&from)
            .ok_or_else(|| MapError::unknown_node(from))?;
        outgoing.push(Edge { weight, to });
        Ok(())
    }

    /// Edges in both directions with the same weight.
    pub fn biconnect(&mut self, a: N, b: N, weight: f64) -> Result<(), MapError> {
        self.connect(a, b, weight)?;
        self.connect(b, a, weight)
    }

    /// Outgoing edges of `node`, in insertion order. Empty for unknown nodes.
    pub fn edges(&self, node: N) -> &[Edge<N>] {
        self.edges.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = N> + '_ {
        self.order.iter().copied()
    }

    pub fn node_count(&self) -> usize {
        self.order.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }

    /// Copy in which every outgoing edge of a node matching `blocked` has
    /// infinite weight. Edges *into* such nodes keep their weight, so a
    /// search can still end on one but never pass through it.
    pub fn masked(&self, mut blocked: impl FnMut(N) -> bool) -> Graph<N> {
        let mut masked = self.clone();
        for node in &self.order {
            if blocked(*node) {
                if let Some(outgoing) = masked.edges.get_mut(node) {
                    for edge in outgoing {
                        edge.weight = f64::INFINITY;
                    }
                }
            }
        }
        masked
    }
}

// ---------------------------------------------------------------------------
// Weight tables
// ---------------------------------------------------------------------------

/// Tile kind -> movement weight. Kinds without an entry are impassable.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TileWeights {
    weights: BTreeMap<Tile, f64>,
}

impl TileWeights {
    /// Same weight for every kind.
    pub fn uniform(weight: f64) -> Self {
        Self {
            weights: Tile::ALL.iter().map(|&t| (t, weight)).collect(),
        }
    }

    /// Weights from a tile table, with colliders mapped to +inf.
    pub fn from_table(table: &TileTable) -> Self {
        let weights = Tile::ALL
            .iter()
            .map(|&tile| {
                let props = table.props(tile);
                let weight = if props.collider {
                    f64::INFINITY
                } else {
                    props.weight
                };
                (tile, weight)
            })
            .collect();
        Self { weights }
    }

    /// Builder-style override of one kind.
    pub fn with(mut self, tile: Tile, weight: f64) -> Self {
        self.weights.insert(tile, weight);
        self
    }

    pub fn get(&self, tile: Tile) -> f64 {
        self.weights.get(&tile).copied().unwrap_or(f64::INFINITY)
    }

    fn validate(&self) -> Result<(), MapError> {
        match self.weights.iter().find(|(_, w)| w.is_nan() || **w < 0.0) {
            Some((tile, w)) => Err(MapError::InvalidConfig(format!(
                "weight {w} for tile '{tile}' must be non-negative"
            ))),
            None => Ok(()),
        }
    }
}

/// Ordered movement deltas with their cost multipliers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaCosts {
    entries: Vec<(Delta, f64)>,
}

impl Default for DeltaCosts {
    fn default() -> Self {
        Self::cardinal()
    }
}

impl DeltaCosts {
    pub fn new(entries: impl IntoIterator<Item = (Delta, f64)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Four orthogonal steps at cost 1.
    pub fn cardinal() -> Self {
        Self::new(Delta::CARDINAL.iter().map(|&d| (d, 1.0)))
    }

    /// Four diagonal steps at cost 1.41.
    pub fn diagonal() -> Self {
        Self::new(Delta::DIAGONAL.iter().map(|&d| (d, 1.41)))
    }

    /// Cardinal plus diagonal.
    pub fn king() -> Self {
        let mut costs = Self::cardinal();
        costs.entries.extend(Self::diagonal().entries);
        costs
    }

    pub fn iter(&self) -> impl Iterator<Item = (Delta, f64)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fails with [`MapError::InvalidConfig`] on a negative or NaN cost.
    pub fn validate(&self) -> Result<(), MapError> {
        match self.entries.iter().find(|(_, c)| c.is_nan() || *c < 0.0) {
            Some((delta, c)) => Err(MapError::InvalidConfig(format!(
                "cost {c} for delta ({}, {}) must be non-negative",
                delta.dx, delta.dy
            ))),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// GraphBuilder
// ---------------------------------------------------------------------------

/// Derives a movement graph from a grid. See the module docs for how edges
/// are priced.
pub struct GraphBuilder;

impl GraphBuilder {
    /// One node per cell; one edge per (cell, delta) landing in bounds.
    pub fn build(
        grid: &Grid,
        weights: &TileWeights,
        deltas: &DeltaCosts,
    ) -> Result<Graph<Position>, MapError> {
        weights.validate()?;
        deltas.validate()?;

        let mut graph = Graph::new();
        for cell in grid.bounds().cells() {
            graph.add(cell);
        }
        for cell in grid.bounds().cells() {
            for (delta, cost) in deltas.iter() {
                let target = delta.apply(cell);
                let Ok(tile) = grid.get(target) else {
                    continue;
                };
                graph.connect(cell, target, weights.get(tile) * cost)?;
            }
        }
        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "built movement graph"
        );
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: i32, y: i32) -> Position {
        Position::new(x, y)
    }

    #[test]
    fn connect_requires_both_nodes() {
        let mut g: Graph<u32> = Graph::new();
        g.add(1);
        assert!(matches!(g.connect(1, 2, 1.0), Err(MapError::UnknownNode { .. })));
        assert!(matches!(g.connect(2, 1, 1.0), Err(MapError::UnknownNode { .. })));
        g.add(2);
        g.biconnect(1, 2, 3.0).unwrap();
        assert_eq!(g.edges(1), &[Edge { weight: 3.0, to: 2 }]);
        assert_eq!(g.edges(2), &[Edge { weight: 3.0, to: 1 }]);
        assert_eq!(g.edge_count(), 2);
    }

    #[test]
    fn add_is_idempotent() {
        let mut g: Graph<u32> = Graph::new();
        g.add(7);
        g.add(7);
        assert_eq!(g.node_count(), 1);
        assert_eq!(g.nodes().collect::<Vec<_>>(), vec![7]);
    }

    #[test]
    fn masked_blocks_only_outgoing() {
        let mut g: Graph<u32> = Graph::new();
        for n in 0..3 {
            g.add(n);
        }
        g.connect(0, 1, 1.0).unwrap();
        g.connect(1, 2, 1.0).unwrap();
        let m = g.masked(|n| n == 1);
        assert_eq!(m.edges(0)[0].weight, 1.0);
        assert!(m.edges(1)[0].weight.is_infinite());
        // Original untouched.
        assert_eq!(g.edges(1)[0].weight, 1.0);
    }

    #[test]
    fn builder_prices_by_destination() {
        let mut grid = Grid::new(2, 1, Tile::Floor).unwrap();
        grid.set(p(1, 0), Tile::Wall).unwrap();
        let weights = TileWeights::uniform(1.0).with(Tile::Wall, 10.0);
        let g = GraphBuilder::build(&grid, &weights, &DeltaCosts::cardinal()).unwrap();

        assert_eq!(g.edges(p(0, 0)), &[Edge { weight: 10.0, to: p(1, 0) }]);
        assert_eq!(g.edges(p(1, 0)), &[Edge { weight: 1.0, to: p(0, 0) }]);
    }

    #[test]
    fn builder_edge_counts() {
        let grid = Grid::new(3, 3, Tile::Floor).unwrap();
        let card = GraphBuilder::build(&grid, &TileWeights::uniform(1.0), &DeltaCosts::cardinal())
            .unwrap();
        assert_eq!(card.node_count(), 9);
        // 2 * (rows * (cols - 1) + cols * (rows - 1))
        assert_eq!(card.edge_count(), 24);

        let king = GraphBuilder::build(&grid, &TileWeights::uniform(1.0), &DeltaCosts::king())
            .unwrap();
        assert_eq!(king.edge_count(), 24 + 16);
        let diag = king
            .edges(p(0, 0))
            .iter()
            .find(|e| e.to == p(1, 1))
            .unwrap();
        assert!((diag.weight - 1.41).abs() < 1e-12);
    }

    #[test]
    fn colliders_become_infinite() {
        let weights = TileWeights::from_table(&TileTable::default());
        assert!(weights.get(Tile::Wall).is_infinite());
        assert_eq!(weights.get(Tile::Floor), 1.0);
        assert_eq!(weights.get(Tile::Door), 1.0);
    }

    #[test]
    fn negative_weights_rejected() {
        let grid = Grid::new(2, 2, Tile::Floor).unwrap();
        let weights = TileWeights::uniform(-1.0);
        assert!(matches!(
            GraphBuilder::build(&grid, &weights, &DeltaCosts::cardinal()),
            Err(MapError::InvalidConfig(_))
        ));
    }
}
