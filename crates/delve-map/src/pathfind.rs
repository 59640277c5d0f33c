//! Heuristic-guided shortest path (A*) over a [`Graph`].
//!
//! The open set is a binary min-heap ordered by estimated total cost
//! `g + h`, with ties broken by insertion order so results are deterministic.
//! Improved nodes are pushed again rather than decreased in place; entries
//! whose recorded `g` is worse than the node's best known distance are stale
//! and skipped when popped.
//!
//! Unreachable destinations are not errors. [`pathfind`] simply has no
//! distance for them and [`trace_path`] returns a chain that does not start at
//! the origin; [`shortest_path`] folds that check into an `Option`. An origin
//! or destination that is not a node of the graph is
//! [`MapError::UnknownNode`].

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::hash::Hash;

use tracing::trace;

use crate::graph::Graph;
use crate::MapError;

/// Best known distances and the predecessor of every settled node.
#[derive(Debug, Clone)]
pub struct SearchResult<N> {
    pub distances: HashMap<N, f64>,
    pub predecessors: HashMap<N, N>,
}

impl<N: Copy + Eq + Hash> SearchResult<N> {
    /// Finite distance from the origin to `node`, if it was reached.
    pub fn distance(&self, node: N) -> Option<f64> {
        self.distances.get(&node).copied().filter(|d| d.is_finite())
    }
}

/// A reconstructed route and its total cost.
#[derive(Debug, Clone, PartialEq)]
pub struct Path<N> {
    /// Origin first, destination last.
    pub cells: Vec<N>,
    pub cost: f64,
}

struct OpenEntry<N> {
    estimate: f64,
    seq: u64,
    g: f64,
    node: N,
}

impl<N> PartialEq for OpenEntry<N> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<N> Eq for OpenEntry<N> {}

impl<N> PartialOrd for OpenEntry<N> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<N> Ord for OpenEntry<N> {
    // Reversed so that BinaryHeap pops the smallest estimate first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .estimate
            .total_cmp(&self.estimate)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Search from `origin`, stopping early once `destination` is settled.
///
/// With no destination the heuristic is not consulted and the search settles
/// every reachable node (Dijkstra). The heuristic must not overestimate for
/// the result to be optimal.
pub fn pathfind<N, H>(
    graph: &Graph<N>,
    origin: N,
    destination: Option<N>,
    heuristic: H,
) -> Result<SearchResult<N>, MapError>
where
    N: Copy + Eq + Hash + fmt::Debug,
    H: Fn(N, N) -> f64,
{
    if !graph.contains(origin) {
        return Err(MapError::unknown_node(origin));
    }
    if let Some(dest) = destination.filter(|&dest| !graph.contains(dest)) {
        return Err(MapError::unknown_node(dest));
    }
    let h = |node: N| destination.map_or(0.0, |dest| heuristic(node, dest));

    let mut distances = HashMap::from([(origin, 0.0)]);
    let mut predecessors = HashMap::new();
    let mut open = BinaryHeap::new();
    let mut seq = 0u64;
    open.push(OpenEntry {
        estimate: h(origin),
        seq,
        g: 0.0,
        node: origin,
    });

    let mut settled = 0usize;
    while let Some(OpenEntry { g, node, .. }) = open.pop() {
        let best = distances.get(&node).copied().unwrap_or(f64::INFINITY);
        if g > best {
            continue;
        }
        settled += 1;
        if destination == Some(node) {
            break;
        }
        for edge in graph.edges(node) {
            let alt = g + edge.weight;
            let known = distances.get(&edge.to).copied().unwrap_or(f64::INFINITY);
            if alt < known {
                distances.insert(edge.to, alt);
                predecessors.insert(edge.to, node);
                seq += 1;
                open.push(OpenEntry {
                    estimate: alt + h(edge.to),
                    seq,
                    g: alt,
                    node: edge.to,
                });
            }
        }
    }
    trace!(?origin, ?destination, settled, "pathfind");

    Ok(SearchResult {
        distances,
        predecessors,
    })
}

/// Walk predecessors back from `destination` and return the chain origin-first.
///
/// For an unreachable destination the result is just `[destination]`; check
/// that the first element is the expected origin before using it.
pub fn trace_path<N: Copy + Eq + Hash>(predecessors: &HashMap<N, N>, destination: N) -> Vec<N> {
    let mut path = vec![destination];
    let mut current = destination;
    while let Some(&previous) = predecessors.get(&current) {
        path.push(previous);
        current = previous;
    }
    path.reverse();
    path
}

/// [`pathfind`] plus [`trace_path`], or `None` if `destination` is unreachable.
pub fn shortest_path<N, H>(
    graph: &Graph<N>,
    origin: N,
    destination: N,
    heuristic: H,
) -> Result<Option<Path<N>>, MapError>
where
    N: Copy + Eq + Hash + fmt::Debug,
    H: Fn(N, N) -> f64,
{
    let search = pathfind(graph, origin, Some(destination), heuristic)?;
    let Some(cost) = search.distance(destination) else {
        return Ok(None);
    };
    let cells = trace_path(&search.predecessors, destination);
    if cells.first() != Some(&origin) {
        return Ok(None);
    }
    Ok(Some(Path { cells, cost }))
}
