//! Routes and the shortest-path provider seam.
//!
//! # Pluggability
//!
//! Scenario preparation asks a [`ShortestPathProvider`] for routes, so any
//! algorithm (contraction hierarchies, A*, precomputed tables) can be plugged
//! in.  The simulation core never looks at how a route was found; it only
//! pops edges off the front.  [`DijkstraRouter`] is the default provider.
//!
//! # Cost units
//!
//! [`DijkstraRouter`] minimises free-flow travel time in milli-ticks:
//! `length_cells * 1000 / max_velocity` per edge.  It searches over edges
//! rather than nodes so that every consecutive pair of edges in a result is
//! joined by a connector.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

use ts_core::{EdgeId, NodeId};

use crate::{Graph, GraphError, GraphResult};

// ── Route ─────────────────────────────────────────────────────────────────────

/// Remaining edges of a trip, consumed from the front while driving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    origin:      NodeId,
    destination: NodeId,
    edges:       VecDeque<EdgeId>,
}

impl Route {
    pub fn new(origin: NodeId, destination: NodeId, edges: impl IntoIterator<Item = EdgeId>) -> Self {
        Self { origin, destination, edges: edges.into_iter().collect() }
    }

    /// A route with no edges; a vehicle holding it despawns without spawning.
    pub fn empty(at: NodeId) -> Self {
        Self { origin: at, destination: at, edges: VecDeque::new() }
    }

    /// Build a route from a consecutive edge sequence of `graph`.
    pub fn from_edges(graph: &Graph, edges: Vec<EdgeId>) -> GraphResult<Self> {
        let (Some(&first), Some(&last)) = (edges.first(), edges.last()) else {
            return Err(GraphError::NoRoute { from: NodeId::INVALID, to: NodeId::INVALID });
        };
        let origin = graph.try_edge(first)?.origin;
        let destination = graph.try_edge(last)?.destination;
        Ok(Self::new(origin, destination, edges))
    }

    /// Node the trip starts at (where a vehicle waits to spawn).
    #[inline]
    pub fn origin(&self) -> NodeId {
        self.origin
    }

    #[inline]
    pub fn destination(&self) -> NodeId {
        self.destination
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Next edge without consuming it.
    #[inline]
    pub fn peek(&self) -> Option<EdgeId> {
        self.edges.front().copied()
    }

    /// Consume the next edge.
    #[inline]
    pub fn pop(&mut self) -> Option<EdgeId> {
        self.edges.pop_front()
    }

    pub fn iter(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges.iter().copied()
    }
}

// ── ShortestPathProvider ──────────────────────────────────────────────────────

/// Pluggable route source.
///
/// # Thread safety
///
/// Implementations must be `Send + Sync`: scenario preparation computes
/// routes on several worker threads at once.
pub trait ShortestPathProvider: Send + Sync {
    /// A route from `from` to `to`, or `None` if `to` is unreachable.
    ///
    /// `from == to` yields an empty route rather than `None`.
    fn route(&self, graph: &Graph, from: NodeId, to: NodeId) -> Option<Route>;
}

// ── DijkstraRouter ────────────────────────────────────────────────────────────

/// Dijkstra's algorithm over the edge graph, honouring connectors.
#[derive(Debug, Default, Clone, Copy)]
pub struct DijkstraRouter;

impl ShortestPathProvider for DijkstraRouter {
    fn route(&self, graph: &Graph, from: NodeId, to: NodeId) -> Option<Route> {
        if from == to {
            return Some(Route::empty(from));
        }
        dijkstra(graph, from, to)
    }
}

/// Edge traversal cost in milli-ticks.
#[inline]
fn edge_cost(graph: &Graph, edge: EdgeId) -> u64 {
    let e = graph.edge(edge);
    u64::from(e.length) * 1_000 / u64::from(e.max_velocity.max(1))
}

fn dijkstra(graph: &Graph, from: NodeId, to: NodeId) -> Option<Route> {
    if from.index() >= graph.node_count() || to.index() >= graph.node_count() {
        return None;
    }

    let m = graph.edge_count();
    // dist[e] = best known cost having traversed edge e completely.
    let mut dist = vec![u64::MAX; m];
    // prev[e] = edge driven before e; INVALID for the first edge.
    let mut prev = vec![EdgeId::INVALID; m];

    // Min-heap: (cost, edge).  Secondary key EdgeId ensures deterministic
    // tie-breaking.
    let mut heap: BinaryHeap<Reverse<(u64, EdgeId)>> = BinaryHeap::new();
    for &e in graph.node(from).leaving_edges() {
        let cost = edge_cost(graph, e);
        if cost < dist[e.index()] {
            dist[e.index()] = cost;
            heap.push(Reverse((cost, e)));
        }
    }

    while let Some(Reverse((cost, edge))) = heap.pop() {
        // Skip stale heap entries.
        if cost > dist[edge.index()] {
            continue;
        }

        let at = graph.edge(edge).destination;
        if at == to {
            return Some(reconstruct(from, to, &prev, edge));
        }

        for &next in graph.node(at).turns_from(edge) {
            let new_cost = cost.saturating_add(edge_cost(graph, next));
            if new_cost < dist[next.index()] {
                dist[next.index()] = new_cost;
                prev[next.index()] = edge;
                heap.push(Reverse((new_cost, next)));
            }
        }
    }

    None
}

fn reconstruct(from: NodeId, to: NodeId, prev: &[EdgeId], last: EdgeId) -> Route {
    let mut edges = vec![last];
    let mut cur = last;
    while prev[cur.index()] != EdgeId::INVALID {
        cur = prev[cur.index()];
        edges.push(cur);
    }
    edges.reverse();
    Route::new(from, to, edges)
}
