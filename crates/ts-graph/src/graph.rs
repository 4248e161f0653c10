//! The street graph arena and its builder.
//!
//! # Data layout
//!
//! `Graph` owns two arenas, `Vec<Node>` indexed by `NodeId` and
//! `Vec<DirectedEdge>` indexed by `EdgeId`.  Nodes store the ids of their
//! incoming and leaving edges, edges store the ids of their end nodes.
//! Topology is fixed once [`GraphBuilder::build`] returns; while a
//! simulation runs only lane occupancy and node request sets change.
//!
//! # Spatial index
//!
//! An R-tree (via `rstar`) maps `(lat, lon)` to the nearest `NodeId`, used to
//! snap arbitrary coordinates to street nodes when building scenarios.

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use ts_core::{EdgeId, GeoPoint, NodeId, Resettable, SimConfig};

use crate::crossing::Arm;
use crate::{DirectedEdge, EdgeSpec, GraphError, GraphResult, Lane, LaneRef, Node};

// ── R-tree node entry ─────────────────────────────────────────────────────────

/// Entry stored in the R-tree spatial index: a 2-D `[lat, lon]` point with
/// the associated `NodeId`.
#[derive(Clone)]
struct NodeEntry {
    point: [f32; 2], // [lat, lon]
    id: NodeId,
}

impl RTreeObject for NodeEntry {
    type Envelope = AABB<[f32; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for NodeEntry {
    /// Squared Euclidean distance in lat/lon space; good enough for snapping
    /// within a city.
    fn distance_2(&self, point: &[f32; 2]) -> f32 {
        let dlat = self.point[0] - point[0];
        let dlon = self.point[1] - point[1];
        dlat * dlat + dlon * dlon
    }
}

// ── Graph ─────────────────────────────────────────────────────────────────────

/// Street graph: node and edge arenas plus a spatial index.
///
/// Do not construct directly; use [`GraphBuilder`].
pub struct Graph {
    nodes: Vec<Node>,
    edges: Vec<DirectedEdge>,
    min:   GeoPoint,
    max:   GeoPoint,
    spatial_idx: RTree<NodeEntry>,
}

impl Graph {
    // ── Dimensions ────────────────────────────────────────────────────────

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// South-west and north-east corners of all node positions.
    pub fn bounds(&self) -> (GeoPoint, GeoPoint) {
        (self.min, self.max)
    }

    // ── Access ────────────────────────────────────────────────────────────

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[DirectedEdge] {
        &self.edges
    }

    /// # Panics
    /// Panics if `id` was not produced by this graph's builder.
    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    #[inline]
    pub fn edge(&self, id: EdgeId) -> &DirectedEdge {
        &self.edges[id.index()]
    }

    pub fn try_node(&self, id: NodeId) -> GraphResult<&Node> {
        self.nodes.get(id.index()).ok_or(GraphError::NodeNotFound(id))
    }

    pub fn try_edge(&self, id: EdgeId) -> GraphResult<&DirectedEdge> {
        self.edges.get(id.index()).ok_or(GraphError::EdgeNotFound(id))
    }

    pub fn lane(&self, lane: LaneRef) -> GraphResult<&Lane> {
        self.edges
            .get(lane.edge.index())
            .and_then(|e| e.lane(lane.index))
            .ok_or(GraphError::LaneNotFound(lane))
    }

    pub fn lane_mut(&mut self, lane: LaneRef) -> GraphResult<&mut Lane> {
        self.edges
            .get_mut(lane.edge.index())
            .and_then(|e| e.lane_mut(lane.index))
            .ok_or(GraphError::LaneNotFound(lane))
    }

    /// Mutable nodes next to shared edges, for the node update phase.
    pub fn nodes_mut_with_edges(&mut self) -> (&mut [Node], &[DirectedEdge]) {
        (&mut self.nodes, &self.edges)
    }

    /// Total number of vehicles on all lanes.
    pub fn vehicle_count(&self) -> usize {
        self.edges.iter().map(DirectedEdge::vehicle_count).sum()
    }

    // ── Spatial queries ───────────────────────────────────────────────────

    /// The node nearest to `pos`; `None` only for an empty graph.
    pub fn nearest_node(&self, pos: GeoPoint) -> Option<NodeId> {
        self.spatial_idx
            .nearest_neighbor(&[pos.lat, pos.lon])
            .map(|e| e.id)
    }
}

impl Resettable for Graph {
    /// Remove every vehicle from every lane and every request from every
    /// node.  Topology is untouched.
    fn reset(&mut self) {
        for edge in &mut self.edges {
            edge.clear();
        }
        for node in &mut self.nodes {
            node.reset();
        }
    }
}

// ── GraphBuilder ──────────────────────────────────────────────────────────────

/// Construct a [`Graph`] incrementally, then call [`build`](Self::build).
///
/// # Example
///
/// ```
/// use ts_core::{GeoPoint, SimConfig};
/// use ts_graph::{EdgeSpec, GraphBuilder};
///
/// let mut b = GraphBuilder::new(&SimConfig::default());
/// let a = b.add_node(GeoPoint::new(48.000, 11.000));
/// let c = b.add_node(GeoPoint::new(48.001, 11.000));
/// b.add_road(a, c, EdgeSpec::new(1, 3, 0));
/// b.connect_all_turns();
/// let graph = b.build();
/// assert_eq!(graph.node_count(), 2);
/// assert_eq!(graph.edge_count(), 2);
/// ```
pub struct GraphBuilder {
    config: SimConfig,
    nodes: Vec<Node>,
    edges: Vec<DirectedEdge>,
}

impl GraphBuilder {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            config: config.clone(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn node_count(&self) -> usize { self.nodes.len() }
    pub fn edge_count(&self) -> usize { self.edges.len() }

    /// Add a node and return its `NodeId` (sequential from 0).
    pub fn add_node(&mut self, pos: GeoPoint) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(id, pos, self.config.crossing_logic));
        id
    }

    pub fn node_pos(&self, id: NodeId) -> GeoPoint {
        self.nodes[id.index()].position
    }

    /// Add a directed edge whose length is the distance between its nodes.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId, spec: EdgeSpec) -> EdgeId {
        let length_m = self.node_pos(from).distance_m(self.node_pos(to));
        self.add_edge_with_length(from, to, length_m, spec)
    }

    /// Add a directed edge with an explicit length in metres.
    ///
    /// The cell count is `ceil(length_m / meters_per_cell)`, at least one; the
    /// speed limit is capped by the global maximum velocity.
    pub fn add_edge_with_length(
        &mut self,
        from: NodeId,
        to: NodeId,
        length_m: f32,
        spec: EdgeSpec,
    ) -> EdgeId {
        let id = EdgeId(self.edges.len() as u32);
        let cells = self.config.cells_for_meters(length_m);
        let spec = EdgeSpec {
            max_velocity: spec.max_velocity.clamp(1, self.config.global_max_velocity.max(1)),
            ..spec
        };
        self.edges.push(DirectedEdge::new(id, from, to, cells, length_m, spec));
        self.register_edge_and_nodes(id);
        id
    }

    /// Both directions of a two-way street.  Returns `(a → b, b → a)`.
    pub fn add_road(&mut self, a: NodeId, b: NodeId, spec: EdgeSpec) -> (EdgeId, EdgeId) {
        (self.add_edge(a, b, spec), self.add_edge(b, a, spec))
    }

    pub fn add_road_with_length(
        &mut self,
        a: NodeId,
        b: NodeId,
        length_m: f32,
        spec: EdgeSpec,
    ) -> (EdgeId, EdgeId) {
        (
            self.add_edge_with_length(a, b, length_m, spec),
            self.add_edge_with_length(b, a, length_m, spec),
        )
    }

    /// Make sure `edge` is listed as leaving its origin and incoming at its
    /// destination.  Idempotent; returns `true` if anything changed.
    pub fn register_edge_and_nodes(&mut self, edge: EdgeId) -> bool {
        let (origin, destination) = {
            let e = &self.edges[edge.index()];
            (e.origin, e.destination)
        };
        let a = self.nodes[origin.index()].add_leaving(edge);
        let b = self.nodes[destination.index()].add_incoming(edge);
        a || b
    }

    /// Allow vehicles on `incoming` to continue on `leaving` at `node`.
    pub fn add_connector(&mut self, node: NodeId, incoming: LaneRef, leaving: LaneRef) -> GraphResult<()> {
        let valid = self
            .edges
            .get(incoming.edge.index())
            .is_some_and(|e| e.destination == node && incoming.index < e.lane_count())
            && self
                .edges
                .get(leaving.edge.index())
                .is_some_and(|e| e.origin == node && leaving.index < e.lane_count());
        if !valid || node.index() >= self.nodes.len() {
            return Err(GraphError::InvalidConnector { node, incoming, leaving });
        }
        self.nodes[node.index()].add_connector(incoming, leaving);
        Ok(())
    }

    /// Connect every incoming lane to every leaving edge except the reverse
    /// direction of the same street.  U-turns are only added at dead ends,
    /// where they are the only way on.
    ///
    /// Lane `i` of the incoming edge maps to lane `min(i, lanes - 1)` of the
    /// leaving edge.
    pub fn connect_all_turns(&mut self) {
        let mut connectors = Vec::new();
        for node in &self.nodes {
            for &in_id in node.incoming_edges() {
                let incoming = &self.edges[in_id.index()];
                let mut targets: Vec<EdgeId> = node
                    .leaving_edges()
                    .iter()
                    .copied()
                    .filter(|&out| !self.edges[out.index()].is_reverse_of(incoming))
                    .collect();
                if targets.is_empty() {
                    targets = node.leaving_edges().to_vec();
                }
                for out_id in targets {
                    let out_lanes = self.edges[out_id.index()].lane_count();
                    for i in 0..incoming.lane_count() {
                        connectors.push((
                            node.id,
                            LaneRef::new(in_id, i),
                            LaneRef::new(out_id, i.min(out_lanes.saturating_sub(1))),
                        ));
                    }
                }
            }
        }
        for (node, incoming, leaving) in connectors {
            self.nodes[node.index()].add_connector(incoming, leaving);
        }
    }

    /// Consume the builder, compute crossing indices and the spatial index.
    pub fn build(mut self) -> Graph {
        for i in 0..self.nodes.len() {
            let arms = self.arms_of(NodeId(i as u32));
            self.nodes[i].set_crossing_indices(&arms);
        }

        let (min, max) = bounds_of(&self.nodes);
        let entries: Vec<NodeEntry> = self
            .nodes
            .iter()
            .map(|n| NodeEntry { point: [n.position.lat, n.position.lon], id: n.id })
            .collect();
        let spatial_idx = RTree::bulk_load(entries);

        log::debug!(
            "graph built: {} nodes, {} edges, {} connectors",
            self.nodes.len(),
            self.edges.len(),
            self.nodes.iter().map(Node::connector_count).sum::<usize>()
        );

        Graph { nodes: self.nodes, edges: self.edges, min, max, spatial_idx }
    }

    fn arms_of(&self, id: NodeId) -> Vec<Arm> {
        let node = &self.nodes[id.index()];
        let here = node.position;
        let leaving = node.leaving_edges().iter().map(|&e| Arm {
            edge:    e,
            bearing: here.bearing_to(self.node_pos(self.edges[e.index()].destination)),
            leaving: true,
        });
        let incoming = node.incoming_edges().iter().map(|&e| Arm {
            edge:    e,
            bearing: here.bearing_to(self.node_pos(self.edges[e.index()].origin)),
            leaving: false,
        });
        leaving.chain(incoming).collect()
    }
}

fn bounds_of(nodes: &[Node]) -> (GeoPoint, GeoPoint) {
    if nodes.is_empty() {
        return (GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 0.0));
    }
    nodes.iter().fold(
        (
            GeoPoint::new(f32::INFINITY, f32::INFINITY),
            GeoPoint::new(f32::NEG_INFINITY, f32::NEG_INFINITY),
        ),
        |(lo, hi), n| {
            (
                GeoPoint::new(lo.lat.min(n.position.lat), lo.lon.min(n.position.lon)),
                GeoPoint::new(hi.lat.max(n.position.lat), hi.lon.max(n.position.lon)),
            )
        },
    )
}
