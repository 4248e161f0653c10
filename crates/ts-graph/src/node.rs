//! Street nodes: connectors and crossing arbitration.
//!
//! A node keeps two sets of vehicle ids:
//!
//! - `registered`: vehicles that asked to cross (a spawned vehicle close to
//!   the end of its lane, or a vehicle waiting to spawn at its origin);
//! - `granted`: the subset allowed to cross, recomputed by [`Node::update`]
//!   exactly once per tick and read-only until the next update.
//!
//! Registration changes during a tick are applied by the stepper at phase
//! barriers, never concurrently with `update`.

use std::cmp::{Ordering, Reverse};
use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use ts_core::{CrossingLogicConfig, EdgeId, GeoPoint, NodeId, Resettable, VehicleId};

use crate::crossing::{self, Arm, CrossingParticipant, Precedence};
use crate::{DirectedEdge, GraphError, GraphResult, LaneRef};

/// One crossing request as seen during an update.
#[derive(Clone, Debug)]
struct Request {
    vehicle:   VehicleId,
    spawned:   bool,
    incoming:  Option<EdgeId>,
    leaving:   Option<EdgeId>,
    target:    Option<LaneRef>,
    has_space: bool,
    counter:   i32,
}

/// A junction of two or more directed edges.
#[derive(Clone, Debug)]
pub struct Node {
    pub id:       NodeId,
    pub position: GeoPoint,

    incoming: Vec<EdgeId>,
    leaving:  Vec<EdgeId>,

    /// incoming lane → leaving lanes it may turn into.
    connectors: FxHashMap<LaneRef, Vec<LaneRef>>,
    /// incoming edge → leaving edges reachable through some connector
    /// (sorted, deduplicated).
    turns: FxHashMap<EdgeId, Vec<EdgeId>>,

    crossing_indices: FxHashMap<EdgeId, u8>,
    crossing_logic:   CrossingLogicConfig,

    registered: BTreeSet<VehicleId>,
    granted:    BTreeSet<VehicleId>,
}

impl Node {
    pub(crate) fn new(id: NodeId, position: GeoPoint, crossing_logic: CrossingLogicConfig) -> Self {
        Self {
            id,
            position,
            incoming: Vec::new(),
            leaving: Vec::new(),
            connectors: FxHashMap::default(),
            turns: FxHashMap::default(),
            crossing_indices: FxHashMap::default(),
            crossing_logic,
            registered: BTreeSet::new(),
            granted: BTreeSet::new(),
        }
    }

    // ── Topology ──────────────────────────────────────────────────────────

    pub fn incoming_edges(&self) -> &[EdgeId] {
        &self.incoming
    }

    pub fn leaving_edges(&self) -> &[EdgeId] {
        &self.leaving
    }

    pub fn crossing_logic(&self) -> &CrossingLogicConfig {
        &self.crossing_logic
    }

    /// Returns `false` if the edge was already known.
    pub(crate) fn add_incoming(&mut self, edge: EdgeId) -> bool {
        insert_sorted(&mut self.incoming, edge)
    }

    pub(crate) fn add_leaving(&mut self, edge: EdgeId) -> bool {
        insert_sorted(&mut self.leaving, edge)
    }

    pub(crate) fn add_connector(&mut self, incoming: LaneRef, leaving: LaneRef) {
        let lanes = self.connectors.entry(incoming).or_default();
        if !lanes.contains(&leaving) {
            lanes.push(leaving);
        }
        insert_sorted(self.turns.entry(incoming.edge).or_default(), leaving.edge);
    }

    /// Lane to continue on when leaving `incoming` towards `next_edge`.
    ///
    /// `None` if no connector allows that turn; the vehicle then stalls in
    /// front of the node.
    pub fn next_lane(&self, incoming: LaneRef, next_edge: EdgeId) -> Option<LaneRef> {
        self.connectors
            .get(&incoming)?
            .iter()
            .find(|l| l.edge == next_edge)
            .copied()
    }

    /// Leaving edges reachable from any lane of `incoming`.
    pub fn turns_from(&self, incoming: EdgeId) -> &[EdgeId] {
        self.turns.get(&incoming).map_or(&[], Vec::as_slice)
    }

    pub fn connector_count(&self) -> usize {
        self.connectors.values().map(Vec::len).sum()
    }

    pub(crate) fn set_crossing_indices(&mut self, arms: &[Arm]) {
        self.crossing_indices = crossing::crossing_order(arms, self.crossing_logic.is_driving_on_the_right())
            .into_iter()
            .collect();
    }

    pub fn crossing_index(&self, edge: EdgeId) -> Option<u8> {
        self.crossing_indices.get(&edge).copied()
    }

    /// Number of crossing indices (incoming plus leaving edges).
    pub fn indices_per_node(&self) -> u8 {
        self.crossing_indices.len() as u8
    }

    // ── Requests ──────────────────────────────────────────────────────────

    /// Add a crossing request.  Returns `false` if already registered.
    pub fn register(&mut self, vehicle: VehicleId) -> bool {
        self.registered.insert(vehicle)
    }

    /// Withdraw a request (and any permission it held).  Returns `false` if
    /// the vehicle was not registered.
    pub fn unregister(&mut self, vehicle: VehicleId) -> bool {
        self.granted.remove(&vehicle);
        self.registered.remove(&vehicle)
    }

    pub fn is_registered(&self, vehicle: VehicleId) -> bool {
        self.registered.contains(&vehicle)
    }

    pub fn registered(&self) -> impl Iterator<Item = VehicleId> + '_ {
        self.registered.iter().copied()
    }

    pub fn granted(&self) -> impl Iterator<Item = VehicleId> + '_ {
        self.granted.iter().copied()
    }

    /// Whether `vehicle` may cross during the current tick.
    #[inline]
    pub fn permission_to_cross(&self, vehicle: VehicleId) -> bool {
        self.granted.contains(&vehicle)
    }

    // ── Arbitration ───────────────────────────────────────────────────────

    /// Recompute the permission set from the current requests.
    ///
    /// `participants` is the vehicle arena, indexed by `VehicleId`.  Every
    /// registered vehicle that is not granted has its priority counter
    /// incremented; granted vehicles have it reset.
    pub fn update<P: CrossingParticipant>(
        &mut self,
        edges: &[DirectedEdge],
        participants: &[P],
    ) -> GraphResult<()> {
        self.granted.clear();
        if self.registered.is_empty() {
            return Ok(());
        }

        let mut requests = Vec::with_capacity(self.registered.len());
        for &id in &self.registered {
            let p = participants
                .get(id.index())
                .ok_or(GraphError::UnknownParticipant { node: self.id, vehicle: id })?;
            requests.push(self.request_of(p, edges));
        }

        let friendly = self.crossing_logic.is_friendly_standing_in_jam_enabled();
        let candidates: Vec<&Request> = requests
            .iter()
            .filter(|r| r.target.is_some() && (!friendly || r.has_space))
            .collect();

        let granted = self.arbitrate(&candidates, edges);

        for r in &requests {
            let counter = participants[r.vehicle.index()].priority_counter();
            if granted.contains(&r.vehicle) {
                counter.reset();
            } else {
                counter.increment().map_err(|source| GraphError::Counter {
                    node: self.id,
                    vehicle: r.vehicle,
                    source,
                })?;
            }
        }

        if !granted.is_empty() {
            log::trace!("{}: granted {:?} of {} requests", self.id, granted, requests.len());
        }
        self.granted = granted;
        Ok(())
    }

    fn request_of<P: CrossingParticipant>(&self, p: &P, edges: &[DirectedEdge]) -> Request {
        let spawned = p.is_spawned();
        let current = p.current_lane();
        let leaving = p.next_edge();

        let target = match (spawned, current, leaving) {
            (true, Some(lane), Some(next)) => self.next_lane(lane, next),
            (false, _, Some(first)) if self.leaving.binary_search(&first).is_ok() => {
                Some(LaneRef::outermost(first))
            }
            _ => None,
        };
        let has_space = target
            .and_then(|t| edges.get(t.edge.index())?.lane(t.index))
            .is_some_and(|lane| lane.max_insertion_index() >= 0);

        Request {
            vehicle: p.vehicle_id(),
            spawned,
            incoming: current.map(|l| l.edge),
            leaving,
            target,
            has_space,
            counter: p.priority_counter().get(),
        }
    }

    /// Pairwise precedence of two requests.
    fn compare(&self, a: &Request, b: &Request, edges: &[DirectedEdge]) -> Precedence {
        match (a.spawned, b.spawned) {
            // Waiting to spawn: the greater id goes first.
            (false, false) => {
                if a.vehicle > b.vehicle { Precedence::First } else { Precedence::Second }
            }
            (true, false) => Precedence::First,
            (false, true) => Precedence::Second,
            (true, true) => self.compare_spawned(a, b, edges),
        }
    }

    fn compare_spawned(&self, a: &Request, b: &Request, edges: &[DirectedEdge]) -> Precedence {
        let (Some(ia), Some(la), Some(ib), Some(lb)) = (a.incoming, a.leaving, b.incoming, b.leaving)
        else {
            return Precedence::Undecided;
        };
        // Side by side on the same edge, heading for the same edge.
        if ia == ib && la == lb {
            return Precedence::Undecided;
        }
        let (Some(o1), Some(d1), Some(o2), Some(d2)) = (
            self.crossing_index(ia),
            self.crossing_index(la),
            self.crossing_index(ib),
            self.crossing_index(lb),
        ) else {
            return Precedence::Undecided;
        };
        let n = self.indices_per_node();

        if !crossing::paths_cross(o1, d1, o2, d2, n) {
            return Precedence::Compatible;
        }

        if self.crossing_logic.is_edge_priority_enabled() {
            let level = |e: EdgeId| edges.get(e.index()).map_or(0, |e| e.priority_level);
            let by_level = level(ia).cmp(&level(ib)).then_with(|| level(la).cmp(&level(lb)));
            match by_level {
                Ordering::Greater => return Precedence::First,
                Ordering::Less => return Precedence::Second,
                Ordering::Equal => {}
            }
        }

        if self.crossing_logic.is_priority_to_the_right_enabled() {
            crossing::right_of_way(o1, d1, o2, d2, n)
        } else {
            Precedence::Undecided
        }
    }

    /// Choose the permission set among `candidates` (ascending id order).
    ///
    /// A candidate's score is the number of other candidates it goes before
    /// or is compatible with.  If the best score covers every other
    /// candidate, all candidates with that score are pairwise compatible and
    /// are granted together.  Otherwise (or when only one vehicle may cross
    /// per update) a single best-scored candidate is granted: highest
    /// priority counter first, then lowest id.
    fn arbitrate(&self, candidates: &[&Request], edges: &[DirectedEdge]) -> BTreeSet<VehicleId> {
        let n = candidates.len();
        if n == 0 {
            return BTreeSet::new();
        }

        let mut scores = vec![0usize; n];
        for i in 0..n {
            for j in (i + 1)..n {
                match self.compare(candidates[i], candidates[j], edges) {
                    Precedence::First => scores[i] += 1,
                    Precedence::Second => scores[j] += 1,
                    Precedence::Compatible => {
                        scores[i] += 1;
                        scores[j] += 1;
                    }
                    Precedence::Undecided => {}
                }
            }
        }

        let best = scores.iter().copied().max().unwrap_or(0);
        let best_set = candidates
            .iter()
            .zip(&scores)
            .filter(|&(_, &s)| s == best)
            .map(|(r, _)| *r);

        if best == n - 1 && !self.crossing_logic.only_one_vehicle() {
            best_set.map(|r| r.vehicle).collect()
        } else {
            best_set
                .max_by_key(|r| (r.counter, Reverse(r.vehicle)))
                .map(|r| r.vehicle)
                .into_iter()
                .collect()
        }
    }
}

impl Resettable for Node {
    fn reset(&mut self) {
        self.registered.clear();
        self.granted.clear();
    }
}

/// Insert into a sorted vector unless present.  Returns `true` on insert.
fn insert_sorted<T: Ord>(v: &mut Vec<T>, item: T) -> bool {
    match v.binary_search(&item) {
        Ok(_) => false,
        Err(i) => {
            v.insert(i, item);
            true
        }
    }
}
