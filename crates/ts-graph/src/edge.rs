//! Directed street segments.

use ts_core::{EdgeId, NodeId, SimConfig};

use crate::{Lane, LaneRef};

/// Per-edge attributes supplied by the topology source.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EdgeSpec {
    /// Number of lanes (at least one).
    pub lanes: u8,

    /// Speed limit in cells per tick.
    pub max_velocity: u32,

    /// Street priority level; higher levels take precedence at crossings.
    pub priority_level: i8,
}

impl EdgeSpec {
    pub fn new(lanes: u8, max_velocity: u32, priority_level: i8) -> Self {
        Self { lanes, max_velocity, priority_level }
    }

    /// Build a spec from a km/h speed limit using the run's cell size.
    pub fn from_kmh(config: &SimConfig, lanes: u8, kmh: f32, priority_level: i8) -> Self {
        Self { lanes, max_velocity: config.cells_per_tick(kmh), priority_level }
    }
}

impl Default for EdgeSpec {
    fn default() -> Self {
        Self { lanes: 1, max_velocity: 5, priority_level: 0 }
    }
}

/// A one-way street segment from `origin` to `destination`.
#[derive(Clone, Debug)]
pub struct DirectedEdge {
    pub id:             EdgeId,
    pub origin:         NodeId,
    pub destination:    NodeId,
    /// Length in cells.
    pub length:         u32,
    pub length_m:       f32,
    /// Speed limit in cells per tick.
    pub max_velocity:   u32,
    pub priority_level: i8,
    lanes:              Vec<Lane>,
}

impl DirectedEdge {
    pub(crate) fn new(
        id: EdgeId,
        origin: NodeId,
        destination: NodeId,
        length: u32,
        length_m: f32,
        spec: EdgeSpec,
    ) -> Self {
        let lane_count = spec.lanes.max(1);
        let lanes = (0..lane_count)
            .map(|i| Lane::new(LaneRef::new(id, i), length))
            .collect();
        Self {
            id,
            origin,
            destination,
            length,
            length_m,
            max_velocity: spec.max_velocity,
            priority_level: spec.priority_level,
            lanes,
        }
    }

    #[inline]
    pub fn lane_count(&self) -> u8 {
        self.lanes.len() as u8
    }

    #[inline]
    pub fn lane(&self, index: u8) -> Option<&Lane> {
        self.lanes.get(usize::from(index))
    }

    #[inline]
    pub(crate) fn lane_mut(&mut self, index: u8) -> Option<&mut Lane> {
        self.lanes.get_mut(usize::from(index))
    }

    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    /// Neighbouring lane towards the kerb, if any.
    pub fn outer_lane(&self, index: u8) -> Option<LaneRef> {
        index.checked_sub(1).map(|i| LaneRef::new(self.id, i))
    }

    /// Neighbouring lane towards the centre line, if any.
    pub fn inner_lane(&self, index: u8) -> Option<LaneRef> {
        let i = index.checked_add(1)?;
        (i < self.lane_count()).then(|| LaneRef::new(self.id, i))
    }

    /// Vehicles on all lanes.
    pub fn vehicle_count(&self) -> usize {
        self.lanes.iter().map(Lane::vehicle_count).sum()
    }

    /// `true` for the opposite direction of a two-way street.
    #[inline]
    pub fn is_reverse_of(&self, other: &DirectedEdge) -> bool {
        self.origin == other.destination && self.destination == other.origin
    }

    pub(crate) fn clear(&mut self) {
        for lane in &mut self.lanes {
            lane.clear();
        }
    }
}
