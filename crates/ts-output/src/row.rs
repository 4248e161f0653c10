//! Plain data row types written by output backends.

use ts_core::{EdgeId, Tick};
use ts_vehicle::{Vehicle, VehicleState};

use ts_sim::TickSummary;

/// Where one spawned vehicle is at a given tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VehicleSnapshotRow {
    pub tick:       u64,
    pub vehicle_id: u32,
    pub state:      VehicleState,
    /// `u32::MAX` when the vehicle is not on a lane.
    pub edge:       u32,
    pub lane:       u8,
    pub cell:       u32,
    pub velocity:   u32,
}

impl VehicleSnapshotRow {
    pub fn of(tick: Tick, v: &Vehicle) -> Self {
        let lane = v.lane();
        Self {
            tick:       tick.0,
            vehicle_id: v.id().0,
            state:      v.state(),
            edge:       lane.map_or(EdgeId::INVALID.0, |l| l.edge.0),
            lane:       lane.map_or(0, |l| l.index),
            cell:       v.cell(),
            velocity:   v.velocity(),
        }
    }
}

/// Population counts for one simulation tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSummaryRow {
    pub tick:        u64,
    pub spawned:     u64,
    pub not_spawned: u64,
    pub despawned:   u64,
    pub angry:       u64,
}

impl From<&TickSummary> for TickSummaryRow {
    fn from(s: &TickSummary) -> Self {
        Self {
            tick:        s.tick.0,
            spawned:     s.spawned as u64,
            not_spawned: s.not_spawned as u64,
            despawned:   s.despawned as u64,
            angry:       s.angry as u64,
        }
    }
}
