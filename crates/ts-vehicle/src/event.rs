//! Shared-state changes produced by vehicle phases.

use ts_core::{NodeId, VehicleId};
use ts_graph::LaneRef;

use crate::VehicleState;

/// One change a vehicle needs applied to shared state at the next phase
/// barrier.
///
/// The stepper applies a phase's events in ascending vehicle id order:
/// all removals first, then in-lane advances, then insertions, then node
/// requests, then state changes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VehicleEvent {
    LaneRemove { vehicle: VehicleId, lane: LaneRef },
    LaneAdvance { vehicle: VehicleId, lane: LaneRef, delta: u32 },
    LaneInsert { vehicle: VehicleId, lane: LaneRef, cell: u32 },
    Register { vehicle: VehicleId, node: NodeId },
    Unregister { vehicle: VehicleId, node: NodeId },
    StateChanged { vehicle: VehicleId, from: VehicleState, to: VehicleState },
}

impl VehicleEvent {
    pub fn vehicle(&self) -> VehicleId {
        match *self {
            VehicleEvent::LaneRemove { vehicle, .. }
            | VehicleEvent::LaneAdvance { vehicle, .. }
            | VehicleEvent::LaneInsert { vehicle, .. }
            | VehicleEvent::Register { vehicle, .. }
            | VehicleEvent::Unregister { vehicle, .. }
            | VehicleEvent::StateChanged { vehicle, .. } => vehicle,
        }
    }
}
