//! Vehicle-subsystem error type.

use thiserror::Error;

use ts_core::{EdgeId, NodeId, VehicleId};
use ts_graph::{GraphError, LaneRef};

/// Broken invariants detected while stepping a vehicle.  All are fatal.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VehicleError {
    #[error("{vehicle}: negative velocity {velocity} after braking")]
    NegativeVelocity { vehicle: VehicleId, velocity: i64 },

    #[error("{vehicle}: dawdling raised velocity from {before} to {after}")]
    DawdleIncreasedVelocity { vehicle: VehicleId, before: u32, after: u32 },

    #[error("{0}: spawned vehicle is not on a lane")]
    NotOnLane(VehicleId),

    #[error("{vehicle}: no connector from {lane} to {next} at {node}")]
    NoNextLane { vehicle: VehicleId, node: NodeId, lane: LaneRef, next: EdgeId },

    #[error(transparent)]
    Graph(#[from] GraphError),
}

pub type VehicleResult<T> = Result<T, VehicleError>;
