//! Graph-subsystem error type.

use thiserror::Error;

use ts_core::{CoreError, EdgeId, NodeId, VehicleId};

use crate::LaneRef;

/// Errors produced by `ts-graph`.
///
/// Every variant except `NoRoute` signals a broken invariant; callers in the
/// stepper treat them as fatal.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GraphError {
    #[error("{lane}: cell {cell} already occupied by {occupant}, cannot insert {vehicle}")]
    CellOccupied {
        lane:     LaneRef,
        cell:     u32,
        vehicle:  VehicleId,
        occupant: VehicleId,
    },

    #[error("{lane}: cell {cell} outside lane of length {length}")]
    CellOutOfRange { lane: LaneRef, cell: u32, length: u32 },

    #[error("{lane}: {vehicle} is not on this lane")]
    VehicleNotOnLane { lane: LaneRef, vehicle: VehicleId },

    #[error("{lane}: moving {vehicle} by {delta} would pass the vehicle in front")]
    Overtaking { lane: LaneRef, vehicle: VehicleId, delta: u32 },

    #[error("node {0} not found in graph")]
    NodeNotFound(NodeId),

    #[error("edge {0} not found in graph")]
    EdgeNotFound(EdgeId),

    #[error("lane {0} not found in graph")]
    LaneNotFound(LaneRef),

    #[error("{node}: connector {incoming} -> {leaving} does not pass through this node")]
    InvalidConnector { node: NodeId, incoming: LaneRef, leaving: LaneRef },

    #[error("{node}: registered {vehicle} has no participant state")]
    UnknownParticipant { node: NodeId, vehicle: VehicleId },

    #[error("{node}: priority counter of {vehicle}: {source}")]
    Counter {
        node:    NodeId,
        vehicle: VehicleId,
        #[source]
        source:  CoreError,
    },

    #[error("no route from {from} to {to}")]
    NoRoute { from: NodeId, to: NodeId },
}

pub type GraphResult<T> = Result<T, GraphError>;
