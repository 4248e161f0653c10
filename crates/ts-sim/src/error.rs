use thiserror::Error;

use ts_core::{CoreError, NodeId, Tick, VehicleId};
use ts_vehicle::VehicleError;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("simulation configuration error: {0}")]
    Config(String),

    #[error("scenario is not prepared; call ScenarioBuilder::prepare first")]
    NotPrepared,

    /// A broken invariant.  The run cannot continue.
    #[error("fatal error at {tick} (vehicle {vehicle:?}, node {node:?}): {source}")]
    Fatal {
        tick:    Tick,
        vehicle: Option<VehicleId>,
        node:    Option<NodeId>,
        #[source]
        source:  VehicleError,
    },

    #[error("simulation cancelled at {0}")]
    Cancelled(Tick),
}

impl From<CoreError> for SimError {
    fn from(e: CoreError) -> Self {
        SimError::Config(e.to_string())
    }
}

pub type SimResult<T> = Result<T, SimError>;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("scenario configuration error: {0}")]
    Config(String),

    #[error("route request {index}: node {node} is not part of the graph")]
    UnknownNode { index: usize, node: NodeId },

    #[error("scenario preparation cancelled")]
    Cancelled,
}

impl From<CoreError> for ScenarioError {
    fn from(e: CoreError) -> Self {
        ScenarioError::Config(e.to_string())
    }
}

pub type ScenarioResult<T> = Result<T, ScenarioError>;
