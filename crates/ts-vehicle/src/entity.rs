//! Optional visualisation handle.

use ts_core::VehicleId;
use ts_graph::LaneRef;

/// Receives position and appearance updates for one vehicle.
///
/// All methods have no-op defaults; implement only what you need.  The
/// simulation never reads anything back from an entity, so whether a vehicle
/// carries one cannot change its trajectory.
pub trait VehicleEntity: Send + Sync {
    /// The vehicle is now at `cell` of `lane` (`None` once it left the graph).
    fn update_position(&self, _vehicle: VehicleId, _lane: Option<LaneRef>, _cell: u32) {}

    /// Called once per tick with the driver's current anger.
    fn set_base_color(&self, _vehicle: VehicleId, _anger: u32) {}
}

/// An entity that ignores every update.
pub struct NoEntity;

impl VehicleEntity for NoEntity {}
