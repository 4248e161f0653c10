//! `ts-vehicle` — drivers, vehicles and their per-tick state machine.
//!
//! # Crate layout
//!
//! | Module      | Contents                                                    |
//! |-------------|-------------------------------------------------------------|
//! | [`driver`]  | `Driver` (route, priority counter, dawdling, anger)        |
//! | [`vehicle`] | `Vehicle`, `VehicleState`, the phase methods               |
//! | [`event`]   | `VehicleEvent`, shared-state changes emitted by phases     |
//! | [`entity`]  | `VehicleEntity` visualisation handle, `NoEntity`           |
//! | [`error`]   | `VehicleError`, `VehicleResult<T>`                         |
//!
//! # Phase contract
//!
//! Every phase method takes `&mut self` and `&Graph` only.  It may change the
//! vehicle's own fields but never the graph; changes to lane occupancy, node
//! requests and vehicle membership are pushed as [`VehicleEvent`]s and
//! applied by the stepper once the whole population has finished the phase.
//! Reads of "the vehicle in front" therefore always see the lane as it was
//! at phase entry, whichever thread runs the phase.

pub mod driver;
pub mod entity;
pub mod error;
pub mod event;
pub mod vehicle;

#[cfg(test)]
mod tests;

pub use driver::Driver;
pub use entity::{NoEntity, VehicleEntity};
pub use error::{VehicleError, VehicleResult};
pub use event::VehicleEvent;
pub use vehicle::{Vehicle, VehicleState};
