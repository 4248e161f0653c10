//! `ts-core` — foundational types for the `traffic_sim` cellular-automaton
//! framework.
//!
//! This crate is a dependency of every other `ts-*` crate.  It intentionally
//! has no `ts-*` dependencies and minimal external ones (`rand`, `thiserror`
//! and `log`, plus optional `serde`).
//!
//! # What lives here
//!
//! | Module          | Contents                                              |
//! |-----------------|-------------------------------------------------------|
//! | [`ids`]         | `VehicleId`, `NodeId`, `EdgeId`                       |
//! | [`geo`]         | `GeoPoint`, haversine distance, planar bearing        |
//! | [`time`]        | `Tick`                                                |
//! | [`config`]      | `SimConfig`, `CrossingLogicConfig`, `MultiThreadingConfig` |
//! | [`rng`]         | `DriverRng`, `SimRng`, `SeedGenerator`, `IdGenerator` |
//! | [`counter`]     | `PriorityCounter` (mutex-guarded, checked)            |
//! | [`cancel`]      | `CancelToken` (cooperative interruption)              |
//! | [`reset`]       | `Resettable` capability trait                         |
//! | [`error`]       | `CoreError`, `CoreResult`                             |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to ids, ticks and configs.  |

pub mod cancel;
pub mod config;
pub mod counter;
pub mod error;
pub mod geo;
pub mod ids;
pub mod reset;
pub mod rng;
pub mod time;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use cancel::CancelToken;
pub use config::{CrossingLogicConfig, MultiThreadingConfig, SimConfig};
pub use counter::PriorityCounter;
pub use error::{CoreError, CoreResult};
pub use geo::GeoPoint;
pub use ids::{EdgeId, NodeId, VehicleId};
pub use reset::Resettable;
pub use rng::{DriverRng, IdGenerator, SeedGenerator, SimRng};
pub use time::Tick;
