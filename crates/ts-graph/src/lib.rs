//! `ts-graph` — street graph, lane cells, crossing arbitration and routing.
//!
//! # Crate layout
//!
//! | Module       | Contents                                                   |
//! |--------------|------------------------------------------------------------|
//! | [`lane`]     | `Lane` (sorted cell occupancy), `LaneRef`                  |
//! | [`edge`]     | `DirectedEdge`, `EdgeSpec`                                 |
//! | [`crossing`] | Crossing indices, path-crossing test, right-of-way rule    |
//! | [`node`]     | `Node` (connectors, request bookkeeping, `update`)         |
//! | [`graph`]    | `Graph` arena + R-tree, `GraphBuilder`                     |
//! | [`route`]    | `Route`, `ShortestPathProvider`, `DijkstraRouter`          |
//! | [`error`]    | `GraphError`, `GraphResult<T>`                             |
//!
//! # Ownership
//!
//! Nodes and edges live in two arenas inside [`Graph`] and refer to each
//! other only by id.  Lanes are owned by their edge.  Vehicles are not owned
//! by the graph at all: lanes and nodes store `VehicleId`s only, and the
//! arbitrator reads vehicle state through the [`CrossingParticipant`]
//! capability trait.
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                       |
//! |---------|--------------------------------------------------------------|
//! | `serde` | Derives `Serialize`/`Deserialize` on `LaneRef` and `EdgeSpec`.|

pub mod crossing;
pub mod edge;
pub mod error;
pub mod graph;
pub mod lane;
pub mod node;
pub mod route;


pub use crossing::{CrossingParticipant, Precedence};
pub use edge::{DirectedEdge, EdgeSpec};
pub use error::{GraphError, GraphResult};
pub use graph::{Graph, GraphBuilder};
pub use lane::{Lane, LaneRef};
pub use node::Node;
pub use route::{DijkstraRouter, Route, ShortestPathProvider};
