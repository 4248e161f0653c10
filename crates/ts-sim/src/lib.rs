//! `ts-sim` — deterministic, optionally multi-threaded stepper and scenario
//! preparation for the traffic_sim framework.
//!
//! # Tick loop
//!
//! ```text
//! for tick in 0..config.total_ticks:
//!   ① spawn       — waiting vehicles enter at their route origin
//!   ② will move   — accelerate, brake, dawdle
//!   ③ move        — advance, cross nodes, leave the graph
//!   ④ did move    — mood bookkeeping, node (un)registration
//!   ⑤ nodes       — every node recomputes who may cross
//!   (events of ①–④ are applied between phases in ascending vehicle id order)
//! ```
//!
//! # Executors
//!
//! | Executor          | Selected when                 |
//! |-------------------|-------------------------------|
//! | `SingleThreaded`  | `multi_threading.n_threads == 1` |
//! | `MultiThreaded`   | `multi_threading.n_threads > 1`  |
//!
//! Both produce identical trajectories for the same prepared scenario.
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use ts_sim::{NoopObserver, Scenario, ScenarioBuilder, SimBuilder};
//!
//! let mut scenario = Scenario::random(config, graph, 30);
//! ScenarioBuilder::default().prepare(&mut scenario)?;
//! let mut sim = SimBuilder::new(scenario).build()?;
//! sim.run(&mut NoopObserver)?;
//! ```

pub mod builder;
pub mod container;
pub mod error;
pub mod executor;
pub mod observer;
pub mod scenario;
pub mod sim;

#[cfg(test)]
mod tests;

pub use builder::SimBuilder;
pub use container::VehicleContainer;
pub use error::{ScenarioError, ScenarioResult, SimError, SimResult};
pub use executor::{MultiThreaded, SingleThreaded, StepExecutor};
pub use observer::{NoopObserver, SimObserver, TickSummary};
pub use scenario::{PROGRESS_STEP, ProgressListener, RouteRequest, Scenario, ScenarioBuilder, random_requests};
pub use sim::Sim;
