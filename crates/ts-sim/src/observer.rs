//! Simulation observer trait for progress reporting and data collection.

use ts_core::Tick;
use ts_graph::Graph;
use ts_vehicle::{Vehicle, VehicleState};

use crate::VehicleContainer;

/// Population counts at the end of a tick.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub tick:        Tick,
    pub not_spawned: usize,
    pub spawned:     usize,
    pub despawned:   usize,
    /// Vehicles still waiting or driving whose driver is angry (anger > 0).
    pub angry:       usize,
}

impl TickSummary {
    pub fn collect(tick: Tick, container: &VehicleContainer, vehicles: &[Vehicle]) -> Self {
        Self {
            tick,
            not_spawned: container.count(VehicleState::NotSpawned),
            spawned:     container.count(VehicleState::Spawned),
            despawned:   container.count(VehicleState::Despawned),
            angry:       vehicles
                .iter()
                .filter(|v| v.state() != VehicleState::Despawned && v.driver().anger() > 0)
                .count(),
        }
    }
}

/// Callbacks invoked by [`Sim::run`][crate::Sim::run] at key points in the
/// tick loop.
///
/// All methods have default no-op implementations so implementors only need to
/// override what they care about.
///
/// # Example (progress printer)
///
/// ```rust,ignore
/// struct ProgressPrinter { interval: u64 }
///
/// impl SimObserver for ProgressPrinter {
///     fn on_tick_end(&mut self, summary: &TickSummary) {
///         if summary.tick.0 % self.interval == 0 {
///             println!("{}: {} driving", summary.tick, summary.spawned);
///         }
///     }
/// }
/// ```
pub trait SimObserver {
    /// Called at the very start of each tick, before any phase.
    fn on_tick_start(&mut self, _tick: Tick) {}

    /// Called after the node update phase of each tick.
    fn on_tick_end(&mut self, _summary: &TickSummary) {}

    /// Called at snapshot intervals (every `config.output_interval_ticks`
    /// ticks) with read-only access to the whole population and graph.
    fn on_snapshot(&mut self, _tick: Tick, _vehicles: &[Vehicle], _graph: &Graph) {}

    /// Called once after the final tick completes.
    fn on_sim_end(&mut self, _final_tick: Tick) {}
}

/// A [`SimObserver`] that does nothing.
pub struct NoopObserver;

impl SimObserver for NoopObserver {}
