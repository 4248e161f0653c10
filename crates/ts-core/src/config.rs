//! Run configuration.
//!
//! `SimConfig` is the single value threaded through graph construction,
//! scenario preparation and the stepper.  Defaults reproduce the classic
//! setup: 7.5 m cells, a global speed limit of 6 cells per tick and 100
//! vehicles, stepped on a single thread.

use crate::{CoreError, CoreResult};

// ── CrossingLogicConfig ───────────────────────────────────────────────────────

/// Which right-of-way rules a node applies when arbitrating crossing
/// requests.
///
/// `only_one_vehicle` is derived: with priority-to-the-right switched off the
/// node has no rule left to break ties between crossing paths, so it always
/// falls back to granting a single vehicle per update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CrossingLogicConfig {
    driving_on_the_right:             bool,
    edge_priority_enabled:            bool,
    priority_to_the_right_enabled:    bool,
    only_one_vehicle_enabled:         bool,
    friendly_standing_in_jam_enabled: bool,
}

impl Default for CrossingLogicConfig {
    fn default() -> Self {
        Self {
            driving_on_the_right:             true,
            edge_priority_enabled:            true,
            priority_to_the_right_enabled:    true,
            only_one_vehicle_enabled:         false,
            friendly_standing_in_jam_enabled: true,
        }
    }
}

impl CrossingLogicConfig {
    pub fn driving_on_the_right(mut self, on: bool) -> Self {
        self.driving_on_the_right = on;
        self
    }

    pub fn edge_priority(mut self, on: bool) -> Self {
        self.edge_priority_enabled = on;
        self
    }

    pub fn priority_to_the_right(mut self, on: bool) -> Self {
        self.priority_to_the_right_enabled = on;
        self
    }

    pub fn only_one_vehicle_enabled(mut self, on: bool) -> Self {
        self.only_one_vehicle_enabled = on;
        self
    }

    pub fn friendly_standing_in_jam(mut self, on: bool) -> Self {
        self.friendly_standing_in_jam_enabled = on;
        self
    }

    #[inline]
    pub fn is_driving_on_the_right(&self) -> bool {
        self.driving_on_the_right
    }

    #[inline]
    pub fn is_edge_priority_enabled(&self) -> bool {
        self.edge_priority_enabled
    }

    #[inline]
    pub fn is_priority_to_the_right_enabled(&self) -> bool {
        self.priority_to_the_right_enabled
    }

    #[inline]
    pub fn is_friendly_standing_in_jam_enabled(&self) -> bool {
        self.friendly_standing_in_jam_enabled
    }

    /// Whether a node may grant at most one request per update.
    #[inline]
    pub fn only_one_vehicle(&self) -> bool {
        self.only_one_vehicle_enabled || !self.priority_to_the_right_enabled
    }
}

// ── MultiThreadingConfig ──────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MultiThreadingConfig {
    /// Worker threads.  `1` selects the sequential executor.
    pub n_threads: usize,

    /// Vehicles handed to one worker task per phase.
    pub vehicles_per_runnable: usize,

    /// Nodes handed to one worker task in the node update phase.
    pub nodes_per_thread: usize,
}

impl Default for MultiThreadingConfig {
    fn default() -> Self {
        Self { n_threads: 1, vehicles_per_runnable: 200, nodes_per_thread: 10 }
    }
}

// ── SimConfig ─────────────────────────────────────────────────────────────────

/// Top-level parameters for a simulation run.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SimConfig {
    /// Master RNG seed.  The same seed always produces identical results.
    pub seed: u64,

    /// Total ticks to simulate.
    pub total_ticks: u64,

    /// Physical length of one lane cell.
    pub meters_per_cell: f32,

    /// Upper bound on every edge's speed limit, in cells per tick.
    pub global_max_velocity: u32,

    /// Number of vehicles a random scenario creates.
    pub max_vehicle_count: usize,

    pub crossing_logic: CrossingLogicConfig,

    pub multi_threading: MultiThreadingConfig,

    /// Report a snapshot to observers every N ticks.  1 = every tick.
    pub output_interval_ticks: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed:                  0,
            total_ticks:           1_000,
            meters_per_cell:       7.5,
            global_max_velocity:   6,
            max_vehicle_count:     100,
            crossing_logic:        CrossingLogicConfig::default(),
            multi_threading:       MultiThreadingConfig::default(),
            output_interval_ticks: 1,
        }
    }
}

impl SimConfig {
    /// Reject values no run can work with.
    pub fn validate(&self) -> CoreResult<()> {
        if self.meters_per_cell.is_nan() || self.meters_per_cell <= 0.0 {
            return Err(CoreError::Config(format!(
                "meters_per_cell must be positive, got {}",
                self.meters_per_cell
            )));
        }
        if self.global_max_velocity == 0 {
            return Err(CoreError::Config("global_max_velocity must be at least 1".into()));
        }
        let mt = &self.multi_threading;
        if mt.n_threads == 0 || mt.vehicles_per_runnable == 0 || mt.nodes_per_thread == 0 {
            return Err(CoreError::Config(format!(
                "multi-threading values must be at least 1, got {mt:?}"
            )));
        }
        if self.output_interval_ticks == 0 {
            return Err(CoreError::Config("output_interval_ticks must be at least 1".into()));
        }
        if let Ok(cores) = std::thread::available_parallelism() {
            if mt.n_threads > cores.get() {
                log::warn!("n_threads = {} exceeds the {} available cores", mt.n_threads, cores);
            }
        }
        Ok(())
    }

    /// Number of whole cells covering `meters` (at least one).
    pub fn cells_for_meters(&self, meters: f32) -> u32 {
        let cells = (meters / self.meters_per_cell).ceil();
        if cells.is_finite() && cells >= 1.0 { cells as u32 } else { 1 }
    }

    /// Convert a speed limit in km/h to cells per tick (one tick = one
    /// second), capped by `global_max_velocity` and at least 1.
    pub fn cells_per_tick(&self, kmh: f32) -> u32 {
        let v = (kmh / 3.6 / self.meters_per_cell).round();
        let v = if v.is_finite() && v >= 1.0 { v as u32 } else { 1 };
        v.min(self.global_max_velocity)
    }
}
