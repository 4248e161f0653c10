//! Phase execution strategies.
//!
//! A phase is one task applied to every member of a population (vehicles or
//! nodes).  [`StepExecutor`] decides how those calls are spread over threads;
//! the stepper decides what the task is and applies its results afterwards.
//!
//! # Determinism
//!
//! Tasks only mutate the item they are handed and read shared state that no
//! task mutates, so the result of a task never depends on which thread runs
//! it.  Vehicle events are returned in input order (chunk results are
//! concatenated in chunk order), which is ascending vehicle id.  Both
//! executors therefore produce the same events for the same input.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use ts_core::{MultiThreadingConfig, NodeId, VehicleId};
use ts_graph::{GraphError, GraphResult, Node};
use ts_vehicle::{Vehicle, VehicleError, VehicleEvent, VehicleResult};

use crate::{SimError, SimResult};

/// Per-vehicle phase body.
pub type VehicleTask<'a> = dyn Fn(&mut Vehicle, &mut Vec<VehicleEvent>) -> VehicleResult<()> + Sync + 'a;

/// Per-node phase body.
pub type NodeTask<'a> = dyn Fn(&mut Node) -> GraphResult<()> + Sync + 'a;

/// The first vehicle (in input order) whose task failed.
#[derive(Debug)]
pub struct VehicleFault {
    pub vehicle: VehicleId,
    pub error:   VehicleError,
}

#[derive(Debug)]
pub struct NodeFault {
    pub node:  NodeId,
    pub error: GraphError,
}

/// How one phase is executed.  Every call returns only after the whole
/// population has been processed, which is the phase barrier.
pub trait StepExecutor: Send + Sync {
    fn name(&self) -> &'static str;

    fn n_threads(&self) -> usize;

    /// Run `task` on every vehicle.  Events come back in input order.
    fn run_vehicles(
        &self,
        vehicles: &mut [&mut Vehicle],
        task:     &VehicleTask<'_>,
    ) -> Result<Vec<VehicleEvent>, VehicleFault>;

    /// Run `task` on every node.
    fn run_nodes(&self, nodes: &mut [Node], task: &NodeTask<'_>) -> Result<(), NodeFault>;
}

/// The executor `config` asks for: sequential for one thread, a pool
/// otherwise.
pub fn executor_for(config: &MultiThreadingConfig) -> SimResult<Box<dyn StepExecutor>> {
    if config.n_threads <= 1 {
        Ok(Box::new(SingleThreaded))
    } else {
        Ok(Box::new(MultiThreaded::new(config)?))
    }
}

fn run_chunk(chunk: &mut [&mut Vehicle], task: &VehicleTask<'_>) -> Result<Vec<VehicleEvent>, VehicleFault> {
    let mut events = Vec::new();
    for v in chunk.iter_mut() {
        let vehicle = v.id();
        task(&mut **v, &mut events).map_err(|error| VehicleFault { vehicle, error })?;
    }
    Ok(events)
}

fn run_node_chunk(chunk: &mut [Node], task: &NodeTask<'_>) -> Result<(), NodeFault> {
    for n in chunk.iter_mut() {
        let node = n.id;
        task(n).map_err(|error| NodeFault { node, error })?;
    }
    Ok(())
}

// ── SingleThreaded ────────────────────────────────────────────────────────────

/// Everything on the calling thread, in ascending id order.
#[derive(Debug, Default, Clone, Copy)]
pub struct SingleThreaded;

impl StepExecutor for SingleThreaded {
    fn name(&self) -> &'static str {
        "single-threaded"
    }

    fn n_threads(&self) -> usize {
        1
    }

    fn run_vehicles(
        &self,
        vehicles: &mut [&mut Vehicle],
        task:     &VehicleTask<'_>,
    ) -> Result<Vec<VehicleEvent>, VehicleFault> {
        run_chunk(vehicles, task)
    }

    fn run_nodes(&self, nodes: &mut [Node], task: &NodeTask<'_>) -> Result<(), NodeFault> {
        run_node_chunk(nodes, task)
    }
}

// ── MultiThreaded ─────────────────────────────────────────────────────────────

/// A private rayon pool working on fixed-size chunks.
pub struct MultiThreaded {
    pool:                  ThreadPool,
    vehicles_per_runnable: usize,
    nodes_per_thread:      usize,
}

impl MultiThreaded {
    pub fn new(config: &MultiThreadingConfig) -> SimResult<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.n_threads.max(1))
            .thread_name(|i| format!("ts-step-{i}"))
            .build()
            .map_err(|e| SimError::Config(format!("cannot start worker pool: {e}")))?;
        Ok(Self {
            pool,
            vehicles_per_runnable: config.vehicles_per_runnable.max(1),
            nodes_per_thread:      config.nodes_per_thread.max(1),
        })
    }
}

impl std::fmt::Debug for MultiThreaded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiThreaded")
            .field("n_threads", &self.pool.current_num_threads())
            .field("vehicles_per_runnable", &self.vehicles_per_runnable)
            .field("nodes_per_thread", &self.nodes_per_thread)
            .finish()
    }
}

impl StepExecutor for MultiThreaded {
    fn name(&self) -> &'static str {
        "multi-threaded"
    }

    fn n_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    fn run_vehicles(
        &self,
        vehicles: &mut [&mut Vehicle],
        task:     &VehicleTask<'_>,
    ) -> Result<Vec<VehicleEvent>, VehicleFault> {
        let chunk = self.vehicles_per_runnable;
        let results: Vec<Result<Vec<VehicleEvent>, VehicleFault>> = self.pool.install(|| {
            vehicles.par_chunks_mut(chunk).map(|c| run_chunk(c, task)).collect()
        });

        let mut events = Vec::new();
        for r in results {
            events.extend(r?);
        }
        Ok(events)
    }

    fn run_nodes(&self, nodes: &mut [Node], task: &NodeTask<'_>) -> Result<(), NodeFault> {
        let chunk = self.nodes_per_thread;
        let results: Vec<Result<(), NodeFault>> = self.pool.install(|| {
            nodes.par_chunks_mut(chunk).map(|c| run_node_chunk(c, task)).collect()
        });
        results.into_iter().collect()
    }
}
