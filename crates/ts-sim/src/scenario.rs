//! Scenarios: a graph, route requests and the vehicles prepared from them.
//!
//! # Preparation
//!
//! [`ScenarioBuilder::prepare`] turns the route requests into vehicles:
//!
//! ```text
//! ① reset       — drop old vehicles, clear lanes and node requests
//! ② assign      — one sequential pass in request order hands out vehicle
//!                 ids (IdGenerator) and driver seeds (SeedGenerator)
//! ③ route       — one shortest path per request, on a worker pool when
//!                 n_threads > 1
//! ④ register    — vehicles are created and stored in id order
//! ```
//!
//! Because ids and seeds are assigned before any parallel work starts, the
//! prepared scenario is identical for every thread count.  The cancel token
//! is checked between the steps and once per vehicle; a cancelled
//! preparation leaves the scenario unprepared.

use std::sync::Arc;

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;

use ts_core::{CancelToken, IdGenerator, NodeId, Resettable, SeedGenerator, SimConfig, SimRng, VehicleId};
use ts_graph::{DijkstraRouter, Graph, Route, ShortestPathProvider};
use ts_vehicle::{Driver, Vehicle, VehicleEntity};

use crate::{ScenarioError, ScenarioResult};

// ── RouteRequest ──────────────────────────────────────────────────────────────

/// `count` vehicles driving from `origin` to `destination`, each held back
/// for `spawn_delay` ticks.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RouteRequest {
    pub origin:      NodeId,
    pub destination: NodeId,
    pub count:       u32,
    pub spawn_delay: u32,
}

impl RouteRequest {
    pub fn new(origin: NodeId, destination: NodeId) -> Self {
        Self { origin, destination, count: 1, spawn_delay: 0 }
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    pub fn with_spawn_delay(mut self, ticks: u32) -> Self {
        self.spawn_delay = ticks;
        self
    }
}

/// `count` single-vehicle requests between random distinct nodes, with spawn
/// delays drawn from `0..=max_spawn_delay`.
///
/// Origins are drawn from nodes with a leaving edge, destinations from nodes
/// with an incoming edge.  Returns an empty list if the graph has no two such
/// distinct nodes.
pub fn random_requests(graph: &Graph, count: usize, max_spawn_delay: u32, rng: &mut SimRng) -> Vec<RouteRequest> {
    let origins: Vec<NodeId> =
        graph.nodes().iter().filter(|n| !n.leaving_edges().is_empty()).map(|n| n.id).collect();
    let destinations: Vec<NodeId> =
        graph.nodes().iter().filter(|n| !n.incoming_edges().is_empty()).map(|n| n.id).collect();
    if origins.is_empty() || destinations.is_empty() {
        return Vec::new();
    }
    if origins.len() == 1 && destinations == origins {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(count);
    while out.len() < count {
        let origin = origins[rng.gen_range(0..origins.len())];
        let destination = destinations[rng.gen_range(0..destinations.len())];
        if origin == destination {
            continue;
        }
        let delay = rng.gen_range(0..=max_spawn_delay);
        out.push(RouteRequest::new(origin, destination).with_spawn_delay(delay));
    }
    out
}

// ── ProgressListener ──────────────────────────────────────────────────────────

/// Granularity of preparation progress reports, in percent.
pub const PROGRESS_STEP: u8 = 5;

/// Receives preparation progress in steps of [`PROGRESS_STEP`] percent.
pub trait ProgressListener: Send + Sync {
    fn on_progress(&self, percent: u8);
}

// ── Scenario ──────────────────────────────────────────────────────────────────

/// Everything one simulation run needs.
pub struct Scenario {
    config:   SimConfig,
    graph:    Graph,
    requests: Vec<RouteRequest>,
    /// Arena indexed by `VehicleId`.
    vehicles: Vec<Vehicle>,
    prepared: bool,
}

impl Scenario {
    pub fn new(config: SimConfig, graph: Graph) -> Self {
        Self { config, graph, requests: Vec::new(), vehicles: Vec::new(), prepared: false }
    }

    /// Scenario with `config.max_vehicle_count` random requests drawn from
    /// `config.seed`.
    pub fn random(config: SimConfig, graph: Graph, max_spawn_delay: u32) -> Self {
        let mut rng = SimRng::new(config.seed);
        let requests = random_requests(&graph, config.max_vehicle_count, max_spawn_delay, &mut rng);
        let mut scenario = Self::new(config, graph);
        scenario.requests = requests;
        scenario
    }

    /// Append a request.  The scenario must be prepared again afterwards.
    pub fn add_request(&mut self, request: RouteRequest) {
        self.requests.push(request);
        self.unprepare();
    }

    pub fn requests(&self) -> &[RouteRequest] {
        &self.requests
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(id.index())
    }

    #[inline]
    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    /// Drop all vehicles and clear the graph.
    pub fn unprepare(&mut self) {
        self.vehicles.clear();
        self.graph.reset();
        self.prepared = false;
    }

    pub(crate) fn split_mut(&mut self) -> (&mut Graph, &mut [Vehicle]) {
        (&mut self.graph, &mut self.vehicles)
    }
}

impl Resettable for Scenario {
    /// Rewind a prepared scenario to tick zero: same vehicles, same routes,
    /// same seeds, empty lanes.
    fn reset(&mut self) {
        self.graph.reset();
        for v in &mut self.vehicles {
            v.reset();
        }
    }
}

// ── ScenarioBuilder ───────────────────────────────────────────────────────────

/// Prepares [`Scenario`]s.
///
/// # Optional inputs (have defaults)
///
/// | Method              | Default                              |
/// |---------------------|--------------------------------------|
/// | `.dawdle_factor(p)` | `Driver::DEFAULT_DAWDLE_FACTOR`      |
/// | `.max_velocity(v)`  | `Vehicle::DEFAULT_MAX_VELOCITY`      |
/// | `.entity(e)`        | none                                 |
/// | `.progress(l)`      | none                                 |
/// | `.cancel_token(t)`  | a token nobody cancels               |
pub struct ScenarioBuilder<R: ShortestPathProvider = DijkstraRouter> {
    router:        R,
    dawdle_factor: f32,
    max_velocity:  u32,
    entity:        Option<Arc<dyn VehicleEntity>>,
    progress:      Option<Box<dyn ProgressListener>>,
    cancel:        CancelToken,
}

impl Default for ScenarioBuilder<DijkstraRouter> {
    fn default() -> Self {
        Self::new(DijkstraRouter)
    }
}

impl<R: ShortestPathProvider> ScenarioBuilder<R> {
    pub fn new(router: R) -> Self {
        Self {
            router,
            dawdle_factor: Driver::DEFAULT_DAWDLE_FACTOR,
            max_velocity:  Vehicle::DEFAULT_MAX_VELOCITY,
            entity:        None,
            progress:      None,
            cancel:        CancelToken::new(),
        }
    }

    pub fn dawdle_factor(mut self, p: f32) -> Self {
        self.dawdle_factor = p;
        self
    }

    pub fn max_velocity(mut self, v: u32) -> Self {
        self.max_velocity = v;
        self
    }

    /// Attach the same visualisation entity to every vehicle.
    pub fn entity(mut self, entity: Arc<dyn VehicleEntity>) -> Self {
        self.entity = Some(entity);
        self
    }

    pub fn progress(mut self, listener: impl ProgressListener + 'static) -> Self {
        self.progress = Some(Box::new(listener));
        self
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Prepare with fresh generators seeded from the scenario's config.
    pub fn prepare(&self, scenario: &mut Scenario) -> ScenarioResult<()> {
        let ids = IdGenerator::new();
        let seeds = SeedGenerator::new(scenario.config.seed);
        self.prepare_with(scenario, &ids, &seeds)
    }

    /// Prepare `scenario`, drawing vehicle ids and driver seeds from the
    /// given generators (both are rewound first).
    pub fn prepare_with(
        &self,
        scenario: &mut Scenario,
        ids:      &IdGenerator,
        seeds:    &SeedGenerator,
    ) -> ScenarioResult<()> {
        // ── ① reset ───────────────────────────────────────────────────────
        scenario.unprepare();
        scenario.config.validate()?;
        ids.reset();
        seeds.reset();

        let result = self.build_vehicles(scenario, ids, seeds);
        match result {
            Ok(vehicles) => {
                log::info!(
                    "prepared scenario: {} vehicles from {} requests",
                    vehicles.len(),
                    scenario.requests.len()
                );
                scenario.vehicles = vehicles;
                scenario.prepared = true;
                Ok(())
            }
            Err(e) => {
                if matches!(e, ScenarioError::Cancelled) {
                    log::info!("scenario preparation cancelled");
                }
                scenario.unprepare();
                Err(e)
            }
        }
    }

    fn build_vehicles(
        &self,
        scenario: &Scenario,
        ids:      &IdGenerator,
        seeds:    &SeedGenerator,
    ) -> ScenarioResult<Vec<Vehicle>> {
        let graph = &scenario.graph;
        let requests = &scenario.requests;
        for (index, r) in requests.iter().enumerate() {
            for node in [r.origin, r.destination] {
                if node.index() >= graph.node_count() {
                    return Err(ScenarioError::UnknownNode { index, node });
                }
            }
        }

        // ── ② assign ──────────────────────────────────────────────────────
        let mut assignments: Vec<(VehicleId, u64, usize)> = Vec::new();
        for (index, r) in requests.iter().enumerate() {
            for _ in 0..r.count {
                self.check_cancelled()?;
                assignments.push((ids.next(), seeds.next(), index));
            }
        }
        self.check_cancelled()?;

        // ── ③ route ───────────────────────────────────────────────────────
        let routes = self.compute_routes(graph, requests, scenario.config.multi_threading.n_threads)?;
        self.check_cancelled()?;

        // ── ④ register ────────────────────────────────────────────────────
        let total = assignments.len();
        let mut reported = 0u8;
        let mut vehicles = Vec::with_capacity(total);
        for (done, (id, seed, index)) in assignments.into_iter().enumerate() {
            self.check_cancelled()?;
            debug_assert_eq!(id.index(), vehicles.len());

            let request = &requests[index];
            let driver = Driver::new(seed, routes[index].clone())
                .with_dawdle_factor(self.dawdle_factor)
                .with_spawn_delay(request.spawn_delay);
            let mut vehicle = Vehicle::new(id, driver).with_max_velocity(self.max_velocity);
            if let Some(entity) = &self.entity {
                vehicle = vehicle.with_entity(Arc::clone(entity));
            }
            vehicles.push(vehicle);

            let percent = ((done + 1) * 100 / total) as u8;
            while reported + PROGRESS_STEP <= percent {
                reported += PROGRESS_STEP;
                self.report(reported);
            }
        }
        Ok(vehicles)
    }

    /// One route per request.  Unreachable destinations yield an empty route,
    /// so those vehicles despawn without ever spawning.
    fn compute_routes(&self, graph: &Graph, requests: &[RouteRequest], n_threads: usize) -> ScenarioResult<Vec<Route>> {
        let route_of = |r: &RouteRequest| -> Option<Route> {
            if self.cancel.is_cancelled() {
                return None;
            }
            Some(self.router.route(graph, r.origin, r.destination).unwrap_or_else(|| {
                log::warn!("no route from {} to {}; vehicles will not spawn", r.origin, r.destination);
                Route::empty(r.origin)
            }))
        };

        let routes: Vec<Option<Route>> = if n_threads > 1 {
            let pool = ThreadPoolBuilder::new()
                .num_threads(n_threads)
                .build()
                .map_err(|e| ScenarioError::Config(format!("cannot start worker pool: {e}")))?;
            pool.install(|| requests.par_iter().map(route_of).collect())
        } else {
            requests.iter().map(route_of).collect()
        };

        routes.into_iter().map(|r| r.ok_or(ScenarioError::Cancelled)).collect()
    }

    fn check_cancelled(&self) -> ScenarioResult<()> {
        if self.cancel.is_cancelled() { Err(ScenarioError::Cancelled) } else { Ok(()) }
    }

    fn report(&self, percent: u8) {
        log::info!("scenario preparation {percent}%");
        if let Some(listener) = &self.progress {
            listener.on_progress(percent);
        }
    }
}
