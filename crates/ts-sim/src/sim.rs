//! The `Sim` struct and its tick loop.

use std::cmp::Reverse;
use std::time::{Duration, Instant};

use ts_core::{CancelToken, Resettable, Tick, VehicleId};
use ts_graph::Graph;
use ts_vehicle::{Vehicle, VehicleError, VehicleEvent, VehicleState};

use crate::executor::{NodeFault, VehicleFault, VehicleTask};
use crate::{Scenario, SimError, SimObserver, SimResult, StepExecutor, TickSummary, VehicleContainer};

// ── Sim ───────────────────────────────────────────────────────────────────────

/// The stepper.
///
/// One tick runs five phases; the whole population finishes a phase before
/// the next one starts:
///
/// 1. **spawn**: waiting vehicles ask for permission and enter the graph.
/// 2. **will move**: spawned vehicles accelerate, brake and dawdle.
/// 3. **move**: spawned vehicles advance, cross nodes or leave the graph.
/// 4. **did move**: bookkeeping and node (un)registration.
/// 5. **update nodes**: every node recomputes its permission set.
///
/// Vehicle phases never touch shared state.  The events they emit are
/// applied here, between phases, in ascending vehicle id order (see
/// [`Sim::apply_events`]), which makes the result independent of the
/// [`StepExecutor`].
///
/// Create via [`SimBuilder`][crate::SimBuilder].
pub struct Sim {
    pub(crate) scenario:  Scenario,
    pub(crate) container: VehicleContainer,
    pub(crate) executor:  Box<dyn StepExecutor>,
    pub(crate) cancel:    CancelToken,
    pub(crate) tick:      Tick,
    /// First phase of `tick` that has not completed yet.
    pub(crate) phase:     usize,
}

/// Phase names, in execution order.
const PHASES: [&str; 5] = ["spawn", "will_move", "move", "did_move", "nodes"];

impl Sim {
    // ── Accessors ─────────────────────────────────────────────────────────

    /// The next tick to be simulated.
    #[inline]
    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn graph(&self) -> &Graph {
        self.scenario.graph()
    }

    pub fn vehicles(&self) -> &[Vehicle] {
        self.scenario.vehicles()
    }

    pub fn container(&self) -> &VehicleContainer {
        &self.container
    }

    pub fn executor(&self) -> &dyn StepExecutor {
        self.executor.as_ref()
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Every vehicle has despawned.
    pub fn is_finished(&self) -> bool {
        self.container.is_finished()
    }

    /// Give the scenario back, e.g. to prepare it again.
    pub fn into_scenario(self) -> Scenario {
        self.scenario
    }

    // ── Public API ────────────────────────────────────────────────────────

    /// Run from the current tick to `config.total_ticks`, or until every
    /// vehicle has despawned.
    pub fn run<O: SimObserver>(&mut self, observer: &mut O) -> SimResult<()> {
        let end = Tick(self.scenario.config().total_ticks);
        let started = Instant::now();
        while self.tick < end && !self.is_finished() {
            self.step(observer)?;
        }
        log::info!(
            "{} run finished at {} in {:?}: {} despawned, {} still driving",
            self.executor.name(),
            self.tick,
            started.elapsed(),
            self.container.count(VehicleState::Despawned),
            self.container.count(VehicleState::Spawned),
        );
        observer.on_sim_end(self.tick);
        Ok(())
    }

    /// Run exactly `n` ticks from the current position (ignores
    /// `total_ticks`).
    pub fn run_ticks<O: SimObserver>(&mut self, n: u64, observer: &mut O) -> SimResult<()> {
        for _ in 0..n {
            self.step(observer)?;
        }
        Ok(())
    }

    /// Simulate one tick.
    ///
    /// On cancellation the tick stops at the last completed phase and
    /// [`SimError::Cancelled`] is returned.  The tick counter is not advanced;
    /// the next call resumes the same tick at the first phase that has not
    /// run, so an interrupted run ends up exactly where an uninterrupted one
    /// would.
    pub fn step<O: SimObserver>(&mut self, observer: &mut O) -> SimResult<()> {
        let now = self.tick;
        if self.phase == 0 {
            observer.on_tick_start(now);
        }
        self.process_tick(now)?;

        let summary = TickSummary::collect(now, &self.container, self.scenario.vehicles());
        observer.on_tick_end(&summary);
        let interval = self.scenario.config().output_interval_ticks;
        if interval > 0 && now.0.is_multiple_of(interval) {
            observer.on_snapshot(now, self.scenario.vehicles(), self.scenario.graph());
        }

        self.tick = now.next();
        self.phase = 0;
        Ok(())
    }

    /// Tick in progress after a cancelled [`step`](Self::step): the name of
    /// the next phase to run, or `None` at a tick boundary.
    pub fn pending_phase(&self) -> Option<&'static str> {
        (self.phase > 0).then(|| PHASES[self.phase])
    }

    /// Back to tick zero with the same vehicles, routes and seeds.  Also
    /// clears the cancel flag.
    pub fn reset(&mut self) {
        self.scenario.reset();
        self.container.reset();
        self.cancel.clear();
        self.tick = Tick::ZERO;
        self.phase = 0;
    }

    // ── Core tick processing ──────────────────────────────────────────────

    /// Run the phases of `now` from `self.phase` on.  The cursor moves past
    /// a phase only after its events have been applied.
    fn process_tick(&mut self, now: Tick) -> SimResult<()> {
        let mut timings = [Duration::ZERO; PHASES.len()];

        while self.phase < PHASES.len() {
            self.check_cancelled(now)?;
            let t = Instant::now();
            match self.phase {
                0 => {
                    let events =
                        self.run_vehicle_phase(now, VehicleState::NotSpawned, &|v, g, ev| v.spawn(g, ev))?;
                    self.apply_events(now, &events)?;
                }
                1 => {
                    let events = self.run_vehicle_phase(now, VehicleState::Spawned, &|v, g, _| v.will_move(g))?;
                    self.apply_events(now, &events)?;
                }
                2 => {
                    let events =
                        self.run_vehicle_phase(now, VehicleState::Spawned, &|v, g, ev| v.move_step(g, ev))?;
                    self.apply_events(now, &events)?;
                }
                3 => {
                    let events =
                        self.run_vehicle_phase(now, VehicleState::Spawned, &|v, g, ev| v.did_move(g, ev))?;
                    self.apply_events(now, &events)?;
                }
                _ => self.update_nodes(now)?,
            }
            timings[self.phase] = t.elapsed();
            self.phase += 1;
        }

        log::debug!(
            "{now}: spawn {:?}, will_move {:?}, move {:?}, did_move {:?}, nodes {:?}",
            timings[0], timings[1], timings[2], timings[3], timings[4],
        );
        Ok(())
    }

    fn check_cancelled(&self, now: Tick) -> SimResult<()> {
        if self.cancel.is_cancelled() {
            log::info!("simulation cancelled at {now} before {}", PHASES[self.phase]);
            return Err(SimError::Cancelled(now));
        }
        Ok(())
    }

    /// Run `task` on every vehicle currently in `state`.
    fn run_vehicle_phase(
        &mut self,
        now:   Tick,
        state: VehicleState,
        task:  &(dyn Fn(&mut Vehicle, &Graph, &mut Vec<VehicleEvent>) -> ts_vehicle::VehicleResult<()> + Sync),
    ) -> SimResult<Vec<VehicleEvent>> {
        let members = self.container.ids(state);
        if members.is_empty() {
            return Ok(Vec::new());
        }
        let (graph, vehicles) = self.scenario.split_mut();
        let graph: &Graph = graph;
        let mut refs: Vec<&mut Vehicle> =
            vehicles.iter_mut().filter(|v| members.contains(&v.id())).collect();

        let bound: &VehicleTask<'_> = &|v, ev| task(v, graph, ev);
        self.executor
            .run_vehicles(&mut refs, bound)
            .map_err(|VehicleFault { vehicle, error }| fatal(now, Some(vehicle), error))
    }

    fn update_nodes(&mut self, now: Tick) -> SimResult<()> {
        let (graph, vehicles) = self.scenario.split_mut();
        let vehicles: &[Vehicle] = vehicles;
        let (nodes, edges) = graph.nodes_mut_with_edges();
        self.executor
            .run_nodes(nodes, &|node| node.update(edges, vehicles))
            .map_err(|NodeFault { node, error }| SimError::Fatal {
                tick:    now,
                vehicle: None,
                node:    Some(node),
                source:  VehicleError::Graph(error),
            })
    }

    /// Apply one phase's events to the graph and the container.
    ///
    /// Order: lane removals, in-lane advances (front to back within each
    /// lane), lane insertions, node registrations and withdrawals (in
    /// emission order), state changes.  Within each group events are taken in
    /// ascending vehicle id order.
    fn apply_events(&mut self, now: Tick, events: &[VehicleEvent]) -> SimResult<()> {
        if events.is_empty() {
            return Ok(());
        }
        let mut events = events.to_vec();
        // Executors already emit in id order; the stable sort only guards it.
        events.sort_by_key(VehicleEvent::vehicle);

        let (graph, _) = self.scenario.split_mut();

        for e in &events {
            if let VehicleEvent::LaneRemove { vehicle, lane } = *e {
                graph
                    .lane_mut(lane)
                    .and_then(|l| l.remove_vehicle(vehicle))
                    .map_err(|err| fatal(now, Some(vehicle), err.into()))?;
            }
        }

        let mut advances = Vec::new();
        for e in &events {
            if let VehicleEvent::LaneAdvance { vehicle, lane, delta } = *e {
                let cell = graph
                    .lane(lane)
                    .and_then(|l| {
                        l.cell_of(vehicle)
                            .ok_or(ts_graph::GraphError::VehicleNotOnLane { lane, vehicle })
                    })
                    .map_err(|err| fatal(now, Some(vehicle), err.into()))?;
                advances.push((lane, Reverse(cell), vehicle, delta));
            }
        }
        advances.sort();
        for (lane, _, vehicle, delta) in advances {
            graph
                .lane_mut(lane)
                .and_then(|l| l.move_vehicle(vehicle, delta))
                .map_err(|err| fatal(now, Some(vehicle), err.into()))?;
        }

        for e in &events {
            if let VehicleEvent::LaneInsert { vehicle, lane, cell } = *e {
                graph
                    .lane_mut(lane)
                    .and_then(|l| l.insert_vehicle(vehicle, cell))
                    .map_err(|err| {
                        log::error!("{now}: {err}");
                        fatal(now, Some(vehicle), err.into())
                    })?;
            }
        }

        for e in &events {
            match *e {
                VehicleEvent::Register { vehicle, node } => {
                    graph
                        .try_node(node)
                        .map_err(|err| fatal(now, Some(vehicle), err.into()))?;
                    graph.node_mut(node).register(vehicle);
                }
                VehicleEvent::Unregister { vehicle, node } => {
                    graph
                        .try_node(node)
                        .map_err(|err| fatal(now, Some(vehicle), err.into()))?;
                    graph.node_mut(node).unregister(vehicle);
                }
                _ => {}
            }
        }

        for e in &events {
            if let VehicleEvent::StateChanged { vehicle, from, to } = *e {
                if !self.container.transition(vehicle, from, to) {
                    log::warn!("{now}: {vehicle} changed {from} -> {to} but was not {from}");
                }
            }
        }
        Ok(())
    }
}

fn fatal(tick: Tick, vehicle: Option<VehicleId>, source: VehicleError) -> SimError {
    SimError::Fatal { tick, vehicle, node: None, source }
}
