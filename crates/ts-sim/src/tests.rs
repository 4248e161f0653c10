//! Unit tests for ts-sim.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ts_core::{CancelToken, EdgeId, GeoPoint, MultiThreadingConfig, NodeId, SimConfig, Tick, VehicleId};
use ts_graph::{EdgeSpec, Graph, GraphBuilder, LaneRef};
use ts_vehicle::{Vehicle, VehicleEntity, VehicleState};

use crate::{
    MultiThreaded, NoopObserver, ProgressListener, RouteRequest, Scenario, ScenarioBuilder,
    ScenarioError, SimBuilder, SimError, SimObserver, SingleThreaded, TickSummary, VehicleContainer,
};

// ── Helpers ───────────────────────────────────────────────────────────────────

const N: usize = 0;
const E: usize = 1;
const S: usize = 2;
const W: usize = 3;

fn test_config(total_ticks: u64) -> SimConfig {
    SimConfig { seed: 7, total_ticks, ..SimConfig::default() }
}

fn threaded(mut config: SimConfig, n_threads: usize) -> SimConfig {
    config.multi_threading = MultiThreadingConfig { n_threads, vehicles_per_runnable: 3, nodes_per_thread: 2 };
    config
}

/// Four-way crossing: centre plus one dead-end arm per compass direction,
/// every arm a two-way street of 10 cells.
struct Plus {
    graph: Graph,
    arms:  [NodeId; 4],
    /// arm → centre
    into:  [EdgeId; 4],
    /// centre → arm
    out:   [EdgeId; 4],
}

fn plus(config: &SimConfig, ns_priority: i8) -> Plus {
    let mut b = GraphBuilder::new(config);
    let center = b.add_node(GeoPoint::new(48.0, 11.0));
    let positions = [
        GeoPoint::new(48.001, 11.0),
        GeoPoint::new(48.0, 11.0015),
        GeoPoint::new(47.999, 11.0),
        GeoPoint::new(48.0, 10.9985),
    ];
    let arms = positions.map(|p| b.add_node(p));
    let mut into = [EdgeId::INVALID; 4];
    let mut out = [EdgeId::INVALID; 4];
    for (i, &arm) in arms.iter().enumerate() {
        let priority = if i == N || i == S { ns_priority } else { 0 };
        let (o, n) = b.add_road_with_length(center, arm, 75.0, EdgeSpec::new(1, 5, priority));
        out[i] = o;
        into[i] = n;
    }
    b.connect_all_turns();
    Plus { graph: b.build(), arms, into, out }
}

/// `n × n` grid of two-way streets.
fn grid(config: &SimConfig, n: usize) -> Graph {
    let mut b = GraphBuilder::new(config);
    let mut ids = Vec::with_capacity(n * n);
    for r in 0..n {
        for c in 0..n {
            ids.push(b.add_node(GeoPoint::new(48.0 + r as f32 * 0.001, 11.0 + c as f32 * 0.0015)));
        }
    }
    for r in 0..n {
        for c in 0..n {
            let here = ids[r * n + c];
            if c + 1 < n {
                b.add_road(here, ids[r * n + c + 1], EdgeSpec::new(1, 4, 0));
            }
            if r + 1 < n {
                b.add_road(here, ids[(r + 1) * n + c], EdgeSpec::new(1, 4, 0));
            }
        }
    }
    b.connect_all_turns();
    b.build()
}

fn prepared(mut scenario: Scenario, dawdle: f32) -> Scenario {
    ScenarioBuilder::default().dawdle_factor(dawdle).prepare(&mut scenario).unwrap();
    scenario
}

type Row = (VehicleId, VehicleState, Option<LaneRef>, u32, u32);

/// Records every vehicle's position at every snapshot.
#[derive(Default)]
struct Recorder {
    snapshots: Vec<(Tick, Vec<Row>)>,
    summaries: Vec<TickSummary>,
    ended:     Option<Tick>,
}

impl SimObserver for Recorder {
    fn on_tick_end(&mut self, summary: &TickSummary) {
        self.summaries.push(*summary);
    }

    fn on_snapshot(&mut self, tick: Tick, vehicles: &[Vehicle], _graph: &Graph) {
        let rows = vehicles
            .iter()
            .map(|v| (v.id(), v.state(), v.lane(), v.cell(), v.velocity()))
            .collect();
        self.snapshots.push((tick, rows));
    }

    fn on_sim_end(&mut self, final_tick: Tick) {
        self.ended = Some(final_tick);
    }
}

fn record(scenario: Scenario) -> Recorder {
    let mut sim = SimBuilder::new(scenario).build().unwrap();
    let mut rec = Recorder::default();
    sim.run(&mut rec).unwrap();
    rec
}

/// First tick at which `vehicle` is on `edge`.
fn first_tick_on(rec: &Recorder, vehicle: VehicleId, edge: EdgeId) -> Option<Tick> {
    rec.snapshots.iter().find_map(|(tick, rows)| {
        rows.iter()
            .any(|&(id, _, lane, _, _)| id == vehicle && lane.map(|l| l.edge) == Some(edge))
            .then_some(*tick)
    })
}

// ── VehicleContainer ──────────────────────────────────────────────────────────

#[cfg(test)]
mod container {
    use super::*;
    use ts_core::Resettable;
    use ts_graph::Route;
    use ts_vehicle::Driver;

    #[test]
    fn transitions_move_between_sets() {
        let mut c = VehicleContainer::with_vehicles([VehicleId(0), VehicleId(1)]);
        assert!(c.transition(VehicleId(1), VehicleState::NotSpawned, VehicleState::Spawned));
        assert_eq!(c.count(VehicleState::NotSpawned), 1);
        assert_eq!(c.count(VehicleState::Spawned), 1);
        assert!(!c.transition(VehicleId(1), VehicleState::NotSpawned, VehicleState::Spawned));
        assert!(!c.is_finished());
    }

    #[test]
    fn finished_once_everyone_despawned() {
        let mut c = VehicleContainer::with_vehicles([VehicleId(0)]);
        c.transition(VehicleId(0), VehicleState::NotSpawned, VehicleState::Spawned);
        c.transition(VehicleId(0), VehicleState::Spawned, VehicleState::Despawned);
        assert!(c.is_finished());
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn reset_makes_everyone_wait_again() {
        let mut c = VehicleContainer::with_vehicles([VehicleId(0), VehicleId(1), VehicleId(2)]);
        c.transition(VehicleId(0), VehicleState::NotSpawned, VehicleState::Spawned);
        c.transition(VehicleId(2), VehicleState::NotSpawned, VehicleState::Despawned);
        c.reset();
        assert_eq!(c.count(VehicleState::NotSpawned), 3);
        assert_eq!(c.ids(VehicleState::NotSpawned).iter().copied().collect::<Vec<_>>(), vec![
            VehicleId(0),
            VehicleId(1),
            VehicleId(2)
        ]);
    }

    #[test]
    fn summary_ignores_anger_of_despawned_vehicles() {
        let config = test_config(10);
        let p = plus(&config, 0);
        let mut vehicles: Vec<Vehicle> = (0..2)
            .map(|i| Vehicle::new(VehicleId(i), Driver::new(u64::from(i), Route::empty(p.arms[S]))))
            .collect();
        for v in &mut vehicles {
            v.driver_mut().become_more_angry();
        }
        // An empty route despawns on the first spawn attempt, anger intact.
        vehicles[1].spawn(&p.graph, &mut Vec::new()).unwrap();
        assert_eq!(vehicles[1].state(), VehicleState::Despawned);
        assert_eq!(vehicles[1].driver().anger(), 1);

        let mut c = VehicleContainer::with_vehicles([VehicleId(0), VehicleId(1)]);
        c.transition(VehicleId(1), VehicleState::NotSpawned, VehicleState::Despawned);
        let summary = TickSummary::collect(Tick(4), &c, &vehicles);
        assert_eq!(summary.despawned, 1);
        assert_eq!(summary.angry, 1);
    }
}

// ── Scenario preparation ──────────────────────────────────────────────────────

#[cfg(test)]
mod scenario {
    use super::*;

    #[test]
    fn ids_follow_request_order() {
        let config = test_config(10);
        let p = plus(&config, 0);
        let mut scenario = Scenario::new(config, p.graph);
        scenario.add_request(RouteRequest::new(p.arms[S], p.arms[N]).with_count(2));
        scenario.add_request(RouteRequest::new(p.arms[E], p.arms[W]).with_spawn_delay(4));
        let scenario = prepared(scenario, 0.2);

        assert!(scenario.is_prepared());
        let ids: Vec<VehicleId> = scenario.vehicles().iter().map(Vehicle::id).collect();
        assert_eq!(ids, vec![VehicleId(0), VehicleId(1), VehicleId(2)]);
        let v2 = scenario.vehicle(VehicleId(2)).unwrap();
        assert_eq!(v2.driver().spawn_delay(), 4);
        assert_eq!(v2.driver().route().iter().collect::<Vec<_>>(), vec![p.into[E], p.out[W]]);
        let seeds: Vec<u64> = scenario.vehicles().iter().map(|v| v.driver().seed()).collect();
        assert_ne!(seeds[0], seeds[1]);
    }

    #[test]
    fn preparation_is_independent_of_thread_count() {
        let single = test_config(10);
        let multi = threaded(test_config(10), 4);
        let a = prepared(Scenario::random(single.clone(), grid(&single, 3), 20), 0.2);
        let b = prepared(Scenario::random(multi.clone(), grid(&multi, 3), 20), 0.2);

        assert_eq!(a.vehicles().len(), single.max_vehicle_count);
        assert_eq!(a.requests(), b.requests());
        for (x, y) in a.vehicles().iter().zip(b.vehicles()) {
            assert_eq!(x.id(), y.id());
            assert_eq!(x.driver().seed(), y.driver().seed());
            assert_eq!(x.driver().route(), y.driver().route());
        }
    }

    #[test]
    fn preparing_twice_gives_the_same_vehicles() {
        let config = test_config(10);
        let mut scenario = Scenario::random(config.clone(), grid(&config, 3), 20);
        let builder = ScenarioBuilder::default();
        builder.prepare(&mut scenario).unwrap();
        let first: Vec<(VehicleId, u64)> = scenario.vehicles().iter().map(|v| (v.id(), v.driver().seed())).collect();
        builder.prepare(&mut scenario).unwrap();
        let second: Vec<(VehicleId, u64)> = scenario.vehicles().iter().map(|v| (v.id(), v.driver().seed())).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn random_requests_have_distinct_endpoints() {
        let config = test_config(10);
        let scenario = Scenario::random(config.clone(), grid(&config, 3), 10);
        assert_eq!(scenario.requests().len(), config.max_vehicle_count);
        assert!(scenario.requests().iter().all(|r| r.origin != r.destination && r.spawn_delay <= 10));
    }

    #[test]
    fn unknown_node_is_rejected() {
        let config = test_config(10);
        let p = plus(&config, 0);
        let mut scenario = Scenario::new(config, p.graph);
        scenario.add_request(RouteRequest::new(p.arms[S], NodeId(99)));
        let err = ScenarioBuilder::default().prepare(&mut scenario).unwrap_err();
        assert!(matches!(err, ScenarioError::UnknownNode { index: 0, node: NodeId(99) }));
        assert!(!scenario.is_prepared());
    }

    #[test]
    fn unreachable_destination_gets_empty_route() {
        let config = test_config(10);
        let mut b = GraphBuilder::new(&config);
        let a = b.add_node(GeoPoint::new(48.0, 11.0));
        let c = b.add_node(GeoPoint::new(48.0, 11.001));
        b.add_edge(c, a, EdgeSpec::default());
        let mut scenario = Scenario::new(config, b.build());
        scenario.add_request(RouteRequest::new(a, c));
        let scenario = prepared(scenario, 0.2);
        assert!(scenario.vehicles()[0].driver().route().is_empty());
    }

    #[test]
    fn cancellation_leaves_scenario_unprepared() {
        let config = test_config(10);
        let mut scenario = Scenario::random(config.clone(), grid(&config, 3), 10);
        let token = CancelToken::new();
        token.cancel();
        let err = ScenarioBuilder::default().cancel_token(token).prepare(&mut scenario).unwrap_err();
        assert!(matches!(err, ScenarioError::Cancelled));
        assert!(!scenario.is_prepared());
        assert!(scenario.vehicles().is_empty());
    }

    struct Collect(Arc<Mutex<Vec<u8>>>);

    impl ProgressListener for Collect {
        fn on_progress(&self, percent: u8) {
            self.0.lock().unwrap().push(percent);
        }
    }

    #[test]
    fn progress_is_reported_in_five_percent_steps() {
        let config = test_config(10);
        let p = plus(&config, 0);
        let mut scenario = Scenario::new(config, p.graph);
        scenario.add_request(RouteRequest::new(p.arms[S], p.arms[N]).with_count(40));

        let seen = Arc::new(Mutex::new(Vec::new()));
        ScenarioBuilder::default()
            .progress(Collect(Arc::clone(&seen)))
            .prepare(&mut scenario)
            .unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(*seen, (1..=20).map(|i| i * 5).collect::<Vec<u8>>());
    }
}

// ── Building ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod build {
    use super::*;
    use crate::StepExecutor;

    #[test]
    fn unprepared_scenario_is_rejected() {
        let config = test_config(10);
        let p = plus(&config, 0);
        let scenario = Scenario::new(config, p.graph);
        assert!(matches!(SimBuilder::new(scenario).build(), Err(SimError::NotPrepared)));
    }

    #[test]
    fn executor_follows_thread_count() {
        let config = threaded(test_config(10), 3);
        let p = plus(&config, 0);
        let sim = SimBuilder::new(prepared(Scenario::new(config, p.graph), 0.2)).build().unwrap();
        assert_eq!(sim.executor().name(), "multi-threaded");
        assert_eq!(sim.executor().n_threads(), 3);

        let config = test_config(10);
        let p = plus(&config, 0);
        let sim = SimBuilder::new(prepared(Scenario::new(config, p.graph), 0.2))
            .executor(Box::new(SingleThreaded))
            .build()
            .unwrap();
        assert_eq!(sim.executor().n_threads(), 1);
    }

    #[test]
    fn explicit_pool_reports_its_size() {
        let mt = MultiThreaded::new(&MultiThreadingConfig { n_threads: 2, ..Default::default() }).unwrap();
        assert_eq!(mt.n_threads(), 2);
    }
}

// ── Running ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod run {
    use super::*;

    #[test]
    fn single_and_multi_threaded_runs_are_identical() {
        let single = test_config(300);
        let multi = threaded(test_config(300), 4);
        let a = record(prepared(Scenario::random(single.clone(), grid(&single, 3), 30), 0.3));
        let b = record(prepared(Scenario::random(multi.clone(), grid(&multi, 3), 30), 0.3));

        assert!(!a.snapshots.is_empty());
        assert_eq!(a.snapshots, b.snapshots);
        assert_eq!(a.summaries, b.summaries);
    }

    #[test]
    fn reset_replays_the_same_run() {
        let config = test_config(80);
        let scenario = prepared(Scenario::random(config.clone(), grid(&config, 3), 10), 0.3);
        let mut sim = SimBuilder::new(scenario).build().unwrap();
        let mut first = Recorder::default();
        sim.run(&mut first).unwrap();

        sim.reset();
        assert_eq!(sim.tick(), Tick::ZERO);
        assert_eq!(sim.graph().vehicle_count(), 0);
        let mut second = Recorder::default();
        sim.run(&mut second).unwrap();
        assert_eq!(first.snapshots, second.snapshots);
    }

    #[test]
    fn vehicles_never_share_a_cell() {
        let config = threaded(test_config(200), 2);
        let rec = record(prepared(Scenario::random(config.clone(), grid(&config, 3), 10), 0.3));
        for (tick, rows) in &rec.snapshots {
            let mut occupied: Vec<(LaneRef, u32)> = rows
                .iter()
                .filter(|r| r.1 == VehicleState::Spawned)
                .map(|r| (r.2.unwrap(), r.3))
                .collect();
            let n = occupied.len();
            occupied.sort();
            occupied.dedup();
            assert_eq!(occupied.len(), n, "collision at {tick}");
        }
    }

    #[test]
    fn all_vehicles_arrive_and_lanes_empty() {
        let config = test_config(2_000);
        let p = plus(&config, 0);
        let mut scenario = Scenario::new(config, p.graph);
        for (from, to) in [(S, N), (N, S), (E, W), (W, E), (S, W), (E, N)] {
            scenario.add_request(RouteRequest::new(p.arms[from], p.arms[to]).with_count(6));
        }
        let mut sim = SimBuilder::new(prepared(scenario, 0.2)).build().unwrap();
        sim.run(&mut NoopObserver).unwrap();

        assert!(sim.is_finished(), "stuck at {}", sim.tick());
        assert!(sim.tick() < Tick(2_000));
        assert_eq!(sim.graph().vehicle_count(), 0);
        assert!(sim.vehicles().iter().all(|v| v.driver().route().is_empty()));
        assert!(sim.graph().nodes().iter().all(|n| n.registered().next().is_none()));
        // Every waiting vehicle was served eventually, so counters are back
        // at zero or were reset on the last grant.
        assert!(sim.vehicles().iter().all(|v| v.driver().priority_counter().get() < 1_000));
    }

    #[test]
    fn vehicle_from_the_right_crosses_first() {
        let config = test_config(40);
        let p = plus(&config, 0);
        let mut scenario = Scenario::new(config, p.graph);
        // 0 drives north, 1 comes from the east (its right) heading west.
        scenario.add_request(RouteRequest::new(p.arms[S], p.arms[N]));
        scenario.add_request(RouteRequest::new(p.arms[E], p.arms[W]));
        let rec = record(prepared(scenario, 0.0));

        let north = first_tick_on(&rec, VehicleId(0), p.out[N]).unwrap();
        let west = first_tick_on(&rec, VehicleId(1), p.out[W]).unwrap();
        assert!(west < north, "west-bound crossed at {west}, north-bound at {north}");
    }

    #[test]
    fn priority_road_overrides_the_right() {
        let config = test_config(40);
        let p = plus(&config, 1);
        let mut scenario = Scenario::new(config, p.graph);
        scenario.add_request(RouteRequest::new(p.arms[S], p.arms[N]));
        scenario.add_request(RouteRequest::new(p.arms[E], p.arms[W]));
        let rec = record(prepared(scenario, 0.0));

        let north = first_tick_on(&rec, VehicleId(0), p.out[N]).unwrap();
        let west = first_tick_on(&rec, VehicleId(1), p.out[W]).unwrap();
        assert!(north < west, "north-bound crossed at {north}, west-bound at {west}");
    }

    #[test]
    fn empty_route_despawns_on_first_tick() {
        let config = test_config(10);
        let p = plus(&config, 0);
        let mut scenario = Scenario::new(config, p.graph);
        scenario.add_request(RouteRequest::new(p.arms[S], p.arms[S]));
        let mut sim = SimBuilder::new(prepared(scenario, 0.2)).build().unwrap();
        sim.run(&mut NoopObserver).unwrap();
        assert_eq!(sim.tick(), Tick(1));
        assert_eq!(sim.vehicles()[0].state(), VehicleState::Despawned);
    }

    #[test]
    fn snapshots_follow_output_interval() {
        let mut config = test_config(20);
        config.output_interval_ticks = 5;
        let p = plus(&config, 0);
        let mut scenario = Scenario::new(config, p.graph);
        scenario.add_request(RouteRequest::new(p.arms[S], p.arms[N]).with_spawn_delay(50));
        let rec = record(prepared(scenario, 0.2));
        let ticks: Vec<Tick> = rec.snapshots.iter().map(|(t, _)| *t).collect();
        assert_eq!(ticks, vec![Tick(0), Tick(5), Tick(10), Tick(15)]);
        assert_eq!(rec.summaries.len(), 20);
        assert_eq!(rec.ended, Some(Tick(20)));
    }

    #[test]
    fn cancelled_step_leaves_tick_unchanged() {
        let config = test_config(50);
        let p = plus(&config, 0);
        let mut scenario = Scenario::new(config, p.graph);
        scenario.add_request(RouteRequest::new(p.arms[S], p.arms[N]));
        let token = CancelToken::new();
        let mut sim = SimBuilder::new(prepared(scenario, 0.2)).cancel_token(token.clone()).build().unwrap();

        sim.run_ticks(3, &mut NoopObserver).unwrap();
        token.cancel();
        let err = sim.step(&mut NoopObserver).unwrap_err();
        assert!(matches!(err, SimError::Cancelled(Tick(3))));
        assert_eq!(sim.tick(), Tick(3));

        sim.reset();
        assert!(!token.is_cancelled());
        sim.run(&mut NoopObserver).unwrap();
        assert!(sim.is_finished());
    }

    /// Cancels `token` on the `nth` position update it receives.
    struct CancelOnUpdate {
        token: CancelToken,
        nth:   usize,
        seen:  AtomicUsize,
    }

    impl VehicleEntity for CancelOnUpdate {
        fn update_position(&self, _vehicle: VehicleId, _lane: Option<LaneRef>, _cell: u32) {
            if self.seen.fetch_add(1, Ordering::SeqCst) + 1 == self.nth {
                self.token.cancel();
            }
        }
    }

    #[test]
    fn resuming_after_cancel_matches_an_uninterrupted_run() {
        let config = test_config(60);
        let p = plus(&config, 0);
        let mut scenario = Scenario::new(config.clone(), p.graph);
        scenario.add_request(RouteRequest::new(p.arms[S], p.arms[N]));
        let expected = record(prepared(scenario, 0.3));

        // Update 1 is entering the graph at tick 1, update 2 the first
        // advance in the move phase of the same tick.
        let token = CancelToken::new();
        let entity = Arc::new(CancelOnUpdate { token: token.clone(), nth: 2, seen: AtomicUsize::new(0) });
        let p = plus(&config, 0);
        let mut scenario = Scenario::new(config, p.graph);
        scenario.add_request(RouteRequest::new(p.arms[S], p.arms[N]));
        ScenarioBuilder::default().dawdle_factor(0.3).entity(entity).prepare(&mut scenario).unwrap();
        let mut sim = SimBuilder::new(scenario).cancel_token(token.clone()).build().unwrap();

        let mut resumed = Recorder::default();
        let err = sim.run(&mut resumed).unwrap_err();
        assert!(matches!(err, SimError::Cancelled(Tick(1))));
        assert_eq!(sim.tick(), Tick(1));
        assert_eq!(sim.pending_phase(), Some("did_move"));

        token.clear();
        sim.run(&mut resumed).unwrap();
        assert_eq!(sim.pending_phase(), None);
        assert_eq!(resumed.snapshots, expected.snapshots);
        assert_eq!(resumed.summaries, expected.summaries);
    }

    #[test]
    fn summaries_count_every_vehicle() {
        let config = test_config(30);
        let p = plus(&config, 0);
        let mut scenario = Scenario::new(config, p.graph);
        scenario.add_request(RouteRequest::new(p.arms[W], p.arms[E]).with_count(3));
        let rec = record(prepared(scenario, 0.2));
        for s in &rec.summaries {
            assert_eq!(s.not_spawned + s.spawned + s.despawned, 3);
        }
    }
}
