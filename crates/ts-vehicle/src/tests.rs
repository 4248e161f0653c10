//! Unit tests for ts-vehicle.

use std::cmp::Reverse;

use ts_core::{EdgeId, GeoPoint, NodeId, Resettable, SimConfig, VehicleId};
use ts_graph::{EdgeSpec, Graph, GraphBuilder, LaneRef, Route};

use crate::{Driver, Vehicle, VehicleEvent, VehicleState};

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Straight one-way street a → b → c, two edges of 10 cells each.
struct Line {
    graph: Graph,
    a:     NodeId,
    b:     NodeId,
    c:     NodeId,
    ab:    EdgeId,
    bc:    EdgeId,
}

fn line() -> Line {
    let mut builder = GraphBuilder::new(&SimConfig::default());
    let a = builder.add_node(GeoPoint::new(48.0, 11.0));
    let b = builder.add_node(GeoPoint::new(48.0, 11.001));
    let c = builder.add_node(GeoPoint::new(48.0, 11.002));
    let ab = builder.add_edge_with_length(a, b, 75.0, EdgeSpec::new(1, 5, 0));
    let bc = builder.add_edge_with_length(b, c, 75.0, EdgeSpec::new(1, 5, 0));
    builder.connect_all_turns();
    Line { graph: builder.build(), a, b, c, ab, bc }
}

fn vehicle(id: u32, l: &Line, dawdle: f32) -> Vehicle {
    let route = Route::new(l.a, l.c, [l.ab, l.bc]);
    Vehicle::new(VehicleId(id), Driver::new(u64::from(id) + 1, route).with_dawdle_factor(dawdle))
}

/// Apply events the way the stepper does: removals, advances front to back,
/// insertions, then node requests.
fn apply(graph: &mut Graph, events: &[VehicleEvent]) {
    let mut advances = Vec::new();
    for e in events {
        if let VehicleEvent::LaneRemove { vehicle, lane } = *e {
            graph.lane_mut(lane).unwrap().remove_vehicle(vehicle).unwrap();
        }
        if let VehicleEvent::LaneAdvance { vehicle, lane, delta } = *e {
            let cell = graph.lane(lane).unwrap().cell_of(vehicle).unwrap();
            advances.push((lane, Reverse(cell), vehicle, delta));
        }
    }
    advances.sort();
    for (lane, _, vehicle, delta) in advances {
        graph.lane_mut(lane).unwrap().move_vehicle(vehicle, delta).unwrap();
    }
    for e in events {
        match *e {
            VehicleEvent::LaneInsert { vehicle, lane, cell } => {
                graph.lane_mut(lane).unwrap().insert_vehicle(vehicle, cell).unwrap();
            }
            VehicleEvent::Register { vehicle, node } => {
                graph.node_mut(node).register(vehicle);
            }
            VehicleEvent::Unregister { vehicle, node } => {
                graph.node_mut(node).unregister(vehicle);
            }
            _ => {}
        }
    }
}

fn update_node(graph: &mut Graph, node: NodeId, vehicles: &[Vehicle]) {
    let (nodes, edges) = graph.nodes_mut_with_edges();
    nodes[node.index()].update(edges, vehicles).unwrap();
}

/// One full tick for a small population (index == vehicle id).
fn tick(graph: &mut Graph, vehicles: &mut [Vehicle]) {
    let mut events = Vec::new();
    for v in vehicles.iter_mut() {
        v.spawn(graph, &mut events).unwrap();
    }
    apply(graph, &events);
    for v in vehicles.iter_mut() {
        v.will_move(graph).unwrap();
    }
    events.clear();
    for v in vehicles.iter_mut() {
        v.move_step(graph, &mut events).unwrap();
    }
    apply(graph, &events);
    events.clear();
    for v in vehicles.iter_mut() {
        v.did_move(graph, &mut events).unwrap();
    }
    apply(graph, &events);
    for i in 0..graph.node_count() {
        update_node(graph, NodeId(i as u32), vehicles);
    }
}

/// Register at the origin, get permission, spawn.
fn spawn_first(l: &mut Line, vehicles: &mut [Vehicle]) {
    let mut events = Vec::new();
    vehicles[0].spawn(&l.graph, &mut events).unwrap();
    apply(&mut l.graph, &events);
    update_node(&mut l.graph, l.a, vehicles);
    events.clear();
    vehicles[0].spawn(&l.graph, &mut events).unwrap();
    apply(&mut l.graph, &events);
}

// ── Driver ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod driver {
    use super::*;

    #[test]
    fn dawdle_factor_is_clamped() {
        let d = Driver::new(1, Route::empty(NodeId(0))).with_dawdle_factor(1.7);
        assert_eq!(d.dawdle_factor(), 1.0);
        let d = Driver::new(1, Route::empty(NodeId(0))).with_dawdle_factor(-0.5);
        assert_eq!(d.dawdle_factor(), 0.0);
    }

    #[test]
    fn dawdle_never_speeds_up() {
        let mut d = Driver::new(7, Route::empty(NodeId(0))).with_dawdle_factor(0.5);
        for v in 0..50u32 {
            let after = d.dawdle(v % 6);
            assert!(after <= v % 6);
            assert!(v % 6 - after <= 1);
        }
    }

    #[test]
    fn same_seed_dawdles_identically() {
        let mut a = Driver::new(42, Route::empty(NodeId(0))).with_dawdle_factor(0.3);
        let mut b = Driver::new(42, Route::empty(NodeId(0))).with_dawdle_factor(0.3);
        let xs: Vec<u32> = (0..100).map(|_| a.dawdle(4)).collect();
        let ys: Vec<u32> = (0..100).map(|_| b.dawdle(4)).collect();
        assert_eq!(xs, ys);
        assert!(xs.contains(&3) && xs.contains(&4));
    }

    #[test]
    fn spawn_delay_counts_up_to_zero() {
        let mut d = Driver::new(1, Route::empty(NodeId(0))).with_spawn_delay(2);
        assert_eq!(d.travelling_time(), -2);
        assert!(!d.may_spawn());
        d.inc_travelling_time();
        d.inc_travelling_time();
        assert!(d.may_spawn());
    }

    #[test]
    fn anger_is_capped_but_total_is_not() {
        let mut d = Driver::new(1, Route::empty(NodeId(0))).with_max_anger(2);
        for _ in 0..5 {
            d.become_more_angry();
        }
        assert_eq!(d.anger(), 2);
        assert_eq!(d.total_anger(), 5);
        d.calm_down();
        assert_eq!(d.anger(), 1);
    }

    #[test]
    fn reset_replays_route_and_rng() {
        let route = Route::new(NodeId(0), NodeId(2), [EdgeId(0), EdgeId(1)]);
        let mut d = Driver::new(9, route.clone()).with_dawdle_factor(0.5).with_spawn_delay(3);
        let first: Vec<u32> = (0..20).map(|_| d.dawdle(3)).collect();
        d.route_mut().pop();
        d.priority_counter().increment().unwrap();
        d.become_more_angry();

        d.reset();
        assert_eq!(d.route(), &route);
        assert_eq!(d.priority_counter().get(), 0);
        assert_eq!(d.travelling_time(), -3);
        assert_eq!(d.anger(), 0);
        let again: Vec<u32> = (0..20).map(|_| d.dawdle(3)).collect();
        assert_eq!(first, again);
    }
}

// ── Spawn ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod spawn {
    use super::*;

    #[test]
    fn empty_route_despawns_without_spawning() {
        let l = line();
        let mut v = Vehicle::new(VehicleId(0), Driver::new(1, Route::empty(l.a)));
        let mut events = Vec::new();
        v.spawn(&l.graph, &mut events).unwrap();
        assert_eq!(v.state(), VehicleState::Despawned);
        assert_eq!(events, vec![VehicleEvent::StateChanged {
            vehicle: VehicleId(0),
            from:    VehicleState::NotSpawned,
            to:      VehicleState::Despawned,
        }]);
    }

    #[test]
    fn waits_for_permission_then_enters_at_cell_zero() {
        let mut l = line();
        let mut vehicles = vec![vehicle(0, &l, 0.0)];

        let mut events = Vec::new();
        vehicles[0].spawn(&l.graph, &mut events).unwrap();
        assert_eq!(vehicles[0].state(), VehicleState::NotSpawned);
        assert_eq!(vehicles[0].registered_at(), Some(l.a));
        apply(&mut l.graph, &events);
        assert!(l.graph.node(l.a).is_registered(VehicleId(0)));

        update_node(&mut l.graph, l.a, &vehicles);
        assert!(l.graph.node(l.a).permission_to_cross(VehicleId(0)));

        events.clear();
        vehicles[0].spawn(&l.graph, &mut events).unwrap();
        apply(&mut l.graph, &events);
        let v = &vehicles[0];
        assert_eq!(v.state(), VehicleState::Spawned);
        assert_eq!(v.lane(), Some(LaneRef::outermost(l.ab)));
        assert_eq!(v.cell(), 0);
        assert_eq!(v.velocity(), 1);
        assert_eq!(v.registered_at(), None);
        assert_eq!(v.driver().route().peek(), Some(l.bc));
        assert_eq!(l.graph.lane(LaneRef::outermost(l.ab)).unwrap().vehicle_at(0), Some(VehicleId(0)));
        assert!(!l.graph.node(l.a).is_registered(VehicleId(0)));
    }

    #[test]
    fn occupied_first_cell_blocks_spawning() {
        let mut l = line();
        let mut vehicles = vec![vehicle(0, &l, 0.0)];
        let mut events = Vec::new();
        vehicles[0].spawn(&l.graph, &mut events).unwrap();
        apply(&mut l.graph, &events);
        update_node(&mut l.graph, l.a, &vehicles);

        l.graph.lane_mut(LaneRef::outermost(l.ab)).unwrap().insert_vehicle(VehicleId(9), 0).unwrap();
        events.clear();
        vehicles[0].spawn(&l.graph, &mut events).unwrap();
        assert_eq!(vehicles[0].state(), VehicleState::NotSpawned);
        assert_eq!(vehicles[0].velocity(), 0);
    }

    #[test]
    fn spawn_delay_postpones_registration() {
        let l = line();
        let route = Route::new(l.a, l.c, [l.ab, l.bc]);
        let mut v = Vehicle::new(VehicleId(0), Driver::new(1, route).with_spawn_delay(2));
        let mut events = Vec::new();
        v.spawn(&l.graph, &mut events).unwrap();
        v.spawn(&l.graph, &mut events).unwrap();
        assert!(events.is_empty());
        assert_eq!(v.driver().travelling_time(), 0);
        v.spawn(&l.graph, &mut events).unwrap();
        assert_eq!(events, vec![VehicleEvent::Register { vehicle: VehicleId(0), node: l.a }]);
    }
}

// ── Will move ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod will_move {
    use super::*;

    #[test]
    fn accelerates_by_one_per_tick() {
        let mut l = line();
        let mut vehicles = vec![vehicle(0, &l, 0.0)];
        spawn_first(&mut l, &mut vehicles);
        vehicles[0].will_move(&l.graph).unwrap();
        assert_eq!(vehicles[0].velocity(), 2);
    }

    #[test]
    fn vehicle_max_velocity_caps_acceleration() {
        let mut l = line();
        let mut vehicles = vec![vehicle(0, &l, 0.0).with_max_velocity(1)];
        spawn_first(&mut l, &mut vehicles);
        vehicles[0].will_move(&l.graph).unwrap();
        assert_eq!(vehicles[0].velocity(), 1);
    }

    #[test]
    fn keeps_one_free_cell_to_the_vehicle_in_front() {
        let mut l = line();
        let mut vehicles = vec![vehicle(0, &l, 0.0)];
        spawn_first(&mut l, &mut vehicles);
        let lane = LaneRef::outermost(l.ab);
        l.graph.lane_mut(lane).unwrap().insert_vehicle(VehicleId(9), 2).unwrap();
        vehicles[0].will_move(&l.graph).unwrap();
        assert_eq!(vehicles[0].velocity(), 1);

        l.graph.lane_mut(lane).unwrap().remove_vehicle(VehicleId(9)).unwrap();
        l.graph.lane_mut(lane).unwrap().insert_vehicle(VehicleId(9), 1).unwrap();
        vehicles[0].will_move(&l.graph).unwrap();
        assert_eq!(vehicles[0].velocity(), 0);
    }

    #[test]
    fn full_dawdle_factor_always_slows_down() {
        let mut l = line();
        let mut vehicles = vec![vehicle(0, &l, 1.0)];
        spawn_first(&mut l, &mut vehicles);
        vehicles[0].will_move(&l.graph).unwrap();
        assert_eq!(vehicles[0].velocity(), 1);
    }

    #[test]
    fn not_spawned_vehicle_is_skipped() {
        let l = line();
        let mut v = vehicle(0, &l, 0.0);
        v.will_move(&l.graph).unwrap();
        assert_eq!(v.velocity(), 0);
    }
}

// ── Crossing a node ───────────────────────────────────────────────────────────

#[cfg(test)]
mod crossing {
    use super::*;

    /// Drive vehicle 0 to the end of `ab` without ever updating node `b`.
    fn stuck_at_b(l: &mut Line) -> Vec<Vehicle> {
        let mut vehicles = vec![vehicle(0, l, 0.0)];
        spawn_first(l, &mut vehicles);
        let mut events = Vec::new();
        for _ in 0..6 {
            vehicles[0].will_move(&l.graph).unwrap();
            events.clear();
            vehicles[0].move_step(&l.graph, &mut events).unwrap();
            apply(&mut l.graph, &events);
            events.clear();
            vehicles[0].did_move(&l.graph, &mut events).unwrap();
            apply(&mut l.graph, &events);
        }
        vehicles
    }

    #[test]
    fn stops_on_last_cell_without_permission() {
        let mut l = line();
        let vehicles = stuck_at_b(&mut l);
        let v = &vehicles[0];
        assert_eq!(v.lane(), Some(LaneRef::outermost(l.ab)));
        assert_eq!(v.cell(), 9);
        assert_eq!(v.velocity(), 0);
        assert_eq!(v.registered_at(), Some(l.b));
        assert!(l.graph.node(l.b).is_registered(VehicleId(0)));
        // Standing for consecutive ticks makes the driver angry.
        assert!(v.driver().anger() > 0);
    }

    #[test]
    fn crosses_once_permission_is_granted() {
        let mut l = line();
        let mut vehicles = stuck_at_b(&mut l);
        update_node(&mut l.graph, l.b, &vehicles);

        vehicles[0].will_move(&l.graph).unwrap();
        assert_eq!(vehicles[0].velocity(), 1);
        let mut events = Vec::new();
        vehicles[0].move_step(&l.graph, &mut events).unwrap();
        apply(&mut l.graph, &events);

        let v = &vehicles[0];
        assert_eq!(v.lane(), Some(LaneRef::outermost(l.bc)));
        assert_eq!(v.cell(), 0);
        assert!(v.driver().route().is_empty());
        assert!(!l.graph.node(l.b).is_registered(VehicleId(0)));
        assert!(l.graph.lane(LaneRef::outermost(l.ab)).unwrap().is_empty());
    }

    #[test]
    fn full_next_lane_keeps_vehicle_waiting() {
        let mut l = line();
        let mut vehicles = stuck_at_b(&mut l);
        l.graph.lane_mut(LaneRef::outermost(l.bc)).unwrap().insert_vehicle(VehicleId(9), 0).unwrap();
        update_node(&mut l.graph, l.b, &vehicles);
        assert!(!l.graph.node(l.b).permission_to_cross(VehicleId(0)));

        vehicles[0].will_move(&l.graph).unwrap();
        assert_eq!(vehicles[0].velocity(), 0);
        assert_eq!(vehicles[0].driver().priority_counter().get(), 1);
    }

    #[test]
    fn granted_vehicle_stops_behind_next_lane_tail() {
        let mut l = line();
        let mut vehicles = stuck_at_b(&mut l);
        l.graph.lane_mut(LaneRef::outermost(l.bc)).unwrap().insert_vehicle(VehicleId(9), 1).unwrap();
        update_node(&mut l.graph, l.b, &vehicles);
        assert!(l.graph.node(l.b).permission_to_cross(VehicleId(0)));

        // distance 1 + insertion index 0
        vehicles[0].will_move(&l.graph).unwrap();
        assert_eq!(vehicles[0].velocity(), 1);
    }
}

// ── Whole trips ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod trip {
    use super::*;
    use ts_graph::CrossingParticipant;

    #[test]
    fn route_exhaustion_despawns_and_clears_lanes() {
        let mut l = line();
        let mut vehicles = vec![vehicle(0, &l, 0.0)];
        for _ in 0..10 {
            tick(&mut l.graph, &mut vehicles);
        }
        let v = &vehicles[0];
        assert_eq!(v.state(), VehicleState::Despawned);
        assert_eq!(v.lane(), None);
        assert!(v.driver().route().is_empty());
        assert_eq!(l.graph.vehicle_count(), 0);
        assert!(l.graph.nodes().iter().all(|n| n.registered().next().is_none()));
    }

    #[test]
    fn free_trip_takes_seven_ticks() {
        let mut l = line();
        let mut vehicles = vec![vehicle(0, &l, 0.0)];
        let mut ticks = 0;
        while vehicles[0].state() != VehicleState::Despawned {
            tick(&mut l.graph, &mut vehicles);
            ticks += 1;
            assert!(ticks < 20);
        }
        assert_eq!(ticks, 7);
    }

    #[test]
    fn followers_never_share_a_cell() {
        let mut l = line();
        let mut vehicles: Vec<Vehicle> = (0..4).map(|i| vehicle(i, &l, 0.3)).collect();
        for _ in 0..60 {
            tick(&mut l.graph, &mut vehicles);
            for lane in [LaneRef::outermost(l.ab), LaneRef::outermost(l.bc)] {
                let cells: Vec<u32> = l.graph.lane(lane).unwrap().iter().map(|(c, _)| c).collect();
                assert!(cells.windows(2).all(|w| w[0] < w[1]));
            }
        }
        assert!(vehicles.iter().all(|v| v.state() == VehicleState::Despawned));
    }

    #[test]
    fn participant_view_follows_the_route() {
        let mut l = line();
        let mut vehicles = vec![vehicle(0, &l, 0.0)];
        assert!(!vehicles[0].is_spawned());
        assert_eq!(vehicles[0].next_edge(), Some(l.ab));
        spawn_first(&mut l, &mut vehicles);
        assert!(vehicles[0].is_spawned());
        assert_eq!(vehicles[0].current_lane(), Some(LaneRef::outermost(l.ab)));
        assert_eq!(vehicles[0].next_edge(), Some(l.bc));
    }

    #[test]
    fn reset_returns_to_not_spawned() {
        let mut l = line();
        let mut vehicles = vec![vehicle(0, &l, 0.2)];
        for _ in 0..4 {
            tick(&mut l.graph, &mut vehicles);
        }
        vehicles[0].reset();
        let v = &vehicles[0];
        assert_eq!(v.state(), VehicleState::NotSpawned);
        assert_eq!(v.lane(), None);
        assert_eq!(v.velocity(), 0);
        assert_eq!(v.driver().route().len(), 2);
        assert_eq!(v.driver().travelling_time(), 0);
    }
}
