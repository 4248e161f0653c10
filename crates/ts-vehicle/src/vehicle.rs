//! Vehicles and the Nagel–Schreckenberg phase methods.
//!
//! # Tick
//!
//! | Phase      | Method(s)                              | Runs for      |
//! |------------|----------------------------------------|---------------|
//! | spawn      | [`Vehicle::spawn`]                     | not spawned   |
//! | will move  | [`accelerate`], [`brake`], [`dawdle`]  | spawned       |
//! | move       | [`Vehicle::move_step`]                 | spawned       |
//! | did move   | [`Vehicle::did_move`]                  | spawned       |
//!
//! Distances are measured in cells: a vehicle on cell `c` of a lane with
//! `len` cells is `len - c` cells away from the lane end, so moving exactly
//! that far lands on cell 0 of the next lane.
//!
//! [`accelerate`]: Vehicle::accelerate
//! [`brake`]: Vehicle::brake
//! [`dawdle`]: Vehicle::dawdle

use std::fmt;
use std::sync::Arc;

use ts_core::{EdgeId, NodeId, PriorityCounter, Resettable, VehicleId};
use ts_graph::{CrossingParticipant, Graph, LaneRef};

use crate::{Driver, VehicleEntity, VehicleError, VehicleEvent, VehicleResult};

// ── VehicleState ──────────────────────────────────────────────────────────────

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VehicleState {
    #[default]
    NotSpawned,
    Spawned,
    /// Terminal.
    Despawned,
}

impl fmt::Display for VehicleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VehicleState::NotSpawned => "not_spawned",
            VehicleState::Spawned => "spawned",
            VehicleState::Despawned => "despawned",
        })
    }
}

// ── Vehicle ───────────────────────────────────────────────────────────────────

/// A car driving cell by cell along its driver's route.
pub struct Vehicle {
    id:       VehicleId,
    state:    VehicleState,
    lane:     Option<LaneRef>,
    cell:     u32,
    velocity: u32,
    /// Mechanical top speed (acceleration curve cap).
    max_velocity: u32,

    last_velocity_zero: bool,
    /// Node holding this vehicle's pending crossing request.
    registered_at: Option<NodeId>,

    driver: Driver,
    entity: Option<Arc<dyn VehicleEntity>>,
}

impl Vehicle {
    /// Top speed of a standard car in cells per tick.
    pub const DEFAULT_MAX_VELOCITY: u32 = 5;

    pub fn new(id: VehicleId, driver: Driver) -> Self {
        Self {
            id,
            state: VehicleState::NotSpawned,
            lane: None,
            cell: 0,
            velocity: 0,
            max_velocity: Self::DEFAULT_MAX_VELOCITY,
            last_velocity_zero: false,
            registered_at: None,
            driver,
            entity: None,
        }
    }

    pub fn with_max_velocity(mut self, max_velocity: u32) -> Self {
        self.max_velocity = max_velocity;
        self
    }

    pub fn with_entity(mut self, entity: Arc<dyn VehicleEntity>) -> Self {
        self.entity = Some(entity);
        self
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    #[inline]
    pub fn id(&self) -> VehicleId {
        self.id
    }

    #[inline]
    pub fn state(&self) -> VehicleState {
        self.state
    }

    #[inline]
    pub fn lane(&self) -> Option<LaneRef> {
        self.lane
    }

    #[inline]
    pub fn cell(&self) -> u32 {
        self.cell
    }

    #[inline]
    pub fn velocity(&self) -> u32 {
        self.velocity
    }

    #[inline]
    pub fn max_velocity(&self) -> u32 {
        self.max_velocity
    }

    #[inline]
    pub fn registered_at(&self) -> Option<NodeId> {
        self.registered_at
    }

    #[inline]
    pub fn driver(&self) -> &Driver {
        &self.driver
    }

    #[inline]
    pub fn driver_mut(&mut self) -> &mut Driver {
        &mut self.driver
    }

    // ── Spawn ─────────────────────────────────────────────────────────────

    /// Try to enter the graph at the route origin.
    ///
    /// Once the spawn delay has run out the vehicle asks its origin node for
    /// permission.  With permission and a free first cell on the outermost
    /// lane of the first edge it enters at cell 0 with velocity 1.  A vehicle
    /// with an empty route despawns without ever spawning.
    pub fn spawn(&mut self, graph: &Graph, events: &mut Vec<VehicleEvent>) -> VehicleResult<()> {
        if self.state != VehicleState::NotSpawned {
            return Ok(());
        }

        if self.driver.may_spawn() {
            let Some(first) = self.driver.route().peek() else {
                self.velocity = 0;
                self.set_state(VehicleState::Despawned, events);
                return Ok(());
            };
            let origin = self.driver.route().origin();
            let lane = LaneRef::outermost(first);

            if !graph.try_node(origin)?.permission_to_cross(self.id) {
                self.velocity = 0;
                self.register_at(origin, events);
            } else if graph.lane(lane)?.max_insertion_index() < 0 {
                self.velocity = 0;
            } else {
                self.unregister(events);
                self.driver.route_mut().pop();
                self.velocity = 1;
                self.enter(lane, 0, events);
                self.set_state(VehicleState::Spawned, events);
                // Spawned vehicles do their bookkeeping in `did_move`.
                return Ok(());
            }
        }

        self.did_one_step();
        Ok(())
    }

    // ── Will move ─────────────────────────────────────────────────────────

    /// `v = min(acceleration curve, driver wish)`, capped by the lane's and
    /// the vehicle's top speed.
    pub fn accelerate(&mut self, graph: &Graph) -> VehicleResult<()> {
        let lane = self.lane.ok_or(VehicleError::NotOnLane(self.id))?;
        let lane_max = graph.try_edge(lane.edge)?.max_velocity;

        let v_vehicle = self.velocity.saturating_add(1).min(self.max_velocity);
        let v_driver = self.driver.accelerate(self.velocity);
        self.velocity = v_vehicle.min(v_driver).min(lane_max).min(self.max_velocity);
        Ok(())
    }

    /// Slow down so that moving `velocity` cells is safe.
    ///
    /// - Behind another vehicle: stop at least one cell behind it.
    /// - First on the lane and about to pass the lane end:
    ///   - route finished: the vehicle may leave the graph;
    ///   - permission granted and a connector exists: drive at most up to
    ///     the free part of the next lane;
    ///   - otherwise: stop on the last cell.
    pub fn brake(&mut self, graph: &Graph) -> VehicleResult<()> {
        let lane_ref = self.lane.ok_or(VehicleError::NotOnLane(self.id))?;
        let lane = graph.lane(lane_ref)?;
        let edge = graph.try_edge(lane_ref.edge)?;
        let cell = i64::from(self.cell);
        let v = i64::from(self.velocity);

        let limit = if let Some((front, _)) = lane.vehicle_in_front(self.cell) {
            Some(i64::from(front) - cell - 1)
        } else {
            let distance = i64::from(edge.length) - cell;
            if v < distance {
                None
            } else {
                match self.driver.route().peek() {
                    None => None,
                    Some(next) => {
                        let node = graph.try_node(edge.destination)?;
                        let next_lane = node
                            .permission_to_cross(self.id)
                            .then(|| node.next_lane(lane_ref, next))
                            .flatten();
                        match next_lane {
                            Some(next_lane) => {
                                let next = graph.lane(next_lane)?;
                                let mut m = next.max_insertion_index();
                                // An empty lane is entered at most on its
                                // second-to-last cell.
                                if next.length() > 1 && m == i64::from(next.length()) - 1 {
                                    m -= 1;
                                }
                                Some(distance + m)
                            }
                            None => Some(distance - 1),
                        }
                    }
                }
            }
        };

        if let Some(limit) = limit {
            let braked = v.min(limit);
            if braked < 0 {
                log::error!("{}: braking produced velocity {braked} on {lane_ref} cell {}", self.id, self.cell);
                return Err(VehicleError::NegativeVelocity { vehicle: self.id, velocity: braked });
            }
            self.velocity = braked as u32;
        }
        Ok(())
    }

    /// Random slowdown by one cell per tick.
    pub fn dawdle(&mut self) -> VehicleResult<()> {
        if self.velocity == 0 {
            return Ok(());
        }
        let before = self.velocity;
        let after = self.driver.dawdle(before);
        if after > before {
            log::error!("{}: dawdling raised velocity {before} -> {after}", self.id);
            return Err(VehicleError::DawdleIncreasedVelocity { vehicle: self.id, before, after });
        }
        self.velocity = after;
        Ok(())
    }

    /// accelerate, brake, dawdle.
    pub fn will_move(&mut self, graph: &Graph) -> VehicleResult<()> {
        if self.state != VehicleState::Spawned {
            return Ok(());
        }
        self.accelerate(graph)?;
        self.brake(graph)?;
        self.dawdle()
    }

    // ── Move ──────────────────────────────────────────────────────────────

    /// Advance `velocity` cells, crossing into the next lane or leaving the
    /// graph when the lane end is passed.
    pub fn move_step(&mut self, graph: &Graph, events: &mut Vec<VehicleEvent>) -> VehicleResult<()> {
        if self.state != VehicleState::Spawned {
            return Ok(());
        }
        let lane = self.lane.ok_or(VehicleError::NotOnLane(self.id))?;
        let edge = graph.try_edge(lane.edge)?;
        let distance = edge.length - self.cell;

        if self.velocity >= distance {
            self.leave(lane, events);
            match self.driver.route_mut().pop() {
                None => self.set_state(VehicleState::Despawned, events),
                Some(next) => {
                    let node = edge.destination;
                    let next_lane = graph.try_node(node)?.next_lane(lane, next).ok_or(
                        VehicleError::NoNextLane { vehicle: self.id, node, lane, next },
                    )?;
                    self.enter(next_lane, self.velocity - distance, events);
                }
            }
        } else if self.velocity == 0 && distance == 1 && self.driver.route().is_empty() {
            // Standing on the last cell with nowhere left to go.
            self.leave(lane, events);
            self.set_state(VehicleState::Despawned, events);
        } else if self.velocity > 0 {
            events.push(VehicleEvent::LaneAdvance { vehicle: self.id, lane, delta: self.velocity });
            self.cell += self.velocity;
            self.notify_position();
        }
        Ok(())
    }

    // ── Did move ──────────────────────────────────────────────────────────

    /// Mood and travelling-time bookkeeping, then (re-)register at the
    /// destination node if the vehicle could reach it next tick and nobody
    /// is in front; otherwise withdraw any request.
    pub fn did_move(&mut self, graph: &Graph, events: &mut Vec<VehicleEvent>) -> VehicleResult<()> {
        if self.state != VehicleState::Spawned {
            return Ok(());
        }
        self.did_one_step();

        let lane = self.lane.ok_or(VehicleError::NotOnLane(self.id))?;
        let edge = graph.try_edge(lane.edge)?;
        let distance = edge.length - self.cell;
        let reach = self.max_velocity.min(edge.max_velocity);

        let should_register = !self.driver.route().is_empty()
            && reach >= distance
            && !graph.lane(lane)?.has_vehicle_in_front(self.cell);

        if should_register {
            self.register_at(edge.destination, events);
        } else {
            self.unregister(events);
        }
        Ok(())
    }

    // ── Internals ─────────────────────────────────────────────────────────

    fn did_one_step(&mut self) {
        if self.velocity == 0 {
            if self.last_velocity_zero {
                self.driver.become_more_angry();
            }
            self.last_velocity_zero = true;
        } else {
            if !self.last_velocity_zero {
                self.driver.calm_down();
            }
            self.last_velocity_zero = false;
        }
        self.driver.inc_travelling_time();

        if let Some(entity) = &self.entity {
            entity.set_base_color(self.id, self.driver.anger());
        }
    }

    fn enter(&mut self, lane: LaneRef, cell: u32, events: &mut Vec<VehicleEvent>) {
        self.lane = Some(lane);
        self.cell = cell;
        events.push(VehicleEvent::LaneInsert { vehicle: self.id, lane, cell });
        self.notify_position();
    }

    fn leave(&mut self, lane: LaneRef, events: &mut Vec<VehicleEvent>) {
        self.unregister(events);
        events.push(VehicleEvent::LaneRemove { vehicle: self.id, lane });
        self.lane = None;
    }

    fn register_at(&mut self, node: NodeId, events: &mut Vec<VehicleEvent>) {
        if self.registered_at == Some(node) {
            return;
        }
        self.unregister(events);
        self.registered_at = Some(node);
        events.push(VehicleEvent::Register { vehicle: self.id, node });
    }

    fn unregister(&mut self, events: &mut Vec<VehicleEvent>) {
        if let Some(node) = self.registered_at.take() {
            events.push(VehicleEvent::Unregister { vehicle: self.id, node });
        }
    }

    fn set_state(&mut self, to: VehicleState, events: &mut Vec<VehicleEvent>) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        if to == VehicleState::Despawned {
            self.lane = None;
            self.velocity = 0;
            self.notify_position();
        }
        events.push(VehicleEvent::StateChanged { vehicle: self.id, from, to });
    }

    fn notify_position(&self) {
        if let Some(entity) = &self.entity {
            entity.update_position(self.id, self.lane, self.cell);
        }
    }
}

impl fmt::Debug for Vehicle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vehicle")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("lane", &self.lane)
            .field("cell", &self.cell)
            .field("velocity", &self.velocity)
            .field("registered_at", &self.registered_at)
            .field("driver", &self.driver)
            .finish()
    }
}

impl CrossingParticipant for Vehicle {
    fn vehicle_id(&self) -> VehicleId {
        self.id
    }

    fn is_spawned(&self) -> bool {
        self.state == VehicleState::Spawned
    }

    fn current_lane(&self) -> Option<LaneRef> {
        self.lane
    }

    fn next_edge(&self) -> Option<EdgeId> {
        self.driver.route().peek()
    }

    fn priority_counter(&self) -> &PriorityCounter {
        self.driver.priority_counter()
    }
}

impl Resettable for Vehicle {
    fn reset(&mut self) {
        self.state = VehicleState::NotSpawned;
        self.lane = None;
        self.cell = 0;
        self.velocity = 0;
        self.last_velocity_zero = false;
        self.registered_at = None;
        self.driver.reset();
    }
}
