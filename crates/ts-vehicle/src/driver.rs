//! The driver: route, crossing priority, dawdling and mood.

use ts_core::{DriverRng, PriorityCounter, Resettable};
use ts_graph::Route;

/// Behavioural half of a vehicle.
///
/// The driver owns its route and the only RNG the vehicle uses, so a driver
/// built from the same seed and route always dawdles the same way.
#[derive(Debug)]
pub struct Driver {
    route:            Route,
    initial_route:    Route,
    priority_counter: PriorityCounter,
    dawdle_factor:    f32,
    rng:              DriverRng,

    spawn_delay:     u32,
    /// Ticks since the vehicle became eligible to spawn; starts at
    /// `-spawn_delay`.
    travelling_time: i64,

    anger:       u32,
    max_anger:   u32,
    total_anger: u64,
}

impl Driver {
    pub const DEFAULT_DAWDLE_FACTOR: f32 = 0.2;

    pub fn new(seed: u64, route: Route) -> Self {
        Self {
            initial_route:    route.clone(),
            route,
            priority_counter: PriorityCounter::new(),
            dawdle_factor:    Self::DEFAULT_DAWDLE_FACTOR,
            rng:              DriverRng::new(seed),
            spawn_delay:      0,
            travelling_time:  0,
            anger:            0,
            max_anger:        u32::MAX,
            total_anger:      0,
        }
    }

    /// Set the dawdle probability.  Values outside `[0, 1]` are clamped and
    /// logged.
    pub fn with_dawdle_factor(mut self, factor: f32) -> Self {
        let clamped = if factor.is_nan() { 0.0 } else { factor.clamp(0.0, 1.0) };
        if clamped != factor {
            log::warn!("dawdle factor must lie in [0, 1], got {factor}; using {clamped}");
        }
        self.dawdle_factor = clamped;
        self
    }

    /// Keep the vehicle from spawning for `ticks` ticks.
    pub fn with_spawn_delay(mut self, ticks: u32) -> Self {
        self.spawn_delay = ticks;
        self.travelling_time = -i64::from(ticks);
        self
    }

    pub fn with_max_anger(mut self, max_anger: u32) -> Self {
        self.max_anger = max_anger;
        self
    }

    // ── Driving ───────────────────────────────────────────────────────────

    /// Velocity the driver would like next tick.
    #[inline]
    pub fn accelerate(&self, velocity: u32) -> u32 {
        velocity.saturating_add(1)
    }

    /// With probability `dawdle_factor`, one cell per tick slower.
    ///
    /// Draws from the RNG only for a moving vehicle.
    pub fn dawdle(&mut self, velocity: u32) -> u32 {
        if velocity == 0 {
            return 0;
        }
        if self.rng.next_f32() < self.dawdle_factor { velocity - 1 } else { velocity }
    }

    #[inline]
    pub fn dawdle_factor(&self) -> f32 {
        self.dawdle_factor
    }

    #[inline]
    pub fn seed(&self) -> u64 {
        self.rng.seed()
    }

    // ── Route ─────────────────────────────────────────────────────────────

    #[inline]
    pub fn route(&self) -> &Route {
        &self.route
    }

    #[inline]
    pub fn route_mut(&mut self) -> &mut Route {
        &mut self.route
    }

    /// Replace the route, e.g. after a scenario computed it.
    pub fn set_route(&mut self, route: Route) {
        self.initial_route = route.clone();
        self.route = route;
    }

    // ── Crossing priority ─────────────────────────────────────────────────

    #[inline]
    pub fn priority_counter(&self) -> &PriorityCounter {
        &self.priority_counter
    }

    // ── Bookkeeping ───────────────────────────────────────────────────────

    #[inline]
    pub fn travelling_time(&self) -> i64 {
        self.travelling_time
    }

    #[inline]
    pub fn spawn_delay(&self) -> u32 {
        self.spawn_delay
    }

    /// Whether the spawn delay has run out.
    #[inline]
    pub fn may_spawn(&self) -> bool {
        self.travelling_time >= 0
    }

    pub fn inc_travelling_time(&mut self) {
        self.travelling_time += 1;
    }

    pub fn become_more_angry(&mut self) {
        self.anger = self.anger.saturating_add(1).min(self.max_anger);
        self.total_anger += 1;
    }

    pub fn calm_down(&mut self) {
        self.anger = self.anger.saturating_sub(1);
    }

    #[inline]
    pub fn anger(&self) -> u32 {
        self.anger
    }

    #[inline]
    pub fn total_anger(&self) -> u64 {
        self.total_anger
    }
}

impl Resettable for Driver {
    /// Back to the state right after construction: full route, fresh RNG,
    /// zeroed counter and mood.
    fn reset(&mut self) {
        self.route = self.initial_route.clone();
        self.priority_counter.reset();
        self.rng.reset();
        self.travelling_time = -i64::from(self.spawn_delay);
        self.anger = 0;
        self.total_anger = 0;
    }
}
