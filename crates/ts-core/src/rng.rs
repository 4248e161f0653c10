//! Deterministic RNG wrappers and the scenario's monotonic generators.
//!
//! # Determinism strategy
//!
//! Every driver owns an independent `SmallRng` seeded from a value handed out
//! by the scenario's [`SeedGenerator`].  Seeds are assigned in one sequential
//! pass (canonical route order), so:
//!
//! - Drivers never share RNG state (no contention, no ordering dependency).
//! - The order in which worker threads process drivers cannot influence which
//!   random numbers a driver draws.
//!
//! [`SeedGenerator`] and [`IdGenerator`] are lock-free atomics so that they
//! can be shared by reference across the builder's worker threads; they are
//! explicit objects owned by the scenario builder, never process globals.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::VehicleId;

/// 64-bit fractional golden-ratio constant for seed mixing.
const MIXING_CONSTANT: u64 = 0x9e37_79b9_7f4a_7c15;

/// SplitMix64 finaliser; spreads consecutive inputs across the seed space.
#[inline]
fn splitmix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

// ── DriverRng ─────────────────────────────────────────────────────────────────

/// Per-driver deterministic RNG, used only for dawdling.
///
/// Keeps its seed so that a reset scenario replays the identical sequence.
pub struct DriverRng {
    seed: u64,
    rng:  SmallRng,
}

impl DriverRng {
    pub fn new(seed: u64) -> Self {
        Self { seed, rng: SmallRng::seed_from_u64(seed) }
    }

    /// The seed this RNG was created from.
    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Rewind to the initial state.
    pub fn reset(&mut self) {
        self.rng = SmallRng::seed_from_u64(self.seed);
    }

    /// Uniform `f32` in `[0, 1)`.
    #[inline]
    pub fn next_f32(&mut self) -> f32 {
        self.rng.r#gen()
    }
}

impl std::fmt::Debug for DriverRng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRng").field("seed", &self.seed).finish()
    }
}

// ── SimRng ────────────────────────────────────────────────────────────────────

/// Simulation-level RNG for global, single-threaded operations (random
/// scenario generation and similar).
pub struct SimRng(SmallRng);

impl SimRng {
    pub fn new(seed: u64) -> Self {
        SimRng(SmallRng::seed_from_u64(seed))
    }

    #[inline]
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: rand::distributions::uniform::SampleUniform,
        R: rand::distributions::uniform::SampleRange<T>,
    {
        self.0.gen_range(range)
    }
}

// ── SeedGenerator ─────────────────────────────────────────────────────────────

/// Thread-safe, deterministic stream of seeds.
///
/// The `n`-th call to [`next`](Self::next) always returns the same value for
/// the same base seed, no matter which thread makes it.  Callers that need a
/// reproducible *assignment* must therefore draw seeds in a canonical order.
#[derive(Debug)]
pub struct SeedGenerator {
    base:    u64,
    counter: AtomicU64,
}

impl SeedGenerator {
    pub fn new(base: u64) -> Self {
        Self { base, counter: AtomicU64::new(0) }
    }

    /// Next seed in the stream.
    pub fn next(&self) -> u64 {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        splitmix64(self.base ^ n.wrapping_add(1).wrapping_mul(MIXING_CONSTANT))
    }

    /// Rewind so the stream restarts at its first value.
    pub fn reset(&self) {
        self.counter.store(0, Ordering::Relaxed);
    }
}

// ── IdGenerator ───────────────────────────────────────────────────────────────

/// Monotonic vehicle id source starting at `VehicleId(0)`.
#[derive(Debug, Default)]
pub struct IdGenerator {
    next: AtomicU32,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self { next: AtomicU32::new(0) }
    }

    pub fn next(&self) -> VehicleId {
        VehicleId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u32 {
        self.next.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.next.store(0, Ordering::Relaxed);
    }
}
