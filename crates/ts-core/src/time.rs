//! Simulation time.
//!
//! One `Tick` is one Nagel–Schreckenberg update: every spawned vehicle
//! accelerates, brakes, dawdles and moves once, and every node re-evaluates
//! its crossing permissions once.  There is no wall-clock mapping.

use std::fmt;
use std::ops::{Add, Sub};

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tick(pub u64);

impl Tick {
    pub const ZERO: Tick = Tick(0);

    #[inline]
    pub fn next(self) -> Tick {
        self + 1
    }
}

impl Add<u64> for Tick {
    type Output = Tick;

    fn add(self, ticks: u64) -> Tick {
        Tick(self.0 + ticks)
    }
}

/// Number of ticks between two points in time.
impl Sub for Tick {
    type Output = u64;

    fn sub(self, earlier: Tick) -> u64 {
        self.0 - earlier.0
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}
