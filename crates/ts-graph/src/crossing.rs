//! Crossing geometry and the right-of-way rule.
//!
//! # Crossing indices
//!
//! Every edge touching a node gets a *crossing index* `0..n`.  Arms are
//! ordered by the bearing from the node towards the far end of the edge:
//! counter-clockwise when driving on the right, clockwise when driving on the
//! left.  A two-way street contributes two edges with the same bearing; the
//! leaving edge is numbered before the incoming one.
//!
//! A vehicle's path over the node is the chord from the index of its incoming
//! edge (`o`) to the index of its leaving edge (`d`).  Walking the indices
//! upwards from `o` to `d` (modulo `n`) sweeps the arms lying to the
//! vehicle's right in right-hand traffic.
//!
//! # Right of way
//!
//! Two crossing paths `(o1, d1)` and `(o2, d2)` are resolved by looking for
//! the *leftmost matching index*: the index shared by both arcs
//! `o1 → d1` and `o2 → d2` that lies closest to the end of the first arc and
//! the start of the second one.  If that index is `o1`, vehicle 1 approaches
//! from the right of vehicle 2 and wins; if it is `o2`, vehicle 2 wins.  On a
//! plain four-way crossing this yields "yield to the vehicle coming from the
//! right" for straight paths and "left-turners yield to oncoming traffic".

use std::f64::consts::TAU;

use ts_core::{EdgeId, PriorityCounter, VehicleId};

use crate::LaneRef;

// ── CrossingParticipant ───────────────────────────────────────────────────────

/// What a node needs to know about a vehicle that requested to cross it.
pub trait CrossingParticipant {
    fn vehicle_id(&self) -> VehicleId;

    fn is_spawned(&self) -> bool;

    /// Lane the vehicle currently drives on; `None` before spawning.
    fn current_lane(&self) -> Option<LaneRef>;

    /// Edge the vehicle wants to enter behind the node: the next route
    /// section for spawned vehicles, the first one for vehicles waiting to
    /// spawn.
    fn next_edge(&self) -> Option<EdgeId>;

    fn priority_counter(&self) -> &PriorityCounter;
}

// ── Precedence ────────────────────────────────────────────────────────────────

/// Outcome of comparing two crossing requests.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Precedence {
    /// The first request goes before the second.
    First,
    /// The second request goes before the first.
    Second,
    /// Both may cross in the same tick.
    Compatible,
    /// The paths conflict and no enabled rule orders them.
    Undecided,
}

// ── Index assignment ──────────────────────────────────────────────────────────

/// One edge as seen from a node.
#[derive(Copy, Clone, Debug)]
pub struct Arm {
    pub edge:    EdgeId,
    /// Bearing from the node towards the far end of the edge (radians,
    /// counter-clockwise from east).
    pub bearing: f64,
    pub leaving: bool,
}

/// Number every arm in crossing order.  Returns `(edge, index)` pairs in
/// index order.
pub fn crossing_order(arms: &[Arm], driving_on_the_right: bool) -> Vec<(EdgeId, u8)> {
    let key = |a: &Arm| {
        if driving_on_the_right { a.bearing.rem_euclid(TAU) } else { (-a.bearing).rem_euclid(TAU) }
    };
    let mut sorted: Vec<&Arm> = arms.iter().collect();
    sorted.sort_by(|a, b| {
        key(a)
            .total_cmp(&key(b))
            .then_with(|| b.leaving.cmp(&a.leaving))
            .then_with(|| a.edge.cmp(&b.edge))
    });
    sorted
        .into_iter()
        .enumerate()
        .map(|(i, arm)| (arm.edge, i as u8))
        .collect()
}

// ── Index arithmetic ──────────────────────────────────────────────────────────

/// Offset of `x` when walking upwards from `from` around `n` indices.
#[inline]
fn offset(from: u8, x: u8, n: u8) -> u8 {
    ((u16::from(x) + u16::from(n) - u16::from(from)) % u16::from(n)) as u8
}

/// `true` if `x` lies strictly inside the arc `from → to`.
#[inline]
fn strictly_inside(from: u8, to: u8, x: u8, n: u8) -> bool {
    let off = offset(from, x, n);
    off > 0 && off < offset(from, to, n)
}

/// Indices swept when walking from `from` up to `to` (both inclusive).
fn arc(from: u8, to: u8, n: u8) -> Vec<u8> {
    let len = offset(from, to, n);
    (0..=len).map(|k| ((u16::from(from) + u16::from(k)) % u16::from(n)) as u8).collect()
}

/// Whether the paths `o1 → d1` and `o2 → d2` over a node with `n` indices
/// conflict.
///
/// Paths into the same leaving edge always conflict; paths out of the same
/// incoming edge never do.  Otherwise the chords cross iff exactly one end
/// of the second path lies inside the first path's arc.
pub fn paths_cross(o1: u8, d1: u8, o2: u8, d2: u8, n: u8) -> bool {
    if d1 == d2 {
        return true;
    }
    if o1 == o2 || n == 0 {
        return false;
    }
    strictly_inside(o1, d1, o2, n) != strictly_inside(o1, d1, d2, n)
}

/// The index both arcs share that is nearest to the end of the first arc and
/// the start of the second; `None` if the arcs are disjoint.
pub fn leftmost_index_in_matching(o1: u8, d1: u8, o2: u8, d2: u8, n: u8) -> Option<u8> {
    if n == 0 {
        return None;
    }
    let s1 = arc(o1, d1, n);
    let s2 = arc(o2, d2, n);
    let len1 = s1.len();
    s1.iter()
        .enumerate()
        .filter_map(|(j, &a)| {
            s2.iter().position(|&b| b == a).map(|k| (k + len1 - j, j, a))
        })
        .min_by_key(|&(shift, j, _)| (shift, j))
        .map(|(_, _, a)| a)
}

/// Right-before-left between two crossing paths.
pub fn right_of_way(o1: u8, d1: u8, o2: u8, d2: u8, n: u8) -> Precedence {
    match leftmost_index_in_matching(o1, d1, o2, d2, n) {
        Some(m) if m == o1 => Precedence::First,
        Some(m) if m == o2 => Precedence::Second,
        _ => Precedence::Undecided,
    }
}
