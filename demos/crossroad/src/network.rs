//! Synthetic downtown grid used by the crossroad demo.
//!
//! A square grid of two-way single-lane streets.  The middle row is a
//! priority avenue with a higher speed limit; every other street yields to
//! it.  Corners of the grid are the natural origins and destinations.

use ts_core::{GeoPoint, NodeId, SimConfig};
use ts_graph::{EdgeSpec, Graph, GraphBuilder};

/// Spacing between neighbouring crossings, in degrees (about 110 m).
const LAT_STEP: f32 = 0.001;
const LON_STEP: f32 = 0.0015;

/// Build an `n` × `n` grid and return it with its node ids in row-major
/// order.
pub fn build_grid(config: &SimConfig, n: usize) -> (Graph, Vec<NodeId>) {
    let side_street = EdgeSpec::new(1, 3, 0);
    let avenue      = EdgeSpec::new(1, 5, 1);
    let avenue_row  = n / 2;

    let mut b = GraphBuilder::new(config);
    let mut ids = Vec::with_capacity(n * n);
    for r in 0..n {
        for c in 0..n {
            let pos = GeoPoint::new(48.137 + r as f32 * LAT_STEP, 11.575 + c as f32 * LON_STEP);
            ids.push(b.add_node(pos));
        }
    }

    for r in 0..n {
        for c in 0..n {
            let here = ids[r * n + c];
            if c + 1 < n {
                let spec = if r == avenue_row { avenue } else { side_street };
                b.add_road(here, ids[r * n + c + 1], spec);
            }
            if r + 1 < n {
                b.add_road(here, ids[(r + 1) * n + c], side_street);
            }
        }
    }
    b.connect_all_turns();
    (b.build(), ids)
}
