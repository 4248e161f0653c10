//! Typed arena indices.
//!
//! Nodes, edges and vehicles are stored in `Vec`s and point at each other
//! only through these ids, so no ownership cycle exists between a node, its
//! edges and the vehicles on them.

use std::fmt;

macro_rules! arena_id {
    ($(#[$attr:meta])* $name:ident, $label:literal) => {
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name(pub u32);

        impl $name {
            /// Placeholder for "not set yet".
            pub const INVALID: $name = $name(u32::MAX);

            /// Position in the owning arena.
            #[inline(always)]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::INVALID
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "#{}"), self.0)
            }
        }
    };
}

arena_id! {
    /// Index of a vehicle in the scenario's vehicle arena.
    VehicleId, "vehicle"
}

arena_id! {
    /// Index of a street-graph node.
    NodeId, "node"
}

arena_id! {
    /// Index of a directed street-graph edge.
    EdgeId, "edge"
}
