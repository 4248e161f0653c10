//! The `Resettable` capability.

/// Something holding per-run dynamic state that can be cleared while keeping
/// its static structure (topology, configuration, seeds).
pub trait Resettable {
    fn reset(&mut self);
}
