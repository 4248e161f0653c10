//! Vehicle membership by state.

use std::collections::BTreeSet;

use ts_core::{Resettable, VehicleId};
use ts_vehicle::VehicleState;

/// Which vehicles are waiting, driving or gone.
///
/// Only the stepper changes membership, and only at phase barriers while it
/// applies `StateChanged` events.  The sets are ordered so that every phase
/// walks its vehicles in ascending id order.
#[derive(Debug, Default, Clone)]
pub struct VehicleContainer {
    not_spawned: BTreeSet<VehicleId>,
    spawned:     BTreeSet<VehicleId>,
    despawned:   BTreeSet<VehicleId>,
}

impl VehicleContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// All `ids` start out not spawned.
    pub fn with_vehicles(ids: impl IntoIterator<Item = VehicleId>) -> Self {
        Self { not_spawned: ids.into_iter().collect(), ..Self::default() }
    }

    pub fn insert(&mut self, id: VehicleId) -> bool {
        self.not_spawned.insert(id)
    }

    /// Move `id` from the `from` set to the `to` set.  Returns `false` if it
    /// was not in `from`.
    pub fn transition(&mut self, id: VehicleId, from: VehicleState, to: VehicleState) -> bool {
        if !self.set_mut(from).remove(&id) {
            return false;
        }
        self.set_mut(to).insert(id)
    }

    pub fn ids(&self, state: VehicleState) -> &BTreeSet<VehicleId> {
        match state {
            VehicleState::NotSpawned => &self.not_spawned,
            VehicleState::Spawned => &self.spawned,
            VehicleState::Despawned => &self.despawned,
        }
    }

    #[inline]
    pub fn count(&self, state: VehicleState) -> usize {
        self.ids(state).len()
    }

    pub fn len(&self) -> usize {
        self.not_spawned.len() + self.spawned.len() + self.despawned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every vehicle has left the graph (or never had anywhere to go).
    pub fn is_finished(&self) -> bool {
        self.not_spawned.is_empty() && self.spawned.is_empty()
    }

    fn set_mut(&mut self, state: VehicleState) -> &mut BTreeSet<VehicleId> {
        match state {
            VehicleState::NotSpawned => &mut self.not_spawned,
            VehicleState::Spawned => &mut self.spawned,
            VehicleState::Despawned => &mut self.despawned,
        }
    }
}

impl Resettable for VehicleContainer {
    /// Everyone back to not spawned.
    fn reset(&mut self) {
        let spawned = std::mem::take(&mut self.spawned);
        let despawned = std::mem::take(&mut self.despawned);
        self.not_spawned.extend(spawned);
        self.not_spawned.extend(despawned);
    }
}
