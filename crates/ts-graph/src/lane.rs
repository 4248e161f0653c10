//! Lane cell occupancy.
//!
//! A lane is a row of `length` cells numbered from 0 (lane start, at the
//! edge's origin node) to `length - 1` (lane end, at the destination node).
//! Occupancy is a `Vec<(cell, VehicleId)>` kept sorted by cell, so:
//!
//! - "vehicle in front of cell c" is a binary search;
//! - the vehicle nearest the lane start is `vehicles[0]`;
//! - at most one vehicle per cell is checked on insertion.
//!
//! Vehicles on one lane never overtake each other, so in-place cell updates
//! through [`Lane::move_vehicle`] keep the vector sorted.

use std::fmt;

use ts_core::{EdgeId, VehicleId};

use crate::{GraphError, GraphResult};

/// Address of one lane: the owning edge and the lane index (0 = outermost).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LaneRef {
    pub edge:  EdgeId,
    pub index: u8,
}

impl LaneRef {
    #[inline]
    pub fn new(edge: EdgeId, index: u8) -> Self {
        Self { edge, index }
    }

    /// The outermost lane of `edge`.
    #[inline]
    pub fn outermost(edge: EdgeId) -> Self {
        Self { edge, index: 0 }
    }
}

impl fmt::Display for LaneRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/lane{}", self.edge, self.index)
    }
}

/// Cell storage of one lane.
#[derive(Clone, Debug)]
pub struct Lane {
    lane_ref: LaneRef,
    length:   u32,
    vehicles: Vec<(u32, VehicleId)>,
}

impl Lane {
    pub(crate) fn new(lane_ref: LaneRef, length: u32) -> Self {
        Self { lane_ref, length, vehicles: Vec::new() }
    }

    #[inline]
    pub fn lane_ref(&self) -> LaneRef {
        self.lane_ref
    }

    /// Number of cells.
    #[inline]
    pub fn length(&self) -> u32 {
        self.length
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    #[inline]
    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    /// `(cell, vehicle)` pairs from lane start to lane end.
    pub fn iter(&self) -> impl Iterator<Item = (u32, VehicleId)> + '_ {
        self.vehicles.iter().copied()
    }

    /// Cell of `vehicle`, if it is on this lane.
    pub fn cell_of(&self, vehicle: VehicleId) -> Option<u32> {
        self.vehicles.iter().find(|&&(_, v)| v == vehicle).map(|&(c, _)| c)
    }

    /// Vehicle occupying `cell`, if any.
    pub fn vehicle_at(&self, cell: u32) -> Option<VehicleId> {
        self.vehicles
            .binary_search_by_key(&cell, |&(c, _)| c)
            .ok()
            .map(|i| self.vehicles[i].1)
    }

    /// Put `vehicle` on `cell`.
    ///
    /// Fails with [`GraphError::CellOccupied`] if another vehicle is there.
    pub fn insert_vehicle(&mut self, vehicle: VehicleId, cell: u32) -> GraphResult<()> {
        if cell >= self.length {
            return Err(GraphError::CellOutOfRange {
                lane:   self.lane_ref,
                cell,
                length: self.length,
            });
        }
        match self.vehicles.binary_search_by_key(&cell, |&(c, _)| c) {
            Ok(i) => Err(GraphError::CellOccupied {
                lane:     self.lane_ref,
                cell,
                vehicle,
                occupant: self.vehicles[i].1,
            }),
            Err(i) => {
                self.vehicles.insert(i, (cell, vehicle));
                Ok(())
            }
        }
    }

    /// Take `vehicle` off the lane.  Returns its former cell.
    pub fn remove_vehicle(&mut self, vehicle: VehicleId) -> GraphResult<u32> {
        let i = self.position_of(vehicle)?;
        Ok(self.vehicles.remove(i).0)
    }

    /// Advance `vehicle` by `delta` cells without leaving the lane.
    ///
    /// Returns the new cell.  Moving onto or past the vehicle in front is
    /// rejected instead of silently reordering the lane.
    pub fn move_vehicle(&mut self, vehicle: VehicleId, delta: u32) -> GraphResult<u32> {
        let i = self.position_of(vehicle)?;
        let target = self.vehicles[i].0 + delta;
        if target >= self.length {
            return Err(GraphError::CellOutOfRange {
                lane:   self.lane_ref,
                cell:   target,
                length: self.length,
            });
        }
        if let Some(&(front, _)) = self.vehicles.get(i + 1) {
            if target >= front {
                return Err(GraphError::Overtaking { lane: self.lane_ref, vehicle, delta });
            }
        }
        self.vehicles[i].0 = target;
        Ok(target)
    }

    /// Nearest vehicle strictly ahead of `cell`.
    pub fn vehicle_in_front(&self, cell: u32) -> Option<(u32, VehicleId)> {
        let i = self.vehicles.partition_point(|&(c, _)| c <= cell);
        self.vehicles.get(i).copied()
    }

    #[inline]
    pub fn has_vehicle_in_front(&self, cell: u32) -> bool {
        self.vehicle_in_front(cell).is_some()
    }

    /// Highest cell a vehicle entering at the lane start may reach.
    ///
    /// `length - 1` on an empty lane, otherwise one cell behind the vehicle
    /// nearest the lane start; `-1` when cell 0 is occupied.
    pub fn max_insertion_index(&self) -> i64 {
        match self.vehicles.first() {
            None => i64::from(self.length) - 1,
            Some(&(cell, _)) => i64::from(cell) - 1,
        }
    }

    pub(crate) fn clear(&mut self) {
        self.vehicles.clear();
    }

    fn position_of(&self, vehicle: VehicleId) -> GraphResult<usize> {
        self.vehicles
            .iter()
            .position(|&(_, v)| v == vehicle)
            .ok_or(GraphError::VehicleNotOnLane { lane: self.lane_ref, vehicle })
    }
}
