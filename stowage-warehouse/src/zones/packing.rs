//! Packing zone: a fixed set of picking workstations.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Slot configuration of one workstation.
#[derive(Debug, Clone, Copy)]
pub struct WorkstationInfo {
    /// Pallet-dismantling slots; pickers use this as their chunk size.
    pub dismantle_slots: u32,
    /// Packing slots.
    pub packing_slots: u32,
}

/// Workstation set with at most one reservation per station at a time.
#[derive(Debug)]
pub struct PackingZone {
    stations: Vec<WorkstationInfo>,
    occupied: Mutex<Vec<bool>>,
    cv: Condvar,
}

impl PackingZone {
    /// Build the zone from a fixed station list.
    #[must_use]
    pub fn new(stations: Vec<WorkstationInfo>) -> Self {
        let occupied = Mutex::new(vec![false; stations.len()]);
        Self { stations, occupied, cv: Condvar::new() }
    }

    /// Reserve any free workstation, waiting up to `timeout`.
    ///
    /// Returns the station id, or `None` when every station stayed busy.
    pub fn reserve(&self, timeout: Duration) -> Option<usize> {
        let deadline = Instant::now() + timeout;
        let mut occupied = self.occupied.lock();
        loop {
            if let Some(id) = occupied.iter().position(|&busy| !busy) {
                occupied[id] = true;
                return Some(id);
            }
            if self.cv.wait_until(&mut occupied, deadline).timed_out() {
                return occupied.iter().position(|&busy| !busy).map(|id| {
                    occupied[id] = true;
                    id
                });
            }
        }
    }

    /// Free a workstation and wake one waiter. Unknown ids are ignored.
    pub fn release(&self, workstation_id: usize) {
        {
            let mut occupied = self.occupied.lock();
            if let Some(slot) = occupied.get_mut(workstation_id) {
                *slot = false;
            }
        }
        self.cv.notify_one();
    }

    /// Slot counts for a station; unknown ids fall back to a 1/1 station.
    #[must_use]
    pub fn info(&self, workstation_id: usize) -> WorkstationInfo {
        self.stations
            .get(workstation_id)
            .copied()
            .unwrap_or(WorkstationInfo { dismantle_slots: 1, packing_slots: 1 })
    }

    /// Number of workstations in the zone.
    #[must_use]
    pub fn station_count(&self) -> usize {
        self.stations.len()
    }
}
