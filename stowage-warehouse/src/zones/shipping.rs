//! Shipping zone: docks bound to destination cities.

use parking_lot::{Condvar, Mutex};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// State of one active dock.
#[derive(Debug, Clone)]
pub struct DockInfo {
    /// Dock id.
    pub id: u32,
    /// Destination city of the parked truck.
    pub city: String,
    /// Pallet slots on the truck.
    pub slots: u32,
    /// Slots already loaded.
    pub occupied: u32,
}

#[derive(Debug, Default)]
struct ShippingState {
    next_dock_id: u32,
    docks: BTreeMap<u32, DockInfo>,
}

/// Registry of active docks; a full dock departs and disappears.
#[derive(Debug, Default)]
pub struct ShippingZone {
    state: Mutex<ShippingState>,
    cv: Condvar,
}

impl ShippingZone {
    /// Create an empty zone.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a truck bound for `city` with `slots` pallet slots.
    ///
    /// Returns the fresh dock id. Wakes every loader waiting for a dock.
    pub fn register_arrival(&self, city: &str, slots: u32) -> u32 {
        let id = {
            let mut state = self.state.lock();
            let id = state.next_dock_id;
            state.next_dock_id += 1;
            state
                .docks
                .insert(id, DockInfo { id, city: city.to_owned(), slots, occupied: 0 });
            id
        };
        debug!(dock = id, city, slots, "truck arrived");
        self.cv.notify_all();
        id
    }

    /// Remove a dock explicitly (truck departed before filling up).
    pub fn register_departure(&self, dock_id: u32) {
        {
            let mut state = self.state.lock();
            state.docks.remove(&dock_id);
        }
        self.cv.notify_all();
    }

    /// Load `pallet_count` pallets onto any dock matching `city`.
    ///
    /// Blocks up to `timeout` for a matching dock with enough remaining
    /// capacity. When a load fills the dock, the truck departs and the dock
    /// is removed, so it can never be matched again.
    pub fn try_load(&self, city: &str, pallet_count: u32, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if Self::load_matching(&mut state, city, pallet_count) {
                return true;
            }
            if self.cv.wait_until(&mut state, deadline).timed_out() {
                return Self::load_matching(&mut state, city, pallet_count);
            }
        }
    }

    fn load_matching(state: &mut ShippingState, city: &str, pallet_count: u32) -> bool {
        let target = state
            .docks
            .values()
            .find(|dock| dock.city == city && dock.occupied + pallet_count <= dock.slots)
            .map(|dock| dock.id);
        let Some(id) = target else { return false };

        let Some(dock) = state.docks.get_mut(&id) else { return false };
        dock.occupied += pallet_count;
        let full = dock.occupied == dock.slots;
        if full {
            state.docks.remove(&id);
            debug!(dock = id, city, "dock filled, truck departed");
        }
        true
    }

    /// Snapshot of every active dock.
    #[must_use]
    pub fn docks_snapshot(&self) -> Vec<DockInfo> {
        self.state.lock().docks.values().cloned().collect()
    }
}
