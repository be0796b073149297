//! Storage zone: addressable pallet slots behind a reader-writer lock.

use crate::domain::{CategoryKey, Pallet};
use parking_lot::RwLock;
use rand::Rng;
use std::collections::BTreeMap;
use tracing::warn;

/// One occupied slot: an address plus the pallet stored there.
#[derive(Debug, Clone)]
pub struct StorageRecord {
    /// Slot address, `S<shelf>-L<layer>-P<spot>` or a synthetic overflow.
    pub address: String,
    /// Stored pallet.
    pub pallet: Pallet,
}

#[derive(Debug, Default)]
struct StorageState {
    records: Vec<StorageRecord>,
    free_addresses: Vec<String>,
    overflow_count: u64,
}

impl StorageState {
    /// Pick a random free address, or degrade to a synthetic overflow slot.
    fn allocate_address<R: Rng>(&mut self, rng: &mut R) -> String {
        if self.free_addresses.is_empty() {
            let address = format!("OVERFLOW-{}", self.overflow_count);
            self.overflow_count += 1;
            warn!(%address, "storage address space exhausted");
            return address;
        }
        let index = rng.gen_range(0..self.free_addresses.len());
        self.free_addresses.swap_remove(index)
    }
}

/// Fixed address space of shelves × layers × spots, plus the records in it.
///
/// Reads (`records_for_category`, `totals_by_category`) take the lock shared;
/// placement and debit take it exclusively.
#[derive(Debug)]
pub struct StorageZone {
    state: RwLock<StorageState>,
}

impl StorageZone {
    /// Build the zone with every address free.
    #[must_use]
    pub fn new(shelves: u32, layers: u32, spots_per_layer: u32) -> Self {
        let mut free_addresses =
            Vec::with_capacity((shelves * layers * spots_per_layer) as usize);
        for shelf in 0..shelves {
            for layer in 0..layers {
                for spot in 0..spots_per_layer {
                    free_addresses.push(format!("S{shelf}-L{layer}-P{spot}"));
                }
            }
        }
        Self {
            state: RwLock::new(StorageState {
                records: Vec::new(),
                free_addresses,
                overflow_count: 0,
            }),
        }
    }

    /// Place a pallet on any free address and return the address.
    ///
    /// On overflow a synthetic `OVERFLOW-n` address is issued so the
    /// simulation keeps moving; the pallet is still debitable.
    pub fn place_pallet(&self, pallet: Pallet) -> String {
        let mut state = self.state.write();
        let address = state.allocate_address(&mut rand::thread_rng());
        state.records.push(StorageRecord { address: address.clone(), pallet });
        address
    }

    /// Debit up to `requested` units of `category`, walking records in
    /// insertion order. Returns the amount actually taken.
    ///
    /// A record whose last units are removed gives its address back to the
    /// free pool and disappears.
    pub fn take_from_storage(&self, category: CategoryKey, requested: u32) -> u32 {
        let mut state = self.state.write();
        let mut remaining = requested;
        let mut index = 0;
        while index < state.records.len() && remaining > 0 {
            let record = &mut state.records[index];
            if record.pallet.cargo == category.cargo {
                if let Some(quantity) = record.pallet.quantities.get_mut(&category.category) {
                    let take = (*quantity).min(remaining);
                    *quantity -= take;
                    remaining -= take;
                    if *quantity == 0 {
                        record.pallet.quantities.remove(&category.category);
                    }
                    if record.pallet.quantities.is_empty() {
                        let emptied = state.records.remove(index);
                        state.free_addresses.push(emptied.address);
                        continue;
                    }
                }
            }
            index += 1;
        }
        requested - remaining
    }

    /// Snapshot every record holding units of `category`.
    #[must_use]
    pub fn records_for_category(&self, category: CategoryKey) -> Vec<StorageRecord> {
        let state = self.state.read();
        state
            .records
            .iter()
            .filter(|record| {
                record.pallet.cargo == category.cargo
                    && record.pallet.quantities.contains_key(&category.category)
            })
            .cloned()
            .collect()
    }

    /// Aggregate unit totals per category key.
    #[must_use]
    pub fn totals_by_category(&self) -> BTreeMap<CategoryKey, u32> {
        let state = self.state.read();
        let mut totals = BTreeMap::new();
        for record in &state.records {
            for (&category, &quantity) in &record.pallet.quantities {
                *totals
                    .entry(CategoryKey::new(record.pallet.cargo, category))
                    .or_insert(0) += quantity;
            }
        }
        totals
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.state.read().records.len()
    }

    /// Number of free addresses.
    #[must_use]
    pub fn free_address_count(&self) -> usize {
        self.state.read().free_addresses.len()
    }
}
