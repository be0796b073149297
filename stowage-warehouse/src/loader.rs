//! Loader worker thread: consumes tasks and runs the per-kind protocols.

use crate::dispatch::{PickingPayload, Task, TaskPayload, UnloadPayload};
use crate::domain::InventoryRequest;
use crate::stats::OrderState;
use crate::warehouse::Core;
use rand::Rng;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn};

/// Shipping attempts before a picked order is declared partial.
const SHIP_ATTEMPTS: u32 = 8;

/// A single loader. Lives on its own thread; loops until the dispatcher
/// signals shutdown.
#[derive(Debug)]
pub(crate) struct Loader {
    id: u32,
    core: Arc<Core>,
}

impl Loader {
    pub(crate) fn new(id: u32, core: Arc<Core>) -> Self {
        Self { id, core }
    }

    /// Main loop: rest, acquire, dispatch by kind, finish.
    pub(crate) fn run(&self) {
        loop {
            let idle_start = Instant::now();
            let Some(task) = self.core.dispatcher.acquire() else {
                break;
            };
            self.core.stats.record_loader_rest(self.id, idle_start.elapsed());
            trace!(loader = self.id, task = task.id(), kind = task.kind().label(), "task acquired");

            let success = match task.payload() {
                TaskPayload::Unload(payload) => self.handle_unload(&task, payload),
                TaskPayload::Inventory(request) => self.handle_inventory(request),
                TaskPayload::Picking(payload) => self.handle_picking(&task, payload),
            };

            if success {
                self.core.stats.record_task_completion(self.id, task.kind());
                task.mark_completed();
            }
            self.core.dispatcher.finish(&task);
        }
        debug!(loader = self.id, "loader stopped");
    }

    /// Unload protocol: pallet off the truck, receiving terminal, move,
    /// storage terminal, place.
    ///
    /// Transient failures retry; they escalate to task failure only when
    /// this worker is the last one still on the task.
    fn handle_unload(&self, task: &Arc<Task>, payload: &UnloadPayload) -> bool {
        loop {
            let Some(pallet) = payload.next_pallet() else {
                return true;
            };
            self.operation_delay(); // lift the pallet off the truck

            if !self.core.receiving_terminals.acquire(self.core.acquire_timeout()) {
                if task.is_last_worker() {
                    warn!(loader = self.id, task = task.id(), "receiving terminal timeout");
                    return false;
                }
                continue;
            }
            self.operation_delay(); // scan at the terminal
            self.core.receiving_terminals.release();

            // Move to the storage zone; a failed carry is retried while
            // other workers remain on the task.
            loop {
                self.operation_delay();
                if self.move_succeeds() {
                    break;
                }
                if task.is_last_worker() {
                    return false;
                }
            }

            if !self.core.storage_terminals.acquire(self.core.acquire_timeout()) {
                // Pallet is lost to this cycle; accepted.
                continue;
            }
            let address = self.core.storage.place_pallet(pallet);
            trace!(loader = self.id, dock = payload.dock_id, %address, "pallet stored");
            self.operation_delay();
            self.core.storage_terminals.release();
        }
    }

    /// Inventory protocol: hold one storage terminal, snapshot each category.
    fn handle_inventory(&self, request: &InventoryRequest) -> bool {
        if !self.core.storage_terminals.acquire(self.core.acquire_timeout()) {
            return false;
        }
        for category in &request.categories {
            let records = self.core.storage.records_for_category(*category);
            trace!(loader = self.id, %category, records = records.len(), "audited");
            self.operation_delay();
        }
        self.core.storage_terminals.release();
        true
    }

    /// Picking protocol: reserve a workstation, debit storage in
    /// workstation-sized chunks, then ship.
    fn handle_picking(&self, task: &Arc<Task>, payload: &PickingPayload) -> bool {
        let workstation = loop {
            match self.core.packing.reserve(self.core.acquire_timeout()) {
                Some(id) => break id,
                None => {
                    if task.is_last_worker() {
                        warn!(loader = self.id, order = payload.order_id, "no workstation");
                        return false;
                    }
                }
            }
        };

        self.core.stats.update_order_state(payload.order_id, OrderState::Active);
        let info = self.core.packing.info(workstation);
        self.operation_delay(); // set up the workstation

        let mut all_fulfilled = true;
        loop {
            // Another worker may have found storage empty already.
            if payload.unfulfillable.load(std::sync::atomic::Ordering::Acquire) {
                all_fulfilled = false;
                break;
            }
            let claim = {
                let mut remaining = payload.remaining.lock();
                remaining.iter_mut().find(|(_, quantity)| **quantity > 0).map(
                    |(category, quantity)| {
                        let chunk = (*quantity).min(info.dismantle_slots);
                        *quantity -= chunk;
                        (*category, chunk)
                    },
                )
            };
            let Some((category, chunk)) = claim else {
                break;
            };

            let taken = self.core.storage.take_from_storage(category, chunk);
            if taken == 0 {
                // Storage is out of this category entirely; restore the
                // chunk and give up on full fulfilment.
                payload.unfulfillable.store(true, std::sync::atomic::Ordering::Release);
                *payload.remaining.lock().entry(category).or_insert(0) += chunk;
                all_fulfilled = false;
                break;
            }
            if taken < chunk {
                *payload.remaining.lock().entry(category).or_insert(0) += chunk - taken;
            }
            self.operation_delay();
        }

        let mut shipped = false;
        if all_fulfilled {
            for attempt in 0..SHIP_ATTEMPTS {
                if self.core.shipping.try_load(
                    &payload.destination_city,
                    1,
                    self.core.acquire_timeout(),
                ) {
                    shipped = true;
                    break;
                }
                trace!(
                    loader = self.id,
                    order = payload.order_id,
                    attempt,
                    "no dock for order yet"
                );
                self.operation_delay();
            }
        }

        self.core.packing.release(workstation);

        if !shipped {
            self.core.stats.update_order_state(payload.order_id, OrderState::Partial);
            return false;
        }

        if payload.try_record_completion() {
            self.core.stats.update_order_state(payload.order_id, OrderState::Complete);
            self.core.stats.record_order_completion(payload.created_at.elapsed());
            debug!(loader = self.id, order = payload.order_id, "order shipped");
        }
        true
    }

    /// Simulated carry with an 85% success draw.
    fn move_succeeds(&self) -> bool {
        rand::thread_rng().gen_range(0..100) >= 15
    }

    fn operation_delay(&self) {
        std::thread::sleep(self.core.operation_delay());
    }
}
