//! Manager producer thread: generates tasks and admits shipping trucks.

use crate::dispatch::Task;
use crate::domain::{
    random_inventory_request, random_order, random_truck, CITIES,
};
use crate::stats::OrderState;
use crate::warehouse::Core;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Dispatcher size above which no further picking tasks are produced.
const PICKING_BACKPRESSURE_LIMIT: usize = 200;

/// A single manager. Owns a seeded generator so truck, order, and audit
/// shapes are reproducible per thread.
#[derive(Debug)]
pub(crate) struct Manager {
    id: u32,
    core: Arc<Core>,
    rng: StdRng,
}

impl Manager {
    pub(crate) fn new(id: u32, core: Arc<Core>) -> Self {
        let rng = StdRng::seed_from_u64(core.config.seed.wrapping_add(u64::from(id)));
        Self { id, core, rng }
    }

    /// Main loop: produce tasks each cycle, admit trucks on the shipping
    /// interval, then rest one operation delay.
    pub(crate) fn run(&mut self) {
        let started = Instant::now();
        let half_duration =
            std::time::Duration::from_secs(self.core.config.simulation_seconds) / 2;
        let mut next_shipping = started;

        while self.core.is_running() {
            self.schedule_unloads();
            self.schedule_inventory();

            // Orders are produced only in the first half of the run and only
            // while the dispatcher backlog stays reasonable.
            if started.elapsed() < half_duration
                && self.core.dispatcher.size() < PICKING_BACKPRESSURE_LIMIT
            {
                self.schedule_picking();
            }

            let now = Instant::now();
            if now >= next_shipping {
                let city = CITIES[self.rng.gen_range(0..CITIES.len())];
                let slots = self.rng.gen_range(10..=100);
                self.core.shipping.register_arrival(city, slots);
                next_shipping = now + self.core.shipping_interval();
            }

            std::thread::sleep(self.core.operation_delay());
        }
        debug!(manager = self.id, "manager stopped");
    }

    /// One unload task per configured truck, three workers max each.
    fn schedule_unloads(&mut self) {
        for _ in 0..self.core.config.trucks_per_manager_cycle {
            let truck = random_truck(&mut self.rng, self.core.next_truck_id());
            let dock_id = self.rng.gen_range(0..self.core.config.receiving_terminals);
            let task = Task::unload(self.core.next_task_id(), truck, dock_id);
            self.core.dispatcher.enqueue(task);
        }
    }

    /// One single-worker inventory audit per cycle.
    fn schedule_inventory(&mut self) {
        let request = random_inventory_request(&mut self.rng, self.core.next_task_id());
        let task = Task::inventory(self.core.next_task_id(), request);
        self.core.dispatcher.enqueue(task);
    }

    /// Register a random order and publish its picking task.
    fn schedule_picking(&mut self) {
        let order = random_order(&mut self.rng, self.core.next_order_id());
        self.core.stats.register_order(order.id);
        self.core.stats.update_order_state(order.id, OrderState::Queued);

        let max_parallel = self.rng.gen_range(2..=4);
        let task = Task::picking(self.core.next_task_id(), &order, max_parallel);
        debug!(manager = self.id, order = order.id, max_parallel, "picking task published");
        self.core.dispatcher.enqueue(task);
    }
}
