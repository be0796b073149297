//! Warehouse coordinator: owns every zone, the dispatcher, the worker and
//! manager threads, and the statistics registry.

use crate::config::SimulationConfig;
use crate::dispatch::{CompletionHandle, Task, TaskDispatcher};
use crate::domain::Order;
use crate::error::{Error, Result};
use crate::loader::Loader;
use crate::manager::Manager;
use crate::stats::{StatsRegistry, WarehouseReports};
use crate::zones::{PackingZone, ShippingZone, StorageZone, TimedPool, WorkstationInfo};
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info};

/// Shared state every loader and manager thread holds an `Arc` to.
#[derive(Debug)]
pub(crate) struct Core {
    pub(crate) config: SimulationConfig,
    pub(crate) dispatcher: TaskDispatcher,
    pub(crate) storage: StorageZone,
    pub(crate) packing: PackingZone,
    pub(crate) shipping: ShippingZone,
    pub(crate) receiving_terminals: TimedPool,
    pub(crate) storage_terminals: TimedPool,
    pub(crate) packing_terminals: TimedPool,
    pub(crate) shipping_terminals: TimedPool,
    pub(crate) stats: StatsRegistry,
    running: AtomicBool,
    next_task_id: AtomicU64,
    next_order_id: AtomicU64,
    next_truck_id: AtomicU64,
}

impl Core {
    fn new(config: SimulationConfig) -> Self {
        let mut rng = rand::thread_rng();
        let stations = (0..config.packing_stations)
            .map(|_| WorkstationInfo {
                dismantle_slots: rng.gen_range(1..=3),
                packing_slots: rng.gen_range(2..=4),
            })
            .collect();

        Self {
            dispatcher: TaskDispatcher::new(),
            storage: StorageZone::new(
                config.storage_shelves,
                config.storage_layers,
                config.storage_spots_per_layer,
            ),
            packing: PackingZone::new(stations),
            shipping: ShippingZone::new(),
            receiving_terminals: TimedPool::new(config.receiving_terminals, "receiving"),
            storage_terminals: TimedPool::new(config.storage_terminals, "storage"),
            packing_terminals: TimedPool::new(config.packing_terminals, "packing"),
            shipping_terminals: TimedPool::new(config.shipping_terminals, "shipping"),
            stats: StatsRegistry::new(),
            running: AtomicBool::new(false),
            next_task_id: AtomicU64::new(0),
            next_order_id: AtomicU64::new(0),
            next_truck_id: AtomicU64::new(0),
            config,
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Duration of one simulated physical operation.
    pub(crate) fn operation_delay(&self) -> Duration {
        let millis = if self.config.fast_mode {
            rand::thread_rng().gen_range(1..=5)
        } else {
            rand::thread_rng().gen_range(1000..=5000)
        };
        Duration::from_millis(millis)
    }

    /// Timeout applied to every pool, workstation, and dock acquisition.
    pub(crate) fn acquire_timeout(&self) -> Duration {
        if self.config.fast_mode {
            Duration::from_millis(5)
        } else {
            Duration::from_secs(5)
        }
    }

    /// Pause between shipping-truck arrivals.
    pub(crate) fn shipping_interval(&self) -> Duration {
        if self.config.fast_mode {
            Duration::from_secs(1)
        } else {
            Duration::from_secs(5)
        }
    }

    pub(crate) fn next_task_id(&self) -> u64 {
        self.next_task_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn next_order_id(&self) -> u64 {
        self.next_order_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn next_truck_id(&self) -> u64 {
        self.next_truck_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// The warehouse: construct, [`start`](Self::start), let it run,
/// [`stop`](Self::stop), [`wait`](Self::wait), then
/// [`build_reports`](Self::build_reports).
///
/// `start` is idempotent within a process; a stopped warehouse cannot be
/// restarted. `stop` followed by `wait` always completes: workers observe the
/// dispatcher shutdown on their next acquire and in-flight operations run to
/// completion.
#[derive(Debug)]
pub struct Warehouse {
    core: Arc<Core>,
    handles: Vec<JoinHandle<()>>,
    started: bool,
    stopped: bool,
}

impl Warehouse {
    /// Validate `config` and build every zone and pool.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] when a parameter is out of range.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            core: Arc::new(Core::new(config)),
            handles: Vec::new(),
            started: false,
            stopped: false,
        })
    }

    /// Spawn the configured loader and manager threads.
    ///
    /// # Errors
    /// Returns [`Error::Restarted`] after a stop, or [`Error::Spawn`] if the
    /// OS refuses a thread.
    pub fn start(&mut self) -> Result<()> {
        if self.stopped {
            return Err(Error::Restarted);
        }
        if self.started {
            return Ok(());
        }
        self.started = true;
        self.core.running.store(true, Ordering::Release);

        let loader_count = self.core.config.loader_count;
        let manager_count = self.core.config.manager_count;
        for id in 0..loader_count {
            let loader = Loader::new(id as u32, Arc::clone(&self.core));
            let handle = std::thread::Builder::new()
                .name(format!("loader-{id}"))
                .spawn(move || loader.run())
                .map_err(|source| self.abort_start(format!("loader-{id}"), source))?;
            self.handles.push(handle);
        }
        for id in 0..manager_count {
            let mut manager = Manager::new(id as u32, Arc::clone(&self.core));
            let handle = std::thread::Builder::new()
                .name(format!("manager-{id}"))
                .spawn(move || manager.run())
                .map_err(|source| self.abort_start(format!("manager-{id}"), source))?;
            self.handles.push(handle);
        }

        info!(loaders = loader_count, managers = manager_count, "warehouse started");
        Ok(())
    }

    fn abort_start(&self, name: String, source: std::io::Error) -> Error {
        self.core.running.store(false, Ordering::Release);
        self.core.dispatcher.shutdown();
        Error::Spawn { name, source }
    }

    /// Signal every thread to stop. Safe to call more than once.
    pub fn stop(&mut self) {
        self.stopped = true;
        self.core.running.store(false, Ordering::Release);
        self.core.dispatcher.shutdown();
        debug!("warehouse stop signalled");
    }

    /// Join every spawned thread.
    pub fn wait(&mut self) {
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
        info!("warehouse threads joined");
    }

    /// Enqueue `task` and return a handle callers may block on until some
    /// worker completes it.
    pub fn submit_task(&self, task: Arc<Task>) -> Arc<CompletionHandle> {
        let completion = task.completion();
        self.core.dispatcher.enqueue(task);
        completion
    }

    /// Register a fresh order with the statistics registry.
    pub fn register_order(&self, order: &Order) {
        self.core.stats.register_order(order.id);
    }

    /// Consistent snapshot of the order and loader reports.
    #[must_use]
    pub fn build_reports(&self) -> WarehouseReports {
        self.core.stats.build_reports(
            self.core.config.loader_count,
            Duration::from_secs(self.core.config.simulation_seconds),
        )
    }

    /// Simulation configuration.
    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.core.config
    }

    /// Task dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &TaskDispatcher {
        &self.core.dispatcher
    }

    /// Storage zone.
    #[must_use]
    pub fn storage(&self) -> &StorageZone {
        &self.core.storage
    }

    /// Packing zone.
    #[must_use]
    pub fn packing(&self) -> &PackingZone {
        &self.core.packing
    }

    /// Shipping zone.
    #[must_use]
    pub fn shipping(&self) -> &ShippingZone {
        &self.core.shipping
    }

    /// Statistics registry.
    #[must_use]
    pub fn stats(&self) -> &StatsRegistry {
        &self.core.stats
    }

    /// Mint a task id from the warehouse-wide counter.
    #[must_use]
    pub fn next_task_id(&self) -> u64 {
        self.core.next_task_id()
    }

    /// Mint an order id from the warehouse-wide counter.
    #[must_use]
    pub fn next_order_id(&self) -> u64 {
        self.core.next_order_id()
    }
}

impl Drop for Warehouse {
    fn drop(&mut self) {
        self.stop();
        self.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> SimulationConfig {
        SimulationConfig {
            fast_mode: true,
            loader_count: 2,
            manager_count: 1,
            simulation_seconds: 1,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn start_is_idempotent_but_restart_is_not() {
        let mut warehouse = Warehouse::new(fast_config()).expect("config valid");
        warehouse.start().expect("first start");
        warehouse.start().expect("second start is a no-op");
        warehouse.stop();
        warehouse.wait();
        assert!(matches!(warehouse.start(), Err(Error::Restarted)));
    }

    #[test]
    fn stop_and_wait_complete_with_queued_tasks() {
        let mut warehouse = Warehouse::new(fast_config()).expect("config valid");
        warehouse.start().expect("start");
        std::thread::sleep(Duration::from_millis(100));
        warehouse.stop();
        warehouse.wait();
        // Reports are safe at any time, including after shutdown.
        let _ = warehouse.build_reports();
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SimulationConfig { loader_count: 0, ..SimulationConfig::default() };
        assert!(Warehouse::new(config).is_err());
    }
}
