//! End-to-end simulator scenarios driven through the public coordinator API.
//!
//! These tests run the warehouse without manager threads and submit tasks
//! directly, so assertions about individual orders stay deterministic.

use std::sync::Arc;
use std::time::{Duration, Instant};

use stowage_warehouse::config::SimulationConfig;
use stowage_warehouse::dispatch::Task;
use stowage_warehouse::domain::{CargoType, CategoryKey, Order, Pallet, Truck};
use stowage_warehouse::stats::OrderState;
use stowage_warehouse::Warehouse;

fn driven_config(loaders: usize) -> SimulationConfig {
    SimulationConfig {
        fast_mode: true,
        loader_count: loaders,
        manager_count: 0,
        packing_stations: 1,
        simulation_seconds: 5,
        ..SimulationConfig::default()
    }
}

fn pallet_of(cargo: CargoType, category: u32, quantity: u32) -> Pallet {
    let mut pallet = Pallet::new(cargo);
    pallet.quantities.insert(category, quantity);
    pallet
}

/// Picking under contention: two loaders, one workstation, one dock, one
/// order covered by stock. Exactly one completion must be recorded and the
/// order duration must land in the histogram.
#[test]
fn picking_under_contention_records_one_completion() {
    let mut warehouse = Warehouse::new(driven_config(2)).expect("config");
    let category = CategoryKey::new(CargoType::Light, 0);
    warehouse.storage().place_pallet(pallet_of(CargoType::Light, 0, 3));
    warehouse.shipping().register_arrival("Valencia", 10);
    warehouse.start().expect("start");

    let order = Order {
        id: warehouse.next_order_id(),
        destination_city: "Valencia".into(),
        required: [(category, 3)].into(),
        created_at: Instant::now(),
    };
    warehouse.register_order(&order);
    warehouse.stats().update_order_state(order.id, OrderState::Queued);

    let task = Task::picking(warehouse.next_task_id(), &order, 2);
    let done = warehouse.submit_task(task);
    assert!(done.wait_for(Duration::from_secs(20)), "picking task must complete");

    warehouse.stop();
    warehouse.wait();

    let reports = warehouse.build_reports();
    assert_eq!(reports.orders.states.completed, 1);
    assert_eq!(reports.orders.states.total(), 1);
    let histogram_total: u64 =
        reports.orders.completion_histogram.iter().map(|bucket| bucket.count).sum();
    assert_eq!(histogram_total, 1, "completion recorded exactly once");

    // The three requested units are gone from storage.
    assert_eq!(warehouse.storage().take_from_storage(category, 1), 0);
}

/// Storage overflow: filling the address space degrades to synthetic
/// OVERFLOW addresses and the overflow pallet stays debitable.
#[test]
fn overflow_pallets_keep_participating() {
    let config = SimulationConfig {
        storage_shelves: 10,
        storage_layers: 1,
        storage_spots_per_layer: 1,
        manager_count: 0,
        ..SimulationConfig::default()
    };
    let warehouse = Warehouse::new(config).expect("config");
    let category = CategoryKey::new(CargoType::Medium, 1);

    for _ in 0..10 {
        let address = warehouse.storage().place_pallet(pallet_of(CargoType::Medium, 1, 2));
        assert!(address.starts_with('S'));
    }
    let overflow = warehouse.storage().place_pallet(pallet_of(CargoType::Medium, 1, 2));
    assert!(overflow.starts_with("OVERFLOW-"), "got {overflow}");

    assert_eq!(warehouse.storage().take_from_storage(category, 22), 22);
}

/// Dispatcher fairness: one unload task capped at two workers, five loaders.
/// The active count must never exceed the cap while the task runs.
#[test]
fn unload_cap_holds_under_five_loaders() {
    let mut warehouse = Warehouse::new(driven_config(5)).expect("config");
    warehouse.start().expect("start");

    let truck = Truck {
        id: 0,
        city: "Hamburg".into(),
        pallets: (0..12).map(|_| pallet_of(CargoType::Heavy, 0, 2)).collect(),
        total_slots: 12,
    };
    let task = Task::unload_with_cap(warehouse.next_task_id(), truck, 0, 2);
    let observed = Arc::clone(&task);
    let done = warehouse.submit_task(task);

    let mut max_active = 0;
    while !done.wait_for(Duration::from_millis(2)) {
        max_active = max_active.max(observed.active_workers());
        assert!(observed.active_workers() <= 2, "parallel cap exceeded");
    }
    assert!(max_active <= 2);

    warehouse.stop();
    warehouse.wait();

    // Pallets reached storage; some loss to timed-out cycles is accepted.
    let stored = warehouse
        .storage()
        .totals_by_category()
        .get(&CategoryKey::new(CargoType::Heavy, 0))
        .copied()
        .unwrap_or(0);
    assert!(stored > 0 && stored <= 24, "stored {stored} of 24 units");
}

/// A short full simulation with managers: reports stay consistent.
#[test]
fn full_simulation_reports_are_consistent() {
    let config = SimulationConfig {
        fast_mode: true,
        loader_count: 4,
        manager_count: 2,
        simulation_seconds: 2,
        ..SimulationConfig::default()
    };
    let mut warehouse = Warehouse::new(config).expect("config");
    warehouse.start().expect("start");
    std::thread::sleep(Duration::from_secs(2));
    warehouse.stop();
    warehouse.wait();

    let reports = warehouse.build_reports();
    let states = reports.orders.states;
    let histogram_total: u64 =
        reports.orders.completion_histogram.iter().map(|bucket| bucket.count).sum();
    assert_eq!(histogram_total, states.completed, "every completion is bucketed");
    assert!(reports.loaders.rest_ratio >= 0.0);
    for dock in warehouse.shipping().docks_snapshot() {
        assert!(dock.occupied <= dock.slots);
    }
}
