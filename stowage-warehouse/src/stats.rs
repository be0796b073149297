//! Statistics registry: order states, completion histogram, loader stats.
//!
//! One mutex guards everything so a report is always a consistent snapshot.
//! State transitions decrement the prior counter and increment the new one
//! in a single critical section, keeping the counter sum equal to the number
//! of registered orders. The lock is never held across a sleep.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use crate::dispatch::TaskKind;

/// Lifecycle state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OrderState {
    /// Registered, not yet queued for picking.
    Waiting,
    /// A picking task has been published.
    Queued,
    /// Some worker reserved a workstation for it.
    Active,
    /// Picked but never shipped in full.
    Partial,
    /// Fully shipped.
    Complete,
}

/// Counters per order state; their sum tracks the registered-order count.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct OrderStateCounters {
    /// Orders in [`OrderState::Waiting`].
    pub waiting: u64,
    /// Orders in [`OrderState::Queued`].
    pub picking_queued: u64,
    /// Orders in [`OrderState::Active`].
    pub actively_picking: u64,
    /// Orders in [`OrderState::Partial`].
    pub partially_shipped: u64,
    /// Orders in [`OrderState::Complete`].
    pub completed: u64,
}

impl OrderStateCounters {
    fn slot(&mut self, state: OrderState) -> &mut u64 {
        match state {
            OrderState::Waiting => &mut self.waiting,
            OrderState::Queued => &mut self.picking_queued,
            OrderState::Active => &mut self.actively_picking,
            OrderState::Partial => &mut self.partially_shipped,
            OrderState::Complete => &mut self.completed,
        }
    }

    /// Sum of every counter.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.waiting
            + self.picking_queued
            + self.actively_picking
            + self.partially_shipped
            + self.completed
    }
}

/// One 1-second bucket of the order completion histogram.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct HistogramBucket {
    /// Inclusive bucket start.
    pub start: Duration,
    /// Exclusive bucket end.
    pub end: Duration,
    /// Completions falling into the bucket.
    pub count: u64,
}

/// Per-loader counters, written under the statistics lock.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoaderStats {
    /// Loader id.
    pub loader_id: u32,
    /// Completed tasks per kind label.
    pub tasks_completed: BTreeMap<&'static str, u64>,
    /// Accumulated idle time between tasks.
    pub rest_time: Duration,
}

/// Order-side report body.
#[derive(Debug, Clone, Serialize)]
pub struct OrderReport {
    /// Final state counters.
    pub states: OrderStateCounters,
    /// Completion-duration histogram.
    pub completion_histogram: Vec<HistogramBucket>,
}

/// Loader-side report body.
#[derive(Debug, Clone, Serialize)]
pub struct LoaderReport {
    /// Per-loader counters.
    pub stats: Vec<LoaderStats>,
    /// Total rest time over the total thread-time budget.
    pub rest_ratio: f64,
}

/// Both reports, produced by the coordinator.
#[derive(Debug, Clone, Serialize)]
pub struct WarehouseReports {
    /// Order statistics.
    pub orders: OrderReport,
    /// Loader statistics.
    pub loaders: LoaderReport,
}

const BUCKET: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
struct StatsState {
    counters: OrderStateCounters,
    order_states: HashMap<u64, OrderState>,
    histogram: Vec<HistogramBucket>,
    loaders: BTreeMap<u32, LoaderStats>,
}

/// Shared statistics registry.
#[derive(Debug, Default)]
pub struct StatsRegistry {
    state: Mutex<StatsState>,
}

impl StatsRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh order in the waiting state.
    pub fn register_order(&self, order_id: u64) {
        let mut state = self.state.lock();
        state.counters.waiting += 1;
        state.order_states.insert(order_id, OrderState::Waiting);
    }

    /// Move an order to `next`, adjusting both counters atomically.
    ///
    /// `Complete` is terminal; `Partial` only advances to `Complete`. Late
    /// transitions from parallel pickers are dropped so a shipped order can
    /// never be counted as anything else again.
    pub fn update_order_state(&self, order_id: u64, next: OrderState) {
        let mut state = self.state.lock();
        match state.order_states.get(&order_id) {
            Some(OrderState::Complete) => return,
            Some(OrderState::Partial) if next != OrderState::Complete => return,
            _ => {}
        }
        if let Some(previous) = state.order_states.insert(order_id, next) {
            let slot = state.counters.slot(previous);
            *slot = slot.saturating_sub(1);
        }
        *state.counters.slot(next) += 1;
    }

    /// Record a completed order's elapsed duration into the histogram.
    pub fn record_order_completion(&self, duration: Duration) {
        let mut state = self.state.lock();
        let index = usize::try_from(duration.as_millis() / BUCKET.as_millis()).unwrap_or(0);
        while state.histogram.len() <= index {
            let start = BUCKET * u32::try_from(state.histogram.len()).unwrap_or(u32::MAX);
            state.histogram.push(HistogramBucket { start, end: start + BUCKET, count: 0 });
        }
        state.histogram[index].count += 1;
    }

    /// Add idle time to a loader's rest total.
    pub fn record_loader_rest(&self, loader_id: u32, rest: Duration) {
        let mut state = self.state.lock();
        let entry = state.loaders.entry(loader_id).or_default();
        entry.loader_id = loader_id;
        entry.rest_time += rest;
    }

    /// Count one completed task of `kind` for a loader.
    pub fn record_task_completion(&self, loader_id: u32, kind: TaskKind) {
        let mut state = self.state.lock();
        let entry = state.loaders.entry(loader_id).or_default();
        entry.loader_id = loader_id;
        *entry.tasks_completed.entry(kind.label()).or_insert(0) += 1;
    }

    /// Consistent snapshot of both reports.
    #[must_use]
    pub fn build_reports(&self, loader_count: usize, simulation: Duration) -> WarehouseReports {
        let state = self.state.lock();
        let stats: Vec<LoaderStats> = state.loaders.values().cloned().collect();
        let total_rest: Duration = stats.iter().map(|loader| loader.rest_time).sum();
        let budget = simulation.as_secs_f64() * loader_count as f64;
        let rest_ratio = if budget > 0.0 { total_rest.as_secs_f64() / budget } else { 0.0 };

        WarehouseReports {
            orders: OrderReport {
                states: state.counters,
                completion_histogram: state.histogram.clone(),
            },
            loaders: LoaderReport { stats, rest_ratio },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_transitions_preserve_counter_sum() {
        let stats = StatsRegistry::new();
        for id in 0..5 {
            stats.register_order(id);
        }
        stats.update_order_state(0, OrderState::Queued);
        stats.update_order_state(0, OrderState::Active);
        stats.update_order_state(1, OrderState::Queued);
        stats.update_order_state(0, OrderState::Complete);
        stats.update_order_state(1, OrderState::Partial);

        let reports = stats.build_reports(1, Duration::from_secs(1));
        assert_eq!(reports.orders.states.total(), 5);
        assert_eq!(reports.orders.states.completed, 1);
        assert_eq!(reports.orders.states.partially_shipped, 1);
        assert_eq!(reports.orders.states.waiting, 3);
    }

    #[test]
    fn complete_is_terminal() {
        let stats = StatsRegistry::new();
        stats.register_order(1);
        stats.update_order_state(1, OrderState::Queued);
        stats.update_order_state(1, OrderState::Complete);
        // Late transitions from a parallel picker are dropped.
        stats.update_order_state(1, OrderState::Active);
        stats.update_order_state(1, OrderState::Partial);

        let reports = stats.build_reports(1, Duration::from_secs(1));
        assert_eq!(reports.orders.states.completed, 1);
        assert_eq!(reports.orders.states.total(), 1);
    }

    #[test]
    fn partial_advances_only_to_complete() {
        let stats = StatsRegistry::new();
        stats.register_order(2);
        stats.update_order_state(2, OrderState::Partial);
        stats.update_order_state(2, OrderState::Active);
        assert_eq!(stats.build_reports(1, Duration::from_secs(1)).orders.states.partially_shipped, 1);

        stats.update_order_state(2, OrderState::Complete);
        let reports = stats.build_reports(1, Duration::from_secs(1));
        assert_eq!(reports.orders.states.completed, 1);
        assert_eq!(reports.orders.states.partially_shipped, 0);
    }

    #[test]
    fn histogram_buckets_by_second() {
        let stats = StatsRegistry::new();
        stats.record_order_completion(Duration::from_millis(300));
        stats.record_order_completion(Duration::from_millis(2500));
        stats.record_order_completion(Duration::from_millis(2999));

        let reports = stats.build_reports(1, Duration::from_secs(1));
        let histogram = &reports.orders.completion_histogram;
        assert_eq!(histogram.len(), 3);
        assert_eq!(histogram[0].count, 1);
        assert_eq!(histogram[1].count, 0);
        assert_eq!(histogram[2].count, 2);
        assert_eq!(histogram[2].start, Duration::from_secs(2));
    }

    #[test]
    fn loader_counters_accumulate() {
        let stats = StatsRegistry::new();
        stats.record_loader_rest(3, Duration::from_millis(120));
        stats.record_loader_rest(3, Duration::from_millis(80));
        stats.record_task_completion(3, TaskKind::Picking);
        stats.record_task_completion(3, TaskKind::Picking);
        stats.record_task_completion(3, TaskKind::UnloadTruck);

        let reports = stats.build_reports(2, Duration::from_secs(10));
        let loader = &reports.loaders.stats[0];
        assert_eq!(loader.loader_id, 3);
        assert_eq!(loader.rest_time, Duration::from_millis(200));
        assert_eq!(loader.tasks_completed["picking"], 2);
        assert_eq!(loader.tasks_completed["unload"], 1);
        assert!((reports.loaders.rest_ratio - 0.01).abs() < 1e-9);
    }
}
