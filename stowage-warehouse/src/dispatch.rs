//! Task dispatcher: a FIFO queue of open tasks with per-task parallelism caps.
//!
//! Loader threads block in [`TaskDispatcher::acquire`] until a task with
//! spare worker capacity exists or shutdown is signalled. A completed task
//! stays in the queue until its last active worker calls
//! [`TaskDispatcher::finish`], so observers can still poll completion.

use crate::domain::{CategoryKey, InventoryRequest, Order, Pallet, Truck};
use parking_lot::{Condvar, Mutex};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Kind of work a task represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Move every pallet of a truck into storage.
    UnloadTruck,
    /// Count stock for a set of categories.
    InventoryAudit,
    /// Pick an order from storage and load it onto a truck.
    Picking,
}

impl TaskKind {
    /// Stable label used in reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::UnloadTruck => "unload",
            Self::InventoryAudit => "inventory",
            Self::Picking => "picking",
        }
    }
}

/// One-shot completion signal shared between workers and observers.
///
/// Fulfilment is idempotent: the first `notify` wins and later calls are
/// no-ops, so several workers finishing the same task race harmlessly.
#[derive(Debug, Default)]
pub struct CompletionHandle {
    done: Mutex<bool>,
    cv: Condvar,
}

impl CompletionHandle {
    /// Mark the handle fulfilled and wake all waiters.
    pub fn notify(&self) {
        let mut done = self.done.lock();
        if !*done {
            *done = true;
            self.cv.notify_all();
        }
    }

    /// True once `notify` has been called.
    pub fn is_notified(&self) -> bool {
        *self.done.lock()
    }

    /// Block until the handle is fulfilled.
    pub fn wait(&self) {
        let mut done = self.done.lock();
        while !*done {
            self.cv.wait(&mut done);
        }
    }

    /// Block up to `timeout`; returns whether the handle was fulfilled.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        let mut done = self.done.lock();
        while !*done {
            if self.cv.wait_until(&mut done, deadline).timed_out() {
                return *done;
            }
        }
        true
    }
}

/// Shared progress of an unload task: the truck's remaining pallets.
///
/// Workers pop pallets under the mutex; the pallet moves out of the truck by
/// value and into storage on success.
#[derive(Debug)]
pub struct UnloadPayload {
    /// Truck being unloaded, behind the shared cursor lock.
    pub truck: Mutex<Truck>,
    /// Dock the truck parked at.
    pub dock_id: u32,
}

impl UnloadPayload {
    /// Take the next pallet off the truck, if any remain.
    pub fn next_pallet(&self) -> Option<Pallet> {
        self.truck.lock().pallets.pop()
    }
}

/// Shared progress of a picking task.
#[derive(Debug)]
pub struct PickingPayload {
    /// Order id.
    pub order_id: u64,
    /// Destination city of the order.
    pub destination_city: String,
    /// Creation instant of the order.
    pub created_at: std::time::Instant,
    /// Units still to pick, per category.
    pub remaining: Mutex<BTreeMap<CategoryKey, u32>>,
    /// Set when storage could not supply a category at all.
    pub unfulfillable: AtomicBool,
    /// One-shot flag so exactly one worker records order completion.
    completion_recorded: AtomicBool,
}

impl PickingPayload {
    fn new(order: &Order) -> Self {
        Self {
            order_id: order.id,
            destination_city: order.destination_city.clone(),
            created_at: order.created_at,
            remaining: Mutex::new(order.required.clone()),
            unfulfillable: AtomicBool::new(false),
            completion_recorded: AtomicBool::new(false),
        }
    }

    /// Claim the right to record completion; only the first caller wins.
    pub fn try_record_completion(&self) -> bool {
        !self.completion_recorded.swap(true, Ordering::AcqRel)
    }
}

/// Kind-specific task state.
#[derive(Debug)]
pub enum TaskPayload {
    /// Unload payload.
    Unload(UnloadPayload),
    /// Inventory payload.
    Inventory(InventoryRequest),
    /// Picking payload.
    Picking(PickingPayload),
}

/// A unit of coordinated work with a concurrency cap and completion handle.
#[derive(Debug)]
pub struct Task {
    id: u64,
    kind: TaskKind,
    max_parallel: u32,
    active: AtomicU32,
    completed: AtomicBool,
    done: Arc<CompletionHandle>,
    payload: TaskPayload,
}

impl Task {
    /// Build an unload task for `truck`; up to three loaders work it.
    #[must_use]
    pub fn unload(id: u64, truck: Truck, dock_id: u32) -> Arc<Self> {
        Self::unload_with_cap(id, truck, dock_id, 3)
    }

    /// Build an unload task with an explicit worker cap.
    #[must_use]
    pub fn unload_with_cap(id: u64, truck: Truck, dock_id: u32, max_parallel: u32) -> Arc<Self> {
        Arc::new(Self {
            id,
            kind: TaskKind::UnloadTruck,
            max_parallel,
            active: AtomicU32::new(0),
            completed: AtomicBool::new(false),
            done: Arc::new(CompletionHandle::default()),
            payload: TaskPayload::Unload(UnloadPayload { truck: Mutex::new(truck), dock_id }),
        })
    }

    /// Build a single-worker inventory task.
    #[must_use]
    pub fn inventory(id: u64, request: InventoryRequest) -> Arc<Self> {
        Arc::new(Self {
            id,
            kind: TaskKind::InventoryAudit,
            max_parallel: 1,
            active: AtomicU32::new(0),
            completed: AtomicBool::new(false),
            done: Arc::new(CompletionHandle::default()),
            payload: TaskPayload::Inventory(request),
        })
    }

    /// Build a picking task for `order` with the given worker cap.
    #[must_use]
    pub fn picking(id: u64, order: &Order, max_parallel: u32) -> Arc<Self> {
        Arc::new(Self {
            id,
            kind: TaskKind::Picking,
            max_parallel,
            active: AtomicU32::new(0),
            completed: AtomicBool::new(false),
            done: Arc::new(CompletionHandle::default()),
            payload: TaskPayload::Picking(PickingPayload::new(order)),
        })
    }

    /// Task id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Task kind.
    #[must_use]
    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Maximum concurrent workers allowed on this task.
    #[must_use]
    pub fn max_parallel(&self) -> u32 {
        self.max_parallel
    }

    /// Number of workers currently inside the task.
    #[must_use]
    pub fn active_workers(&self) -> u32 {
        self.active.load(Ordering::Acquire)
    }

    /// True when the calling worker is the only one still on the task.
    #[must_use]
    pub fn is_last_worker(&self) -> bool {
        self.active_workers() == 1
    }

    /// Kind-specific payload.
    #[must_use]
    pub fn payload(&self) -> &TaskPayload {
        &self.payload
    }

    /// Completion handle observers may wait on.
    #[must_use]
    pub fn completion(&self) -> Arc<CompletionHandle> {
        Arc::clone(&self.done)
    }

    /// Mark the task complete and fulfil its handle (idempotent).
    pub fn mark_completed(&self) {
        self.completed.store(true, Ordering::Release);
        self.done.notify();
    }

    /// True once some worker completed the task.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }
}

#[derive(Debug, Default)]
struct DispatchQueue {
    tasks: VecDeque<Arc<Task>>,
    stopping: bool,
}

impl DispatchQueue {
    /// Scan in insertion order for a task with spare capacity.
    fn claim_next(&mut self) -> Option<Arc<Task>> {
        for task in &self.tasks {
            if task.is_completed() {
                continue;
            }
            // The claim decision is made under the queue lock, so the cap
            // cannot be oversubscribed by concurrent acquirers.
            if task.active.load(Ordering::Acquire) < task.max_parallel {
                task.active.fetch_add(1, Ordering::AcqRel);
                return Some(Arc::clone(task));
            }
        }
        None
    }
}

/// Thread-safe FIFO dispatcher handing tasks to loader threads.
#[derive(Debug, Default)]
pub struct TaskDispatcher {
    queue: Mutex<DispatchQueue>,
    cv: Condvar,
}

impl TaskDispatcher {
    /// Create an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task and wake one waiting worker.
    pub fn enqueue(&self, task: Arc<Task>) {
        {
            let mut queue = self.queue.lock();
            queue.tasks.push_back(task);
        }
        self.cv.notify_one();
    }

    /// Block until a claimable task exists or shutdown is signalled.
    ///
    /// On success the task's active-worker count has already been
    /// incremented; the caller must pair this with exactly one
    /// [`finish`](Self::finish). Returns `None` after shutdown.
    pub fn acquire(&self) -> Option<Arc<Task>> {
        let mut queue = self.queue.lock();
        loop {
            if queue.stopping {
                return None;
            }
            if let Some(task) = queue.claim_next() {
                return Some(task);
            }
            self.cv.wait(&mut queue);
        }
    }

    /// Release a worker slot on `task`, removing it once completed and idle.
    pub fn finish(&self, task: &Arc<Task>) {
        {
            let mut queue = self.queue.lock();
            let remaining = task.active.fetch_sub(1, Ordering::AcqRel) - 1;
            if task.is_completed() {
                task.done.notify();
                if remaining == 0 {
                    queue.tasks.retain(|queued| !Arc::ptr_eq(queued, task));
                    debug!(task = task.id, kind = task.kind.label(), "task retired");
                }
            }
        }
        self.cv.notify_all();
    }

    /// Signal shutdown and wake every waiter.
    pub fn shutdown(&self) {
        {
            let mut queue = self.queue.lock();
            queue.stopping = true;
        }
        self.cv.notify_all();
    }

    /// Current task count; advisory, used for producer backpressure.
    #[must_use]
    pub fn size(&self) -> usize {
        self.queue.lock().tasks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{random_truck, CargoType};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::thread;
    use std::time::Duration;

    fn unload_task(id: u64) -> Arc<Task> {
        let mut rng = StdRng::seed_from_u64(id);
        Task::unload(id, random_truck(&mut rng, id), 0)
    }

    #[test]
    fn acquire_prefers_earliest_task_with_capacity() {
        let dispatcher = TaskDispatcher::new();
        let first = unload_task(1);
        let second = unload_task(2);
        dispatcher.enqueue(Arc::clone(&first));
        dispatcher.enqueue(Arc::clone(&second));

        let claimed = dispatcher.acquire().expect("task available");
        assert_eq!(claimed.id(), 1);

        // Saturate the first task; the next acquire falls through to the second.
        dispatcher.acquire().expect("slot 2");
        dispatcher.acquire().expect("slot 3");
        let claimed = dispatcher.acquire().expect("second task");
        assert_eq!(claimed.id(), 2);
        assert_eq!(first.active_workers(), first.max_parallel());
    }

    #[test]
    fn completed_task_is_removed_after_last_finish() {
        let dispatcher = TaskDispatcher::new();
        let task = unload_task(1);
        dispatcher.enqueue(Arc::clone(&task));

        let a = dispatcher.acquire().expect("first worker");
        let b = dispatcher.acquire().expect("second worker");
        a.mark_completed();
        dispatcher.finish(&a);
        assert_eq!(dispatcher.size(), 1, "task stays while workers remain");
        dispatcher.finish(&b);
        assert_eq!(dispatcher.size(), 0);
        assert!(task.completion().is_notified());
    }

    #[test]
    fn shutdown_unblocks_waiters() {
        let dispatcher = Arc::new(TaskDispatcher::new());
        let waiter = {
            let dispatcher = Arc::clone(&dispatcher);
            thread::spawn(move || dispatcher.acquire())
        };
        thread::sleep(Duration::from_millis(50));
        dispatcher.shutdown();
        assert!(waiter.join().expect("waiter thread").is_none());
    }

    #[test]
    fn parallel_cap_is_never_exceeded() {
        let dispatcher = Arc::new(TaskDispatcher::new());
        let task = unload_task(1);
        dispatcher.enqueue(Arc::clone(&task));

        let mut workers = Vec::new();
        for _ in 0..5 {
            let dispatcher = Arc::clone(&dispatcher);
            workers.push(thread::spawn(move || {
                dispatcher.acquire().map(|task| {
                    let active = task.active_workers();
                    assert!(active <= task.max_parallel());
                    thread::sleep(Duration::from_millis(20));
                    task.mark_completed();
                    dispatcher.finish(&task);
                })
            }));
        }
        // Three claims succeed immediately; two block until slots free up
        // (or until shutdown below). Either way the cap holds.
        thread::sleep(Duration::from_millis(100));
        dispatcher.shutdown();
        for worker in workers {
            worker.join().expect("worker thread");
        }
        assert!(task.active_workers() <= task.max_parallel());
    }

    #[test]
    fn completion_handle_is_idempotent() {
        let handle = CompletionHandle::default();
        assert!(!handle.is_notified());
        handle.notify();
        handle.notify();
        assert!(handle.is_notified());
        assert!(handle.wait_for(Duration::from_millis(1)));
    }

    #[test]
    fn picking_payload_records_completion_once() {
        let order = crate::domain::Order {
            id: 9,
            destination_city: "Antwerp".into(),
            required: [(crate::domain::CategoryKey::new(CargoType::Light, 0), 3)].into(),
            created_at: std::time::Instant::now(),
        };
        let payload = PickingPayload::new(&order);
        assert!(payload.try_record_completion());
        assert!(!payload.try_record_completion());
    }
}
