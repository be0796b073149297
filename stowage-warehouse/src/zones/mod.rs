//! Warehouse zones: bounded terminal pools and the storage, packing, and
//! shipping areas loaders operate in.

pub mod packing;
pub mod pool;
pub mod shipping;
pub mod storage;

pub use packing::{PackingZone, WorkstationInfo};
pub use pool::TimedPool;
pub use shipping::{DockInfo, ShippingZone};
pub use storage::{StorageRecord, StorageZone};
