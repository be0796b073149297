//! # Stowage Warehouse
//!
//! Multi-zone warehouse simulator built around a shared task dispatcher,
//! bounded resource pools, and zone-specific data stores.
//!
//! Loader threads consume tasks (truck unloading, inventory audits, order
//! picking) from a FIFO dispatcher that caps per-task parallelism. Manager
//! threads produce tasks and admit shipping trucks. A coordinator owns every
//! component and aggregates order and loader statistics into final reports.
//!
//! ## Example
//!
//! ```no_run
//! use stowage_warehouse::{SimulationConfig, Warehouse};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), stowage_warehouse::Error> {
//! let config = SimulationConfig { fast_mode: true, ..SimulationConfig::default() };
//! let mut warehouse = Warehouse::new(config)?;
//! warehouse.start()?;
//! std::thread::sleep(Duration::from_secs(2));
//! warehouse.stop();
//! warehouse.wait();
//! let reports = warehouse.build_reports();
//! println!("completed orders: {}", reports.orders.states.completed);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod loader;
pub mod manager;
pub mod stats;
pub mod warehouse;
pub mod zones;

pub use config::SimulationConfig;
pub use error::{Error, Result};
pub use warehouse::Warehouse;

/// Re-export of the types most callers need.
pub mod prelude {
    pub use crate::config::SimulationConfig;
    pub use crate::dispatch::{Task, TaskDispatcher, TaskKind};
    pub use crate::domain::{CargoType, CategoryKey, Order, Pallet, Truck};
    pub use crate::error::{Error, Result};
    pub use crate::stats::WarehouseReports;
    pub use crate::warehouse::Warehouse;
}
