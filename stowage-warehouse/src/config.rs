//! Simulation configuration and command-line overrides.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Tunable parameters for one simulation run.
///
/// Defaults match a mid-size warehouse; the CLI overrides the handful of
/// values operators actually vary between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Operation delays in milliseconds instead of seconds.
    pub fast_mode: bool,
    /// Number of loader (worker) threads.
    pub loader_count: usize,
    /// Number of manager (producer) threads.
    pub manager_count: usize,
    /// Wall-clock duration of the simulation in seconds.
    pub simulation_seconds: u64,
    /// Unload tasks generated per manager cycle.
    pub trucks_per_manager_cycle: usize,
    /// Receiving-terminal pool capacity.
    pub receiving_terminals: u32,
    /// Storage-terminal pool capacity.
    pub storage_terminals: u32,
    /// Packing-terminal pool capacity.
    pub packing_terminals: u32,
    /// Shipping-terminal pool capacity.
    pub shipping_terminals: u32,
    /// Number of packing workstations.
    pub packing_stations: usize,
    /// Storage shelves.
    pub storage_shelves: u32,
    /// Layers per shelf.
    pub storage_layers: u32,
    /// Pallet spots per layer.
    pub storage_spots_per_layer: u32,
    /// Base seed for the managers' per-thread generators.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            fast_mode: false,
            loader_count: 8,
            manager_count: 2,
            simulation_seconds: 20,
            trucks_per_manager_cycle: 1,
            receiving_terminals: 6,
            storage_terminals: 4,
            packing_terminals: 4,
            shipping_terminals: 6,
            packing_stations: 4,
            storage_shelves: 50,
            storage_layers: 6,
            storage_spots_per_layer: 10,
            seed: 0x5704_a6e5,
        }
    }
}

impl SimulationConfig {
    /// Validate parameter ranges.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if !(2..=1000).contains(&self.loader_count) {
            return Err(Error::InvalidConfig(format!(
                "loader_count must be in 2..=1000, got {}",
                self.loader_count
            )));
        }
        // Zero managers is allowed: such a warehouse is driven purely by
        // externally submitted tasks.
        if self.manager_count > 20 {
            return Err(Error::InvalidConfig(format!(
                "manager_count must be at most 20, got {}",
                self.manager_count
            )));
        }
        if self.simulation_seconds == 0 {
            return Err(Error::InvalidConfig("simulation_seconds must be positive".into()));
        }
        if !(10..=500).contains(&self.storage_shelves) {
            return Err(Error::InvalidConfig(format!(
                "storage_shelves must be in 10..=500, got {}",
                self.storage_shelves
            )));
        }
        if !(1..=6).contains(&self.storage_layers) {
            return Err(Error::InvalidConfig(format!(
                "storage_layers must be in 1..=6, got {}",
                self.storage_layers
            )));
        }
        if self.packing_stations == 0 || self.storage_spots_per_layer == 0 {
            return Err(Error::InvalidConfig(
                "packing_stations and storage_spots_per_layer must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Command-line arguments accepted by the simulator binary.
#[derive(Debug, clap::Parser)]
#[command(name = "stowage-warehouse", about = "Multi-zone warehouse simulator")]
pub struct Cli {
    /// Run with millisecond-scale operation delays.
    #[arg(long)]
    pub fast: bool,
    /// Simulation duration in seconds.
    #[arg(long)]
    pub duration: Option<u64>,
    /// Loader thread count.
    #[arg(long)]
    pub loaders: Option<usize>,
    /// Manager thread count.
    #[arg(long)]
    pub managers: Option<usize>,
}

impl Cli {
    /// Fold the CLI overrides into a default configuration.
    #[must_use]
    pub fn into_config(self) -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.fast_mode = self.fast;
        if let Some(duration) = self.duration {
            config.simulation_seconds = duration;
        }
        if let Some(loaders) = self.loaders {
            config.loader_count = loaders;
        }
        if let Some(managers) = self.managers {
            config.manager_count = managers;
        }
        config
    }
}
