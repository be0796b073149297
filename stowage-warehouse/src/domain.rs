//! Core warehouse entities: cargo, pallets, trucks, orders.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

/// Destination cities served by the warehouse.
pub const CITIES: [&str; 5] = ["Rotterdam", "Hamburg", "Antwerp", "Valencia", "Gdansk"];

/// Cargo weight class; decides how many units fit on one pallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CargoType {
    /// Small goods, 100 units per pallet.
    Light,
    /// Boxed goods, 30 units per pallet.
    Medium,
    /// Bulky goods, 4 units per pallet.
    Heavy,
}

impl CargoType {
    /// Per-pallet unit capacity for this class.
    #[must_use]
    pub const fn pallet_capacity(self) -> u32 {
        match self {
            Self::Light => 100,
            Self::Medium => 30,
            Self::Heavy => 4,
        }
    }

    /// Number of distinct categories stocked for this class.
    #[must_use]
    pub const fn category_count(self) -> u32 {
        match self {
            Self::Light | Self::Heavy => 3,
            Self::Medium => 2,
        }
    }
}

impl fmt::Display for CargoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Light => write!(f, "light"),
            Self::Medium => write!(f, "medium"),
            Self::Heavy => write!(f, "heavy"),
        }
    }
}

/// Stock-keeping bucket: a cargo type plus a category id.
///
/// Ordered by type first, then id, which gives deterministic iteration over
/// `BTreeMap<CategoryKey, _>` maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CategoryKey {
    /// Cargo weight class.
    pub cargo: CargoType,
    /// Category id within the class.
    pub category: u32,
}

impl CategoryKey {
    /// Build a key.
    #[must_use]
    pub const fn new(cargo: CargoType, category: u32) -> Self {
        Self { cargo, category }
    }
}

impl fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.cargo, self.category)
    }
}

/// A unit of goods with a type-specific capacity and per-category quantities.
#[derive(Debug, Clone)]
pub struct Pallet {
    /// Cargo class of everything on the pallet.
    pub cargo: CargoType,
    /// Unit capacity of the pallet.
    pub capacity: u32,
    /// Units per category currently on the pallet.
    pub quantities: BTreeMap<u32, u32>,
}

impl Pallet {
    /// Create an empty pallet of the given class.
    #[must_use]
    pub fn new(cargo: CargoType) -> Self {
        Self { cargo, capacity: cargo.pallet_capacity(), quantities: BTreeMap::new() }
    }

    /// Total units across all categories.
    #[must_use]
    pub fn total_units(&self) -> u32 {
        self.quantities.values().sum()
    }

    /// True when no category holds any units.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.quantities.values().all(|&qty| qty == 0)
    }
}

/// An arriving truck carrying pallets to unload.
#[derive(Debug)]
pub struct Truck {
    /// Warehouse-wide truck id.
    pub id: u64,
    /// Origin/destination city.
    pub city: String,
    /// Cargo still on board.
    pub pallets: Vec<Pallet>,
    /// Pallet slot count of the vehicle.
    pub total_slots: usize,
}

/// A customer order to be picked and shipped.
#[derive(Debug)]
pub struct Order {
    /// Warehouse-wide order id.
    pub id: u64,
    /// City the order ships to.
    pub destination_city: String,
    /// Required units per category.
    pub required: BTreeMap<CategoryKey, u32>,
    /// Creation instant, used for the completion histogram.
    pub created_at: Instant,
}

/// A request to audit stock levels for a set of categories.
#[derive(Debug, Clone)]
pub struct InventoryRequest {
    /// Audit id (shares the task id space).
    pub id: u64,
    /// Categories to count.
    pub categories: Vec<CategoryKey>,
}

/// Draw a random cargo class.
pub fn random_cargo_type<R: Rng>(rng: &mut R) -> CargoType {
    match rng.gen_range(0..3) {
        0 => CargoType::Light,
        1 => CargoType::Medium,
        _ => CargoType::Heavy,
    }
}

/// Generate a pallet with a random class and category split.
pub fn random_pallet<R: Rng>(rng: &mut R) -> Pallet {
    let cargo = random_cargo_type(rng);
    let mut pallet = Pallet::new(cargo);
    let categories = cargo.category_count();
    let mut items = rng.gen_range(2..=pallet.capacity);
    while items > 0 {
        let category = rng.gen_range(0..categories);
        let load = rng.gen_range(1..=pallet.capacity / categories + 1).min(items);
        *pallet.quantities.entry(category).or_insert(0) += load;
        items -= load;
    }
    pallet
}

/// Generate a truck with 10–100 random pallets.
pub fn random_truck<R: Rng>(rng: &mut R, id: u64) -> Truck {
    let city = CITIES[rng.gen_range(0..CITIES.len())].to_owned();
    let count = rng.gen_range(10..=100);
    let pallets = (0..count).map(|_| random_pallet(rng)).collect::<Vec<_>>();
    Truck { id, city, total_slots: pallets.len(), pallets }
}

/// Generate an order with 1–5 category entries of 1–30 units each.
pub fn random_order<R: Rng>(rng: &mut R, id: u64) -> Order {
    let destination_city = CITIES[rng.gen_range(0..CITIES.len())].to_owned();
    let mut required = BTreeMap::new();
    for _ in 0..rng.gen_range(1..=5) {
        let cargo = random_cargo_type(rng);
        let key = CategoryKey::new(cargo, rng.gen_range(0..cargo.category_count()));
        *required.entry(key).or_insert(0) += rng.gen_range(1..=30);
    }
    Order { id, destination_city, required, created_at: Instant::now() }
}

/// Generate an inventory request naming 1–4 categories.
pub fn random_inventory_request<R: Rng>(rng: &mut R, id: u64) -> InventoryRequest {
    let categories = (0..rng.gen_range(1..=4))
        .map(|_| {
            let cargo = random_cargo_type(rng);
            CategoryKey::new(cargo, rng.gen_range(0..cargo.category_count()))
        })
        .collect();
    InventoryRequest { id, categories }
}
