//! Deterministic location-keyed coin caches.
//!
//! The world is a grid of square cells over latitude/longitude. Some cells surface a cache of
//! coins, decided by [`luck`] so that every player sees the same world. Coins move between
//! caches and the player's inventory through the ledger, and the session writes every change
//! to a key/value store so the world survives restarts.

mod board;
mod cache_store;
mod config;
mod error;
mod ledger;
mod luck;
mod models;
mod persistence;
mod session;
pub mod snapshot;

pub use board::Board;
pub use cache_store::{generate_cache, CacheStore};
pub use config::GameConfig;
pub use error::{ConfigError, GeocacheError, LedgerError, PersistenceError, Result, SnapshotError};
pub use ledger::{audit, locate, place_coin, take_coin, transfer_coin, CoinContainer};
pub use luck::{initial_top_serial, initial_value_seed, luck, should_spawn_cache, spawn_seed, Luck};
pub use models::{Cell, CoinLocation, Direction, Geocache, Geocoin, Inventory, LatLng, LatLngBounds};
pub use persistence::{FileStore, KeyValueStore, MemoryStore, CACHES_KEY, INVENTORY_KEY, POSITION_KEY};
pub use session::{DefaultLuck, GeocacheSession, VisibleCache};
pub use snapshot::{CacheMapRecord, CacheRecord, CellRecord, CoinRecord, InventoryRecord};

// --- Grid ---
pub const GRID_PRECISION: u32 = 4; // decimal digits kept from a raw coordinate
pub const GRID_UNITS_PER_DEGREE: i64 = 10i64.pow(GRID_PRECISION);
pub const GRID_SCALE: f64 = GRID_UNITS_PER_DEGREE as f64;

// --- Default world parameters ---
pub const TILE_DEGREES: f64 = 1e-4;
pub const VISIBILITY_RADIUS: u32 = 8;
pub const MAX_VISIBILITY_RADIUS: u32 = 100; // scan window is (2R)^2 cells
pub const CACHE_SPAWN_PROBABILITY: f64 = 0.1;
pub const MAX_COINS_PER_CELL: u32 = 10;

/// Default starting point.
pub const MERRILL_CLASSROOM: LatLng = LatLng::new(36.9995, -122.0533);
