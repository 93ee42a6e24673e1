//! Error types for world, ledger and storage operations

use thiserror::Error;

use crate::models::{Cell, Geocoin};

/// Transfer and bookkeeping failures. A transfer that fails leaves every collection untouched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Coin {coin} is not in the cache at {cell}")]
    CoinNotInCache { coin: Geocoin, cell: Cell },

    #[error("Coin {coin} is not in the inventory")]
    CoinNotInInventory { coin: Geocoin },

    #[error("Coin {coin} appears in more than one place")]
    DuplicateCoin { coin: Geocoin },

    #[error("Cell {cell} minted {expected} coins but {found} are accounted for")]
    ConservationViolated { cell: Cell, expected: usize, found: usize },

    #[error("Coin {coin} originates from a cell that was never generated")]
    UnknownOrigin { coin: Geocoin },
}

/// Persisted state that cannot be trusted. The whole snapshot is rejected.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Malformed snapshot record: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Cell {key} is not on the grid: {reason}")]
    NonCanonicalCell { key: String, reason: String },

    #[error("Cache stored under key {key} belongs to cell {cell}")]
    KeyMismatch { key: String, cell: Cell },

    #[error("Coin serial '{serial}' is not valid for its cell")]
    BadSerial { serial: String },

    #[error("Coin {coin} is stored more than once")]
    DuplicateCoin { coin: Geocoin },
}

/// Durable store failures. Reported, never retried.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage contents could not be (de)serialized: {0}")]
    Format(#[from] serde_json::Error),
}

/// Rejected configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors surfaced by a game session.
#[derive(Debug, Error)]
pub enum GeocacheError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("No cache has been generated at {cell}")]
    UnknownCache { cell: Cell },
    #[error("Position ({lat}, {lng}) is not a finite coordinate")]
    InvalidPosition { lat: f64, lng: f64 },
}

pub type Result<T, E = GeocacheError> = std::result::Result<T, E>;
