//! # Persisted record shapes
//!
//! Caches are stored as a JSON object keyed by the cell's `"i,j"` text:
//!
//! ```json
//! { "36.9995,-122.0533": { "cell": { "i": 36.9995, "j": -122.0533 },
//!                          "cacheCoins": [ { "cell": { "i": 36.9995, "j": -122.0533 },
//!                                            "serial": "36.9995,-122.0533,0" } ] } }
//! ```
//!
//! The inventory is a JSON array of the same coin records. Decoding resolves every cell through
//! the [`Board`] so restored cells are the same values the grid hands out, and rejects the
//! snapshot as a whole on the first record that does not hold up.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::board::Board;
use crate::error::SnapshotError;
use crate::models::{Cell, Geocache, Geocoin, Inventory};
use crate::GRID_SCALE;

/// Off-grid tolerance, in grid units, for restored coordinates.
const GRID_TOLERANCE_UNITS: f64 = 1e-6;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CellRecord {
    pub i: f64,
    pub j: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CoinRecord {
    pub cell: CellRecord,
    pub serial: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
    pub cell: CellRecord,
    pub cache_coins: Vec<CoinRecord>,
}

pub type CacheMapRecord = BTreeMap<String, CacheRecord>;
pub type InventoryRecord = Vec<CoinRecord>;

// --- Encoding ---

pub fn encode_cell(cell: &Cell) -> CellRecord {
    CellRecord { i: cell.i(), j: cell.j() }
}

pub fn encode_coin(coin: &Geocoin) -> CoinRecord {
    CoinRecord {
        cell: encode_cell(&coin.cell),
        serial: coin.label(),
    }
}

pub fn encode_cache(cache: &Geocache) -> CacheRecord {
    CacheRecord {
        cell: encode_cell(&cache.cell),
        cache_coins: cache.coins().iter().map(encode_coin).collect(),
    }
}

pub fn encode_caches<'a>(caches: impl IntoIterator<Item = &'a Geocache>) -> CacheMapRecord {
    caches
        .into_iter()
        .map(|cache| (cache.cell.key(), encode_cache(cache)))
        .collect()
}

pub fn encode_inventory(inventory: &Inventory) -> InventoryRecord {
    inventory.coins().iter().map(encode_coin).collect()
}

// --- Decoding ---

fn to_grid_units(degrees: f64, key: &str) -> Result<i64, SnapshotError> {
    if !degrees.is_finite() {
        return Err(SnapshotError::NonCanonicalCell {
            key: key.to_string(),
            reason: format!("coordinate {} is not finite", degrees),
        });
    }
    let scaled = degrees * GRID_SCALE;
    let units = scaled.round();
    if (scaled - units).abs() > GRID_TOLERANCE_UNITS {
        return Err(SnapshotError::NonCanonicalCell {
            key: key.to_string(),
            reason: format!("coordinate {} is finer than the grid precision", degrees),
        });
    }
    Ok(units as i64)
}

pub fn decode_cell(record: &CellRecord, board: &mut Board) -> Result<Cell, SnapshotError> {
    let key = format!("{},{}", record.i, record.j);
    let cell = Cell::from_units(to_grid_units(record.i, &key)?, to_grid_units(record.j, &key)?);
    Ok(board.canonical_cell(cell))
}

/// Accepts both the `"i,j,n"` label and a bare `"n"`.
fn decode_serial(serial: &str, cell: &Cell) -> Result<u32, SnapshotError> {
    let bad = || SnapshotError::BadSerial {
        serial: serial.to_string(),
    };
    let number = match serial.rsplit_once(',') {
        Some((prefix, number)) => {
            if prefix != cell.key() {
                return Err(bad());
            }
            number
        }
        None => serial,
    };
    number.trim().parse::<u32>().map_err(|_| bad())
}

fn decode_coin(
    record: &CoinRecord,
    board: &mut Board,
    seen: &mut HashSet<Geocoin>,
) -> Result<Geocoin, SnapshotError> {
    let cell = decode_cell(&record.cell, board)?;
    let coin = Geocoin::new(cell, decode_serial(&record.serial, &cell)?);
    if !seen.insert(coin) {
        return Err(SnapshotError::DuplicateCoin { coin });
    }
    Ok(coin)
}

fn decode_caches_into(
    records: CacheMapRecord,
    board: &mut Board,
    seen: &mut HashSet<Geocoin>,
) -> Result<Vec<Geocache>, SnapshotError> {
    let mut caches = Vec::with_capacity(records.len());
    for (key, record) in records {
        let cell = decode_cell(&record.cell, board)?;
        if key != cell.key() {
            return Err(SnapshotError::KeyMismatch { key, cell });
        }
        let coins = record
            .cache_coins
            .iter()
            .map(|coin| decode_coin(coin, board, seen))
            .collect::<Result<Vec<_>, _>>()?;
        caches.push(Geocache::new(cell, coins));
    }
    Ok(caches)
}

pub fn decode_caches(records: CacheMapRecord, board: &mut Board) -> Result<Vec<Geocache>, SnapshotError> {
    decode_caches_into(records, board, &mut HashSet::new())
}

pub fn decode_inventory(records: InventoryRecord, board: &mut Board) -> Result<Inventory, SnapshotError> {
    decode_inventory_into(records, board, &mut HashSet::new())
}

fn decode_inventory_into(
    records: InventoryRecord,
    board: &mut Board,
    seen: &mut HashSet<Geocoin>,
) -> Result<Inventory, SnapshotError> {
    let coins = records
        .iter()
        .map(|coin| decode_coin(coin, board, seen))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Inventory::from_coins(coins))
}

/// Decodes caches and inventory together so a coin stored in both is caught.
pub fn decode_world(
    caches: CacheMapRecord,
    inventory: InventoryRecord,
    board: &mut Board,
) -> Result<(Vec<Geocache>, Inventory), SnapshotError> {
    let mut seen = HashSet::new();
    let caches = decode_caches_into(caches, board, &mut seen)?;
    let inventory = decode_inventory_into(inventory, board, &mut seen)?;
    Ok((caches, inventory))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn board() -> Board {
        Board::new(1e-4, 8)
    }

    fn cell() -> Cell {
        Cell::from_units(369_995, -1_220_533)
    }

    #[test]
    fn cache_record_uses_the_documented_field_names() {
        let cache = Geocache::new(cell(), vec![Geocoin::new(cell(), 0)]);
        let value = serde_json::to_value(encode_caches([&cache])).unwrap();
        assert_eq!(
            value,
            json!({
                "36.9995,-122.0533": {
                    "cell": { "i": 36.9995, "j": -122.0533 },
                    "cacheCoins": [
                        { "cell": { "i": 36.9995, "j": -122.0533 }, "serial": "36.9995,-122.0533,0" }
                    ]
                }
            })
        );
    }

    #[test]
    fn decode_preserves_order_and_identity() {
        let coins = vec![Geocoin::new(cell(), 2), Geocoin::new(cell(), 0), Geocoin::new(cell().offset(1, 1), 5)];
        let cache = Geocache::new(cell(), coins.clone());
        let decoded = decode_caches(encode_caches([&cache]), &mut board()).unwrap();
        assert_eq!(decoded, vec![cache]);
        assert_eq!(decoded[0].coins(), coins.as_slice());
    }

    #[test]
    fn bare_numeric_serial_is_accepted() {
        let record: InventoryRecord =
            serde_json::from_value(json!([{ "cell": { "i": 36.9995, "j": -122.0533 }, "serial": "7" }])).unwrap();
        let inventory = decode_inventory(record, &mut board()).unwrap();
        assert_eq!(inventory.coins(), &[Geocoin::new(cell(), 7)]);
    }

    #[test]
    fn serial_from_another_cell_is_rejected() {
        let record: InventoryRecord =
            serde_json::from_value(json!([{ "cell": { "i": 36.9995, "j": -122.0533 }, "serial": "1,2,7" }])).unwrap();
        assert!(matches!(decode_inventory(record, &mut board()), Err(SnapshotError::BadSerial { .. })));
    }

    #[test]
    fn off_grid_cell_is_rejected() {
        let record: InventoryRecord =
            serde_json::from_value(json!([{ "cell": { "i": 36.99953, "j": -122.0533 }, "serial": "1" }])).unwrap();
        assert!(matches!(
            decode_inventory(record, &mut board()),
            Err(SnapshotError::NonCanonicalCell { .. })
        ));
    }

    #[test]
    fn mismatched_key_is_rejected() {
        let cache = Geocache::new(cell(), vec![]);
        let mut records = encode_caches([&cache]);
        let record = records.remove(&cell().key()).unwrap();
        records.insert("1,2".to_string(), record);
        assert!(matches!(decode_caches(records, &mut board()), Err(SnapshotError::KeyMismatch { .. })));
    }

    #[test]
    fn coin_in_cache_and_inventory_is_rejected() {
        let coin = Geocoin::new(cell(), 0);
        let cache = Geocache::new(cell(), vec![coin]);
        let inventory = Inventory::from_coins(vec![coin]);
        let result = decode_world(encode_caches([&cache]), encode_inventory(&inventory), &mut board());
        assert!(matches!(result, Err(SnapshotError::DuplicateCoin { .. })));
    }

    #[test]
    fn missing_fields_fail_to_parse() {
        let parsed: Result<CacheMapRecord, _> =
            serde_json::from_value(json!({ "1,2": { "cell": { "i": 1.0 }, "cacheCoins": [] } }));
        assert!(parsed.is_err());
    }
}
