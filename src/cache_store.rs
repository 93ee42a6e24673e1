/******************************************************************************
 *                                                                            *
 * Owns every discovered Geocache, keyed by cell. A cache's contents are      *
 * generated exactly once, the first time its cell is asked for, and after    *
 * that only change through the ledger's transfer operations.                 *
 *                                                                            *
 ******************************************************************************/

use std::collections::BTreeMap;

use crate::board::Board;
use crate::error::{PersistenceError, SnapshotError};
use crate::luck::{initial_top_serial, Luck};
use crate::models::{Cell, Geocache, Geocoin};
use crate::snapshot::{self, CacheMapRecord};

#[derive(Debug, Clone, PartialEq)]
pub struct CacheStore {
    caches: BTreeMap<Cell, Geocache>,
    max_coins_per_cell: u32,
}

impl CacheStore {
    pub fn new(max_coins_per_cell: u32) -> Self {
        Self {
            caches: BTreeMap::new(),
            max_coins_per_cell,
        }
    }

    pub fn max_coins_per_cell(&self) -> u32 {
        self.max_coins_per_cell
    }

    /// Returns the cache at `cell`, generating it on first access.
    pub fn cache_for_cell<L: Luck + ?Sized>(&mut self, cell: Cell, luck: &L) -> &Geocache {
        self.cache_for_cell_mut(cell, luck)
    }

    pub(crate) fn cache_for_cell_mut<L: Luck + ?Sized>(&mut self, cell: Cell, luck: &L) -> &mut Geocache {
        let max_coins = self.max_coins_per_cell;
        self.caches.entry(cell).or_insert_with(|| {
            let cache = generate_cache(cell, luck, max_coins);
            log::debug!("[CacheStore] Generated cache at {} with {} coins", cell, cache.len());
            cache
        })
    }

    pub fn get(&self, cell: &Cell) -> Option<&Geocache> {
        self.caches.get(cell)
    }

    pub(crate) fn get_mut(&mut self, cell: &Cell) -> Option<&mut Geocache> {
        self.caches.get_mut(cell)
    }

    pub fn contains(&self, cell: &Cell) -> bool {
        self.caches.contains_key(cell)
    }

    /// Caches in cell order.
    pub fn iter(&self) -> impl Iterator<Item = &Geocache> {
        self.caches.values()
    }

    pub fn len(&self) -> usize {
        self.caches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }

    pub fn total_coins(&self) -> usize {
        self.caches.values().map(Geocache::len).sum()
    }

    pub fn clear(&mut self) {
        self.caches.clear();
    }

    pub fn to_records(&self) -> CacheMapRecord {
        snapshot::encode_caches(self.caches.values())
    }

    /// JSON text of the full cell-to-cache map.
    pub fn serialize(&self) -> Result<String, PersistenceError> {
        Ok(serde_json::to_string(&self.to_records())?)
    }

    /// Rebuilds a store from [`CacheStore::serialize`] output, resolving every cell through
    /// `board`. Any malformed record rejects the whole blob.
    pub fn deserialize(blob: &str, board: &mut Board, max_coins_per_cell: u32) -> Result<Self, SnapshotError> {
        let records: CacheMapRecord = serde_json::from_str(blob)?;
        Self::from_records(records, board, max_coins_per_cell)
    }

    pub fn from_records(
        records: CacheMapRecord,
        board: &mut Board,
        max_coins_per_cell: u32,
    ) -> Result<Self, SnapshotError> {
        let caches = snapshot::decode_caches(records, board)?;
        Ok(Self::from_caches(caches, max_coins_per_cell))
    }

    pub(crate) fn from_caches(caches: Vec<Geocache>, max_coins_per_cell: u32) -> Self {
        Self {
            caches: caches.into_iter().map(|cache| (cache.cell, cache)).collect(),
            max_coins_per_cell,
        }
    }
}

/// Mints the initial coins of `cell`: serials `0..=floor(luck * max_coins)`, all originating
/// from `cell`.
pub fn generate_cache<L: Luck + ?Sized>(cell: Cell, luck: &L, max_coins: u32) -> Geocache {
    let top_serial = initial_top_serial(luck, &cell, max_coins);
    let coins = (0..=top_serial).map(|serial| Geocoin::new(cell, serial)).collect();
    Geocache::new(cell, coins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::luck::luck;
    use std::cell::Cell as Counter;

    fn cell() -> Cell {
        Cell::from_units(369_995, -1_220_533)
    }

    #[test]
    fn fixed_luck_of_035_mints_four_coins() {
        let cache = generate_cache(cell(), &|_: &str| 0.35, 10);
        let serials: Vec<u32> = cache.coins().iter().map(|c| c.serial).collect();
        assert_eq!(serials, vec![0, 1, 2, 3]);
        assert!(cache.coins().iter().all(|c| c.cell == cell()));
    }

    #[test]
    fn count_is_inclusive_of_the_top_serial() {
        // floor(r * MAX) + 1 coins: never empty, and up to MAX + 1 for a source that returns 1.0.
        assert_eq!(generate_cache(cell(), &|_: &str| 0.0, 10).len(), 1);
        assert_eq!(generate_cache(cell(), &|_: &str| 0.95, 10).len(), 10);
        assert_eq!(generate_cache(cell(), &|_: &str| 1.0, 10).len(), 11);
    }

    #[test]
    fn generation_uses_the_initial_value_seed() {
        let seen = std::cell::RefCell::new(Vec::new());
        let source = |seed: &str| {
            seen.borrow_mut().push(seed.to_string());
            0.5
        };
        generate_cache(cell(), &source, 10);
        assert_eq!(seen.into_inner(), vec!["36.9995,-122.0533,initialValue".to_string()]);
    }

    #[test]
    fn cache_is_generated_once() {
        let calls = Counter::new(0);
        let source = |_: &str| {
            calls.set(calls.get() + 1);
            0.35
        };
        let mut store = CacheStore::new(10);
        let first = store.cache_for_cell(cell(), &source).clone();
        let second = store.cache_for_cell(cell(), &source).clone();
        assert_eq!(first, second);
        assert_eq!(calls.get(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn real_luck_is_reproducible() {
        let mut a = CacheStore::new(10);
        let mut b = CacheStore::new(10);
        for k in 0..20 {
            let c = cell().offset(k, -k);
            assert_eq!(a.cache_for_cell(c, &luck), b.cache_for_cell(c, &luck));
        }
        assert_eq!(a.total_coins(), b.total_coins());
    }

    #[test]
    fn serialize_round_trips() {
        let mut board = Board::new(1e-4, 8);
        let mut store = CacheStore::new(10);
        store.cache_for_cell(cell(), &luck);
        store.cache_for_cell(cell().offset(1, 0), &luck);
        let blob = store.serialize().unwrap();
        let restored = CacheStore::deserialize(&blob, &mut board, 10).unwrap();
        assert_eq!(restored, store);
        assert!(board.is_known(&cell()));
    }

    #[test]
    fn deserialize_rejects_garbage() {
        let mut board = Board::new(1e-4, 8);
        assert!(CacheStore::deserialize("{\"1,2\": {}}", &mut board, 10).is_err());
        assert!(CacheStore::deserialize("[]", &mut board, 10).is_err());
    }
}
