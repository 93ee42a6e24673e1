//! # Coin ledger
//!
//! The only code allowed to move coins. A coin's location is its membership in exactly one
//! collection (a cache or the inventory); there is no side index to keep in sync.
//!
//! Ordering contract: the source keeps the relative order of its remaining coins and the
//! destination appends. Taking a coin and placing it back therefore restores the cache's set
//! of coins but moves that coin to the end.

use std::collections::{BTreeMap, HashSet};

use crate::cache_store::CacheStore;
use crate::error::LedgerError;
use crate::luck::{initial_top_serial, Luck};
use crate::models::{Cell, CoinLocation, Geocache, Geocoin, Inventory};

/// A collection coins can be moved into and out of.
pub trait CoinContainer {
    fn coins(&self) -> &[Geocoin];
    fn coins_mut(&mut self) -> &mut Vec<Geocoin>;
    fn location(&self) -> CoinLocation;

    fn position_of(&self, coin: &Geocoin) -> Option<usize> {
        self.coins().iter().position(|c| c == coin)
    }
}

impl CoinContainer for Geocache {
    fn coins(&self) -> &[Geocoin] {
        &self.coins
    }

    fn coins_mut(&mut self) -> &mut Vec<Geocoin> {
        &mut self.coins
    }

    fn location(&self) -> CoinLocation {
        CoinLocation::Cache(self.cell)
    }
}

impl CoinContainer for Inventory {
    fn coins(&self) -> &[Geocoin] {
        &self.coins
    }

    fn coins_mut(&mut self) -> &mut Vec<Geocoin> {
        &mut self.coins
    }

    fn location(&self) -> CoinLocation {
        CoinLocation::Inventory
    }
}

fn not_found(coin: Geocoin, location: CoinLocation) -> LedgerError {
    match location {
        CoinLocation::Cache(cell) => LedgerError::CoinNotInCache { coin, cell },
        CoinLocation::Inventory => LedgerError::CoinNotInInventory { coin },
    }
}

/// Moves `coin` from `source` to the end of `target`. Fails without touching either side when
/// the coin is not in `source`, or when it is somehow already in `target`.
pub fn transfer_coin<S, T>(coin: &Geocoin, source: &mut S, target: &mut T) -> Result<(), LedgerError>
where
    S: CoinContainer + ?Sized,
    T: CoinContainer + ?Sized,
{
    let index = source
        .position_of(coin)
        .ok_or_else(|| not_found(*coin, source.location()))?;
    if target.position_of(coin).is_some() {
        return Err(LedgerError::DuplicateCoin { coin: *coin });
    }
    let moved = source.coins_mut().remove(index);
    target.coins_mut().push(moved);
    Ok(())
}

/// Cache to inventory.
pub fn take_coin(coin: &Geocoin, from_cache: &mut Geocache, inventory: &mut Inventory) -> Result<(), LedgerError> {
    transfer_coin(coin, from_cache, inventory)?;
    log::info!("[Ledger] Took coin {} from cache {}", coin, from_cache.cell);
    Ok(())
}

/// Inventory to cache.
pub fn place_coin(coin: &Geocoin, to_cache: &mut Geocache, inventory: &mut Inventory) -> Result<(), LedgerError> {
    transfer_coin(coin, inventory, to_cache)?;
    log::info!("[Ledger] Placed coin {} into cache {}", coin, to_cache.cell);
    Ok(())
}

/// Finds where a coin currently is.
pub fn locate(coin: &Geocoin, store: &CacheStore, inventory: &Inventory) -> Option<CoinLocation> {
    if inventory.contains(coin) {
        return Some(CoinLocation::Inventory);
    }
    store
        .iter()
        .find(|cache| cache.contains(coin))
        .map(|cache| CoinLocation::Cache(cache.cell))
}

/// Verifies conservation across every cache and the inventory.
///
/// For each generated cell the minted serials are re-derived from `luck`; exactly those coins
/// must exist, each in one place. Coins whose origin cell was never generated are rejected.
pub fn audit<L: Luck + ?Sized>(store: &CacheStore, inventory: &Inventory, luck: &L) -> Result<(), LedgerError> {
    let mut seen: HashSet<Geocoin> = HashSet::new();
    let mut per_origin: BTreeMap<Cell, usize> = BTreeMap::new();

    let all_coins = store.iter().flat_map(|cache| cache.coins().iter()).chain(inventory.coins());
    for coin in all_coins {
        if !seen.insert(*coin) {
            return Err(LedgerError::DuplicateCoin { coin: *coin });
        }
        if !store.contains(&coin.cell) {
            return Err(LedgerError::UnknownOrigin { coin: *coin });
        }
        let top_serial = initial_top_serial(luck, &coin.cell, store.max_coins_per_cell());
        if coin.serial > top_serial {
            return Err(LedgerError::ConservationViolated {
                cell: coin.cell,
                expected: top_serial as usize + 1,
                found: coin.serial as usize + 1,
            });
        }
        *per_origin.entry(coin.cell).or_insert(0) += 1;
    }

    for cache in store.iter() {
        let expected = initial_top_serial(luck, &cache.cell, store.max_coins_per_cell()) as usize + 1;
        let found = per_origin.get(&cache.cell).copied().unwrap_or(0);
        if found != expected {
            return Err(LedgerError::ConservationViolated {
                cell: cache.cell,
                expected,
                found,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache_store::generate_cache;
    use crate::luck::luck;
    use proptest::prelude::*;

    fn cell() -> Cell {
        Cell::from_units(369_995, -1_220_533)
    }

    fn cache() -> Geocache {
        generate_cache(cell(), &|_: &str| 0.35, 10)
    }

    #[test]
    fn take_moves_coin_to_inventory() {
        let mut cache = cache();
        let mut inventory = Inventory::new();
        let coin = Geocoin::new(cell(), 1);
        take_coin(&coin, &mut cache, &mut inventory).unwrap();
        assert!(!cache.contains(&coin));
        assert_eq!(inventory.coins(), &[coin]);
        let serials: Vec<u32> = cache.coins().iter().map(|c| c.serial).collect();
        assert_eq!(serials, vec![0, 2, 3]);
    }

    #[test]
    fn take_then_place_restores_set_and_appends() {
        let mut cache = cache();
        let before = cache.clone();
        let mut inventory = Inventory::new();
        let coin = Geocoin::new(cell(), 0);
        take_coin(&coin, &mut cache, &mut inventory).unwrap();
        place_coin(&coin, &mut cache, &mut inventory).unwrap();
        assert!(inventory.is_empty());
        let mut restored = cache.coins().to_vec();
        assert_eq!(restored.last(), Some(&coin));
        restored.sort();
        assert_eq!(restored, before.coins());
    }

    #[test]
    fn take_of_missing_coin_is_a_no_op() {
        let mut cache = cache();
        let before = cache.clone();
        let mut inventory = Inventory::new();
        let stranger = Geocoin::new(cell(), 9);
        let err = take_coin(&stranger, &mut cache, &mut inventory).unwrap_err();
        assert_eq!(err, LedgerError::CoinNotInCache { coin: stranger, cell: cell() });
        assert_eq!(cache, before);
        assert!(inventory.is_empty());
    }

    #[test]
    fn place_of_coin_not_held_is_a_no_op() {
        let mut cache = cache();
        let before = cache.clone();
        let mut inventory = Inventory::new();
        let coin = Geocoin::new(cell(), 0);
        let err = place_coin(&coin, &mut cache, &mut inventory).unwrap_err();
        assert_eq!(err, LedgerError::CoinNotInInventory { coin });
        assert_eq!(cache, before);
    }

    #[test]
    fn transfer_refuses_to_duplicate() {
        let coin = Geocoin::new(cell(), 0);
        let mut cache = cache();
        let mut inventory = Inventory::from_coins(vec![coin]);
        let err = take_coin(&coin, &mut cache, &mut inventory).unwrap_err();
        assert_eq!(err, LedgerError::DuplicateCoin { coin });
        assert_eq!(inventory.len(), 1);
        assert_eq!(cache.len(), 4);
    }

    #[test]
    fn locate_follows_membership() {
        let mut store = CacheStore::new(10);
        let mut inventory = Inventory::new();
        store.cache_for_cell(cell(), &|_: &str| 0.35);
        let coin = Geocoin::new(cell(), 2);
        assert_eq!(locate(&coin, &store, &inventory), Some(CoinLocation::Cache(cell())));
        take_coin(&coin, store.get_mut(&cell()).unwrap(), &mut inventory).unwrap();
        assert_eq!(locate(&coin, &store, &inventory), Some(CoinLocation::Inventory));
        assert_eq!(locate(&Geocoin::new(cell(), 99), &store, &inventory), None);
    }

    #[test]
    fn audit_detects_lost_and_foreign_coins() {
        let mut store = CacheStore::new(10);
        let mut inventory = Inventory::new();
        store.cache_for_cell(cell(), &luck);
        assert_eq!(audit(&store, &inventory, &luck), Ok(()));

        let coin = Geocoin::new(cell(), 0);
        take_coin(&coin, store.get_mut(&cell()).unwrap(), &mut inventory).unwrap();
        assert_eq!(audit(&store, &inventory, &luck), Ok(()));

        inventory.coins.clear();
        assert!(matches!(
            audit(&store, &inventory, &luck),
            Err(LedgerError::ConservationViolated { .. })
        ));

        let foreign = Geocoin::new(cell().offset(50, 50), 0);
        inventory.coins = vec![coin, foreign];
        assert_eq!(audit(&store, &inventory, &luck), Err(LedgerError::UnknownOrigin { coin: foreign }));
    }

    proptest! {
        #[test]
        fn prop_random_transfers_conserve_coins(moves in proptest::collection::vec((0usize..3, 0usize..12, any::<bool>()), 0..60)) {
            let cells = [cell(), cell().offset(1, 0), cell().offset(0, 1)];
            let mut store = CacheStore::new(10);
            for c in cells {
                store.cache_for_cell(c, &luck);
            }
            let minted = store.total_coins();
            let mut inventory = Inventory::new();

            for (cache_index, coin_index, taking) in moves {
                let target = cells[cache_index];
                if taking {
                    let cache = store.get_mut(&target).unwrap();
                    if let Some(coin) = cache.coins().get(coin_index % (cache.len().max(1))).copied() {
                        take_coin(&coin, cache, &mut inventory).unwrap();
                    }
                } else if !inventory.is_empty() {
                    let coin = inventory.coins()[coin_index % inventory.len()];
                    place_coin(&coin, store.get_mut(&target).unwrap(), &mut inventory).unwrap();
                }
                prop_assert_eq!(store.total_coins() + inventory.len(), minted);
                prop_assert_eq!(audit(&store, &inventory, &luck), Ok(()));
            }
        }
    }
}
