/******************************************************************************
 *                                                                            *
 * GeocacheSession is the single owner of a player's world: the grid, every   *
 * discovered cache, the inventory, the player's position and the durable     *
 * store they are written to. Map and popup code drives the game through      *
 * the methods below and renders what they return.                            *
 *                                                                            *
 ******************************************************************************/

use crate::board::Board;
use crate::cache_store::CacheStore;
use crate::config::GameConfig;
use crate::error::{GeocacheError, LedgerError, Result, SnapshotError};
use crate::ledger;
use crate::luck::{self, should_spawn_cache, Luck};
use crate::models::{Cell, CoinLocation, Direction, Geocache, Geocoin, Inventory, LatLng, LatLngBounds};
use crate::persistence::{KeyValueStore, CACHES_KEY, INVENTORY_KEY, POSITION_KEY};
use crate::snapshot::{self, CacheMapRecord, InventoryRecord};

/// Default luck source: [`luck::luck`] as a function pointer.
pub type DefaultLuck = fn(&str) -> f64;

/// A cell surfaced by a scan, with the rectangle to draw for it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VisibleCache {
    pub cell: Cell,
    pub bounds: LatLngBounds,
}

pub struct GeocacheSession<S, L = DefaultLuck> {
    config: GameConfig,
    board: Board,
    caches: CacheStore,
    inventory: Inventory,
    player: LatLng,
    store: S,
    luck: L,
}

impl<S: KeyValueStore> GeocacheSession<S> {
    /// Opens a session over `store` with the standard luck source.
    pub fn open(config: GameConfig, store: S) -> Result<Self> {
        Self::open_with_luck(config, store, luck::luck as DefaultLuck)
    }
}

impl<S: KeyValueStore, L: Luck> GeocacheSession<S, L> {
    fn fresh(config: GameConfig, store: S, luck: L) -> Self {
        Self {
            board: Board::new(config.tile_degrees, config.visibility_radius),
            caches: CacheStore::new(config.max_coins_per_cell),
            inventory: Inventory::new(),
            player: config.start_position,
            config,
            store,
            luck,
        }
    }

    /// Opens a session, loading whatever the store holds.
    ///
    /// A snapshot that fails validation is discarded as a whole and the session starts from a
    /// fresh world; storage I/O failures are returned.
    pub fn open_with_luck(config: GameConfig, store: S, luck: L) -> Result<Self> {
        config.validate()?;
        let mut session = Self::fresh(config, store, luck);
        match session.load_persisted() {
            Ok(()) => {}
            Err(GeocacheError::Snapshot(e)) => {
                log::warn!("[Session] Discarding persisted world: {}", e);
                session.discard_world();
            }
            Err(e) => return Err(e),
        }
        log::info!(
            "[Session] Opened at ({:.4}, {:.4}) with {} caches and {} coins in inventory",
            session.player.lat,
            session.player.lng,
            session.caches.len(),
            session.inventory.len()
        );
        Ok(session)
    }

    /// Like [`GeocacheSession::open_with_luck`] but fails on a malformed snapshot instead of
    /// starting fresh.
    pub fn restore(config: GameConfig, store: S, luck: L) -> Result<Self> {
        config.validate()?;
        let mut session = Self::fresh(config, store, luck);
        session.load_persisted()?;
        log::info!("[Session] Restored {} caches", session.caches.len());
        Ok(session)
    }

    fn load_persisted(&mut self) -> Result<()> {
        if let Some(text) = self.store.get(POSITION_KEY)? {
            match serde_json::from_str::<LatLng>(&text) {
                Ok(position) if position.is_finite() => self.player = position,
                Ok(_) => log::warn!("[Session] Stored position is not finite, using the start position"),
                Err(e) => log::warn!("[Session] Ignoring unreadable stored position: {}", e),
            }
        }

        let caches: CacheMapRecord = match self.store.get(CACHES_KEY)? {
            Some(text) => serde_json::from_str(&text).map_err(SnapshotError::from)?,
            None => CacheMapRecord::new(),
        };
        let inventory: InventoryRecord = match self.store.get(INVENTORY_KEY)? {
            Some(text) => serde_json::from_str(&text).map_err(SnapshotError::from)?,
            None => InventoryRecord::new(),
        };
        let (caches, inventory) = snapshot::decode_world(caches, inventory, &mut self.board)?;
        self.caches = CacheStore::from_caches(caches, self.config.max_coins_per_cell);
        self.inventory = inventory;
        Ok(())
    }

    fn discard_world(&mut self) {
        self.board.clear();
        self.caches.clear();
        self.inventory = Inventory::new();
        self.player = self.config.start_position;
    }

    // --- Accessors ---

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn caches(&self) -> &CacheStore {
        &self.caches
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn player_position(&self) -> LatLng {
        self.player
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    // --- Grid ---

    pub fn cell_for_point(&mut self, point: LatLng) -> Cell {
        self.board.cell_for_point(point)
    }

    pub fn player_cell(&mut self) -> Cell {
        self.board.cell_for_point(self.player)
    }

    pub fn cell_bounds(&self, cell: &Cell) -> LatLngBounds {
        self.board.cell_bounds(cell)
    }

    pub fn neighbors(&mut self, cell: &Cell) -> [Cell; 8] {
        self.board.neighbors(cell)
    }

    // --- Movement ---

    /// Moves the player one tile and persists the new position.
    pub fn move_player(&mut self, direction: Direction) -> Result<LatLng> {
        let (lat_tiles, lng_tiles) = direction.step();
        let tile = self.board.tile_degrees();
        let next = LatLng::new(
            self.player.lat + lat_tiles as f64 * tile,
            self.player.lng + lng_tiles as f64 * tile,
        );
        self.set_player_position(next)?;
        Ok(next)
    }

    /// Jumps to a sensed coordinate and persists it. Non-finite readings are rejected without
    /// touching the current position.
    pub fn set_player_position(&mut self, position: LatLng) -> Result<()> {
        if !position.is_finite() {
            log::warn!("[Session] Ignoring non-finite position ({}, {})", position.lat, position.lng);
            return Err(GeocacheError::InvalidPosition {
                lat: position.lat,
                lng: position.lng,
            });
        }
        self.player = position;
        let text = serde_json::to_string(&position).map_err(crate::error::PersistenceError::from)?;
        self.store.set(POSITION_KEY, text).map_err(|e| {
            log::error!("[Session] Failed to persist player position: {}", e);
            e
        })?;
        Ok(())
    }

    // --- Caches ---

    pub fn is_cache_cell(&self, cell: &Cell) -> bool {
        should_spawn_cache(&self.luck, cell, self.config.cache_spawn_probability)
    }

    /// Scans the window around the player and returns the cells that surface a cache.
    /// Contents are not generated until the cache is opened.
    pub fn visible_caches(&mut self) -> Vec<VisibleCache> {
        let cells = self.board.cells_near_point(self.player);
        let visible: Vec<VisibleCache> = cells
            .into_iter()
            .filter(|cell| self.is_cache_cell(cell))
            .map(|cell| VisibleCache {
                cell,
                bounds: self.board.cell_bounds(&cell),
            })
            .collect();
        log::debug!("[Session] Scan around ({:.4}, {:.4}) surfaced {} caches", self.player.lat, self.player.lng, visible.len());
        visible
    }

    /// The cache at `cell`, generated on first access.
    pub fn open_cache(&mut self, cell: Cell) -> &Geocache {
        let cell = self.board.canonical_cell(cell);
        self.caches.cache_for_cell(cell, &self.luck)
    }

    pub fn locate(&self, coin: &Geocoin) -> Option<CoinLocation> {
        ledger::locate(coin, &self.caches, &self.inventory)
    }

    // --- Transfers ---

    /// Moves `coin` from the cache at `cell` into the inventory, then persists both.
    pub fn take_coin(&mut self, cell: Cell, coin: Geocoin) -> Result<()> {
        let cache = self.caches.get_mut(&cell).ok_or(GeocacheError::UnknownCache { cell })?;
        ledger::take_coin(&coin, cache, &mut self.inventory).map_err(|e| {
            log::warn!("[Session] Ignoring take of {}: {}", coin, e);
            e
        })?;
        self.persist_world()
    }

    /// Moves `coin` from the inventory into the cache at `cell`, then persists both.
    pub fn place_coin(&mut self, cell: Cell, coin: Geocoin) -> Result<()> {
        let cache = self.caches.get_mut(&cell).ok_or(GeocacheError::UnknownCache { cell })?;
        ledger::place_coin(&coin, cache, &mut self.inventory).map_err(|e| {
            log::warn!("[Session] Ignoring place of {}: {}", coin, e);
            e
        })?;
        self.persist_world()
    }

    /// Writes every cache and the inventory in one batch.
    pub fn persist_world(&mut self) -> Result<()> {
        let caches = serde_json::to_string(&self.caches.to_records()).map_err(crate::error::PersistenceError::from)?;
        let inventory = serde_json::to_string(&snapshot::encode_inventory(&self.inventory))
            .map_err(crate::error::PersistenceError::from)?;
        self.store
            .write_batch(vec![(CACHES_KEY.to_string(), caches), (INVENTORY_KEY.to_string(), inventory)])
            .map_err(|e| {
                log::error!("[Session] Failed to persist world: {}", e);
                e
            })?;
        Ok(())
    }

    pub fn audit(&self) -> std::result::Result<(), LedgerError> {
        ledger::audit(&self.caches, &self.inventory, &self.luck)
    }

    /// Forgets everything: storage, caches, inventory and position.
    pub fn reset(&mut self) -> Result<()> {
        self.store.clear()?;
        self.discard_world();
        log::info!("[Session] World reset");
        Ok(())
    }
}
