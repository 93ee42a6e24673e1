use std::collections::HashSet;

use crate::models::{degrees_to_units, Cell, LatLng, LatLngBounds};
use crate::MAX_VISIBILITY_RADIUS;

/// Grid index over the continuous map.
///
/// Converts coordinates to canonical cells, cells back to bounds, and remembers every cell it
/// has handed out. Cells are never forgotten except by [`Board::clear`].
#[derive(Debug, Clone)]
pub struct Board {
    tile_degrees: f64,
    tile_units: i64,
    visibility_radius: u32,
    known_cells: HashSet<Cell>,
}

impl Board {
    /// `tile_degrees` is expected to be a whole multiple of the grid precision
    /// (see `GameConfig::validate`); anything finer is treated as one grid unit. The radius is
    /// capped at [`MAX_VISIBILITY_RADIUS`].
    pub fn new(tile_degrees: f64, visibility_radius: u32) -> Self {
        if visibility_radius > MAX_VISIBILITY_RADIUS {
            log::warn!(
                "[Board] Visibility radius {} exceeds {}, capping",
                visibility_radius,
                MAX_VISIBILITY_RADIUS
            );
        }
        Self {
            tile_degrees,
            tile_units: degrees_to_units(tile_degrees).max(1),
            visibility_radius: visibility_radius.min(MAX_VISIBILITY_RADIUS),
            known_cells: HashSet::new(),
        }
    }

    pub fn tile_degrees(&self) -> f64 {
        self.tile_degrees
    }

    /// Returns the canonical cell for a cell value, recording it as known.
    pub fn canonical_cell(&mut self, cell: Cell) -> Cell {
        if self.known_cells.insert(cell) {
            log::debug!("[Board] Discovered cell {}", cell);
        }
        cell
    }

    /// Cell whose rounded corner matches `point`.
    pub fn cell_for_point(&mut self, point: LatLng) -> Cell {
        self.canonical_cell(Cell::from_degrees(point.lat, point.lng))
    }

    pub fn cell_bounds(&self, cell: &Cell) -> LatLngBounds {
        LatLngBounds {
            south_west: LatLng::new(cell.i(), cell.j()),
            north_east: LatLng::new(cell.i() + self.tile_degrees, cell.j() + self.tile_degrees),
        }
    }

    /// The Moore neighbourhood of `cell`, one tile away in every direction.
    ///
    /// Order: N, E, S, W, NE, NW, SE, SW.
    pub fn neighbors(&mut self, cell: &Cell) -> [Cell; 8] {
        let t = self.tile_units;
        let offsets = [(t, 0), (0, t), (-t, 0), (0, -t), (t, t), (t, -t), (-t, t), (-t, -t)];
        offsets.map(|(di, dj)| self.canonical_cell(cell.offset(di, dj)))
    }

    /// Every cell in the scan window around `point`: offsets `-radius..radius` tiles on each
    /// axis, upper bound exclusive, in row-major order.
    pub fn cells_near_point(&mut self, point: LatLng) -> Vec<Cell> {
        let origin = Cell::from_degrees(point.lat, point.lng);
        let radius = i64::from(self.visibility_radius);
        let t = self.tile_units;
        let side = usize::try_from(2 * radius).unwrap_or(0);
        let mut result = Vec::with_capacity(side.checked_mul(side).unwrap_or(0));
        for di in -radius..radius {
            for dj in -radius..radius {
                result.push(self.canonical_cell(origin.offset(di * t, dj * t)));
            }
        }
        result
    }

    pub fn is_known(&self, cell: &Cell) -> bool {
        self.known_cells.contains(cell)
    }

    pub fn known_cell_count(&self) -> usize {
        self.known_cells.len()
    }

    pub fn clear(&mut self) {
        self.known_cells.clear();
    }
}
