use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{GRID_SCALE, GRID_UNITS_PER_DEGREE};

/// A continuous geographic coordinate in degrees.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

/// Axis-aligned rectangle covered by a cell, corner to corner.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LatLngBounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

/// Canonical grid square, identified by its lower-left corner.
///
/// The corner is stored as integer grid units (degrees rounded to `GRID_PRECISION` places), so two
/// coordinates that round to the same corner produce identical `Cell` values. Equality,
/// hashing and ordering are all by those units.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
    lat_units: i64,
    lng_units: i64,
}

impl Cell {
    pub(crate) const fn from_units(lat_units: i64, lng_units: i64) -> Self {
        Self { lat_units, lng_units }
    }

    /// Rounds a raw coordinate to the grid precision.
    pub(crate) fn from_degrees(lat: f64, lng: f64) -> Self {
        Self {
            lat_units: degrees_to_units(lat),
            lng_units: degrees_to_units(lng),
        }
    }

    /// Latitude of the lower-left corner.
    pub fn i(&self) -> f64 {
        self.lat_units as f64 / GRID_SCALE
    }

    /// Longitude of the lower-left corner.
    pub fn j(&self) -> f64 {
        self.lng_units as f64 / GRID_SCALE
    }

    pub fn units(&self) -> (i64, i64) {
        (self.lat_units, self.lng_units)
    }

    /// Canonical `"i,j"` text form. Used as the persistence key and as the spawn seed.
    pub fn key(&self) -> String {
        format!("{},{}", self.i(), self.j())
    }

    pub(crate) fn offset(&self, lat_units: i64, lng_units: i64) -> Self {
        Self {
            lat_units: self.lat_units + lat_units,
            lng_units: self.lng_units + lng_units,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.i(), self.j())
    }
}

/// Magnitude from which every `f64` is a whole number.
const INTEGRAL_DEGREES: f64 = (1u64 << 52) as f64;

/// Rounds the exact binary value of `degrees` to grid units, half away from zero.
///
/// Multiplying by `GRID_SCALE` in floating point would round twice, so the value is split into
/// `mantissa / 2^shift` and scaled in integers. `36.99955` is stored as `36.99954999...` and
/// therefore lands on `369995`, the same answer as printing it to four decimal places.
pub(crate) fn degrees_to_units(degrees: f64) -> i64 {
    if !degrees.is_finite() || degrees.abs() >= INTEGRAL_DEGREES {
        return (degrees * GRID_SCALE).round() as i64;
    }
    let bits = degrees.abs().to_bits();
    let exponent = ((bits >> 52) & 0x7ff) as i32;
    let fraction = bits & ((1u64 << 52) - 1);
    let (mantissa, shift) = if exponent == 0 {
        (fraction, 1074)
    } else {
        (fraction | (1u64 << 52), 1075 - exponent)
    };

    let scaled = u128::from(mantissa) * GRID_UNITS_PER_DEGREE as u128;
    let magnitude = if shift >= 128 {
        0
    } else {
        let quotient = scaled >> shift;
        let remainder = scaled - (quotient << shift);
        if remainder << 1 >= 1u128 << shift {
            quotient + 1
        } else {
            quotient
        }
    };
    let magnitude = i64::try_from(magnitude).unwrap_or(i64::MAX);
    if degrees.is_sign_negative() {
        -magnitude
    } else {
        magnitude
    }
}

/// A coin. Its identity is `(origin cell, serial)` and never changes, wherever it travels.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Geocoin {
    pub cell: Cell,
    pub serial: u32,
}

impl Geocoin {
    pub const fn new(cell: Cell, serial: u32) -> Self {
        Self { cell, serial }
    }

    /// The `"i,j,serial"` label shown to players and written to storage.
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Geocoin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.cell, self.serial)
    }
}

/// The coins currently sitting at one discovered cell.
///
/// Contents are only changed through the ledger's transfer operations.
#[derive(Clone, Debug, PartialEq)]
pub struct Geocache {
    pub cell: Cell,
    pub(crate) coins: Vec<Geocoin>,
}

impl Geocache {
    pub(crate) fn new(cell: Cell, coins: Vec<Geocoin>) -> Self {
        Self { cell, coins }
    }

    pub fn coins(&self) -> &[Geocoin] {
        &self.coins
    }

    pub fn len(&self) -> usize {
        self.coins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coins.is_empty()
    }

    pub fn contains(&self, coin: &Geocoin) -> bool {
        self.coins.contains(coin)
    }
}

/// The player's personal coin collection, in pickup order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Inventory {
    pub(crate) coins: Vec<Geocoin>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_coins(coins: Vec<Geocoin>) -> Self {
        Self { coins }
    }

    pub fn coins(&self) -> &[Geocoin] {
        &self.coins
    }

    pub fn len(&self) -> usize {
        self.coins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coins.is_empty()
    }

    pub fn contains(&self, coin: &Geocoin) -> bool {
        self.coins.contains(coin)
    }
}

/// Where a coin currently is. Location is derived from membership, never stored on the coin.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CoinLocation {
    Cache(Cell),
    Inventory,
}

/// One-tile movement steps.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    /// `(lat, lng)` step in tiles.
    pub fn step(&self) -> (i64, i64) {
        match self {
            Direction::North => (1, 0),
            Direction::South => (-1, 0),
            Direction::East => (0, 1),
            Direction::West => (0, -1),
        }
    }
}
