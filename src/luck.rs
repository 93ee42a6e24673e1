//! # Deterministic luck
//!
//! Every random decision in the world (whether a cell surfaces a cache, how many coins it
//! starts with) is drawn from [`luck`], a pure function of a string seed. The same seed yields
//! the same value in every process on every platform, which is what lets a restarted session
//! agree with the caches it persisted earlier.

use sha2::{Digest, Sha256};

use crate::models::Cell;

/// Seed suffix used for a cell's initial coin count.
pub const INITIAL_VALUE_SEED_SUFFIX: &str = "initialValue";

const MANTISSA_BITS: u32 = 53;

/// Maps a seed to a value in `[0, 1)`.
///
/// The first eight bytes of the seed's SHA-256 digest are read big-endian and the top 53 bits
/// become the mantissa, so every representable output is equally likely and seeds that differ
/// only in a trailing digit are uncorrelated.
pub fn luck(seed: &str) -> f64 {
    let digest = Sha256::digest(seed.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    let bits = u64::from_be_bytes(head) >> (64 - MANTISSA_BITS);
    bits as f64 / (1u64 << MANTISSA_BITS) as f64
}

/// Source of deterministic luck. [`luck`] itself implements it; tests substitute closures
/// returning fixed values.
pub trait Luck {
    fn luck(&self, seed: &str) -> f64;
}

impl<F> Luck for F
where
    F: Fn(&str) -> f64,
{
    fn luck(&self, seed: &str) -> f64 {
        self(seed)
    }
}

/// Seed for the spawn predicate: the cell key alone.
pub fn spawn_seed(cell: &Cell) -> String {
    cell.key()
}

/// Seed for the cell's initial coin count.
pub fn initial_value_seed(cell: &Cell) -> String {
    format!("{},{}", cell.key(), INITIAL_VALUE_SEED_SUFFIX)
}

/// Whether a scanned cell should surface a cache to the player.
pub fn should_spawn_cache<L: Luck + ?Sized>(luck: &L, cell: &Cell, spawn_probability: f64) -> bool {
    luck.luck(&spawn_seed(cell)) < spawn_probability
}

/// Number of the highest serial minted in a cell: `floor(r * max_coins)`.
///
/// Serials run `0..=` this value, so a cell starts with between 1 and `max_coins + 1` coins.
pub fn initial_top_serial<L: Luck + ?Sized>(luck: &L, cell: &Cell, max_coins: u32) -> u32 {
    let r = luck.luck(&initial_value_seed(cell));
    // A misbehaving source must not mint an unbounded number of coins.
    let r = if r.is_finite() { r.clamp(0.0, 1.0) } else { 0.0 };
    ((r * f64::from(max_coins)).floor() as u32).min(max_coins)
}
