use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::LatLng;
use crate::{
    CACHE_SPAWN_PROBABILITY, GRID_SCALE, MAX_COINS_PER_CELL, MAX_VISIBILITY_RADIUS, MERRILL_CLASSROOM,
    TILE_DEGREES, VISIBILITY_RADIUS,
};

/// World parameters, fixed once a session is constructed.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct GameConfig {
    pub tile_degrees: f64,
    pub visibility_radius: u32,   // tiles scanned per axis around the player
    pub cache_spawn_probability: f64,
    pub max_coins_per_cell: u32,
    pub start_position: LatLng,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tile_degrees: TILE_DEGREES,
            visibility_radius: VISIBILITY_RADIUS,
            cache_spawn_probability: CACHE_SPAWN_PROBABILITY,
            max_coins_per_cell: MAX_COINS_PER_CELL,
            start_position: MERRILL_CLASSROOM,
        }
    }
}

impl GameConfig {
    /// Parses a JSON config; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.tile_degrees.is_finite() || self.tile_degrees <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "tile_degrees",
                reason: format!("must be a positive number, got {}", self.tile_degrees),
            });
        }
        let units = self.tile_degrees * GRID_SCALE;
        if units < 0.5 || (units - units.round()).abs() > 1e-6 {
            return Err(ConfigError::Invalid {
                field: "tile_degrees",
                reason: format!("{} is not a whole multiple of {}", self.tile_degrees, 1.0 / GRID_SCALE),
            });
        }
        if self.visibility_radius > MAX_VISIBILITY_RADIUS {
            return Err(ConfigError::Invalid {
                field: "visibility_radius",
                reason: format!("must be at most {}, got {}", MAX_VISIBILITY_RADIUS, self.visibility_radius),
            });
        }
        if !(0.0..=1.0).contains(&self.cache_spawn_probability) {
            return Err(ConfigError::Invalid {
                field: "cache_spawn_probability",
                reason: format!("must be within [0, 1], got {}", self.cache_spawn_probability),
            });
        }
        if self.max_coins_per_cell == 0 {
            return Err(ConfigError::Invalid {
                field: "max_coins_per_cell",
                reason: "must be at least 1".to_string(),
            });
        }
        if !self.start_position.is_finite() {
            return Err(ConfigError::Invalid {
                field: "start_position",
                reason: "must be a finite coordinate".to_string(),
            });
        }
        Ok(())
    }
}
