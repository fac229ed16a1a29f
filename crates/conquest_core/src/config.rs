//! Simulation tuning loaded from RON.
//!
//! The file stores integer units (percentages, milliseconds) so it stays
//! readable; accessors convert to fixed point on use.
//!
//! # Example RON
//!
//! ```ron
//! SimConfig(
//!     map_size: 40,
//!     tick_rate: 10,
//!     spatial_cell_size: 4,
//!     attack_cooldown_ms: 1000,
//!     aura_multiplier_percent: 125,
//!     default_aura_radius: 2,
//!     raid_percent: 10,
//!     raid_history_limit: 100,
//!     marsh_weight_percent: 200,
//! )
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::math::{millis, percent, Fixed};

/// Upper bound for percentage fields.
pub const MAX_PERCENT: u32 = 100_000;

/// Upper bound for the attack cooldown, one hour.
pub const MAX_COOLDOWN_MS: u32 = 3_600_000;

/// Largest accepted map side.
pub const MAX_MAP_SIZE: u32 = 4096;

/// Room-level simulation tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Side length of the square map.
    pub map_size: u32,
    /// Ticks per second the room host drives `update` at.
    pub tick_rate: u32,
    /// Spatial hash bucket size in grid cells.
    pub spatial_cell_size: u32,
    /// Per-unit attack cooldown.
    pub attack_cooldown_ms: u32,
    /// Watchtower defense multiplier, in percent.
    pub aura_multiplier_percent: u32,
    /// Aura radius for watchtowers without metadata.
    pub default_aura_radius: u32,
    /// Share of each resource a raid steals, in percent.
    pub raid_percent: u32,
    /// Number of raids kept in history.
    pub raid_history_limit: usize,
    /// Pathfinding cost of entering a marsh, in percent.
    pub marsh_weight_percent: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            map_size: 40,
            tick_rate: 10,
            spatial_cell_size: 4,
            attack_cooldown_ms: 1000,
            aura_multiplier_percent: 125,
            default_aura_radius: 2,
            raid_percent: 10,
            raid_history_limit: 100,
            marsh_weight_percent: 200,
        }
    }
}

impl SimConfig {
    /// Parse a config from a RON string.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Config`] if the RON is malformed or a value is
    /// out of range.
    pub fn from_ron(source: &str) -> Result<Self> {
        let config: Self = ron::from_str(source).map_err(|e| GameError::Config {
            path: "<inline>".into(),
            message: e.to_string(),
        })?;
        config.validate("<inline>")?;
        Ok(config)
    }

    /// Load a config from a RON file.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Config`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let contents = std::fs::read_to_string(path).map_err(|e| GameError::Config {
            path: display.clone(),
            message: e.to_string(),
        })?;
        let config: Self = ron::from_str(&contents).map_err(|e| GameError::Config {
            path: display.clone(),
            message: e.to_string(),
        })?;
        config.validate(&display)?;
        Ok(config)
    }

    /// Check every field is in range. `path` names the source in errors.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Config`] naming the first bad field.
    pub fn validate(&self, path: &str) -> Result<()> {
        let fail = |message: &str| {
            Err(GameError::Config {
                path: path.to_string(),
                message: message.to_string(),
            })
        };
        if self.map_size == 0 || self.map_size > MAX_MAP_SIZE {
            return fail("map_size must be between 1 and 4096");
        }
        if self.tick_rate == 0 {
            return fail("tick_rate must be positive");
        }
        if self.spatial_cell_size == 0 {
            return fail("spatial_cell_size must be positive");
        }
        if self.raid_percent > 100 {
            return fail("raid_percent must be at most 100");
        }
        if self.attack_cooldown_ms > MAX_COOLDOWN_MS {
            return fail("attack_cooldown_ms must be at most one hour");
        }
        if self.aura_multiplier_percent == 0 || self.aura_multiplier_percent > MAX_PERCENT {
            return fail("aura_multiplier_percent must be between 1 and 100000");
        }
        if self.marsh_weight_percent > MAX_PERCENT {
            return fail("marsh_weight_percent must be at most 100000");
        }
        Ok(())
    }

    /// Attack cooldown in seconds.
    #[must_use]
    pub fn attack_cooldown(&self) -> Fixed {
        millis(self.attack_cooldown_ms)
    }

    /// Watchtower defense multiplier.
    #[must_use]
    pub fn aura_multiplier(&self) -> Fixed {
        percent(self.aura_multiplier_percent)
    }

    /// Marsh path cost.
    #[must_use]
    pub fn marsh_weight(&self) -> Fixed {
        percent(self.marsh_weight_percent)
    }

    /// Seconds per tick at the configured tick rate.
    #[must_use]
    pub fn tick_delta(&self) -> Fixed {
        Fixed::ONE / Fixed::from_num(self.tick_rate.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_convert() {
        let config = SimConfig::default();
        assert_eq!(config.attack_cooldown(), Fixed::ONE);
        assert_eq!(config.aura_multiplier(), Fixed::from_num(1.25));
        assert_eq!(config.marsh_weight(), Fixed::from_num(2));
        assert_eq!(config.tick_delta(), Fixed::ONE / Fixed::from_num(10));
    }

    #[test]
    fn test_from_ron_partial() {
        let config = SimConfig::from_ron("(map_size: 20, attack_cooldown_ms: 500)").unwrap();
        assert_eq!(config.map_size, 20);
        assert_eq!(config.attack_cooldown(), Fixed::from_num(0.5));
        assert_eq!(config.spatial_cell_size, 4);
    }

    #[test]
    fn test_from_ron_rejects_zero_map() {
        let err = SimConfig::from_ron("(map_size: 0)").unwrap_err();
        assert!(matches!(err, GameError::Config { .. }));
    }

    #[test]
    fn test_validate_rejects_oversized_values() {
        for source in [
            "(aura_multiplier_percent: 4000000000)",
            "(aura_multiplier_percent: 0)",
            "(marsh_weight_percent: 3000000000)",
            "(attack_cooldown_ms: 4000000000)",
            "(map_size: 100000)",
        ] {
            assert!(SimConfig::from_ron(source).is_err(), "{source} accepted");
        }
        assert!(SimConfig::default().validate("default").is_ok());
    }

    #[test]
    fn test_from_ron_rejects_garbage() {
        assert!(SimConfig::from_ron("not ron at all {").is_err());
    }
}
