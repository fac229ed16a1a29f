//! Room host configuration.

use std::path::Path;
use std::time::Duration;

use conquest_core::math::Fixed;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServerError};

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Ticks per second for every room.
    pub tick_rate: u32,
    /// Publish a snapshot every this many ticks.
    pub snapshot_interval_ticks: u64,
    /// Maximum concurrently open rooms.
    pub max_rooms: usize,
    /// Pending commands buffered per room.
    pub command_capacity: usize,
    /// Broadcast messages buffered per room before slow subscribers lag.
    pub broadcast_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_rate: 10,
            snapshot_interval_ticks: 3,
            max_rooms: 64,
            command_capacity: 256,
            broadcast_capacity: 256,
        }
    }
}

impl ServerConfig {
    /// Parse from a RON string.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] if the RON is malformed or a value is
    /// zero.
    pub fn from_ron(source: &str) -> Result<Self> {
        let config: Self = ron::from_str(source).map_err(|e| ServerError::Config {
            path: "<inline>".into(),
            message: e.to_string(),
        })?;
        config.validate("<inline>")?;
        Ok(config)
    }

    /// Load from a RON file.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let contents = std::fs::read_to_string(path).map_err(|e| ServerError::Config {
            path: display.clone(),
            message: e.to_string(),
        })?;
        let config: Self = ron::from_str(&contents).map_err(|e| ServerError::Config {
            path: display.clone(),
            message: e.to_string(),
        })?;
        config.validate(&display)?;
        Ok(config)
    }

    fn validate(&self, path: &str) -> Result<()> {
        let zero = [
            ("tick_rate", self.tick_rate == 0),
            ("snapshot_interval_ticks", self.snapshot_interval_ticks == 0),
            ("max_rooms", self.max_rooms == 0),
            ("command_capacity", self.command_capacity == 0),
            ("broadcast_capacity", self.broadcast_capacity == 0),
        ];
        match zero.iter().find(|(_, is_zero)| *is_zero) {
            Some((field, _)) => Err(ServerError::Config {
                path: path.to_string(),
                message: format!("{field} must be positive"),
            }),
            None => Ok(()),
        }
    }

    /// Wall-clock time between ticks.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(1) / self.tick_rate.max(1)
    }

    /// Simulation seconds advanced per tick.
    #[must_use]
    pub fn tick_delta(&self) -> Fixed {
        Fixed::ONE / Fixed::from_num(self.tick_rate.max(1))
    }
}
