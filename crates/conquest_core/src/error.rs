//! Error types for the battlefield simulation.

use thiserror::Error;

use crate::components::{PlayerId, TileId, UnitId};

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all simulation errors.
///
/// Most public operations translate these into `false`/`None` plus a log
/// line, since stale ids from network races are expected. The error type is
/// used internally and at the per-unit boundary of a tick.
#[derive(Debug, Error)]
pub enum GameError {
    /// Unit id does not exist in this room.
    #[error("Unit not found: {0}")]
    UnitNotFound(UnitId),

    /// Tile id does not exist in the supplied tile list.
    #[error("Tile not found: {0}")]
    TileNotFound(TileId),

    /// Player id does not exist in the supplied player list.
    #[error("Player not found: {0}")]
    PlayerNotFound(PlayerId),

    /// Grid coordinate outside the square map.
    #[error("Position ({x}, {y}) is outside the {size}x{size} map")]
    OutOfBounds {
        /// X coordinate.
        x: i32,
        /// Y coordinate.
        y: i32,
        /// Map side length.
        size: u32,
    },

    /// Invalid simulation state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration could not be read or parsed.
    #[error("Failed to load config '{path}': {message}")]
    Config {
        /// Path (or `<inline>`) of the configuration source.
        path: String,
        /// Error message.
        message: String,
    },

    /// Binary encoding or decoding failed.
    #[error("Encoding failed: {0}")]
    Encode(String),
}
