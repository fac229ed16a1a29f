//! Room host error types.

use conquest_core::error::GameError;
use thiserror::Error;

use crate::room::RoomId;

/// Errors raised by the room host.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Every room slot is taken.
    #[error("room limit reached ({max} rooms)")]
    RoomLimit {
        /// Configured maximum.
        max: usize,
    },

    /// A room with this id is already open.
    #[error("room {0} already exists")]
    RoomExists(RoomId),

    /// No room with this id.
    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    /// The room task has stopped and no longer accepts commands.
    #[error("room {0} is closed")]
    RoomClosed(RoomId),

    /// Server configuration could not be loaded.
    #[error("config error in {path}: {message}")]
    Config {
        /// Source of the config.
        path: String,
        /// Parse or validation message.
        message: String,
    },

    /// Error from the simulation core.
    #[error(transparent)]
    Game(#[from] GameError),
}

/// Result type alias for room host operations.
pub type Result<T> = std::result::Result<T, ServerError>;
