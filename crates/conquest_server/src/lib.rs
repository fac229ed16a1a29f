//! # Conquest Room Host
//!
//! Runs battlefield rooms for the conquest game server.
//!
//! Each room is one tokio task owning its own simulation, tiles and
//! players. Rooms share no state; the registry only holds their handles.
//! Transport (websockets, sessions, persistence) lives outside this crate
//! and talks to rooms through [`RoomHandle`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod config;
pub mod error;
pub mod registry;
pub mod room;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use registry::RoomRegistry;
pub use room::{
    spawn_room, spawn_room_with, RoomBroadcast, RoomCommand, RoomHandle, RoomId, RoomOutcome,
    StopReason,
};
