//! # Conquest Core
//!
//! Deterministic battlefield simulation for the conquest game server.
//!
//! This crate contains **only** the per-room engine:
//! - No networking
//! - No room lifecycle
//! - No system randomness
//! - No floating-point math (uses fixed-point)
//!
//! Tiles and players are owned by the caller and passed into each
//! [`Simulation::update`](simulation::Simulation::update), which runs
//! training, movement, spatial indexing, combat and conquest in a fixed
//! order and returns one event batch.
//!
//! ## Crate Structure
//!
//! - [`pathfinding`] - Weighted-grid A* search
//! - [`movement`] - Continuous movement along paths
//! - [`spatial`] - Uniform-bucket spatial hash
//! - [`combat`] - Target acquisition, damage and cooldowns
//! - [`conquest`] - Auras, raids, structure damage, elimination
//! - [`simulation`] - Per-room orchestrator and command queue
//! - [`math`] - Fixed-point math and grid coordinates

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod combat;
pub mod components;
pub mod config;
pub mod conquest;
pub mod economy;
pub mod error;
pub mod math;
pub mod movement;
pub mod pathfinding;
pub mod simulation;
pub mod spatial;
pub mod tiles;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::combat::{CombatEvent, CombatEventKind, CombatPrediction, CombatSystem};
    pub use crate::components::*;
    pub use crate::config::SimConfig;
    pub use crate::conquest::{Aura, ConquestSystem, RaidResult, RaidStats, StructureDamage};
    pub use crate::economy::{Player, ResourceKind, Resources};
    pub use crate::error::{GameError, Result};
    pub use crate::math::{Fixed, GridPos};
    pub use crate::movement::{MoveStep, MovementSystem};
    pub use crate::pathfinding::{find_path, NavGrid};
    pub use crate::simulation::{
        Command, CommandOutcome, MovementEvent, RoomSnapshot, Simulation, StructureAttack,
        TickEvents, TrainingCompleted,
    };
    pub use crate::spatial::SpatialHash;
    pub use crate::tiles::{Tile, TileKind, TileMetadata};
}
