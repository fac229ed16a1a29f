//! Test fixtures and helpers.
//!
//! Builders for units, tiles and players, plus [`Battlefield`], a bundle of
//! one simulation with the tile and player lists it is driven with.

use conquest_core::components::{PlayerId, TileId, Unit, UnitId, UnitKind};
use conquest_core::config::SimConfig;
use conquest_core::economy::{Player, Resources};
use conquest_core::math::GridPos;
use conquest_core::simulation::{Simulation, TickEvents};
use conquest_core::tiles::{Tile, TileKind};
use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Shorthand for a grid position.
#[must_use]
pub const fn pos(x: i32, y: i32) -> GridPos {
    GridPos::new(x, y)
}

/// A fresh unit of `kind` with placeholder id 0.
#[must_use]
pub fn unit(kind: UnitKind, owner: PlayerId, x: i32, y: i32) -> Unit {
    Unit::new(0, kind, owner, pos(x, y))
}

/// A player with a full capital and a comfortable stockpile.
#[must_use]
pub fn player(id: PlayerId) -> Player {
    Player::new(id, format!("player-{id}"), TileKind::CapitalCity.default_hp())
        .with_resources(Resources::new(1000, 1000, 1000))
}

/// A capital tile owned by `owner`.
#[must_use]
pub fn capital(id: TileId, owner: PlayerId, x: i32, y: i32) -> Tile {
    Tile::new(id, TileKind::CapitalCity, pos(x, y)).with_owner(owner)
}

/// A watchtower owned by `owner` with the default radius.
#[must_use]
pub fn watchtower(id: TileId, owner: PlayerId, x: i32, y: i32) -> Tile {
    Tile::new(id, TileKind::Watchtower, pos(x, y)).with_owner(owner)
}

/// Serializable battlefield layout, handy for RON-driven tests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BattlefieldLayout {
    /// Simulation tuning.
    pub config: SimConfig,
    /// Players.
    pub players: Vec<Player>,
    /// Tiles.
    pub tiles: Vec<Tile>,
    /// Units as `(kind, owner, position)`.
    pub units: Vec<(UnitKind, PlayerId, GridPos)>,
}

/// One simulation plus the tiles and players it is driven with.
#[derive(Debug, Clone)]
pub struct Battlefield {
    /// The room simulation.
    pub sim: Simulation,
    /// Tile list owned by the "game-state store".
    pub tiles: Vec<Tile>,
    /// Player list owned by the "game-state store".
    pub players: Vec<Player>,
}

impl Battlefield {
    /// Empty battlefield with default tuning and no players.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SimConfig::default())
    }

    /// Empty battlefield with the given tuning.
    #[must_use]
    pub fn with_config(config: SimConfig) -> Self {
        Self {
            sim: Simulation::new(config),
            tiles: Vec::new(),
            players: Vec::new(),
        }
    }

    /// Build from a layout.
    #[must_use]
    pub fn from_layout(layout: BattlefieldLayout) -> Self {
        let mut field = Self::with_config(layout.config);
        field.players = layout.players;
        field.tiles = layout.tiles;
        for (kind, owner, position) in layout.units {
            field.sim.spawn_unit(kind, owner, position);
        }
        field.sim.apply_terrain(&field.tiles);
        field
    }

    /// Parse a RON layout.
    ///
    /// # Panics
    ///
    /// Panics if the RON is malformed; this is a test helper.
    #[must_use]
    pub fn from_ron(source: &str) -> Self {
        let layout: BattlefieldLayout = ron::from_str(source).expect("invalid battlefield RON");
        Self::from_layout(layout)
    }

    /// Two players with capitals in opposite corners.
    #[must_use]
    pub fn two_player() -> Self {
        let mut field = Self::new();
        field.players = vec![player(1), player(2)];
        field.tiles = vec![capital(1, 1, 10, 10), capital(2, 2, 30, 30)];
        field
    }

    /// Two players with a small army each, facing off across open ground.
    #[must_use]
    pub fn skirmish() -> Self {
        let mut field = Self::two_player();
        for (i, kind) in UnitKind::ALL.into_iter().enumerate() {
            let offset = i as i32 * 2;
            field.sim.spawn_unit(kind, 1, pos(14 + offset, 18));
            field.sim.spawn_unit(kind, 2, pos(14 + offset, 22));
        }
        field
    }

    /// Spawn an idle unit.
    pub fn spawn(&mut self, kind: UnitKind, owner: PlayerId, x: i32, y: i32) -> UnitId {
        self.sim.spawn_unit(kind, owner, pos(x, y))
    }

    /// Advance one tick at the configured tick rate.
    pub fn step(&mut self) -> TickEvents {
        let dt = self.sim.config().tick_delta();
        self.sim.update(dt, &mut self.tiles, &mut self.players)
    }

    /// Advance `ticks` ticks, collecting every batch.
    pub fn run(&mut self, ticks: u64) -> Vec<TickEvents> {
        (0..ticks).map(|_| self.step()).collect()
    }

    /// Advance until `done` returns true or `max_ticks` pass.
    ///
    /// Returns the number of ticks run.
    pub fn run_until<F>(&mut self, max_ticks: u64, mut done: F) -> u64
    where
        F: FnMut(&TickEvents) -> bool,
    {
        for tick in 1..=max_ticks {
            let events = self.step();
            if done(&events) {
                return tick;
            }
        }
        max_ticks
    }
}

impl Default for Battlefield {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skirmish_layout() {
        let field = Battlefield::skirmish();
        assert_eq!(field.sim.units().len(), 8);
        assert_eq!(field.players.len(), 2);
    }

    #[test]
    fn test_from_ron() {
        let field = Battlefield::from_ron(
            r#"(
                players: [(id: 1, name: "a", resources: (gold: 0, food: 0, faith: 0), capital_hp: 1000, is_eliminated: false)],
                units: [(knight, 1, (x: 3, y: 4))],
            )"#,
        );
        assert_eq!(field.sim.units().len(), 1);
        assert_eq!(field.sim.get_unit(1).map(|u| u.position), Some(pos(3, 4)));
    }

    #[test]
    fn test_step_advances_tick() {
        let mut field = Battlefield::two_player();
        field.step();
        field.step();
        assert_eq!(field.sim.tick(), 2);
    }
}
