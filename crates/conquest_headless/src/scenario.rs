//! Scenario loading and configuration.
//!
//! Scenarios define the initial battlefield for headless runs: players,
//! tiles, starting units, and orders scheduled for specific ticks.
//!
//! # Example RON
//!
//! ```ron
//! Scenario(
//!     name: "Border skirmish",
//!     map_size: 20,
//!     max_ticks: 600,
//!     players: [
//!         (id: 1, name: "red", resources: (gold: 500, food: 500, faith: 0)),
//!         (id: 2, name: "blue"),
//!     ],
//!     tiles: [
//!         (id: 1, kind: capital_city, position: (x: 1, y: 10), owner: Some(1)),
//!         (id: 2, kind: capital_city, position: (x: 18, y: 10), owner: Some(2)),
//!     ],
//!     units: [
//!         (kind: knight, owner: 1, position: (x: 3, y: 10), count: 2),
//!     ],
//!     orders: [
//!         (at_tick: 1, order: Move(unit: 1, to: (x: 15, y: 10))),
//!     ],
//! )
//! ```

use std::collections::HashSet;
use std::path::Path;

use conquest_core::components::{PlayerId, TileId, UnitId, UnitKind};
use conquest_core::config::SimConfig;
use conquest_core::economy::{Player, Resources};
use conquest_core::math::GridPos;
use conquest_core::simulation::{Command, Simulation};
use conquest_core::tiles::{Tile, TileKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// Parsed, but describes an impossible battlefield.
    #[error("Invalid scenario: {0}")]
    Invalid(String),
}

fn default_map_size() -> u32 {
    40
}

fn default_max_ticks() -> u64 {
    6000
}

fn default_count() -> u32 {
    1
}

/// A complete scenario configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Side length of the square map. Overrides `config.map_size`.
    #[serde(default = "default_map_size")]
    pub map_size: u32,
    /// Stop after this many ticks if nobody has won.
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,
    /// Simulation tuning.
    #[serde(default)]
    pub config: SimConfig,
    /// Players.
    pub players: Vec<PlayerSetup>,
    /// Tiles on the board.
    #[serde(default)]
    pub tiles: Vec<TileSetup>,
    /// Starting units.
    #[serde(default)]
    pub units: Vec<UnitPlacement>,
    /// Orders fed to the simulation at given ticks.
    #[serde(default)]
    pub orders: Vec<ScheduledOrder>,
}

/// Starting state of one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSetup {
    /// Player id.
    pub id: PlayerId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Starting stockpile.
    #[serde(default)]
    pub resources: Resources,
    /// Capital hit points; defaults to the capital tile's.
    #[serde(default)]
    pub capital_hp: Option<u32>,
}

/// One tile on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileSetup {
    /// Tile id.
    pub id: TileId,
    /// Tile type.
    pub kind: TileKind,
    /// Board cell.
    pub position: GridPos,
    /// Owner, if any.
    #[serde(default)]
    pub owner: Option<PlayerId>,
    /// Hit points; defaults to the kind's.
    #[serde(default)]
    pub hp: Option<u32>,
    /// Resource pool; defaults to the kind's.
    #[serde(default)]
    pub resources: Option<Resources>,
    /// Watchtower aura radius override.
    #[serde(default)]
    pub aura_radius: Option<u32>,
}

/// A group of starting units laid out in a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitPlacement {
    /// Unit class.
    pub kind: UnitKind,
    /// Owner.
    pub owner: PlayerId,
    /// Cell of the first unit; the rest go one cell further along x each.
    pub position: GridPos,
    /// Number of units.
    #[serde(default = "default_count")]
    pub count: u32,
}

/// An order and the tick it is issued on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledOrder {
    /// Tick whose update applies the order (first tick is 1).
    pub at_tick: u64,
    /// The order.
    pub order: Order,
}

/// Scenario-file spelling of a simulation command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    /// Path a unit to a cell.
    Move {
        /// Unit id, in spawn order starting at 1.
        unit: UnitId,
        /// Destination.
        to: GridPos,
    },
    /// Halt a unit.
    Stop {
        /// Unit id.
        unit: UnitId,
    },
    /// Strike an enemy structure.
    AttackTile {
        /// Unit id.
        unit: UnitId,
        /// Target tile.
        tile: TileId,
    },
    /// Raid an enemy tile.
    Raid {
        /// Unit id.
        unit: UnitId,
        /// Target tile.
        tile: TileId,
    },
    /// Train a new unit.
    Train {
        /// Unit class.
        kind: UnitKind,
        /// Paying player.
        owner: PlayerId,
        /// Spawn cell.
        position: GridPos,
    },
}

impl Order {
    /// Convert to a simulation command.
    #[must_use]
    pub fn to_command(&self) -> Command {
        match *self {
            Self::Move { unit, to } => Command::Move {
                unit_id: unit,
                target: to,
                valid_mask: None,
            },
            Self::Stop { unit } => Command::Stop { unit_id: unit },
            Self::AttackTile { unit, tile } => Command::AttackTile {
                unit_id: unit,
                tile_id: tile,
            },
            Self::Raid { unit, tile } => Command::Raid {
                unit_id: unit,
                tile_id: tile,
            },
            Self::Train {
                kind,
                owner,
                position,
            } => Command::Train {
                kind,
                owner,
                position,
            },
        }
    }
}

/// Everything a run needs, built from a scenario.
#[derive(Debug, Clone)]
pub struct BuiltScenario {
    /// Simulation with starting units placed.
    pub sim: Simulation,
    /// Tiles.
    pub tiles: Vec<Tile>,
    /// Players.
    pub players: Vec<Player>,
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Self = ron::from_str(ron)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Standard two-player skirmish: mixed armies meeting mid-map.
    #[must_use]
    pub fn skirmish_1v1() -> Self {
        let mut units = Vec::new();
        let mut orders = Vec::new();
        for (row, kind) in UnitKind::ALL.into_iter().enumerate() {
            let y = 17 + row as i32 * 2;
            units.push(UnitPlacement {
                kind,
                owner: 1,
                position: GridPos::new(8, y),
                count: 1,
            });
            units.push(UnitPlacement {
                kind,
                owner: 2,
                position: GridPos::new(31, y),
                count: 1,
            });
            // Player 1 units get odd ids in this layout.
            orders.push(ScheduledOrder {
                at_tick: 1,
                order: Order::Move {
                    unit: row as UnitId * 2 + 1,
                    to: GridPos::new(30, y),
                },
            });
        }

        Self {
            name: "Standard 1v1 Skirmish".to_string(),
            description: "Player 1 marches on a defended line".to_string(),
            map_size: 40,
            max_ticks: 3000,
            config: SimConfig::default(),
            players: vec![
                PlayerSetup {
                    id: 1,
                    name: "red".to_string(),
                    resources: Resources::new(500, 500, 100),
                    capital_hp: None,
                },
                PlayerSetup {
                    id: 2,
                    name: "blue".to_string(),
                    resources: Resources::new(500, 500, 100),
                    capital_hp: None,
                },
            ],
            tiles: vec![
                TileSetup {
                    id: 1,
                    kind: TileKind::CapitalCity,
                    position: GridPos::new(3, 20),
                    owner: Some(1),
                    hp: None,
                    resources: None,
                    aura_radius: None,
                },
                TileSetup {
                    id: 2,
                    kind: TileKind::CapitalCity,
                    position: GridPos::new(36, 20),
                    owner: Some(2),
                    hp: None,
                    resources: None,
                    aura_radius: None,
                },
                TileSetup {
                    id: 3,
                    kind: TileKind::Watchtower,
                    position: GridPos::new(33, 20),
                    owner: Some(2),
                    hp: None,
                    resources: None,
                    aura_radius: Some(3),
                },
                TileSetup {
                    id: 4,
                    kind: TileKind::Marsh,
                    position: GridPos::new(20, 20),
                    owner: None,
                    hp: None,
                    resources: None,
                    aura_radius: None,
                },
            ],
            units,
            orders,
        }
    }

    /// Check references and bounds.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let invalid = |msg: String| Err(ScenarioError::Invalid(msg));

        if self.map_size == 0 {
            return invalid("map_size must be positive".into());
        }
        if self.players.is_empty() {
            return invalid("at least one player is required".into());
        }

        self.sim_config()
            .validate(&self.name)
            .map_err(|e| ScenarioError::Invalid(e.to_string()))?;

        let mut player_ids = HashSet::new();
        for player in &self.players {
            if !player_ids.insert(player.id) {
                return invalid(format!("duplicate player id {}", player.id));
            }
        }

        let mut tile_ids = HashSet::new();
        for tile in &self.tiles {
            if !tile_ids.insert(tile.id) {
                return invalid(format!("duplicate tile id {}", tile.id));
            }
            if !tile.position.in_bounds(self.map_size) {
                return invalid(format!("tile {} at {} is off the map", tile.id, tile.position));
            }
            if let Some(owner) = tile.owner {
                if !player_ids.contains(&owner) {
                    return invalid(format!("tile {} owned by unknown player {owner}", tile.id));
                }
            }
        }

        for group in &self.units {
            if !player_ids.contains(&group.owner) {
                return invalid(format!("units owned by unknown player {}", group.owner));
            }
            let last = group.position.offset(group.count.saturating_sub(1) as i32, 0);
            if !group.position.in_bounds(self.map_size) || !last.in_bounds(self.map_size) {
                return invalid(format!("unit row at {} runs off the map", group.position));
            }
        }

        Ok(())
    }

    /// Simulation config with the scenario's map size applied.
    #[must_use]
    pub fn sim_config(&self) -> SimConfig {
        SimConfig {
            map_size: self.map_size,
            ..self.config.clone()
        }
    }

    /// Number of units placed at start.
    #[must_use]
    pub fn unit_count(&self) -> u64 {
        self.units.iter().map(|g| u64::from(g.count)).sum()
    }

    /// Build the simulation, tiles and players.
    pub fn build(&self) -> Result<BuiltScenario, ScenarioError> {
        self.validate()?;

        let config = self.sim_config();

        let tiles: Vec<Tile> = self
            .tiles
            .iter()
            .map(|setup| {
                let mut tile = Tile::new(setup.id, setup.kind, setup.position);
                tile.owner = setup.owner;
                if let Some(hp) = setup.hp {
                    tile.hp = hp;
                    tile.max_hp = hp;
                }
                if let Some(resources) = setup.resources {
                    tile = tile.with_resources(resources);
                }
                if let Some(radius) = setup.aura_radius {
                    tile = tile.with_aura_radius(radius);
                }
                tile
            })
            .collect();

        let players: Vec<Player> = self
            .players
            .iter()
            .map(|setup| {
                let capital_hp = setup.capital_hp.unwrap_or_else(|| {
                    tiles
                        .iter()
                        .find(|t| t.kind == TileKind::CapitalCity && t.owner == Some(setup.id))
                        .map_or(TileKind::CapitalCity.default_hp(), |t| t.hp)
                });
                let name = if setup.name.is_empty() {
                    format!("player-{}", setup.id)
                } else {
                    setup.name.clone()
                };
                Player::new(setup.id, name, capital_hp).with_resources(setup.resources)
            })
            .collect();

        let mut sim = Simulation::new(config);
        sim.apply_terrain(&tiles);
        for group in &self.units {
            for i in 0..group.count {
                sim.spawn_unit(group.kind, group.owner, group.position.offset(i as i32, 0));
            }
        }

        Ok(BuiltScenario {
            sim,
            tiles,
            players,
        })
    }

    /// Orders issued on `tick`, in file order.
    pub fn orders_at(&self, tick: u64) -> impl Iterator<Item = Command> + '_ {
        self.orders
            .iter()
            .filter(move |o| o.at_tick == tick)
            .map(|o| o.order.to_command())
    }
}

impl Default for Scenario {
    fn default() -> Self {
        Self::skirmish_1v1()
    }
}
