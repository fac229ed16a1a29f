//! Board tiles: the structures and terrain units fight over.
//!
//! Tiles are owned by the game-state store outside the core. The simulation
//! reads positions, kinds and owners every tick and writes back `hp` and
//! `owner` when a structure is attacked.

use serde::{Deserialize, Serialize};

use crate::components::{PlayerId, TileId};
use crate::economy::Resources;
use crate::math::{Fixed, GridPos};

/// Default watchtower aura radius when a tile carries no metadata.
pub const DEFAULT_AURA_RADIUS: u32 = 2;

/// Tile types that can be placed on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileKind {
    /// A player's seat. Losing it eliminates the player.
    CapitalCity,
    /// Neutral or captured city.
    City,
    /// Farmland.
    Field,
    /// Faith producer.
    Monastery,
    /// Slow terrain.
    Marsh,
    /// Gold producer.
    Mine,
    /// Food producer.
    Orchard,
    /// Unit training site.
    Barracks,
    /// Projects a defensive aura over friendly units.
    Watchtower,
}

impl TileKind {
    /// Check whether this tile is a capital.
    #[must_use]
    pub const fn is_capital(self) -> bool {
        matches!(self, Self::CapitalCity)
    }

    /// Check whether owned tiles of this kind project a defense aura.
    #[must_use]
    pub const fn projects_aura(self) -> bool {
        matches!(self, Self::Watchtower)
    }

    /// Pathfinding cost of entering a tile of this kind.
    ///
    /// Marsh costs `marsh_weight`, every other kind costs 1.
    #[must_use]
    pub fn terrain_weight(self, marsh_weight: Fixed) -> Fixed {
        match self {
            Self::Marsh => marsh_weight,
            _ => Fixed::ONE,
        }
    }

    /// Hit points a freshly placed tile of this kind starts with.
    #[must_use]
    pub const fn default_hp(self) -> u32 {
        match self {
            Self::CapitalCity => 1000,
            Self::Monastery => 300,
            Self::Mine | Self::Orchard => 150,
            Self::City => 60,
            Self::Field | Self::Marsh => 30,
            Self::Barracks | Self::Watchtower => 50,
        }
    }

    /// Resource yield a freshly placed tile of this kind carries.
    #[must_use]
    pub const fn default_resources(self) -> Resources {
        match self {
            Self::CapitalCity | Self::Mine => Resources::new(2, 0, 0),
            Self::City => Resources::new(30, 30, 0),
            Self::Field => Resources::new(0, 20, 0),
            Self::Orchard => Resources::new(0, 2, 0),
            Self::Monastery => Resources::new(0, 0, 50),
            Self::Marsh | Self::Barracks | Self::Watchtower => Resources::ZERO,
        }
    }

    /// Default metadata for this kind.
    #[must_use]
    pub fn default_metadata(self) -> TileMetadata {
        TileMetadata {
            can_train: matches!(self, Self::CapitalCity | Self::City | Self::Barracks),
            speed_percent: if matches!(self, Self::Marsh) { 30 } else { 100 },
            ..TileMetadata::default()
        }
    }
}

/// Optional per-tile tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileMetadata {
    /// Watchtower aura radius (Manhattan).
    pub aura_radius: u32,
    /// Movement speed multiplier for units crossing the tile, in percent.
    pub speed_percent: u32,
    /// Flat defense bonus, in percent.
    pub defense_bonus_percent: u32,
    /// Whether units can be trained here.
    pub can_train: bool,
}

impl Default for TileMetadata {
    fn default() -> Self {
        Self {
            aura_radius: DEFAULT_AURA_RADIUS,
            speed_percent: 100,
            defense_bonus_percent: 0,
            can_train: false,
        }
    }
}

/// A tile on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    /// Tile id.
    pub id: TileId,
    /// Tile type.
    pub kind: TileKind,
    /// Board cell.
    pub position: GridPos,
    /// Owning player, `None` when neutral or destroyed.
    pub owner: Option<PlayerId>,
    /// Current hit points.
    pub hp: u32,
    /// Maximum hit points.
    pub max_hp: u32,
    /// Stored / produced resources. Raids steal from this pool.
    pub resources: Resources,
    /// Optional tuning.
    pub metadata: Option<TileMetadata>,
}

impl Tile {
    /// Create a neutral tile with the defaults of `kind`.
    #[must_use]
    pub fn new(id: TileId, kind: TileKind, position: GridPos) -> Self {
        let hp = kind.default_hp();
        Self {
            id,
            kind,
            position,
            owner: None,
            hp,
            max_hp: hp,
            resources: kind.default_resources(),
            metadata: Some(kind.default_metadata()),
        }
    }

    /// Builder: set the owner.
    #[must_use]
    pub const fn with_owner(mut self, owner: PlayerId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Builder: set the resource pool.
    #[must_use]
    pub const fn with_resources(mut self, resources: Resources) -> Self {
        self.resources = resources;
        self
    }

    /// Builder: set the aura radius.
    #[must_use]
    pub fn with_aura_radius(mut self, radius: u32) -> Self {
        let mut metadata = self.metadata.unwrap_or_default();
        metadata.aura_radius = radius;
        self.metadata = Some(metadata);
        self
    }

    /// Aura radius from metadata, or `default` when the tile has none.
    #[must_use]
    pub fn aura_radius(&self, default: u32) -> u32 {
        self.metadata.map_or(default, |m| m.aura_radius)
    }

    /// Check whether the structure has been destroyed.
    #[must_use]
    pub const fn is_destroyed(&self) -> bool {
        self.hp == 0
    }
}

/// Find a tile by id in a tile list.
#[must_use]
pub fn find_tile(tiles: &[Tile], id: TileId) -> Option<&Tile> {
    tiles.iter().find(|t| t.id == id)
}

/// Find the index of a tile by id.
#[must_use]
pub fn tile_index(tiles: &[Tile], id: TileId) -> Option<usize> {
    tiles.iter().position(|t| t.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_defaults() {
        let capital = Tile::new(1, TileKind::CapitalCity, GridPos::new(10, 10));
        assert_eq!(capital.hp, 1000);
        assert_eq!(capital.max_hp, 1000);
        assert!(capital.kind.is_capital());
        assert!(capital.metadata.is_some_and(|m| m.can_train));

        let field = Tile::new(2, TileKind::Field, GridPos::new(9, 10));
        assert_eq!(field.resources, Resources::new(0, 20, 0));
        assert_eq!(field.owner, None);
    }

    #[test]
    fn test_terrain_weight() {
        let marsh_weight = Fixed::from_num(2);
        assert_eq!(TileKind::Marsh.terrain_weight(marsh_weight), marsh_weight);
        assert_eq!(TileKind::Field.terrain_weight(marsh_weight), Fixed::ONE);
    }

    #[test]
    fn test_aura_radius_fallback() {
        let mut tower = Tile::new(1, TileKind::Watchtower, GridPos::ZERO).with_aura_radius(4);
        assert_eq!(tower.aura_radius(DEFAULT_AURA_RADIUS), 4);

        tower.metadata = None;
        assert_eq!(tower.aura_radius(DEFAULT_AURA_RADIUS), DEFAULT_AURA_RADIUS);
    }

    #[test]
    fn test_find_tile() {
        let tiles = vec![
            Tile::new(5, TileKind::Mine, GridPos::new(1, 1)),
            Tile::new(7, TileKind::Orchard, GridPos::new(2, 2)),
        ];
        assert_eq!(find_tile(&tiles, 7).map(|t| t.kind), Some(TileKind::Orchard));
        assert_eq!(tile_index(&tiles, 5), Some(0));
        assert!(find_tile(&tiles, 9).is_none());
    }
}
