//! Unit data definitions.
//!
//! Units are plain data. Relationships (a unit's target, a tile's owner)
//! are stored as ids and resolved by lookup at use time.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::economy::Resources;
use crate::math::{fixed_serde, Fixed, GridPos};

/// Unique identifier for units, minted per simulation.
pub type UnitId = u64;

/// Player identifier assigned by the room layer.
pub type PlayerId = u32;

/// Tile identifier assigned by the game-state store.
pub type TileId = u32;

// ============================================================================
// Unit Types
// ============================================================================

/// Trainable unit classes.
///
/// The classes form a soft rock-paper-scissors triangle (infantry beats
/// archers, archers beat knights, knights beat infantry) with siege as the
/// anti-structure specialist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// Melee line troops.
    Infantry,
    /// Ranged skirmishers.
    Archer,
    /// Heavy cavalry.
    Knight,
    /// Slow engines that wreck structures.
    Siege,
}

impl UnitKind {
    /// All kinds, in table order.
    pub const ALL: [Self; 4] = [Self::Infantry, Self::Archer, Self::Knight, Self::Siege];

    /// Base stat block for this kind.
    #[must_use]
    pub fn stats(self) -> UnitStats {
        match self {
            Self::Infantry => UnitStats {
                max_hp: 100,
                attack: 20,
                defense: 15,
                speed: Fixed::ONE,
                range: 1,
                training_time: Fixed::from_num(10),
                cost: Resources::new(50, 20, 0),
            },
            Self::Archer => UnitStats {
                max_hp: 75,
                attack: 25,
                defense: 10,
                speed: Fixed::ONE,
                range: 2,
                training_time: Fixed::from_num(12),
                cost: Resources::new(60, 20, 0),
            },
            Self::Knight => UnitStats {
                max_hp: 150,
                attack: 30,
                defense: 25,
                speed: Fixed::from_num(1.5),
                range: 1,
                training_time: Fixed::from_num(15),
                cost: Resources::new(100, 40, 0),
            },
            Self::Siege => UnitStats {
                max_hp: 120,
                attack: 50,
                defense: 5,
                speed: Fixed::from_num(0.5),
                range: 2,
                training_time: Fixed::from_num(20),
                cost: Resources::new(150, 0, 20),
            },
        }
    }
}

/// Base statistics for a unit kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStats {
    /// Maximum hit points.
    pub max_hp: u32,
    /// Damage per attack before effectiveness.
    pub attack: u32,
    /// Defense rating.
    pub defense: u32,
    /// Movement speed in tiles per second.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    /// Attack range in tiles (Manhattan).
    pub range: u32,
    /// Seconds spent in training.
    #[serde(with = "fixed_serde")]
    pub training_time: Fixed,
    /// Resources charged by the training building.
    pub cost: Resources,
}

/// Lifecycle state of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    /// Standing still, may acquire targets.
    #[default]
    Idle,
    /// Following a path.
    Moving,
    /// Engaged with a target.
    Attacking,
    /// Terminal.
    Dead,
    /// Waiting for its training timer.
    Training,
}

/// What a unit's current order points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// A bare grid cell (move orders).
    Position,
    /// Another unit.
    Unit(UnitId),
    /// A tile on the board.
    Tile(TileId),
}

/// Current order target of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Target type and id.
    pub kind: TargetKind,
    /// Where the target was when the order was issued.
    pub position: GridPos,
}

/// Training timer for a unit in the `Training` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Training {
    /// Simulation time the timer started at (seconds).
    #[serde(with = "fixed_serde")]
    pub started_at: Fixed,
    /// Timer length (seconds).
    #[serde(with = "fixed_serde")]
    pub duration: Fixed,
}

impl Training {
    /// Check whether the timer has elapsed at `now`.
    #[must_use]
    pub fn is_complete(&self, now: Fixed) -> bool {
        now - self.started_at >= self.duration
    }
}

/// A unit on the battlefield.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Unique id within the room.
    pub id: UnitId,
    /// Unit class.
    pub kind: UnitKind,
    /// Owning player.
    pub owner: PlayerId,
    /// Current grid cell.
    pub position: GridPos,
    /// Current hit points.
    pub hp: u32,
    /// Maximum hit points.
    pub max_hp: u32,
    /// Damage per attack before effectiveness.
    pub attack: u32,
    /// Defense rating.
    pub defense: u32,
    /// Movement speed in tiles per second.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    /// Attack range in tiles.
    pub range: u32,
    /// Lifecycle state.
    pub status: UnitStatus,
    /// Current order target.
    pub target: Option<Target>,
    /// Training timer while in `Training`.
    pub training: Option<Training>,
}

impl Unit {
    /// Create an idle unit with the base stats of `kind`.
    #[must_use]
    pub fn new(id: UnitId, kind: UnitKind, owner: PlayerId, position: GridPos) -> Self {
        let stats = kind.stats();
        Self {
            id,
            kind,
            owner,
            position,
            hp: stats.max_hp,
            max_hp: stats.max_hp,
            attack: stats.attack,
            defense: stats.defense,
            speed: stats.speed,
            range: stats.range,
            status: UnitStatus::Idle,
            target: None,
            training: None,
        }
    }

    /// Builder: put the unit into training starting at `started_at`.
    #[must_use]
    pub fn in_training(mut self, started_at: Fixed) -> Self {
        self.status = UnitStatus::Training;
        self.training = Some(Training {
            started_at,
            duration: self.kind.stats().training_time,
        });
        self
    }

    /// Check if unit is dead.
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        matches!(self.status, UnitStatus::Dead)
    }

    /// Check whether `position` is within attack range.
    #[must_use]
    pub fn is_in_range(&self, position: GridPos) -> bool {
        self.position.manhattan_distance(position) <= self.range
    }

    /// Apply damage. Returns `true` if this damage killed the unit.
    ///
    /// Hit points clamp at zero and the unit becomes `Dead`. Damage to an
    /// already dead unit is ignored.
    pub fn take_damage(&mut self, amount: u32) -> bool {
        if self.is_dead() {
            return false;
        }
        self.hp = self.hp.saturating_sub(amount);
        if self.hp == 0 {
            self.status = UnitStatus::Dead;
            self.target = None;
            true
        } else {
            false
        }
    }
}

/// Arena of units keyed by id.
///
/// Ids are minted here, per simulation, so rooms never share a counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitStore {
    units: HashMap<UnitId, Unit>,
    next_id: UnitId,
}

impl Default for UnitStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitStore {
    /// Create an empty store. The first id handed out is 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            units: HashMap::new(),
            next_id: 1,
        }
    }

    /// Insert a unit under a fresh id and return the id.
    pub fn insert(&mut self, mut unit: Unit) -> UnitId {
        let id = self.next_id;
        self.next_id += 1;
        unit.id = id;
        self.units.insert(id, unit);
        id
    }

    /// Remove a unit by id.
    pub fn remove(&mut self, id: UnitId) -> Option<Unit> {
        self.units.remove(&id)
    }

    /// Get a unit by id.
    #[must_use]
    pub fn get(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id)
    }

    /// Get a mutable reference to a unit by id.
    pub fn get_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.units.get_mut(&id)
    }

    /// Check if a unit exists.
    #[must_use]
    pub fn contains(&self, id: UnitId) -> bool {
        self.units.contains_key(&id)
    }

    /// Number of units, dead ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Ids in ascending order, for deterministic iteration.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<UnitId> {
        let mut ids: Vec<_> = self.units.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Units in ascending id order.
    pub fn iter_sorted(&self) -> impl Iterator<Item = &Unit> {
        self.sorted_ids().into_iter().filter_map(|id| self.units.get(&id))
    }

    /// Iterate over all units (not in deterministic order).
    pub fn iter(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_mints_sequential_ids() {
        let mut store = UnitStore::new();
        let a = store.insert(Unit::new(0, UnitKind::Archer, 1, GridPos::ZERO));
        let b = store.insert(Unit::new(0, UnitKind::Knight, 2, GridPos::new(1, 1)));

        assert_eq!((a, b), (1, 2));
        assert_eq!(store.get(b).map(|u| u.id), Some(2));
        assert_eq!(store.sorted_ids(), vec![1, 2]);

        store.remove(a);
        let c = store.insert(Unit::new(0, UnitKind::Siege, 1, GridPos::ZERO));
        assert_eq!(c, 3);
        let kinds: Vec<_> = store.iter_sorted().map(|u| u.kind).collect();
        assert_eq!(kinds, vec![UnitKind::Knight, UnitKind::Siege]);
    }

    #[test]
    fn test_unit_from_kind_stats() {
        let siege = Unit::new(1, UnitKind::Siege, 1, GridPos::new(10, 10));
        assert_eq!(siege.hp, 120);
        assert_eq!(siege.max_hp, 120);
        assert_eq!(siege.attack, 50);
        assert_eq!(siege.speed, Fixed::from_num(0.5));
        assert_eq!(siege.range, 2);
        assert_eq!(siege.status, UnitStatus::Idle);
    }

    #[test]
    fn test_range_detection() {
        let archer = Unit::new(1, UnitKind::Archer, 1, GridPos::new(10, 10));
        assert!(archer.is_in_range(GridPos::new(10, 12)));
        assert!(archer.is_in_range(GridPos::new(11, 11)));
        assert!(!archer.is_in_range(GridPos::new(10, 13)));
    }

    #[test]
    fn test_take_damage_and_death() {
        let mut unit = Unit::new(1, UnitKind::Infantry, 1, GridPos::new(10, 10));

        assert!(!unit.take_damage(50));
        assert_eq!(unit.hp, 50);
        assert_eq!(unit.status, UnitStatus::Idle);

        assert!(unit.take_damage(60));
        assert_eq!(unit.hp, 0);
        assert_eq!(unit.status, UnitStatus::Dead);

        // Dead units do not die twice
        assert!(!unit.take_damage(10));
    }

    #[test]
    fn test_training_timer() {
        let unit = Unit::new(1, UnitKind::Infantry, 1, GridPos::ZERO).in_training(Fixed::from_num(2));
        assert_eq!(unit.status, UnitStatus::Training);

        let training = unit.training.unwrap();
        assert_eq!(training.duration, Fixed::from_num(10));
        assert!(!training.is_complete(Fixed::from_num(11)));
        assert!(training.is_complete(Fixed::from_num(12)));
    }
}
