//! Player resources and the player record the core reads each tick.
//!
//! The surrounding game-state store owns players; the core only touches
//! `resources`, `capital_hp` and `is_eliminated`. All arithmetic is integer
//! and saturates at zero.

use serde::{Deserialize, Serialize};

use crate::components::PlayerId;

/// The three resource types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Gold.
    Gold,
    /// Food.
    Food,
    /// Faith.
    Faith,
}

impl ResourceKind {
    /// All kinds, in display order.
    pub const ALL: [Self; 3] = [Self::Gold, Self::Food, Self::Faith];
}

/// A bundle of gold, food and faith.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Resources {
    /// Gold.
    pub gold: u32,
    /// Food.
    pub food: u32,
    /// Faith.
    pub faith: u32,
}

impl Resources {
    /// Create a new resource bundle.
    #[must_use]
    pub const fn new(gold: u32, food: u32, faith: u32) -> Self {
        Self { gold, food, faith }
    }

    /// Empty bundle.
    pub const ZERO: Self = Self::new(0, 0, 0);

    /// Amount of a single resource.
    #[must_use]
    pub const fn get(&self, kind: ResourceKind) -> u32 {
        match kind {
            ResourceKind::Gold => self.gold,
            ResourceKind::Food => self.food,
            ResourceKind::Faith => self.faith,
        }
    }

    /// Mutable access to a single resource.
    pub fn get_mut(&mut self, kind: ResourceKind) -> &mut u32 {
        match kind {
            ResourceKind::Gold => &mut self.gold,
            ResourceKind::Food => &mut self.food,
            ResourceKind::Faith => &mut self.faith,
        }
    }

    /// True when every resource is zero.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.gold == 0 && self.food == 0 && self.faith == 0
    }

    /// Take `percent`% of every resource, floored.
    #[must_use]
    pub fn fraction(&self, percent: u32) -> Self {
        let part = |amount: u32| (u64::from(amount) * u64::from(percent) / 100) as u32;
        Self::new(part(self.gold), part(self.food), part(self.faith))
    }

    /// Check whether every resource covers `cost`.
    #[must_use]
    pub const fn covers(&self, cost: &Self) -> bool {
        self.gold >= cost.gold && self.food >= cost.food && self.faith >= cost.faith
    }

    /// Component-wise addition, saturating at `u32::MAX`.
    #[must_use]
    pub const fn saturating_add(self, rhs: Self) -> Self {
        Self::new(
            self.gold.saturating_add(rhs.gold),
            self.food.saturating_add(rhs.food),
            self.faith.saturating_add(rhs.faith),
        )
    }

    /// Component-wise subtraction, clamping at zero.
    #[must_use]
    pub const fn saturating_sub(self, rhs: Self) -> Self {
        Self::new(
            self.gold.saturating_sub(rhs.gold),
            self.food.saturating_sub(rhs.food),
            self.faith.saturating_sub(rhs.faith),
        )
    }
}

impl std::ops::Add for Resources {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        self.saturating_add(rhs)
    }
}

impl std::ops::Sub for Resources {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        self.saturating_sub(rhs)
    }
}

impl std::ops::AddAssign for Resources {
    fn add_assign(&mut self, rhs: Self) {
        *self = self.saturating_add(rhs);
    }
}

impl std::ops::SubAssign for Resources {
    fn sub_assign(&mut self, rhs: Self) {
        *self = self.saturating_sub(rhs);
    }
}

/// A player as seen by the simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Player id.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Stockpiled resources.
    pub resources: Resources,
    /// Hit points mirrored from the player's capital tile.
    pub capital_hp: u32,
    /// Set once, when the capital falls.
    pub is_eliminated: bool,
}

impl Player {
    /// Create a player with an empty stockpile.
    #[must_use]
    pub fn new(id: PlayerId, name: impl Into<String>, capital_hp: u32) -> Self {
        Self {
            id,
            name: name.into(),
            resources: Resources::ZERO,
            capital_hp,
            is_eliminated: false,
        }
    }

    /// Builder: set starting resources.
    #[must_use]
    pub const fn with_resources(mut self, resources: Resources) -> Self {
        self.resources = resources;
        self
    }

    /// Try to spend `cost`. Returns `false` and leaves the stockpile untouched
    /// if any resource is short.
    pub fn spend(&mut self, cost: &Resources) -> bool {
        if !self.resources.covers(cost) {
            return false;
        }
        self.resources -= *cost;
        true
    }
}

/// Find a player by id in a player list.
#[must_use]
pub fn find_player(players: &[Player], id: PlayerId) -> Option<&Player> {
    players.iter().find(|p| p.id == id)
}

/// Find a player by id in a player list, mutably.
pub fn find_player_mut(players: &mut [Player], id: PlayerId) -> Option<&mut Player> {
    players.iter_mut().find(|p| p.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resources_saturate() {
        let a = Resources::new(10, 5, 0);
        let b = Resources::new(20, 2, 1);
        assert_eq!(a - b, Resources::new(0, 3, 0));
        assert_eq!(a + b, Resources::new(30, 7, 1));

        let max = Resources::new(u32::MAX, 0, 0);
        assert_eq!((max + a).gold, u32::MAX);
    }

    #[test]
    fn test_fraction_floors() {
        let r = Resources::new(100, 50, 25);
        assert_eq!(r.fraction(10), Resources::new(10, 5, 2));
        assert!(Resources::new(9, 9, 9).fraction(10).is_empty());
    }

    #[test]
    fn test_player_spend() {
        let mut player = Player::new(1, "Alice", 1000).with_resources(Resources::new(100, 50, 0));

        assert!(player.spend(&Resources::new(50, 20, 0)));
        assert_eq!(player.resources, Resources::new(50, 30, 0));

        assert!(!player.spend(&Resources::new(60, 0, 0)));
        assert_eq!(player.resources, Resources::new(50, 30, 0));
    }

    #[test]
    fn test_get_by_kind() {
        let mut r = Resources::new(1, 2, 3);
        assert_eq!(r.get(ResourceKind::Food), 2);
        *r.get_mut(ResourceKind::Faith) += 4;
        assert_eq!(r.faith, 7);
    }
}
