//! Proximity combat with unit-type effectiveness.
//!
//! Each tick, every eligible unit looks up enemies in range through the
//! spatial hash and hits the first one found (lowest id). Damage is the
//! attacker's attack scaled by a fixed effectiveness matrix, then divided by
//! the target's best friendly aura multiplier. Per-unit cooldowns gate how
//! often a unit can strike.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::components::{Unit, UnitId, UnitKind, UnitStatus, UnitStore};
use crate::conquest::ConquestSystem;
use crate::math::{fixed_serde, option_fixed_serde, percent, Fixed, GridPos};
use crate::spatial::SpatialHash;

/// Damage multiplier when `attacker` hits `target`.
///
/// Infantry beats archers, archers beat knights, knights beat infantry.
#[must_use]
pub fn effectiveness(attacker: UnitKind, target: UnitKind) -> Fixed {
    let pct = match (attacker, target) {
        (UnitKind::Infantry, UnitKind::Infantry) => 100,
        (UnitKind::Infantry, UnitKind::Archer) => 150,
        (UnitKind::Infantry, UnitKind::Knight) => 75,
        (UnitKind::Infantry, UnitKind::Siege) => 125,

        (UnitKind::Archer, UnitKind::Infantry) => 50,
        (UnitKind::Archer, UnitKind::Archer) => 100,
        (UnitKind::Archer, UnitKind::Knight) => 150,
        (UnitKind::Archer, UnitKind::Siege) => 100,

        (UnitKind::Knight, UnitKind::Infantry) => 150,
        (UnitKind::Knight, UnitKind::Archer) => 100,
        (UnitKind::Knight, UnitKind::Knight) => 100,
        (UnitKind::Knight, UnitKind::Siege) => 150,

        (UnitKind::Siege, UnitKind::Infantry) => 75,
        (UnitKind::Siege, UnitKind::Archer) => 75,
        (UnitKind::Siege, UnitKind::Knight) => 75,
        (UnitKind::Siege, UnitKind::Siege) => 100,
    };
    percent(pct)
}

/// Damage multiplier against structures.
#[must_use]
pub fn structure_multiplier(attacker: UnitKind) -> Fixed {
    match attacker {
        UnitKind::Siege => Fixed::from_num(2),
        UnitKind::Infantry | UnitKind::Archer | UnitKind::Knight => Fixed::ONE,
    }
}

/// Unit-on-unit damage before auras, floored.
#[must_use]
pub fn calculate_damage(attacker: &Unit, target: &Unit) -> u32 {
    (Fixed::from_num(attacker.attack) * effectiveness(attacker.kind, target.kind))
        .floor()
        .to_num::<u32>()
}

/// Unit-on-structure damage, floored.
#[must_use]
pub fn structure_damage(attacker: &Unit) -> u32 {
    (Fixed::from_num(attacker.attack) * structure_multiplier(attacker.kind))
        .floor()
        .to_num::<u32>()
}

/// Divide damage by a defense multiplier, floored.
#[must_use]
pub fn apply_defense_multiplier(damage: u32, multiplier: Fixed) -> u32 {
    if multiplier <= Fixed::ZERO {
        return damage;
    }
    (Fixed::from_num(damage) / multiplier).floor().to_num::<u32>()
}

/// Combat event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatEventKind {
    /// A hit landed.
    Attack,
    /// The hit killed its target.
    Death,
}

/// One combat event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatEvent {
    /// Event type.
    #[serde(rename = "type")]
    pub kind: CombatEventKind,
    /// Attacking unit.
    pub attacker_id: UnitId,
    /// Unit hit.
    pub target_id: UnitId,
    /// Damage dealt.
    pub damage: u32,
    /// Simulation time (seconds).
    #[serde(with = "fixed_serde")]
    pub timestamp: Fixed,
    /// Attacker cell for attacks, target cell for deaths.
    pub position: GridPos,
    /// True if the target died from this hit.
    pub target_died: bool,
}

/// Estimated duel outcome between two units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatPrediction {
    /// Seconds for `a` to kill `b`, `None` if `a` deals no damage.
    #[serde(with = "option_fixed_serde")]
    pub ttk_a: Option<Fixed>,
    /// Seconds for `b` to kill `a`, `None` if `b` deals no damage.
    #[serde(with = "option_fixed_serde")]
    pub ttk_b: Option<Fixed>,
    /// The unit with the strictly shorter time to kill.
    pub winner: Option<UnitId>,
}

/// Predict a duel from the effectiveness table alone.
///
/// Ignores auras, cooldown state and positions.
#[must_use]
pub fn predict_combat_outcome(a: &Unit, b: &Unit, cooldown: Fixed) -> CombatPrediction {
    let ttk = |attacker: &Unit, target: &Unit| -> Option<Fixed> {
        let damage = calculate_damage(attacker, target);
        if damage == 0 || cooldown <= Fixed::ZERO {
            return None;
        }
        let dps = Fixed::from_num(damage) / cooldown;
        Some(Fixed::from_num(target.hp) / dps)
    };

    let ttk_a = ttk(a, b);
    let ttk_b = ttk(b, a);
    let winner = match (ttk_a, ttk_b) {
        (Some(ta), Some(tb)) if ta < tb => Some(a.id),
        (Some(ta), Some(tb)) if tb < ta => Some(b.id),
        (Some(_), None) => Some(a.id),
        (None, Some(_)) => Some(b.id),
        _ => None,
    };

    CombatPrediction {
        ttk_a,
        ttk_b,
        winner,
    }
}

/// Cooldown tracking and per-tick combat resolution.
#[derive(Debug, Clone)]
pub struct CombatSystem {
    cooldown: Fixed,
    last_attack: HashMap<UnitId, Fixed>,
}

impl Default for CombatSystem {
    fn default() -> Self {
        Self::new(Fixed::ONE)
    }
}

impl CombatSystem {
    /// Create a combat system with the given attack cooldown (seconds).
    #[must_use]
    pub fn new(cooldown: Fixed) -> Self {
        Self {
            cooldown,
            last_attack: HashMap::new(),
        }
    }

    /// Attack cooldown in seconds.
    #[must_use]
    pub const fn cooldown(&self) -> Fixed {
        self.cooldown
    }

    /// Check whether a unit's cooldown has elapsed at `now`.
    ///
    /// Units that have never attacked may attack immediately.
    #[must_use]
    pub fn can_attack(&self, unit_id: UnitId, now: Fixed) -> bool {
        self.last_attack
            .get(&unit_id)
            .map_or(true, |&last| now - last >= self.cooldown)
    }

    /// Record an attack at `now`, starting the cooldown.
    pub fn record_attack(&mut self, unit_id: UnitId, now: Fixed) {
        self.last_attack.insert(unit_id, now);
    }

    /// Forget a unit's cooldown.
    pub fn remove_unit(&mut self, unit_id: UnitId) {
        self.last_attack.remove(&unit_id);
    }

    /// Enemies within `attacker`'s range, lowest id first.
    ///
    /// Dead and training units are never targets.
    #[must_use]
    pub fn find_targets<'a>(
        &self,
        attacker: &Unit,
        units: &'a UnitStore,
        spatial: &SpatialHash,
    ) -> Vec<&'a Unit> {
        spatial
            .query_radius(attacker.position, attacker.range)
            .into_iter()
            .filter(|&id| id != attacker.id)
            .filter_map(|id| units.get(id))
            .filter(|unit| {
                unit.owner != attacker.owner
                    && !matches!(unit.status, UnitStatus::Dead | UnitStatus::Training)
            })
            .collect()
    }

    /// Resolve one round of combat.
    ///
    /// Units act in ascending id order. A unit that kills is removed from
    /// the spatial hash at once so later attackers in the same tick skip it.
    pub fn tick(
        &mut self,
        units: &mut UnitStore,
        spatial: &mut SpatialHash,
        now: Fixed,
        conquest: Option<&ConquestSystem>,
    ) -> Vec<CombatEvent> {
        let mut events = Vec::new();

        for attacker_id in units.sorted_ids() {
            let Some(attacker) = units.get(attacker_id) else {
                continue;
            };
            if !matches!(attacker.status, UnitStatus::Idle | UnitStatus::Attacking) {
                continue;
            }
            if !self.can_attack(attacker_id, now) {
                continue;
            }

            let strike = self
                .find_targets(attacker, units, spatial)
                .first()
                .map(|target| {
                    let base = calculate_damage(attacker, target);
                    let damage = match conquest {
                        Some(conquest) => {
                            apply_defense_multiplier(base, conquest.get_defense_multiplier(target))
                        }
                        None => base,
                    };
                    (target.id, damage)
                });
            let attacker_position = attacker.position;

            let Some((target_id, damage)) = strike else {
                if let Some(attacker) = units.get_mut(attacker_id) {
                    if attacker.status == UnitStatus::Attacking {
                        attacker.status = UnitStatus::Idle;
                    }
                }
                continue;
            };

            let Some(target) = units.get_mut(target_id) else {
                continue;
            };
            let died = target.take_damage(damage);
            let target_position = target.position;

            if let Some(attacker) = units.get_mut(attacker_id) {
                attacker.status = UnitStatus::Attacking;
            }
            self.record_attack(attacker_id, now);

            events.push(CombatEvent {
                kind: CombatEventKind::Attack,
                attacker_id,
                target_id,
                damage,
                timestamp: now,
                position: attacker_position,
                target_died: died,
            });

            if died {
                spatial.remove(target_id);
                self.remove_unit(target_id);
                debug!(attacker_id, target_id, "unit killed");
                events.push(CombatEvent {
                    kind: CombatEventKind::Death,
                    attacker_id,
                    target_id,
                    damage,
                    timestamp: now,
                    position: target_position,
                    target_died: true,
                });
            }
        }

        events
    }
}
