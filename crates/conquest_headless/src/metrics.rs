//! Match metrics collected from tick event batches.
//!
//! Metrics are folded in tick by tick from the [`TickEvents`] an update
//! returns, so a run never has to keep its full event history.

use std::collections::BTreeMap;

use conquest_core::combat::CombatEventKind;
use conquest_core::components::{PlayerId, UnitKind};
use conquest_core::economy::Resources;
use conquest_core::simulation::{Simulation, TickEvents};
use serde::{Deserialize, Serialize};

/// Complete metrics for a single run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchMetrics {
    /// Scenario name.
    pub scenario: String,
    /// Ticks run.
    pub duration_ticks: u64,
    /// Winning player (None = draw or undecided).
    pub winner: Option<PlayerId>,
    /// True if the game was decided before the tick limit.
    pub game_over: bool,
    /// Per-player metrics.
    pub players: BTreeMap<PlayerId, PlayerMetrics>,
    /// Final simulation state hash (for determinism validation).
    pub final_state_hash: u64,
}

impl MatchMetrics {
    /// Empty metrics for a scenario.
    #[must_use]
    pub fn new(scenario: impl Into<String>) -> Self {
        Self {
            scenario: scenario.into(),
            ..Default::default()
        }
    }

    /// Get or create player metrics.
    pub fn player_mut(&mut self, id: PlayerId) -> &mut PlayerMetrics {
        self.players.entry(id).or_default()
    }

    /// Fold one tick's events in. `sim` must be the simulation that
    /// produced them, after the update, so unit owners can be resolved.
    pub fn record(&mut self, events: &TickEvents, sim: &Simulation) {
        let tick = events.tick;
        let owner = |id| sim.get_unit(id).map(|u| u.owner);

        for trained in &events.training_completed {
            *self
                .player_mut(trained.owner)
                .units_trained
                .entry(trained.kind)
                .or_default() += 1;
        }

        for event in &events.combat_events {
            let (Some(attacker), Some(target)) = (owner(event.attacker_id), owner(event.target_id))
            else {
                continue;
            };
            match event.kind {
                CombatEventKind::Attack => {
                    let stats = self.player_mut(attacker);
                    stats.damage_dealt += u64::from(event.damage);
                    stats.first_attack_tick.get_or_insert(tick);
                    self.player_mut(target).damage_taken += u64::from(event.damage);
                }
                CombatEventKind::Death => {
                    self.player_mut(attacker).units_killed += 1;
                    if let Some(unit) = sim.get_unit(event.target_id) {
                        *self
                            .player_mut(target)
                            .units_lost
                            .entry(unit.kind)
                            .or_default() += 1;
                    }
                }
            }
        }

        for attack in &events.structure_attacks {
            let Some(attacker) = owner(attack.attacker_id) else {
                continue;
            };
            let stats = self.player_mut(attacker);
            stats.structure_damage += u64::from(attack.report.damage);
            if attack.report.destroyed {
                stats.structures_destroyed += 1;
            }
        }

        for raid in events.raids.iter().filter(|r| r.success) {
            let stats = self.player_mut(raid.attacker_owner);
            stats.raids += 1;
            stats.resources_raided = stats.resources_raided.saturating_add(raid.resources_stolen);
            if let Some(victim) = raid.target_owner {
                let lost = &mut self.player_mut(victim).resources_lost;
                *lost = lost.saturating_add(raid.resources_stolen);
            }
        }

        for &player in &events.eliminated {
            self.player_mut(player).eliminated_at = Some(tick);
        }
    }

    /// Record the final outcome.
    pub fn finalize(&mut self, sim: &Simulation) {
        self.duration_ticks = sim.tick();
        self.winner = sim.winner();
        self.game_over = sim.is_game_over();
        self.final_state_hash = sim.state_hash();
        for unit in sim.units().iter() {
            if !unit.is_dead() {
                self.player_mut(unit.owner).surviving_units += 1;
            }
        }
    }
}

/// Metrics for one player in a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerMetrics {
    /// Units that finished training, by kind.
    pub units_trained: BTreeMap<UnitKind, u32>,
    /// Own units killed, by kind.
    pub units_lost: BTreeMap<UnitKind, u32>,
    /// Enemy units killed.
    pub units_killed: u32,
    /// Damage dealt to units.
    pub damage_dealt: u64,
    /// Damage taken by own units.
    pub damage_taken: u64,
    /// Damage dealt to structures.
    pub structure_damage: u64,
    /// Structures brought to zero.
    pub structures_destroyed: u32,
    /// Successful raids.
    pub raids: u32,
    /// Resources taken by raiding.
    pub resources_raided: Resources,
    /// Resources lost to raids.
    pub resources_lost: Resources,
    /// Tick of the first hit on an enemy unit.
    pub first_attack_tick: Option<u64>,
    /// Tick the player was eliminated.
    pub eliminated_at: Option<u64>,
    /// Units alive when the run ended.
    pub surviving_units: u32,
}

impl PlayerMetrics {
    /// Total units lost.
    #[must_use]
    pub fn total_lost(&self) -> u32 {
        self.units_lost.values().sum()
    }

    /// Kill/death ratio; kills alone when nothing was lost.
    #[must_use]
    pub fn kd_ratio(&self) -> f64 {
        let lost = self.total_lost();
        if lost == 0 {
            f64::from(self.units_killed)
        } else {
            f64::from(self.units_killed) / f64::from(lost)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conquest_core::economy::Player;
    use conquest_core::math::GridPos;
    use conquest_core::tiles::{Tile, TileKind};

    fn duel() -> (Simulation, Vec<Tile>, Vec<Player>) {
        let mut sim = Simulation::default();
        sim.spawn_unit(UnitKind::Infantry, 1, GridPos::new(5, 5));
        sim.spawn_unit(UnitKind::Archer, 2, GridPos::new(5, 6));
        let tiles = vec![
            Tile::new(1, TileKind::CapitalCity, GridPos::new(0, 0)).with_owner(1),
            Tile::new(2, TileKind::CapitalCity, GridPos::new(30, 30)).with_owner(2),
        ];
        let players = vec![Player::new(1, "a", 1000), Player::new(2, "b", 1000)];
        (sim, tiles, players)
    }

    #[test]
    fn test_duel_metrics() {
        let (mut sim, mut tiles, mut players) = duel();
        let dt = sim.config().tick_delta();
        let mut metrics = MatchMetrics::new("duel");

        for _ in 0..40 {
            let events = sim.update(dt, &mut tiles, &mut players);
            metrics.record(&events, &sim);
        }
        metrics.finalize(&sim);

        let attacker = &metrics.players[&1];
        let victim = &metrics.players[&2];
        assert_eq!(attacker.first_attack_tick, Some(1));
        assert_eq!(attacker.units_killed, 1);
        assert_eq!(attacker.damage_dealt, 90);
        assert_eq!(victim.damage_taken, 90);
        assert_eq!(victim.units_lost.get(&UnitKind::Archer), Some(&1));
        assert_eq!(attacker.surviving_units, 1);
        assert_eq!(victim.surviving_units, 0);
        assert_eq!(metrics.duration_ticks, 40);
        assert_eq!(metrics.final_state_hash, sim.state_hash());
    }

    #[test]
    fn test_kd_ratio() {
        let mut stats = PlayerMetrics {
            units_killed: 3,
            ..Default::default()
        };
        assert!((stats.kd_ratio() - 3.0).abs() < f64::EPSILON);
        stats.units_lost.insert(UnitKind::Knight, 2);
        assert!((stats.kd_ratio() - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_metrics_json_roundtrip() {
        let mut metrics = MatchMetrics::new("duel");
        metrics.player_mut(1).units_trained.insert(UnitKind::Siege, 2);
        metrics.winner = Some(1);
        let json = serde_json::to_string(&metrics).unwrap();
        let loaded: MatchMetrics = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, metrics);
    }
}
