//! Territorial conquest: defense auras, raids, structure damage and
//! elimination.
//!
//! Auras are rebuilt from the tile list every tick and never persisted.
//! Raids copy a share of a tile's resource pool to the raider's player.
//! A player whose capital hit points reach zero is eliminated exactly once;
//! the last player standing wins.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::components::{PlayerId, TileId, Unit, UnitId};
use crate::config::SimConfig;
use crate::economy::{Player, Resources};
use crate::math::{fixed_serde, Fixed, GridPos};
use crate::tiles::Tile;

/// Defense aura projected by an owned watchtower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aura {
    /// Watchtower cell.
    pub source: GridPos,
    /// Manhattan radius.
    pub radius: u32,
    /// Incoming damage is divided by this.
    #[serde(with = "fixed_serde")]
    pub defense_multiplier: Fixed,
    /// Player whose units benefit.
    pub owner: PlayerId,
}

impl Aura {
    /// Check whether the aura covers `pos`.
    #[must_use]
    pub fn covers(&self, pos: GridPos) -> bool {
        self.source.manhattan_distance(pos) <= self.radius
    }
}

/// Outcome of one raid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaidResult {
    /// True if anything was stolen.
    pub success: bool,
    /// Amount taken of each resource.
    pub resources_stolen: Resources,
    /// Raiding unit.
    pub attacker_id: UnitId,
    /// Raiding unit's owner.
    pub attacker_owner: PlayerId,
    /// Raided tile.
    pub target_tile_id: TileId,
    /// Raided tile's owner at raid time.
    pub target_owner: Option<PlayerId>,
    /// Raider cell.
    pub attacker_position: GridPos,
    /// Tile cell.
    pub target_position: GridPos,
    /// Simulation time of the raid (seconds).
    #[serde(with = "fixed_serde")]
    pub timestamp: Fixed,
}

/// Lifetime raid counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RaidStats {
    /// Raids executed.
    pub total: u64,
    /// Raids that stole something.
    pub successful: u64,
    /// Raids currently held in the bounded history.
    pub retained: usize,
}

/// Report of damage dealt to a structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureDamage {
    /// Damaged tile.
    pub tile_id: TileId,
    /// Damage applied.
    pub damage: u32,
    /// Hit points after the hit.
    pub hp: u32,
    /// True if this hit brought the tile to zero.
    pub destroyed: bool,
    /// Owner before the hit.
    pub previous_owner: Option<PlayerId>,
    /// Owner's capital hit points after synchronization, for capitals.
    pub capital_hp: Option<u32>,
}

/// Aura, raid and elimination state for one room.
#[derive(Debug, Clone)]
pub struct ConquestSystem {
    aura_multiplier: Fixed,
    default_aura_radius: u32,
    raid_percent: u32,
    history_limit: usize,
    active_auras: Vec<Aura>,
    raid_history: VecDeque<RaidResult>,
    stats: RaidStats,
}

impl Default for ConquestSystem {
    fn default() -> Self {
        Self::new(&SimConfig::default())
    }
}

impl ConquestSystem {
    /// Create a conquest system with the given tuning.
    #[must_use]
    pub fn new(config: &SimConfig) -> Self {
        Self {
            aura_multiplier: config.aura_multiplier(),
            default_aura_radius: config.default_aura_radius,
            raid_percent: config.raid_percent,
            history_limit: config.raid_history_limit,
            active_auras: Vec::new(),
            raid_history: VecDeque::new(),
            stats: RaidStats::default(),
        }
    }

    /// Rebuild the aura list from owned watchtowers.
    pub fn update_auras(&mut self, tiles: &[Tile]) {
        self.active_auras.clear();
        for tile in tiles {
            let Some(owner) = tile.owner else {
                continue;
            };
            if !tile.kind.projects_aura() {
                continue;
            }
            self.active_auras.push(Aura {
                source: tile.position,
                radius: tile.aura_radius(self.default_aura_radius),
                defense_multiplier: self.aura_multiplier,
                owner,
            });
        }
    }

    /// Auras active this tick, for client rendering.
    #[must_use]
    pub fn auras(&self) -> &[Aura] {
        &self.active_auras
    }

    /// Best friendly aura multiplier covering the unit, or 1.
    ///
    /// Overlapping auras do not stack; only the highest applies.
    #[must_use]
    pub fn get_defense_multiplier(&self, unit: &Unit) -> Fixed {
        self.active_auras
            .iter()
            .filter(|aura| aura.owner == unit.owner && aura.covers(unit.position))
            .map(|aura| aura.defense_multiplier)
            .fold(Fixed::ONE, Fixed::max)
    }

    /// Check whether `attacker` may raid `tile`.
    ///
    /// The tile must be in range, owned by another player, and hold some
    /// resources.
    #[must_use]
    pub fn can_raid(&self, attacker: &Unit, tile: &Tile) -> bool {
        if !attacker.is_in_range(tile.position) {
            return false;
        }
        match tile.owner {
            Some(owner) if owner != attacker.owner => !tile.resources.is_empty(),
            _ => false,
        }
    }

    /// Steal a share of the tile's resources, floored per resource.
    ///
    /// A raid that would steal nothing reports failure. Every raid is
    /// recorded in the bounded history.
    pub fn execute_raid(&mut self, attacker: &Unit, tile: &Tile, now: Fixed) -> RaidResult {
        let stolen = tile.resources.fraction(self.raid_percent);
        let result = RaidResult {
            success: !stolen.is_empty(),
            resources_stolen: stolen,
            attacker_id: attacker.id,
            attacker_owner: attacker.owner,
            target_tile_id: tile.id,
            target_owner: tile.owner,
            attacker_position: attacker.position,
            target_position: tile.position,
            timestamp: now,
        };

        debug!(
            attacker_id = attacker.id,
            tile_id = tile.id,
            success = result.success,
            "raid executed"
        );

        self.stats.total += 1;
        if result.success {
            self.stats.successful += 1;
        }
        self.raid_history.push_back(result.clone());
        while self.raid_history.len() > self.history_limit {
            self.raid_history.pop_front();
        }
        self.stats.retained = self.raid_history.len();

        result
    }

    /// Credit the raider's player and debit the victim, clamping at zero.
    ///
    /// Failed raids change nothing.
    pub fn apply_raid_resources(
        &self,
        result: &RaidResult,
        attacker_player: &mut Player,
        target_player: Option<&mut Player>,
    ) {
        if !result.success {
            return;
        }
        attacker_player.resources += result.resources_stolen;
        if let Some(target) = target_player {
            target.resources -= result.resources_stolen;
        }
    }

    /// Lifetime raid counters.
    #[must_use]
    pub fn raid_stats(&self) -> RaidStats {
        self.stats
    }

    /// Retained raids, oldest first.
    pub fn recent_raids(&self) -> impl Iterator<Item = &RaidResult> {
        self.raid_history.iter()
    }

    /// Apply damage to a structure.
    ///
    /// Capital damage rescales the owner's `capital_hp` by the tile's new
    /// hit-point ratio, rounded. A structure brought to zero becomes
    /// ownerless.
    pub fn damage_structure(
        &self,
        tile: &mut Tile,
        owner: Option<&mut Player>,
        damage: u32,
    ) -> StructureDamage {
        let previous_owner = tile.owner;
        let was_standing = !tile.is_destroyed();
        tile.hp = tile.hp.saturating_sub(damage);

        let capital_hp = match owner {
            Some(player) if tile.kind.is_capital() => {
                player.capital_hp = rescale(player.capital_hp, tile.hp, tile.max_hp);
                Some(player.capital_hp)
            }
            _ => None,
        };

        let destroyed = was_standing && tile.is_destroyed();
        if tile.is_destroyed() {
            tile.owner = None;
        }
        if destroyed {
            info!(tile_id = tile.id, kind = ?tile.kind, ?previous_owner, "structure destroyed");
        }

        StructureDamage {
            tile_id: tile.id,
            damage,
            hp: tile.hp,
            destroyed,
            previous_owner,
            capital_hp,
        }
    }

    /// Mark newly fallen players and decide the winner.
    ///
    /// Returns the players eliminated by this call (each player at most once
    /// over the game) and the sole survivor if exactly one remains. Zero
    /// survivors is a draw and yields no winner.
    pub fn check_elimination(&self, players: &mut [Player]) -> (Vec<PlayerId>, Option<PlayerId>) {
        let mut eliminated = Vec::new();
        let mut remaining = Vec::new();

        for player in players.iter_mut() {
            if player.capital_hp == 0 {
                if !player.is_eliminated {
                    player.is_eliminated = true;
                    eliminated.push(player.id);
                    info!(player_id = player.id, "player eliminated");
                }
            } else if !player.is_eliminated {
                remaining.push(player.id);
            }
        }

        let winner = match remaining.as_slice() {
            [only] => Some(*only),
            _ => None,
        };
        (eliminated, winner)
    }
}

/// `round(value * numerator / denominator)`, half away from zero.
fn rescale(value: u32, numerator: u32, denominator: u32) -> u32 {
    if denominator == 0 {
        return 0;
    }
    let scaled = u64::from(value) * u64::from(numerator);
    let denominator = u64::from(denominator);
    ((2 * scaled + denominator) / (2 * denominator)) as u32
}
