//! Per-room simulation orchestrator.
//!
//! A [`Simulation`] owns one navigation grid, movement system, spatial hash,
//! combat system and conquest system, and advances all of them through
//! [`Simulation::update`]. Tiles and players belong to the caller and are
//! passed in by reference on every tick.
//!
//! Player commands are queued with [`Simulation::enqueue`] and applied at
//! the start of the next update, so nothing observes a half-finished tick.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashSet, VecDeque};
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::combat::{predict_combat_outcome, structure_damage, CombatEvent, CombatPrediction, CombatSystem};
use crate::components::{
    PlayerId, Target, TargetKind, TileId, Unit, UnitId, UnitKind, UnitStatus, UnitStore,
};
use crate::config::SimConfig;
use crate::conquest::{Aura, ConquestSystem, RaidResult, StructureDamage};
use crate::economy::{find_player_mut, Player};
use crate::error::{GameError, Result};
use crate::math::{fixed_serde, Fixed, GridPos};
use crate::movement::MovementSystem;
use crate::pathfinding::{find_path, NavGrid};
use crate::spatial::SpatialHash;
use crate::tiles::{tile_index, Tile};

// ============================================================================
// Commands
// ============================================================================

/// A player order, applied between ticks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Path a unit to a cell.
    Move {
        /// Unit to move.
        unit_id: UnitId,
        /// Destination cell.
        target: GridPos,
        /// Cells the path may use, if restricted.
        #[serde(default)]
        valid_mask: Option<Vec<GridPos>>,
    },
    /// Halt a unit.
    Stop {
        /// Unit to stop.
        unit_id: UnitId,
    },
    /// Strike an enemy structure.
    AttackTile {
        /// Attacking unit.
        unit_id: UnitId,
        /// Target tile.
        tile_id: TileId,
    },
    /// Raid an enemy tile's resources.
    Raid {
        /// Raiding unit.
        unit_id: UnitId,
        /// Target tile.
        tile_id: TileId,
    },
    /// Start training a unit.
    Train {
        /// Unit class.
        kind: UnitKind,
        /// Owning player.
        owner: PlayerId,
        /// Spawn cell.
        position: GridPos,
    },
}

/// Result of applying one queued command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutcome {
    /// The command as received.
    pub command: Command,
    /// True if the command took effect.
    pub accepted: bool,
    /// Rejection reason.
    pub reason: Option<String>,
}

// ============================================================================
// Events
// ============================================================================

/// Movement progress of a single unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MovementEvent {
    /// The unit changed cell.
    Movement {
        /// Unit id.
        unit_id: UnitId,
        /// Cell before the update.
        old_position: GridPos,
        /// Cell after the update.
        new_position: GridPos,
    },
    /// The unit reached the end of its path.
    Arrival {
        /// Unit id.
        unit_id: UnitId,
        /// Final cell.
        position: GridPos,
    },
}

/// A unit that finished training this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingCompleted {
    /// Unit id.
    pub unit_id: UnitId,
    /// Owner.
    pub owner: PlayerId,
    /// Unit class.
    pub kind: UnitKind,
    /// Cell the unit stands on.
    pub position: GridPos,
}

/// A unit hitting a structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureAttack {
    /// Attacking unit.
    pub attacker_id: UnitId,
    /// Damage report.
    pub report: StructureDamage,
    /// Simulation time (seconds).
    #[serde(with = "fixed_serde")]
    pub timestamp: Fixed,
}

/// Everything that happened during one update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickEvents {
    /// Tick number this batch belongs to.
    pub tick: u64,
    /// Units promoted from training.
    pub training_completed: Vec<TrainingCompleted>,
    /// Movement and arrival events.
    pub movement_events: Vec<MovementEvent>,
    /// Attacks and deaths.
    pub combat_events: Vec<CombatEvent>,
    /// Hits on structures.
    pub structure_attacks: Vec<StructureAttack>,
    /// Raids executed.
    pub raids: Vec<RaidResult>,
    /// Players eliminated this tick.
    pub eliminated: Vec<PlayerId>,
    /// Winner, reported once on the tick the game is decided.
    pub winner: Option<PlayerId>,
    /// True on the tick the game ends (win or draw).
    pub game_over: bool,
    /// Outcomes of commands applied at the start of this tick.
    pub command_outcomes: Vec<CommandOutcome>,
}

impl TickEvents {
    /// True if nothing happened.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.training_completed.is_empty()
            && self.movement_events.is_empty()
            && self.combat_events.is_empty()
            && self.structure_attacks.is_empty()
            && self.raids.is_empty()
            && self.eliminated.is_empty()
            && self.winner.is_none()
            && !self.game_over
            && self.command_outcomes.is_empty()
    }
}

/// Serializable room state for broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    /// Tick number.
    pub tick: u64,
    /// Simulation clock (seconds).
    #[serde(with = "fixed_serde")]
    pub clock: Fixed,
    /// Units in ascending id order, dead ones included.
    pub units: Vec<Unit>,
    /// Active defense auras.
    pub auras: Vec<Aura>,
    /// Winner, once decided.
    pub winner: Option<PlayerId>,
}

impl RoomSnapshot {
    /// Encode with bincode.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Encode`] if serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| GameError::Encode(e.to_string()))
    }

    /// Decode from bincode.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Encode`] if the bytes are not a snapshot.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| GameError::Encode(e.to_string()))
    }
}

// ============================================================================
// Simulation
// ============================================================================

/// The battlefield simulation for one room.
///
/// # System Execution Order
///
/// Each update runs, in order:
/// 0. **Commands** - drain the command queue
/// 1. **Training** - promote units whose timers finished
/// 2. **Movement** - advance moving units along their paths
/// 3. **Spatial index** - rebuild from live units
/// 4. **Auras** - recompute from current tiles
/// 5. **Combat** - one round, aura-adjusted
/// 6. **Elimination** - mark fallen players, decide the winner
#[derive(Debug, Clone)]
pub struct Simulation {
    config: SimConfig,
    tick: u64,
    clock: Fixed,
    units: UnitStore,
    nav: NavGrid,
    movement: MovementSystem,
    spatial: SpatialHash,
    combat: CombatSystem,
    conquest: ConquestSystem,
    commands: VecDeque<Command>,
    winner: Option<PlayerId>,
    game_over: bool,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl Simulation {
    /// Create an empty simulation at tick 0.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        Self {
            tick: 0,
            clock: Fixed::ZERO,
            units: UnitStore::new(),
            nav: NavGrid::new(config.map_size.max(1)),
            movement: MovementSystem::new(),
            spatial: SpatialHash::new(config.spatial_cell_size),
            combat: CombatSystem::new(config.attack_cooldown()),
            conquest: ConquestSystem::new(&config),
            commands: VecDeque::new(),
            winner: None,
            game_over: false,
            config,
        }
    }

    /// Tuning in effect.
    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Number of completed updates.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Simulation time in seconds.
    #[must_use]
    pub const fn clock(&self) -> Fixed {
        self.clock
    }

    /// All units.
    #[must_use]
    pub const fn units(&self) -> &UnitStore {
        &self.units
    }

    /// Look up a unit. Misses are logged.
    #[must_use]
    pub fn get_unit(&self, id: UnitId) -> Option<&Unit> {
        let unit = self.units.get(id);
        if unit.is_none() {
            warn!(unit_id = id, "unit not found");
        }
        unit
    }

    /// Movement state.
    #[must_use]
    pub const fn movement(&self) -> &MovementSystem {
        &self.movement
    }

    /// Conquest state (auras, raid history).
    #[must_use]
    pub const fn conquest(&self) -> &ConquestSystem {
        &self.conquest
    }

    /// Navigation grid.
    #[must_use]
    pub const fn nav_grid(&self) -> &NavGrid {
        &self.nav
    }

    /// Winner, once decided.
    #[must_use]
    pub const fn winner(&self) -> Option<PlayerId> {
        self.winner
    }

    /// True once a winner or a draw has been decided.
    #[must_use]
    pub const fn is_game_over(&self) -> bool {
        self.game_over
    }

    /// Rebuild terrain weights from the tile list.
    pub fn apply_terrain(&mut self, tiles: &[Tile]) {
        self.nav.apply_tile_terrain(tiles, self.config.marsh_weight());
    }

    // ------------------------------------------------------------------
    // Unit lifecycle
    // ------------------------------------------------------------------

    /// Insert a caller-built unit under a fresh id.
    ///
    /// A unit with zero hp is stored as dead, and a dead unit has its hp
    /// zeroed. Dead units stay out of the spatial index.
    pub fn add_unit(&mut self, mut unit: Unit) -> UnitId {
        if unit.hp == 0 && !unit.is_dead() {
            warn!(kind = ?unit.kind, owner = unit.owner, "unit added with zero hp, marking dead");
            unit.status = UnitStatus::Dead;
            unit.target = None;
            unit.training = None;
        } else if unit.is_dead() && unit.hp > 0 {
            warn!(kind = ?unit.kind, owner = unit.owner, "dead unit added with hp, zeroing");
            unit.hp = 0;
        }
        let alive = !unit.is_dead();
        let position = unit.position;
        let id = self.units.insert(unit);
        if alive {
            self.spatial.add(id, position);
        }
        id
    }

    /// Create an idle unit with the base stats of `kind`.
    pub fn spawn_unit(&mut self, kind: UnitKind, owner: PlayerId, position: GridPos) -> UnitId {
        self.add_unit(Unit::new(0, kind, owner, position))
    }

    /// Create a unit in training, timed by its kind's training time.
    pub fn train_unit(&mut self, kind: UnitKind, owner: PlayerId, position: GridPos) -> UnitId {
        let id = self.add_unit(Unit::new(0, kind, owner, position).in_training(self.clock));
        debug!(unit_id = id, ?kind, owner, "training started");
        id
    }

    /// Remove a unit from every system.
    pub fn remove_unit(&mut self, id: UnitId) -> Option<Unit> {
        self.movement.clear_path(id);
        self.spatial.remove(id);
        self.combat.remove_unit(id);
        self.units.remove(id)
    }

    /// Order a unit to a cell.
    ///
    /// Returns `false` without changing anything if the unit is unknown,
    /// dead or training, the target is off the map, or no path exists.
    /// Other live units block the path. Ordering a unit to its own cell
    /// counts as arriving at once.
    pub fn move_unit(
        &mut self,
        id: UnitId,
        target: GridPos,
        valid_mask: Option<&HashSet<GridPos>>,
    ) -> bool {
        match self.try_move_unit(id, target, valid_mask) {
            Ok(()) => true,
            Err(err) => {
                warn!(unit_id = id, %target, error = %err, "move rejected");
                false
            }
        }
    }

    fn try_move_unit(
        &mut self,
        id: UnitId,
        target: GridPos,
        valid_mask: Option<&HashSet<GridPos>>,
    ) -> Result<()> {
        let unit = self.units.get(id).ok_or(GameError::UnitNotFound(id))?;
        match unit.status {
            UnitStatus::Dead => return Err(GameError::InvalidState(format!("unit {id} is dead"))),
            UnitStatus::Training => {
                return Err(GameError::InvalidState(format!("unit {id} is still training")))
            }
            _ => {}
        }
        if !target.in_bounds(self.config.map_size) {
            return Err(GameError::OutOfBounds {
                x: target.x,
                y: target.y,
                size: self.config.map_size,
            });
        }

        let start = unit.position;
        let blocked: HashSet<GridPos> = self
            .units
            .iter()
            .filter(|other| other.id != id && !other.is_dead())
            .map(|other| other.position)
            .collect();
        let path = find_path(&self.nav, start, target, &blocked, valid_mask)
            .ok_or_else(|| GameError::InvalidState(format!("no path from {start} to {target}")))?;

        let moving = self.movement.set_path(id, path);
        let unit = self.units.get_mut(id).ok_or(GameError::UnitNotFound(id))?;
        if moving {
            unit.status = UnitStatus::Moving;
            unit.target = Some(Target {
                kind: TargetKind::Position,
                position: target,
            });
        } else {
            // Already there.
            if unit.status == UnitStatus::Moving {
                unit.status = UnitStatus::Idle;
            }
            unit.target = None;
        }
        Ok(())
    }

    /// Halt a unit: clear its path and target and set it idle.
    ///
    /// Returns `false` for unknown, dead or training units.
    pub fn stop_unit(&mut self, id: UnitId) -> bool {
        let Some(unit) = self.units.get_mut(id) else {
            warn!(unit_id = id, "stop for unknown unit");
            return false;
        };
        if matches!(unit.status, UnitStatus::Dead | UnitStatus::Training) {
            return false;
        }
        unit.status = UnitStatus::Idle;
        unit.target = None;
        self.movement.clear_path(id);
        true
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Live units within `radius` of `center`, in id order.
    #[must_use]
    pub fn get_units_in_area(&self, center: GridPos, radius: u32) -> Vec<&Unit> {
        self.spatial
            .query_radius(center, radius)
            .into_iter()
            .filter_map(|id| self.units.get(id))
            .filter(|unit| !unit.is_dead())
            .collect()
    }

    /// Duel estimate between two units from the effectiveness table.
    #[must_use]
    pub fn predict_combat_outcome(&self, a: UnitId, b: UnitId) -> Option<CombatPrediction> {
        let a = self.units.get(a)?;
        let b = self.units.get(b)?;
        Some(predict_combat_outcome(a, b, self.combat.cooldown()))
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Queue a command for the next update.
    pub fn enqueue(&mut self, command: Command) {
        self.commands.push_back(command);
    }

    /// Number of commands waiting for the next update.
    #[must_use]
    pub fn pending_commands(&self) -> usize {
        self.commands.len()
    }

    fn apply_command(
        &mut self,
        command: Command,
        tiles: &mut [Tile],
        players: &mut [Player],
        events: &mut TickEvents,
    ) -> CommandOutcome {
        let result = match &command {
            Command::Move {
                unit_id,
                target,
                valid_mask,
            } => {
                let mask: Option<HashSet<GridPos>> =
                    valid_mask.as_ref().map(|cells| cells.iter().copied().collect());
                self.try_move_unit(*unit_id, *target, mask.as_ref())
            }
            Command::Stop { unit_id } => {
                if self.stop_unit(*unit_id) {
                    Ok(())
                } else {
                    Err(GameError::InvalidState(format!("unit {unit_id} cannot stop")))
                }
            }
            Command::AttackTile { unit_id, tile_id } => self
                .attack_tile(*unit_id, *tile_id, tiles, players)
                .map(|attack| events.structure_attacks.push(attack)),
            Command::Raid { unit_id, tile_id } => self
                .raid_tile(*unit_id, *tile_id, tiles, players)
                .map(|raid| events.raids.push(raid)),
            Command::Train {
                kind,
                owner,
                position,
            } => self.train_for_player(*kind, *owner, *position, players).map(|_| ()),
        };

        match result {
            Ok(()) => CommandOutcome {
                command,
                accepted: true,
                reason: None,
            },
            Err(err) => {
                warn!(?command, error = %err, "command rejected");
                CommandOutcome {
                    command,
                    accepted: false,
                    reason: Some(err.to_string()),
                }
            }
        }
    }

    /// Look up a unit that can act this tick.
    fn active_unit(&self, id: UnitId) -> Result<&Unit> {
        let unit = self.units.get(id).ok_or(GameError::UnitNotFound(id))?;
        match unit.status {
            UnitStatus::Dead | UnitStatus::Training => Err(GameError::InvalidState(format!(
                "unit {id} cannot act while {:?}",
                unit.status
            ))),
            _ => Ok(unit),
        }
    }

    fn attack_tile(
        &mut self,
        unit_id: UnitId,
        tile_id: TileId,
        tiles: &mut [Tile],
        players: &mut [Player],
    ) -> Result<StructureAttack> {
        let attacker = self.active_unit(unit_id)?;
        let index = tile_index(tiles, tile_id).ok_or(GameError::TileNotFound(tile_id))?;
        let tile = &tiles[index];

        match tile.owner {
            Some(owner) if owner != attacker.owner => {}
            _ => {
                return Err(GameError::InvalidState(format!(
                    "tile {tile_id} is not an enemy structure"
                )))
            }
        }
        if tile.is_destroyed() {
            return Err(GameError::InvalidState(format!("tile {tile_id} is already destroyed")));
        }
        if !attacker.is_in_range(tile.position) {
            return Err(GameError::InvalidState(format!("tile {tile_id} is out of range")));
        }
        if !self.combat.can_attack(unit_id, self.clock) {
            return Err(GameError::InvalidState(format!("unit {unit_id} is on cooldown")));
        }

        let damage = structure_damage(attacker);
        let tile_position = tile.position;
        let tile = &mut tiles[index];
        let owner = tile.owner.and_then(|id| find_player_mut(players, id));
        let report = self.conquest.damage_structure(tile, owner, damage);

        self.combat.record_attack(unit_id, self.clock);
        if let Some(unit) = self.units.get_mut(unit_id) {
            unit.status = UnitStatus::Attacking;
            unit.target = Some(Target {
                kind: TargetKind::Tile(tile_id),
                position: tile_position,
            });
        }

        Ok(StructureAttack {
            attacker_id: unit_id,
            report,
            timestamp: self.clock,
        })
    }

    fn raid_tile(
        &mut self,
        unit_id: UnitId,
        tile_id: TileId,
        tiles: &[Tile],
        players: &mut [Player],
    ) -> Result<RaidResult> {
        let attacker = self.units.get(unit_id).ok_or(GameError::UnitNotFound(unit_id))?;
        if matches!(attacker.status, UnitStatus::Dead | UnitStatus::Training) {
            return Err(GameError::InvalidState(format!("unit {unit_id} cannot raid")));
        }
        let tile = tiles
            .iter()
            .find(|t| t.id == tile_id)
            .ok_or(GameError::TileNotFound(tile_id))?;
        if !self.conquest.can_raid(attacker, tile) {
            return Err(GameError::InvalidState(format!(
                "unit {unit_id} cannot raid tile {tile_id}"
            )));
        }

        let attacker = attacker.clone();
        let result = self.conquest.execute_raid(&attacker, tile, self.clock);

        let (attacker_player, target_player) =
            two_players_mut(players, result.attacker_owner, result.target_owner);
        let attacker_player =
            attacker_player.ok_or(GameError::PlayerNotFound(result.attacker_owner))?;
        self.conquest
            .apply_raid_resources(&result, attacker_player, target_player);

        Ok(result)
    }

    fn train_for_player(
        &mut self,
        kind: UnitKind,
        owner: PlayerId,
        position: GridPos,
        players: &mut [Player],
    ) -> Result<UnitId> {
        if !position.in_bounds(self.config.map_size) {
            return Err(GameError::OutOfBounds {
                x: position.x,
                y: position.y,
                size: self.config.map_size,
            });
        }
        let player = find_player_mut(players, owner).ok_or(GameError::PlayerNotFound(owner))?;
        if player.is_eliminated {
            return Err(GameError::InvalidState(format!("player {owner} is eliminated")));
        }
        if !player.spend(&kind.stats().cost) {
            return Err(GameError::InvalidState(format!(
                "player {owner} cannot afford {kind:?}"
            )));
        }
        Ok(self.train_unit(kind, owner, position))
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// Advance the room by `dt` seconds.
    ///
    /// Failures while updating one unit are logged and that unit is skipped;
    /// the rest of the tick still runs.
    pub fn update(&mut self, dt: Fixed, tiles: &mut [Tile], players: &mut [Player]) -> TickEvents {
        let dt = if dt < Fixed::ZERO {
            warn!(dt = %dt, "negative delta time treated as zero");
            Fixed::ZERO
        } else {
            dt
        };

        self.tick += 1;
        self.clock += dt;
        let mut events = TickEvents {
            tick: self.tick,
            ..TickEvents::default()
        };

        // 0. Commands
        self.apply_terrain(tiles);
        while let Some(command) = self.commands.pop_front() {
            let outcome = self.apply_command(command, tiles, players, &mut events);
            events.command_outcomes.push(outcome);
        }

        let ids = self.units.sorted_ids();

        // 1. Training
        for &id in &ids {
            match self.advance_training(id) {
                Ok(Some(done)) => events.training_completed.push(done),
                Ok(None) => {}
                Err(err) => warn!(unit_id = id, error = %err, "training update failed"),
            }
        }

        // 2. Movement
        for &id in &ids {
            if let Err(err) = self.advance_movement(id, dt, &mut events.movement_events) {
                warn!(unit_id = id, error = %err, "movement update failed");
            }
        }

        // 3. Spatial index
        self.refresh_spatial_hash();

        // 4. Auras
        self.conquest.update_auras(tiles);

        // 5. Combat
        let combat_events =
            self.combat
                .tick(&mut self.units, &mut self.spatial, self.clock, Some(&self.conquest));
        for event in &combat_events {
            if event.target_died {
                self.movement.clear_path(event.target_id);
            }
        }
        events.combat_events = combat_events;

        // 6. Elimination
        if !self.game_over {
            let (eliminated, winner) = self.conquest.check_elimination(players);
            events.eliminated = eliminated;
            let remaining = players.iter().filter(|p| !p.is_eliminated).count();
            if winner.is_some() || (remaining == 0 && !players.is_empty()) {
                self.game_over = true;
                self.winner = winner;
                events.winner = winner;
                events.game_over = true;
                match winner {
                    Some(player_id) => info!(player_id, tick = self.tick, "victory"),
                    None => info!(tick = self.tick, "draw"),
                }
            }
        }

        debug!(tick = self.tick, hash = self.state_hash(), "tick complete");
        events
    }

    fn advance_training(&mut self, id: UnitId) -> Result<Option<TrainingCompleted>> {
        let now = self.clock;
        let unit = self.units.get_mut(id).ok_or(GameError::UnitNotFound(id))?;
        if unit.status != UnitStatus::Training {
            return Ok(None);
        }
        let Some(training) = unit.training else {
            unit.status = UnitStatus::Idle;
            return Err(GameError::InvalidState(format!(
                "unit {id} was training without a timer"
            )));
        };
        if !training.is_complete(now) {
            return Ok(None);
        }

        unit.status = UnitStatus::Idle;
        unit.training = None;
        debug!(unit_id = id, "training complete");
        Ok(Some(TrainingCompleted {
            unit_id: id,
            owner: unit.owner,
            kind: unit.kind,
            position: unit.position,
        }))
    }

    fn advance_movement(
        &mut self,
        id: UnitId,
        dt: Fixed,
        out: &mut Vec<MovementEvent>,
    ) -> Result<()> {
        let unit = self.units.get_mut(id).ok_or(GameError::UnitNotFound(id))?;
        if unit.status != UnitStatus::Moving {
            return Ok(());
        }

        let Some(step) = self.movement.update(id, unit.speed, dt) else {
            unit.status = UnitStatus::Idle;
            unit.target = None;
            return Err(GameError::InvalidState(format!("unit {id} was moving without a path")));
        };

        let old_position = unit.position;
        unit.position = step.position;
        if step.position != old_position || step.arrived {
            out.push(MovementEvent::Movement {
                unit_id: id,
                old_position,
                new_position: step.position,
            });
        }
        if step.arrived {
            unit.status = UnitStatus::Idle;
            unit.target = None;
            out.push(MovementEvent::Arrival {
                unit_id: id,
                position: step.position,
            });
        }
        Ok(())
    }

    fn refresh_spatial_hash(&mut self) {
        self.spatial.clear();
        for unit in self.units.iter() {
            if !unit.is_dead() {
                self.spatial.add(unit.id, unit.position);
            }
        }
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    /// Hash of tick, clock and every unit in id order.
    ///
    /// Two rooms fed identical inputs produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);
        self.clock.to_bits().hash(&mut hasher);

        let ids = self.units.sorted_ids();
        ids.len().hash(&mut hasher);

        for unit in self.units.iter_sorted() {
            unit.id.hash(&mut hasher);
            unit.kind.hash(&mut hasher);
            unit.owner.hash(&mut hasher);
            unit.position.hash(&mut hasher);
            unit.hp.hash(&mut hasher);
            unit.status.hash(&mut hasher);
            unit.target.map(|t| (t.kind, t.position)).hash(&mut hasher);
            self.movement.progress(unit.id).to_bits().hash(&mut hasher);
        }

        self.winner.hash(&mut hasher);
        hasher.finish()
    }

    /// Serializable copy of the room state.
    #[must_use]
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            tick: self.tick,
            clock: self.clock,
            units: self.units.iter_sorted().cloned().collect(),
            auras: self.conquest.auras().to_vec(),
            winner: self.winner,
        }
    }
}

/// Borrow two distinct players mutably.
fn two_players_mut(
    players: &mut [Player],
    first: PlayerId,
    second: Option<PlayerId>,
) -> (Option<&mut Player>, Option<&mut Player>) {
    let mut a = None;
    let mut b = None;
    for player in players.iter_mut() {
        if player.id == first {
            a = Some(player);
        } else if Some(player.id) == second {
            b = Some(player);
        }
    }
    (a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::CombatEventKind;
    use crate::economy::Resources;
    use crate::tiles::TileKind;

    fn two_players() -> Vec<Player> {
        vec![
            Player::new(1, "red", 1000).with_resources(Resources::new(500, 500, 500)),
            Player::new(2, "blue", 1000).with_resources(Resources::new(500, 500, 500)),
        ]
    }

    fn dt() -> Fixed {
        Fixed::ONE / Fixed::from_num(10)
    }

    #[test]
    fn test_simulation_new() {
        let sim = Simulation::default();
        assert_eq!(sim.tick(), 0);
        assert_eq!(sim.clock(), Fixed::ZERO);
        assert!(sim.units().is_empty());
    }

    #[test]
    fn test_move_unit_rejections() {
        let mut sim = Simulation::default();
        let a = sim.spawn_unit(UnitKind::Infantry, 1, GridPos::new(5, 5));
        sim.spawn_unit(UnitKind::Infantry, 2, GridPos::new(8, 8));
        let trainee = sim.train_unit(UnitKind::Archer, 1, GridPos::new(1, 1));

        assert!(!sim.move_unit(99, GridPos::new(6, 6), None));
        assert!(!sim.move_unit(a, GridPos::new(40, 0), None));
        assert!(!sim.move_unit(a, GridPos::new(8, 8), None));
        assert!(!sim.move_unit(trainee, GridPos::new(2, 2), None));
        assert_eq!(sim.get_unit(a).unwrap().status, UnitStatus::Idle);
        assert!(!sim.movement().has_path(a));
    }

    #[test]
    fn test_move_to_own_cell_is_arrival() {
        let mut sim = Simulation::default();
        let a = sim.spawn_unit(UnitKind::Infantry, 1, GridPos::new(5, 5));
        assert!(sim.move_unit(a, GridPos::new(5, 5), None));
        assert_eq!(sim.get_unit(a).unwrap().status, UnitStatus::Idle);
        assert!(!sim.movement().has_path(a));
    }

    #[test]
    fn test_unit_walks_and_arrives() {
        let mut sim = Simulation::default();
        let (mut tiles, mut players) = (Vec::new(), two_players());
        let a = sim.spawn_unit(UnitKind::Infantry, 1, GridPos::new(5, 5));

        assert!(sim.move_unit(a, GridPos::new(7, 5), None));
        assert_eq!(sim.get_unit(a).unwrap().status, UnitStatus::Moving);

        let mut arrivals = 0;
        for _ in 0..25 {
            let events = sim.update(dt(), &mut tiles, &mut players);
            arrivals += events
                .movement_events
                .iter()
                .filter(|e| matches!(e, MovementEvent::Arrival { .. }))
                .count();
        }

        let unit = sim.get_unit(a).unwrap();
        assert_eq!(arrivals, 1);
        assert_eq!(unit.position, GridPos::new(7, 5));
        assert_eq!(unit.status, UnitStatus::Idle);
        assert_eq!(sim.movement().progress(a), Fixed::ONE);
    }

    #[test]
    fn test_training_promotes_after_timer() {
        let mut sim = Simulation::default();
        let (mut tiles, mut players) = (Vec::new(), two_players());
        let id = sim.train_unit(UnitKind::Infantry, 1, GridPos::new(3, 3));

        let mut completed_at = None;
        for _ in 0..120 {
            let events = sim.update(dt(), &mut tiles, &mut players);
            if events.training_completed.iter().any(|t| t.unit_id == id) {
                completed_at = Some(sim.tick());
                break;
            }
        }

        // 10 s at 10 Hz, give or take one tick of fixed-point rounding
        let tick = completed_at.unwrap();
        assert!((100..=101).contains(&tick), "completed at tick {tick}");
        assert_eq!(sim.get_unit(id).unwrap().status, UnitStatus::Idle);
    }

    #[test]
    fn test_train_command_charges_player() {
        let mut sim = Simulation::default();
        let (mut tiles, mut players) = (Vec::new(), two_players());

        sim.enqueue(Command::Train {
            kind: UnitKind::Siege,
            owner: 1,
            position: GridPos::new(2, 2),
        });
        sim.enqueue(Command::Train {
            kind: UnitKind::Infantry,
            owner: 9,
            position: GridPos::new(2, 2),
        });
        let events = sim.update(dt(), &mut tiles, &mut players);

        assert_eq!(events.command_outcomes.len(), 2);
        assert!(events.command_outcomes[0].accepted);
        assert!(!events.command_outcomes[1].accepted);
        assert_eq!(players[0].resources, Resources::new(350, 500, 480));
        assert_eq!(sim.units().len(), 1);
        assert_eq!(sim.pending_commands(), 0);
    }

    #[test]
    fn test_combat_kills_and_purges() {
        let mut sim = Simulation::default();
        let (mut tiles, mut players) = (Vec::new(), two_players());
        let knight = sim.spawn_unit(UnitKind::Knight, 1, GridPos::new(5, 5));
        let mut weak = Unit::new(0, UnitKind::Infantry, 2, GridPos::new(5, 6));
        weak.hp = 5;
        let weak = sim.add_unit(weak);

        let events = sim.update(dt(), &mut tiles, &mut players);

        assert!(events
            .combat_events
            .iter()
            .any(|e| e.kind == CombatEventKind::Death && e.target_id == weak));
        assert!(sim.get_unit(weak).unwrap().is_dead());
        assert!(sim.get_units_in_area(GridPos::new(5, 6), 0).is_empty());
        assert_eq!(sim.get_unit(knight).unwrap().status, UnitStatus::Attacking);
    }

    #[test]
    fn test_add_unit_normalizes_zero_hp() {
        let mut sim = Simulation::default();
        let (mut tiles, mut players) = (Vec::new(), two_players());
        sim.spawn_unit(UnitKind::Knight, 1, GridPos::new(5, 5));
        let mut husk = Unit::new(0, UnitKind::Infantry, 2, GridPos::new(5, 6));
        husk.hp = 0;
        let husk = sim.add_unit(husk);

        assert!(sim.get_unit(husk).unwrap().is_dead());
        assert!(sim.get_units_in_area(GridPos::new(5, 6), 0).is_empty());

        let events = sim.update(dt(), &mut tiles, &mut players);
        assert!(events.combat_events.is_empty());
        assert!(sim.get_unit(husk).unwrap().is_dead());

        let mut ghost = Unit::new(0, UnitKind::Archer, 2, GridPos::new(9, 9));
        ghost.status = UnitStatus::Dead;
        let ghost = sim.add_unit(ghost);
        assert_eq!(sim.get_unit(ghost).unwrap().hp, 0);
        assert!(sim.get_units_in_area(GridPos::new(9, 9), 0).is_empty());
    }

    #[test]
    fn test_unit_moving_without_path_does_not_stall_tick() {
        let mut sim = Simulation::default();
        let (mut tiles, mut players) = (Vec::new(), two_players());
        let mut stray = Unit::new(0, UnitKind::Infantry, 1, GridPos::new(10, 10));
        stray.status = UnitStatus::Moving;
        let stray = sim.add_unit(stray);
        let walker = sim.spawn_unit(UnitKind::Infantry, 1, GridPos::new(10, 12));
        assert!(sim.move_unit(walker, GridPos::new(14, 12), None));

        sim.update(dt(), &mut tiles, &mut players);
        assert_eq!(sim.get_unit(stray).unwrap().status, UnitStatus::Idle);

        for _ in 0..14 {
            sim.update(dt(), &mut tiles, &mut players);
        }
        let walker = sim.get_unit(walker).unwrap();
        assert_eq!(walker.status, UnitStatus::Moving);
        assert_ne!(walker.position, GridPos::new(10, 12));
        assert_eq!(sim.get_unit(stray).unwrap().position, GridPos::new(10, 10));
    }

    #[test]
    fn test_training_without_timer_does_not_stall_tick() {
        let mut sim = Simulation::default();
        let (mut tiles, mut players) = (Vec::new(), two_players());
        let mut recruit = Unit::new(0, UnitKind::Archer, 1, GridPos::new(20, 20));
        recruit.status = UnitStatus::Training;
        recruit.training = None;
        let recruit = sim.add_unit(recruit);
        let walker = sim.spawn_unit(UnitKind::Knight, 1, GridPos::new(2, 2));
        assert!(sim.move_unit(walker, GridPos::new(6, 2), None));

        let mut events = sim.update(dt(), &mut tiles, &mut players);
        assert!(events.training_completed.is_empty());
        assert_eq!(sim.get_unit(recruit).unwrap().status, UnitStatus::Idle);

        for _ in 0..9 {
            events = sim.update(dt(), &mut tiles, &mut players);
        }
        assert!(events.training_completed.is_empty());
        assert_ne!(sim.get_unit(walker).unwrap().position, GridPos::new(2, 2));
    }

    #[test]
    fn test_aura_reduces_damage_in_tick() {
        let mut sim = Simulation::default();
        let mut tiles = vec![Tile::new(1, TileKind::Watchtower, GridPos::new(5, 7)).with_owner(2)];
        let mut players = two_players();
        sim.spawn_unit(UnitKind::Infantry, 1, GridPos::new(5, 5));
        let archer = sim.spawn_unit(UnitKind::Archer, 2, GridPos::new(5, 6));

        let events = sim.update(dt(), &mut tiles, &mut players);

        let hit = events
            .combat_events
            .iter()
            .find(|e| e.target_id == archer)
            .unwrap();
        assert_eq!(hit.damage, 24);
    }

    #[test]
    fn test_attack_tile_and_victory() {
        let mut sim = Simulation::default();
        let mut tiles = vec![
            Tile::new(1, TileKind::CapitalCity, GridPos::new(10, 10)).with_owner(1),
            Tile::new(2, TileKind::CapitalCity, GridPos::new(30, 30)).with_owner(2),
        ];
        tiles[1].hp = 100;
        let mut players = two_players();
        players[1].capital_hp = 100;
        let siege = sim.spawn_unit(UnitKind::Siege, 1, GridPos::new(30, 28));

        sim.enqueue(Command::AttackTile {
            unit_id: siege,
            tile_id: 2,
        });
        let events = sim.update(dt(), &mut tiles, &mut players);

        assert_eq!(events.structure_attacks.len(), 1);
        assert!(events.structure_attacks[0].report.destroyed);
        assert_eq!(tiles[1].owner, None);
        assert_eq!(events.eliminated, vec![2]);
        assert_eq!(events.winner, Some(1));
        assert!(sim.is_game_over());

        // Reported once
        let events = sim.update(dt(), &mut tiles, &mut players);
        assert_eq!(events.winner, None);
        assert!(!events.game_over);
    }

    #[test]
    fn test_attack_own_tile_rejected() {
        let mut sim = Simulation::default();
        let mut tiles = vec![Tile::new(1, TileKind::Mine, GridPos::new(5, 6)).with_owner(1)];
        let mut players = two_players();
        let unit = sim.spawn_unit(UnitKind::Infantry, 1, GridPos::new(5, 5));

        sim.enqueue(Command::AttackTile {
            unit_id: unit,
            tile_id: 1,
        });
        let events = sim.update(dt(), &mut tiles, &mut players);

        assert!(!events.command_outcomes[0].accepted);
        assert_eq!(tiles[0].hp, 150);
    }

    #[test]
    fn test_missing_lookups_are_rejected() {
        let mut sim = Simulation::default();
        let (mut tiles, mut players) = (Vec::new(), two_players());
        let unit = sim.spawn_unit(UnitKind::Knight, 1, GridPos::new(5, 5));

        assert!(sim.get_unit(404).is_none());
        sim.enqueue(Command::Raid {
            unit_id: unit,
            tile_id: 77,
        });
        sim.enqueue(Command::Stop { unit_id: 404 });
        let events = sim.update(dt(), &mut tiles, &mut players);

        assert_eq!(events.command_outcomes.len(), 2);
        assert!(events.command_outcomes.iter().all(|o| !o.accepted));
        let reason = events.command_outcomes[0].reason.as_deref().unwrap();
        assert!(reason.contains("77"), "{reason}");
    }

    #[test]
    fn test_raid_command_moves_resources() {
        let mut sim = Simulation::default();
        let mut tiles = vec![Tile::new(1, TileKind::City, GridPos::new(5, 6))
            .with_owner(2)
            .with_resources(Resources::new(100, 50, 25))];
        let mut players = two_players();
        let unit = sim.spawn_unit(UnitKind::Infantry, 1, GridPos::new(5, 5));

        sim.enqueue(Command::Raid {
            unit_id: unit,
            tile_id: 1,
        });
        let events = sim.update(dt(), &mut tiles, &mut players);

        assert_eq!(events.raids.len(), 1);
        assert_eq!(players[0].resources, Resources::new(510, 505, 502));
        assert_eq!(players[1].resources, Resources::new(490, 495, 498));
    }

    #[test]
    fn test_stop_unit() {
        let mut sim = Simulation::default();
        let a = sim.spawn_unit(UnitKind::Knight, 1, GridPos::new(0, 0));
        assert!(sim.move_unit(a, GridPos::new(10, 0), None));
        assert!(sim.stop_unit(a));
        assert!(!sim.movement().has_path(a));
        assert_eq!(sim.get_unit(a).unwrap().status, UnitStatus::Idle);
        assert!(!sim.stop_unit(42));
    }

    #[test]
    fn test_remove_unit_purges_indexes() {
        let mut sim = Simulation::default();
        let a = sim.spawn_unit(UnitKind::Knight, 1, GridPos::new(3, 3));
        assert_eq!(sim.get_units_in_area(GridPos::new(3, 3), 0).len(), 1);
        assert!(sim.remove_unit(a).is_some());
        assert!(sim.get_units_in_area(GridPos::new(3, 3), 0).is_empty());
        assert!(sim.get_unit(a).is_none());
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let mut sim = Simulation::default();
        sim.spawn_unit(UnitKind::Archer, 1, GridPos::new(1, 2));
        sim.spawn_unit(UnitKind::Siege, 2, GridPos::new(20, 20));
        let snapshot = sim.snapshot();

        let decoded = RoomSnapshot::decode(&snapshot.encode().unwrap()).unwrap();
        assert_eq!(decoded, snapshot);
        assert_eq!(decoded.units.len(), 2);
        assert!(RoomSnapshot::decode(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_state_hash_tracks_changes() {
        let mut sim = Simulation::default();
        let (mut tiles, mut players) = (Vec::new(), two_players());
        sim.spawn_unit(UnitKind::Infantry, 1, GridPos::new(1, 1));
        let before = sim.state_hash();
        assert_eq!(before, sim.state_hash());

        sim.update(dt(), &mut tiles, &mut players);
        assert_ne!(before, sim.state_hash());
    }
}
