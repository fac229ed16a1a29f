//! One battlefield room running on its own tokio task.
//!
//! The task owns the [`Simulation`] together with the room's tiles and
//! players. Player commands arrive over an mpsc channel and are pushed into
//! the simulation's command queue between ticks, so a command never lands
//! in the middle of an update. Every tick's event batch is published on a
//! broadcast channel, with a snapshot every few ticks.

use conquest_core::components::PlayerId;
use conquest_core::config::SimConfig;
use conquest_core::economy::Player;
use conquest_core::simulation::{Command, RoomSnapshot, Simulation, TickEvents};
use conquest_core::tiles::Tile;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};

/// Room identifier.
pub type RoomId = u64;

/// Message into a room task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomCommand {
    /// A player order for the simulation queue.
    Player(Command),
    /// Stop the room after the current tick.
    Shutdown,
}

/// Message published by a room task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomBroadcast {
    /// One tick's event batch.
    Events(TickEvents),
    /// Periodic full state.
    Snapshot(RoomSnapshot),
    /// The game was decided; `None` is a draw.
    Finished {
        /// Surviving player.
        winner: Option<PlayerId>,
    },
}

/// Why a room task stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A winner or a draw was decided.
    GameOver,
    /// Shut down on request, or every handle was dropped.
    Shutdown,
}

/// Final state of a stopped room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomOutcome {
    /// Room id.
    pub room_id: RoomId,
    /// Why it stopped.
    pub reason: StopReason,
    /// Ticks run.
    pub ticks: u64,
    /// Winner, if decided.
    pub winner: Option<PlayerId>,
    /// Final state hash.
    pub state_hash: u64,
}

/// Cloneable handle to a running room.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    id: RoomId,
    commands: mpsc::Sender<RoomCommand>,
    broadcast: broadcast::Sender<RoomBroadcast>,
}

impl RoomHandle {
    /// Room id.
    #[must_use]
    pub const fn id(&self) -> RoomId {
        self.id
    }

    /// Queue a player command for the next tick.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::RoomClosed`] if the room task has stopped.
    pub async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(RoomCommand::Player(command))
            .await
            .map_err(|_| ServerError::RoomClosed(self.id))
    }

    /// Queue a player command without waiting for buffer space.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::RoomClosed`] if the room has stopped or its
    /// command buffer is full.
    pub fn try_send(&self, command: Command) -> Result<()> {
        self.commands
            .try_send(RoomCommand::Player(command))
            .map_err(|_| ServerError::RoomClosed(self.id))
    }

    /// Receive every message the room publishes from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RoomBroadcast> {
        self.broadcast.subscribe()
    }

    /// Ask the room to stop. Stopping an already stopped room is a no-op.
    pub async fn shutdown(&self) {
        if self.commands.send(RoomCommand::Shutdown).await.is_err() {
            debug!(room_id = self.id, "shutdown sent to stopped room");
        }
    }

    /// True once the room task has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// Spawn a room task.
///
/// The room ticks at `config.tick_rate` until the game is decided, a
/// shutdown arrives, or every [`RoomHandle`] is dropped. Missed ticks are
/// skipped rather than replayed in a burst.
#[must_use]
pub fn spawn_room(
    room_id: RoomId,
    config: &ServerConfig,
    sim_config: SimConfig,
    tiles: Vec<Tile>,
    players: Vec<Player>,
) -> (RoomHandle, JoinHandle<RoomOutcome>) {
    let mut sim = Simulation::new(sim_config);
    sim.apply_terrain(&tiles);
    spawn_room_with(room_id, config, sim, tiles, players)
}

/// Spawn a room around an already populated simulation.
///
/// Used when units are placed before the room opens.
#[must_use]
pub fn spawn_room_with(
    room_id: RoomId,
    config: &ServerConfig,
    sim: Simulation,
    tiles: Vec<Tile>,
    players: Vec<Player>,
) -> (RoomHandle, JoinHandle<RoomOutcome>) {
    let (command_tx, command_rx) = mpsc::channel(config.command_capacity.max(1));
    let (broadcast_tx, _) = broadcast::channel(config.broadcast_capacity.max(1));

    let room = Room {
        id: room_id,
        config: config.clone(),
        sim,
        tiles,
        players,
        commands: command_rx,
        broadcast: broadcast_tx.clone(),
    };
    let task = tokio::spawn(room.run());

    (
        RoomHandle {
            id: room_id,
            commands: command_tx,
            broadcast: broadcast_tx,
        },
        task,
    )
}

struct Room {
    id: RoomId,
    config: ServerConfig,
    sim: Simulation,
    tiles: Vec<Tile>,
    players: Vec<Player>,
    commands: mpsc::Receiver<RoomCommand>,
    broadcast: broadcast::Sender<RoomBroadcast>,
}

impl Room {
    async fn run(mut self) -> RoomOutcome {
        let mut ticker = interval(self.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let dt = self.config.tick_delta();
        let snapshot_every = self.config.snapshot_interval_ticks.max(1);

        info!(
            room_id = self.id,
            tick_rate = self.config.tick_rate,
            units = self.sim.units().len(),
            players = self.players.len(),
            "room started"
        );

        let reason = loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let events = self.sim.update(dt, &mut self.tiles, &mut self.players);
                    let finished = events.game_over;
                    let winner = events.winner;
                    self.publish(RoomBroadcast::Events(events));

                    if self.sim.tick() % snapshot_every == 0 {
                        self.publish(RoomBroadcast::Snapshot(self.sim.snapshot()));
                    }
                    if finished {
                        self.publish(RoomBroadcast::Finished { winner });
                        break StopReason::GameOver;
                    }
                }
                message = self.commands.recv() => match message {
                    Some(RoomCommand::Player(command)) => self.sim.enqueue(command),
                    Some(RoomCommand::Shutdown) => break StopReason::Shutdown,
                    None => {
                        warn!(room_id = self.id, "all room handles dropped");
                        break StopReason::Shutdown;
                    }
                },
            }
        };

        let outcome = RoomOutcome {
            room_id: self.id,
            reason,
            ticks: self.sim.tick(),
            winner: self.sim.winner(),
            state_hash: self.sim.state_hash(),
        };
        info!(
            room_id = self.id,
            ?reason,
            ticks = outcome.ticks,
            winner = ?outcome.winner,
            "room stopped"
        );
        outcome
    }

    fn publish(&self, message: RoomBroadcast) {
        // No subscribers is fine; the room keeps running.
        if self.broadcast.send(message).is_err() {
            debug!(room_id = self.id, "no subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conquest_core::components::UnitKind;
    use conquest_core::simulation::MovementEvent;
    use conquest_test_utils::fixtures::{capital, player, pos};
    use std::time::Duration;
    use tokio::sync::broadcast::error::RecvError;
    use tokio::time::timeout;

    fn fast_config() -> ServerConfig {
        ServerConfig {
            tick_rate: 100,
            ..ServerConfig::default()
        }
    }

    fn two_players() -> (Vec<Tile>, Vec<Player>) {
        (
            vec![capital(1, 1, 10, 10), capital(2, 2, 30, 30)],
            vec![player(1), player(2)],
        )
    }

    /// Next message matching `pick`, skipping lag.
    async fn next_matching<T>(
        rx: &mut broadcast::Receiver<RoomBroadcast>,
        mut pick: impl FnMut(RoomBroadcast) -> Option<T>,
    ) -> T {
        timeout(Duration::from_secs(10), async {
            loop {
                match rx.recv().await {
                    Ok(message) => {
                        if let Some(found) = pick(message) {
                            return found;
                        }
                    }
                    Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => panic!("room closed"),
                }
            }
        })
        .await
        .expect("timed out waiting for room message")
    }

    #[tokio::test]
    async fn test_room_publishes_events_and_snapshots() {
        let (tiles, players) = two_players();
        let (handle, task) = spawn_room(1, &fast_config(), SimConfig::default(), tiles, players);
        let mut rx = handle.subscribe();

        let tick = next_matching(&mut rx, |m| match m {
            RoomBroadcast::Events(events) => Some(events.tick),
            _ => None,
        })
        .await;
        assert!(tick >= 1);

        let snapshot = next_matching(&mut rx, |m| match m {
            RoomBroadcast::Snapshot(snapshot) => Some(snapshot),
            _ => None,
        })
        .await;
        assert_eq!(snapshot.tick % 3, 0);

        handle.shutdown().await;
        let outcome = task.await.unwrap();
        assert_eq!(outcome.reason, StopReason::Shutdown);
        assert_eq!(outcome.room_id, 1);
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn test_commands_reach_simulation() {
        let (tiles, players) = two_players();
        let mut sim = Simulation::default();
        let knight = sim.spawn_unit(UnitKind::Knight, 1, pos(0, 0));
        let (handle, task) = spawn_room_with(2, &fast_config(), sim, tiles, players);
        let mut rx = handle.subscribe();

        handle
            .send(Command::Move {
                unit_id: knight,
                target: pos(1, 0),
                valid_mask: None,
            })
            .await
            .unwrap();

        let arrived_at = next_matching(&mut rx, |m| match m {
            RoomBroadcast::Events(events) => events.movement_events.iter().find_map(|e| match e {
                MovementEvent::Arrival { unit_id, position } if *unit_id == knight => {
                    Some(*position)
                }
                _ => None,
            }),
            _ => None,
        })
        .await;
        assert_eq!(arrived_at, pos(1, 0));

        handle.shutdown().await;
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_room_stops_on_victory() {
        let (tiles, mut players) = two_players();
        players[1].capital_hp = 0;
        let (handle, task) = spawn_room(3, &fast_config(), SimConfig::default(), tiles, players);

        let outcome = timeout(Duration::from_secs(10), task).await.unwrap().unwrap();

        assert_eq!(outcome.reason, StopReason::GameOver);
        assert_eq!(outcome.winner, Some(1));
        assert_eq!(outcome.ticks, 1);
        assert!(handle.send(Command::Stop { unit_id: 1 }).await.is_err());
    }

    #[tokio::test]
    async fn test_dropping_handles_stops_room() {
        let (tiles, players) = two_players();
        let (handle, task) = spawn_room(4, &fast_config(), SimConfig::default(), tiles, players);
        drop(handle);

        let outcome = timeout(Duration::from_secs(10), task).await.unwrap().unwrap();
        assert_eq!(outcome.reason, StopReason::Shutdown);
    }
}
