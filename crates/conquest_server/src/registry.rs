//! Open rooms keyed by id.

use std::collections::HashMap;

use conquest_core::config::SimConfig;
use conquest_core::economy::Player;
use conquest_core::simulation::Simulation;
use conquest_core::tiles::Tile;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::room::{spawn_room_with, RoomHandle, RoomId, RoomOutcome};

struct RoomEntry {
    handle: RoomHandle,
    task: JoinHandle<RoomOutcome>,
}

/// Bounded set of independent rooms.
pub struct RoomRegistry {
    config: ServerConfig,
    rooms: HashMap<RoomId, RoomEntry>,
}

impl RoomRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            rooms: HashMap::new(),
        }
    }

    /// Host configuration.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Open a room with no units.
    ///
    /// # Errors
    ///
    /// See [`RoomRegistry::create_with`].
    pub fn create(
        &mut self,
        room_id: RoomId,
        sim_config: SimConfig,
        tiles: Vec<Tile>,
        players: Vec<Player>,
    ) -> Result<RoomHandle> {
        let mut sim = Simulation::new(sim_config);
        sim.apply_terrain(&tiles);
        self.create_with(room_id, sim, tiles, players)
    }

    /// Open a room around a prepared simulation.
    ///
    /// Rooms that already stopped are dropped first to free their slots.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::RoomExists`] if the id is taken by a running
    /// room, or [`ServerError::RoomLimit`] if every slot is in use.
    pub fn create_with(
        &mut self,
        room_id: RoomId,
        sim: Simulation,
        tiles: Vec<Tile>,
        players: Vec<Player>,
    ) -> Result<RoomHandle> {
        self.prune();
        if self.rooms.contains_key(&room_id) {
            return Err(ServerError::RoomExists(room_id));
        }
        if self.rooms.len() >= self.config.max_rooms {
            warn!(room_id, max = self.config.max_rooms, "room limit reached");
            return Err(ServerError::RoomLimit {
                max: self.config.max_rooms,
            });
        }

        let (handle, task) = spawn_room_with(room_id, &self.config, sim, tiles, players);
        self.rooms.insert(
            room_id,
            RoomEntry {
                handle: handle.clone(),
                task,
            },
        );
        info!(room_id, open = self.rooms.len(), "room created");
        Ok(handle)
    }

    /// Handle to a room.
    #[must_use]
    pub fn get(&self, room_id: RoomId) -> Option<RoomHandle> {
        self.rooms.get(&room_id).map(|entry| entry.handle.clone())
    }

    /// Shut a room down and wait for its task.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::RoomNotFound`] for unknown ids and
    /// [`ServerError::RoomClosed`] if the room task panicked.
    pub async fn remove(&mut self, room_id: RoomId) -> Result<RoomOutcome> {
        let entry = self
            .rooms
            .remove(&room_id)
            .ok_or(ServerError::RoomNotFound(room_id))?;
        entry.handle.shutdown().await;
        entry
            .task
            .await
            .map_err(|_| ServerError::RoomClosed(room_id))
    }

    /// Drop entries whose task has already stopped.
    pub fn prune(&mut self) -> usize {
        let before = self.rooms.len();
        self.rooms.retain(|_, entry| !entry.task.is_finished());
        before - self.rooms.len()
    }

    /// Open room ids in ascending order.
    #[must_use]
    pub fn room_ids(&self) -> Vec<RoomId> {
        let mut ids: Vec<RoomId> = self.rooms.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of rooms held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Check if no rooms are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Shut every room down, returning their outcomes in id order.
    pub async fn shutdown_all(&mut self) -> Vec<RoomOutcome> {
        let mut outcomes = Vec::with_capacity(self.rooms.len());
        for room_id in self.room_ids() {
            match self.remove(room_id).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => warn!(room_id, error = %err, "room did not stop cleanly"),
            }
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::StopReason;
    use conquest_test_utils::fixtures::{capital, player};

    fn config(max_rooms: usize) -> ServerConfig {
        ServerConfig {
            tick_rate: 100,
            max_rooms,
            ..ServerConfig::default()
        }
    }

    fn lobby() -> (Vec<Tile>, Vec<Player>) {
        (
            vec![capital(1, 1, 10, 10), capital(2, 2, 30, 30)],
            vec![player(1), player(2)],
        )
    }

    #[tokio::test]
    async fn test_create_get_remove() {
        let mut registry = RoomRegistry::new(config(4));
        let (tiles, players) = lobby();
        let handle = registry
            .create(7, SimConfig::default(), tiles, players)
            .unwrap();

        assert_eq!(handle.id(), 7);
        assert!(registry.get(7).is_some());
        assert!(registry.get(8).is_none());
        assert_eq!(registry.room_ids(), vec![7]);

        let outcome = registry.remove(7).await.unwrap();
        assert_eq!(outcome.reason, StopReason::Shutdown);
        assert!(registry.is_empty());
        assert!(matches!(
            registry.remove(7).await,
            Err(ServerError::RoomNotFound(7))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_and_limit() {
        let mut registry = RoomRegistry::new(config(2));
        let (tiles, players) = lobby();

        registry
            .create(1, SimConfig::default(), tiles.clone(), players.clone())
            .unwrap();
        assert!(matches!(
            registry.create(1, SimConfig::default(), tiles.clone(), players.clone()),
            Err(ServerError::RoomExists(1))
        ));
        registry
            .create(2, SimConfig::default(), tiles.clone(), players.clone())
            .unwrap();
        assert!(matches!(
            registry.create(3, SimConfig::default(), tiles, players),
            Err(ServerError::RoomLimit { max: 2 })
        ));

        let outcomes = registry.shutdown_all().await;
        assert_eq!(outcomes.len(), 2);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_finished_rooms_free_slots() {
        let mut registry = RoomRegistry::new(config(1));
        let (tiles, mut players) = lobby();
        players[1].capital_hp = 0;

        let handle = registry
            .create(1, SimConfig::default(), tiles.clone(), players)
            .unwrap();
        // The game is decided on the first tick.
        for _ in 0..500 {
            if handle.is_closed() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(handle.is_closed());
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let (_, players) = lobby();
        assert!(registry.create(2, SimConfig::default(), tiles, players).is_ok());
        assert_eq!(registry.room_ids(), vec![2]);
        registry.shutdown_all().await;
    }
}
