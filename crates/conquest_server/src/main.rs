//! Conquest Battlefield - Room Host
//!
//! Usage: `conquest_server [server.ron] [sim.ron]`
//!
//! Opens a demo room and runs until Ctrl-C or the demo game ends.

use std::process::ExitCode;

use conquest_core::components::UnitKind;
use conquest_core::config::SimConfig;
use conquest_core::economy::{Player, Resources};
use conquest_core::math::GridPos;
use conquest_core::simulation::{Command, Simulation};
use conquest_core::tiles::{Tile, TileKind};
use conquest_server::{RoomBroadcast, RoomRegistry, ServerConfig, ServerError};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEMO_ROOM: u64 = 1;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("Starting Conquest Battlefield room host");

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "room host failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), ServerError> {
    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    let sim_config = match args.next() {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };
    info!(tick_rate = config.tick_rate, max_rooms = config.max_rooms, "config loaded");

    let mut registry = RoomRegistry::new(config);
    let (sim, tiles, players, orders) = demo_room(sim_config);
    let handle = registry.create_with(DEMO_ROOM, sim, tiles, players)?;
    for order in orders {
        handle.send(order).await?;
    }

    let mut rx = handle.subscribe();
    let watch = async {
        loop {
            match rx.recv().await {
                Ok(RoomBroadcast::Events(events)) if !events.is_empty() => {
                    debug!(
                        tick = events.tick,
                        moves = events.movement_events.len(),
                        hits = events.combat_events.len(),
                        "room events"
                    );
                }
                Ok(RoomBroadcast::Finished { winner }) => {
                    info!(?winner, "demo game finished");
                    break;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event stream lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    };

    tokio::select! {
        () = watch => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                warn!(error = %err, "could not listen for Ctrl-C");
            }
            info!("shutdown requested");
        }
    }

    for outcome in registry.shutdown_all().await {
        info!(
            room_id = outcome.room_id,
            ticks = outcome.ticks,
            winner = ?outcome.winner,
            hash = outcome.state_hash,
            "room closed"
        );
    }
    Ok(())
}

/// Two players, a small army each, and orders sending player 1 forward.
fn demo_room(sim_config: SimConfig) -> (Simulation, Vec<Tile>, Vec<Player>, Vec<Command>) {
    let size = sim_config.map_size as i32;
    let mid = size / 2;
    let tiles = vec![
        Tile::new(1, TileKind::CapitalCity, GridPos::new(2, mid)).with_owner(1),
        Tile::new(2, TileKind::CapitalCity, GridPos::new(size - 3, mid)).with_owner(2),
        Tile::new(3, TileKind::Watchtower, GridPos::new(size - 5, mid + 1)).with_owner(2),
        Tile::new(4, TileKind::Marsh, GridPos::new(mid, mid)),
    ];
    let players = vec![
        Player::new(1, "north", TileKind::CapitalCity.default_hp())
            .with_resources(Resources::new(500, 500, 100)),
        Player::new(2, "south", TileKind::CapitalCity.default_hp())
            .with_resources(Resources::new(500, 500, 100)),
    ];

    let mut sim = Simulation::new(sim_config);
    sim.apply_terrain(&tiles);

    let mut orders = Vec::new();
    for (i, kind) in UnitKind::ALL.into_iter().enumerate() {
        let row = mid - 2 + i as i32;
        let attacker = sim.spawn_unit(kind, 1, GridPos::new(4, row));
        sim.spawn_unit(kind, 2, GridPos::new(size - 6, row));
        orders.push(Command::Move {
            unit_id: attacker,
            target: GridPos::new(size - 7, row),
            valid_mask: None,
        });
    }
    (sim, tiles, players, orders)
}
