//! Headless scenario runner.
//!
//! [`ScenarioRunner`] drives one [`Simulation`] through a scenario at the
//! scenario's fixed tick delta, feeding scheduled orders in on their tick
//! and folding every event batch into [`MatchMetrics`].
//!
//! [`run_interactive`] exposes the same runner over JSON lines so an
//! external controller can step the battlefield and issue orders.

use std::io::{self, BufRead, Write};

use conquest_core::components::PlayerId;
use conquest_core::economy::{Player, Resources};
use conquest_core::math::Fixed;
use conquest_core::simulation::{Command, RoomSnapshot, Simulation, TickEvents};
use conquest_core::tiles::Tile;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::metrics::MatchMetrics;
use crate::protocol::{Control, Input, Response};
use crate::scenario::{Scenario, ScenarioError};

/// Final state of one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSummary {
    /// Player id.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Capital hit points.
    pub capital_hp: u32,
    /// Stockpile.
    pub resources: Resources,
    /// Eliminated.
    pub is_eliminated: bool,
}

impl From<&Player> for PlayerSummary {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id,
            name: player.name.clone(),
            capital_hp: player.capital_hp,
            resources: player.resources,
            is_eliminated: player.is_eliminated,
        }
    }
}

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Scenario name.
    pub scenario: String,
    /// Ticks run.
    pub ticks: u64,
    /// Winner, if decided.
    pub winner: Option<PlayerId>,
    /// True if the game ended before the tick limit.
    pub game_over: bool,
    /// Final state hash.
    pub state_hash: u64,
    /// Players at the end.
    pub players: Vec<PlayerSummary>,
    /// Collected metrics.
    pub metrics: MatchMetrics,
}

/// Steps a scenario tick by tick.
#[derive(Debug, Clone)]
pub struct ScenarioRunner {
    scenario: Scenario,
    sim: Simulation,
    tiles: Vec<Tile>,
    players: Vec<Player>,
    dt: Fixed,
    metrics: MatchMetrics,
}

impl ScenarioRunner {
    /// Build the battlefield for a scenario.
    pub fn new(scenario: Scenario) -> Result<Self, ScenarioError> {
        let battle = scenario.build()?;
        let dt = battle.sim.config().tick_delta();
        let metrics = MatchMetrics::new(scenario.name.clone());
        info!(
            scenario = %scenario.name,
            units = battle.sim.units().len(),
            players = battle.players.len(),
            max_ticks = scenario.max_ticks,
            "scenario loaded"
        );
        Ok(Self {
            scenario,
            sim: battle.sim,
            tiles: battle.tiles,
            players: battle.players,
            dt,
            metrics,
        })
    }

    /// The scenario being run.
    #[must_use]
    pub const fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// The simulation.
    #[must_use]
    pub const fn sim(&self) -> &Simulation {
        &self.sim
    }

    /// Current tiles.
    #[must_use]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Current players.
    #[must_use]
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Metrics so far.
    #[must_use]
    pub const fn metrics(&self) -> &MatchMetrics {
        &self.metrics
    }

    /// True once the game is decided or the tick limit is reached.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.sim.is_game_over() || self.sim.tick() >= self.scenario.max_ticks
    }

    /// Queue an extra command for the next tick.
    pub fn enqueue(&mut self, command: Command) {
        self.sim.enqueue(command);
    }

    /// Run one update, applying the orders scheduled for it first.
    pub fn step(&mut self) -> TickEvents {
        let next = self.sim.tick() + 1;
        for command in self.scenario.orders_at(next) {
            self.sim.enqueue(command);
        }
        let events = self.sim.update(self.dt, &mut self.tiles, &mut self.players);
        self.metrics.record(&events, &self.sim);

        for outcome in events.command_outcomes.iter().filter(|o| !o.accepted) {
            warn!(
                tick = events.tick,
                command = ?outcome.command,
                reason = outcome.reason.as_deref().unwrap_or("unknown"),
                "order rejected"
            );
        }
        if events.game_over {
            info!(tick = events.tick, winner = ?events.winner, "game decided");
        }
        events
    }

    /// Step up to `count` ticks, stopping early when the run finishes.
    pub fn step_n(&mut self, count: u32) -> Vec<TickEvents> {
        let mut batches = Vec::new();
        for _ in 0..count {
            if self.is_finished() {
                break;
            }
            batches.push(self.step());
        }
        batches
    }

    /// Full state at the current tick.
    #[must_use]
    pub fn snapshot(&self) -> RoomSnapshot {
        self.sim.snapshot()
    }

    /// Summary of the run so far.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        let mut metrics = self.metrics.clone();
        metrics.finalize(&self.sim);
        RunSummary {
            scenario: self.scenario.name.clone(),
            ticks: self.sim.tick(),
            winner: self.sim.winner(),
            game_over: self.sim.is_game_over(),
            state_hash: self.sim.state_hash(),
            players: self.players.iter().map(PlayerSummary::from).collect(),
            metrics,
        }
    }

    /// Run to completion, handing every event batch to `on_tick`.
    pub fn run(mut self, mut on_tick: impl FnMut(&TickEvents)) -> RunSummary {
        while !self.is_finished() {
            let events = self.step();
            on_tick(&events);
            if events.tick % 100 == 0 {
                debug!(tick = events.tick, hash = self.sim.state_hash(), "progress");
            }
        }
        let summary = self.summary();
        info!(
            scenario = %summary.scenario,
            ticks = summary.ticks,
            winner = ?summary.winner,
            hash = summary.state_hash,
            "run complete"
        );
        summary
    }
}

/// Outcome of running one scenario several times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    /// Scenario name.
    pub scenario: String,
    /// Ticks per run.
    pub ticks: Vec<u64>,
    /// Final hash per run.
    pub hashes: Vec<u64>,
    /// True if every run ended identically.
    pub deterministic: bool,
}

/// Run a scenario `runs` times in parallel and compare the final hashes.
pub fn verify_scenario(scenario: &Scenario, runs: u32) -> Result<VerifyReport, ScenarioError> {
    scenario.validate()?;

    let results: Vec<(u64, u64)> = (0..runs.max(1))
        .into_par_iter()
        .map(|_| {
            let summary = ScenarioRunner::new(scenario.clone())
                .map(|runner| runner.run(|_| {}))?;
            Ok((summary.ticks, summary.state_hash))
        })
        .collect::<Result<_, ScenarioError>>()?;

    let (ticks, hashes): (Vec<u64>, Vec<u64>) = results.into_iter().unzip();
    let deterministic = hashes.windows(2).all(|w| w[0] == w[1])
        && ticks.windows(2).all(|w| w[0] == w[1]);
    if !deterministic {
        warn!(scenario = %scenario.name, ?hashes, "runs diverged");
    }

    Ok(VerifyReport {
        scenario: scenario.name.clone(),
        ticks,
        hashes,
        deterministic,
    })
}

/// Serve a runner over JSON lines until `quit` or end of input.
///
/// Every input line is either a control message (`tick`, `hash`,
/// `snapshot`, `summary`, `quit`) or a simulation command, which is queued
/// for the next tick and acknowledged.
pub fn run_interactive<R: BufRead, W: Write>(
    mut runner: ScenarioRunner,
    input: R,
    mut output: W,
) -> io::Result<RunSummary> {
    write_line(
        &mut output,
        &Response::Ready {
            version: crate::PROTOCOL_VERSION.to_string(),
            scenario: runner.scenario().name.clone(),
            tick: runner.sim().tick(),
        },
    )?;

    for line in input.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let input = match Input::from_json(line) {
            Ok(input) => input,
            Err(err) => {
                write_line(&mut output, &Response::error(format!("parse error: {err}")))?;
                continue;
            }
        };

        match input {
            Input::Control(Control::Tick { count }) => {
                for events in runner.step_n(count) {
                    write_line(&mut output, &Response::Events { events })?;
                }
                if runner.is_finished() {
                    write_line(
                        &mut output,
                        &Response::GameOver {
                            tick: runner.sim().tick(),
                            winner: runner.sim().winner(),
                        },
                    )?;
                }
            }
            Input::Control(Control::Hash) => write_line(
                &mut output,
                &Response::Hash {
                    tick: runner.sim().tick(),
                    hash: runner.sim().state_hash(),
                },
            )?,
            Input::Control(Control::Snapshot) => write_line(
                &mut output,
                &Response::Snapshot {
                    snapshot: runner.snapshot(),
                    players: runner.players().iter().map(PlayerSummary::from).collect(),
                },
            )?,
            Input::Control(Control::Summary) => write_line(
                &mut output,
                &Response::Summary {
                    summary: runner.summary(),
                },
            )?,
            Input::Control(Control::Quit) => {
                write_line(&mut output, &Response::ack("quit"))?;
                break;
            }
            Input::Game(command) => {
                let name = crate::protocol::command_name(&command);
                runner.enqueue(command);
                write_line(&mut output, &Response::ack(name))?;
            }
        }
    }

    Ok(runner.summary())
}

fn write_line<W: Write>(output: &mut W, response: &Response) -> io::Result<()> {
    output.write_all(response.to_json_line().as_bytes())?;
    output.flush()
}
