//! JSON protocol for headless sessions.
//!
//! The interactive runner communicates via JSON lines (one JSON object per
//! line):
//!
//! **Input (stdin):** control messages and simulation commands
//! **Output (stdout):** event batches and responses
//!
//! # Example Session
//!
//! ```text
//! <- {"type":"ready","version":"1.0","scenario":"Standard 1v1 Skirmish","tick":0}
//! -> {"cmd":"move","unit_id":1,"target":{"x":30,"y":17}}
//! <- {"type":"ack","cmd":"move"}
//! -> {"cmd":"tick","count":2}
//! <- {"type":"events","events":{"tick":1,...}}
//! <- {"type":"events","events":{"tick":2,...}}
//! -> {"cmd":"hash"}
//! <- {"type":"hash","tick":2,"hash":1234567890}
//! -> {"cmd":"quit"}
//! <- {"type":"ack","cmd":"quit"}
//! ```

use conquest_core::components::PlayerId;
use conquest_core::simulation::{Command, RoomSnapshot, TickEvents};
use serde::{Deserialize, Serialize};

use crate::runner::{PlayerSummary, RunSummary};

// ============================================================================
// Input (controller -> runner)
// ============================================================================

/// Runner control messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Control {
    /// Advance the simulation by N ticks (default: 1).
    Tick {
        /// Ticks to run.
        #[serde(default = "default_tick_count")]
        count: u32,
    },
    /// Report the current state hash.
    Hash,
    /// Report the full state.
    Snapshot,
    /// Report the run summary so far.
    Summary,
    /// End the session.
    Quit,
}

fn default_tick_count() -> u32 {
    1
}

/// One input line: a control message or a simulation command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Input {
    /// Runner control.
    Control(Control),
    /// Order queued for the next tick.
    Game(Command),
}

impl Input {
    /// Parse an input line.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Wire name of a simulation command, used in acknowledgements.
#[must_use]
pub fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Move { .. } => "move",
        Command::Stop { .. } => "stop",
        Command::AttackTile { .. } => "attack_tile",
        Command::Raid { .. } => "raid",
        Command::Train { .. } => "train",
    }
}

// ============================================================================
// Output (runner -> controller)
// ============================================================================

/// Responses written by the runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Session started.
    Ready {
        /// Protocol version.
        version: String,
        /// Loaded scenario.
        scenario: String,
        /// Current tick.
        tick: u64,
    },
    /// Input accepted.
    Ack {
        /// Acknowledged command name.
        cmd: String,
    },
    /// Input rejected.
    Error {
        /// What went wrong.
        message: String,
    },
    /// One tick's events.
    Events {
        /// The batch.
        events: TickEvents,
    },
    /// Current state hash.
    Hash {
        /// Tick the hash belongs to.
        tick: u64,
        /// Hash value.
        hash: u64,
    },
    /// Full state.
    Snapshot {
        /// Simulation state.
        snapshot: RoomSnapshot,
        /// Player state.
        players: Vec<PlayerSummary>,
    },
    /// Run summary.
    Summary {
        /// The summary.
        summary: RunSummary,
    },
    /// The run has finished.
    GameOver {
        /// Final tick.
        tick: u64,
        /// Winner, if decided.
        winner: Option<PlayerId>,
    },
}

impl Response {
    /// Acknowledgement for a command.
    #[must_use]
    pub fn ack(cmd: &str) -> Self {
        Self::Ack {
            cmd: cmd.to_string(),
        }
    }

    /// Error response.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Serialize to one JSON line with a trailing newline.
    #[must_use]
    pub fn to_json_line(&self) -> String {
        match serde_json::to_string(self) {
            Ok(json) => format!("{json}\n"),
            Err(err) => format!(
                "{{\"type\":\"error\",\"message\":\"serialization failed: {}\"}}\n",
                err.to_string().replace('"', "'")
            ),
        }
    }
}
