//! Headless battlefield runner for CI verification and balance runs.
//!
//! This crate runs conquest scenarios without a room host or network. It
//! enables:
//!
//! - **Scenario runs**: Load a RON scenario and play it to completion
//! - **CI verification**: Run a scenario several times and compare hashes
//! - **Batch runs**: Play a directory of scenarios in parallel
//! - **Interactive control**: Step the battlefield over JSON lines
//!
//! # Protocol
//!
//! Communication uses JSON lines (one JSON object per line):
//!
//! - **stdin**: Control messages and simulation commands
//! - **stdout**: Event batches and responses (JSON)
//! - **stderr**: Debug logs (human-readable)
//!
//! See [`protocol`] module for the full message format.
//!
//! # Example
//!
//! ```bash
//! # Play a scenario and print the summary
//! cargo run -p conquest_headless -- run scenarios/skirmish.ron
//!
//! # Step interactively
//! echo '{"cmd":"tick","count":60}' | cargo run -p conquest_headless -- play
//!
//! # Verify determinism
//! cargo run -p conquest_headless -- verify scenarios/siege.ron --runs 8
//! ```

pub mod ascii;
pub mod batch;
pub mod metrics;
pub mod protocol;
pub mod runner;
pub mod scenario;

/// Version reported in the `ready` message.
pub const PROTOCOL_VERSION: &str = "1.0";

pub use ascii::{render_ascii, AsciiConfig};
pub use batch::{run_batch, BatchConfig, BatchResults};
pub use metrics::{MatchMetrics, PlayerMetrics};
pub use protocol::{Control, Input, Response};
pub use runner::{run_interactive, verify_scenario, RunSummary, ScenarioRunner, VerifyReport};
pub use scenario::{Scenario, ScenarioError};
