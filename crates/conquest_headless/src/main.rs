//! Headless conquest battlefield runner.
//!
//! Runs scenarios without a room host, for CI checks and balance runs.
//!
//! # Usage
//!
//! ```bash
//! # Play a scenario to the end: one JSON line per event batch, then the summary
//! cargo run -p conquest_headless -- run scenarios/skirmish.ron
//!
//! # Same, drawing the board every 50 ticks
//! cargo run -p conquest_headless -- run scenarios/skirmish.ron --draw-every 50
//!
//! # Step a scenario over JSON lines on stdin/stdout
//! cargo run -p conquest_headless -- play scenarios/skirmish.ron
//!
//! # Run a scenario several times and compare final hashes
//! cargo run -p conquest_headless -- verify scenarios/siege.ron --runs 8
//!
//! # Run every scenario in a directory
//! cargo run -p conquest_headless -- batch scenarios --output results.json
//! ```
//!
//! Logs go to stderr; stdout carries JSON only.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use conquest_headless::{
    ascii::{render_ascii, AsciiConfig},
    batch::{run_batch, BatchConfig},
    runner::{run_interactive, verify_scenario, ScenarioRunner},
    scenario::Scenario,
};

#[derive(Parser)]
#[command(name = "conquest_headless")]
#[command(about = "Headless conquest battlefield runner")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a scenario to the end
    Run {
        /// Scenario file (built-in 1v1 skirmish when omitted)
        scenario: Option<PathBuf>,

        /// Override the scenario's tick limit
        #[arg(long)]
        max_ticks: Option<u64>,

        /// Only print the final summary
        #[arg(short, long)]
        quiet: bool,

        /// Draw the board to stderr every N ticks (0 = only at the end)
        #[arg(long)]
        draw_every: Option<u64>,

        /// Use ANSI colors when drawing
        #[arg(long)]
        color: bool,
    },

    /// Step a scenario interactively over JSON lines
    Play {
        /// Scenario file (built-in 1v1 skirmish when omitted)
        scenario: Option<PathBuf>,
    },

    /// Run a scenario several times and compare final hashes
    Verify {
        /// Scenario file (built-in 1v1 skirmish when omitted)
        scenario: Option<PathBuf>,

        /// Number of runs
        #[arg(short, long, default_value = "5")]
        runs: u32,
    },

    /// Run every scenario in a directory
    Batch {
        /// Directory of `.ron` scenarios
        dir: PathBuf,

        /// Cap every run at this many ticks
        #[arg(long)]
        max_ticks: Option<u64>,

        /// Worker threads (0 = auto)
        #[arg(short, long, default_value = "0")]
        threads: usize,

        /// Write results JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the built-in scenario as RON
    Template,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for JSON)
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    let result = match cli.command {
        Some(Commands::Run {
            scenario,
            max_ticks,
            quiet,
            draw_every,
            color,
        }) => cmd_run(scenario, max_ticks, quiet, draw_every, color),
        Some(Commands::Play { scenario }) => cmd_play(scenario),
        Some(Commands::Verify { scenario, runs }) => cmd_verify(scenario, runs),
        Some(Commands::Batch {
            dir,
            max_ticks,
            threads,
            output,
        }) => cmd_batch(dir, max_ticks, threads, output),
        Some(Commands::Template) => cmd_template(),
        None => cmd_play(None),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

type CmdResult = Result<bool, Box<dyn std::error::Error>>;

fn load_scenario(path: Option<PathBuf>) -> Result<Scenario, conquest_headless::ScenarioError> {
    match path {
        Some(path) => {
            info!(path = %path.display(), "loading scenario");
            Scenario::load(path)
        }
        None => Ok(Scenario::skirmish_1v1()),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> CmdResult {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(true)
}

/// Play a scenario to the end
fn cmd_run(
    scenario: Option<PathBuf>,
    max_ticks: Option<u64>,
    quiet: bool,
    draw_every: Option<u64>,
    color: bool,
) -> CmdResult {
    let mut scenario = load_scenario(scenario)?;
    if let Some(limit) = max_ticks {
        scenario.max_ticks = limit;
    }
    let ascii = AsciiConfig {
        show_legend: true,
        use_color: color,
    };

    let mut runner = ScenarioRunner::new(scenario)?;
    let mut stdout = io::stdout().lock();
    while !runner.is_finished() {
        let batch = runner.step();
        if !quiet && !batch.is_empty() {
            serde_json::to_writer(&mut stdout, &batch)?;
            writeln!(stdout)?;
        }
        if let Some(every) = draw_every.filter(|&n| n > 0) {
            if batch.tick % every == 0 {
                eprint!("{}", render_ascii(runner.sim(), runner.tiles(), &ascii));
            }
        }
    }

    if draw_every.is_some() {
        eprint!("{}", render_ascii(runner.sim(), runner.tiles(), &ascii));
    }
    serde_json::to_writer(&mut stdout, &runner.summary())?;
    writeln!(stdout)?;
    Ok(true)
}

/// Step a scenario over stdin/stdout
fn cmd_play(scenario: Option<PathBuf>) -> CmdResult {
    info!("Starting interactive session");
    let runner = ScenarioRunner::new(load_scenario(scenario)?)?;
    let stdin = io::stdin();
    let summary = run_interactive(runner, stdin.lock(), io::stdout().lock())?;
    info!(ticks = summary.ticks, winner = ?summary.winner, "session ended");
    Ok(true)
}

/// Verify determinism by running the scenario several times
fn cmd_verify(scenario: Option<PathBuf>, runs: u32) -> CmdResult {
    let scenario = load_scenario(scenario)?;
    info!(scenario = %scenario.name, runs, "verifying determinism");

    let report = verify_scenario(&scenario, runs)?;
    if report.deterministic {
        info!("all runs matched");
    } else {
        error!(hashes = ?report.hashes, "runs diverged");
    }
    print_json(&report)?;
    Ok(report.deterministic)
}

/// Run every scenario in a directory
fn cmd_batch(
    dir: PathBuf,
    max_ticks: Option<u64>,
    threads: usize,
    output: Option<PathBuf>,
) -> CmdResult {
    let mut config = BatchConfig::new(dir).with_threads(threads);
    if let Some(limit) = max_ticks {
        config = config.with_max_ticks(limit);
    }

    let results = run_batch(config)?;
    info!(
        runs = results.runs.len(),
        decided = results.decided(),
        errors = results.errors.len(),
        "batch finished"
    );

    match output {
        Some(path) => {
            results.save(&path)?;
            info!(path = %path.display(), "results saved");
        }
        None => {
            print_json(&results)?;
        }
    }
    Ok(results.errors.is_empty())
}

/// Print the built-in scenario so it can be edited into a new one
fn cmd_template() -> CmdResult {
    let text = ron::ser::to_string_pretty(
        &Scenario::skirmish_1v1(),
        ron::ser::PrettyConfig::default(),
    )?;
    println!("{text}");
    Ok(true)
}
