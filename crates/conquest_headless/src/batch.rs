//! Batch runs over a directory of scenarios.
//!
//! Every `*.ron` file in a directory is loaded and run to completion on
//! the rayon pool. Results are collected in file-name order so a batch
//! report is stable across runs.

use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::runner::{RunSummary, ScenarioRunner};
use crate::scenario::{Scenario, ScenarioError};

/// Batch run configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Directory holding scenario files.
    pub scenario_dir: PathBuf,
    /// Overrides every scenario's tick limit when set.
    pub max_ticks: Option<u64>,
    /// Worker threads (0 = rayon default).
    pub threads: usize,
}

impl BatchConfig {
    /// Run every scenario in `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            scenario_dir: dir.into(),
            max_ticks: None,
            threads: 0,
        }
    }

    /// Builder: cap every run at `ticks`.
    #[must_use]
    pub const fn with_max_ticks(mut self, ticks: u64) -> Self {
        self.max_ticks = Some(ticks);
        self
    }

    /// Builder: set the worker count.
    #[must_use]
    pub const fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }
}

/// A scenario that could not be run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchError {
    /// Scenario file.
    pub path: PathBuf,
    /// Error message.
    pub message: String,
}

/// Results of a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used.
    pub config: BatchConfig,
    /// Completed runs, in file-name order.
    pub runs: Vec<RunSummary>,
    /// Scenarios that failed to load.
    pub errors: Vec<BatchError>,
    /// Wall-clock duration.
    pub duration_seconds: f64,
}

impl BatchResults {
    /// Save results as pretty JSON.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    /// Load results saved by [`BatchResults::save`].
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Number of runs that ended with a winner.
    #[must_use]
    pub fn decided(&self) -> usize {
        self.runs.iter().filter(|r| r.winner.is_some()).count()
    }
}

/// Scenario files in `dir`, sorted by name.
pub fn scenario_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "ron"))
        .collect();
    files.sort();
    Ok(files)
}

fn run_file(path: &Path, max_ticks: Option<u64>) -> Result<RunSummary, ScenarioError> {
    let mut scenario = Scenario::load(path)?;
    if let Some(limit) = max_ticks {
        scenario.max_ticks = limit;
    }
    let runner = ScenarioRunner::new(scenario)?;
    Ok(runner.run(|_| {}))
}

/// Run a batch of scenarios.
pub fn run_batch(config: BatchConfig) -> std::io::Result<BatchResults> {
    let start = Instant::now();
    let files = scenario_files(&config.scenario_dir)?;
    info!(
        dir = %config.scenario_dir.display(),
        scenarios = files.len(),
        "starting batch"
    );

    let work = || -> Vec<(PathBuf, Result<RunSummary, ScenarioError>)> {
        files
            .par_iter()
            .map(|path| {
                debug!(path = %path.display(), "running scenario");
                (path.clone(), run_file(path, config.max_ticks))
            })
            .collect()
    };
    let results = if config.threads > 0 {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .build()
        {
            Ok(pool) => pool.install(work),
            Err(err) => {
                warn!(error = %err, "could not build thread pool, using the global one");
                work()
            }
        }
    } else {
        work()
    };

    let mut runs = Vec::new();
    let mut errors = Vec::new();
    for (path, result) in results {
        match result {
            Ok(summary) => runs.push(summary),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "scenario failed");
                errors.push(BatchError {
                    path,
                    message: err.to_string(),
                });
            }
        }
    }

    let duration_seconds = start.elapsed().as_secs_f64();
    info!(
        runs = runs.len(),
        errors = errors.len(),
        seconds = duration_seconds,
        "batch complete"
    );

    Ok(BatchResults {
        config,
        runs,
        errors,
        duration_seconds,
    })
}
