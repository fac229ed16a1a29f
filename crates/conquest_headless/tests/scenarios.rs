//! Runs the scenario files shipped in the repository.

use std::path::PathBuf;

use conquest_headless::batch::{run_batch, scenario_files, BatchConfig};
use conquest_headless::{verify_scenario, Scenario, ScenarioRunner};

fn scenario_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../scenarios")
}

#[test]
fn shipped_scenarios_parse_and_build() {
    let files = scenario_files(&scenario_dir()).unwrap();
    assert!(files.len() >= 3, "expected bundled scenarios, found {files:?}");

    for path in files {
        let scenario = Scenario::load(&path).unwrap_or_else(|e| panic!("{}: {e}", path.display()));
        let battle = scenario.build().unwrap();
        assert_eq!(battle.sim.units().len() as u64, scenario.unit_count());
    }
}

#[test]
fn siege_scenario_ends_in_victory() {
    let scenario = Scenario::load(scenario_dir().join("siege.ron")).unwrap();
    let summary = ScenarioRunner::new(scenario).unwrap().run(|_| {});

    assert!(summary.game_over);
    assert_eq!(summary.winner, Some(1));
    assert!(summary.players[1].is_eliminated);
    assert!(summary.metrics.players[&1].structure_damage >= 600);
}

#[test]
fn raid_scenario_moves_resources() {
    let scenario = Scenario::load(scenario_dir().join("raid.ron")).unwrap();
    let summary = ScenarioRunner::new(scenario).unwrap().run(|_| {});

    let raiders = &summary.metrics.players[&1];
    assert!(raiders.raids >= 1);
    assert_eq!(summary.metrics.players[&2].resources_lost, raiders.resources_raided);
    assert!(summary.players[0].resources.gold > 100);
    assert!(summary.players[1].resources.gold < 2000);
}

#[test]
fn shipped_scenarios_are_deterministic() {
    for path in scenario_files(&scenario_dir()).unwrap() {
        let mut scenario = Scenario::load(&path).unwrap();
        scenario.max_ticks = scenario.max_ticks.min(400);
        let report = verify_scenario(&scenario, 3).unwrap();
        assert!(report.deterministic, "{} diverged: {:?}", path.display(), report.hashes);
    }
}

#[test]
fn batch_over_shipped_scenarios() {
    let results = run_batch(BatchConfig::new(scenario_dir()).with_max_ticks(100)).unwrap();
    assert!(results.errors.is_empty(), "{:?}", results.errors);
    assert!(results.runs.iter().all(|r| r.ticks <= 100));
}
