//! Determinism harness.
//!
//! Runs the same battlefield several times and compares state hashes, so a
//! desync between rooms shows up as a differing hash.
//!
//! Things that would break replay:
//!
//! - **Float drift**: all fractional quantities are
//!   [`conquest_core::math::Fixed`].
//! - **Hash map order**: units are walked in ascending id order.
//! - **Shared counters**: unit ids are minted per simulation, never globally.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use tracing::debug;

use crate::fixtures::Battlefield;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial simulation state
/// * `step` - Function to advance simulation by one tick
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```ignore
/// use conquest_test_utils::determinism::verify_determinism;
/// use conquest_test_utils::fixtures::Battlefield;
///
/// let result = verify_determinism(
///     5,   // Run 5 times
///     100, // 100 ticks each
///     Battlefield::skirmish,
///     |field| { field.step(); },
///     |field| field.sim.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    debug!(runs, ticks, is_deterministic, "determinism check finished");

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run a battlefield twice from the same setup and compare final hashes.
pub fn verify_battlefield_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Battlefield,
{
    verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |field| {
            field.step();
        },
        |field| field.sim.state_hash(),
    )
    .is_deterministic
}

/// Run N battlefields on scoped threads and collect final hashes.
///
/// Catches non-determinism that only shows up under thread scheduling or
/// memory layout differences.
///
/// # Panics
///
/// Panics if a worker thread panics.
pub fn run_parallel_battlefields<F>(setup_fn: F, num_sims: usize, num_ticks: u64) -> DeterminismResult
where
    F: Fn() -> Battlefield + Sync,
{
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut field = setup_fn();
                    for _ in 0..num_ticks {
                        field.step();
                    }
                    field.sim.state_hash()
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        ticks: num_ticks,
    }
}

/// Compare two battlefield runs tick-by-tick, finding first divergence.
///
/// # Returns
///
/// `None` if the runs agree throughout, `Some(tick)` at the first tick
/// whose hashes differ.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> Battlefield,
{
    let mut a = setup_fn();
    let mut b = setup_fn();

    if a.sim.state_hash() != b.sim.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        let events_a = a.step();
        let events_b = b.step();

        if events_a != events_b || a.sim.state_hash() != b.sim.state_hash() {
            debug!(tick, "battlefields diverged");
            return Some(tick);
        }
    }

    None
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for battlefield testing.
///
/// These strategies generate random but reproducible inputs for
/// property-based testing.
pub mod strategies {
    use conquest_core::components::UnitKind;
    use conquest_core::math::GridPos;
    use conquest_core::simulation::Command;
    use proptest::prelude::*;

    /// A cell on a `size` x `size` map.
    pub fn grid_pos(size: i32) -> impl Strategy<Value = GridPos> {
        (0..size, 0..size).prop_map(|(x, y)| GridPos::new(x, y))
    }

    /// Up to `max` unit positions, possibly overlapping.
    pub fn unit_positions(size: i32, max: usize) -> impl Strategy<Value = Vec<GridPos>> {
        proptest::collection::vec(grid_pos(size), 0..max)
    }

    /// Any unit class.
    pub fn unit_kind() -> impl Strategy<Value = UnitKind> {
        prop_oneof![
            Just(UnitKind::Infantry),
            Just(UnitKind::Archer),
            Just(UnitKind::Knight),
            Just(UnitKind::Siege),
        ]
    }

    /// A move or stop order for one of the first `max_unit` units.
    pub fn movement_command(size: i32, max_unit: u64) -> impl Strategy<Value = Command> {
        prop_oneof![
            (1..=max_unit, grid_pos(size)).prop_map(|(unit_id, target)| Command::Move {
                unit_id,
                target,
                valid_mask: None,
            }),
            (1..=max_unit).prop_map(|unit_id| Command::Stop { unit_id }),
        ]
    }

    /// A sequence of movement commands.
    pub fn command_sequence(
        size: i32,
        max_unit: u64,
        max_len: usize,
    ) -> impl Strategy<Value = Vec<Command>> {
        proptest::collection::vec(movement_command(size, max_unit), 0..max_len)
    }

    /// Health values (1-1000).
    pub fn health() -> impl Strategy<Value = u32> {
        1u32..1000u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::pos;
    use conquest_core::components::UnitKind;
    use conquest_core::simulation::Command;
    use proptest::prelude::*;

    fn marching_skirmish() -> Battlefield {
        let mut field = Battlefield::skirmish();
        // Send player 1's army south into player 2's line.
        for id in [1, 3, 5, 7] {
            if let Some(unit) = field.sim.get_unit(id) {
                let target = pos(unit.position.x, 21);
                field.sim.enqueue(Command::Move {
                    unit_id: id,
                    target,
                    valid_mask: None,
                });
            }
        }
        field
    }

    #[test]
    fn test_verify_determinism_basic() {
        let result = verify_determinism(
            3,
            50,
            marching_skirmish,
            |field| {
                field.step();
            },
            |field| field.sim.state_hash(),
        );
        result.assert_deterministic();
        assert_eq!(result.unique_hashes().len(), 1);
    }

    #[test]
    fn test_battlefield_determinism() {
        assert!(verify_battlefield_determinism(marching_skirmish, 200));
    }

    #[test]
    fn test_parallel_battlefields_agree() {
        run_parallel_battlefields(marching_skirmish, 4, 100).assert_deterministic();
    }

    #[test]
    fn test_no_divergence() {
        assert_eq!(find_first_divergence(marching_skirmish, 150), None);
    }

    #[test]
    fn test_divergence_detected() {
        let result = verify_determinism(
            2,
            1,
            || vec![1_u64],
            |v| v.push(v.len() as u64),
            compute_hash,
        );
        assert!(result.is_deterministic);

        let counter = std::sync::atomic::AtomicU64::new(0);
        let result = verify_determinism(
            2,
            1,
            || counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst),
            |_| {},
            |v| *v,
        );
        assert!(!result.is_deterministic);
    }

    proptest! {
        #[test]
        fn prop_random_orders_are_deterministic(
            commands in strategies::command_sequence(40, 8, 20),
        ) {
            let setup = || {
                let mut field = Battlefield::skirmish();
                for command in &commands {
                    field.sim.enqueue(command.clone());
                }
                field
            };
            prop_assert!(verify_battlefield_determinism(setup, 40));
        }

        #[test]
        fn prop_spawn_positions_are_deterministic(
            positions in strategies::unit_positions(40, 12),
            kind in strategies::unit_kind(),
        ) {
            let setup = || {
                let mut field = Battlefield::two_player();
                for (i, p) in positions.iter().enumerate() {
                    field.sim.spawn_unit(kind, (i % 2) as u32 + 1, *p);
                }
                field
            };
            prop_assert_eq!(find_first_divergence(setup, 30), None);
        }
    }

    #[test]
    fn test_unit_kind_strategy_covers_all() {
        assert_eq!(UnitKind::ALL.len(), 4);
    }
}
