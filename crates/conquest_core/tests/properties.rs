//! Property-based tests for the battlefield engine.

use std::collections::{BTreeSet, HashSet};

use conquest_core::math::GridPos;
use conquest_core::pathfinding::{find_path, NavGrid};
use conquest_core::spatial::SpatialHash;
use conquest_test_utils::determinism::strategies::{command_sequence, grid_pos, unit_positions};
use conquest_test_utils::determinism::verify_determinism;
use conquest_test_utils::fixtures::Battlefield;
use proptest::prelude::*;

const MAP: i32 = 40;

proptest! {
    #[test]
    fn spatial_query_matches_brute_force(
        positions in unit_positions(MAP, 60),
        center in grid_pos(MAP),
        radius in 0u32..12,
        cell_size in 1u32..8,
    ) {
        let mut hash = SpatialHash::new(cell_size);
        for (id, pos) in positions.iter().enumerate() {
            hash.add(id as u64, *pos);
        }

        let expected: BTreeSet<u64> = positions
            .iter()
            .enumerate()
            .filter(|(_, pos)| pos.manhattan_distance(center) <= radius)
            .map(|(id, _)| id as u64)
            .collect();

        prop_assert_eq!(hash.query_radius(center, radius), expected);
    }

    #[test]
    fn spatial_query_survives_moves_and_removals(
        positions in unit_positions(MAP, 30),
        moves in proptest::collection::vec(grid_pos(MAP), 30),
        center in grid_pos(MAP),
        radius in 0u32..10,
    ) {
        let mut hash = SpatialHash::new(4);
        let mut truth: Vec<Option<GridPos>> = Vec::new();
        for (id, pos) in positions.iter().enumerate() {
            hash.add(id as u64, *pos);
            truth.push(Some(*pos));
        }
        for (id, slot) in truth.iter_mut().enumerate() {
            if id % 3 == 0 {
                hash.remove(id as u64);
                *slot = None;
            } else {
                hash.update(id as u64, moves[id]);
                *slot = Some(moves[id]);
            }
        }

        let expected: BTreeSet<u64> = truth
            .iter()
            .enumerate()
            .filter_map(|(id, pos)| pos.map(|p| (id, p)))
            .filter(|(_, pos)| pos.manhattan_distance(center) <= radius)
            .map(|(id, _)| id as u64)
            .collect();

        prop_assert_eq!(hash.query_radius(center, radius), expected);
    }

    #[test]
    fn open_grid_paths_are_shortest(start in grid_pos(MAP), goal in grid_pos(MAP)) {
        let grid = NavGrid::new(MAP as u32);
        let path = find_path(&grid, start, goal, &HashSet::new(), None).unwrap();

        prop_assert_eq!(path.len() as u32, start.manhattan_distance(goal) + 1);
        prop_assert_eq!(path.first().copied(), Some(start));
        prop_assert_eq!(path.last().copied(), Some(goal));
        for pair in path.windows(2) {
            prop_assert_eq!(pair[0].manhattan_distance(pair[1]), 1);
        }
    }

    #[test]
    fn enclosed_goal_has_no_path(
        start in grid_pos(MAP),
        goal in (1..MAP - 1, 1..MAP - 1).prop_map(|(x, y)| GridPos::new(x, y)),
    ) {
        let ring: HashSet<GridPos> = [(0, 1), (1, 0), (0, -1), (-1, 0)]
            .into_iter()
            .map(|(dx, dy)| goal.offset(dx, dy))
            .collect();
        prop_assume!(start != goal && !ring.contains(&start));

        let grid = NavGrid::new(MAP as u32);
        prop_assert!(find_path(&grid, start, goal, &ring, None).is_none());
    }

    #[test]
    fn identical_orders_give_identical_hashes(commands in command_sequence(MAP, 8, 16)) {
        let result = verify_determinism(
            2,
            60,
            || {
                let mut field = Battlefield::skirmish();
                for command in &commands {
                    field.sim.enqueue(command.clone());
                }
                field
            },
            |field| {
                field.step();
            },
            |field| field.sim.state_hash(),
        );
        prop_assert!(result.is_deterministic, "hashes: {:?}", result.hashes);
    }
}
