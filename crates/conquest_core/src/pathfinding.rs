//! Grid-based pathfinding using A* algorithm.
//!
//! Search runs over the 4-connected square map. Entering a cell costs its
//! terrain weight (1 for open ground, more for marsh); blocked cells are
//! passed in per query since they are usually other units. All costs use
//! fixed-point math so identical queries return identical paths.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::math::{fixed_serde, Fixed, GridPos};
use crate::tiles::Tile;

/// Terrain weights for the square map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavGrid {
    /// Side length in cells.
    size: u32,
    /// Cost of entering each cell, row-major.
    weights: Vec<WeightCell>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct WeightCell(#[serde(with = "fixed_serde")] Fixed);

impl NavGrid {
    /// Create a `size` x `size` grid with uniform weight 1.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    #[must_use]
    pub fn new(size: u32) -> Self {
        assert!(size > 0, "NavGrid size must be positive");
        let cell_count = (size as usize) * (size as usize);
        Self {
            size,
            weights: vec![WeightCell(Fixed::ONE); cell_count],
        }
    }

    /// Side length in cells.
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }

    #[inline]
    fn index(&self, pos: GridPos) -> Option<usize> {
        pos.in_bounds(self.size)
            .then(|| (pos.y as usize) * (self.size as usize) + (pos.x as usize))
    }

    /// Check if a cell lies on the map.
    #[must_use]
    pub fn in_bounds(&self, pos: GridPos) -> bool {
        pos.in_bounds(self.size)
    }

    /// Cost of entering `pos`. Returns `None` if out of bounds.
    #[must_use]
    pub fn terrain_weight(&self, pos: GridPos) -> Option<Fixed> {
        self.index(pos).map(|i| self.weights[i].0)
    }

    /// Set the cost of entering `pos`.
    ///
    /// Weights below 1 would make the Manhattan heuristic overestimate, so
    /// they are raised to 1. Returns `false` if out of bounds.
    pub fn set_terrain_weight(&mut self, pos: GridPos, weight: Fixed) -> bool {
        let Some(index) = self.index(pos) else {
            return false;
        };
        let weight = if weight < Fixed::ONE {
            warn!(%pos, weight = %weight, "terrain weight below 1 clamped");
            Fixed::ONE
        } else {
            weight
        };
        self.weights[index] = WeightCell(weight);
        true
    }

    /// Reset every cell to weight 1, then apply tile terrain costs.
    pub fn apply_tile_terrain(&mut self, tiles: &[Tile], marsh_weight: Fixed) {
        self.weights.fill(WeightCell(Fixed::ONE));
        for tile in tiles {
            let weight = tile.kind.terrain_weight(marsh_weight);
            if weight != Fixed::ONE {
                self.set_terrain_weight(tile.position, weight);
            }
        }
    }
}

/// A node in the A* open set priority queue.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct AStarNode {
    pos: GridPos,
    /// f = g + h
    f_score: Fixed,
    /// Insertion counter. Equal f-scores pop in insertion order.
    sequence: u64,
}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap, so we reverse the comparison for min-heap behavior.
        match other.f_score.cmp(&self.f_score) {
            Ordering::Equal => other.sequence.cmp(&self.sequence),
            ord => ord,
        }
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Neighbour expansion order: +y, +x, -y, -x.
const DIRECTIONS: [(i32, i32); 4] = [(0, 1), (1, 0), (0, -1), (-1, 0)];

#[inline]
fn manhattan_heuristic(a: GridPos, b: GridPos) -> Fixed {
    Fixed::from_num(a.manhattan_distance(b))
}

/// Find a path from `start` to `goal`.
///
/// Returns the cells from start to goal inclusive, or `None` when either end
/// is off the map, the goal is blocked or outside `valid_mask`, or the goal
/// is unreachable. `start == goal` yields the single-cell path.
///
/// The start cell is never treated as blocked. When `valid_mask` is given,
/// every step after the start must land inside it.
#[must_use]
pub fn find_path(
    grid: &NavGrid,
    start: GridPos,
    goal: GridPos,
    blocked: &HashSet<GridPos>,
    valid_mask: Option<&HashSet<GridPos>>,
) -> Option<Vec<GridPos>> {
    if !grid.in_bounds(start) || !grid.in_bounds(goal) {
        return None;
    }
    if start == goal {
        return Some(vec![start]);
    }
    if blocked.contains(&goal) {
        return None;
    }
    if valid_mask.is_some_and(|mask| !mask.contains(&goal)) {
        return None;
    }

    let mut open_set: BinaryHeap<AStarNode> = BinaryHeap::new();
    let mut closed: HashSet<GridPos> = HashSet::new();
    let mut came_from: HashMap<GridPos, GridPos> = HashMap::new();
    let mut g_score: HashMap<GridPos, Fixed> = HashMap::new();
    let mut sequence = 0_u64;

    g_score.insert(start, Fixed::ZERO);
    open_set.push(AStarNode {
        pos: start,
        f_score: manhattan_heuristic(start, goal),
        sequence,
    });

    while let Some(current) = open_set.pop() {
        if current.pos == goal {
            return Some(reconstruct_path(&came_from, goal));
        }
        if !closed.insert(current.pos) {
            continue;
        }

        let current_g = g_score.get(&current.pos).copied().unwrap_or(Fixed::MAX);

        for &(dx, dy) in &DIRECTIONS {
            let next = current.pos.offset(dx, dy);

            if closed.contains(&next) || blocked.contains(&next) {
                continue;
            }
            if valid_mask.is_some_and(|mask| !mask.contains(&next)) {
                continue;
            }
            let Some(weight) = grid.terrain_weight(next) else {
                continue;
            };

            let tentative_g = current_g + weight;
            let known_g = g_score.get(&next).copied().unwrap_or(Fixed::MAX);

            if tentative_g < known_g {
                came_from.insert(next, current.pos);
                g_score.insert(next, tentative_g);
                sequence += 1;
                open_set.push(AStarNode {
                    pos: next,
                    f_score: tentative_g + manhattan_heuristic(next, goal),
                    sequence,
                });
            }
        }
    }

    None
}

/// Reconstruct path from came_from map.
fn reconstruct_path(came_from: &HashMap<GridPos, GridPos>, goal: GridPos) -> Vec<GridPos> {
    let mut path = vec![goal];
    let mut current = goal;

    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }

    path.reverse();
    path
}

/// Total cost of walking `path`, excluding the start cell.
///
/// Returns `None` if any cell is off the map.
#[must_use]
pub fn path_cost(grid: &NavGrid, path: &[GridPos]) -> Option<Fixed> {
    path.iter()
        .skip(1)
        .try_fold(Fixed::ZERO, |acc, &pos| Some(acc + grid.terrain_weight(pos)?))
}
