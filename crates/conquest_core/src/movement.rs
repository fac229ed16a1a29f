//! Continuous movement along grid paths.
//!
//! A unit's progress is measured in segments traversed. Each update adds
//! `speed * dt`; crossing 1.0 advances to the next segment and carries the
//! remainder, so a fast unit or a long tick may cross several segments at
//! once. Positions are interpolated between waypoints and floored to cells.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::components::UnitId;
use crate::math::{fixed_serde, Fixed, GridPos};

/// Active path for one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ActivePath {
    waypoints: Vec<GridPos>,
    /// Index of the waypoint the current segment starts at.
    segment: usize,
    /// Progress through the current segment, in `[0, 1)`.
    #[serde(with = "fixed_serde")]
    progress: Fixed,
}

impl ActivePath {
    fn segment_count(&self) -> usize {
        self.waypoints.len() - 1
    }
}

/// Result of advancing one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveStep {
    /// Cell the unit now occupies.
    pub position: GridPos,
    /// True exactly once, on the update that reaches the last waypoint.
    pub arrived: bool,
}

/// Tracks every unit's active path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MovementSystem {
    paths: HashMap<UnitId, ActivePath>,
}

impl MovementSystem {
    /// Create an empty movement system.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a path for a unit, replacing any previous one.
    ///
    /// Paths shorter than two waypoints need no movement: any existing path
    /// is cleared and `false` is returned.
    pub fn set_path(&mut self, unit_id: UnitId, path: Vec<GridPos>) -> bool {
        if path.len() < 2 {
            self.paths.remove(&unit_id);
            return false;
        }
        self.paths.insert(
            unit_id,
            ActivePath {
                waypoints: path,
                segment: 0,
                progress: Fixed::ZERO,
            },
        );
        true
    }

    /// Advance a unit by `speed * dt` segments.
    ///
    /// Returns `None` if the unit has no active path. On arrival the path is
    /// removed and the final waypoint is returned with `arrived` set.
    pub fn update(&mut self, unit_id: UnitId, speed: Fixed, dt: Fixed) -> Option<MoveStep> {
        let path = self.paths.get_mut(&unit_id)?;

        path.progress += speed * dt;
        while path.progress >= Fixed::ONE && path.segment < path.segment_count() {
            path.progress -= Fixed::ONE;
            path.segment += 1;
        }

        if path.segment >= path.segment_count() {
            let position = *path.waypoints.last()?;
            self.paths.remove(&unit_id);
            return Some(MoveStep {
                position,
                arrived: true,
            });
        }

        let from = path.waypoints[path.segment];
        let to = path.waypoints[path.segment + 1];
        Some(MoveStep {
            position: from.lerp_floor(to, path.progress),
            arrived: false,
        })
    }

    /// Check whether a unit is following a path.
    #[must_use]
    pub fn has_path(&self, unit_id: UnitId) -> bool {
        self.paths.contains_key(&unit_id)
    }

    /// Fraction of the whole path completed, in `[0, 1]`.
    ///
    /// Units without an active path report 1.
    #[must_use]
    pub fn progress(&self, unit_id: UnitId) -> Fixed {
        self.paths.get(&unit_id).map_or(Fixed::ONE, |path| {
            let done = Fixed::from_num(path.segment) + path.progress;
            (done / Fixed::from_num(path.segment_count())).min(Fixed::ONE)
        })
    }

    /// Last waypoint of a unit's active path.
    #[must_use]
    pub fn destination(&self, unit_id: UnitId) -> Option<GridPos> {
        self.paths.get(&unit_id).and_then(|p| p.waypoints.last().copied())
    }

    /// Cancel a unit's movement. Returns `true` if a path was removed.
    pub fn clear_path(&mut self, unit_id: UnitId) -> bool {
        self.paths.remove(&unit_id).is_some()
    }

    /// Number of units currently moving.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.paths.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn straight_path(len: i32) -> Vec<GridPos> {
        (0..len).map(|x| GridPos::new(x, 0)).collect()
    }

    #[test]
    fn test_short_path_rejected() {
        let mut movement = MovementSystem::new();
        assert!(!movement.set_path(1, vec![GridPos::ZERO]));
        assert!(!movement.has_path(1));

        assert!(movement.set_path(1, straight_path(3)));
        assert!(!movement.set_path(1, vec![]));
        assert!(!movement.has_path(1));
    }

    #[test]
    fn test_progress_halfway_through_first_segment() {
        let mut movement = MovementSystem::new();
        movement.set_path(1, straight_path(3));

        let step = movement.update(1, Fixed::ONE, Fixed::from_num(0.5)).unwrap();

        assert_eq!(step.position, GridPos::new(0, 0));
        assert!(!step.arrived);
        assert_eq!(movement.progress(1), Fixed::from_num(0.25));
    }

    #[test]
    fn test_crosses_multiple_segments_in_one_update() {
        let mut movement = MovementSystem::new();
        movement.set_path(1, straight_path(6));

        let step = movement.update(1, Fixed::from_num(2), Fixed::from_num(1.5)).unwrap();

        assert_eq!(step.position, GridPos::new(3, 0));
        assert!(movement.has_path(1));
    }

    #[test]
    fn test_arrival_reported_once() {
        let mut movement = MovementSystem::new();
        movement.set_path(1, straight_path(3));

        let mut arrivals = 0;
        let dt = Fixed::ONE / Fixed::from_num(10);
        for _ in 0..25 {
            if let Some(step) = movement.update(1, Fixed::ONE, dt) {
                if step.arrived {
                    arrivals += 1;
                    assert_eq!(step.position, GridPos::new(2, 0));
                }
            }
        }

        assert_eq!(arrivals, 1);
        assert!(!movement.has_path(1));
        assert_eq!(movement.progress(1), Fixed::ONE);
        assert!(movement.update(1, Fixed::ONE, dt).is_none());
    }

    #[test]
    fn test_clear_path_stops_movement() {
        let mut movement = MovementSystem::new();
        movement.set_path(7, straight_path(4));
        assert_eq!(movement.destination(7), Some(GridPos::new(3, 0)));

        assert!(movement.clear_path(7));
        assert!(!movement.clear_path(7));
        assert!(movement.destination(7).is_none());
        assert_eq!(movement.active_count(), 0);
    }
}
