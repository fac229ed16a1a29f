//! Uniform-bucket spatial index over unit positions.
//!
//! Radius queries visit only the buckets within `ceil(radius / cell_size)`
//! of the centre bucket and then filter by exact Manhattan distance.
//! Results come back as a `BTreeSet`, so the "first" hit is always the
//! lowest id.

use std::collections::{BTreeSet, HashMap};

use crate::components::UnitId;
use crate::math::GridPos;

type BucketKey = (i32, i32);

/// Default bucket edge length in grid cells.
pub const DEFAULT_CELL_SIZE: u32 = 4;

/// Spatial hash of unit ids keyed by grid position.
#[derive(Debug, Clone)]
pub struct SpatialHash {
    cell_size: i32,
    buckets: HashMap<BucketKey, BTreeSet<UnitId>>,
    positions: HashMap<UnitId, GridPos>,
}

impl Default for SpatialHash {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_SIZE)
    }
}

impl SpatialHash {
    /// Create an empty hash with the given bucket size (minimum 1).
    #[must_use]
    pub fn new(cell_size: u32) -> Self {
        Self {
            cell_size: cell_size.clamp(1, i32::MAX as u32) as i32,
            buckets: HashMap::new(),
            positions: HashMap::new(),
        }
    }

    #[inline]
    fn bucket_of(&self, pos: GridPos) -> BucketKey {
        (pos.x.div_euclid(self.cell_size), pos.y.div_euclid(self.cell_size))
    }

    /// Insert a unit. Re-adding an existing id moves it.
    pub fn add(&mut self, id: UnitId, pos: GridPos) {
        if self.positions.contains_key(&id) {
            self.update(id, pos);
            return;
        }
        let key = self.bucket_of(pos);
        self.buckets.entry(key).or_default().insert(id);
        self.positions.insert(id, pos);
    }

    /// Remove a unit. Returns `true` if it was indexed.
    pub fn remove(&mut self, id: UnitId) -> bool {
        let Some(pos) = self.positions.remove(&id) else {
            return false;
        };
        let key = self.bucket_of(pos);
        if let Some(bucket) = self.buckets.get_mut(&key) {
            bucket.remove(&id);
            if bucket.is_empty() {
                self.buckets.remove(&key);
            }
        }
        true
    }

    /// Move a unit, inserting it if it was not indexed.
    pub fn update(&mut self, id: UnitId, pos: GridPos) {
        match self.positions.get(&id).copied() {
            Some(old) if self.bucket_of(old) == self.bucket_of(pos) => {
                self.positions.insert(id, pos);
            }
            Some(_) => {
                self.remove(id);
                self.add(id, pos);
            }
            None => self.add(id, pos),
        }
    }

    /// All ids whose Manhattan distance to `center` is at most `radius`.
    #[must_use]
    pub fn query_radius(&self, center: GridPos, radius: u32) -> BTreeSet<UnitId> {
        let mut found = BTreeSet::new();
        let reach = radius.div_ceil(self.cell_size as u32) as i32;
        let (cx, cy) = self.bucket_of(center);

        for bx in (cx - reach)..=(cx + reach) {
            for by in (cy - reach)..=(cy + reach) {
                let Some(bucket) = self.buckets.get(&(bx, by)) else {
                    continue;
                };
                for &id in bucket {
                    let in_range = self
                        .positions
                        .get(&id)
                        .is_some_and(|&pos| pos.manhattan_distance(center) <= radius);
                    if in_range {
                        found.insert(id);
                    }
                }
            }
        }
        found
    }

    /// Indexed position of a unit.
    #[must_use]
    pub fn position_of(&self, id: UnitId) -> Option<GridPos> {
        self.positions.get(&id).copied()
    }

    /// Check whether a unit is indexed.
    #[must_use]
    pub fn contains(&self, id: UnitId) -> bool {
        self.positions.contains_key(&id)
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.buckets.clear();
        self.positions.clear();
    }

    /// Number of indexed units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Check if the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Number of non-empty buckets.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}
