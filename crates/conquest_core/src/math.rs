//! Fixed-point math and grid coordinates for deterministic simulation.
//!
//! All fractional quantities in the simulation (speed, elapsed time,
//! movement progress, damage multipliers) use fixed-point arithmetic so that
//! two rooms fed identical inputs stay bit-identical on any CPU.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
/// Range: approximately -2,147,483,648 to 2,147,483,647
/// Precision: approximately 0.00000000023
pub type Fixed = I32F32;

/// Convert a whole-number percentage into a fixed-point ratio (`150` -> `1.5`).
#[must_use]
pub fn percent(value: u32) -> Fixed {
    Fixed::from_num(value) / Fixed::from_num(100)
}

/// Convert milliseconds into fixed-point seconds.
#[must_use]
pub fn millis(value: u32) -> Fixed {
    Fixed::from_num(value) / Fixed::from_num(1000)
}

/// Integer cell coordinate on the square battlefield grid.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct GridPos {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl GridPos {
    /// Create a new grid coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Origin cell.
    pub const ZERO: Self = Self { x: 0, y: 0 };

    /// Manhattan (4-connected) distance between two cells.
    #[must_use]
    pub fn manhattan_distance(self, other: Self) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Check whether this cell lies inside a `size` x `size` map.
    #[must_use]
    pub fn in_bounds(self, size: u32) -> bool {
        let size = size as i64;
        let (x, y) = (self.x as i64, self.y as i64);
        x >= 0 && y >= 0 && x < size && y < size
    }

    /// Offset this cell by `(dx, dy)`.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Linearly interpolate towards `other`, flooring the result to a cell.
    ///
    /// `t` is expected in `[0, 1]`.
    #[must_use]
    pub fn lerp_floor(self, other: Self, t: Fixed) -> Self {
        let lerp = |a: i32, b: i32| -> i32 {
            let a_fixed = Fixed::from_num(a);
            let value = a_fixed + (Fixed::from_num(b) - a_fixed) * t;
            value.floor().to_num::<i32>()
        };
        Self {
            x: lerp(self.x, other.x),
            y: lerp(self.y, other.y),
        }
    }
}

impl std::fmt::Display for GridPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Serde support for `Option<Fixed>`.
///
/// Serializes optional fixed-point numbers via their raw bit representation,
/// preserving `None` as a serialized `None` value.
pub mod option_fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize an optional fixed-point number.
    pub fn serialize<S>(value: &Option<Fixed>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.map(Fixed::to_bits).serialize(serializer)
    }

    /// Deserialize an optional fixed-point number.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Fixed>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt = Option::<i64>::deserialize(deserializer)?;
        Ok(opt.map(Fixed::from_bits))
    }
}
