//! Grid cell coordinates and the grid distance metric.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// `sqrt(2) - 1`, the extra cost of a diagonal step in the octile metric.
const OCTILE_DIAGONAL: f64 = std::f64::consts::SQRT_2 - 1.0;

/// A cell on a map grid.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Pod,
    Zeroable,
)]
#[repr(C)]
pub struct Cell {
    /// Column
    pub x: i16,
    /// Row
    pub y: i16,
}

impl Cell {
    /// Creates a new cell.
    #[must_use]
    pub const fn new(x: i16, y: i16) -> Self {
        Self { x, y }
    }

    /// Returns this cell shifted by the given offsets (saturating at the i16 bounds).
    #[must_use]
    pub const fn offset(self, dx: i16, dy: i16) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }

    /// Absolute per-axis offsets to another cell.
    #[must_use]
    pub fn abs_delta(self, other: Self) -> (u32, u32) {
        (
            (i32::from(self.x) - i32::from(other.x)).unsigned_abs(),
            (i32::from(self.y) - i32::from(other.y)).unsigned_abs(),
        )
    }

    /// Octile distance to another cell, truncated to a whole number of cells.
    ///
    /// This is the metric used for every range check in the behavior engine
    /// (aggro radius, chase distance, attack range).
    #[must_use]
    pub fn distance_to(self, other: Self) -> u32 {
        let (dx, dy) = self.abs_delta(other);
        let (short, long) = if dx < dy { (dx, dy) } else { (dy, dx) };
        (OCTILE_DIAGONAL * f64::from(short) + f64::from(long)) as u32
    }

    /// Chebyshev (king-move) distance to another cell.
    ///
    /// Never larger than [`Cell::distance_to`], so it is safe as a cheap prefilter.
    #[must_use]
    pub fn chebyshev_to(self, other: Self) -> u32 {
        let (dx, dy) = self.abs_delta(other);
        dx.max(dy)
    }
}

impl From<(i16, i16)> for Cell {
    fn from((x, y): (i16, i16)) -> Self {
        Self::new(x, y)
    }
}
