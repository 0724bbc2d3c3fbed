//! Spatial queries the behavior engine depends on.

use horde_common::Cell;

/// Distance metric, free-cell lookup, and route planning for one map.
///
/// Routes never include the starting cell and end at the destination. An
/// empty route means no route was found (or the endpoints coincide).
pub trait SpatialProvider: Send + Sync {
    /// Grid distance between two cells.
    fn distance(&self, a: Cell, b: Cell) -> u32 {
        a.distance_to(b)
    }

    /// A random walkable cell within `x_spread` columns and `y_spread` rows
    /// of `anchor`, reachable from it in a straight line. Never the anchor
    /// itself.
    fn find_free_cell(&self, anchor: Cell, x_spread: u8, y_spread: u8) -> Option<Cell>;

    /// Cell-by-cell straight line, empty if any cell on it is blocked.
    fn straight_route(&self, from: Cell, to: Cell) -> Vec<Cell>;

    /// Grid search around obstacles, empty if the destination is unreachable.
    fn search_route(&self, from: Cell, to: Cell) -> Vec<Cell>;

    /// Straight line if possible, otherwise a grid search.
    fn route(&self, from: Cell, to: Cell) -> Vec<Cell> {
        let straight = self.straight_route(from, to);
        if straight.is_empty() {
            self.search_route(from, to)
        } else {
            straight
        }
    }
}
