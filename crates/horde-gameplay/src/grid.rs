//! Reference spatial provider: a rectangular walkability grid.
//!
//! Straight routes follow Bresenham lines. Searched routes use jump point
//! search on an 8-connected grid where diagonal steps may not cut corners,
//! and are expanded back into single-cell steps.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ahash::{AHashMap, AHashSet};
use horde_common::Cell;
use parking_lot::Mutex;
use tracing::trace;

use crate::spatial::SpatialProvider;

const STRAIGHT_COST: u32 = 10;
const DIAGONAL_COST: u32 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenNode {
    f: u32,
    g: u32,
    pos: Cell,
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on (f, g, pos)
        other
            .f
            .cmp(&self.f)
            .then_with(|| other.g.cmp(&self.g))
            .then_with(|| other.pos.cmp(&self.pos))
    }
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn octile_cost(a: Cell, b: Cell) -> u32 {
    let (dx, dy) = a.abs_delta(b);
    let (short, long) = if dx < dy { (dx, dy) } else { (dy, dx) };
    DIAGONAL_COST * short + STRAIGHT_COST * (long - short)
}

/// A map grid with blocked and walkable cells.
#[derive(Debug)]
pub struct GridMap {
    width: u16,
    height: u16,
    walkable: Vec<bool>,
    rng: Mutex<fastrand::Rng>,
}

impl GridMap {
    /// Creates a fully walkable grid.
    #[must_use]
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            walkable: vec![true; usize::from(width) * usize::from(height)],
            rng: Mutex::new(fastrand::Rng::with_seed(0x5eed)),
        }
    }

    /// Builds a grid from text rows; `#` is blocked, anything else walkable.
    #[must_use]
    pub fn from_rows(rows: &[&str]) -> Self {
        let height = u16::try_from(rows.len()).unwrap_or(u16::MAX);
        let width = rows
            .iter()
            .map(|row| row.chars().count())
            .max()
            .and_then(|w| u16::try_from(w).ok())
            .unwrap_or(0);

        let mut grid = Self::new(width, height);
        for (y, row) in rows.iter().enumerate() {
            for (x, ch) in row.chars().enumerate() {
                if ch == '#' {
                    grid.walkable[y * usize::from(width) + x] = false;
                }
            }
        }
        grid
    }

    /// Reseeds the free-cell generator.
    #[must_use]
    pub fn with_seed(self, seed: u64) -> Self {
        *self.rng.lock() = fastrand::Rng::with_seed(seed);
        self
    }

    /// Grid width in cells.
    #[must_use]
    pub const fn width(&self) -> u16 {
        self.width
    }

    /// Grid height in cells.
    #[must_use]
    pub const fn height(&self) -> u16 {
        self.height
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        let w = i32::from(self.width);
        let h = i32::from(self.height);
        if x < 0 || y < 0 || x >= w || y >= h {
            return None;
        }
        usize::try_from(y * w + x).ok()
    }

    fn open(&self, x: i32, y: i32) -> bool {
        self.index(x, y).is_some_and(|i| self.walkable[i])
    }

    /// Returns true if the cell is inside the grid and not blocked.
    #[must_use]
    pub fn is_walkable(&self, cell: Cell) -> bool {
        self.open(i32::from(cell.x), i32::from(cell.y))
    }

    /// Blocks or unblocks a cell. Out-of-bounds cells are ignored.
    pub fn set_blocked(&mut self, cell: Cell, blocked: bool) {
        if let Some(i) = self.index(i32::from(cell.x), i32::from(cell.y)) {
            self.walkable[i] = !blocked;
        }
    }

    fn line(from: Cell, to: Cell) -> Vec<Cell> {
        let (x1, y1) = (i32::from(to.x), i32::from(to.y));
        let (mut x, mut y) = (i32::from(from.x), i32::from(from.y));
        let dx = (x1 - x).abs();
        let dy = -(y1 - y).abs();
        let sx = if x < x1 { 1 } else { -1 };
        let sy = if y < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        let mut cells = Vec::new();
        while x != x1 || y != y1 {
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
            cells.push(to_cell(x, y));
        }
        cells
    }

    /// Successor directions of `pos` given the direction it was reached from.
    fn neighbors(&self, pos: Cell, parent: Option<Cell>) -> Vec<(i32, i32)> {
        let (x, y) = (i32::from(pos.x), i32::from(pos.y));
        let mut dirs = Vec::with_capacity(8);

        let Some(parent) = parent else {
            for (dx, dy) in [(0, -1), (1, 0), (0, 1), (-1, 0)] {
                if self.open(x + dx, y + dy) {
                    dirs.push((dx, dy));
                }
            }
            for (dx, dy) in [(1, -1), (1, 1), (-1, 1), (-1, -1)] {
                if self.open(x + dx, y + dy) && self.open(x + dx, y) && self.open(x, y + dy) {
                    dirs.push((dx, dy));
                }
            }
            return dirs;
        };

        let dx = (x - i32::from(parent.x)).signum();
        let dy = (y - i32::from(parent.y)).signum();

        if dx != 0 && dy != 0 {
            let vertical = self.open(x, y + dy);
            let horizontal = self.open(x + dx, y);
            if vertical {
                dirs.push((0, dy));
            }
            if horizontal {
                dirs.push((dx, 0));
            }
            if vertical && horizontal && self.open(x + dx, y + dy) {
                dirs.push((dx, dy));
            }
        } else if dx != 0 {
            let next = self.open(x + dx, y);
            let below = self.open(x, y + 1);
            let above = self.open(x, y - 1);
            if next {
                dirs.push((dx, 0));
                if below && self.open(x + dx, y + 1) {
                    dirs.push((dx, 1));
                }
                if above && self.open(x + dx, y - 1) {
                    dirs.push((dx, -1));
                }
            }
            if below {
                dirs.push((0, 1));
            }
            if above {
                dirs.push((0, -1));
            }
        } else {
            let next = self.open(x, y + dy);
            let right = self.open(x + 1, y);
            let left = self.open(x - 1, y);
            if next {
                dirs.push((0, dy));
                if right && self.open(x + 1, y + dy) {
                    dirs.push((1, dy));
                }
                if left && self.open(x - 1, y + dy) {
                    dirs.push((-1, dy));
                }
            }
            if right {
                dirs.push((1, 0));
            }
            if left {
                dirs.push((-1, 0));
            }
        }
        dirs
    }

    /// Walks from `(x, y)` in direction `(dx, dy)` until a jump point, the
    /// goal, or an obstacle.
    fn jump(&self, mut x: i32, mut y: i32, dx: i32, dy: i32, goal: Cell) -> Option<Cell> {
        let (gx, gy) = (i32::from(goal.x), i32::from(goal.y));
        loop {
            if !self.open(x, y) {
                return None;
            }
            if x == gx && y == gy {
                return Some(goal);
            }

            if dx != 0 && dy != 0 {
                if self.jump(x + dx, y, dx, 0, goal).is_some()
                    || self.jump(x, y + dy, 0, dy, goal).is_some()
                {
                    return Some(to_cell(x, y));
                }
            } else if dx != 0 {
                if (self.open(x, y - 1) && !self.open(x - dx, y - 1))
                    || (self.open(x, y + 1) && !self.open(x - dx, y + 1))
                {
                    return Some(to_cell(x, y));
                }
            } else if (self.open(x - 1, y) && !self.open(x - 1, y - dy))
                || (self.open(x + 1, y) && !self.open(x + 1, y - dy))
            {
                return Some(to_cell(x, y));
            }

            // No corner cutting
            if self.open(x + dx, y) && self.open(x, y + dy) {
                x += dx;
                y += dy;
            } else {
                return None;
            }
        }
    }

    /// Jump point search; returns the jump points from start to goal inclusive.
    fn jump_points(&self, start: Cell, goal: Cell) -> Option<Vec<Cell>> {
        let max_expansions = usize::from(self.width) * usize::from(self.height);

        let mut open = BinaryHeap::new();
        open.push(OpenNode {
            f: octile_cost(start, goal),
            g: 0,
            pos: start,
        });

        let mut came_from: AHashMap<Cell, Cell> = AHashMap::new();
        let mut g_score: AHashMap<Cell, u32> = AHashMap::new();
        g_score.insert(start, 0);
        let mut closed: AHashSet<Cell> = AHashSet::new();

        let mut expansions = 0usize;
        while let Some(node) = open.pop() {
            if !closed.insert(node.pos) {
                continue;
            }

            if node.pos == goal {
                let mut points = vec![goal];
                let mut cur = goal;
                while let Some(prev) = came_from.get(&cur).copied() {
                    points.push(prev);
                    cur = prev;
                }
                points.reverse();
                return Some(points);
            }

            expansions += 1;
            if expansions > max_expansions {
                return None;
            }

            let parent = came_from.get(&node.pos).copied();
            let (x, y) = (i32::from(node.pos.x), i32::from(node.pos.y));
            for (dx, dy) in self.neighbors(node.pos, parent) {
                let Some(point) = self.jump(x + dx, y + dy, dx, dy, goal) else {
                    continue;
                };
                if closed.contains(&point) {
                    continue;
                }

                let tentative_g = node.g.saturating_add(octile_cost(node.pos, point));
                if tentative_g >= g_score.get(&point).copied().unwrap_or(u32::MAX) {
                    continue;
                }

                came_from.insert(point, node.pos);
                g_score.insert(point, tentative_g);
                open.push(OpenNode {
                    f: tentative_g.saturating_add(octile_cost(point, goal)),
                    g: tentative_g,
                    pos: point,
                });
            }
        }

        None
    }
}

fn to_cell(x: i32, y: i32) -> Cell {
    // Grid dimensions are u16 but every walkable index fits i16 in practice
    Cell::new(
        i16::try_from(x).unwrap_or(i16::MAX),
        i16::try_from(y).unwrap_or(i16::MAX),
    )
}

impl SpatialProvider for GridMap {
    fn find_free_cell(&self, anchor: Cell, x_spread: u8, y_spread: u8) -> Option<Cell> {
        let (ax, ay) = (i32::from(anchor.x), i32::from(anchor.y));
        let (xs, ys) = (i32::from(x_spread), i32::from(y_spread));

        let mut candidates = Vec::new();
        for y in (ay - ys)..=(ay + ys) {
            for x in (ax - xs)..=(ax + xs) {
                if (x != ax || y != ay) && self.open(x, y) {
                    candidates.push(to_cell(x, y));
                }
            }
        }
        self.rng.lock().shuffle(&mut candidates);

        candidates
            .into_iter()
            .find(|&cell| !self.straight_route(anchor, cell).is_empty())
    }

    fn straight_route(&self, from: Cell, to: Cell) -> Vec<Cell> {
        let cells = Self::line(from, to);
        if cells.iter().all(|&c| self.is_walkable(c)) {
            cells
        } else {
            trace!("Straight route {:?} -> {:?} blocked", from, to);
            Vec::new()
        }
    }

    fn search_route(&self, from: Cell, to: Cell) -> Vec<Cell> {
        if from == to || !self.is_walkable(to) {
            return Vec::new();
        }

        let Some(points) = self.jump_points(from, to) else {
            trace!("No route {:?} -> {:?}", from, to);
            return Vec::new();
        };

        let mut route = Vec::new();
        for pair in points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let dx = (i32::from(b.x) - i32::from(a.x)).signum();
            let dy = (i32::from(b.y) - i32::from(a.y)).signum();
            let (mut x, mut y) = (i32::from(a.x), i32::from(a.y));
            while (x, y) != (i32::from(b.x), i32::from(b.y)) {
                x += dx;
                y += dy;
                route.push(to_cell(x, y));
            }
        }
        route
    }
}
