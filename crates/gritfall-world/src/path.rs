//! A* pathfinding over the uniform tile grid.
//!
//! The planner sees three things: static solid obstacles (rock, gold-ore),
//! lava (traversable at a cost penalty, so paths prefer dry ground but
//! will cross when there is no alternative), and a snapshot of other
//! actors' tiles (blocked, so paths route around standing actors).
//!
//! Determinism: neighbors expand in a fixed order and the open set breaks
//! cost ties by insertion sequence, so the same inputs always produce the
//! same path.

use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::config::WorldConfig;
use crate::geom::{Rect, Vec2, TILE_SIZE};
use crate::obstacle::Obstacle;

/// Cost of stepping onto a normal tile, in planner units.
const STEP_COST: u32 = 10;
/// Cost of stepping onto a lava tile.
const LAVA_STEP_COST: u32 = 40;

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// Terrain classification for one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terrain {
    Open,
    Lava,
    Solid,
}

/// A planning grid built from the world's static obstacles.
#[derive(Debug)]
pub struct PathGrid {
    width: i32,
    height: i32,
    terrain: Vec<Terrain>,
}

impl PathGrid {
    /// Classify every tile against the obstacle set.
    pub fn build(config: &WorldConfig, obstacles: &[Obstacle]) -> Self {
        let width = config.width_tiles;
        let height = config.height_tiles;
        let mut terrain = vec![Terrain::Open; (width * height) as usize];

        for obstacle in obstacles {
            let min = Vec2::new(obstacle.rect.x, obstacle.rect.y).tile();
            // Right/bottom edges are exclusive; nudge inward so a rect that
            // exactly spans tiles does not bleed into the next row/column.
            let max = Vec2::new(obstacle.rect.right() - 1e-9, obstacle.rect.bottom() - 1e-9).tile();
            for ty in min.1.max(0)..=max.1.min(height - 1) {
                for tx in min.0.max(0)..=max.0.min(width - 1) {
                    let cell = &mut terrain[(ty * width + tx) as usize];
                    if obstacle.kind.solid() {
                        *cell = Terrain::Solid;
                    } else if *cell == Terrain::Open {
                        *cell = Terrain::Lava;
                    }
                }
            }
        }

        Self {
            width,
            height,
            terrain,
        }
    }

    fn in_bounds(&self, tile: (i32, i32)) -> bool {
        tile.0 >= 0 && tile.0 < self.width && tile.1 >= 0 && tile.1 < self.height
    }

    fn terrain_at(&self, tile: (i32, i32)) -> Terrain {
        self.terrain[(tile.1 * self.width + tile.0) as usize]
    }

    /// Center point of a tile in pixel space.
    pub fn tile_center(tile: (i32, i32)) -> Vec2 {
        Vec2::new(
            tile.0 as f64 * TILE_SIZE + TILE_SIZE / 2.0,
            tile.1 as f64 * TILE_SIZE + TILE_SIZE / 2.0,
        )
    }

    /// Pixel rect of a tile, for overlap tests.
    pub fn tile_rect(tile: (i32, i32)) -> Rect {
        Rect::new(
            tile.0 as f64 * TILE_SIZE,
            tile.1 as f64 * TILE_SIZE,
            TILE_SIZE,
            TILE_SIZE,
        )
    }
}

// ---------------------------------------------------------------------------
// A*
// ---------------------------------------------------------------------------

/// Open-set entry. Ordered so the heap pops the lowest f-cost first, with
/// insertion sequence as the deterministic tiebreaker.
#[derive(Debug, PartialEq, Eq)]
struct OpenEntry {
    f_cost: u32,
    sequence: u64,
    tile: (i32, i32),
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap is a max-heap; invert so the smallest f-cost wins.
        other
            .f_cost
            .cmp(&self.f_cost)
            .then(other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

fn heuristic(a: (i32, i32), b: (i32, i32)) -> u32 {
    ((a.0 - b.0).unsigned_abs() + (a.1 - b.1).unsigned_abs()) * STEP_COST
}

/// Plan a path from `from` to `to`.
///
/// Returns tile-center waypoints from the tile after `from` through the
/// goal tile, or `None` when the goal is unreachable, out of bounds, or
/// solid. `occupied` holds the tiles other actors currently stand on;
/// the start tile is always allowed (the actor is there).
pub fn find_path(
    grid: &PathGrid,
    occupied: &HashSet<(i32, i32)>,
    from: Vec2,
    to: Vec2,
) -> Option<Vec<Vec2>> {
    let start = from.tile();
    let goal = to.tile();

    if !grid.in_bounds(start) || !grid.in_bounds(goal) {
        return None;
    }
    if grid.terrain_at(goal) == Terrain::Solid {
        return None;
    }
    if start == goal {
        return Some(vec![to]);
    }

    let mut open = BinaryHeap::new();
    let mut g_cost: HashMap<(i32, i32), u32> = HashMap::new();
    let mut came_from: HashMap<(i32, i32), (i32, i32)> = HashMap::new();
    let mut sequence = 0u64;

    g_cost.insert(start, 0);
    open.push(OpenEntry {
        f_cost: heuristic(start, goal),
        sequence,
        tile: start,
    });

    while let Some(entry) = open.pop() {
        let current = entry.tile;
        if current == goal {
            return Some(reconstruct(&came_from, goal, to));
        }
        // Stale heap entry (a cheaper route was found since it was pushed).
        if entry.f_cost > g_cost[&current] + heuristic(current, goal) {
            continue;
        }

        // Fixed expansion order: up, down, left, right.
        for delta in [(0, -1), (0, 1), (-1, 0), (1, 0)] {
            let next = (current.0 + delta.0, current.1 + delta.1);
            if !grid.in_bounds(next) {
                continue;
            }
            let terrain = grid.terrain_at(next);
            if terrain == Terrain::Solid {
                continue;
            }
            if next != goal && occupied.contains(&next) {
                continue;
            }
            let step = if terrain == Terrain::Lava {
                LAVA_STEP_COST
            } else {
                STEP_COST
            };
            let tentative = g_cost[&current] + step;
            if g_cost.get(&next).map_or(true, |&g| tentative < g) {
                g_cost.insert(next, tentative);
                came_from.insert(next, current);
                sequence += 1;
                open.push(OpenEntry {
                    f_cost: tentative + heuristic(next, goal),
                    sequence,
                    tile: next,
                });
            }
        }
    }

    None
}

fn reconstruct(
    came_from: &HashMap<(i32, i32), (i32, i32)>,
    goal: (i32, i32),
    target: Vec2,
) -> Vec<Vec2> {
    let mut tiles = vec![goal];
    let mut current = goal;
    while let Some(&prev) = came_from.get(&current) {
        tiles.push(prev);
        current = prev;
    }
    tiles.pop(); // drop the start tile; the actor is already there
    tiles.reverse();

    let mut waypoints: Vec<Vec2> = tiles.iter().map(|&t| PathGrid::tile_center(t)).collect();
    // Land on the requested point rather than the goal tile's center.
    if let Some(last) = waypoints.last_mut() {
        *last = target;
    }
    waypoints
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
