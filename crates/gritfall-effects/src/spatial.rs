//! Coarse spatial index over live effect instances.
//!
//! Instances are bucketed into square grid cells by their bounding rect.
//! The index answers "which instances might overlap this rect" queries
//! without scanning the whole table; callers still confirm the overlap
//! against the instance's actual geometry.

use std::collections::{BTreeSet, HashMap};

use gritfall_world::geom::Rect;

/// Default cell edge, pixels (two tiles).
pub const DEFAULT_CELL_SIZE: f64 = 80.0;

#[derive(Debug)]
pub struct SpatialIndex {
    cell_size: f64,
    cells: HashMap<(i32, i32), BTreeSet<u64>>,
    placements: HashMap<u64, Vec<(i32, i32)>>,
}

impl SpatialIndex {
    pub fn new(cell_size: f64) -> Self {
        assert!(cell_size > 0.0, "cell size must be positive");
        Self {
            cell_size,
            cells: HashMap::new(),
            placements: HashMap::new(),
        }
    }

    fn cells_for(&self, rect: &Rect) -> Vec<(i32, i32)> {
        let min_x = (rect.x / self.cell_size).floor() as i32;
        let min_y = (rect.y / self.cell_size).floor() as i32;
        let max_x = (rect.right() / self.cell_size).floor() as i32;
        let max_y = (rect.bottom() / self.cell_size).floor() as i32;
        let mut out = Vec::new();
        for cy in min_y..=max_y {
            for cx in min_x..=max_x {
                out.push((cx, cy));
            }
        }
        out
    }

    /// Insert or move an instance to cover `rect`.
    pub fn place(&mut self, id: u64, rect: &Rect) {
        self.remove(id);
        let cells = self.cells_for(rect);
        for &cell in &cells {
            self.cells.entry(cell).or_default().insert(id);
        }
        self.placements.insert(id, cells);
    }

    /// Remove an instance entirely.
    pub fn remove(&mut self, id: u64) {
        let Some(cells) = self.placements.remove(&id) else {
            return;
        };
        for cell in cells {
            if let Some(ids) = self.cells.get_mut(&cell) {
                ids.remove(&id);
                if ids.is_empty() {
                    self.cells.remove(&cell);
                }
            }
        }
    }

    /// Candidate instance ids whose cells intersect `rect`, ascending.
    pub fn query(&self, rect: &Rect) -> Vec<u64> {
        let mut out = BTreeSet::new();
        for cell in self.cells_for(rect) {
            if let Some(ids) = self.cells.get(&cell) {
                out.extend(ids.iter().copied());
            }
        }
        out.into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_SIZE)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn place_and_query() {
        let mut index = SpatialIndex::default();
        index.place(1, &Rect::new(0.0, 0.0, 20.0, 20.0));
        index.place(2, &Rect::new(500.0, 500.0, 20.0, 20.0));

        assert_eq!(index.query(&Rect::new(10.0, 10.0, 5.0, 5.0)), vec![1]);
        assert_eq!(index.query(&Rect::new(490.0, 490.0, 40.0, 40.0)), vec![2]);
        assert!(index.query(&Rect::new(1000.0, 1000.0, 5.0, 5.0)).is_empty());
    }

    #[test]
    fn large_rect_spans_multiple_cells() {
        let mut index = SpatialIndex::new(40.0);
        index.place(9, &Rect::new(0.0, 0.0, 100.0, 100.0));
        // Query any corner of the footprint.
        assert_eq!(index.query(&Rect::new(95.0, 95.0, 2.0, 2.0)), vec![9]);
        assert_eq!(index.query(&Rect::new(0.0, 0.0, 2.0, 2.0)), vec![9]);
    }

    #[test]
    fn replace_moves_instance() {
        let mut index = SpatialIndex::default();
        index.place(1, &Rect::new(0.0, 0.0, 10.0, 10.0));
        index.place(1, &Rect::new(400.0, 400.0, 10.0, 10.0));

        assert!(index.query(&Rect::new(0.0, 0.0, 20.0, 20.0)).is_empty());
        assert_eq!(index.query(&Rect::new(395.0, 395.0, 20.0, 20.0)), vec![1]);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn remove_clears_all_cells() {
        let mut index = SpatialIndex::new(40.0);
        index.place(1, &Rect::new(0.0, 0.0, 100.0, 100.0));
        index.remove(1);
        assert!(index.is_empty());
        assert!(index.query(&Rect::new(0.0, 0.0, 200.0, 200.0)).is_empty());
        // Double remove is harmless.
        index.remove(1);
    }
}
