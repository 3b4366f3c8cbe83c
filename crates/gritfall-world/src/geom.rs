//! Small 2D geometry helpers shared by movement, pathing, and effects.
//!
//! Positions are `f64` pixels. The world is tiled for pathing and the
//! ground-item index; [`TILE_SIZE`] is the edge length of one tile.

use serde::{Deserialize, Serialize};

/// Edge length of one world tile in pixels.
pub const TILE_SIZE: f64 = 40.0;

/// Quantization steps per tile for replicated effect coordinates.
///
/// Effect lifecycle payloads carry positions as integers in units of
/// `TILE_SIZE / QUANT_STEPS` so client and server agree bit-exactly.
pub const QUANT_STEPS: f64 = 8.0;

// ---------------------------------------------------------------------------
// Vec2
// ---------------------------------------------------------------------------

/// A 2D vector / point in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Scale to unit length if longer than 1.0; shorter vectors (including
    /// zero) are returned unchanged so partial analog input is preserved.
    pub fn clamp_to_unit(self) -> Self {
        let len = self.length();
        if len > 1.0 {
            Vec2::new(self.x / len, self.y / len)
        } else {
            self
        }
    }

    pub fn scaled(self, factor: f64) -> Self {
        Vec2::new(self.x * factor, self.y * factor)
    }

    pub fn distance_to(self, other: Vec2) -> f64 {
        Vec2::new(self.x - other.x, self.y - other.y).length()
    }

    /// The tile containing this point.
    pub fn tile(self) -> (i32, i32) {
        (
            (self.x / TILE_SIZE).floor() as i32,
            (self.y / TILE_SIZE).floor() as i32,
        )
    }
}

/// Quantize a pixel coordinate to the replicated integer grid.
pub fn quantize(px: f64) -> i32 {
    (px / TILE_SIZE * QUANT_STEPS).round() as i32
}

/// Inverse of [`quantize`], for tests and client-side reconstruction.
pub fn dequantize(q: i32) -> f64 {
    q as f64 * TILE_SIZE / QUANT_STEPS
}

// ---------------------------------------------------------------------------
// Rect
// ---------------------------------------------------------------------------

/// An axis-aligned rectangle (origin at top-left).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// Rect centered on `center` with the given half-extents.
    pub fn centered(center: Vec2, half_w: f64, half_h: f64) -> Self {
        Self {
            x: center.x - half_w,
            y: center.y - half_h,
            w: half_w * 2.0,
            h: half_h * 2.0,
        }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.x && p.x < self.right() && p.y >= self.y && p.y < self.bottom()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_to_unit_normalizes_long_vectors() {
        let v = Vec2::new(3.0, 4.0).clamp_to_unit();
        assert!((v.length() - 1.0).abs() < 1e-12);
        assert!((v.x - 0.6).abs() < 1e-12);
        assert!((v.y - 0.8).abs() < 1e-12);
    }

    #[test]
    fn clamp_to_unit_preserves_short_vectors() {
        let v = Vec2::new(0.3, 0.4).clamp_to_unit();
        assert_eq!(v, Vec2::new(0.3, 0.4));
        assert_eq!(Vec2::ZERO.clamp_to_unit(), Vec2::ZERO);
    }

    #[test]
    fn rect_overlap_detection() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 10.0, 10.0);
        let c = Rect::new(10.0, 0.0, 5.0, 5.0);
        assert!(a.overlaps(&b));
        // Touching edges do not overlap.
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn tile_coordinates() {
        assert_eq!(Vec2::new(0.0, 0.0).tile(), (0, 0));
        assert_eq!(Vec2::new(39.9, 39.9).tile(), (0, 0));
        assert_eq!(Vec2::new(40.0, 80.0).tile(), (1, 2));
    }

    #[test]
    fn quantize_roundtrip_on_grid_points() {
        for q in [-17, 0, 1, 8, 123] {
            assert_eq!(quantize(dequantize(q)), q);
        }
    }

    #[test]
    fn quantize_is_tile_relative() {
        // One tile is QUANT_STEPS quantization units.
        assert_eq!(quantize(TILE_SIZE), QUANT_STEPS as i32);
        assert_eq!(quantize(TILE_SIZE / 2.0), (QUANT_STEPS / 2.0) as i32);
    }
}
