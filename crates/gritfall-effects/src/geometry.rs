//! Effect geometry and motion state.

use serde::{Deserialize, Serialize};

use gritfall_world::geom::{quantize, Rect, Vec2};

use crate::contract::Shape;

// ---------------------------------------------------------------------------
// EffectGeometry
// ---------------------------------------------------------------------------

/// The footprint of an effect instance: a center plus shape extents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectGeometry {
    pub shape: Shape,
    pub pos: Vec2,
    /// Half-width for rects, radius for circles.
    pub half_w: f64,
    /// Half-height for rects; unused for circles.
    pub half_h: f64,
}

impl EffectGeometry {
    pub fn circle(pos: Vec2, radius: f64) -> Self {
        Self {
            shape: Shape::Circle,
            pos,
            half_w: radius,
            half_h: radius,
        }
    }

    pub fn rect(pos: Vec2, half_w: f64, half_h: f64) -> Self {
        Self {
            shape: Shape::Rect,
            pos,
            half_w,
            half_h,
        }
    }

    /// Bounding rect, used for overlap queries (circles are tested by
    /// their bounding box; at arena scale the difference is invisible).
    pub fn bounds(&self) -> Rect {
        Rect::centered(self.pos, self.half_w, self.half_h)
    }
}

// ---------------------------------------------------------------------------
// MotionState
// ---------------------------------------------------------------------------

/// Linear-motion bookkeeping for projectiles.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MotionState {
    /// Velocity in pixels per second.
    pub velocity: Vec2,
    /// Distance traveled so far, pixels.
    pub traveled: f64,
    /// Travel budget; exceeding it ends the projectile with `range`.
    pub max_range: f64,
}

// ---------------------------------------------------------------------------
// Quantized coordinates
// ---------------------------------------------------------------------------

/// A position quantized to the tile-relative integer grid replicated to
/// clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantizedPos {
    pub qx: i32,
    pub qy: i32,
}

impl QuantizedPos {
    pub fn from_pos(pos: Vec2) -> Self {
        Self {
            qx: quantize(pos.x),
            qy: quantize(pos.y),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
