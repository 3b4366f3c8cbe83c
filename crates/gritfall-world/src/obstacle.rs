//! Static obstacles: rocks, lava pools, and gold-ore veins.
//!
//! Obstacles are placed by seeded world generation and immutable until the
//! next reset. Rocks and gold-ore block movement and pathing; lava is
//! traversable but applies a burning condition to anything standing in it.

use serde::{Deserialize, Serialize};

use crate::geom::Rect;

// ---------------------------------------------------------------------------
// ObstacleKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObstacleKind {
    Rock,
    Lava,
    GoldOre,
}

impl ObstacleKind {
    /// Whether actors collide with this obstacle.
    pub fn solid(self) -> bool {
        match self {
            Self::Rock | Self::GoldOre => true,
            Self::Lava => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Obstacle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Obstacle {
    pub id: String,
    pub kind: ObstacleKind,
    #[serde(flatten)]
    pub rect: Rect,
}

impl Obstacle {
    pub fn new(id: impl Into<String>, kind: ObstacleKind, rect: Rect) -> Self {
        Self {
            id: id.into(),
            kind,
            rect,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solidity_by_kind() {
        assert!(ObstacleKind::Rock.solid());
        assert!(ObstacleKind::GoldOre.solid());
        assert!(!ObstacleKind::Lava.solid());
    }

    #[test]
    fn obstacle_json_shape() {
        let o = Obstacle::new("obstacle-3", ObstacleKind::GoldOre, Rect::new(40.0, 80.0, 40.0, 40.0));
        let json = serde_json::to_value(&o).unwrap();
        assert_eq!(json["kind"], "gold-ore");
        assert_eq!(json["x"], 40.0);
        assert_eq!(json["w"], 40.0);
    }
}
