//! Typed per-entity diffs.
//!
//! A [`Patch`] is emitted for every observable mutation of world state and
//! is the unit the replication journal buffers, coalesces, and drains into
//! client frames. There is exactly one representation: the tagged enum
//! below, one payload variant per kind.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::actor::Facing;
use crate::condition::Condition;
use crate::condition::ConditionKind;
use crate::ground::GroundItem;
use crate::item::ItemStack;

// ---------------------------------------------------------------------------
// Patch
// ---------------------------------------------------------------------------

/// One per-entity diff. `kind` is the wire tag; payload fields are flat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Patch {
    PlayerPos {
        id: String,
        x: f64,
        y: f64,
    },
    PlayerFacing {
        id: String,
        facing: Facing,
    },
    PlayerIntent {
        id: String,
        dx: f64,
        dy: f64,
    },
    PlayerHealth {
        id: String,
        health: i32,
        #[serde(rename = "maxHealth")]
        max_health: i32,
    },
    PlayerInventory {
        id: String,
        slots: Vec<ItemStack>,
    },
    PlayerConditions {
        id: String,
        conditions: BTreeMap<ConditionKind, Condition>,
    },
    PlayerRemoved {
        id: String,
    },
    NpcPos {
        id: String,
        x: f64,
        y: f64,
    },
    NpcFacing {
        id: String,
        facing: Facing,
    },
    NpcHealth {
        id: String,
        health: i32,
        #[serde(rename = "maxHealth")]
        max_health: i32,
    },
    NpcConditions {
        id: String,
        conditions: BTreeMap<ConditionKind, Condition>,
    },
    NpcRemoved {
        id: String,
    },
    GroundItemAdded {
        id: String,
        item: GroundItem,
    },
    GroundItemQty {
        id: String,
        qty: u32,
    },
    GroundItemRemoved {
        id: String,
    },
}

impl Patch {
    /// The wire tag for this patch's kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PlayerPos { .. } => "player_pos",
            Self::PlayerFacing { .. } => "player_facing",
            Self::PlayerIntent { .. } => "player_intent",
            Self::PlayerHealth { .. } => "player_health",
            Self::PlayerInventory { .. } => "player_inventory",
            Self::PlayerConditions { .. } => "player_conditions",
            Self::PlayerRemoved { .. } => "player_removed",
            Self::NpcPos { .. } => "npc_pos",
            Self::NpcFacing { .. } => "npc_facing",
            Self::NpcHealth { .. } => "npc_health",
            Self::NpcConditions { .. } => "npc_conditions",
            Self::NpcRemoved { .. } => "npc_removed",
            Self::GroundItemAdded { .. } => "ground_item_added",
            Self::GroundItemQty { .. } => "ground_item_qty",
            Self::GroundItemRemoved { .. } => "ground_item_removed",
        }
    }

    /// The entity this patch describes.
    pub fn entity_id(&self) -> &str {
        match self {
            Self::PlayerPos { id, .. }
            | Self::PlayerFacing { id, .. }
            | Self::PlayerIntent { id, .. }
            | Self::PlayerHealth { id, .. }
            | Self::PlayerInventory { id, .. }
            | Self::PlayerConditions { id, .. }
            | Self::PlayerRemoved { id }
            | Self::NpcPos { id, .. }
            | Self::NpcFacing { id, .. }
            | Self::NpcHealth { id, .. }
            | Self::NpcConditions { id, .. }
            | Self::NpcRemoved { id }
            | Self::GroundItemAdded { id, .. }
            | Self::GroundItemQty { id, .. }
            | Self::GroundItemRemoved { id } => id,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
