//! Gritfall world -- authoritative state for a 2D top-down arena.
//!
//! This crate owns the simulation-side state of the game: players, NPCs,
//! obstacles, ground items, and status conditions, together with the
//! deterministic building blocks the rest of the server is assembled from:
//!
//! - [`rng`] -- labeled RNG streams derived from a single world seed, so
//!   every random decision is reproducible from the seed alone.
//! - [`command`] -- a bounded multi-producer command buffer with per-actor
//!   throttling, drained once per tick by the simulation loop.
//! - [`world::World`] -- entity CRUD with per-actor version counters; every
//!   observable mutation bumps the version and emits a typed [`patch::Patch`].
//! - [`path`] / [`movement`] -- A* pathing over the obstacle grid and
//!   swept-AABB movement resolution.
//!
//! The world is deliberately synchronous and lock-free internally; the
//! server wraps it in a single coarse lock and only the simulation loop
//! mutates it.

#![deny(unsafe_code)]

pub mod actor;
pub mod command;
pub mod condition;
pub mod config;
pub mod geom;
pub mod ground;
pub mod item;
pub mod movement;
pub mod obstacle;
pub mod patch;
pub mod path;
pub mod rng;
pub mod snapshot;
pub mod world;

// ---------------------------------------------------------------------------
// Reject reasons
// ---------------------------------------------------------------------------

/// Why a client command was refused. These are surfaced verbatim on the
/// wire in `commandReject` envelopes, so the string forms are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// No such actor for the command's target id.
    UnknownActor,
    /// Action name outside the registered action set.
    InvalidAction,
    /// The actor already has its full quota of queued commands.
    QueueLimit,
    /// The global command buffer is at capacity.
    QueueFull,
}

impl RejectReason {
    /// Stable wire string for this reason.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnknownActor => "unknown_actor",
            Self::InvalidAction => "invalid_action",
            Self::QueueLimit => "queue_limit",
            Self::QueueFull => "queue_full",
        }
    }

    /// Whether the client should retry the same command after backing off.
    /// Only throttle rejections are worth retrying.
    pub fn retryable(self) -> bool {
        matches!(self, Self::QueueLimit | Self::QueueFull)
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by world operations that are genuine failures rather
/// than recoverable gameplay rejections (those are [`RejectReason`]s).
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// A player id was reused while the previous player is still alive.
    #[error("player id '{id}' is already present in the world")]
    DuplicatePlayer { id: String },

    /// An internal reference pointed at an entity that no longer exists.
    #[error("dangling reference to {kind} '{id}'")]
    DanglingReference { kind: &'static str, id: String },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::actor::{Actor, Facing, Npc, NpcArchetype, Player};
    pub use crate::command::{Command, CommandBuffer, CommandPayload};
    pub use crate::condition::{Condition, ConditionKind};
    pub use crate::config::WorldConfig;
    pub use crate::geom::{Rect, Vec2};
    pub use crate::ground::GroundItem;
    pub use crate::item::{ItemKind, ItemStack};
    pub use crate::obstacle::{Obstacle, ObstacleKind};
    pub use crate::patch::Patch;
    pub use crate::rng::RngTree;
    pub use crate::snapshot::WorldSnapshot;
    pub use crate::world::World;
    pub use crate::{RejectReason, WorldError};
}
