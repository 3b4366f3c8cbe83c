//! Server-to-client messages.
//!
//! Snapshot shapes come in three sizes: the incremental `state` frame,
//! the recovery `keyframe`, and the HTTP `JoinResponse`. All three embed
//! the same world view types so the client parses one entity shape.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use gritfall_effects::catalog::CatalogSnapshot;
use gritfall_effects::event::{EffectEnded, EffectSpawned, EffectUpdated};
use gritfall_world::actor::{Npc, Player};
use gritfall_world::config::WorldConfig;
use gritfall_world::ground::GroundItem;
use gritfall_world::obstacle::Obstacle;
use gritfall_world::patch::Patch;

// ---------------------------------------------------------------------------
// StateSnapshot
// ---------------------------------------------------------------------------

/// One per-client state frame. When `resync` is set the full entity sets
/// and catalog ride along; otherwise only patches and lifecycle deltas.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub tick: u64,
    /// Broadcast sequence, monotonic per server run.
    pub sequence: u64,
    /// Latest keyframe sequence available for recovery.
    pub keyframe_seq: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub players: Option<Vec<Player>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub npcs: Option<Vec<Npc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obstacles: Option<Vec<Obstacle>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ground_items: Option<Vec<GroundItem>>,
    pub effect_spawns: Vec<EffectSpawned>,
    pub effect_updates: Vec<EffectUpdated>,
    pub effect_ends: Vec<EffectEnded>,
    /// Last sequence per live effect instance.
    pub effect_seq_cursors: BTreeMap<u64, u64>,
    pub patches: Vec<Patch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<WorldConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect_catalog: Option<CatalogSnapshot>,
    pub resync: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyframe_interval: Option<u64>,
}

// ---------------------------------------------------------------------------
// KeyframeMsg
// ---------------------------------------------------------------------------

/// A retained keyframe, served on request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyframeMsg {
    pub sequence: u64,
    pub tick: u64,
    pub players: Vec<Player>,
    pub npcs: Vec<Npc>,
    pub obstacles: Vec<Obstacle>,
    pub ground_items: Vec<GroundItem>,
    pub config: WorldConfig,
    pub effect_catalog: CatalogSnapshot,
}

// ---------------------------------------------------------------------------
// JoinResponse
// ---------------------------------------------------------------------------

/// HTTP join reply: the caller's new player id plus a full snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub ver: u8,
    pub id: String,
    pub players: Vec<Player>,
    pub npcs: Vec<Npc>,
    pub obstacles: Vec<Obstacle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect_triggers: Option<CatalogSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ground_items: Option<Vec<GroundItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patches: Option<Vec<Patch>>,
    pub config: WorldConfig,
    pub resync: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyframe_interval: Option<u64>,
    pub effect_catalog_hash: String,
}

// ---------------------------------------------------------------------------
// ServerBody
// ---------------------------------------------------------------------------

/// Why a keyframe request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NackReason {
    /// The requested sequence fell out of the retention window.
    Expired,
    /// The client is requesting keyframes faster than allowed.
    RateLimited,
}

/// The typed payload of a server message, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerBody {
    State(StateSnapshot),
    Keyframe(KeyframeMsg),
    #[serde(rename_all = "camelCase")]
    KeyframeNack {
        reason: NackReason,
        sequence: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        catalog: Option<CatalogSnapshot>,
    },
    CommandAck {
        seq: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        tick: Option<u64>,
    },
    CommandReject {
        seq: u64,
        reason: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        retry: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tick: Option<u64>,
    },
    #[serde(rename_all = "camelCase")]
    Heartbeat {
        server_time: u64,
        client_time: u64,
        rtt: u64,
    },
    #[serde(rename = "console_ack")]
    ConsoleAck {
        cmd: String,
        status: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        qty: Option<u32>,
        #[serde(rename = "stackId", skip_serializing_if = "Option::is_none")]
        stack_id: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        slot: Option<usize>,
    },
}

/// A full outbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerEnvelope {
    pub ver: u8,
    #[serde(flatten)]
    pub body: ServerBody,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
