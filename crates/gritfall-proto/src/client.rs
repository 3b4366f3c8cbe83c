//! Client-to-server messages.

use serde::{Deserialize, Serialize};

use gritfall_world::actor::Facing;

// ---------------------------------------------------------------------------
// ClientBody
// ---------------------------------------------------------------------------

/// The typed payload of a client message, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientBody {
    /// Continuous movement intent.
    Input {
        dx: f64,
        dy: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        facing: Option<Facing>,
    },
    /// Click-to-move pathing request.
    Path { x: f64, y: f64 },
    /// Abandon the current path.
    CancelPath,
    /// Trigger a named action.
    Action { action: String },
    /// Latency probe; `sentAt` is echoed back.
    #[serde(rename_all = "camelCase")]
    Heartbeat { sent_at: u64 },
    /// Console command (`drop`, `pickup`, `mine`).
    Console {
        cmd: String,
        #[serde(default)]
        qty: u32,
    },
    /// Recovery: ask for a retained keyframe by sequence.
    #[serde(rename_all = "camelCase")]
    KeyframeRequest { keyframe_seq: u64 },
    /// Adjust how often this client wants keyframes.
    #[serde(rename_all = "camelCase")]
    KeyframeCadence { keyframe_interval: u64 },
}

// ---------------------------------------------------------------------------
// ClientEnvelope
// ---------------------------------------------------------------------------

/// A full inbound message: version, typed body, and the optional ack/seq
/// bookkeeping every message may carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientEnvelope {
    pub ver: u8,
    #[serde(flatten)]
    pub body: ClientBody,
    /// Latest tick the client has observed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ack: Option<u64>,
    /// Monotonic per-client command id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
