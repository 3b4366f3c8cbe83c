//! Effect lifecycle events.
//!
//! Events carry quantized coordinates (see
//! [`QuantizedPos`](crate::geometry::QuantizedPos)) so the client's
//! reconstruction agrees with the server bit-exactly.

use serde::{Deserialize, Serialize};

use crate::geometry::QuantizedPos;

// ---------------------------------------------------------------------------
// EndReason
// ---------------------------------------------------------------------------

/// Why an instance ended. The string forms are stable wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndReason {
    Duration,
    Cancel,
    OwnerDeath,
    OwnerLost,
    ZoneChange,
    Explicit,
    /// Projectile-specific: stopped by a solid obstacle.
    Wall,
    /// Projectile-specific: exceeded its travel budget.
    Range,
    /// Projectile-specific: consumed by striking an actor.
    Hit,
}

impl EndReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Duration => "duration",
            Self::Cancel => "cancel",
            Self::OwnerDeath => "owner-death",
            Self::OwnerLost => "owner-lost",
            Self::ZoneChange => "zone-change",
            Self::Explicit => "explicit",
            Self::Wall => "wall",
            Self::Range => "range",
            Self::Hit => "hit",
        }
    }
}

// ---------------------------------------------------------------------------
// Event payloads
// ---------------------------------------------------------------------------

/// Emitted once per instance, always with `seq == 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectSpawned {
    pub id: u64,
    pub entry: String,
    pub contract: String,
    /// Numeric contract type id.
    pub type_id: u16,
    pub seq: u64,
    pub tick: u64,
    pub source: Option<String>,
    #[serde(flatten)]
    pub pos: QuantizedPos,
    /// Quantized half-extents (radius for circles).
    pub q_half_w: i32,
    pub q_half_h: i32,
    /// Presentation parameters from the catalog entry.
    pub params: std::collections::BTreeMap<String, serde_json::Value>,
}

/// Emitted while the instance is live (only when the contract replicates
/// updates). `seq` strictly increases per instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectUpdated {
    pub id: u64,
    pub seq: u64,
    pub tick: u64,
    #[serde(flatten)]
    pub pos: QuantizedPos,
    pub ticks_remaining: u64,
}

/// Emitted exactly once when the instance ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectEnded {
    pub id: u64,
    pub seq: u64,
    pub tick: u64,
    pub reason: EndReason,
}

/// Any lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EffectEvent {
    EffectSpawned(EffectSpawned),
    EffectUpdated(EffectUpdated),
    EffectEnded(EffectEnded),
}

impl EffectEvent {
    pub fn id(&self) -> u64 {
        match self {
            Self::EffectSpawned(e) => e.id,
            Self::EffectUpdated(e) => e.id,
            Self::EffectEnded(e) => e.id,
        }
    }

    pub fn seq(&self) -> u64 {
        match self {
            Self::EffectSpawned(e) => e.seq,
            Self::EffectUpdated(e) => e.seq,
            Self::EffectEnded(e) => e.seq,
        }
    }

    pub fn tick(&self) -> u64 {
        match self {
            Self::EffectSpawned(e) => e.tick,
            Self::EffectUpdated(e) => e.tick,
            Self::EffectEnded(e) => e.tick,
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
    fn end_reason_wire_strings() {
        assert_eq!(EndReason::OwnerDeath.as_str(), "owner-death");
        assert_eq!(
            serde_json::to_string(&EndReason::OwnerDeath).unwrap(),
            "\"owner-death\""
        );
        let back: EndReason = serde_json::from_str("\"zone-change\"").unwrap();
        assert_eq!(back, EndReason::ZoneChange);
    }

    #[test]
    fn event_accessors() {
        let ended = EffectEvent::EffectEnded(EffectEnded {
            id: 7,
            seq: 4,
            tick: 100,
            reason: EndReason::Range,
        });
        assert_eq!(ended.id(), 7);
        assert_eq!(ended.seq(), 4);
        assert_eq!(ended.tick(), 100);
    }

    #[test]
    fn update_event_flattens_quantized_pos() {
        let update = EffectUpdated {
            id: 1,
            seq: 2,
            tick: 3,
            pos: QuantizedPos { qx: 10, qy: -4 },
            ticks_remaining: 5,
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["qx"], 10);
        assert_eq!(json["qy"], -4);
        assert_eq!(json["ticksRemaining"], 5);
    }
}
