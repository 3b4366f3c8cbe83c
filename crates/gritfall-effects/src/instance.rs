//! Live effect instances and their accumulated hit telemetry.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::contract::{Delivery, EndPolicyKind, ImpactPolicy, Motion, Replication};
use crate::event::EndReason;
use crate::geometry::{EffectGeometry, MotionState};

// ---------------------------------------------------------------------------
// HitTelemetry
// ---------------------------------------------------------------------------

/// Per-instance impact counters, flushed as a parity record on end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HitTelemetry {
    pub hit_count: u64,
    pub victims: BTreeSet<String>,
    pub damage_sum: i64,
    pub first_hit_tick: Option<u64>,
}

impl HitTelemetry {
    /// Record one landed hit.
    pub fn record(&mut self, victim: &str, damage: i32, tick: u64) {
        self.hit_count += 1;
        self.victims.insert(victim.to_owned());
        self.damage_sum += i64::from(damage);
        if self.first_hit_tick.is_none() {
            self.first_hit_tick = Some(tick);
        }
    }
}

// ---------------------------------------------------------------------------
// EffectInstance
// ---------------------------------------------------------------------------

/// One live effect. Owned exclusively by the manager.
#[derive(Debug, Clone)]
pub struct EffectInstance {
    /// Globally unique for the life of the server; never reused.
    pub id: u64,
    pub entry_id: String,
    pub contract_id: String,
    pub type_id: u16,
    pub start_tick: u64,
    pub geometry: EffectGeometry,
    pub motion_kind: Motion,
    pub motion: MotionState,
    pub delivery: Delivery,
    pub impact_policy: ImpactPolicy,
    /// Actor the instance follows, for follow motion.
    pub attached_actor_id: Option<String>,
    pub source_actor_id: Option<String>,
    pub ticks_remaining: u64,
    pub tick_cadence: u64,
    /// Last emitted (or reserved) sequence number; strictly increasing.
    pub seq: u64,
    pub replication: Replication,
    pub end_policy: EndPolicyKind,
    /// Effect damage dealt per impact, from the catalog parameters.
    pub damage: i32,
    pub telemetry: HitTelemetry,
    /// End requested by a hook this tick, consumed by the end phase.
    /// Highest-priority end classification when set.
    pub pending_end: Option<EndReason>,
}

impl EffectInstance {
    /// Reserve and return the next sequence number.
    pub fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    /// Whether `on_tick` should fire at `tick` given the cadence.
    pub fn cadence_due(&self, tick: u64) -> bool {
        let elapsed = tick.saturating_sub(self.start_tick);
        self.tick_cadence <= 1 || elapsed % self.tick_cadence == 0
    }

    /// Whether this instance may hit `victim` under its impact policy.
    pub fn may_hit(&self, victim: &str) -> bool {
        match self.impact_policy {
            ImpactPolicy::None => false,
            ImpactPolicy::EveryTick => true,
            ImpactPolicy::FirstHit => !self.telemetry.victims.contains(victim),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use gritfall_world::geom::Vec2;

    fn test_instance(policy: ImpactPolicy) -> EffectInstance {
        EffectInstance {
            id: 1,
            entry_id: "fireball".to_owned(),
            contract_id: "projectile-bolt".to_owned(),
            type_id: 2,
            start_tick: 10,
            geometry: EffectGeometry::circle(Vec2::ZERO, 10.0),
            motion_kind: Motion::Linear,
            motion: MotionState::default(),
            delivery: Delivery::Projectile,
            impact_policy: policy,
            attached_actor_id: None,
            source_actor_id: Some("player-1".to_owned()),
            ticks_remaining: 90,
            tick_cadence: 3,
            seq: 1,
            replication: Replication {
                send_spawn: true,
                send_updates: true,
                send_end: true,
            },
            end_policy: EndPolicyKind::Duration,
            damage: 18,
            telemetry: HitTelemetry::default(),
            pending_end: None,
        }
    }

    #[test]
    fn seq_is_strictly_increasing() {
        let mut instance = test_instance(ImpactPolicy::FirstHit);
        let a = instance.next_seq();
        let b = instance.next_seq();
        assert!(a > 1);
        assert!(b > a);
    }

    #[test]
    fn cadence_fires_on_multiples_of_start_offset() {
        let instance = test_instance(ImpactPolicy::FirstHit);
        assert!(instance.cadence_due(10));
        assert!(!instance.cadence_due(11));
        assert!(!instance.cadence_due(12));
        assert!(instance.cadence_due(13));
    }

    #[test]
    fn first_hit_policy_dedupes_victims() {
        let mut instance = test_instance(ImpactPolicy::FirstHit);
        assert!(instance.may_hit("npc-1"));
        instance.telemetry.record("npc-1", 18, 12);
        assert!(!instance.may_hit("npc-1"));
        assert!(instance.may_hit("npc-2"));
    }

    #[test]
    fn every_tick_policy_rehits() {
        let mut instance = test_instance(ImpactPolicy::EveryTick);
        instance.telemetry.record("npc-1", 18, 12);
        assert!(instance.may_hit("npc-1"));
    }

    #[test]
    fn none_policy_never_hits() {
        let instance = test_instance(ImpactPolicy::None);
        assert!(!instance.may_hit("npc-1"));
    }

    #[test]
    fn telemetry_accumulates() {
        let mut telemetry = HitTelemetry::default();
        telemetry.record("npc-1", 10, 5);
        telemetry.record("npc-1", 10, 8);
        telemetry.record("npc-2", 4, 9);
        assert_eq!(telemetry.hit_count, 3);
        assert_eq!(telemetry.victims.len(), 2);
        assert_eq!(telemetry.damage_sum, 24);
        assert_eq!(telemetry.first_hit_tick, Some(5));
    }
}
