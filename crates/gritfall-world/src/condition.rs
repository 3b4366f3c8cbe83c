//! Timed status conditions (burning, poisoned, ...).
//!
//! Conditions are scheduled in ticks, not wall time, so advancing them is
//! deterministic under replay. A condition may point at a visual effect
//! instance by id; the reference is weak -- the effect manager owns the
//! instance and the world tolerates its absence.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ConditionKind
// ---------------------------------------------------------------------------

/// The kinds of status condition the world knows how to tick.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ConditionKind {
    Burning,
    Poisoned,
}

impl ConditionKind {
    /// Damage applied on each condition tick.
    pub fn damage_per_tick(self) -> i32 {
        match self {
            Self::Burning => 4,
            Self::Poisoned => 2,
        }
    }
}

// ---------------------------------------------------------------------------
// Condition
// ---------------------------------------------------------------------------

/// One active condition on an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub kind: ConditionKind,
    /// Tick after which the condition is gone. The world guarantees removal
    /// no later than the first `advance_conditions` call past this tick.
    pub expires_at: u64,
    /// Next tick at which the periodic effect fires.
    pub next_tick_at: u64,
    /// Ticks between periodic firings.
    pub interval: u64,
    /// Visual effect attached to this condition, by id (weak).
    pub attached_effect: Option<u64>,
}

impl Condition {
    pub fn new(
        kind: ConditionKind,
        expires_at: u64,
        next_tick_at: u64,
        interval: u64,
        attached_effect: Option<u64>,
    ) -> Self {
        Self {
            kind,
            expires_at,
            next_tick_at,
            interval,
            attached_effect,
        }
    }

    /// Whether the condition has lapsed at `tick`.
    pub fn expired(&self, tick: u64) -> bool {
        tick > self.expires_at
    }

    /// Whether the periodic effect is due at `tick`.
    pub fn due(&self, tick: u64) -> bool {
        tick >= self.next_tick_at
    }

    /// Schedule the next periodic firing after one at `tick`.
    pub fn reschedule(&mut self, tick: u64) {
        self.next_tick_at = tick + self.interval.max(1);
    }
}

/// Instruction for the effect manager produced while advancing conditions.
///
/// The world cannot touch effect instances directly (the manager owns
/// them); it hands these directives to the simulation loop instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachedEffectDirective {
    /// Keep the attached effect alive at least `ticks` more ticks.
    Extend { effect: u64, ticks: u64 },
    /// The condition ended; cancel the attached effect.
    End { effect: u64 },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_is_exclusive_of_expiry_tick() {
        let cond = Condition::new(ConditionKind::Burning, 10, 0, 3, None);
        assert!(!cond.expired(10));
        assert!(cond.expired(11));
    }

    #[test]
    fn reschedule_advances_by_interval() {
        let mut cond = Condition::new(ConditionKind::Poisoned, 100, 5, 4, None);
        assert!(cond.due(5));
        cond.reschedule(5);
        assert_eq!(cond.next_tick_at, 9);
        assert!(!cond.due(8));
    }

    #[test]
    fn zero_interval_never_stalls() {
        let mut cond = Condition::new(ConditionKind::Burning, 100, 0, 0, None);
        cond.reschedule(7);
        assert_eq!(cond.next_tick_at, 8);
    }
}
