//! Bounded command buffer between session tasks and the simulation loop.
//!
//! Many producers (one per connected client) enqueue; exactly one consumer
//! (the loop) drains once per tick. The buffer itself is a plain ring --
//! the server wraps it in its own lock -- but its accounting is designed
//! for that topology:
//!
//! - a global capacity bound (`queue_full` on overflow),
//! - a per-actor quota (`queue_limit` on overflow) so one flooding client
//!   cannot starve the rest,
//! - per-actor drop counters with exponentially spaced warnings (only
//!   powers of two are logged, so a flood produces a handful of lines,
//!   not a handful per command).

use std::time::Instant;

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::actor::Facing;
use crate::RejectReason;

// ---------------------------------------------------------------------------
// CommandPayload
// ---------------------------------------------------------------------------

/// What a queued command asks the world to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CommandPayload {
    /// Continuous movement intent.
    Input {
        dx: f64,
        dy: f64,
        facing: Option<Facing>,
    },
    /// Plan a path to a point.
    SetPath { x: f64, y: f64 },
    /// Abandon the current path.
    CancelPath,
    /// Trigger a named action (`attack`, `fireball`).
    Action { name: String },
    /// Console command (`drop`, `pickup`, `mine`).
    Console { cmd: String, qty: u32 },
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// A queued client command.
#[derive(Debug, Clone)]
pub struct Command {
    /// The player this command acts on.
    pub actor: String,
    pub payload: CommandPayload,
    /// Tick counter value at enqueue time.
    pub origin_tick: u64,
    /// Wall-clock arrival, for latency diagnostics only (never feeds the
    /// simulation).
    pub issued_at: Instant,
}

// ---------------------------------------------------------------------------
// CommandBuffer
// ---------------------------------------------------------------------------

/// Fixed-capacity FIFO with per-actor quotas.
#[derive(Debug)]
pub struct CommandBuffer {
    queue: VecDeque<Command>,
    capacity: usize,
    per_actor_limit: usize,
    pending_by_actor: HashMap<String, usize>,
    drops_by_actor: HashMap<String, u64>,
}

impl CommandBuffer {
    pub fn new(capacity: usize, per_actor_limit: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity),
            capacity,
            per_actor_limit,
            pending_by_actor: HashMap::new(),
            drops_by_actor: HashMap::new(),
        }
    }

    /// Number of commands currently queued. Exposed as the occupancy gauge.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total commands dropped for `actor` since the last drain-reset.
    pub fn drops_for(&self, actor: &str) -> u64 {
        self.drops_by_actor.get(actor).copied().unwrap_or(0)
    }

    /// Enqueue a command for `actor`, stamping it with `origin_tick`.
    ///
    /// Rejections are values, not errors: the session layer turns them
    /// into `commandReject` envelopes and the simulation is untouched.
    pub fn enqueue(
        &mut self,
        actor: &str,
        payload: CommandPayload,
        origin_tick: u64,
    ) -> Result<(), RejectReason> {
        let pending = self.pending_by_actor.get(actor).copied().unwrap_or(0);
        if pending >= self.per_actor_limit {
            self.record_drop(actor, RejectReason::QueueLimit);
            return Err(RejectReason::QueueLimit);
        }
        if self.queue.len() >= self.capacity {
            self.record_drop(actor, RejectReason::QueueFull);
            return Err(RejectReason::QueueFull);
        }

        self.queue.push_back(Command {
            actor: actor.to_owned(),
            payload,
            origin_tick,
            issued_at: Instant::now(),
        });
        *self.pending_by_actor.entry(actor.to_owned()).or_insert(0) += 1;
        Ok(())
    }

    /// Remove and return all pending commands in FIFO order, resetting the
    /// per-actor pending counts in the same critical section.
    pub fn drain(&mut self) -> Vec<Command> {
        self.pending_by_actor.clear();
        self.queue.drain(..).collect()
    }

    fn record_drop(&mut self, actor: &str, reason: RejectReason) {
        let count = self.drops_by_actor.entry(actor.to_owned()).or_insert(0);
        *count += 1;
        if count.is_power_of_two() {
            tracing::warn!(
                actor = %actor,
                reason = %reason,
                dropped = *count,
                occupancy = self.queue.len(),
                "command dropped"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> CommandPayload {
        CommandPayload::Input {
            dx: 1.0,
            dy: 0.0,
            facing: Some(Facing::Right),
        }
    }

    // -- 1. FIFO order ------------------------------------------------------

    #[test]
    fn drain_preserves_fifo_order() {
        let mut buf = CommandBuffer::new(32, 16);
        for i in 0..5 {
            buf.enqueue(
                "player-1",
                CommandPayload::Console {
                    cmd: "drop".to_owned(),
                    qty: i,
                },
                i as u64,
            )
            .unwrap();
        }
        let drained = buf.drain();
        assert_eq!(drained.len(), 5);
        for (i, cmd) in drained.iter().enumerate() {
            assert_eq!(cmd.origin_tick, i as u64);
        }
        assert!(buf.is_empty());
    }

    // -- 2. Per-actor throttle ---------------------------------------------

    #[test]
    fn per_actor_limit_rejects_seventeenth() {
        let mut buf = CommandBuffer::new(64, 16);
        for _ in 0..16 {
            buf.enqueue("player-1", input(), 0).unwrap();
        }
        let err = buf.enqueue("player-1", input(), 0).unwrap_err();
        assert_eq!(err, RejectReason::QueueLimit);
        assert!(err.retryable());
        assert_eq!(buf.len(), 16);
        assert_eq!(buf.drops_for("player-1"), 1);
    }

    #[test]
    fn throttle_is_per_actor() {
        let mut buf = CommandBuffer::new(64, 2);
        buf.enqueue("player-1", input(), 0).unwrap();
        buf.enqueue("player-1", input(), 0).unwrap();
        assert!(buf.enqueue("player-1", input(), 0).is_err());
        // A different actor still has quota.
        buf.enqueue("player-2", input(), 0).unwrap();
    }

    // -- 3. Global capacity -------------------------------------------------

    #[test]
    fn global_capacity_rejects_with_queue_full() {
        let mut buf = CommandBuffer::new(3, 16);
        buf.enqueue("player-1", input(), 0).unwrap();
        buf.enqueue("player-2", input(), 0).unwrap();
        buf.enqueue("player-3", input(), 0).unwrap();
        let err = buf.enqueue("player-4", input(), 0).unwrap_err();
        assert_eq!(err, RejectReason::QueueFull);
        assert_eq!(buf.len(), 3);
    }

    // -- 4. Drain resets quotas ---------------------------------------------

    #[test]
    fn drain_resets_per_actor_counts() {
        let mut buf = CommandBuffer::new(64, 2);
        buf.enqueue("player-1", input(), 0).unwrap();
        buf.enqueue("player-1", input(), 0).unwrap();
        assert!(buf.enqueue("player-1", input(), 0).is_err());

        buf.drain();
        buf.enqueue("player-1", input(), 1).unwrap();
    }

    // -- 5. Bound invariant under random traffic ----------------------------

    proptest::proptest! {
        #[test]
        fn occupancy_never_exceeds_capacity(ops in proptest::collection::vec((0u8..4, 0u8..8), 0..200)) {
            let mut buf = CommandBuffer::new(16, 4);
            for (op, actor) in ops {
                match op {
                    0..=2 => {
                        let _ = buf.enqueue(&format!("player-{actor}"), CommandPayload::CancelPath, 0);
                    }
                    _ => {
                        buf.drain();
                    }
                }
                proptest::prop_assert!(buf.len() <= buf.capacity());
            }
        }
    }

    // -- 6. Origin tick stamping --------------------------------------------

    #[test]
    fn origin_tick_is_stamped_at_enqueue() {
        let mut buf = CommandBuffer::new(8, 8);
        buf.enqueue("player-1", input(), 41).unwrap();
        let cmd = &buf.drain()[0];
        assert_eq!(cmd.origin_tick, 41);
        assert_eq!(cmd.actor, "player-1");
    }
}
