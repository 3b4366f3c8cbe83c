//! Per-client subscription state.
//!
//! The coordinator owns the subscriber registry: one entry per connected
//! client, each with its outbound channel and replication bookkeeping
//! (last-acked tick, last command seq, keyframe cadence, heartbeat
//! record). Frame composition lives in the server context; the
//! coordinator is the map and the rules about it.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Subscriber state
// ---------------------------------------------------------------------------

/// Mutable per-client bookkeeping.
#[derive(Debug)]
pub struct SubscriberState {
    /// Latest tick the client has acknowledged observing.
    pub last_acked_tick: u64,
    /// Highest command sequence accepted from this client.
    pub last_command_seq: u64,
    /// Client-requested keyframe cadence override.
    pub keyframe_interval: Option<u64>,
    /// Last time a heartbeat arrived.
    pub last_heartbeat_at: Instant,
    /// Consecutive heartbeat intervals with no heartbeat.
    pub missed_heartbeats: u32,
    /// Latest measured round-trip, milliseconds.
    pub rtt_ms: u64,
    /// Rate limiting for keyframe requests.
    pub last_keyframe_request_at: Option<Instant>,
    /// Whether this client has received its first (full) frame.
    pub sent_first_frame: bool,
}

impl SubscriberState {
    fn new(now: Instant) -> Self {
        Self {
            last_acked_tick: 0,
            last_command_seq: 0,
            keyframe_interval: None,
            last_heartbeat_at: now,
            missed_heartbeats: 0,
            rtt_ms: 0,
            last_keyframe_request_at: None,
            sent_first_frame: false,
        }
    }
}

/// One connected client.
#[derive(Debug)]
pub struct Subscriber {
    pub player_id: String,
    /// Outbound frames, drained by the session's writer task.
    pub sender: mpsc::Sender<String>,
    pub state: Mutex<SubscriberState>,
}

/// Result of recording a client ack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    Updated,
    /// The ack moved backward; warned and ignored.
    Regressed { last: u64, got: u64 },
}

/// Subscription failures.
#[derive(Debug, thiserror::Error)]
pub enum SubscribeError {
    #[error("player id '{id}' already has a live subscription")]
    Duplicate { id: String },
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// The subscriber registry.
#[derive(Debug, Default)]
pub struct Coordinator {
    subscribers: Mutex<BTreeMap<String, Arc<Subscriber>>>,
}

impl Coordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the id and register the outbound channel. Duplicate ids
    /// are rejected; the caller closes the socket with a policy
    /// violation.
    pub fn subscribe(
        &self,
        player_id: &str,
        sender: mpsc::Sender<String>,
    ) -> Result<Arc<Subscriber>, SubscribeError> {
        let mut subscribers = self.subscribers.lock();
        if subscribers.contains_key(player_id) {
            return Err(SubscribeError::Duplicate {
                id: player_id.to_owned(),
            });
        }
        let subscriber = Arc::new(Subscriber {
            player_id: player_id.to_owned(),
            sender,
            state: Mutex::new(SubscriberState::new(Instant::now())),
        });
        subscribers.insert(player_id.to_owned(), subscriber.clone());
        Ok(subscriber)
    }

    pub fn unsubscribe(&self, player_id: &str) -> bool {
        self.subscribers.lock().remove(player_id).is_some()
    }

    pub fn subscriber(&self, player_id: &str) -> Option<Arc<Subscriber>> {
        self.subscribers.lock().get(player_id).cloned()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Stable-order snapshot of all live subscribers.
    pub fn snapshot(&self) -> Vec<Arc<Subscriber>> {
        self.subscribers.lock().values().cloned().collect()
    }

    // -- ack / seq bookkeeping ----------------------------------------------

    /// Record a client's observed-tick ack.
    pub fn record_ack(&self, player_id: &str, ack: u64) -> Option<AckOutcome> {
        let subscriber = self.subscriber(player_id)?;
        let mut state = subscriber.state.lock();
        if ack < state.last_acked_tick {
            return Some(AckOutcome::Regressed {
                last: state.last_acked_tick,
                got: ack,
            });
        }
        state.last_acked_tick = ack;
        Some(AckOutcome::Updated)
    }

    /// True when `seq` was already accepted (idempotent re-ack).
    pub fn is_duplicate_seq(&self, player_id: &str, seq: u64) -> bool {
        self.subscriber(player_id)
            .map(|s| seq <= s.state.lock().last_command_seq)
            .unwrap_or(false)
    }

    /// Record an accepted command sequence.
    pub fn record_command_seq(&self, player_id: &str, seq: u64) {
        if let Some(subscriber) = self.subscriber(player_id) {
            let mut state = subscriber.state.lock();
            state.last_command_seq = state.last_command_seq.max(seq);
        }
    }

    // -- heartbeats ----------------------------------------------------------

    /// Note a heartbeat arrival and store the measured round-trip.
    pub fn note_heartbeat(&self, player_id: &str, rtt_ms: u64) {
        if let Some(subscriber) = self.subscriber(player_id) {
            let mut state = subscriber.state.lock();
            state.last_heartbeat_at = Instant::now();
            state.missed_heartbeats = 0;
            state.rtt_ms = rtt_ms;
        }
    }

    /// One sweep of the heartbeat monitor: bump the miss counter of every
    /// quiet subscriber and return the ids that crossed `max_missed`.
    pub fn sweep_heartbeats(
        &self,
        now: Instant,
        interval: Duration,
        max_missed: u32,
    ) -> Vec<String> {
        let mut expired = Vec::new();
        for subscriber in self.snapshot() {
            let mut state = subscriber.state.lock();
            let quiet_for = now.duration_since(state.last_heartbeat_at);
            if quiet_for >= interval * (state.missed_heartbeats + 1) {
                state.missed_heartbeats += 1;
                if state.missed_heartbeats >= max_missed {
                    expired.push(subscriber.player_id.clone());
                }
            }
        }
        expired
    }

    // -- keyframe cadence / rate limit ---------------------------------------

    pub fn set_keyframe_interval(&self, player_id: &str, interval: u64) {
        if let Some(subscriber) = self.subscriber(player_id) {
            subscriber.state.lock().keyframe_interval = Some(interval.max(1));
        }
    }

    /// Returns true (and does not stamp) when the request violates the
    /// per-client rate limit; otherwise stamps the request time.
    pub fn keyframe_request_limited(&self, player_id: &str, min_interval: Duration) -> bool {
        let Some(subscriber) = self.subscriber(player_id) else {
            return false;
        };
        let mut state = subscriber.state.lock();
        let now = Instant::now();
        if let Some(last) = state.last_keyframe_request_at {
            if now.duration_since(last) < min_interval {
                return true;
            }
        }
        state.last_keyframe_request_at = Some(now);
        false
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> mpsc::Sender<String> {
        // Receivers are dropped in registry-only tests; sends would fail,
        // which none of these tests perform.
        mpsc::channel(8).0
    }

    #[test]
    fn duplicate_subscription_rejected() {
        let coordinator = Coordinator::new();
        coordinator.subscribe("player-1", channel()).unwrap();
        let err = coordinator.subscribe("player-1", channel()).unwrap_err();
        assert!(matches!(err, SubscribeError::Duplicate { .. }));
        assert_eq!(coordinator.subscriber_count(), 1);
    }

    #[test]
    fn unsubscribe_frees_the_id() {
        let coordinator = Coordinator::new();
        coordinator.subscribe("player-1", channel()).unwrap();
        assert!(coordinator.unsubscribe("player-1"));
        assert!(!coordinator.unsubscribe("player-1"));
        coordinator.subscribe("player-1", channel()).unwrap();
    }

    #[test]
    fn ack_regression_is_reported_and_ignored() {
        let coordinator = Coordinator::new();
        coordinator.subscribe("player-1", channel()).unwrap();

        assert_eq!(
            coordinator.record_ack("player-1", 10),
            Some(AckOutcome::Updated)
        );
        assert_eq!(
            coordinator.record_ack("player-1", 7),
            Some(AckOutcome::Regressed { last: 10, got: 7 })
        );
        // State unchanged by the regression.
        let subscriber = coordinator.subscriber("player-1").unwrap();
        assert_eq!(subscriber.state.lock().last_acked_tick, 10);
    }

    #[test]
    fn seq_dedupe_tracks_the_high_water_mark() {
        let coordinator = Coordinator::new();
        coordinator.subscribe("player-1", channel()).unwrap();

        assert!(!coordinator.is_duplicate_seq("player-1", 1));
        coordinator.record_command_seq("player-1", 1);
        assert!(coordinator.is_duplicate_seq("player-1", 1));
        assert!(!coordinator.is_duplicate_seq("player-1", 2));

        // Out-of-order accepted seq does not lower the mark.
        coordinator.record_command_seq("player-1", 5);
        coordinator.record_command_seq("player-1", 3);
        assert!(coordinator.is_duplicate_seq("player-1", 5));
    }

    #[test]
    fn heartbeat_sweep_counts_and_expires() {
        let coordinator = Coordinator::new();
        coordinator.subscribe("player-1", channel()).unwrap();
        let interval = Duration::from_millis(100);

        let start = Instant::now();
        // Quiet for three intervals: misses accumulate one per sweep.
        assert!(coordinator
            .sweep_heartbeats(start + Duration::from_millis(150), interval, 3)
            .is_empty());
        assert!(coordinator
            .sweep_heartbeats(start + Duration::from_millis(250), interval, 3)
            .is_empty());
        let expired =
            coordinator.sweep_heartbeats(start + Duration::from_millis(350), interval, 3);
        assert_eq!(expired, vec!["player-1".to_owned()]);
    }

    #[test]
    fn heartbeat_arrival_resets_misses() {
        let coordinator = Coordinator::new();
        coordinator.subscribe("player-1", channel()).unwrap();
        let interval = Duration::from_millis(100);
        let start = Instant::now();

        coordinator.sweep_heartbeats(start + Duration::from_millis(150), interval, 3);
        coordinator.note_heartbeat("player-1", 42);

        let subscriber = coordinator.subscriber("player-1").unwrap();
        let state = subscriber.state.lock();
        assert_eq!(state.missed_heartbeats, 0);
        assert_eq!(state.rtt_ms, 42);
    }

    #[test]
    fn keyframe_rate_limit() {
        let coordinator = Coordinator::new();
        coordinator.subscribe("player-1", channel()).unwrap();
        let min = Duration::from_millis(250);

        assert!(!coordinator.keyframe_request_limited("player-1", min));
        assert!(coordinator.keyframe_request_limited("player-1", min));
    }
}
