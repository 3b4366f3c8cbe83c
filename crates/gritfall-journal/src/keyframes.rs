//! Keyframe retention.
//!
//! A keyframe is a full world snapshot plus the effect catalog, stamped
//! with a globally monotonic sequence number. The store keeps a bounded
//! window: at most `capacity` frames, none older than `max_age`. Clients
//! recover by requesting a sequence still inside the window; anything
//! below it has expired and forces a full resync instead.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use gritfall_effects::catalog::CatalogSnapshot;
use gritfall_world::snapshot::WorldSnapshot;

// ---------------------------------------------------------------------------
// Keyframe
// ---------------------------------------------------------------------------

/// One retained full snapshot.
#[derive(Debug, Clone)]
pub struct Keyframe {
    /// Globally monotonic sequence number.
    pub sequence: u64,
    /// Simulation tick the snapshot was taken at.
    pub tick: u64,
    /// Wall-clock capture time, for age-based eviction.
    pub recorded_at: Instant,
    pub world: WorldSnapshot,
    pub catalog: CatalogSnapshot,
}

// ---------------------------------------------------------------------------
// KeyframeStore
// ---------------------------------------------------------------------------

/// Bounded keyframe window. Frames are appended in sequence order, so the
/// deque front is always the lowest sequence.
#[derive(Debug)]
pub struct KeyframeStore {
    frames: VecDeque<Keyframe>,
    capacity: usize,
    max_age: Duration,
    next_sequence: u64,
}

impl KeyframeStore {
    pub fn new(capacity: usize, max_age: Duration) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
            max_age,
            next_sequence: 1,
        }
    }

    /// Record a new keyframe at `now`, evicting the lowest-sequence frame
    /// while either retention bound is exceeded. Returns the assigned
    /// sequence number.
    pub fn record(
        &mut self,
        tick: u64,
        world: WorldSnapshot,
        catalog: CatalogSnapshot,
        now: Instant,
    ) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.frames.push_back(Keyframe {
            sequence,
            tick,
            recorded_at: now,
            world,
            catalog,
        });
        self.evict(now);
        sequence
    }

    fn evict(&mut self, now: Instant) {
        while self.frames.len() > self.capacity {
            self.frames.pop_front();
        }
        while let Some(front) = self.frames.front() {
            if now.duration_since(front.recorded_at) > self.max_age && self.frames.len() > 1 {
                self.frames.pop_front();
            } else {
                break;
            }
        }
    }

    /// Look up a retained frame by sequence.
    pub fn by_sequence(&self, sequence: u64) -> Option<&Keyframe> {
        self.frames.iter().find(|f| f.sequence == sequence)
    }

    /// `(len, min_sequence, max_sequence)`; zeros when empty.
    pub fn window(&self) -> (usize, u64, u64) {
        match (self.frames.front(), self.frames.back()) {
            (Some(front), Some(back)) => (self.frames.len(), front.sequence, back.sequence),
            _ => (0, 0, 0),
        }
    }

    /// The most recent frame, if any.
    pub fn latest(&self) -> Option<&Keyframe> {
        self.frames.back()
    }

    /// Highest assigned sequence so far (0 before the first record).
    pub fn last_sequence(&self) -> u64 {
        self.next_sequence - 1
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
