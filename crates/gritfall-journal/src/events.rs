//! Effect-event buffering and resync-hint detection.
//!
//! Events are buffered per tick in three parallel lists (spawns, updates,
//! ends) and drained with the patches. The log also tracks the last
//! sequence number seen per instance -- both to expose per-instance
//! cursors to clients and to detect anomalies:
//!
//! - an update or end for an instance whose spawn was never recorded
//!   (a *missing spawn prefix*), and
//! - an event whose sequence number does not advance past the recorded
//!   cursor (a *stale sequence*).
//!
//! Either means the stream a client would reconstruct is unreliable.
//! Anomalies are counted in a sliding tick window; when the count crosses
//! the threshold, a one-shot resync hint is armed for the coordinator.

use std::collections::BTreeMap;

use gritfall_effects::event::{EffectEnded, EffectEvent, EffectSpawned, EffectUpdated};

// ---------------------------------------------------------------------------
// Config and batch types
// ---------------------------------------------------------------------------

/// Detector tuning.
#[derive(Debug, Clone, Copy)]
pub struct ResyncDetectorConfig {
    /// Sliding window length in ticks.
    pub window_ticks: u64,
    /// Anomaly count that arms the hint.
    pub threshold: u64,
}

impl Default for ResyncDetectorConfig {
    fn default() -> Self {
        Self {
            window_ticks: 75,
            threshold: 3,
        }
    }
}

/// A drained (or snapshotted) set of effect events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectEventBatch {
    pub spawns: Vec<EffectSpawned>,
    pub updates: Vec<EffectUpdated>,
    pub ends: Vec<EffectEnded>,
}

impl EffectEventBatch {
    pub fn is_empty(&self) -> bool {
        self.spawns.is_empty() && self.updates.is_empty() && self.ends.is_empty()
    }

    pub fn len(&self) -> usize {
        self.spawns.len() + self.updates.len() + self.ends.len()
    }
}

/// The armed hint returned by [`EffectEventLog::consume_resync_hint`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResyncHint {
    /// Dominant anomaly: `missing_spawn` or `stale_sequence`.
    pub reason: &'static str,
    pub missing_spawns: u64,
    pub stale_sequences: u64,
}

// ---------------------------------------------------------------------------
// EffectEventLog
// ---------------------------------------------------------------------------

/// Buffers lifecycle events between broadcasts.
#[derive(Debug, Default)]
pub struct EffectEventLog {
    batch: EffectEventBatch,
    /// Last sequence number recorded per instance id. Survives drains;
    /// entries are dropped when the instance ends.
    last_seq_by_id: BTreeMap<u64, u64>,
    config: ResyncDetectorConfig,
    /// Recent anomalies as `(tick, is_missing_spawn)`.
    anomalies: Vec<(u64, bool)>,
}

impl EffectEventLog {
    pub fn new(config: ResyncDetectorConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Record one event, updating cursors and anomaly counters.
    pub fn record(&mut self, event: EffectEvent) {
        let id = event.id();
        let seq = event.seq();
        let tick = event.tick();

        match &event {
            EffectEvent::EffectSpawned(_) => {}
            EffectEvent::EffectUpdated(_) | EffectEvent::EffectEnded(_) => {
                if !self.last_seq_by_id.contains_key(&id) {
                    self.anomalies.push((tick, true));
                    tracing::warn!(effect = id, seq, "lifecycle event without recorded spawn");
                }
            }
        }
        if let Some(&last) = self.last_seq_by_id.get(&id) {
            if seq <= last {
                self.anomalies.push((tick, false));
                tracing::warn!(effect = id, seq, last, "stale effect sequence");
            }
        }

        self.last_seq_by_id
            .entry(id)
            .and_modify(|cursor| *cursor = (*cursor).max(seq))
            .or_insert(seq);

        match event {
            EffectEvent::EffectSpawned(spawn) => self.batch.spawns.push(spawn),
            EffectEvent::EffectUpdated(update) => self.batch.updates.push(update),
            EffectEvent::EffectEnded(end) => {
                self.last_seq_by_id.remove(&end.id);
                self.batch.ends.push(end);
            }
        }
    }

    pub fn record_all(&mut self, events: impl IntoIterator<Item = EffectEvent>) {
        for event in events {
            self.record(event);
        }
    }

    /// Per-instance sequence cursors for live instances, ascending by id.
    pub fn seq_cursors(&self) -> BTreeMap<u64, u64> {
        self.last_seq_by_id.clone()
    }

    /// Return and clear the buffered batch. Cursors are kept.
    pub fn drain(&mut self) -> EffectEventBatch {
        std::mem::take(&mut self.batch)
    }

    /// Copy without clearing.
    pub fn snapshot(&self) -> EffectEventBatch {
        self.batch.clone()
    }

    /// Re-insert a drained batch ahead of anything buffered since.
    pub fn restore(&mut self, batch: EffectEventBatch) {
        let tail = std::mem::take(&mut self.batch);
        self.batch = batch;
        self.batch.spawns.extend(tail.spawns);
        self.batch.updates.extend(tail.updates);
        self.batch.ends.extend(tail.ends);
    }

    /// If the anomaly count within the window ending at `now_tick` has
    /// crossed the threshold, return the hint once and reset the window.
    pub fn consume_resync_hint(&mut self, now_tick: u64) -> Option<ResyncHint> {
        let window_start = now_tick.saturating_sub(self.config.window_ticks);
        self.anomalies.retain(|&(tick, _)| tick >= window_start);

        let total = self.anomalies.len() as u64;
        if total < self.config.threshold {
            return None;
        }

        let missing = self.anomalies.iter().filter(|&&(_, m)| m).count() as u64;
        let stale = total - missing;
        self.anomalies.clear();
        Some(ResyncHint {
            reason: if missing >= stale {
                "missing_spawn"
            } else {
                "stale_sequence"
            },
            missing_spawns: missing,
            stale_sequences: stale,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
