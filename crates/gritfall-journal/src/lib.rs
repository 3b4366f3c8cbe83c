//! Gritfall journal -- the replication memory between simulation and
//! broadcast.
//!
//! Three buffers with one owner each tick:
//!
//! - [`patches::PatchBuffer`] -- per-entity diffs, coalesced and drained
//!   into state frames;
//! - [`events::EffectEventLog`] -- effect lifecycle events with
//!   per-instance sequence cursors and a resync-hint detector;
//! - [`keyframes::KeyframeStore`] -- full snapshots with a bounded
//!   retention window for client recovery.
//!
//! The [`Journal`] facade bundles them behind the lock the server wraps
//! around the whole thing, and adds the patch-batch checksum used by
//! determinism tests.

#![deny(unsafe_code)]

pub mod events;
pub mod keyframes;
pub mod patches;

use std::time::{Duration, Instant};

use gritfall_effects::catalog::CatalogSnapshot;
use gritfall_effects::event::EffectEvent;
use gritfall_world::patch::Patch;
use gritfall_world::snapshot::WorldSnapshot;

use events::{EffectEventBatch, EffectEventLog, ResyncDetectorConfig, ResyncHint};
use keyframes::{Keyframe, KeyframeStore};
use patches::PatchBuffer;

pub use patches::patch_checksum;

// ---------------------------------------------------------------------------
// JournalConfig
// ---------------------------------------------------------------------------

/// Retention and detection tuning.
#[derive(Debug, Clone, Copy)]
pub struct JournalConfig {
    pub keyframe_capacity: usize,
    pub keyframe_max_age: Duration,
    pub resync: ResyncDetectorConfig,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            keyframe_capacity: 8,
            keyframe_max_age: Duration::from_secs(5),
            resync: ResyncDetectorConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Journal
// ---------------------------------------------------------------------------

/// The combined replication journal.
#[derive(Debug)]
pub struct Journal {
    patches: PatchBuffer,
    events: EffectEventLog,
    keyframes: KeyframeStore,
}

impl Journal {
    pub fn new(config: JournalConfig) -> Self {
        Self {
            patches: PatchBuffer::new(),
            events: EffectEventLog::new(config.resync),
            keyframes: KeyframeStore::new(config.keyframe_capacity, config.keyframe_max_age),
        }
    }

    // -- per-tick recording -------------------------------------------------

    /// Record one tick's output: the world's patches and the effect
    /// manager's lifecycle events.
    pub fn record_tick(&mut self, patches: Vec<Patch>, events: Vec<EffectEvent>) {
        self.patches.append_all(patches);
        self.events.record_all(events);
    }

    /// Drop everything referencing a removed entity.
    pub fn purge_entity(&mut self, entity_id: &str) {
        self.patches.purge_entity(entity_id);
    }

    // -- patches --------------------------------------------------------------

    pub fn drain_patches(&mut self) -> Vec<Patch> {
        self.patches.drain()
    }

    pub fn snapshot_patches(&self) -> Vec<Patch> {
        self.patches.snapshot()
    }

    pub fn restore_patches(&mut self, batch: Vec<Patch>) {
        self.patches.restore(batch);
    }

    // -- effect events --------------------------------------------------------

    pub fn drain_events(&mut self) -> EffectEventBatch {
        self.events.drain()
    }

    pub fn snapshot_events(&self) -> EffectEventBatch {
        self.events.snapshot()
    }

    pub fn restore_events(&mut self, batch: EffectEventBatch) {
        self.events.restore(batch);
    }

    pub fn effect_seq_cursors(&self) -> std::collections::BTreeMap<u64, u64> {
        self.events.seq_cursors()
    }

    pub fn consume_resync_hint(&mut self, now_tick: u64) -> Option<ResyncHint> {
        self.events.consume_resync_hint(now_tick)
    }

    // -- keyframes ------------------------------------------------------------

    pub fn record_keyframe(
        &mut self,
        tick: u64,
        world: WorldSnapshot,
        catalog: CatalogSnapshot,
    ) -> u64 {
        self.keyframes.record(tick, world, catalog, Instant::now())
    }

    pub fn keyframe_by_sequence(&self, sequence: u64) -> Option<&Keyframe> {
        self.keyframes.by_sequence(sequence)
    }

    pub fn keyframe_window(&self) -> (usize, u64, u64) {
        self.keyframes.window()
    }

    pub fn latest_keyframe(&self) -> Option<&Keyframe> {
        self.keyframes.latest()
    }

    pub fn last_keyframe_sequence(&self) -> u64 {
        self.keyframes.last_sequence()
    }
}

impl Default for Journal {
    fn default() -> Self {
        Self::new(JournalConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
