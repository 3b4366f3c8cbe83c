//! Full-state world snapshots.
//!
//! A snapshot is a deep copy of everything a client needs to render the
//! arena from scratch. Snapshots are taken copy-on-read -- the caller
//! clones under the world lock and serializes outside it.

use serde::{Deserialize, Serialize};

use crate::actor::{Npc, Player};
use crate::config::WorldConfig;
use crate::ground::GroundItem;
use crate::obstacle::Obstacle;

/// A complete, serializable copy of world state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldSnapshot {
    pub config: WorldConfig,
    pub players: Vec<Player>,
    pub npcs: Vec<Npc>,
    pub obstacles: Vec<Obstacle>,
    pub ground_items: Vec<GroundItem>,
}

impl WorldSnapshot {
    /// Stable content hash of the snapshot, for determinism checks.
    pub fn content_hash(&self) -> String {
        let bytes = serde_json::to_vec(self)
            .expect("world snapshot is always JSON-serializable");
        blake3::hash(&bytes).to_hex().to_string()
    }
}
