//! Ground items and the tile index that makes pickup queries cheap.
//!
//! The tile index is maintained alongside the item table; the invariant is
//! that the index at `(tx, ty)` lists exactly the ids of ground items whose
//! position falls inside that tile.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::geom::Vec2;
use crate::item::ItemStack;

// ---------------------------------------------------------------------------
// GroundItem
// ---------------------------------------------------------------------------

/// A stack of items lying on the ground.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundItem {
    pub id: String,
    pub stack: ItemStack,
    pub pos: Vec2,
}

// ---------------------------------------------------------------------------
// GroundItemTable
// ---------------------------------------------------------------------------

/// Ground items keyed by id plus a per-tile index.
///
/// The id map is a `BTreeMap` so iteration (and therefore snapshots and
/// patch emission order) is deterministic.
#[derive(Debug, Clone, Default)]
pub struct GroundItemTable {
    items: BTreeMap<String, GroundItem>,
    tiles: HashMap<(i32, i32), Vec<String>>,
}

impl GroundItemTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&GroundItem> {
        self.items.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut GroundItem> {
        self.items.get_mut(id)
    }

    /// Insert a ground item, indexing it under its tile.
    pub fn insert(&mut self, item: GroundItem) {
        let tile = item.pos.tile();
        self.tiles.entry(tile).or_default().push(item.id.clone());
        self.items.insert(item.id.clone(), item);
    }

    /// Remove an item, unindexing it. Returns the removed item.
    pub fn remove(&mut self, id: &str) -> Option<GroundItem> {
        let item = self.items.remove(id)?;
        let tile = item.pos.tile();
        if let Some(ids) = self.tiles.get_mut(&tile) {
            ids.retain(|i| i != id);
            if ids.is_empty() {
                self.tiles.remove(&tile);
            }
        }
        Some(item)
    }

    /// Ids of items on the given tile, in insertion order.
    pub fn ids_on_tile(&self, tile: (i32, i32)) -> &[String] {
        self.tiles.get(&tile).map_or(&[], Vec::as_slice)
    }

    /// Iterate all items in id order.
    pub fn iter(&self) -> impl Iterator<Item = &GroundItem> {
        self.items.values()
    }

    /// Deep copy of all items, in id order.
    pub fn clone_items(&self) -> Vec<GroundItem> {
        self.items.values().cloned().collect()
    }

    /// Clear everything (world reset).
    pub fn clear(&mut self) {
        self.items.clear();
        self.tiles.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
