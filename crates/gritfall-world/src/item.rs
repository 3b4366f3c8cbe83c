//! Items, stacks, inventories, and fungibility keys.
//!
//! Stackable items are identified by a *fungibility key*: a canonical
//! string `type:tier:tag,tag,...` with tags sorted lexicographically, so
//! two stacks merge exactly when their keys match regardless of the order
//! the tags were supplied in.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ItemKind
// ---------------------------------------------------------------------------

/// The base type of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemKind {
    Gold,
    GoldOre,
    HealthPotion,
    RatPelt,
    GoblinEar,
    RustySword,
}

impl ItemKind {
    /// Stable wire name, matching the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gold => "gold",
            Self::GoldOre => "gold-ore",
            Self::HealthPotion => "health-potion",
            Self::RatPelt => "rat-pelt",
            Self::GoblinEar => "goblin-ear",
            Self::RustySword => "rusty-sword",
        }
    }
}

/// Build the canonical fungibility key for `(kind, tier, tags)`.
///
/// Tags are sorted lexicographically before joining, so the key is
/// independent of supply order.
pub fn fungibility_key(kind: ItemKind, tier: u8, tags: &[&str]) -> String {
    let mut sorted: Vec<&str> = tags.to_vec();
    sorted.sort_unstable();
    format!("{}:{}:{}", kind.as_str(), tier, sorted.join(","))
}

// ---------------------------------------------------------------------------
// ItemStack
// ---------------------------------------------------------------------------

/// A quantity of fungible items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemStack {
    /// Server-assigned stack id, unique per world lifetime.
    pub stack_id: u64,
    pub kind: ItemKind,
    /// Canonical fungibility key (see [`fungibility_key`]).
    pub key: String,
    /// Never zero in a live stack; zero-quantity stacks are removed.
    pub quantity: u32,
}

impl ItemStack {
    /// A plain (tier 0, untagged) stack of `kind`.
    pub fn plain(stack_id: u64, kind: ItemKind, quantity: u32) -> Self {
        Self {
            stack_id,
            kind,
            key: fungibility_key(kind, 0, &[]),
            quantity,
        }
    }
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

/// An ordered list of stacks. Slot order is observable (clients render
/// slots positionally), so merging targets the first matching key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    pub slots: Vec<ItemStack>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Add a stack, merging into the first slot with the same fungibility
    /// key. Returns the slot index the quantity landed in.
    pub fn add(&mut self, stack: ItemStack) -> usize {
        if let Some(idx) = self.slots.iter().position(|s| s.key == stack.key) {
            self.slots[idx].quantity += stack.quantity;
            idx
        } else {
            self.slots.push(stack);
            self.slots.len() - 1
        }
    }

    /// Remove up to `quantity` items with the given key. Returns the
    /// removed stack, or `None` if the key is absent. Partially drained
    /// slots keep their position; fully drained slots are removed.
    pub fn remove(&mut self, key: &str, quantity: u32) -> Option<ItemStack> {
        let idx = self.slots.iter().position(|s| s.key == key)?;
        let slot = &mut self.slots[idx];
        let taken = quantity.min(slot.quantity);
        let removed = ItemStack {
            stack_id: slot.stack_id,
            kind: slot.kind,
            key: slot.key.clone(),
            quantity: taken,
        };
        slot.quantity -= taken;
        if slot.quantity == 0 {
            self.slots.remove(idx);
        }
        Some(removed)
    }

    /// Total quantity across all slots with the given key.
    pub fn quantity_of(&self, key: &str) -> u32 {
        self.slots
            .iter()
            .filter(|s| s.key == key)
            .map(|s| s.quantity)
            .sum()
    }

    /// Deep copy. `ItemStack` owns all of its data, so a derive-style
    /// clone is already deep; this alias exists so call sites read as a
    /// snapshot operation.
    pub fn clone_slots(&self) -> Vec<ItemStack> {
        self.slots.clone()
    }
}

// ---------------------------------------------------------------------------
// Equipment
// ---------------------------------------------------------------------------

/// Equipment slot names. `BTreeMap`-keyed so marshaling is sorted and
/// deterministic.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum EquipSlot {
    MainHand,
    OffHand,
    Body,
}

/// Worn items, one stack per slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    pub slots: BTreeMap<EquipSlot, ItemStack>,
}

impl Equipment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Equip a stack, returning whatever previously occupied the slot.
    pub fn equip(&mut self, slot: EquipSlot, stack: ItemStack) -> Option<ItemStack> {
        self.slots.insert(slot, stack)
    }

    /// Deep copy of the slot map.
    pub fn clone_slots(&self) -> BTreeMap<EquipSlot, ItemStack> {
        self.slots.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- fungibility keys ---------------------------------------------------

    #[test]
    fn fungibility_key_sorts_tags() {
        let a = fungibility_key(ItemKind::RustySword, 2, &["sharp", "cursed"]);
        let b = fungibility_key(ItemKind::RustySword, 2, &["cursed", "sharp"]);
        assert_eq!(a, b);
        assert_eq!(a, "rusty-sword:2:cursed,sharp");
    }

    #[test]
    fn fungibility_key_tier_and_tags_distinguish() {
        let base = fungibility_key(ItemKind::Gold, 0, &[]);
        assert_eq!(base, "gold:0:");
        assert_ne!(base, fungibility_key(ItemKind::Gold, 1, &[]));
        assert_ne!(base, fungibility_key(ItemKind::Gold, 0, &["blessed"]));
    }

    proptest::proptest! {
        #[test]
        fn fungibility_key_order_independent(mut tags in proptest::collection::vec("[a-z]{1,6}", 0..6)) {
            let forward = fungibility_key(ItemKind::RatPelt, 1, &tags.iter().map(String::as_str).collect::<Vec<_>>());
            tags.reverse();
            let reversed = fungibility_key(ItemKind::RatPelt, 1, &tags.iter().map(String::as_str).collect::<Vec<_>>());
            proptest::prop_assert_eq!(forward, reversed);
        }
    }

    // -- inventory ----------------------------------------------------------

    #[test]
    fn add_merges_matching_keys() {
        let mut inv = Inventory::new();
        inv.add(ItemStack::plain(1, ItemKind::Gold, 5));
        inv.add(ItemStack::plain(2, ItemKind::RatPelt, 1));
        let idx = inv.add(ItemStack::plain(3, ItemKind::Gold, 7));

        assert_eq!(idx, 0);
        assert_eq!(inv.slots.len(), 2);
        assert_eq!(inv.slots[0].quantity, 12);
    }

    #[test]
    fn remove_partial_and_full() {
        let mut inv = Inventory::new();
        inv.add(ItemStack::plain(1, ItemKind::Gold, 10));
        let key = fungibility_key(ItemKind::Gold, 0, &[]);

        let taken = inv.remove(&key, 4).unwrap();
        assert_eq!(taken.quantity, 4);
        assert_eq!(inv.quantity_of(&key), 6);

        // Removing more than remains drains the slot.
        let rest = inv.remove(&key, 100).unwrap();
        assert_eq!(rest.quantity, 6);
        assert!(inv.is_empty());
        assert!(inv.remove(&key, 1).is_none());
    }

    #[test]
    fn clone_slots_is_deep() {
        let mut inv = Inventory::new();
        inv.add(ItemStack::plain(1, ItemKind::Gold, 5));

        let mut cloned = inv.clone_slots();
        cloned[0].quantity = 999;

        assert_eq!(inv.slots[0].quantity, 5, "mutating the clone must not touch the original");
    }

    // -- equipment ----------------------------------------------------------

    #[test]
    fn equip_returns_previous_occupant() {
        let mut eq = Equipment::new();
        assert!(eq
            .equip(EquipSlot::MainHand, ItemStack::plain(1, ItemKind::RustySword, 1))
            .is_none());
        let prev = eq
            .equip(EquipSlot::MainHand, ItemStack::plain(2, ItemKind::RustySword, 1))
            .unwrap();
        assert_eq!(prev.stack_id, 1);
    }

    #[test]
    fn equipment_clone_is_deep() {
        let mut eq = Equipment::new();
        eq.equip(EquipSlot::Body, ItemStack::plain(7, ItemKind::RatPelt, 2));

        let mut cloned = eq.clone_slots();
        cloned.get_mut(&EquipSlot::Body).unwrap().quantity = 0;

        assert_eq!(eq.slots[&EquipSlot::Body].quantity, 2);
    }

    #[test]
    fn equipment_serializes_with_sorted_slots() {
        let mut eq = Equipment::new();
        eq.equip(EquipSlot::OffHand, ItemStack::plain(1, ItemKind::RustySword, 1));
        eq.equip(EquipSlot::Body, ItemStack::plain(2, ItemKind::RatPelt, 1));
        let json = serde_json::to_string(&eq.slots).unwrap();
        // BTreeMap ordering: body before off-hand.
        let body_at = json.find("body").unwrap();
        let off_at = json.find("off-hand").unwrap();
        assert!(body_at < off_at);
    }
}
