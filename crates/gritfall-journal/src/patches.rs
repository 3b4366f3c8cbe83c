//! The per-tick patch buffer.
//!
//! Append-only within a tick, drained when the coordinator broadcasts.
//! Appending is idempotent-by-effect: a patch identical to the last
//! buffered patch for the same `(kind, entity)` is coalesced instead of
//! duplicated. `restore` exists for the backpressure path -- when a send
//! fails after a drain, the batch is pushed back at the head so the next
//! frame re-emits it.

use gritfall_world::patch::Patch;

/// Buffered patches awaiting broadcast.
#[derive(Debug, Clone, Default)]
pub struct PatchBuffer {
    entries: Vec<Patch>,
}

impl PatchBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a patch, coalescing with the last entry when it has the
    /// same kind, same entity, and an identical payload.
    pub fn append(&mut self, patch: Patch) {
        if let Some(last) = self.entries.last() {
            if last.kind() == patch.kind()
                && last.entity_id() == patch.entity_id()
                && *last == patch
            {
                // Identical to the latest entry; keep the newer value.
                *self.entries.last_mut().expect("non-empty") = patch;
                return;
            }
        }
        self.entries.push(patch);
    }

    /// Append a whole batch in order.
    pub fn append_all(&mut self, patches: impl IntoIterator<Item = Patch>) {
        for patch in patches {
            self.append(patch);
        }
    }

    /// Drop every entry mentioning `entity_id`.
    pub fn purge_entity(&mut self, entity_id: &str) {
        self.entries.retain(|p| p.entity_id() != entity_id);
    }

    /// Return and clear all buffered patches.
    pub fn drain(&mut self) -> Vec<Patch> {
        std::mem::take(&mut self.entries)
    }

    /// Copy without clearing.
    pub fn snapshot(&self) -> Vec<Patch> {
        self.entries.clone()
    }

    /// Re-insert a previously drained batch at the head, ahead of
    /// anything buffered since.
    pub fn restore(&mut self, batch: Vec<Patch>) {
        if batch.is_empty() {
            return;
        }
        let tail = std::mem::take(&mut self.entries);
        self.entries = batch;
        self.entries.extend(tail);
    }
}

/// BLAKE3 hex digest of a patch batch in canonical JSON form. Two servers
/// that emitted the same patches produce the same digest.
pub fn patch_checksum(batch: &[Patch]) -> String {
    let bytes = serde_json::to_vec(batch).expect("patches are always JSON-serializable");
    blake3::hash(&bytes).to_hex().to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(id: &str, x: f64) -> Patch {
        Patch::PlayerPos {
            id: id.to_owned(),
            x,
            y: 0.0,
        }
    }

    #[test]
    fn identical_consecutive_patches_coalesce() {
        let mut buffer = PatchBuffer::new();
        buffer.append(pos("player-1", 5.0));
        buffer.append(pos("player-1", 5.0));
        assert_eq!(buffer.len(), 1);

        // Different payload appends.
        buffer.append(pos("player-1", 6.0));
        assert_eq!(buffer.len(), 2);

        // Same payload, different entity appends.
        buffer.append(pos("player-2", 6.0));
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn non_adjacent_duplicates_are_kept() {
        let mut buffer = PatchBuffer::new();
        buffer.append(pos("player-1", 5.0));
        buffer.append(pos("player-2", 1.0));
        buffer.append(pos("player-1", 5.0));
        // Only the *last* entry coalesces; interleaved history is ordered.
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn purge_drops_all_entries_for_entity() {
        let mut buffer = PatchBuffer::new();
        buffer.append(pos("player-1", 1.0));
        buffer.append(pos("player-2", 2.0));
        buffer.append(Patch::PlayerRemoved {
            id: "player-1".to_owned(),
        });
        buffer.purge_entity("player-1");

        let remaining = buffer.drain();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].entity_id(), "player-2");
    }

    #[test]
    fn drain_clears_and_snapshot_does_not() {
        let mut buffer = PatchBuffer::new();
        buffer.append(pos("player-1", 1.0));

        assert_eq!(buffer.snapshot().len(), 1);
        assert_eq!(buffer.len(), 1);

        let drained = buffer.drain();
        assert_eq!(drained.len(), 1);
        assert!(buffer.is_empty());
        // Post-drain snapshot is empty until a new patch arrives.
        assert!(buffer.snapshot().is_empty());

        buffer.append(pos("player-1", 2.0));
        assert_eq!(buffer.snapshot().len(), 1);
    }

    #[test]
    fn restore_reinserts_at_head() {
        let mut buffer = PatchBuffer::new();
        buffer.append(pos("player-1", 1.0));
        let batch = buffer.drain();

        // New traffic arrives while the send is failing.
        buffer.append(pos("player-2", 9.0));
        buffer.restore(batch);

        let drained = buffer.drain();
        assert_eq!(drained[0].entity_id(), "player-1");
        assert_eq!(drained[1].entity_id(), "player-2");
    }

    #[test]
    fn checksum_is_order_and_content_sensitive() {
        let a = vec![pos("player-1", 1.0), pos("player-2", 2.0)];
        let b = vec![pos("player-2", 2.0), pos("player-1", 1.0)];
        assert_eq!(patch_checksum(&a), patch_checksum(&a.clone()));
        assert_ne!(patch_checksum(&a), patch_checksum(&b));
        assert_ne!(patch_checksum(&a), patch_checksum(&a[..1].to_vec()));
    }
}
