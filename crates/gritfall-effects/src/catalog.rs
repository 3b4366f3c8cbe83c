//! The effect catalog: designer-authored entries over contracts.
//!
//! Entries are data, not code. Each names a contract, the client-side
//! renderer (`js_effect`), and a parameter bag. The server validates every
//! entry's contract against the registry at load and exposes a stable
//! content hash so clients can detect catalog drift and request a resync.
//!
//! `managed_by_client` is advisory presentation metadata: the server stays
//! authoritative for such entries, validating contracts and emitting end
//! events exactly as for any other entry.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::contract::{
    ContractRegistry, CONTRACT_MELEE_SWEEP, CONTRACT_PROJECTILE_BOLT, CONTRACT_STATUS_GLOW,
};
use crate::EffectError;

/// Entry ids of the built-in catalog.
pub const ENTRY_ATTACK: &str = "attack";
pub const ENTRY_FIREBALL: &str = "fireball";
pub const ENTRY_RAY_OF_FROST: &str = "ray-of-frost";
pub const ENTRY_BURNING_AURA: &str = "burning-aura";

// ---------------------------------------------------------------------------
// CatalogEntry
// ---------------------------------------------------------------------------

/// One designer-authored composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub contract_id: String,
    /// Name of the client-side effect implementation.
    pub js_effect: String,
    /// Presentation and tuning parameters, sorted for stable marshaling.
    pub parameters: BTreeMap<String, serde_json::Value>,
    pub managed_by_client: bool,
}

impl CatalogEntry {
    /// Numeric parameter lookup with a default.
    pub fn number(&self, key: &str, default: f64) -> f64 {
        self.parameters
            .get(key)
            .and_then(serde_json::Value::as_f64)
            .unwrap_or(default)
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// The full entry map, keyed by entry id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub entries: BTreeMap<String, CatalogEntry>,
}

/// A catalog copy plus its content hash, as shipped to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSnapshot {
    pub entries: BTreeMap<String, CatalogEntry>,
    pub hash: String,
}

impl Catalog {
    pub fn get(&self, entry_id: &str) -> Option<&CatalogEntry> {
        self.entries.get(entry_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Verify that every entry references a registered contract.
    pub fn validate(&self, registry: &ContractRegistry) -> Result<(), EffectError> {
        for (entry_id, entry) in &self.entries {
            if !registry.contains(&entry.contract_id) {
                return Err(EffectError::UnknownContract {
                    entry: entry_id.clone(),
                    contract: entry.contract_id.clone(),
                });
            }
        }
        Ok(())
    }

    /// BLAKE3 hex digest of the canonical JSON form. `BTreeMap` keys make
    /// the serialization order-stable, so equal catalogs hash equally.
    pub fn hash(&self) -> String {
        let bytes = serde_json::to_vec(&self.entries)
            .expect("catalog entries are always JSON-serializable");
        blake3::hash(&bytes).to_hex().to_string()
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        CatalogSnapshot {
            entries: self.entries.clone(),
            hash: self.hash(),
        }
    }

    /// The built-in entry set.
    pub fn builtin() -> Self {
        let mut entries = BTreeMap::new();

        entries.insert(
            ENTRY_ATTACK.to_owned(),
            CatalogEntry {
                contract_id: CONTRACT_MELEE_SWEEP.to_owned(),
                js_effect: "melee-arc".to_owned(),
                parameters: BTreeMap::from([
                    ("damage".to_owned(), json!(10)),
                    ("reach".to_owned(), json!(36.0)),
                    ("width".to_owned(), json!(44.0)),
                ]),
                managed_by_client: false,
            },
        );
        entries.insert(
            ENTRY_FIREBALL.to_owned(),
            CatalogEntry {
                contract_id: CONTRACT_PROJECTILE_BOLT.to_owned(),
                js_effect: "fireball".to_owned(),
                parameters: BTreeMap::from([
                    ("damage".to_owned(), json!(18)),
                    ("speed".to_owned(), json!(260.0)),
                    ("range".to_owned(), json!(320.0)),
                    ("radius".to_owned(), json!(10.0)),
                ]),
                managed_by_client: false,
            },
        );
        entries.insert(
            ENTRY_RAY_OF_FROST.to_owned(),
            CatalogEntry {
                contract_id: CONTRACT_PROJECTILE_BOLT.to_owned(),
                js_effect: "frost-ray".to_owned(),
                parameters: BTreeMap::from([
                    ("damage".to_owned(), json!(9)),
                    ("speed".to_owned(), json!(200.0)),
                    ("range".to_owned(), json!(280.0)),
                    ("radius".to_owned(), json!(8.0)),
                ]),
                managed_by_client: false,
            },
        );
        entries.insert(
            ENTRY_BURNING_AURA.to_owned(),
            CatalogEntry {
                contract_id: CONTRACT_STATUS_GLOW.to_owned(),
                js_effect: "flame-aura".to_owned(),
                parameters: BTreeMap::from([("radius".to_owned(), json!(16.0))]),
                managed_by_client: true,
            },
        );

        Self { entries }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
