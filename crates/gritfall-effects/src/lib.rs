//! Gritfall effects -- the contract-driven timed-effect pipeline.
//!
//! Effects are the server's moving parts that are not actors: projectiles,
//! melee sweeps, attached status visuals. Every effect is an instance of a
//! *contract* -- a registered [`contract::Definition`] that fixes delivery,
//! shape, motion, impact policy, hooks, replication flags, and end policy.
//! Designers compose *catalog entries* on top of contracts
//! ([`catalog::Catalog`]): an entry names a contract and supplies
//! presentation parameters; many entries may share one contract.
//!
//! Lifecycle per tick, in stable order:
//!
//! 1. queued [`intent::EffectIntent`]s spawn new instances (`on_spawn`
//!    hook, `Spawn` event with per-instance `seq = 1`);
//! 2. live instances advance motion and run `on_tick` at their cadence
//!    (`Update` events, seq strictly increasing);
//! 3. end conditions are evaluated in priority order and ending instances
//!    emit a single `End` event carrying the classified reason.
//!
//! Per-instance sequence numbers are monotonic for the life of the
//! instance, and instance ids are never reused for the life of the server.

#![deny(unsafe_code)]

pub mod catalog;
pub mod contract;
pub mod event;
pub mod geometry;
pub mod hooks;
pub mod instance;
pub mod intent;
pub mod manager;
pub mod spatial;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised while loading or validating effect definitions.
#[derive(Debug, thiserror::Error)]
pub enum EffectError {
    /// A catalog entry references a contract the registry does not know.
    #[error("catalog entry '{entry}' references unknown contract '{contract}'")]
    UnknownContract { entry: String, contract: String },

    /// An intent referenced a catalog entry that does not exist.
    #[error("no catalog entry named '{entry}'")]
    UnknownEntry { entry: String },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::catalog::{Catalog, CatalogEntry, CatalogSnapshot};
    pub use crate::contract::{
        ContractRegistry, Definition, Delivery, EndPolicyKind, ImpactPolicy, Motion, Replication,
        Shape,
    };
    pub use crate::event::{EffectEnded, EffectEvent, EffectSpawned, EffectUpdated, EndReason};
    pub use crate::instance::EffectInstance;
    pub use crate::intent::EffectIntent;
    pub use crate::manager::{EffectManager, EffectSinks, ImpactRecord, NullSinks, ParityRecord};
    pub use crate::EffectError;
}
