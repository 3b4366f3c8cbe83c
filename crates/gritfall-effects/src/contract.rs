//! Contract definitions: the server-authoritative schemas behind effects.
//!
//! A [`Definition`] fixes everything about a family of effects that the
//! client must never be allowed to decide: how it is delivered, how it
//! moves, whether and how often it deals impact, which hooks run, which
//! lifecycle events are replicated, and how it ends. Catalog entries can
//! only select a contract and tune presentation parameters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::hooks::{self, HookFn};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// How the effect reaches the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    Area,
    Target,
    Visual,
    Projectile,
}

/// Geometric footprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Rect,
    Circle,
}

/// How the instance moves after spawning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Motion {
    None,
    Instant,
    Linear,
    Follow,
}

/// Deduplication policy for impact recording. Required on every
/// definition; there is deliberately no default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImpactPolicy {
    /// Each victim is hit at most once over the instance's lifetime.
    FirstHit,
    /// A victim can be hit again on every tick it overlaps.
    EveryTick,
    /// The effect never deals impact.
    None,
}

/// The primary automatic end condition for a contract. Duration always
/// applies as the lowest-priority fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndPolicyKind {
    Duration,
    Cancel,
    OwnerDeath,
    OwnerLost,
    ZoneChange,
    Explicit,
}

/// Which lifecycle events are replicated to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Replication {
    pub send_spawn: bool,
    pub send_updates: bool,
    pub send_end: bool,
}

/// Hook set for a contract. Any hook may be absent.
#[derive(Clone, Copy, Default)]
pub struct Hooks {
    pub on_spawn: Option<HookFn>,
    pub on_tick: Option<HookFn>,
    pub on_end: Option<HookFn>,
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("on_spawn", &self.on_spawn.is_some())
            .field("on_tick", &self.on_tick.is_some())
            .field("on_end", &self.on_end.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Definition
// ---------------------------------------------------------------------------

/// One registered contract.
#[derive(Debug, Clone)]
pub struct Definition {
    /// Numeric id replicated in spawn events.
    pub type_id: u16,
    pub delivery: Delivery,
    pub shape: Shape,
    pub motion: Motion,
    pub impact_policy: ImpactPolicy,
    /// Default lifetime in ticks; intents may override it.
    pub lifetime_ticks: u64,
    pub hooks: Hooks,
    pub replication: Replication,
    pub end_policy: EndPolicyKind,
}

// ---------------------------------------------------------------------------
// ContractRegistry
// ---------------------------------------------------------------------------

/// Contract ids of the built-in registry.
pub const CONTRACT_MELEE_SWEEP: &str = "melee-sweep";
pub const CONTRACT_PROJECTILE_BOLT: &str = "projectile-bolt";
pub const CONTRACT_STATUS_GLOW: &str = "status-glow";

/// The static table of contracts, keyed by contract id.
#[derive(Debug, Clone, Default)]
pub struct ContractRegistry {
    definitions: BTreeMap<String, Definition>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition. Panics on duplicate ids -- the registry is
    /// built once at startup from static data, so a duplicate is a
    /// programming error, not a runtime condition.
    pub fn register(&mut self, contract_id: &str, definition: Definition) {
        let prev = self.definitions.insert(contract_id.to_owned(), definition);
        assert!(prev.is_none(), "duplicate contract id: {contract_id:?}");
    }

    pub fn get(&self, contract_id: &str) -> Option<&Definition> {
        self.definitions.get(contract_id)
    }

    pub fn contains(&self, contract_id: &str) -> bool {
        self.definitions.contains_key(contract_id)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// The built-in contract set.
    pub fn builtin() -> Self {
        let mut registry = Self::new();

        // Short-lived melee arc in front of the attacker. Damage lands in
        // the spawn hook; no per-tick behavior. The arc's life is tied to
        // its attacker: if the attacker vanishes mid-swing the arc ends
        // with `owner-death` instead of running out its duration.
        registry.register(
            CONTRACT_MELEE_SWEEP,
            Definition {
                type_id: 1,
                delivery: Delivery::Area,
                shape: Shape::Rect,
                motion: Motion::Instant,
                impact_policy: ImpactPolicy::FirstHit,
                lifetime_ticks: 3,
                hooks: Hooks {
                    on_spawn: Some(hooks::melee_sweep_spawn),
                    on_tick: None,
                    on_end: None,
                },
                replication: Replication {
                    send_spawn: true,
                    send_updates: false,
                    send_end: true,
                },
                end_policy: EndPolicyKind::OwnerDeath,
            },
        );

        // Straight-flying bolt. The tick hook integrates motion, tests
        // wall and actor overlaps, and ends the instance with
        // wall/range/hit.
        registry.register(
            CONTRACT_PROJECTILE_BOLT,
            Definition {
                type_id: 2,
                delivery: Delivery::Projectile,
                shape: Shape::Circle,
                motion: Motion::Linear,
                impact_policy: ImpactPolicy::FirstHit,
                lifetime_ticks: 90,
                hooks: Hooks {
                    on_spawn: None,
                    on_tick: Some(hooks::projectile_tick),
                    on_end: None,
                },
                replication: Replication {
                    send_spawn: true,
                    send_updates: true,
                    send_end: true,
                },
                end_policy: EndPolicyKind::Duration,
            },
        );

        // Visual attached to an actor (condition glow). Follows its owner
        // and ends when the owner disappears.
        registry.register(
            CONTRACT_STATUS_GLOW,
            Definition {
                type_id: 3,
                delivery: Delivery::Visual,
                shape: Shape::Circle,
                motion: Motion::Follow,
                impact_policy: ImpactPolicy::None,
                lifetime_ticks: 45,
                hooks: Hooks {
                    on_spawn: None,
                    on_tick: Some(hooks::follow_tick),
                    on_end: None,
                },
                replication: Replication {
                    send_spawn: true,
                    send_updates: false,
                    send_end: true,
                },
                end_policy: EndPolicyKind::OwnerLost,
            },
        );

        registry
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
