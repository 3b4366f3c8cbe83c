//! The effect manager: intent queue, instance table, per-tick execution.
//!
//! Execution order within a tick is fixed and observable through event
//! sequence numbers:
//!
//! 1. **Spawns.** Queued intents are dequeued FIFO; each new instance gets
//!    the next globally-unique id, its `on_spawn` hook runs, and a `Spawn`
//!    event is emitted with `seq = 1`.
//! 2. **Updates.** Live instances advance in id (= insertion) order:
//!    follow motion is mirrored, `on_tick` runs at the instance's cadence,
//!    and an `Update` event is emitted when the contract replicates
//!    updates.
//! 3. **Ends.** End conditions are evaluated in priority order:
//!    explicit > owner-death > owner-lost > zone-change > duration. The
//!    ending instance runs `on_end`, emits a single `End` event with the
//!    classified reason, leaves the table and index, and flushes its hit
//!    telemetry as a parity record.

use std::collections::{BTreeMap, VecDeque};

use rand::Rng;
use rand_pcg::Pcg64;

use gritfall_world::condition::AttachedEffectDirective;
use gritfall_world::config::ACTOR_HALF;
use gritfall_world::geom::Vec2;
use gritfall_world::rng as world_rng;
use gritfall_world::world::World;

use crate::catalog::Catalog;
use crate::contract::{ContractRegistry, Delivery};
use crate::event::{EffectEnded, EffectEvent, EffectSpawned, EffectUpdated, EndReason};
use crate::geometry::{EffectGeometry, MotionState, QuantizedPos};
use crate::hooks::HookCtx;
use crate::instance::{EffectInstance, HitTelemetry};
use crate::intent::EffectIntent;
use crate::spatial::SpatialIndex;
use crate::EffectError;

// ---------------------------------------------------------------------------
// Sink types
// ---------------------------------------------------------------------------

/// One landed hit, reported through the external attack-overlap callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImpactRecord {
    pub effect: u64,
    pub entry: String,
    pub source: Option<String>,
    pub victim: String,
    pub victim_is_player: bool,
    pub damage: i32,
    pub tick: u64,
}

/// Aggregated per-instance telemetry, flushed when the instance ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParityRecord {
    pub effect: u64,
    pub entry: String,
    pub reason: EndReason,
    pub tick: u64,
    pub hit_count: u64,
    pub unique_victims: u64,
    pub damage_sum: i64,
    pub first_hit_tick: Option<u64>,
}

/// Where the manager reports impacts and parity records.
pub trait EffectSinks {
    fn impact(&mut self, record: ImpactRecord);
    fn parity(&mut self, record: ParityRecord);
}

/// Sink that discards everything; convenient in tests.
#[derive(Debug, Default)]
pub struct NullSinks;

impl EffectSinks for NullSinks {
    fn impact(&mut self, _record: ImpactRecord) {}
    fn parity(&mut self, _record: ParityRecord) {}
}

// ---------------------------------------------------------------------------
// EffectManager
// ---------------------------------------------------------------------------

/// Owns every live effect instance.
pub struct EffectManager {
    registry: ContractRegistry,
    catalog: Catalog,
    queued: VecDeque<(u64, EffectIntent)>,
    instances: BTreeMap<u64, EffectInstance>,
    index: SpatialIndex,
    rng: Pcg64,
    /// Monotonic id source; never reset for the life of the server.
    next_id: u64,
    /// Instances with an externally requested end, with the reason to use.
    requested_ends: BTreeMap<u64, EndReason>,
}

impl EffectManager {
    /// Build a manager over the given registry/catalog pair. Fails when a
    /// catalog entry references an unregistered contract.
    pub fn new(
        registry: ContractRegistry,
        catalog: Catalog,
        seed: &str,
    ) -> Result<Self, EffectError> {
        catalog.validate(&registry)?;
        Ok(Self {
            registry,
            catalog,
            queued: VecDeque::new(),
            instances: BTreeMap::new(),
            index: SpatialIndex::default(),
            rng: world_rng::stream(seed, "effects"),
            next_id: 1,
            requested_ends: BTreeMap::new(),
        })
    }

    /// Manager over the built-in registry and catalog.
    pub fn builtin(seed: &str) -> Self {
        Self::new(ContractRegistry::builtin(), Catalog::builtin(), seed)
            .expect("built-in catalog validates against built-in registry")
    }

    // -- accessors ----------------------------------------------------------

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn instance(&self, id: u64) -> Option<&EffectInstance> {
        self.instances.get(&id)
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn queued_count(&self) -> usize {
        self.queued.len()
    }

    /// Live instance ids, ascending.
    pub fn live_ids(&self) -> Vec<u64> {
        self.instances.keys().copied().collect()
    }

    // -- external control ---------------------------------------------------

    /// Queue an intent. The instance id is allocated immediately (so the
    /// caller can attach it to a condition) but the instance spawns on the
    /// next [`advance`](Self::advance).
    pub fn enqueue(&mut self, intent: EffectIntent) -> u64 {
        let id = self.alloc_id();
        self.queued.push_back((id, intent));
        id
    }

    /// Request a cancel; classified as `cancel` on the next advance.
    pub fn cancel(&mut self, id: u64) -> bool {
        if self.instances.contains_key(&id) || self.queued.iter().any(|(qid, _)| *qid == id) {
            self.requested_ends.entry(id).or_insert(EndReason::Cancel);
            true
        } else {
            false
        }
    }

    /// Request an explicit end; classified as `explicit`.
    pub fn request_end(&mut self, id: u64) -> bool {
        if self.instances.contains_key(&id) {
            self.requested_ends.insert(id, EndReason::Explicit);
            true
        } else {
            false
        }
    }

    /// Keep an instance alive at least `ticks` more ticks.
    pub fn extend(&mut self, id: u64, ticks: u64) {
        if let Some(instance) = self.instances.get_mut(&id) {
            instance.ticks_remaining = instance.ticks_remaining.max(ticks);
        }
    }

    /// Apply a condition directive from the world.
    pub fn apply_directive(&mut self, directive: AttachedEffectDirective) {
        match directive {
            AttachedEffectDirective::Extend { effect, ticks } => self.extend(effect, ticks),
            AttachedEffectDirective::End { effect } => {
                self.cancel(effect);
            }
        }
    }

    /// Drop all live instances and queued intents (world reset). Ids are
    /// not reset; they stay unique for the server's lifetime.
    pub fn clear(&mut self, seed: &str) {
        self.queued.clear();
        self.instances.clear();
        self.index = SpatialIndex::default();
        self.requested_ends.clear();
        self.rng = world_rng::stream(seed, "effects");
    }

    // -- per-tick execution -------------------------------------------------

    /// Run one tick of the pipeline. Returns the lifecycle events emitted
    /// this tick, in execution order.
    pub fn advance(
        &mut self,
        tick: u64,
        dt: f64,
        world: &mut World,
        sinks: &mut dyn EffectSinks,
    ) -> Vec<EffectEvent> {
        let mut events = Vec::new();
        self.spawn_phase(tick, world, sinks, &mut events);
        self.update_phase(tick, dt, world, sinks, &mut events);
        self.end_phase(tick, world, sinks, &mut events);
        events
    }

    fn spawn_phase(
        &mut self,
        tick: u64,
        world: &mut World,
        sinks: &mut dyn EffectSinks,
        events: &mut Vec<EffectEvent>,
    ) {
        let queued: Vec<(u64, EffectIntent)> = self.queued.drain(..).collect();
        for (id, intent) in queued {
            // Enqueue-then-cancel before the spawn tick: drop silently.
            if self.requested_ends.remove(&id).is_some() {
                continue;
            }
            let Some(mut instance) = self.build_instance(id, &intent, tick) else {
                continue;
            };

            // on_spawn hook.
            if let Some(hook) = self
                .registry
                .get(&instance.contract_id)
                .and_then(|d| d.hooks.on_spawn)
            {
                let mut impact_fn = |record: ImpactRecord| sinks.impact(record);
                let mut ctx = HookCtx {
                    tick,
                    dt: 0.0,
                    instance: &mut instance,
                    world: &mut *world,
                    rng: &mut self.rng,
                    impact: &mut impact_fn,
                };
                hook(&mut ctx);
            }

            let seq = instance.next_seq();
            debug_assert_eq!(seq, 1, "spawn must carry the first sequence number");
            if instance.replication.send_spawn {
                let entry = self
                    .catalog
                    .get(&instance.entry_id)
                    .expect("entry validated at build");
                events.push(EffectEvent::EffectSpawned(EffectSpawned {
                    id: instance.id,
                    entry: instance.entry_id.clone(),
                    contract: instance.contract_id.clone(),
                    type_id: instance.type_id,
                    seq,
                    tick,
                    source: instance.source_actor_id.clone(),
                    pos: QuantizedPos::from_pos(instance.geometry.pos),
                    q_half_w: gritfall_world::geom::quantize(instance.geometry.half_w),
                    q_half_h: gritfall_world::geom::quantize(instance.geometry.half_h),
                    params: entry.parameters.clone(),
                }));
            }

            self.index.place(instance.id, &instance.geometry.bounds());
            self.instances.insert(instance.id, instance);
        }
    }

    fn update_phase(
        &mut self,
        tick: u64,
        dt: f64,
        world: &mut World,
        sinks: &mut dyn EffectSinks,
        events: &mut Vec<EffectEvent>,
    ) {
        let ids: Vec<u64> = self.instances.keys().copied().collect();
        for id in ids {
            // Freshly spawned instances start updating next tick.
            if self.instances[&id].start_tick == tick {
                continue;
            }
            let mut instance = self.instances.remove(&id).expect("id snapshot");

            // Motion advances through the contract's tick hook (linear
            // integration for projectiles, position mirroring for follow
            // effects); the manager only schedules it.
            if instance.pending_end.is_none() && instance.cadence_due(tick) {
                if let Some(hook) = self
                    .registry
                    .get(&instance.contract_id)
                    .and_then(|d| d.hooks.on_tick)
                {
                    let mut impact_fn = |record: ImpactRecord| sinks.impact(record);
                    let mut ctx = HookCtx {
                        tick,
                        dt,
                        instance: &mut instance,
                        world: &mut *world,
                        rng: &mut self.rng,
                        impact: &mut impact_fn,
                    };
                    hook(&mut ctx);
                }
            }

            instance.ticks_remaining = instance.ticks_remaining.saturating_sub(1);
            self.index.place(id, &instance.geometry.bounds());

            if instance.replication.send_updates {
                let seq = instance.next_seq();
                events.push(EffectEvent::EffectUpdated(EffectUpdated {
                    id,
                    seq,
                    tick,
                    pos: QuantizedPos::from_pos(instance.geometry.pos),
                    ticks_remaining: instance.ticks_remaining,
                }));
            }

            self.instances.insert(id, instance);
        }
    }

    fn end_phase(
        &mut self,
        tick: u64,
        world: &mut World,
        sinks: &mut dyn EffectSinks,
        events: &mut Vec<EffectEvent>,
    ) {
        let bounds = (world.config().width_px(), world.config().height_px());
        let ids: Vec<u64> = self.instances.keys().copied().collect();

        for id in ids {
            let reason = {
                let instance = &self.instances[&id];
                self.classify_end(instance, bounds, world)
            };
            let Some(reason) = reason else {
                continue;
            };

            let mut instance = self.instances.remove(&id).expect("id snapshot");
            self.requested_ends.remove(&id);

            if let Some(hook) = self
                .registry
                .get(&instance.contract_id)
                .and_then(|d| d.hooks.on_end)
            {
                let mut impact_fn = |record: ImpactRecord| sinks.impact(record);
                let mut ctx = HookCtx {
                    tick,
                    dt: 0.0,
                    instance: &mut instance,
                    world: &mut *world,
                    rng: &mut self.rng,
                    impact: &mut impact_fn,
                };
                hook(&mut ctx);
            }

            let seq = instance.next_seq();
            if instance.replication.send_end {
                events.push(EffectEvent::EffectEnded(EffectEnded {
                    id,
                    seq,
                    tick,
                    reason,
                }));
            }

            self.index.remove(id);
            self.flush_parity(&instance, reason, tick, sinks);
        }
    }

    /// End-condition evaluation, in priority order:
    /// explicit > owner-death > owner-lost > zone-change > duration.
    fn classify_end(
        &self,
        instance: &EffectInstance,
        bounds: (f64, f64),
        world: &World,
    ) -> Option<EndReason> {
        // Explicit: a hook's pending end is the most specific signal;
        // external requests (cancel/explicit) come next.
        if let Some(reason) = instance.pending_end {
            return Some(reason);
        }
        if let Some(&reason) = self.requested_ends.get(&instance.id) {
            return Some(reason);
        }
        if let Some(source) = &instance.source_actor_id {
            if instance.end_policy == crate::contract::EndPolicyKind::OwnerDeath
                && world.actor_pos(source).is_none()
            {
                return Some(EndReason::OwnerDeath);
            }
        }
        if let Some(attached) = &instance.attached_actor_id {
            if world.actor_pos(attached).is_none() {
                return Some(EndReason::OwnerLost);
            }
        }
        let pos = instance.geometry.pos;
        if pos.x < 0.0 || pos.y < 0.0 || pos.x > bounds.0 || pos.y > bounds.1 {
            return Some(EndReason::ZoneChange);
        }
        if instance.ticks_remaining == 0 {
            return Some(EndReason::Duration);
        }
        None
    }

    fn flush_parity(
        &self,
        instance: &EffectInstance,
        reason: EndReason,
        tick: u64,
        sinks: &mut dyn EffectSinks,
    ) {
        let HitTelemetry {
            hit_count,
            victims,
            damage_sum,
            first_hit_tick,
        } = &instance.telemetry;
        sinks.parity(ParityRecord {
            effect: instance.id,
            entry: instance.entry_id.clone(),
            reason,
            tick,
            hit_count: *hit_count,
            unique_victims: victims.len() as u64,
            damage_sum: *damage_sum,
            first_hit_tick: *first_hit_tick,
        });
    }

    // -- construction helpers -----------------------------------------------

    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn build_instance(
        &mut self,
        id: u64,
        intent: &EffectIntent,
        tick: u64,
    ) -> Option<EffectInstance> {
        let Some(entry) = self.catalog.get(&intent.entry_id) else {
            tracing::warn!(entry = %intent.entry_id, "effect intent for unknown catalog entry");
            return None;
        };
        let Some(def) = self.registry.get(&entry.contract_id) else {
            tracing::warn!(
                entry = %intent.entry_id,
                contract = %entry.contract_id,
                "catalog entry references unknown contract"
            );
            return None;
        };

        let aim = intent.facing.vector();
        let (geometry, motion) = match def.delivery {
            Delivery::Area | Delivery::Target => {
                let reach = entry.number("reach", 36.0);
                let width = entry.number("width", 44.0);
                let center = Vec2::new(
                    intent.origin.x + aim.x * (ACTOR_HALF + reach / 2.0),
                    intent.origin.y + aim.y * (ACTOR_HALF + reach / 2.0),
                );
                // Orient the arc with the facing axis.
                let (half_w, half_h) = if aim.x != 0.0 {
                    (reach / 2.0, width / 2.0)
                } else {
                    (width / 2.0, reach / 2.0)
                };
                (EffectGeometry::rect(center, half_w, half_h), MotionState::default())
            }
            Delivery::Projectile => {
                let speed = entry.number("speed", 200.0);
                let range = entry.number("range", 280.0);
                let radius = entry.number("radius", 8.0);
                // Small aim jitter from the effects stream; reproducible
                // from the seed like every other random choice.
                let jitter = self.rng.gen_range(-0.03..0.03f64);
                let (sin, cos) = jitter.sin_cos();
                let velocity = Vec2::new(
                    (aim.x * cos - aim.y * sin) * speed,
                    (aim.x * sin + aim.y * cos) * speed,
                );
                let start = Vec2::new(
                    intent.origin.x + aim.x * (ACTOR_HALF + radius),
                    intent.origin.y + aim.y * (ACTOR_HALF + radius),
                );
                (
                    EffectGeometry::circle(start, radius),
                    MotionState {
                        velocity,
                        traveled: 0.0,
                        max_range: range,
                    },
                )
            }
            Delivery::Visual => {
                let radius = entry.number("radius", 16.0);
                (EffectGeometry::circle(intent.origin, radius), MotionState::default())
            }
        };

        Some(EffectInstance {
            id,
            entry_id: intent.entry_id.clone(),
            contract_id: entry.contract_id.clone(),
            type_id: def.type_id,
            start_tick: tick,
            geometry,
            motion_kind: def.motion,
            motion,
            delivery: def.delivery,
            impact_policy: def.impact_policy,
            attached_actor_id: intent.attach_to.clone(),
            source_actor_id: intent.source_actor_id.clone(),
            ticks_remaining: intent.lifetime_override.unwrap_or(def.lifetime_ticks),
            tick_cadence: intent.tick_cadence.max(1),
            seq: 0,
            replication: def.replication,
            end_policy: def.end_policy,
            damage: entry.number("damage", 0.0) as i32,
            telemetry: HitTelemetry::default(),
            pending_end: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
