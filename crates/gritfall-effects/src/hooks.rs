//! Built-in effect hooks.
//!
//! Hooks are plain function pointers over a [`HookCtx`]; a contract wires
//! them in at registration. Hooks read and damage the world directly but
//! report attack overlaps through the external impact callback so the
//! server can account for them outside the effect pipeline.

use rand_pcg::Pcg64;

use gritfall_world::world::World;

use crate::event::EndReason;
use crate::instance::EffectInstance;
use crate::manager::ImpactRecord;

/// Context handed to every hook invocation.
pub struct HookCtx<'a> {
    pub tick: u64,
    /// Fixed tick duration in seconds.
    pub dt: f64,
    pub instance: &'a mut EffectInstance,
    pub world: &'a mut World,
    /// The `effects` stream of the world's RNG tree.
    pub rng: &'a mut Pcg64,
    /// Attack-overlap callback, supplied by the simulation loop.
    pub impact: &'a mut dyn FnMut(ImpactRecord),
}

/// A contract hook.
pub type HookFn = fn(&mut HookCtx<'_>);

// ---------------------------------------------------------------------------
// Melee sweep
// ---------------------------------------------------------------------------

/// Spawn hook for melee arcs: damage lands exactly once, at spawn, on
/// everything overlapping the arc under the instance's impact policy.
pub fn melee_sweep_spawn(ctx: &mut HookCtx<'_>) {
    let source = ctx.instance.source_actor_id.clone();
    let exclude = source.as_deref().unwrap_or("");
    let rect = ctx.instance.geometry.bounds();

    for (victim, is_player) in ctx.world.actors_overlapping(&rect, exclude) {
        if !ctx.instance.may_hit(&victim) {
            continue;
        }
        let damage = ctx.instance.damage;
        ctx.world.apply_effect_damage(&victim, damage, source.as_deref());
        ctx.instance.telemetry.record(&victim, damage, ctx.tick);
        (ctx.impact)(ImpactRecord {
            effect: ctx.instance.id,
            entry: ctx.instance.entry_id.clone(),
            source: source.clone(),
            victim,
            victim_is_player: is_player,
            damage,
            tick: ctx.tick,
        });
    }
}

// ---------------------------------------------------------------------------
// Projectile
// ---------------------------------------------------------------------------

/// Tick hook for projectiles: integrates linear motion, then checks walls,
/// actor overlaps, and the travel budget, ending the instance with
/// `wall`, `hit`, or `range`.
pub fn projectile_tick(ctx: &mut HookCtx<'_>) {
    let step = ctx.instance.motion.velocity.scaled(ctx.dt);
    let step_len = step.length();
    let next = gritfall_world::geom::Vec2::new(
        ctx.instance.geometry.pos.x + step.x,
        ctx.instance.geometry.pos.y + step.y,
    );
    ctx.instance.geometry.pos = next;
    ctx.instance.motion.traveled += step_len;

    let rect = ctx.instance.geometry.bounds();

    // Walls stop the bolt before it can connect.
    if ctx.world.solid_rects().iter().any(|solid| rect.overlaps(solid)) {
        ctx.instance.pending_end = Some(EndReason::Wall);
        return;
    }

    let source = ctx.instance.source_actor_id.clone();
    let exclude = source.as_deref().unwrap_or("");
    for (victim, is_player) in ctx.world.actors_overlapping(&rect, exclude) {
        if !ctx.instance.may_hit(&victim) {
            continue;
        }
        let damage = ctx.instance.damage;
        ctx.world.apply_effect_damage(&victim, damage, source.as_deref());
        ctx.instance.telemetry.record(&victim, damage, ctx.tick);
        (ctx.impact)(ImpactRecord {
            effect: ctx.instance.id,
            entry: ctx.instance.entry_id.clone(),
            source: source.clone(),
            victim,
            victim_is_player: is_player,
            damage,
            tick: ctx.tick,
        });
        // A bolt is consumed by its first connection.
        ctx.instance.pending_end = Some(EndReason::Hit);
        return;
    }

    if ctx.instance.motion.traveled >= ctx.instance.motion.max_range {
        ctx.instance.pending_end = Some(EndReason::Range);
    }
}

// ---------------------------------------------------------------------------
// Follow
// ---------------------------------------------------------------------------

/// Tick hook for attached visuals: mirror the followed actor's position,
/// or end with `owner-lost` when the actor is gone.
pub fn follow_tick(ctx: &mut HookCtx<'_>) {
    let Some(actor) = ctx.instance.attached_actor_id.clone() else {
        ctx.instance.pending_end = Some(EndReason::OwnerLost);
        return;
    };
    match ctx.world.actor_pos(&actor) {
        Some(pos) => ctx.instance.geometry.pos = pos,
        None => ctx.instance.pending_end = Some(EndReason::OwnerLost),
    }
}
