//! The authoritative world aggregate.
//!
//! All mutation happens through the methods here, under the server's single
//! coarse world lock, and every observable change follows the same shape:
//! validate, mutate, bump the actor's version, push a typed patch. The
//! pending patch list is drained by the simulation loop into the journal
//! once per tick.
//!
//! Randomness is drawn exclusively from labeled streams of the world's
//! [`RngTree`] (`world` for generation, `npc-ai` for wander targets,
//! `loot` for drop jitter), so a seed plus a command trace replays
//! bit-exactly.

use std::collections::{BTreeMap, HashSet};

use rand::Rng;

use crate::actor::{Facing, Npc, NpcArchetype, PathFollow, Player};
use crate::condition::{AttachedEffectDirective, Condition, ConditionKind};
use crate::config::{
    ResetRequest, WorldConfig, ACTION_ATTACK, ACTION_FIREBALL, ACTOR_HALF,
    ATTACK_COOLDOWN_TICKS, BURNING_DURATION_TICKS, BURNING_INTERVAL_TICKS,
    FIREBALL_COOLDOWN_TICKS, MINE_COOLDOWN_TICKS, NPC_WANDER_PERIOD_TICKS,
    PLAYER_MAX_HEALTH, PLAYER_SPEED, REGISTERED_ACTIONS,
};
use crate::geom::{Rect, Vec2, TILE_SIZE};
use crate::ground::{GroundItem, GroundItemTable};
use crate::item::{ItemKind, ItemStack};
use crate::movement::{self, clamp_to_bounds};
use crate::obstacle::{Obstacle, ObstacleKind};
use crate::patch::Patch;
use crate::path::{find_path, PathGrid};
use crate::rng::RngTree;
use crate::snapshot::WorldSnapshot;
use crate::{RejectReason, WorldError};

// ---------------------------------------------------------------------------
// Outcome types
// ---------------------------------------------------------------------------

/// A validated action the simulation loop should turn into an effect.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionTrigger {
    pub actor: String,
    pub action: String,
    pub pos: Vec2,
    pub facing: Facing,
}

/// A condition freshly applied this step that wants a visual effect
/// attached. The loop spawns the effect and calls
/// [`World::attach_condition_effect`] with the resulting id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionApplied {
    pub actor: String,
    pub kind: ConditionKind,
}

/// Result of a console command, echoed to the client as `console_ack`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConsoleOutcome {
    pub ok: bool,
    pub reason: Option<&'static str>,
    pub qty: Option<u32>,
    pub stack_id: Option<u64>,
    pub slot: Option<usize>,
}

impl ConsoleOutcome {
    fn rejected(reason: &'static str) -> Self {
        Self {
            ok: false,
            reason: Some(reason),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// The single source of truth for arena state.
#[derive(Debug)]
pub struct World {
    config: WorldConfig,
    rng: RngTree,
    tick: u64,
    players: BTreeMap<String, Player>,
    npcs: BTreeMap<String, Npc>,
    obstacles: Vec<Obstacle>,
    grid: PathGrid,
    ground_items: GroundItemTable,
    pending_patches: Vec<Patch>,
    pending_triggers: Vec<ActionTrigger>,
    next_npc_id: u64,
    next_item_id: u64,
    next_stack_id: u64,
    spawn_counter: u64,
}

impl World {
    /// Build a world from config, generating obstacles and NPCs from the
    /// seed's labeled streams.
    pub fn new(config: WorldConfig) -> Self {
        let mut world = Self {
            rng: RngTree::new(config.seed.clone()),
            grid: PathGrid::build(&config, &[]),
            config,
            tick: 0,
            players: BTreeMap::new(),
            npcs: BTreeMap::new(),
            obstacles: Vec::new(),
            ground_items: GroundItemTable::new(),
            pending_patches: Vec::new(),
            pending_triggers: Vec::new(),
            next_npc_id: 1,
            next_item_id: 1,
            next_stack_id: 1,
            spawn_counter: 0,
        };
        world.generate();
        world
    }

    /// Recreate the world from (possibly overridden) config. Connected
    /// players are respawned in place with fresh actors; everything else
    /// is regenerated from the new seed.
    pub fn reset(&mut self, request: &ResetRequest) {
        request.apply_to(&mut self.config);
        let player_ids: Vec<String> = self.players.keys().cloned().collect();

        self.rng = RngTree::new(self.config.seed.clone());
        self.players.clear();
        self.npcs.clear();
        self.obstacles.clear();
        self.ground_items.clear();
        self.pending_patches.clear();
        self.pending_triggers.clear();
        self.next_npc_id = 1;
        self.next_item_id = 1;
        self.next_stack_id = 1;
        self.spawn_counter = 0;

        self.generate();
        for id in player_ids {
            // Ids survive the reset; duplicates are impossible here.
            let _ = self.add_player(&id);
        }
    }

    // -- accessors ----------------------------------------------------------

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Set by the simulation loop at the start of each tick.
    pub fn set_tick(&mut self, tick: u64) {
        self.tick = tick;
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn has_player(&self, id: &str) -> bool {
        self.players.contains_key(id)
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn npc(&self, id: &str) -> Option<&Npc> {
        self.npcs.get(id)
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn ground_items(&self) -> &GroundItemTable {
        &self.ground_items
    }

    /// Rects of all solid obstacles, for movement and projectile checks.
    pub fn solid_rects(&self) -> Vec<Rect> {
        self.obstacles
            .iter()
            .filter(|o| o.kind.solid())
            .map(|o| o.rect)
            .collect()
    }

    /// Position of any live actor (player or NPC).
    pub fn actor_pos(&self, id: &str) -> Option<Vec2> {
        self.players
            .get(id)
            .map(|p| p.actor.pos)
            .or_else(|| self.npcs.get(id).map(|n| n.actor.pos))
    }

    /// Actors whose AABB overlaps `rect`, excluding `exclude`. Players
    /// first, then NPCs, each in id order.
    pub fn actors_overlapping(&self, rect: &Rect, exclude: &str) -> Vec<(String, bool)> {
        let mut hits = Vec::new();
        for (id, player) in &self.players {
            if id != exclude && Rect::centered(player.actor.pos, ACTOR_HALF, ACTOR_HALF).overlaps(rect) {
                hits.push((id.clone(), true));
            }
        }
        for (id, npc) in &self.npcs {
            if id != exclude && Rect::centered(npc.actor.pos, ACTOR_HALF, ACTOR_HALF).overlaps(rect) {
                hits.push((id.clone(), false));
            }
        }
        hits
    }

    /// Add an obstacle after generation (admin tooling and tests), keeping
    /// the pathing grid in sync.
    pub fn push_obstacle(&mut self, obstacle: Obstacle) {
        self.obstacles.push(obstacle);
        self.grid = PathGrid::build(&self.config, &self.obstacles);
    }

    /// Teleport an actor, emitting the position patch.
    pub fn set_actor_pos(&mut self, id: &str, pos: Vec2) -> Result<(), RejectReason> {
        if let Some(player) = self.players.get_mut(id) {
            player.actor.pos = pos;
            player.actor.bump_version();
            self.pending_patches.push(Patch::PlayerPos {
                id: id.to_owned(),
                x: pos.x,
                y: pos.y,
            });
            return Ok(());
        }
        if let Some(npc) = self.npcs.get_mut(id) {
            npc.actor.pos = pos;
            npc.actor.bump_version();
            self.pending_patches.push(Patch::NpcPos {
                id: id.to_owned(),
                x: pos.x,
                y: pos.y,
            });
            return Ok(());
        }
        Err(RejectReason::UnknownActor)
    }

    /// Deep snapshot for serialization outside the lock.
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            config: self.config.clone(),
            players: self.players.values().cloned().collect(),
            npcs: self.npcs.values().cloned().collect(),
            obstacles: self.obstacles.clone(),
            ground_items: self.ground_items.clone_items(),
        }
    }

    /// Drain the patches produced since the last drain.
    pub fn drain_patches(&mut self) -> Vec<Patch> {
        std::mem::take(&mut self.pending_patches)
    }

    /// Drain the action triggers produced since the last drain.
    pub fn drain_triggers(&mut self) -> Vec<ActionTrigger> {
        std::mem::take(&mut self.pending_triggers)
    }

    // -- players ------------------------------------------------------------

    /// Add a player at the next free spawn point.
    pub fn add_player(&mut self, id: &str) -> Result<(), WorldError> {
        if self.players.contains_key(id) {
            return Err(WorldError::DuplicatePlayer { id: id.to_owned() });
        }
        let pos = self.spawn_point();
        let mut player = Player::new(id, pos, PLAYER_MAX_HEALTH);
        player.actor.bump_version();
        self.pending_patches.push(Patch::PlayerPos {
            id: id.to_owned(),
            x: pos.x,
            y: pos.y,
        });
        player.actor.bump_version();
        self.pending_patches.push(Patch::PlayerHealth {
            id: id.to_owned(),
            health: player.actor.health,
            max_health: player.actor.max_health,
        });
        self.players.insert(id.to_owned(), player);
        Ok(())
    }

    /// Remove a player, emitting the removal patch. Returns whether the
    /// player existed. The caller is responsible for purging journal
    /// entries that reference the id.
    pub fn remove_player(&mut self, id: &str) -> bool {
        if self.players.remove(id).is_none() {
            return false;
        }
        self.pending_patches.push(Patch::PlayerRemoved { id: id.to_owned() });
        true
    }

    /// Update a player's movement intent. The vector is clamped to unit
    /// length; an unchanged intent (notably repeated zero vectors) does
    /// not advance the version or emit a patch.
    pub fn set_intent(
        &mut self,
        id: &str,
        dx: f64,
        dy: f64,
        facing: Option<Facing>,
    ) -> Result<(), RejectReason> {
        let player = self.players.get_mut(id).ok_or(RejectReason::UnknownActor)?;
        let intent = Vec2::new(dx, dy).clamp_to_unit();

        if intent != Vec2::ZERO && player.path.is_some() {
            player.path = None;
        }

        if intent != player.intent {
            player.intent = intent;
            player.actor.bump_version();
            self.pending_patches.push(Patch::PlayerIntent {
                id: id.to_owned(),
                dx: intent.x,
                dy: intent.y,
            });
        }

        if let Some(facing) = facing {
            if facing != player.actor.facing {
                player.actor.facing = facing;
                player.actor.bump_version();
                self.pending_patches.push(Patch::PlayerFacing {
                    id: id.to_owned(),
                    facing,
                });
            }
        }
        Ok(())
    }

    /// Plan and attach a path to `target`. Returns whether a path was
    /// found; an unreachable target leaves the player pathless.
    pub fn set_path(&mut self, id: &str, target: Vec2) -> Result<bool, RejectReason> {
        if !self.players.contains_key(id) {
            return Err(RejectReason::UnknownActor);
        }
        let occupied = self.occupied_tiles(id);
        let from = self.players[id].actor.pos;
        let waypoints = find_path(&self.grid, &occupied, from, target);

        let player = self.players.get_mut(id).expect("presence checked above");
        match waypoints {
            Some(waypoints) => {
                player.path = Some(PathFollow {
                    waypoints,
                    next: 0,
                    target,
                });
                player.intent = Vec2::ZERO;
                Ok(true)
            }
            None => {
                player.path = None;
                Ok(false)
            }
        }
    }

    /// Abandon the current path, if any.
    pub fn clear_path(&mut self, id: &str) -> Result<(), RejectReason> {
        let player = self.players.get_mut(id).ok_or(RejectReason::UnknownActor)?;
        player.path = None;
        Ok(())
    }

    /// Validate and trigger a named action. `Ok(true)` means an effect
    /// trigger was recorded; `Ok(false)` means the action was recognized
    /// but is still cooling down (the command is acknowledged, nothing
    /// fires).
    pub fn handle_action(&mut self, id: &str, name: &str) -> Result<bool, RejectReason> {
        if !REGISTERED_ACTIONS.contains(&name) {
            return Err(RejectReason::InvalidAction);
        }
        let tick = self.tick;
        let player = self.players.get_mut(id).ok_or(RejectReason::UnknownActor)?;
        if !player.actor.action_ready(name, tick) {
            return Ok(false);
        }
        let cooldown = match name {
            ACTION_ATTACK => ATTACK_COOLDOWN_TICKS,
            ACTION_FIREBALL => FIREBALL_COOLDOWN_TICKS,
            _ => unreachable!("registered action set is closed"),
        };
        player.actor.start_cooldown(name, tick, cooldown);
        self.pending_triggers.push(ActionTrigger {
            actor: id.to_owned(),
            action: name.to_owned(),
            pos: player.actor.pos,
            facing: player.actor.facing,
        });
        Ok(true)
    }

    // -- console commands ---------------------------------------------------

    /// Execute a console command (`drop`, `pickup`, `mine`).
    pub fn handle_console(&mut self, id: &str, cmd: &str, qty: u32) -> ConsoleOutcome {
        if !self.players.contains_key(id) {
            return ConsoleOutcome::rejected("unknown_actor");
        }
        match cmd {
            "drop" => self.console_drop(id, qty.max(1)),
            "pickup" => self.console_pickup(id),
            "mine" => self.console_mine(id),
            _ => ConsoleOutcome::rejected("unknown_command"),
        }
    }

    fn console_drop(&mut self, id: &str, qty: u32) -> ConsoleOutcome {
        let player = self.players.get_mut(id).expect("presence checked by caller");
        let Some(first_key) = player.actor.inventory.slots.first().map(|s| s.key.clone()) else {
            return ConsoleOutcome::rejected("empty_inventory");
        };
        let removed = player
            .actor
            .inventory
            .remove(&first_key, qty)
            .expect("first slot exists");
        player.actor.bump_version();
        let slots = player.actor.inventory.clone_slots();
        let pos = player.actor.pos;
        self.pending_patches.push(Patch::PlayerInventory {
            id: id.to_owned(),
            slots,
        });

        let dropped_qty = removed.quantity;
        let stack_id = removed.stack_id;
        self.spawn_ground_item(removed, pos);
        ConsoleOutcome {
            ok: true,
            reason: None,
            qty: Some(dropped_qty),
            stack_id: Some(stack_id),
            slot: None,
        }
    }

    fn console_pickup(&mut self, id: &str) -> ConsoleOutcome {
        let tile = self.players[id].actor.pos.tile();
        let Some(item_id) = self.ground_items.ids_on_tile(tile).first().cloned() else {
            return ConsoleOutcome::rejected("nothing_here");
        };
        let item = self.ground_items.remove(&item_id).expect("indexed id exists");
        self.pending_patches.push(Patch::GroundItemRemoved {
            id: item_id.clone(),
        });

        let qty = item.stack.quantity;
        let stack_id = item.stack.stack_id;
        let player = self.players.get_mut(id).expect("presence checked by caller");
        let slot = player.actor.inventory.add(item.stack);
        player.actor.bump_version();
        let slots = player.actor.inventory.clone_slots();
        self.pending_patches.push(Patch::PlayerInventory {
            id: id.to_owned(),
            slots,
        });
        ConsoleOutcome {
            ok: true,
            reason: None,
            qty: Some(qty),
            stack_id: Some(stack_id),
            slot: Some(slot),
        }
    }

    fn console_mine(&mut self, id: &str) -> ConsoleOutcome {
        let tick = self.tick;
        let pos = self.players[id].actor.pos;
        let reach = Rect::centered(pos, ACTOR_HALF + TILE_SIZE / 2.0, ACTOR_HALF + TILE_SIZE / 2.0);
        let near_ore = self
            .obstacles
            .iter()
            .any(|o| o.kind == ObstacleKind::GoldOre && o.rect.overlaps(&reach));
        if !near_ore {
            return ConsoleOutcome::rejected("no_ore_in_reach");
        }

        let player = self.players.get_mut(id).expect("presence checked by caller");
        if !player.actor.action_ready("mine", tick) {
            return ConsoleOutcome::rejected("cooldown");
        }
        player.actor.start_cooldown("mine", tick, MINE_COOLDOWN_TICKS);

        let stack = ItemStack::plain(self.alloc_stack_id(), ItemKind::GoldOre, 1);
        let player = self.players.get_mut(id).expect("presence checked by caller");
        let slot = player.actor.inventory.add(stack);
        player.actor.bump_version();
        let slots = player.actor.inventory.clone_slots();
        self.pending_patches.push(Patch::PlayerInventory {
            id: id.to_owned(),
            slots,
        });
        ConsoleOutcome {
            ok: true,
            reason: None,
            qty: Some(1),
            stack_id: None,
            slot: Some(slot),
        }
    }

    // -- stepping -----------------------------------------------------------

    /// Advance all actor movement by `dt` seconds: players along intents
    /// or paths, NPC wander AI, wall sweeps, the separation pass, and
    /// lava contact. Returns the conditions newly applied by lava so the
    /// loop can attach visual effects.
    pub fn step_actors(&mut self, dt: f64) -> Vec<ConditionApplied> {
        let solids = self.solid_rects();
        let bounds = (self.config.width_px(), self.config.height_px());

        self.step_players(dt, &solids, bounds);
        self.step_npcs(dt, &solids, bounds);
        self.separation_pass(bounds);
        self.apply_lava_contact()
    }

    fn step_players(&mut self, dt: f64, solids: &[Rect], bounds: (f64, f64)) {
        let ids: Vec<String> = self.players.keys().cloned().collect();
        for id in ids {
            let player = self.players.get_mut(&id).expect("id snapshot");
            let pos = player.actor.pos;
            let mut path_done = false;
            let (direction, from_path) = match &mut player.path {
                Some(path) => {
                    // Advance past reached waypoints.
                    while path.next < path.waypoints.len()
                        && pos.distance_to(path.waypoints[path.next]) < 4.0
                    {
                        path.next += 1;
                    }
                    if path.next >= path.waypoints.len() {
                        path_done = true;
                        (Vec2::ZERO, false)
                    } else {
                        let wp = path.waypoints[path.next];
                        let delta = Vec2::new(wp.x - pos.x, wp.y - pos.y);
                        (delta.clamp_to_unit(), true)
                    }
                }
                None => (player.intent, false),
            };
            if path_done {
                player.path = None;
            }

            if direction == Vec2::ZERO {
                continue;
            }

            let step = direction.scaled(PLAYER_SPEED * dt);
            let result = movement::sweep_move(player.actor.pos, step, solids, bounds);
            if result.hit_wall && from_path {
                // A wall in the way of a planned path means the plan is
                // stale (an actor pushed us off course); drop it.
                player.path = None;
            }
            if result.moved {
                player.actor.pos = result.pos;
                player.actor.bump_version();
                self.pending_patches.push(Patch::PlayerPos {
                    id: id.clone(),
                    x: result.pos.x,
                    y: result.pos.y,
                });
                if from_path {
                    if let Some(facing) = Facing::from_vector(direction) {
                        let player = self.players.get_mut(&id).expect("id snapshot");
                        if facing != player.actor.facing {
                            player.actor.facing = facing;
                            player.actor.bump_version();
                            self.pending_patches.push(Patch::PlayerFacing {
                                id: id.clone(),
                                facing,
                            });
                        }
                    }
                }
            }
        }
    }

    fn step_npcs(&mut self, dt: f64, solids: &[Rect], bounds: (f64, f64)) {
        let tick = self.tick;
        let ids: Vec<String> = self.npcs.keys().cloned().collect();
        for id in ids {
            let npc = self.npcs.get_mut(&id).expect("id snapshot");
            if !npc.ai_controlled {
                continue;
            }

            if tick >= npc.next_decision_tick {
                let pos = npc.actor.pos;
                let stream = self.rng.stream("npc-ai");
                let radius = 4.0 * TILE_SIZE;
                let target = Vec2::new(
                    pos.x + stream.gen_range(-radius..radius),
                    pos.y + stream.gen_range(-radius..radius),
                );
                let npc = self.npcs.get_mut(&id).expect("id snapshot");
                npc.wander_target = Some(clamp_to_bounds(target, bounds));
                npc.next_decision_tick = tick + NPC_WANDER_PERIOD_TICKS;
            }

            let npc = self.npcs.get_mut(&id).expect("id snapshot");
            let Some(target) = npc.wander_target else {
                continue;
            };
            let delta = Vec2::new(target.x - npc.actor.pos.x, target.y - npc.actor.pos.y);
            if delta.length() < 4.0 {
                npc.wander_target = None;
                continue;
            }

            let speed = npc.archetype.speed();
            let step = delta.clamp_to_unit().scaled(speed * dt);
            let result = movement::sweep_move(npc.actor.pos, step, solids, bounds);
            if result.hit_wall {
                // Blocked wander targets are abandoned rather than ground
                // against the wall until the next decision tick.
                npc.wander_target = None;
            }
            if result.moved {
                npc.actor.pos = result.pos;
                npc.actor.bump_version();
                self.pending_patches.push(Patch::NpcPos {
                    id: id.clone(),
                    x: result.pos.x,
                    y: result.pos.y,
                });
                if let Some(facing) = Facing::from_vector(delta) {
                    let npc = self.npcs.get_mut(&id).expect("id snapshot");
                    if facing != npc.actor.facing {
                        npc.actor.facing = facing;
                        npc.actor.bump_version();
                        self.pending_patches.push(Patch::NpcFacing {
                            id: id.clone(),
                            facing,
                        });
                    }
                }
            }
        }
    }

    fn separation_pass(&mut self, bounds: (f64, f64)) {
        let player_ids: Vec<String> = self.players.keys().cloned().collect();
        let npc_ids: Vec<String> = self.npcs.keys().cloned().collect();

        let mut positions: Vec<Vec2> = player_ids
            .iter()
            .map(|id| self.players[id].actor.pos)
            .chain(npc_ids.iter().map(|id| self.npcs[id].actor.pos))
            .collect();
        let before = positions.clone();
        movement::separate_actors(&mut positions, bounds);

        for (i, id) in player_ids.iter().enumerate() {
            if positions[i] != before[i] {
                let player = self.players.get_mut(id).expect("id snapshot");
                player.actor.pos = positions[i];
                player.actor.bump_version();
                self.pending_patches.push(Patch::PlayerPos {
                    id: id.clone(),
                    x: positions[i].x,
                    y: positions[i].y,
                });
            }
        }
        for (j, id) in npc_ids.iter().enumerate() {
            let i = player_ids.len() + j;
            if positions[i] != before[i] {
                let npc = self.npcs.get_mut(id).expect("id snapshot");
                npc.actor.pos = positions[i];
                npc.actor.bump_version();
                self.pending_patches.push(Patch::NpcPos {
                    id: id.clone(),
                    x: positions[i].x,
                    y: positions[i].y,
                });
            }
        }
    }

    fn apply_lava_contact(&mut self) -> Vec<ConditionApplied> {
        let tick = self.tick;
        let lava_rects: Vec<Rect> = self
            .obstacles
            .iter()
            .filter(|o| o.kind == ObstacleKind::Lava)
            .map(|o| o.rect)
            .collect();
        if lava_rects.is_empty() {
            return Vec::new();
        }

        let mut applied = Vec::new();
        let mut scorch = |id: &str, pos: Vec2, conditions: &mut BTreeMap<ConditionKind, Condition>| {
            let rect = Rect::centered(pos, ACTOR_HALF, ACTOR_HALF);
            if !lava_rects.iter().any(|lava| lava.overlaps(&rect)) {
                return false;
            }
            let fresh = !conditions.contains_key(&ConditionKind::Burning);
            let condition = Condition::new(
                ConditionKind::Burning,
                tick + BURNING_DURATION_TICKS,
                tick + BURNING_INTERVAL_TICKS,
                BURNING_INTERVAL_TICKS,
                None,
            );
            match conditions.get_mut(&ConditionKind::Burning) {
                Some(existing) => {
                    if condition.expires_at > existing.expires_at {
                        existing.expires_at = condition.expires_at;
                    }
                }
                None => {
                    conditions.insert(ConditionKind::Burning, condition);
                }
            }
            if fresh {
                applied.push(ConditionApplied {
                    actor: id.to_owned(),
                    kind: ConditionKind::Burning,
                });
            }
            fresh
        };

        let player_ids: Vec<String> = self.players.keys().cloned().collect();
        for id in player_ids {
            let player = self.players.get_mut(&id).expect("id snapshot");
            let pos = player.actor.pos;
            if scorch(&id, pos, &mut player.actor.conditions) {
                player.actor.bump_version();
                let conditions = player.actor.conditions.clone();
                self.pending_patches.push(Patch::PlayerConditions {
                    id: id.clone(),
                    conditions,
                });
            }
        }
        let npc_ids: Vec<String> = self.npcs.keys().cloned().collect();
        for id in npc_ids {
            let npc = self.npcs.get_mut(&id).expect("id snapshot");
            let pos = npc.actor.pos;
            if scorch(&id, pos, &mut npc.actor.conditions) {
                npc.actor.bump_version();
                let conditions = npc.actor.conditions.clone();
                self.pending_patches.push(Patch::NpcConditions {
                    id: id.clone(),
                    conditions,
                });
            }
        }
        applied
    }

    /// Record the effect instance attached to a condition.
    pub fn attach_condition_effect(&mut self, actor: &str, kind: ConditionKind, effect: u64) {
        let conditions = if let Some(player) = self.players.get_mut(actor) {
            &mut player.actor.conditions
        } else if let Some(npc) = self.npcs.get_mut(actor) {
            &mut npc.actor.conditions
        } else {
            return;
        };
        if let Some(condition) = conditions.get_mut(&kind) {
            condition.attached_effect = Some(effect);
        }
    }

    /// Advance every actor's conditions to `tick`: fire due periodic
    /// effects, drop expired conditions, and return directives for the
    /// attached effect instances.
    pub fn advance_conditions(&mut self, tick: u64) -> Vec<AttachedEffectDirective> {
        let mut directives = Vec::new();
        let mut deaths: Vec<(String, bool)> = Vec::new();

        let player_ids: Vec<String> = self.players.keys().cloned().collect();
        for id in player_ids {
            let player = self.players.get_mut(&id).expect("id snapshot");
            let (damage, changed) =
                Self::tick_conditions(&mut player.actor.conditions, tick, &mut directives);
            if damage > 0 {
                player.actor.apply_damage(damage);
                player.actor.bump_version();
                let (health, max_health) = (player.actor.health, player.actor.max_health);
                self.pending_patches.push(Patch::PlayerHealth {
                    id: id.clone(),
                    health,
                    max_health,
                });
                if health == 0 {
                    deaths.push((id.clone(), true));
                }
            }
            if changed {
                let player = self.players.get_mut(&id).expect("id snapshot");
                player.actor.bump_version();
                let conditions = player.actor.conditions.clone();
                self.pending_patches.push(Patch::PlayerConditions {
                    id: id.clone(),
                    conditions,
                });
            }
        }

        let npc_ids: Vec<String> = self.npcs.keys().cloned().collect();
        for id in npc_ids {
            let npc = self.npcs.get_mut(&id).expect("id snapshot");
            let (damage, changed) =
                Self::tick_conditions(&mut npc.actor.conditions, tick, &mut directives);
            if damage > 0 {
                npc.actor.apply_damage(damage);
                npc.actor.bump_version();
                let (health, max_health) = (npc.actor.health, npc.actor.max_health);
                self.pending_patches.push(Patch::NpcHealth {
                    id: id.clone(),
                    health,
                    max_health,
                });
                if health == 0 {
                    deaths.push((id.clone(), false));
                }
            }
            if changed {
                let npc = self.npcs.get_mut(&id).expect("id snapshot");
                npc.actor.bump_version();
                let conditions = npc.actor.conditions.clone();
                self.pending_patches.push(Patch::NpcConditions {
                    id: id.clone(),
                    conditions,
                });
            }
        }

        for (id, is_player) in deaths {
            self.handle_death(&id, is_player, None, &mut directives);
        }
        directives
    }

    /// Returns `(damage, condition_set_changed)`.
    fn tick_conditions(
        conditions: &mut BTreeMap<ConditionKind, Condition>,
        tick: u64,
        directives: &mut Vec<AttachedEffectDirective>,
    ) -> (i32, bool) {
        let mut damage = 0;
        let mut expired: Vec<ConditionKind> = Vec::new();

        for (kind, condition) in conditions.iter_mut() {
            if condition.expired(tick) {
                expired.push(*kind);
                continue;
            }
            if condition.due(tick) {
                damage += kind.damage_per_tick();
                condition.reschedule(tick);
                if let Some(effect) = condition.attached_effect {
                    directives.push(AttachedEffectDirective::Extend {
                        effect,
                        ticks: condition.expires_at.saturating_sub(tick),
                    });
                }
            }
        }

        let changed = !expired.is_empty();
        for kind in expired {
            if let Some(condition) = conditions.remove(&kind) {
                if let Some(effect) = condition.attached_effect {
                    directives.push(AttachedEffectDirective::End { effect });
                }
            }
        }
        (damage, changed)
    }

    // -- damage and death ---------------------------------------------------

    /// Apply effect damage to any actor. Returns the remaining health, or
    /// `None` if the target does not exist. Deaths are resolved inline:
    /// NPCs drop loot and credit `source` with XP; players are removed.
    pub fn apply_effect_damage(
        &mut self,
        target: &str,
        amount: i32,
        source: Option<&str>,
    ) -> Option<i32> {
        if let Some(player) = self.players.get_mut(target) {
            let health = player.actor.apply_damage(amount);
            player.actor.bump_version();
            let max_health = player.actor.max_health;
            self.pending_patches.push(Patch::PlayerHealth {
                id: target.to_owned(),
                health,
                max_health,
            });
            if health == 0 {
                let mut directives = Vec::new();
                self.handle_death(target, true, source, &mut directives);
            }
            return Some(health);
        }
        if let Some(npc) = self.npcs.get_mut(target) {
            let health = npc.actor.apply_damage(amount);
            npc.actor.bump_version();
            let max_health = npc.actor.max_health;
            self.pending_patches.push(Patch::NpcHealth {
                id: target.to_owned(),
                health,
                max_health,
            });
            if health == 0 {
                let mut directives = Vec::new();
                self.handle_death(target, false, source, &mut directives);
            }
            return Some(health);
        }
        None
    }

    fn handle_death(
        &mut self,
        id: &str,
        is_player: bool,
        killer: Option<&str>,
        _directives: &mut Vec<AttachedEffectDirective>,
    ) {
        if is_player {
            tracing::info!(player = %id, "player died");
            self.remove_player(id);
            return;
        }

        let Some(npc) = self.npcs.remove(id) else {
            return;
        };
        tracing::info!(npc = %id, archetype = ?npc.archetype, "npc died");
        self.pending_patches.push(Patch::NpcRemoved { id: id.to_owned() });

        // Drop the corpse's inventory with loot-stream jitter.
        let pos = npc.actor.pos;
        let stacks: Vec<ItemStack> = npc.actor.inventory.slots;
        for stack in stacks {
            let stream = self.rng.stream("loot");
            let jitter = Vec2::new(
                stream.gen_range(-12.0..12.0),
                stream.gen_range(-12.0..12.0),
            );
            let drop_pos = clamp_to_bounds(
                Vec2::new(pos.x + jitter.x, pos.y + jitter.y),
                (self.config.width_px(), self.config.height_px()),
            );
            self.spawn_ground_item(stack, drop_pos);
        }

        if let Some(killer) = killer {
            if let Some(player) = self.players.get_mut(killer) {
                player.xp += npc.xp_reward;
                player.actor.bump_version();
                // XP rides the health patch family: clients track it from
                // the snapshot; no dedicated patch kind exists for it.
            }
        }
    }

    // -- generation ---------------------------------------------------------

    fn generate(&mut self) {
        let config = self.config.clone();
        let mut taken: HashSet<(i32, i32)> = HashSet::new();

        // Keep a clear spawn area in the middle of the arena.
        let center = (config.width_tiles / 2, config.height_tiles / 2);
        for dy in -2..=2 {
            for dx in -2..=2 {
                taken.insert((center.0 + dx, center.1 + dy));
            }
        }

        let place = |world: &mut World, taken: &mut HashSet<(i32, i32)>| -> Option<(i32, i32)> {
            // Bounded retry; generation is best-effort on crowded configs.
            for _ in 0..64 {
                let stream = world.rng.stream("world");
                let tile = (
                    stream.gen_range(1..config.width_tiles - 1),
                    stream.gen_range(1..config.height_tiles - 1),
                );
                if taken.insert(tile) {
                    return Some(tile);
                }
            }
            None
        };

        if config.obstacles {
            for i in 0..config.obstacles_count {
                if let Some(tile) = place(self, &mut taken) {
                    self.obstacles.push(Obstacle::new(
                        format!("obstacle-rock-{i}"),
                        ObstacleKind::Rock,
                        PathGrid::tile_rect(tile),
                    ));
                }
            }
        }
        if config.gold_mines {
            for i in 0..config.gold_mine_count {
                if let Some(tile) = place(self, &mut taken) {
                    self.obstacles.push(Obstacle::new(
                        format!("obstacle-gold-{i}"),
                        ObstacleKind::GoldOre,
                        PathGrid::tile_rect(tile),
                    ));
                }
            }
        }
        if config.lava {
            for i in 0..config.lava_count {
                if let Some(tile) = place(self, &mut taken) {
                    self.obstacles.push(Obstacle::new(
                        format!("obstacle-lava-{i}"),
                        ObstacleKind::Lava,
                        PathGrid::tile_rect(tile),
                    ));
                }
            }
        }

        self.grid = PathGrid::build(&config, &self.obstacles);

        if config.npcs {
            for _ in 0..config.goblin_count {
                if let Some(tile) = place(self, &mut taken) {
                    self.spawn_npc(NpcArchetype::Goblin, PathGrid::tile_center(tile));
                }
            }
            for _ in 0..config.rat_count {
                if let Some(tile) = place(self, &mut taken) {
                    self.spawn_npc(NpcArchetype::Rat, PathGrid::tile_center(tile));
                }
            }
        }
    }

    fn spawn_npc(&mut self, archetype: NpcArchetype, pos: Vec2) {
        let id = format!("npc-{}", self.next_npc_id);
        self.next_npc_id += 1;
        let mut npc = Npc::new(&id, pos, archetype);
        // Seed the corpse loot so kills drop something.
        let stack = match archetype {
            NpcArchetype::Goblin => ItemStack::plain(self.alloc_stack_id(), ItemKind::GoblinEar, 1),
            NpcArchetype::Rat => ItemStack::plain(self.alloc_stack_id(), ItemKind::RatPelt, 1),
        };
        npc.actor.inventory.add(stack);
        self.npcs.insert(id, npc);
    }

    fn spawn_ground_item(&mut self, mut stack: ItemStack, pos: Vec2) {
        // Merge with an existing stack on the same tile when keys match.
        let tile = pos.tile();
        let merge_target = self
            .ground_items
            .ids_on_tile(tile)
            .iter()
            .find(|gid| {
                self.ground_items
                    .get(gid)
                    .map_or(false, |g| g.stack.key == stack.key)
            })
            .cloned();

        if let Some(gid) = merge_target {
            let item = self.ground_items.get_mut(&gid).expect("indexed id exists");
            item.stack.quantity += stack.quantity;
            let qty = item.stack.quantity;
            self.pending_patches.push(Patch::GroundItemQty { id: gid, qty });
            return;
        }

        let id = format!("item-{}", self.next_item_id);
        self.next_item_id += 1;
        stack.stack_id = self.alloc_stack_id();
        let item = GroundItem {
            id: id.clone(),
            stack,
            pos,
        };
        self.pending_patches.push(Patch::GroundItemAdded {
            id,
            item: item.clone(),
        });
        self.ground_items.insert(item);
    }

    fn alloc_stack_id(&mut self) -> u64 {
        let id = self.next_stack_id;
        self.next_stack_id += 1;
        id
    }

    fn spawn_point(&mut self) -> Vec2 {
        // Deterministic ring around the arena center.
        let center = Vec2::new(self.config.width_px() / 2.0, self.config.height_px() / 2.0);
        let slot = self.spawn_counter;
        self.spawn_counter += 1;
        let angle = slot as f64 * std::f64::consts::FRAC_PI_3;
        let radius = if slot == 0 { 0.0 } else { TILE_SIZE * (1.0 + (slot / 6) as f64) };
        clamp_to_bounds(
            Vec2::new(
                center.x + radius * angle.cos(),
                center.y + radius * angle.sin(),
            ),
            (self.config.width_px(), self.config.height_px()),
        )
    }

    fn occupied_tiles(&self, exclude: &str) -> HashSet<(i32, i32)> {
        let mut occupied = HashSet::new();
        for (id, player) in &self.players {
            if id != exclude {
                occupied.insert(player.actor.pos.tile());
            }
        }
        for (id, npc) in &self.npcs {
            if id != exclude {
                occupied.insert(npc.actor.pos.tile());
            }
        }
        occupied
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::fungibility_key;

    fn quiet_config() -> WorldConfig {
        // No generated content: deterministic empty arena for unit tests.
        WorldConfig {
            obstacles: false,
            gold_mines: false,
            lava: false,
            npcs: false,
            ..Default::default()
        }
    }

    fn world_with_player() -> World {
        let mut world = World::new(quiet_config());
        world.add_player("player-1").unwrap();
        world.drain_patches();
        world
    }

    // -- 1. Players ----------------------------------------------------------

    #[test]
    fn add_player_rejects_duplicates() {
        let mut world = World::new(quiet_config());
        world.add_player("player-1").unwrap();
        assert!(matches!(
            world.add_player("player-1"),
            Err(WorldError::DuplicatePlayer { .. })
        ));
    }

    #[test]
    fn remove_player_emits_removal_patch() {
        let mut world = world_with_player();
        assert!(world.remove_player("player-1"));
        let patches = world.drain_patches();
        assert_eq!(
            patches,
            vec![Patch::PlayerRemoved {
                id: "player-1".to_owned()
            }]
        );
        assert!(!world.remove_player("player-1"));
    }

    // -- 2. Intents ----------------------------------------------------------

    #[test]
    fn set_intent_normalizes_and_patches() {
        let mut world = world_with_player();
        world.set_intent("player-1", 3.0, 4.0, Some(Facing::Right)).unwrap();

        let player = world.player("player-1").unwrap();
        assert!((player.intent.length() - 1.0).abs() < 1e-12);

        let patches = world.drain_patches();
        assert_eq!(patches.len(), 2);
        assert_eq!(patches[0].kind(), "player_intent");
        assert_eq!(patches[1].kind(), "player_facing");
    }

    #[test]
    fn zero_vector_intent_does_not_bump_version() {
        let mut world = world_with_player();
        let before = world.player("player-1").unwrap().actor.version;

        world.set_intent("player-1", 0.0, 0.0, None).unwrap();

        let after = world.player("player-1").unwrap().actor.version;
        assert_eq!(before, after);
        assert!(world.drain_patches().is_empty());
    }

    #[test]
    fn patch_count_matches_version_advances() {
        let mut world = world_with_player();
        let before = world.player("player-1").unwrap().actor.version;

        world.set_intent("player-1", 1.0, 0.0, Some(Facing::Right)).unwrap();
        world.step_actors(1.0 / 15.0);

        let after = world.player("player-1").unwrap().actor.version;
        let patches = world
            .drain_patches()
            .iter()
            .filter(|p| p.entity_id() == "player-1")
            .count() as u64;
        assert_eq!(after - before, patches, "one patch per version advance");
    }

    #[test]
    fn unknown_actor_intent_rejected() {
        let mut world = World::new(quiet_config());
        assert_eq!(
            world.set_intent("player-9", 1.0, 0.0, None).unwrap_err(),
            RejectReason::UnknownActor
        );
    }

    // -- 3. Actions ----------------------------------------------------------

    #[test]
    fn handle_action_validates_name_and_cooldown() {
        let mut world = world_with_player();
        world.set_tick(10);

        assert_eq!(
            world.handle_action("player-1", "teleport").unwrap_err(),
            RejectReason::InvalidAction
        );
        assert!(world.drain_triggers().is_empty());

        assert!(world.handle_action("player-1", "attack").unwrap());
        let triggers = world.drain_triggers();
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].action, "attack");

        // Cooling down: acknowledged but no trigger.
        assert!(!world.handle_action("player-1", "attack").unwrap());
        assert!(world.drain_triggers().is_empty());

        world.set_tick(10 + ATTACK_COOLDOWN_TICKS);
        assert!(world.handle_action("player-1", "attack").unwrap());
    }

    // -- 4. Movement ---------------------------------------------------------

    #[test]
    fn step_moves_player_along_intent() {
        let mut world = world_with_player();
        let start = world.player("player-1").unwrap().actor.pos;
        world.set_intent("player-1", 1.0, 0.0, None).unwrap();
        world.drain_patches();

        world.step_actors(1.0 / 15.0);

        let end = world.player("player-1").unwrap().actor.pos;
        assert!(end.x > start.x);
        let patches = world.drain_patches();
        assert!(patches.iter().any(|p| p.kind() == "player_pos"));
    }

    #[test]
    fn idle_player_emits_no_patches() {
        let mut world = world_with_player();
        world.step_actors(1.0 / 15.0);
        assert!(world.drain_patches().is_empty());
    }

    #[test]
    fn path_following_reaches_target_and_clears() {
        let mut world = world_with_player();
        let start = world.player("player-1").unwrap().actor.pos;
        let target = Vec2::new(start.x + TILE_SIZE * 2.0, start.y);
        assert!(world.set_path("player-1", target).unwrap());
        assert!(world.player("player-1").unwrap().path.is_some());

        for _ in 0..200 {
            world.step_actors(1.0 / 15.0);
            if world.player("player-1").unwrap().path.is_none() {
                break;
            }
        }

        let player = world.player("player-1").unwrap();
        assert!(player.path.is_none(), "path should complete");
        assert!(player.actor.pos.distance_to(target) < 8.0);
    }

    #[test]
    fn set_intent_cancels_path() {
        let mut world = world_with_player();
        let start = world.player("player-1").unwrap().actor.pos;
        world
            .set_path("player-1", Vec2::new(start.x + 100.0, start.y))
            .unwrap();
        world.set_intent("player-1", 0.0, 1.0, None).unwrap();
        assert!(world.player("player-1").unwrap().path.is_none());
    }

    // -- 5. Conditions and lava ----------------------------------------------

    fn lava_world() -> World {
        let mut config = quiet_config();
        config.lava = true;
        config.lava_count = 0; // placed manually below
        let mut world = World::new(config);
        world.add_player("player-1").unwrap();
        world.drain_patches();
        // Drop a lava tile directly under the player.
        let pos = world.player("player-1").unwrap().actor.pos;
        let rect = Rect::centered(pos, TILE_SIZE / 2.0, TILE_SIZE / 2.0);
        world
            .obstacles
            .push(Obstacle::new("obstacle-lava-0", ObstacleKind::Lava, rect));
        world
    }

    #[test]
    fn lava_applies_burning_once_until_it_expires() {
        let mut world = lava_world();
        let applied = world.step_actors(1.0 / 15.0);
        assert_eq!(
            applied,
            vec![ConditionApplied {
                actor: "player-1".to_owned(),
                kind: ConditionKind::Burning
            }]
        );
        // Still standing in lava: refreshed, not re-applied.
        let applied = world.step_actors(1.0 / 15.0);
        assert!(applied.is_empty());
    }

    #[test]
    fn burning_ticks_damage_and_expires() {
        let mut world = lava_world();
        world.set_tick(0);
        world.step_actors(1.0 / 15.0);
        world.drain_patches();

        // First damage tick fires at BURNING_INTERVAL_TICKS.
        world.set_tick(BURNING_INTERVAL_TICKS);
        world.advance_conditions(BURNING_INTERVAL_TICKS);
        let health = world.player("player-1").unwrap().actor.health;
        assert_eq!(health, PLAYER_MAX_HEALTH - ConditionKind::Burning.damage_per_tick());

        // Step the player off the lava so the condition can lapse.
        world.obstacles.clear();
        let expiry = BURNING_INTERVAL_TICKS + BURNING_DURATION_TICKS + 1;
        world.set_tick(expiry);
        world.advance_conditions(expiry);
        assert!(world
            .player("player-1")
            .unwrap()
            .actor
            .conditions
            .is_empty());
    }

    #[test]
    fn expired_condition_ends_attached_effect() {
        let mut world = lava_world();
        world.step_actors(1.0 / 15.0);
        world.attach_condition_effect("player-1", ConditionKind::Burning, 42);

        world.obstacles.clear();
        let expiry = BURNING_DURATION_TICKS + 2;
        world.set_tick(expiry);
        let directives = world.advance_conditions(expiry);
        assert!(directives.contains(&AttachedEffectDirective::End { effect: 42 }));
    }

    fn world_with_parked_npc() -> (World, String) {
        let mut world = World::new(quiet_config());
        world.spawn_npc(NpcArchetype::Rat, Vec2::new(200.0, 200.0));
        let npc_id = world.npcs.keys().next().unwrap().clone();
        world.npcs.get_mut(&npc_id).unwrap().ai_controlled = false;
        world.drain_patches();
        (world, npc_id)
    }

    #[test]
    fn lava_applies_burning_to_npcs_with_patch() {
        let (mut world, npc_id) = world_with_parked_npc();
        let pos = world.npc(&npc_id).unwrap().actor.pos;
        world.obstacles.push(Obstacle::new(
            "obstacle-lava-0",
            ObstacleKind::Lava,
            Rect::centered(pos, TILE_SIZE / 2.0, TILE_SIZE / 2.0),
        ));

        let before = world.npc(&npc_id).unwrap().actor.version;
        world.step_actors(1.0 / 15.0);

        let npc = world.npc(&npc_id).unwrap();
        assert!(npc.actor.conditions.contains_key(&ConditionKind::Burning));
        assert!(npc.actor.version > before);
        let patches = world.drain_patches();
        assert!(patches
            .iter()
            .any(|p| p.kind() == "npc_conditions" && p.entity_id() == npc_id));

        // Still standing in lava: refreshed, no duplicate patch.
        world.step_actors(1.0 / 15.0);
        assert!(world
            .drain_patches()
            .iter()
            .all(|p| p.kind() != "npc_conditions"));
    }

    #[test]
    fn npc_condition_expiry_emits_patch() {
        let (mut world, npc_id) = world_with_parked_npc();
        let pos = world.npc(&npc_id).unwrap().actor.pos;
        world.obstacles.push(Obstacle::new(
            "obstacle-lava-0",
            ObstacleKind::Lava,
            Rect::centered(pos, TILE_SIZE / 2.0, TILE_SIZE / 2.0),
        ));
        world.step_actors(1.0 / 15.0);
        world.drain_patches();

        world.obstacles.clear();
        let expiry = BURNING_DURATION_TICKS + 2;
        world.set_tick(expiry);
        world.advance_conditions(expiry);

        assert!(world.npc(&npc_id).unwrap().actor.conditions.is_empty());
        let patches = world.drain_patches();
        assert!(patches.iter().any(|p| matches!(
            p,
            Patch::NpcConditions { id, conditions } if id == &npc_id && conditions.is_empty()
        )));
    }

    // -- 6. Damage, death, loot ----------------------------------------------

    fn world_with_npc() -> (World, String) {
        let mut config = quiet_config();
        config.npcs = true;
        config.goblin_count = 1;
        config.rat_count = 0;
        let mut world = World::new(config);
        world.add_player("player-1").unwrap();
        world.drain_patches();
        let npc_id = world.npcs.keys().next().unwrap().clone();
        (world, npc_id)
    }

    #[test]
    fn npc_death_drops_loot_and_awards_xp() {
        let (mut world, npc_id) = world_with_npc();
        let health = world.npc(&npc_id).unwrap().actor.health;

        let remaining = world
            .apply_effect_damage(&npc_id, health, Some("player-1"))
            .unwrap();
        assert_eq!(remaining, 0);
        assert!(world.npc(&npc_id).is_none());
        assert_eq!(world.ground_items().len(), 1);
        assert_eq!(world.player("player-1").unwrap().xp, 25);

        let patches = world.drain_patches();
        assert!(patches.iter().any(|p| p.kind() == "npc_removed"));
        assert!(patches.iter().any(|p| p.kind() == "ground_item_added"));
    }

    #[test]
    fn player_death_removes_player() {
        let mut world = world_with_player();
        world.apply_effect_damage("player-1", PLAYER_MAX_HEALTH, None);
        assert!(!world.has_player("player-1"));
        let patches = world.drain_patches();
        assert!(patches.iter().any(|p| p.kind() == "player_removed"));
    }

    #[test]
    fn damage_to_unknown_target_is_none() {
        let mut world = World::new(quiet_config());
        assert!(world.apply_effect_damage("npc-99", 5, None).is_none());
    }

    // -- 7. Console commands -------------------------------------------------

    #[test]
    fn console_drop_and_pickup_roundtrip() {
        let mut world = world_with_player();
        let stack = ItemStack::plain(999, ItemKind::Gold, 6);
        world
            .players
            .get_mut("player-1")
            .unwrap()
            .actor
            .inventory
            .add(stack);

        let dropped = world.handle_console("player-1", "drop", 4);
        assert!(dropped.ok);
        assert_eq!(dropped.qty, Some(4));
        assert_eq!(world.ground_items().len(), 1);

        let picked = world.handle_console("player-1", "pickup", 0);
        assert!(picked.ok);
        assert_eq!(picked.qty, Some(4));
        assert!(world.ground_items().is_empty());

        let gold_key = fungibility_key(ItemKind::Gold, 0, &[]);
        assert_eq!(
            world
                .player("player-1")
                .unwrap()
                .actor
                .inventory
                .quantity_of(&gold_key),
            6
        );
    }

    #[test]
    fn console_pickup_with_nothing_rejects() {
        let mut world = world_with_player();
        let outcome = world.handle_console("player-1", "pickup", 0);
        assert!(!outcome.ok);
        assert_eq!(outcome.reason, Some("nothing_here"));
    }

    #[test]
    fn console_mine_requires_adjacent_ore() {
        let mut world = world_with_player();
        let outcome = world.handle_console("player-1", "mine", 0);
        assert!(!outcome.ok);
        assert_eq!(outcome.reason, Some("no_ore_in_reach"));

        // Put ore right next to the player.
        let pos = world.player("player-1").unwrap().actor.pos;
        world.obstacles.push(Obstacle::new(
            "obstacle-gold-9",
            ObstacleKind::GoldOre,
            Rect::new(pos.x + ACTOR_HALF + 2.0, pos.y - 20.0, 40.0, 40.0),
        ));
        let outcome = world.handle_console("player-1", "mine", 0);
        assert!(outcome.ok);

        // Cooldown gates the next swing.
        let outcome = world.handle_console("player-1", "mine", 0);
        assert_eq!(outcome.reason, Some("cooldown"));
    }

    // -- 8. Determinism ------------------------------------------------------

    #[test]
    fn same_seed_generates_identical_worlds() {
        let mut config = WorldConfig::default();
        config.seed = "abc".to_owned();
        let a = World::new(config.clone()).snapshot();
        let b = World::new(config).snapshot();
        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn different_seeds_generate_different_worlds() {
        let mut config = WorldConfig::default();
        config.seed = "abc".to_owned();
        let a = World::new(config.clone()).snapshot();
        config.seed = "abd".to_owned();
        let b = World::new(config).snapshot();
        assert_ne!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn npc_wander_is_deterministic() {
        let run = || {
            let mut config = quiet_config();
            config.npcs = true;
            config.goblin_count = 2;
            config.rat_count = 2;
            config.seed = "wander".to_owned();
            let mut world = World::new(config);
            for tick in 0..120 {
                world.set_tick(tick);
                world.step_actors(1.0 / 15.0);
            }
            world.snapshot().content_hash()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn reset_respawns_connected_players() {
        let mut world = World::new(quiet_config());
        world.add_player("player-1").unwrap();
        world.reset(&ResetRequest {
            seed: Some("fresh".to_owned()),
            ..Default::default()
        });
        assert!(world.has_player("player-1"));
        assert_eq!(world.config().seed, "fresh");
    }
}
