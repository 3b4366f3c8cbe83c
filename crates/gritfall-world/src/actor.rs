//! Actors: the base mutable entity plus player and NPC specializations.
//!
//! Every observable mutation of an actor must go through a method that
//! bumps the actor's `version` counter; the world emits one patch per
//! version advance, which is what keeps the replication invariant
//! ("a patch is emitted iff the version advanced") honest.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::condition::{Condition, ConditionKind};
use crate::geom::Vec2;
use crate::item::{Equipment, Inventory};

// ---------------------------------------------------------------------------
// Facing
// ---------------------------------------------------------------------------

/// Four-way facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    Up,
    Down,
    Left,
    Right,
}

impl Facing {
    /// Unit vector for this facing.
    pub fn vector(self) -> Vec2 {
        match self {
            Self::Up => Vec2::new(0.0, -1.0),
            Self::Down => Vec2::new(0.0, 1.0),
            Self::Left => Vec2::new(-1.0, 0.0),
            Self::Right => Vec2::new(1.0, 0.0),
        }
    }

    /// Facing implied by a movement vector, dominant axis wins. Returns
    /// `None` for the zero vector.
    pub fn from_vector(v: Vec2) -> Option<Facing> {
        if v.x == 0.0 && v.y == 0.0 {
            return None;
        }
        Some(if v.x.abs() >= v.y.abs() {
            if v.x > 0.0 {
                Facing::Right
            } else {
                Facing::Left
            }
        } else if v.y > 0.0 {
            Facing::Down
        } else {
            Facing::Up
        })
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// State shared by players and NPCs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub id: String,
    pub pos: Vec2,
    pub facing: Facing,
    pub health: i32,
    pub max_health: i32,
    pub inventory: Inventory,
    pub equipment: Equipment,
    /// Strictly increases on every observable mutation.
    pub version: u64,
    /// Tick at which each named action becomes usable again.
    pub cooldowns: BTreeMap<String, u64>,
    pub conditions: BTreeMap<ConditionKind, Condition>,
}

impl Actor {
    pub fn new(id: impl Into<String>, pos: Vec2, max_health: i32) -> Self {
        Self {
            id: id.into(),
            pos,
            facing: Facing::Down,
            health: max_health,
            max_health,
            inventory: Inventory::new(),
            equipment: Equipment::new(),
            version: 0,
            cooldowns: BTreeMap::new(),
            conditions: BTreeMap::new(),
        }
    }

    /// Advance the version counter and return the new value.
    pub fn bump_version(&mut self) -> u64 {
        self.version += 1;
        self.version
    }

    pub fn is_dead(&self) -> bool {
        self.health <= 0
    }

    /// Apply damage, clamping at zero. Returns the new health.
    pub fn apply_damage(&mut self, amount: i32) -> i32 {
        self.health = (self.health - amount).max(0);
        self.health
    }

    /// Whether `action` is off cooldown at `tick`.
    pub fn action_ready(&self, action: &str, tick: u64) -> bool {
        self.cooldowns.get(action).map_or(true, |&ready| tick >= ready)
    }

    /// Start a cooldown: `action` becomes ready again at `tick + duration`.
    pub fn start_cooldown(&mut self, action: &str, tick: u64, duration: u64) {
        self.cooldowns.insert(action.to_owned(), tick + duration);
    }

    /// Insert or refresh a condition. Refreshing keeps the later expiry.
    pub fn apply_condition(&mut self, condition: Condition) {
        match self.conditions.get_mut(&condition.kind) {
            Some(existing) => {
                if condition.expires_at > existing.expires_at {
                    existing.expires_at = condition.expires_at;
                }
                // Keep the earlier tick schedule so refresh never skips a
                // pending damage tick.
                existing.next_tick_at = existing.next_tick_at.min(condition.next_tick_at);
                if condition.attached_effect.is_some() {
                    existing.attached_effect = condition.attached_effect;
                }
            }
            None => {
                self.conditions.insert(condition.kind, condition);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// A path being followed, produced by the A* planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathFollow {
    /// Tile-center waypoints, in travel order.
    pub waypoints: Vec<Vec2>,
    /// Index of the next waypoint to reach.
    pub next: usize,
    /// The point the player asked to reach.
    pub target: Vec2,
}

/// A connected player's actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    #[serde(flatten)]
    pub actor: Actor,
    /// Current movement intent, already clamped to unit length.
    pub intent: Vec2,
    /// Active A* path, if any. Setting an intent clears it.
    pub path: Option<PathFollow>,
    /// Experience earned from kills.
    pub xp: u32,
}

impl Player {
    pub fn new(id: impl Into<String>, pos: Vec2, max_health: i32) -> Self {
        Self {
            actor: Actor::new(id, pos, max_health),
            intent: Vec2::ZERO,
            path: None,
            xp: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Npc
// ---------------------------------------------------------------------------

/// NPC archetypes available to world generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NpcArchetype {
    Goblin,
    Rat,
}

impl NpcArchetype {
    pub fn max_health(self) -> i32 {
        match self {
            Self::Goblin => 40,
            Self::Rat => 15,
        }
    }

    pub fn xp_reward(self) -> u32 {
        match self {
            Self::Goblin => 25,
            Self::Rat => 5,
        }
    }

    /// Movement speed in pixels per second.
    pub fn speed(self) -> f64 {
        match self {
            Self::Goblin => 70.0,
            Self::Rat => 95.0,
        }
    }
}

/// An AI-driven actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Npc {
    #[serde(flatten)]
    pub actor: Actor,
    pub archetype: NpcArchetype,
    pub ai_controlled: bool,
    pub xp_reward: u32,
    /// Where the wander behavior is currently headed, if anywhere.
    pub wander_target: Option<Vec2>,
    /// Tick at which the wander behavior picks a new target.
    pub next_decision_tick: u64,
}

impl Npc {
    pub fn new(id: impl Into<String>, pos: Vec2, archetype: NpcArchetype) -> Self {
        Self {
            actor: Actor::new(id, pos, archetype.max_health()),
            archetype,
            ai_controlled: true,
            xp_reward: archetype.xp_reward(),
            wander_target: None,
            next_decision_tick: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;

    #[test]
    fn facing_from_vector_dominant_axis() {
        assert_eq!(Facing::from_vector(Vec2::new(1.0, 0.2)), Some(Facing::Right));
        assert_eq!(Facing::from_vector(Vec2::new(-0.5, 0.1)), Some(Facing::Left));
        assert_eq!(Facing::from_vector(Vec2::new(0.1, 0.9)), Some(Facing::Down));
        assert_eq!(Facing::from_vector(Vec2::new(0.0, -1.0)), Some(Facing::Up));
        assert_eq!(Facing::from_vector(Vec2::ZERO), None);
    }

    #[test]
    fn version_bumps_are_strictly_increasing() {
        let mut actor = Actor::new("player-1", Vec2::ZERO, 100);
        let v1 = actor.bump_version();
        let v2 = actor.bump_version();
        assert!(v2 > v1);
    }

    #[test]
    fn damage_clamps_at_zero() {
        let mut actor = Actor::new("npc-1", Vec2::ZERO, 10);
        assert_eq!(actor.apply_damage(4), 6);
        assert_eq!(actor.apply_damage(100), 0);
        assert!(actor.is_dead());
    }

    #[test]
    fn cooldown_gate() {
        let mut actor = Actor::new("player-1", Vec2::ZERO, 100);
        assert!(actor.action_ready("attack", 0));
        actor.start_cooldown("attack", 10, 8);
        assert!(!actor.action_ready("attack", 17));
        assert!(actor.action_ready("attack", 18));
    }

    #[test]
    fn condition_refresh_keeps_later_expiry() {
        let mut actor = Actor::new("player-1", Vec2::ZERO, 100);
        actor.apply_condition(Condition::new(ConditionKind::Burning, 10, 2, 3, None));
        actor.apply_condition(Condition::new(ConditionKind::Burning, 20, 2, 3, Some(7)));

        let cond = &actor.conditions[&ConditionKind::Burning];
        assert_eq!(cond.expires_at, 20);
        assert_eq!(cond.attached_effect, Some(7));

        // A shorter re-application does not truncate the expiry.
        actor.apply_condition(Condition::new(ConditionKind::Burning, 5, 2, 3, None));
        assert_eq!(actor.conditions[&ConditionKind::Burning].expires_at, 20);
    }

    #[test]
    fn player_json_flattens_actor_fields() {
        let player = Player::new("player-1", Vec2::new(3.0, 4.0), 100);
        let json = serde_json::to_value(&player).unwrap();
        assert_eq!(json["id"], "player-1");
        assert_eq!(json["facing"], "down");
        assert_eq!(json["maxHealth"], 100);
    }
}
