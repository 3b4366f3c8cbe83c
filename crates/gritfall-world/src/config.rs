//! World configuration, gameplay constants, and reset requests.
//!
//! The configuration is JSON-serializable because it is echoed to clients
//! inside snapshots and keyframes; clients use it to size the arena and
//! display the active seed.

use serde::{Deserialize, Serialize};

use crate::geom::TILE_SIZE;

// ---------------------------------------------------------------------------
// Gameplay constants
// ---------------------------------------------------------------------------

pub const PLAYER_MAX_HEALTH: i32 = 100;
/// Player movement speed, pixels per second.
pub const PLAYER_SPEED: f64 = 120.0;
/// Actor collision half-extent (actors are squares).
pub const ACTOR_HALF: f64 = 14.0;

pub const ACTION_ATTACK: &str = "attack";
pub const ACTION_FIREBALL: &str = "fireball";
/// The registered action set, in registration order.
pub const REGISTERED_ACTIONS: &[&str] = &[ACTION_ATTACK, ACTION_FIREBALL];

/// Cooldowns in ticks (15 Hz baseline).
pub const ATTACK_COOLDOWN_TICKS: u64 = 7;
pub const FIREBALL_COOLDOWN_TICKS: u64 = 15;
pub const MINE_COOLDOWN_TICKS: u64 = 20;

pub const ATTACK_DAMAGE: i32 = 10;
pub const FIREBALL_DAMAGE: i32 = 18;

/// Burning condition applied by lava: total duration and damage cadence.
pub const BURNING_DURATION_TICKS: u64 = 45;
pub const BURNING_INTERVAL_TICKS: u64 = 15;

/// How often an AI-controlled NPC picks a new wander target.
pub const NPC_WANDER_PERIOD_TICKS: u64 = 60;

// ---------------------------------------------------------------------------
// WorldConfig
// ---------------------------------------------------------------------------

/// Seeded world-generation parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldConfig {
    pub seed: String,
    pub width_tiles: i32,
    pub height_tiles: i32,
    pub obstacles: bool,
    pub obstacles_count: u32,
    pub gold_mines: bool,
    pub gold_mine_count: u32,
    pub lava: bool,
    pub lava_count: u32,
    pub npcs: bool,
    pub goblin_count: u32,
    pub rat_count: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: "default".to_owned(),
            width_tiles: 40,
            height_tiles: 24,
            obstacles: true,
            obstacles_count: 12,
            gold_mines: true,
            gold_mine_count: 3,
            lava: true,
            lava_count: 2,
            npcs: true,
            goblin_count: 3,
            rat_count: 4,
        }
    }
}

impl WorldConfig {
    pub fn width_px(&self) -> f64 {
        self.width_tiles as f64 * TILE_SIZE
    }

    pub fn height_px(&self) -> f64 {
        self.height_tiles as f64 * TILE_SIZE
    }
}

// ---------------------------------------------------------------------------
// ResetRequest
// ---------------------------------------------------------------------------

/// Partial overrides accepted by the world-reset endpoint. Unset fields
/// keep their current values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResetRequest {
    pub obstacles: Option<bool>,
    pub obstacles_count: Option<u32>,
    pub gold_mines: Option<bool>,
    pub gold_mine_count: Option<u32>,
    pub npcs: Option<bool>,
    pub goblin_count: Option<u32>,
    pub rat_count: Option<u32>,
    /// Total NPC override; splits evenly into goblins and rats unless the
    /// per-archetype counts are also given.
    pub npc_count: Option<u32>,
    pub lava: Option<bool>,
    pub lava_count: Option<u32>,
    pub seed: Option<String>,
}

impl ResetRequest {
    /// Apply the overrides to `config`.
    pub fn apply_to(&self, config: &mut WorldConfig) {
        if let Some(v) = self.obstacles {
            config.obstacles = v;
        }
        if let Some(v) = self.obstacles_count {
            config.obstacles_count = v;
        }
        if let Some(v) = self.gold_mines {
            config.gold_mines = v;
        }
        if let Some(v) = self.gold_mine_count {
            config.gold_mine_count = v;
        }
        if let Some(v) = self.npcs {
            config.npcs = v;
        }
        if let Some(total) = self.npc_count {
            config.goblin_count = total / 2;
            config.rat_count = total - config.goblin_count;
        }
        if let Some(v) = self.goblin_count {
            config.goblin_count = v;
        }
        if let Some(v) = self.rat_count {
            config.rat_count = v;
        }
        if let Some(v) = self.lava {
            config.lava = v;
        }
        if let Some(v) = self.lava_count {
            config.lava_count = v;
        }
        if let Some(seed) = &self.seed {
            config.seed = seed.clone();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_dimensions() {
        let config = WorldConfig::default();
        assert_eq!(config.width_px(), 1600.0);
        assert_eq!(config.height_px(), 960.0);
        assert_eq!(config.seed, "default");
    }

    #[test]
    fn reset_request_overrides_only_set_fields() {
        let mut config = WorldConfig::default();
        let req = ResetRequest {
            seed: Some("abc".to_owned()),
            goblin_count: Some(9),
            lava: Some(false),
            ..Default::default()
        };
        req.apply_to(&mut config);

        assert_eq!(config.seed, "abc");
        assert_eq!(config.goblin_count, 9);
        assert!(!config.lava);
        // Untouched fields keep defaults.
        assert_eq!(config.rat_count, 4);
        assert!(config.obstacles);
    }

    #[test]
    fn npc_count_splits_but_specific_counts_win() {
        let mut config = WorldConfig::default();
        ResetRequest {
            npc_count: Some(7),
            ..Default::default()
        }
        .apply_to(&mut config);
        assert_eq!(config.goblin_count, 3);
        assert_eq!(config.rat_count, 4);

        ResetRequest {
            npc_count: Some(10),
            rat_count: Some(1),
            ..Default::default()
        }
        .apply_to(&mut config);
        assert_eq!(config.goblin_count, 5);
        assert_eq!(config.rat_count, 1);
    }

    #[test]
    fn reset_request_parses_sparse_json() {
        let req: ResetRequest = serde_json::from_str(r#"{"seed":"abc","goldMineCount":5}"#).unwrap();
        assert_eq!(req.seed.as_deref(), Some("abc"));
        assert_eq!(req.gold_mine_count, Some(5));
        assert!(req.lava.is_none());
    }
}
