//! Effect intents: requests from gameplay code to spawn an effect.

use gritfall_world::actor::Facing;
use gritfall_world::geom::Vec2;
use gritfall_world::world::ActionTrigger;

use crate::catalog::{ENTRY_ATTACK, ENTRY_FIREBALL};

/// A queued request to spawn one effect instance.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectIntent {
    /// Catalog entry to spawn.
    pub entry_id: String,
    /// Actor that caused the effect, if any.
    pub source_actor_id: Option<String>,
    /// Explicit target actor, for target-delivered effects.
    pub target_actor_id: Option<String>,
    /// Spawn origin.
    pub origin: Vec2,
    /// Aim direction for directional effects.
    pub facing: Facing,
    /// Run `on_tick` every N ticks (1 = every tick).
    pub tick_cadence: u64,
    /// Override the contract's default lifetime.
    pub lifetime_override: Option<u64>,
    /// Actor to follow, for follow-motion effects.
    pub attach_to: Option<String>,
}

impl EffectIntent {
    /// Intent for a validated world action trigger. Returns `None` for
    /// action names with no effect mapping (the registered action set and
    /// this mapping are kept in lockstep).
    pub fn for_action(trigger: &ActionTrigger) -> Option<EffectIntent> {
        let entry_id = match trigger.action.as_str() {
            "attack" => ENTRY_ATTACK,
            "fireball" => ENTRY_FIREBALL,
            _ => return None,
        };
        Some(EffectIntent {
            entry_id: entry_id.to_owned(),
            source_actor_id: Some(trigger.actor.clone()),
            target_actor_id: None,
            origin: trigger.pos,
            facing: trigger.facing,
            tick_cadence: 1,
            lifetime_override: None,
            attach_to: None,
        })
    }

    /// Intent for a status visual attached to `actor`.
    pub fn for_attachment(entry_id: &str, actor: &str, pos: Vec2, lifetime: u64) -> EffectIntent {
        EffectIntent {
            entry_id: entry_id.to_owned(),
            source_actor_id: Some(actor.to_owned()),
            target_actor_id: None,
            origin: pos,
            facing: Facing::Down,
            tick_cadence: 1,
            lifetime_override: Some(lifetime),
            attach_to: Some(actor.to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_mapping_covers_registered_actions() {
        for action in gritfall_world::config::REGISTERED_ACTIONS {
            let trigger = ActionTrigger {
                actor: "player-1".to_owned(),
                action: (*action).to_owned(),
                pos: Vec2::new(10.0, 10.0),
                facing: Facing::Left,
            };
            let intent = EffectIntent::for_action(&trigger).unwrap();
            assert_eq!(intent.source_actor_id.as_deref(), Some("player-1"));
            assert_eq!(intent.facing, Facing::Left);
        }
    }

    #[test]
    fn unmapped_action_yields_none() {
        let trigger = ActionTrigger {
            actor: "player-1".to_owned(),
            action: "dance".to_owned(),
            pos: Vec2::ZERO,
            facing: Facing::Up,
        };
        assert!(EffectIntent::for_action(&trigger).is_none());
    }
}
