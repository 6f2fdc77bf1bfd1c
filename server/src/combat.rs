//! Damage authority shared by session handling and the tick loop.
//!
//! Client-reported hits are requests; this is the only place health is
//! lowered. Killed entities are respawned here, so no dead entity ever
//! reaches a snapshot.

use crate::world::World;
use log::info;
use shared::MAX_HIT_DAMAGE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcome {
    /// Unknown target, self-hit or dead target.
    Ignored,
    /// Target's shield was up; nothing changed.
    Blocked,
    Damaged { remaining: i32 },
    Killed,
}

/// Applies one hit from `attacker_id` to `target_id`.
pub fn apply_hit(world: &mut World, attacker_id: u32, target_id: u32, damage: i32) -> HitOutcome {
    if attacker_id == target_id {
        return HitOutcome::Ignored;
    }
    let attacker = world
        .nickname(attacker_id)
        .unwrap_or_else(|| format!("#{}", attacker_id));
    let damage = damage.clamp(0, MAX_HIT_DAMAGE);

    let Some(target) = world.player_mut(target_id) else {
        return HitOutcome::Ignored;
    };
    if !target.is_alive() {
        return HitOutcome::Ignored;
    }
    if target.shield_active() {
        let note = format!("[SHIELD] {} blocked {}", target.nickname, attacker);
        world.chat.push(note);
        return HitOutcome::Blocked;
    }

    let remaining = target.take_damage(damage);
    if remaining > 0 {
        return HitOutcome::Damaged { remaining };
    }

    let victim = target.nickname.clone();
    info!("{} killed {}", attacker, victim);
    world.chat.push(format!("[KILL] {} -> {}", attacker, victim));
    world.respawn(target_id);
    HitOutcome::Killed
}

/// Respawns `id` if its health dropped to zero. Returns whether it did.
pub fn respawn_if_dead(world: &mut World, id: u32) -> bool {
    match world.player(id) {
        Some(player) if !player.is_alive() => world.respawn(id),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{AbilityKind, MAP_HEIGHT, MAP_WIDTH, MAX_HEALTH};
    use std::time::Instant;

    fn arena() -> World {
        let mut world = World::with_seed(MAP_WIDTH, MAP_HEIGHT, 11);
        world.add_player(1);
        world.add_player(7);
        world.player_mut(1).unwrap().nickname = "Alice".to_string();
        world.player_mut(7).unwrap().nickname = "Bob".to_string();
        world
    }

    #[test]
    fn test_hit_subtracts_damage() {
        let mut world = arena();
        world.player_mut(7).unwrap().health = 35;

        let outcome = apply_hit(&mut world, 1, 7, 10);
        assert_eq!(outcome, HitOutcome::Damaged { remaining: 25 });
        assert_eq!(world.player(7).unwrap().health, 25);
    }

    #[test]
    fn test_lethal_hit_announces_kill_and_respawns() {
        let mut world = arena();
        world.player_mut(7).unwrap().health = 5;
        let chat_before = world.chat.last_seq();

        assert_eq!(apply_hit(&mut world, 1, 7, 10), HitOutcome::Killed);
        assert_eq!(world.player(7).unwrap().health, MAX_HEALTH);

        let lines = world.chat.since(chat_before);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].text.contains("Alice"));
        assert!(lines[0].text.contains("Bob"));
        assert!(lines[0].text.starts_with("[KILL]"));
    }

    #[test]
    fn test_shield_blocks_damage() {
        let mut world = arena();
        world.cast_ability(7, AbilityKind::Shield, Instant::now());
        let chat_before = world.chat.last_seq();

        assert_eq!(apply_hit(&mut world, 1, 7, 25), HitOutcome::Blocked);
        let target = world.player(7).unwrap();
        assert_eq!(target.health, MAX_HEALTH);
        assert!(target.shield_active());

        let lines = world.chat.since(chat_before);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].text.contains("blocked"));
    }

    #[test]
    fn test_unknown_target_and_self_hits_are_ignored() {
        let mut world = arena();
        assert_eq!(apply_hit(&mut world, 1, 999, 10), HitOutcome::Ignored);
        assert_eq!(apply_hit(&mut world, 1, 1, 10), HitOutcome::Ignored);
        assert_eq!(world.player(1).unwrap().health, MAX_HEALTH);
    }

    #[test]
    fn test_damage_is_clamped_to_server_limits() {
        let mut world = arena();
        assert_eq!(
            apply_hit(&mut world, 1, 7, 10_000),
            HitOutcome::Damaged {
                remaining: MAX_HEALTH - MAX_HIT_DAMAGE
            }
        );
        assert_eq!(
            apply_hit(&mut world, 1, 7, -40),
            HitOutcome::Damaged {
                remaining: MAX_HEALTH - MAX_HIT_DAMAGE
            }
        );
    }

    #[test]
    fn test_respawn_if_dead() {
        let mut world = arena();
        assert!(!respawn_if_dead(&mut world, 1));
        world.player_mut(1).unwrap().health = 0;
        assert!(respawn_if_dead(&mut world, 1));
        assert_eq!(world.player(1).unwrap().health, MAX_HEALTH);
    }
}
