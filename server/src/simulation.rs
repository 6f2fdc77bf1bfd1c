//! One fixed-interval pass over the world.
//!
//! Per tick, for every entity: ability counters tick down, bots think,
//! projectiles are advanced (bot-owned only; clients move their own) and
//! tested against obstacles and, for bot fire, against living unshielded
//! entities. Expired obstacles are dropped last.

use crate::bot::Sighting;
use crate::combat::{self, HitOutcome};
use crate::world::{Driver, World};
use shared::{Projectile, PROJECTILE_DAMAGE};
use std::time::Instant;

/// What one tick changed, for logging and tests
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    /// Entities killed by bot fire this tick
    pub kills: usize,
    pub projectiles_removed: usize,
    pub expired_obstacles: Vec<u32>,
}

/// Advances the world by one tick at time `now`.
pub fn tick(world: &mut World, now: Instant) -> TickReport {
    world.tick += 1;
    let mut report = TickReport {
        tick: world.tick,
        ..TickReport::default()
    };

    for entity in world.entities.values_mut() {
        entity.player.tick_abilities();
    }

    run_bots(world);

    let ids: Vec<u32> = world.entities.keys().copied().collect();
    for id in ids {
        resolve_projectiles(world, id, &mut report);
    }

    report.expired_obstacles = world.expire_obstacles(now);
    report
}

fn run_bots(world: &mut World) {
    let bot_ids: Vec<u32> = world
        .entities
        .iter()
        .filter(|(_, entity)| entity.is_bot())
        .map(|(id, _)| *id)
        .collect();

    for id in bot_ids {
        let visible: Vec<Sighting> = world
            .entities
            .values()
            .filter(|entity| entity.player.id != id && entity.player.is_alive())
            .map(|entity| Sighting::of(&entity.player))
            .collect();
        let (width, height) = (world.width, world.height);

        let (entities, rng) = world.entities_and_rng();
        if let Some(entity) = entities.get_mut(&id) {
            if let Driver::Bot(brain) = &mut entity.driver {
                brain.think(&mut entity.player, &visible, width, height, rng);
            }
        }
    }
}

fn resolve_projectiles(world: &mut World, owner: u32, report: &mut TickReport) {
    let (width, height) = (world.width, world.height);
    let Some(entity) = world.entities.get_mut(&owner) else {
        return;
    };
    let from_bot = entity.is_bot();
    if from_bot {
        entity.player.advance_projectiles();
    }
    report.projectiles_removed += entity.player.prune_projectiles(width, height);
    let projectiles = std::mem::take(&mut entity.player.projectiles);

    let mut surviving: Vec<Projectile> = Vec::with_capacity(projectiles.len());
    for projectile in projectiles {
        let bounds = projectile.bounds();

        if world
            .obstacles
            .values()
            .any(|obstacle| obstacle.rect.intersects(&bounds))
        {
            report.projectiles_removed += 1;
            continue;
        }

        if from_bot {
            let struck = world
                .entities
                .values()
                .map(|entity| &entity.player)
                .find(|target| {
                    target.id != owner
                        && target.is_alive()
                        && !target.shield_active()
                        && target.bounds().intersects(&bounds)
                })
                .map(|target| target.id);

            if let Some(target_id) = struck {
                if combat::apply_hit(world, owner, target_id, PROJECTILE_DAMAGE)
                    == HitOutcome::Killed
                {
                    report.kills += 1;
                }
                report.projectiles_removed += 1;
                continue;
            }
        }

        surviving.push(projectile);
    }

    if let Some(player) = world.player_mut(owner) {
        player.projectiles = surviving;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::BOT_ID_BASE;
    use shared::{AbilityKind, Projectile, MAP_HEIGHT, MAP_WIDTH, MAX_HEALTH};
    use std::time::Duration;

    fn world() -> World {
        World::with_seed(MAP_WIDTH, MAP_HEIGHT, 5)
    }

    fn still(x: f32, y: f32) -> Projectile {
        Projectile {
            x,
            y,
            vel_x: 0.0,
            vel_y: 0.0,
        }
    }

    #[test]
    fn test_tick_counts_down_abilities() {
        let mut world = world();
        world.add_player(1);
        world.cast_ability(1, AbilityKind::Shield, Instant::now());

        tick(&mut world, Instant::now());
        let shield = &world.player(1).unwrap().abilities[&AbilityKind::Shield];
        assert_eq!(shield.duration, shield.duration_max - 1);
        assert_eq!(shield.cooldown, shield.cooldown_max - 1);
    }

    #[test]
    fn test_projectile_leaving_map_is_removed() {
        let mut world = world();
        world.add_player(1);
        world.player_mut(1).unwrap().projectiles =
            vec![still(-150.0, 10.0), still(500.0, 500.0)];

        let report = tick(&mut world, Instant::now());
        assert_eq!(report.projectiles_removed, 1);
        assert_eq!(world.player(1).unwrap().projectiles.len(), 1);
    }

    #[test]
    fn test_obstacle_absorbs_projectile() {
        let mut world = world();
        world.add_player(1);
        world.add_player(2);
        let now = Instant::now();
        world.cast_ability(2, AbilityKind::Wall, now);
        let wall = world.obstacles.values().next().unwrap().rect;

        world.player_mut(1).unwrap().projectiles =
            vec![still(wall.x + wall.width / 2.0, wall.y + wall.height / 2.0)];

        tick(&mut world, now);
        assert!(world.player(1).unwrap().projectiles.is_empty());
    }

    #[test]
    fn test_human_projectiles_do_not_damage_on_server() {
        let mut world = world();
        world.add_player(1);
        world.add_player(2);
        let (cx, cy) = world.player(2).unwrap().center();
        world.player_mut(1).unwrap().projectiles = vec![still(cx, cy)];

        tick(&mut world, Instant::now());
        assert_eq!(world.player(2).unwrap().health, MAX_HEALTH);
        assert_eq!(world.player(1).unwrap().projectiles.len(), 1);
    }

    fn bot_with_shot_at(world: &mut World, target: u32) -> u32 {
        let bot = world.spawn_bots(1, 10)[0];
        let (cx, cy) = world.player(target).unwrap().center();
        // Park the bot far away so its own AI does not fire this tick.
        let player = world.player_mut(bot).unwrap();
        player.x = 1900.0;
        player.y = 1900.0;
        player.projectiles = vec![still(cx, cy)];
        if let Some(entity) = world.entities.get_mut(&bot) {
            if let Driver::Bot(brain) = &mut entity.driver {
                brain.shoot_cooldown = 100;
            }
        }
        bot
    }

    #[test]
    fn test_bot_projectile_damages_target() {
        let mut world = world();
        world.add_player(1);
        world.player_mut(1).unwrap().x = 100.0;
        world.player_mut(1).unwrap().y = 100.0;
        let bot = bot_with_shot_at(&mut world, 1);

        tick(&mut world, Instant::now());
        assert_eq!(world.player(1).unwrap().health, MAX_HEALTH - PROJECTILE_DAMAGE);
        assert!(world.player(bot).unwrap().projectiles.is_empty());
    }

    #[test]
    fn test_bot_projectile_passes_shielded_target() {
        let mut world = world();
        world.add_player(1);
        world.player_mut(1).unwrap().x = 100.0;
        world.player_mut(1).unwrap().y = 100.0;
        world.cast_ability(1, AbilityKind::Shield, Instant::now());
        let bot = bot_with_shot_at(&mut world, 1);

        tick(&mut world, Instant::now());
        assert_eq!(world.player(1).unwrap().health, MAX_HEALTH);
        assert_eq!(world.player(bot).unwrap().projectiles.len(), 1);
    }

    #[test]
    fn test_bot_kill_is_announced_and_victim_respawns() {
        let mut world = world();
        world.add_player(1);
        {
            let player = world.player_mut(1).unwrap();
            player.x = 100.0;
            player.y = 100.0;
            player.health = PROJECTILE_DAMAGE;
        }
        bot_with_shot_at(&mut world, 1);
        let before = world.chat.last_seq();

        let report = tick(&mut world, Instant::now());
        assert_eq!(report.kills, 1);
        assert_eq!(world.player(1).unwrap().health, MAX_HEALTH);
        assert_eq!(world.player(1).unwrap().life, 1);
        assert!(world.chat.since(before)[0].text.starts_with("[KILL] [BOT]"));
    }

    #[test]
    fn test_bots_move_and_stay_in_bounds() {
        let mut world = world();
        world.spawn_bots(5, 10);
        let now = Instant::now();
        for _ in 0..500 {
            tick(&mut world, now);
        }
        for entity in world.entities.values() {
            let p = &entity.player;
            assert!(p.x >= 0.0 && p.x <= MAP_WIDTH - p.width);
            assert!(p.y >= 0.0 && p.y <= MAP_HEIGHT - p.height);
            assert!(p.health >= 0 && p.health <= MAX_HEALTH);
        }
        assert!(world.entities.contains_key(&BOT_ID_BASE));
    }

    #[test]
    fn test_obstacle_expires_on_tick() {
        let mut world = world();
        world.add_player(1);
        let t = Instant::now();
        world.cast_ability(1, AbilityKind::Wall, t);

        assert!(tick(&mut world, t + Duration::from_millis(4900))
            .expired_obstacles
            .is_empty());
        assert_eq!(
            tick(&mut world, t + Duration::from_millis(5100)).expired_obstacles,
            vec![1]
        );
    }
}
