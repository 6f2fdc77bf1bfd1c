use crate::ability::{default_abilities, Abilities, AbilityKind};
use crate::{
    MAX_HEALTH, PLAYER_SIZE, PLAYER_SPEED, PROJECTILE_BOUNDS_MARGIN, PROJECTILE_SIZE,
    PROJECTILE_SPAWN_DISTANCE, PROJECTILE_SPEED,
};
use serde::{Deserialize, Serialize};

/// Axis-aligned box in world coordinates, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// True when the boxes overlap. Touching edges do not count.
    pub fn intersects(&self, other: &Rect) -> bool {
        let (x1, y1, x2, y2) = (self.x, self.y, self.x + self.width, self.y + self.height);
        let (x3, y3, x4, y4) = (
            other.x,
            other.y,
            other.x + other.width,
            other.y + other.height,
        );

        !(x2 <= x3 || x4 <= x1 || y2 <= y3 || y4 <= y1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    Human,
    Bot,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
}

impl Projectile {
    pub fn advance(&mut self) {
        self.x += self.vel_x;
        self.y += self.vel_y;
    }

    /// Hit box centred on the projectile position.
    pub fn bounds(&self) -> Rect {
        let half = PROJECTILE_SIZE / 2.0;
        Rect::new(self.x - half, self.y - half, PROJECTILE_SIZE, PROJECTILE_SIZE)
    }

    pub fn is_out_of_bounds(&self, map_width: f32, map_height: f32) -> bool {
        let m = PROJECTILE_BOUNDS_MARGIN;
        !(-m < self.x && self.x < map_width + m && -m < self.y && self.y < map_height + m)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.vel_x.is_finite() && self.vel_y.is_finite()
    }
}

/// A temporary projectile-blocking structure as seen by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub lifetime_ms: u64,
    pub remaining_ms: u64,
}

impl Obstacle {
    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// One simulated actor. Humans and bots share this shape; only the
/// server-side driver differs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: u32,
    pub kind: EntityKind,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub speed: f32,
    pub health: i32,
    /// Bumped by every server respawn. Clients echo it back so the server
    /// can tell an update built before the respawn from one built after.
    pub life: u32,
    pub nickname: String,
    pub appearance: String,
    pub projectiles: Vec<Projectile>,
    pub abilities: Abilities,
}

impl Player {
    pub fn new(id: u32, kind: EntityKind, x: f32, y: f32) -> Self {
        Self {
            id,
            kind,
            x,
            y,
            width: PLAYER_SIZE,
            height: PLAYER_SIZE,
            speed: PLAYER_SPEED,
            health: MAX_HEALTH,
            life: 0,
            nickname: format!("Player_{}", id),
            appearance: "DEFAULT".to_string(),
            projectiles: Vec::new(),
            abilities: default_abilities(),
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    pub fn is_bot(&self) -> bool {
        self.kind == EntityKind::Bot
    }

    pub fn shield_active(&self) -> bool {
        self.abilities
            .get(&AbilityKind::Shield)
            .is_some_and(|shield| shield.is_active())
    }

    pub fn tick_abilities(&mut self) {
        for ability in self.abilities.values_mut() {
            ability.tick();
        }
    }

    /// Subtracts damage and clamps health to `[0, MAX_HEALTH]`.
    /// Returns the remaining health.
    pub fn take_damage(&mut self, damage: i32) -> i32 {
        self.health = (self.health - damage).clamp(0, MAX_HEALTH);
        self.health
    }

    /// Fires one projectile from the centre towards a world-space point.
    pub fn shoot_at(&mut self, target_x: f32, target_y: f32) {
        let (cx, cy) = self.center();
        let angle = (target_y - cy).atan2(target_x - cx);
        let (sin, cos) = angle.sin_cos();

        self.projectiles.push(Projectile {
            x: cx + cos * PROJECTILE_SPAWN_DISTANCE,
            y: cy + sin * PROJECTILE_SPAWN_DISTANCE,
            vel_x: cos * PROJECTILE_SPEED,
            vel_y: sin * PROJECTILE_SPEED,
        });
    }

    pub fn advance_projectiles(&mut self) {
        for projectile in &mut self.projectiles {
            projectile.advance();
        }
    }

    /// Drops projectiles that left the map by more than the margin.
    /// Returns how many were removed.
    pub fn prune_projectiles(&mut self, map_width: f32, map_height: f32) -> usize {
        let before = self.projectiles.len();
        self.projectiles
            .retain(|p| !p.is_out_of_bounds(map_width, map_height));
        before - self.projectiles.len()
    }

    pub fn clamp_to_map(&mut self, map_width: f32, map_height: f32) {
        self.x = self.x.clamp(0.0, (map_width - self.width).max(0.0));
        self.y = self.y.clamp(0.0, (map_height - self.height).max(0.0));
    }
}
