//! Server-driven opponents.

use rand::seq::SliceRandom;
use rand::Rng;
use shared::Player;
use std::f32::consts::TAU;

pub const PERCEPTION_RADIUS: f32 = 800.0;
/// Bots close in while farther than this from their target.
pub const ENGAGE_DISTANCE: f32 = 300.0;
/// Bots back off while closer than this.
pub const RETREAT_DISTANCE: f32 = 150.0;
pub const APPROACH_FACTOR: f32 = 0.8;
pub const PATROL_SPEED: f32 = 2.0;
pub const PATROL_TICKS: u32 = 100;
pub const SHOOT_COOLDOWN_TICKS: u32 = 40;
pub const AIM_JITTER: f32 = 20.0;

const NAMES: &[&str] = &[
    "Vasyan", "CyberDemon", "RoboCop", "Data", "Marvin", "WALL-E", "Bender", "T-800", "C-3PO",
    "R2-D2",
];

pub fn pick_nickname<R: Rng>(rng: &mut R) -> String {
    let name = NAMES.choose(rng).copied().unwrap_or("Drone");
    format!("[BOT] {}", name)
}

/// What a bot can see of another living entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sighting {
    pub id: u32,
    pub center: (f32, f32),
}

impl Sighting {
    pub fn of(player: &Player) -> Self {
        Self {
            id: player.id,
            center: player.center(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BotBrain {
    pub target: Option<u32>,
    pub shoot_cooldown: u32,
    pub patrol_dir: (f32, f32),
    pub patrol_timer: u32,
    pub perception_radius: f32,
}

impl Default for BotBrain {
    fn default() -> Self {
        Self::new()
    }
}

impl BotBrain {
    pub fn new() -> Self {
        Self {
            target: None,
            shoot_cooldown: 0,
            patrol_dir: (0.0, 0.0),
            patrol_timer: 0,
            perception_radius: PERCEPTION_RADIUS,
        }
    }

    /// Nearest sighting within perception range, compared by squared distance.
    fn acquire(&self, me: &Player, visible: &[Sighting]) -> Option<(Sighting, f32)> {
        let (mx, my) = me.center();
        let range_sq = self.perception_radius * self.perception_radius;

        visible
            .iter()
            .filter(|s| s.id != me.id)
            .map(|s| {
                let (dx, dy) = (s.center.0 - mx, s.center.1 - my);
                (*s, dx * dx + dy * dy)
            })
            .filter(|(_, dist_sq)| *dist_sq < range_sq)
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Runs one tick of AI for `me`: pick a target, move, maybe fire, and
    /// stay inside the map.
    pub fn think<R: Rng>(
        &mut self,
        me: &mut Player,
        visible: &[Sighting],
        map_width: f32,
        map_height: f32,
        rng: &mut R,
    ) {
        let acquired = self.acquire(me, visible);
        self.target = acquired.map(|(s, _)| s.id);

        match acquired {
            Some((target, dist_sq)) => {
                let (mx, my) = me.center();
                let angle = (target.center.1 - my).atan2(target.center.0 - mx);
                let (sin, cos) = angle.sin_cos();
                let step = me.speed * APPROACH_FACTOR;
                let dist = dist_sq.sqrt();

                if dist > ENGAGE_DISTANCE {
                    me.x += cos * step;
                    me.y += sin * step;
                } else if dist < RETREAT_DISTANCE {
                    me.x -= cos * step;
                    me.y -= sin * step;
                }

                if self.shoot_cooldown == 0 {
                    let aim_x = target.center.0 + rng.gen_range(-AIM_JITTER..=AIM_JITTER);
                    let aim_y = target.center.1 + rng.gen_range(-AIM_JITTER..=AIM_JITTER);
                    me.shoot_at(aim_x, aim_y);
                    self.shoot_cooldown = SHOOT_COOLDOWN_TICKS;
                }
            }
            None => {
                if self.patrol_timer == 0 {
                    let angle = rng.gen_range(0.0..TAU);
                    self.patrol_dir = (angle.cos(), angle.sin());
                    self.patrol_timer = PATROL_TICKS;
                }
                me.x += self.patrol_dir.0 * PATROL_SPEED;
                me.y += self.patrol_dir.1 * PATROL_SPEED;
                self.patrol_timer -= 1;
            }
        }

        me.clamp_to_map(map_width, map_height);
        self.shoot_cooldown = self.shoot_cooldown.saturating_sub(1);
    }
}
