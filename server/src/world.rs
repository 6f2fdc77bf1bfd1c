//! The shared registry every session and the tick loop operate on.
//!
//! Players and bots live in one id namespace: humans are numbered from 1,
//! bots from [`BOT_ID_BASE`]. Only the server task owning the [`World`]
//! mutates it.

use crate::bot::BotBrain;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{
    AbilityKind, ChatLine, EntityKind, Obstacle, Player, Rect, Snapshot, CHAT_CAPACITY,
    MAX_HEALTH, WALL_HEIGHT, WALL_LIFETIME_MS, WALL_WIDTH,
};
use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

/// First id handed to a bot; player ids stay below it.
pub const BOT_ID_BASE: u32 = 100_000;

const SPAWN_MARGIN: f32 = 100.0;
const WALL_GAP: f32 = 5.0;

/// Who decides how an entity moves.
#[derive(Debug, Clone)]
pub enum Driver {
    Human,
    Bot(BotBrain),
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub player: Player,
    pub driver: Driver,
}

impl Entity {
    pub fn is_bot(&self) -> bool {
        matches!(self.driver, Driver::Bot(_))
    }
}

/// Bounded chat history; every line gets a sequence number so clients can
/// acknowledge what they already hold.
#[derive(Debug, Clone)]
pub struct ChatLog {
    lines: VecDeque<ChatLine>,
    capacity: usize,
    last_seq: u64,
}

impl ChatLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
            last_seq: 0,
        }
    }

    /// Appends a line, evicting the oldest once over capacity.
    pub fn push(&mut self, text: impl Into<String>) -> u64 {
        self.last_seq += 1;
        self.lines.push_back(ChatLine {
            seq: self.last_seq,
            text: text.into(),
        });
        while self.lines.len() > self.capacity {
            self.lines.pop_front();
        }
        self.last_seq
    }

    /// Lines newer than `ack` that are still retained.
    pub fn since(&self, ack: u64) -> Vec<ChatLine> {
        self.lines
            .iter()
            .filter(|line| line.seq > ack)
            .cloned()
            .collect()
    }

    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|line| line.text.as_str())
    }
}

/// Server-side obstacle: geometry plus the instant it was placed.
#[derive(Debug, Clone)]
pub struct PlacedObstacle {
    pub id: u32,
    pub rect: Rect,
    pub created_at: Instant,
    pub lifetime: Duration,
}

impl PlacedObstacle {
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= self.lifetime
    }

    pub fn to_wire(&self, now: Instant) -> Obstacle {
        let age = now.saturating_duration_since(self.created_at);
        Obstacle {
            id: self.id,
            x: self.rect.x,
            y: self.rect.y,
            width: self.rect.width,
            height: self.rect.height,
            lifetime_ms: self.lifetime.as_millis() as u64,
            remaining_ms: self.lifetime.saturating_sub(age).as_millis() as u64,
        }
    }
}

pub struct World {
    pub entities: BTreeMap<u32, Entity>,
    pub obstacles: BTreeMap<u32, PlacedObstacle>,
    pub chat: ChatLog,
    pub width: f32,
    pub height: f32,
    pub tick: u64,
    next_bot_id: u32,
    next_obstacle_id: u32,
    rng: StdRng,
}

impl World {
    pub fn new(width: f32, height: f32) -> Self {
        Self::with_rng(width, height, StdRng::from_entropy())
    }

    /// Builds a world with a fixed random source, for reproducible tests.
    pub fn with_seed(width: f32, height: f32, seed: u64) -> Self {
        Self::with_rng(width, height, StdRng::seed_from_u64(seed))
    }

    fn with_rng(width: f32, height: f32, rng: StdRng) -> Self {
        let mut chat = ChatLog::new(CHAT_CAPACITY);
        chat.push("Server started!");
        chat.push("Type /bot to spawn enemies");

        Self {
            entities: BTreeMap::new(),
            obstacles: BTreeMap::new(),
            chat,
            width,
            height,
            tick: 0,
            next_bot_id: BOT_ID_BASE,
            next_obstacle_id: 1,
            rng,
        }
    }

    /// Splits the borrow so entity drivers can consume randomness.
    pub(crate) fn entities_and_rng(&mut self) -> (&mut BTreeMap<u32, Entity>, &mut StdRng) {
        (&mut self.entities, &mut self.rng)
    }

    pub fn random_spawn_point(&mut self) -> (f32, f32) {
        let max_x = (self.width - SPAWN_MARGIN).max(SPAWN_MARGIN + 1.0);
        let max_y = (self.height - SPAWN_MARGIN).max(SPAWN_MARGIN + 1.0);
        (
            self.rng.gen_range(SPAWN_MARGIN..max_x),
            self.rng.gen_range(SPAWN_MARGIN..max_y),
        )
    }

    /// Registers a human entity at a random spawn point.
    pub fn add_player(&mut self, id: u32) -> Player {
        let (x, y) = self.random_spawn_point();
        let player = Player::new(id, EntityKind::Human, x, y);

        info!("Added player {} at ({:.0}, {:.0})", id, x, y);
        self.entities.insert(
            id,
            Entity {
                player: player.clone(),
                driver: Driver::Human,
            },
        );
        player
    }

    /// Removes a human entity. Bots are never removed through this path.
    pub fn remove_player(&mut self, id: u32) -> bool {
        match self.entities.get(&id) {
            Some(entity) if !entity.is_bot() => {
                self.entities.remove(&id);
                info!("Removed player {}", id);
                true
            }
            _ => false,
        }
    }

    /// Spawns up to `count` bots without exceeding `max_bots` in total.
    /// Returns the ids actually created.
    pub fn spawn_bots(&mut self, count: usize, max_bots: usize) -> Vec<u32> {
        let room = max_bots.saturating_sub(self.bot_count());
        let mut spawned = Vec::new();

        for _ in 0..count.min(room) {
            let id = self.next_bot_id;
            self.next_bot_id += 1;

            let (x, y) = self.random_spawn_point();
            let mut player = Player::new(id, EntityKind::Bot, x, y);
            player.nickname = crate::bot::pick_nickname(&mut self.rng);

            debug!("Spawned bot {} ({}) at ({:.0}, {:.0})", id, player.nickname, x, y);
            self.entities.insert(
                id,
                Entity {
                    player,
                    driver: Driver::Bot(BotBrain::new()),
                },
            );
            spawned.push(id);
        }

        spawned
    }

    pub fn player(&self, id: u32) -> Option<&Player> {
        self.entities.get(&id).map(|entity| &entity.player)
    }

    pub fn player_mut(&mut self, id: u32) -> Option<&mut Player> {
        self.entities.get_mut(&id).map(|entity| &mut entity.player)
    }

    pub fn nickname(&self, id: u32) -> Option<String> {
        self.player(id).map(|player| player.nickname.clone())
    }

    pub fn bot_count(&self) -> usize {
        self.entities.values().filter(|e| e.is_bot()).count()
    }

    pub fn human_count(&self) -> usize {
        self.entities.values().filter(|e| !e.is_bot()).count()
    }

    /// Heals, clears projectiles and relocates an entity.
    pub fn respawn(&mut self, id: u32) -> bool {
        let (x, y) = self.random_spawn_point();
        match self.player_mut(id) {
            Some(player) => {
                player.health = MAX_HEALTH;
                player.life = player.life.wrapping_add(1);
                player.projectiles.clear();
                player.x = x;
                player.y = y;
                debug!("Respawned entity {} at ({:.0}, {:.0})", id, x, y);
                true
            }
            None => false,
        }
    }

    /// Runs the ability state machine for `id`. A successful wall cast
    /// also places an obstacle at the caster's position.
    pub fn cast_ability(&mut self, id: u32, kind: AbilityKind, now: Instant) -> bool {
        let Some(player) = self.player_mut(id) else {
            return false;
        };
        let Some(ability) = player.abilities.get_mut(&kind) else {
            return false;
        };
        if !ability.activate() {
            return false;
        }

        if kind == AbilityKind::Wall {
            self.place_wall(id, now);
        }
        true
    }

    fn place_wall(&mut self, owner: u32, now: Instant) -> Option<u32> {
        let player = self.player(owner)?;
        let rect = Rect::new(
            player.x + player.width / 2.0 - WALL_WIDTH / 2.0,
            player.y + player.height + WALL_GAP,
            WALL_WIDTH,
            WALL_HEIGHT,
        );

        let id = self.next_obstacle_id;
        self.next_obstacle_id += 1;
        self.obstacles.insert(
            id,
            PlacedObstacle {
                id,
                rect,
                created_at: now,
                lifetime: Duration::from_millis(WALL_LIFETIME_MS),
            },
        );
        debug!("Entity {} placed wall {} at ({:.0}, {:.0})", owner, id, rect.x, rect.y);
        Some(id)
    }

    /// Removes obstacles whose age reached their lifetime.
    pub fn expire_obstacles(&mut self, now: Instant) -> Vec<u32> {
        let expired: Vec<u32> = self
            .obstacles
            .values()
            .filter(|obstacle| obstacle.is_expired(now))
            .map(|obstacle| obstacle.id)
            .collect();

        for id in &expired {
            self.obstacles.remove(id);
            debug!("Wall {} expired", id);
        }
        expired
    }

    /// Builds the reply for a client holding chat lines up to `chat_ack`.
    pub fn snapshot(&self, chat_ack: u64, now: Instant) -> Snapshot {
        let players = self
            .entities
            .iter()
            .map(|(id, entity)| (*id, entity.player.clone()))
            .collect();
        let obstacles = self
            .obstacles
            .values()
            .filter(|obstacle| !obstacle.is_expired(now))
            .map(|obstacle| (obstacle.id, obstacle.to_wire(now)))
            .collect();

        let chat = self.chat.since(chat_ack);
        Snapshot {
            players,
            obstacles,
            chat: if chat.is_empty() { None } else { Some(chat) },
            chat_seq: self.chat.last_seq(),
        }
    }
}
