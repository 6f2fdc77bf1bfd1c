//! Local game state with client-side prediction
//!
//! The own avatar moves as soon as input arrives and own projectiles are
//! simulated here. Hits found locally are only requests; the next snapshot
//! decides what really happened and overwrites the own entity with it.

use crate::input::InputFrame;
use log::debug;
use shared::{
    AbilityCast, ChatLine, Hit, Obstacle, Player, Snapshot, Update, CHAT_CAPACITY, MAP_HEIGHT,
    MAP_WIDTH, MAX_CHAT_CHARS, MAX_HITS_PER_UPDATE, MAX_PROJECTILES, PROJECTILE_DAMAGE,
};
use std::collections::{BTreeMap, VecDeque};

/// Position error above which a correction is worth logging.
const DRIFT_LOG_THRESHOLD: f32 = 5.0;

/// Client-side view of the arena.
///
/// The own avatar is predicted locally; everything else is whatever the
/// last snapshot said. Each snapshot overwrites the own position, health
/// and ability timers outright.
#[derive(Debug, Clone)]
pub struct ClientGame {
    pub me: Player,
    pub others: BTreeMap<u32, Player>,
    pub obstacles: BTreeMap<u32, Obstacle>,
    pub chat: VecDeque<ChatLine>,
    pub chat_seq: u64,
    pub map_width: f32,
    pub map_height: f32,
    pending_hits: Vec<Hit>,
    pending_chat: Option<String>,
    pending_cast: Option<AbilityCast>,
}

impl ClientGame {
    /// Starts from the entity the server assigned in its welcome frame.
    pub fn new(me: Player) -> Self {
        Self {
            me,
            others: BTreeMap::new(),
            obstacles: BTreeMap::new(),
            chat: VecDeque::with_capacity(CHAT_CAPACITY),
            chat_seq: 0,
            map_width: MAP_WIDTH,
            map_height: MAP_HEIGHT,
            pending_hits: Vec::new(),
            pending_chat: None,
            pending_cast: None,
        }
    }

    pub fn id(&self) -> u32 {
        self.me.id
    }

    /// Applies one frame of input to the own avatar immediately.
    pub fn apply_input(&mut self, input: &InputFrame) {
        let (mut dx, mut dy) = (input.move_x.clamp(-1.0, 1.0), input.move_y.clamp(-1.0, 1.0));
        let length = (dx * dx + dy * dy).sqrt();
        if length > 1.0 {
            dx /= length;
            dy /= length;
        }
        self.me.x += dx * self.me.speed;
        self.me.y += dy * self.me.speed;
        self.me.clamp_to_map(self.map_width, self.map_height);

        if let Some((x, y)) = input.fire_at {
            if self.me.projectiles.len() < MAX_PROJECTILES {
                self.me.shoot_at(x, y);
            }
        }
        if let Some(kind) = input.cast {
            self.pending_cast = Some(AbilityCast {
                key: kind.key().to_string(),
            });
        }
        if let Some(text) = &input.chat {
            self.say(text);
        }
    }

    /// Queues a chat line, cut to what the server accepts.
    pub fn say(&mut self, text: &str) {
        let clean: String = text
            .chars()
            .filter(|c| !c.is_control())
            .take(MAX_CHAT_CHARS)
            .collect();
        if !clean.trim().is_empty() {
            self.pending_chat = Some(clean);
        }
    }

    /// Advances own projectiles and tests them against the last-known
    /// obstacles and entities. A projectile touching an entity is consumed
    /// and becomes a hit request. Returns the number of new hits.
    pub fn step(&mut self) -> usize {
        self.me.advance_projectiles();
        self.me.prune_projectiles(self.map_width, self.map_height);

        let mut hits = 0;
        let projectiles = std::mem::take(&mut self.me.projectiles);
        for projectile in projectiles {
            let bounds = projectile.bounds();
            if self
                .obstacles
                .values()
                .any(|obstacle| obstacle.bounds().intersects(&bounds))
            {
                continue;
            }

            let struck = self
                .others
                .values()
                .find(|other| other.is_alive() && other.bounds().intersects(&bounds));
            match struck {
                Some(target) => {
                    self.pending_hits.push(Hit {
                        target_id: target.id,
                        damage: PROJECTILE_DAMAGE,
                    });
                    hits += 1;
                }
                None => self.me.projectiles.push(projectile),
            }
        }
        hits
    }

    /// Drains queued actions into the next UPDATE.
    pub fn build_update(&mut self) -> Update {
        let take = self.pending_hits.len().min(MAX_HITS_PER_UPDATE);
        Update {
            entity: self.me.clone(),
            hits: self.pending_hits.drain(..take).collect(),
            chat: self.pending_chat.take(),
            ability_cast: self.pending_cast.take(),
            chat_ack: self.chat_seq,
        }
    }

    /// Accepts the server's snapshot. Returns chat lines not seen before.
    pub fn apply_snapshot(&mut self, mut snapshot: Snapshot) -> Vec<ChatLine> {
        if let Some(server_me) = snapshot.players.remove(&self.me.id) {
            let drift = (server_me.x - self.me.x).hypot(server_me.y - self.me.y);
            if drift > DRIFT_LOG_THRESHOLD {
                debug!("Corrected position by {:.1}", drift);
            }
            if server_me.life != self.me.life {
                // Respawned: local shots belong to the previous life.
                self.me.projectiles.clear();
            }

            self.me.x = server_me.x;
            self.me.y = server_me.y;
            self.me.health = server_me.health;
            self.me.life = server_me.life;
            self.me.abilities = server_me.abilities;
            self.me.nickname = server_me.nickname;
            self.me.appearance = server_me.appearance;
        }

        self.others = snapshot.players;
        self.obstacles = snapshot.obstacles;

        let fresh: Vec<ChatLine> = snapshot
            .chat
            .unwrap_or_default()
            .into_iter()
            .filter(|line| line.seq > self.chat_seq)
            .collect();
        for line in &fresh {
            self.chat.push_back(line.clone());
        }
        while self.chat.len() > CHAT_CAPACITY {
            self.chat.pop_front();
        }
        self.chat_seq = self.chat_seq.max(snapshot.chat_seq);
        fresh
    }
}
