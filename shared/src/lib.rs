//! Types and wire plumbing shared by the arena server and its clients.
//!
//! The server is authoritative for health, ability timers and kill
//! attribution; clients only ever submit requests. Everything that crosses
//! the wire lives here so both sides agree on one schema.

pub mod ability;
pub mod entity;
pub mod error;
pub mod frame;
pub mod protocol;

pub use ability::{default_abilities, Abilities, Ability, AbilityKind};
pub use entity::{EntityKind, Obstacle, Player, Projectile, Rect};
pub use error::FrameError;
pub use frame::{decode, encode, recv_frame, send_frame};
pub use protocol::{AbilityCast, ChatLine, ClientMessage, Hit, ServerMessage, Snapshot, Update};

/// Bumped whenever a wire type changes shape.
pub const PROTOCOL_VERSION: u32 = 1;

pub const MAP_WIDTH: f32 = 2000.0;
pub const MAP_HEIGHT: f32 = 2000.0;

pub const PLAYER_SIZE: f32 = 50.0;
pub const PLAYER_SPEED: f32 = 5.0;
pub const MAX_HEALTH: i32 = 100;

pub const PROJECTILE_SPEED: f32 = 15.0;
pub const PROJECTILE_SPAWN_DISTANCE: f32 = 45.0;
pub const PROJECTILE_SIZE: f32 = 10.0;
/// Projectiles further than this outside the map are dropped.
pub const PROJECTILE_BOUNDS_MARGIN: f32 = 100.0;
pub const PROJECTILE_DAMAGE: i32 = 10;
/// Upper bound the server accepts for a single client-reported hit.
pub const MAX_HIT_DAMAGE: i32 = 25;

pub const WALL_WIDTH: f32 = 100.0;
pub const WALL_HEIGHT: f32 = 10.0;
pub const WALL_LIFETIME_MS: u64 = 5_000;

pub const CHAT_CAPACITY: usize = 20;
pub const MAX_NICKNAME_CHARS: usize = 12;
pub const MAX_APPEARANCE_CHARS: usize = 32;
pub const MAX_CHAT_CHARS: usize = 40;
pub const MAX_PROJECTILES: usize = 64;
pub const MAX_HITS_PER_UPDATE: usize = 16;

/// Largest frame either side will accept, in bytes.
pub const MAX_FRAME_LEN: usize = 1 << 20;

pub const DEFAULT_PORT: u16 = 5555;
pub const DISCOVERY_PORT: u16 = 5556;
pub const DISCOVERY_QUERY: &[u8] = b"NEON_DISCOVERY";
pub const DISCOVERY_TAG: &str = "NEON_SERVER";
