//! Typed wire messages and their validation rules.
//!
//! Decoding only proves a frame has the right shape; `validate` enforces the
//! value limits. A message failing either check ends the connection.

use crate::entity::{Obstacle, Player};
use crate::error::FrameError;
use crate::{
    MAX_APPEARANCE_CHARS, MAX_CHAT_CHARS, MAX_HITS_PER_UPDATE, MAX_NICKNAME_CHARS,
    MAX_PROJECTILES, PROTOCOL_VERSION,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A client's claim that one of its projectiles struck `target_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hit {
    pub target_id: u32,
    pub damage: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityCast {
    /// `"shield"` or `"wall"`; anything else is ignored by the server.
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    /// The client's view of its own entity.
    pub entity: Player,
    pub hits: Vec<Hit>,
    pub chat: Option<String>,
    pub ability_cast: Option<AbilityCast>,
    /// Highest chat sequence number the client already holds.
    pub chat_ack: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    Init {
        version: u32,
        nickname: String,
        appearance: String,
    },
    Update(Update),
    Disconnect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatLine {
    pub seq: u64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub players: BTreeMap<u32, Player>,
    pub obstacles: BTreeMap<u32, Obstacle>,
    /// Present only when there are lines the client has not acknowledged.
    pub chat: Option<Vec<ChatLine>>,
    /// Latest sequence number issued by the server's chat log.
    pub chat_seq: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    /// First frame on every connection: the entity the server created.
    Welcome(Player),
    Snapshot(Snapshot),
    Rejected { reason: String },
}

fn check_text(field: &str, value: &str, max_chars: usize) -> Result<(), FrameError> {
    let chars = value.chars().count();
    if chars > max_chars {
        return Err(FrameError::protocol(format!(
            "{} is {} chars, limit is {}",
            field, chars, max_chars
        )));
    }
    if value.chars().any(char::is_control) {
        return Err(FrameError::protocol(format!(
            "{} contains control characters",
            field
        )));
    }
    Ok(())
}

impl Update {
    pub fn validate(&self) -> Result<(), FrameError> {
        let entity = &self.entity;
        if !(entity.x.is_finite() && entity.y.is_finite()) {
            return Err(FrameError::protocol("entity position is not finite"));
        }
        if entity.projectiles.len() > MAX_PROJECTILES {
            return Err(FrameError::protocol(format!(
                "{} projectiles, limit is {}",
                entity.projectiles.len(),
                MAX_PROJECTILES
            )));
        }
        if !entity.projectiles.iter().all(|p| p.is_finite()) {
            return Err(FrameError::protocol("projectile state is not finite"));
        }
        if self.hits.len() > MAX_HITS_PER_UPDATE {
            return Err(FrameError::protocol(format!(
                "{} hits in one update, limit is {}",
                self.hits.len(),
                MAX_HITS_PER_UPDATE
            )));
        }
        if let Some(chat) = &self.chat {
            check_text("chat", chat, MAX_CHAT_CHARS)?;
        }
        Ok(())
    }
}

impl ClientMessage {
    pub fn validate(&self) -> Result<(), FrameError> {
        match self {
            ClientMessage::Init {
                version,
                nickname,
                appearance,
            } => {
                if *version != PROTOCOL_VERSION {
                    return Err(FrameError::protocol(format!(
                        "protocol version {} not supported (expected {})",
                        version, PROTOCOL_VERSION
                    )));
                }
                if nickname.trim().is_empty() {
                    return Err(FrameError::protocol("nickname is empty"));
                }
                check_text("nickname", nickname, MAX_NICKNAME_CHARS)?;
                check_text("appearance", appearance, MAX_APPEARANCE_CHARS)
            }
            ClientMessage::Update(update) => update.validate(),
            ClientMessage::Disconnect => Ok(()),
        }
    }
}
