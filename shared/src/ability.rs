//! Timed abilities with independent cooldown and active-duration counters.
//!
//! ```text
//! READY (cooldown == 0) --activate--> ACTIVE (duration = max, cooldown = max)
//! ACTIVE: both counters tick down independently
//! cooldown reaches 0 --> READY
//! ```
//!
//! Counters are measured in simulation ticks and never go below zero.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AbilityKind {
    /// Blocks incoming damage while active.
    Shield,
    /// Places one obstacle at the caster's position on activation.
    Wall,
}

impl AbilityKind {
    pub const ALL: [AbilityKind; 2] = [AbilityKind::Shield, AbilityKind::Wall];

    /// Parses the cast key used on the wire. Unknown keys yield `None`.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "shield" => Some(AbilityKind::Shield),
            "wall" => Some(AbilityKind::Wall),
            _ => None,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            AbilityKind::Shield => "shield",
            AbilityKind::Wall => "wall",
        }
    }

    pub fn cooldown_max(self) -> u32 {
        match self {
            AbilityKind::Shield => 300,
            AbilityKind::Wall => 450,
        }
    }

    pub fn duration_max(self) -> u32 {
        match self {
            AbilityKind::Shield => 180,
            AbilityKind::Wall => 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ability {
    pub kind: AbilityKind,
    pub cooldown_max: u32,
    pub duration_max: u32,
    pub cooldown: u32,
    pub duration: u32,
}

impl Ability {
    pub fn new(kind: AbilityKind) -> Self {
        Self {
            kind,
            cooldown_max: kind.cooldown_max(),
            duration_max: kind.duration_max(),
            cooldown: 0,
            duration: 0,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.cooldown == 0
    }

    pub fn is_active(&self) -> bool {
        self.duration > 0
    }

    /// Attempts activation. Returns false, leaving both counters untouched,
    /// while the cooldown is still running.
    pub fn activate(&mut self) -> bool {
        if !self.is_ready() {
            return false;
        }
        self.duration = self.duration_max;
        self.cooldown = self.cooldown_max;
        true
    }

    /// Advances both counters by one tick.
    pub fn tick(&mut self) {
        self.duration = self.duration.saturating_sub(1);
        self.cooldown = self.cooldown.saturating_sub(1);
    }
}

pub type Abilities = BTreeMap<AbilityKind, Ability>;

/// The ability set every entity starts with.
pub fn default_abilities() -> Abilities {
    AbilityKind::ALL
        .iter()
        .map(|&kind| (kind, Ability::new(kind)))
        .collect()
}
