//! Scripted input for the headless client.
//!
//! Stands in for a keyboard and mouse: wanders around, shoots at the
//! nearest visible entity and casts abilities on a fixed rhythm.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{AbilityKind, Player};
use std::collections::BTreeMap;
use std::f32::consts::TAU;

const HEADING_FRAMES: u64 = 60;
const FIRE_EVERY_FRAMES: u64 = 15;
const SHIELD_EVERY_FRAMES: u64 = 320;
const WALL_EVERY_FRAMES: u64 = 470;
const FIRE_RANGE: f32 = 600.0;

/// Everything a player can do in one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputFrame {
    /// Movement direction, each axis in `-1.0..=1.0`
    pub move_x: f32,
    pub move_y: f32,
    /// World-space point to shoot at
    pub fire_at: Option<(f32, f32)>,
    pub cast: Option<AbilityKind>,
    pub chat: Option<String>,
}

/// Produces one [`InputFrame`] per frame
pub struct ScriptedInput {
    rng: StdRng,
    frame: u64,
    heading: (f32, f32),
    greeting: Option<String>,
}

impl ScriptedInput {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            frame: 0,
            heading: (0.0, 0.0),
            greeting: None,
        }
    }

    /// Queues one chat line for the next frame.
    pub fn with_greeting(mut self, text: impl Into<String>) -> Self {
        self.greeting = Some(text.into());
        self
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn next_frame(&mut self, me: &Player, others: &BTreeMap<u32, Player>) -> InputFrame {
        if self.frame % HEADING_FRAMES == 0 {
            let angle = self.rng.gen_range(0.0..TAU);
            self.heading = (angle.cos(), angle.sin());
        }

        let mut input = InputFrame {
            move_x: self.heading.0,
            move_y: self.heading.1,
            chat: self.greeting.take(),
            ..InputFrame::default()
        };

        if self.frame % FIRE_EVERY_FRAMES == 0 {
            input.fire_at = nearest(me, others, FIRE_RANGE);
        }
        if self.frame > 0 && self.frame % SHIELD_EVERY_FRAMES == 0 {
            input.cast = Some(AbilityKind::Shield);
        } else if self.frame > 0 && self.frame % WALL_EVERY_FRAMES == 0 {
            input.cast = Some(AbilityKind::Wall);
        }

        self.frame += 1;
        input
    }
}

fn nearest(me: &Player, others: &BTreeMap<u32, Player>, range: f32) -> Option<(f32, f32)> {
    let (mx, my) = me.center();
    others
        .values()
        .filter(|other| other.is_alive())
        .map(|other| {
            let (ox, oy) = other.center();
            ((ox, oy), (ox - mx).powi(2) + (oy - my).powi(2))
        })
        .filter(|(_, dist_sq)| *dist_sq <= range * range)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(center, _)| center)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::EntityKind;

    fn player(id: u32, x: f32, y: f32) -> Player {
        Player::new(id, EntityKind::Human, x, y)
    }

    #[test]
    fn test_first_frame_moves_and_greets() {
        let mut input = ScriptedInput::new(1).with_greeting("hi");
        let frame = input.next_frame(&player(1, 500.0, 500.0), &BTreeMap::new());

        let length = (frame.move_x.powi(2) + frame.move_y.powi(2)).sqrt();
        assert!((length - 1.0).abs() < 1e-4);
        assert_eq!(frame.chat.as_deref(), Some("hi"));
        assert_eq!(frame.fire_at, None);

        let second = input.next_frame(&player(1, 500.0, 500.0), &BTreeMap::new());
        assert_eq!(second.chat, None);
        assert_eq!(input.frame(), 2);
    }

    #[test]
    fn test_fires_at_nearest_in_range() {
        let mut input = ScriptedInput::new(1);
        let mut others = BTreeMap::new();
        others.insert(2, player(2, 900.0, 500.0));
        others.insert(3, player(3, 600.0, 500.0));
        others.insert(4, player(4, 1900.0, 1900.0));

        let frame = input.next_frame(&player(1, 500.0, 500.0), &others);
        assert_eq!(frame.fire_at, Some(others[&3].center()));
    }

    #[test]
    fn test_ignores_dead_targets() {
        let mut input = ScriptedInput::new(1);
        let mut others = BTreeMap::new();
        let mut dead = player(2, 550.0, 500.0);
        dead.health = 0;
        others.insert(2, dead);

        let frame = input.next_frame(&player(1, 500.0, 500.0), &others);
        assert_eq!(frame.fire_at, None);
    }

    #[test]
    fn test_casts_on_rhythm() {
        let mut input = ScriptedInput::new(1);
        let me = player(1, 500.0, 500.0);
        let casts: Vec<(u64, AbilityKind)> = (0..WALL_EVERY_FRAMES + 1)
            .filter_map(|_| {
                let frame_no = input.frame();
                input
                    .next_frame(&me, &BTreeMap::new())
                    .cast
                    .map(|kind| (frame_no, kind))
            })
            .collect();

        assert_eq!(
            casts,
            vec![
                (SHIELD_EVERY_FRAMES, AbilityKind::Shield),
                (WALL_EVERY_FRAMES, AbilityKind::Wall)
            ]
        );
    }
}
