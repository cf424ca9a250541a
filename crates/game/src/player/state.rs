use std::collections::BTreeMap;

use crate::event::{Direction, PowerupType};

#[derive(Debug, Clone)]
pub struct PlayerState {
    pub hp: u32,
    pub moving: bool,
    pub direction: Direction,
    pub firing: bool,
    /// Seconds until the next shot is allowed.
    pub reload: f32,
    /// Remaining seconds per active powerup.
    pub powerups: BTreeMap<PowerupType, f32>,
}

impl PlayerState {
    pub fn new(hp: u32) -> Self {
        Self {
            hp,
            moving: false,
            direction: Direction::Right,
            firing: false,
            reload: 0.0,
            powerups: BTreeMap::new(),
        }
    }

    pub fn has_powerup(&self, kind: PowerupType) -> bool {
        self.powerups.contains_key(&kind)
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    pub fn apply_input(&mut self, moving: bool, direction: Direction, firing: bool) {
        self.moving = moving;
        self.direction = direction;
        self.firing = firing;
    }

    /// Counts powerup timers down and returns the ones that ran out.
    pub fn tick_powerups(&mut self, dt: f32) -> Vec<PowerupType> {
        for time in self.powerups.values_mut() {
            *time -= dt;
        }

        let expired: Vec<PowerupType> = self
            .powerups
            .iter()
            .filter(|(_, time)| **time <= 0.0)
            .map(|(kind, _)| *kind)
            .collect();

        for kind in &expired {
            self.powerups.remove(kind);
        }
        expired
    }
}
