use glam::Vec2;

use crate::event::PowerupType;

use super::{ArenaRules, PlayerState};

/// A bullet a player just fired.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shot {
    pub position: Vec2,
    pub velocity: Vec2,
}

/// Applies the arena rules to one player's state.
#[derive(Debug, Clone, Default)]
pub struct PlayerController {
    rules: ArenaRules,
}

impl PlayerController {
    pub fn new(rules: ArenaRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ArenaRules {
        &self.rules
    }

    pub fn velocity(&self, state: &PlayerState) -> Vec2 {
        if !state.moving {
            return Vec2::ZERO;
        }

        let multiplier = if state.has_powerup(PowerupType::PlayerSpeed) {
            self.rules.speed_multiplier
        } else {
            1.0
        };
        state.direction.to_vec() * self.rules.player_speed * multiplier
    }

    pub fn reload_time(&self, state: &PlayerState) -> f32 {
        if state.has_powerup(PowerupType::PlayerReloadSpeed) {
            self.rules.reload_time_powerup
        } else {
            self.rules.reload_time
        }
    }

    /// Advances the reload timer and fires if the trigger is held and the gun
    /// is ready. The bullet starts at the rim of the player.
    pub fn tick_weapon(&self, state: &mut PlayerState, position: Vec2, dt: f32) -> Option<Shot> {
        state.reload = (state.reload - dt).max(0.0);

        if !state.firing || state.reload > 0.0 {
            return None;
        }

        state.reload = self.reload_time(state);

        let speed = if state.has_powerup(PowerupType::BulletSpeed) {
            self.rules.bullet_speed * self.rules.bullet_speed_multiplier
        } else {
            self.rules.bullet_speed
        };
        let direction = state.direction.to_vec();

        Some(Shot {
            position: position + direction * self.rules.player_radius,
            velocity: direction * speed,
        })
    }

    pub fn bullet_damage(&self, shooter: &PlayerState) -> u32 {
        let multiplier = if shooter.has_powerup(PowerupType::BulletDamage) {
            self.rules.damage_multiplier
        } else {
            1.0
        };
        (self.rules.bullet_damage as f32 * multiplier) as u32
    }

    /// Consumes a pending heal. Returns whether hp changed.
    pub fn apply_heal(&self, state: &mut PlayerState) -> bool {
        let Some(timer) = state.powerups.get_mut(&PowerupType::PlayerHeal) else {
            return false;
        };
        *timer = 0.0;

        let healed = state.hp.saturating_add(self.rules.heal_hp).min(self.rules.player_hp);
        let changed = healed != state.hp;
        state.hp = healed;
        changed
    }
}
