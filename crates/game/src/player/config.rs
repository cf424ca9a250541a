use serde::{Deserialize, Serialize};

/// Gameplay tuning. Distances are in pixels, times in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaRules {
    pub player_hp: u32,
    pub player_speed: f32,
    pub player_radius: f32,

    pub bullet_damage: u32,
    pub bullet_speed: f32,
    pub bullet_radius: f32,
    pub bullet_lifetime: f32,

    pub reload_time: f32,

    pub powerup_radius: f32,
    pub powerup_duration: f32,
    pub powerup_lifetime: f32,
    pub powerup_spawn_interval: f32,

    pub heal_hp: u32,
    pub speed_multiplier: f32,
    pub reload_time_powerup: f32,
    pub damage_multiplier: f32,
    pub bullet_speed_multiplier: f32,
}

impl Default for ArenaRules {
    fn default() -> Self {
        Self {
            player_hp: 100,
            player_speed: 200.0,
            player_radius: 32.0,

            bullet_damage: 10,
            bullet_speed: 500.0,
            bullet_radius: 4.0,
            bullet_lifetime: 3.0,

            reload_time: 0.2,

            powerup_radius: 16.0,
            powerup_duration: 8.0,
            powerup_lifetime: 5.0,
            powerup_spawn_interval: 3.0,

            heal_hp: 50,
            speed_multiplier: 1.5,
            reload_time_powerup: 0.1,
            damage_multiplier: 2.0,
            bullet_speed_multiplier: 1.75,
        }
    }
}
