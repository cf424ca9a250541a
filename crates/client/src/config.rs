use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// How often the bot picks new input.
    pub input_interval: Duration,
    pub move_chance: f64,
    pub fire_chance: f64,
    pub seed: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            input_interval: Duration::from_millis(250),
            move_chance: 0.7,
            fire_chance: 0.4,
            seed: 0,
        }
    }
}
