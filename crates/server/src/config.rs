use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use arena::{ArenaRules, HostConfig, TickRates};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: HostConfig,
    pub slots: usize,
    pub ticks: TickRates,
    pub rules: ArenaRules,
    /// Seed for powerup placement. Each new arena adds the number of games
    /// already played.
    pub seed: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: HostConfig::default(),
            slots: 4,
            ticks: TickRates::default(),
            rules: ArenaRules::default(),
            seed: 0,
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(ron::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = ServerConfig::parse(
            "(slots: 2, seed: 9, ticks: (simulation: 16), rules: (player_hp: 50))",
        )
        .unwrap();

        assert_eq!(config.slots, 2);
        assert_eq!(config.seed, 9);
        assert_eq!(config.ticks.simulation, Duration::from_millis(16));
        assert_eq!(config.ticks.network, Duration::from_millis(48));
        assert_eq!(config.rules.player_hp, 50);
        assert_eq!(config.rules.bullet_damage, 10);
        assert_eq!(config.host, HostConfig::default());
    }

    #[test]
    fn test_unknown_field_is_an_error() {
        assert!(ServerConfig::parse("(slot_count: 3)").is_err());
    }
}
