//! Server configuration, loaded from YAML. Every field has a default.

use serde::{Deserialize, Serialize};
use spooky_kernel::Rules;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Milliseconds between NPC ticks.
    pub tick_interval_ms: u64,
    pub rules: Rules,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 500,
            rules: Rules::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&data)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("tick_interval_ms must be positive".into()));
        }
        if self.rules.max_players == 0 {
            return Err(ConfigError::Invalid("rules.max_players must be positive".into()));
        }
        if self.rules.spawn_marker.is_empty() {
            return Err(ConfigError::Invalid("rules.spawn_marker must not be empty".into()));
        }
        Ok(())
    }
}
