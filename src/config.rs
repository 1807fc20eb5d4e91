//! Configuration system for the coordination engine
//!
//! Engine-wide defaults that individual team configurations fall back to.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, TeamError};

/// Engine-wide default settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Default round cap for multi-round modes.
    pub default_max_rounds: usize,

    /// Default per-agent timeout for parallel fan-out. `None` waits
    /// indefinitely.
    pub agent_timeout: Option<Duration>,

    /// Enable verbose engine logging.
    pub debug_mode: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_max_rounds: 10,
            agent_timeout: None,
            debug_mode: false,
        }
    }
}

/// Configuration builder
pub struct ConfigBuilder {
    config: EngineConfig,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    pub fn max_rounds(mut self, rounds: usize) -> Self {
        self.config.default_max_rounds = rounds;
        self
    }

    pub fn agent_timeout(mut self, timeout: Duration) -> Self {
        self.config.agent_timeout = Some(timeout);
        self
    }

    pub fn debug(mut self, enabled: bool) -> Self {
        self.config.debug_mode = enabled;
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}

/// Load configuration from environment variables.
pub fn from_env() -> EngineConfig {
    let mut config = EngineConfig::default();

    if let Ok(rounds) = std::env::var("TEAMS_MAX_ROUNDS") {
        if let Ok(rounds) = rounds.parse::<usize>() {
            config.default_max_rounds = rounds;
        }
    }

    if let Ok(timeout) = std::env::var("TEAMS_AGENT_TIMEOUT_MS") {
        if let Ok(ms) = timeout.parse::<u64>() {
            config.agent_timeout = Some(Duration::from_millis(ms));
        }
    }

    if let Ok(debug) = std::env::var("TEAMS_DEBUG") {
        config.debug_mode = debug.to_lowercase() == "true" || debug == "1";
    }

    config
}

/// Load configuration from a TOML file.
pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<EngineConfig> {
    let contents =
        std::fs::read_to_string(path).map_err(|e| TeamError::ConfigError(e.to_string()))?;
    let config: EngineConfig =
        toml::from_str(&contents).map_err(|e| TeamError::ConfigError(e.to_string()))?;
    Ok(config)
}
