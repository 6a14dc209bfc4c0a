//! Simulation configuration.
//!
//! Handles loading and validation of simulation parameters from config
//! files and command-line arguments.

use forkcast_types::ChainConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Simulation name (log output)
    pub name: String,
    /// Number of slots to run before reporting
    pub slots: u64,
    /// Chain/protocol parameters shared by every node
    pub chain: ChainConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            name: "forkcast-sim".to_string(),
            slots: 16,
            chain: ChainConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log filter (tracing `EnvFilter` syntax)
    pub level: String,
    /// Emit JSON instead of human-readable lines
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl SimConfig {
    /// Load configuration from file.
    /// Path is validated to prevent directory traversal attacks.
    pub fn from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let path_str = path.to_string_lossy();
        if path_str.contains("..") {
            anyhow::bail!("Invalid path: directory traversal detected");
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: SimConfig = toml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;
        Ok(config)
    }

    /// Save configuration to file.
    pub fn to_file(&self, path: &PathBuf) -> anyhow::Result<()> {
        let path_str = path.to_string_lossy();
        if path_str.contains("..") {
            anyhow::bail!("Invalid path: directory traversal detected");
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .map_err(|e| anyhow::anyhow!("Failed to write config file '{}': {}", path.display(), e))?;
        Ok(())
    }

    /// Validate configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.slots == 0 {
            anyhow::bail!("Simulation must run for at least one slot");
        }
        self.chain
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid chain config: {}", e))?;
        Ok(())
    }
}
