//! Configuration for the tracking agent.

use crate::provider::{AccuracyMode, SubscriptionRequest};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Delivery policy requested from the fix provider, plus the stall window
/// the sampling loop watches for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SamplingPolicy {
    /// Target interval between samples, milliseconds
    pub interval_ms: u64,
    /// Minimum inter-sample interval (burst protection), milliseconds
    pub min_interval_ms: u64,
    /// Maximum acceptable delivery latency / batching window, milliseconds
    pub max_latency_ms: u64,
    /// The subscription counts as stalled after
    /// `max_latency_ms * stall_multiplier` without a sample
    pub stall_multiplier: u32,
    /// Requested fix quality
    pub accuracy: AccuracyMode,
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self {
            interval_ms: 30_000,
            min_interval_ms: 15_000,
            max_latency_ms: 60_000,
            stall_multiplier: 3,
            accuracy: AccuracyMode::High,
        }
    }
}

impl SamplingPolicy {
    /// Subscription parameters handed to the provider. A low-accuracy sample
    /// now is preferred over an accurate one later, so `wait_for_fix` is
    /// always false.
    pub fn subscription_request(&self) -> SubscriptionRequest {
        SubscriptionRequest {
            interval: Duration::from_millis(self.interval_ms),
            min_interval: Duration::from_millis(self.min_interval_ms),
            max_latency: Duration::from_millis(self.max_latency_ms),
            accuracy: self.accuracy,
            wait_for_fix: false,
        }
    }

    /// How long the sampling loop waits for a sample before reporting a
    /// stall.
    pub fn stall_window(&self) -> Duration {
        Duration::from_millis(self.max_latency_ms * u64::from(self.stall_multiplier))
    }
}

/// Main configuration for the tracking agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Sample delivery policy
    pub policy: SamplingPolicy,

    /// Directory holding the durable intent and last-sample records
    pub data_path: PathBuf,

    /// Whether the agent runs detached from any foreground UI. Detached
    /// operation additionally requires the background authorization grant.
    pub detached: bool,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("geotrack-agent");

        Self {
            policy: SamplingPolicy::default(),
            data_path: data_dir,
            detached: true,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("geotrack-agent")
            .join("config.json")
    }

    /// Ensure the data directory exists.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
