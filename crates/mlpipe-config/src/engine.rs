use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::retry::RetryConfig;
use crate::workers::WorkerConfig;

/// Error raised while loading an engine configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("failed to read config: {0}")]
  Io(#[from] std::io::Error),

  #[error("failed to parse config: {0}")]
  Parse(#[from] serde_json::Error),
}

/// Lifecycle event settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EventsConfig {
  /// When set, a failing event hook fails the pipeline instead of being logged.
  pub strict: bool,
}

/// Top-level engine configuration shared by every run of a chart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
  pub retry: RetryConfig,
  pub workers: WorkerConfig,
  pub events: EventsConfig,
}

impl EngineConfig {
  /// Parse a configuration from a JSON document.
  pub fn from_json(json: &str) -> Result<Self, ConfigError> {
    Ok(serde_json::from_str(json)?)
  }

  /// Read and parse a JSON configuration file.
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Self::from_json(&content)
  }
}
