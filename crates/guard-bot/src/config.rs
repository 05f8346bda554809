//! Application configuration.

use crate::error::{AppError, AppResult};
use guard_core::{ConfigPreset, TradeGuardConfig};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Decision and alert journal settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PersistenceConfig {
    /// Journal decisions and alerts to disk. Default: true.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Journal directory. Default: `data/guard`.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Records held per file before a flush. Default: 1 (write-through).
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// In-memory retention (days). Default: 30.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_true() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data/guard")
}

fn default_buffer_size() -> usize {
    1
}

fn default_retention_days() -> u32 {
    30
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            data_dir: default_data_dir(),
            buffer_size: default_buffer_size(),
            retention_days: default_retention_days(),
        }
    }
}

/// Alert transport settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlertsConfig {
    /// Deliver alerts through the log at WARN. Default: true.
    #[serde(default = "default_true")]
    pub log_sender: bool,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self { log_sender: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Base threshold set.
    #[serde(default)]
    pub preset: ConfigPreset,
    /// Overrides merged on top of the preset, shaped like `TradeGuardConfig`.
    #[serde(default)]
    pub guard: Map<String, Value>,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
}

impl AppConfig {
    /// Load from a TOML file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config {path}: {e}")))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Config path: explicit argument, then `GUARD_CONFIG`, then `config/default.toml`.
    pub fn resolve_path(cli: Option<String>) -> String {
        cli.or_else(|| std::env::var("GUARD_CONFIG").ok())
            .unwrap_or_else(|| "config/default.toml".to_string())
    }

    /// Preset with the `[guard]` overrides applied, validated.
    pub fn guard_config(&self) -> AppResult<TradeGuardConfig> {
        let config = TradeGuardConfig::preset(self.preset)
            .with_overrides(&Value::Object(self.guard.clone()))?;
        config.validate()?;
        Ok(config)
    }
}
