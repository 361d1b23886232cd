//! TOML configuration file loading
//!
//! Supports `~/.config/voice-dispatch/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;
use crate::commands::PatternConfig;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    /// Context active at startup
    #[serde(default)]
    pub context: Option<String>,

    #[serde(default)]
    pub throttle: ThrottleFileConfig,

    #[serde(default)]
    pub retry: RetryFileConfig,

    #[serde(default)]
    pub history: HistoryFileConfig,

    #[serde(default)]
    pub metrics: MetricsFileConfig,

    #[serde(default)]
    pub security: SecurityFileConfig,

    /// Command patterns registered at startup
    #[serde(default)]
    pub patterns: Vec<PatternEntry>,
}

/// Rate limiting configuration
#[derive(Debug, Default, Deserialize)]
pub struct ThrottleFileConfig {
    pub max_per_minute: Option<u32>,
    pub critical_exempt: Option<bool>,
}

/// Retry/backoff configuration
#[derive(Debug, Default, Deserialize)]
pub struct RetryFileConfig {
    pub max_retries: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
}

/// Command history configuration
#[derive(Debug, Default, Deserialize)]
pub struct HistoryFileConfig {
    pub capacity: Option<usize>,
}

/// Metrics configuration
#[derive(Debug, Default, Deserialize)]
pub struct MetricsFileConfig {
    pub ema_alpha: Option<f64>,
    pub snapshot_interval_secs: Option<u64>,
}

/// Security gate configuration
#[derive(Debug, Default, Deserialize)]
pub struct SecurityFileConfig {
    /// Allow commands when no validator is configured
    pub insecure_dev_mode: Option<bool>,
    /// Terms rejected by the built-in deny-list validator
    pub blocked_terms: Option<Vec<String>>,
}

/// A `[[patterns]]` table
#[derive(Debug, Clone, Deserialize)]
pub struct PatternEntry {
    /// Wildcard pattern text
    pub pattern: String,
    #[serde(flatten)]
    pub config: PatternConfig,
}

/// Load the TOML config file from the standard path
///
/// Returns `ConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> ConfigFile {
    let Some(path) = config_file_path() else {
        return ConfigFile::default();
    };

    if !path.exists() {
        return ConfigFile::default();
    }

    match load_config_file_from(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            ConfigFile::default()
        }
    }
}

/// Load a config file from an explicit path
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid TOML.
pub fn load_config_file_from(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Return the config file path: `~/.config/voice-dispatch/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("voice-dispatch").join("config.toml"))
}
