//! Configuration management for the dispatch pipeline
//!
//! Layering: built-in defaults, then the TOML config file, then `VOXD_*`
//! environment variables.

pub mod file;

use std::path::Path;
use std::time::Duration;

pub use file::{ConfigFile, PatternEntry};

use crate::dispatch::RetryPolicy;
use crate::{Error, Result};
use crate::history;
use crate::metrics;

/// Context used when none is configured
pub const DEFAULT_CONTEXT: &str = "global";

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Context active at startup
    pub default_context: String,

    pub throttle: ThrottleConfig,

    pub retry: RetryConfig,

    /// Maximum number of history entries
    pub history_capacity: usize,

    pub metrics: MetricsConfig,

    pub security: SecurityConfig,

    /// Patterns registered at initialization
    pub patterns: Vec<PatternEntry>,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleConfig {
    pub max_per_minute: u32,
    /// Admit critical commands even when the window is full
    pub critical_exempt: bool,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_per_minute: 30,
            critical_exempt: true,
        }
    }
}

/// Retry/backoff configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsConfig {
    /// EMA smoothing factor for processing time
    pub ema_alpha: f64,
    /// Minimum time between snapshot events
    pub snapshot_interval: Duration,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            ema_alpha: metrics::DEFAULT_ALPHA,
            snapshot_interval: Duration::from_secs(60),
        }
    }
}

/// Security gate configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityConfig {
    /// Allow commands when no validator is configured. Never enable in production.
    pub insecure_dev_mode: bool,
    /// Terms rejected by the built-in deny-list validator
    pub blocked_terms: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_context: DEFAULT_CONTEXT.to_string(),
            throttle: ThrottleConfig::default(),
            retry: RetryConfig::default(),
            history_capacity: history::DEFAULT_CAPACITY,
            metrics: MetricsConfig::default(),
            security: SecurityConfig::default(),
            patterns: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from the config file and environment
    ///
    /// With an explicit `path` the file must exist and parse; otherwise the
    /// standard location is used if present.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit config file cannot be read or parsed,
    /// or if the resulting values are out of range.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => file::load_config_file_from(path)?,
            None => file::load_config_file(),
        };

        let mut config = Self::from_file(file);
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.throttle.max_per_minute == 0 {
            return Err(Error::Config("throttle.max_per_minute must be at least 1".to_string()));
        }
        if self.history_capacity == 0 {
            return Err(Error::Config("history.capacity must be at least 1".to_string()));
        }
        if !(self.metrics.ema_alpha > 0.0 && self.metrics.ema_alpha <= 1.0) {
            return Err(Error::Config(format!(
                "metrics.ema_alpha must be in (0, 1], got {}",
                self.metrics.ema_alpha
            )));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(Error::Config(
                "retry.base_delay_ms must not exceed retry.max_delay_ms".to_string(),
            ));
        }
        Ok(())
    }

    /// Overlay a parsed config file on the defaults
    #[must_use]
    pub fn from_file(file: ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            default_context: file
                .context
                .map(|c| c.trim().to_lowercase())
                .filter(|c| !c.is_empty())
                .unwrap_or(defaults.default_context),
            throttle: ThrottleConfig {
                max_per_minute: file
                    .throttle
                    .max_per_minute
                    .unwrap_or(defaults.throttle.max_per_minute),
                critical_exempt: file
                    .throttle
                    .critical_exempt
                    .unwrap_or(defaults.throttle.critical_exempt),
            },
            retry: RetryConfig {
                max_retries: file.retry.max_retries.unwrap_or(defaults.retry.max_retries),
                base_delay_ms: file.retry.base_delay_ms.unwrap_or(defaults.retry.base_delay_ms),
                max_delay_ms: file.retry.max_delay_ms.unwrap_or(defaults.retry.max_delay_ms),
            },
            history_capacity: file.history.capacity.unwrap_or(defaults.history_capacity),
            metrics: MetricsConfig {
                ema_alpha: file.metrics.ema_alpha.unwrap_or(defaults.metrics.ema_alpha),
                snapshot_interval: file
                    .metrics
                    .snapshot_interval_secs
                    .map_or(defaults.metrics.snapshot_interval, Duration::from_secs),
            },
            security: SecurityConfig {
                insecure_dev_mode: file.security.insecure_dev_mode.unwrap_or(false),
                blocked_terms: file.security.blocked_terms.unwrap_or_default(),
            },
            patterns: file.patterns,
        }
    }

    /// Apply `VOXD_*` overrides read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("VOXD_INSECURE_DEV_MODE") {
            match parse_bool(&value) {
                Some(enabled) => self.security.insecure_dev_mode = enabled,
                None => tracing::warn!(%value, "ignoring invalid VOXD_INSECURE_DEV_MODE"),
            }
        }

        if let Some(value) = lookup("VOXD_MAX_PER_MINUTE") {
            match value.trim().parse() {
                Ok(limit) => self.throttle.max_per_minute = limit,
                Err(_) => tracing::warn!(%value, "ignoring invalid VOXD_MAX_PER_MINUTE"),
            }
        }

        if let Some(value) = lookup("VOXD_MAX_RETRIES") {
            match value.trim().parse() {
                Ok(retries) => self.retry.max_retries = retries,
                Err(_) => tracing::warn!(%value, "ignoring invalid VOXD_MAX_RETRIES"),
            }
        }

        if let Some(value) = lookup("VOXD_CONTEXT") {
            let context = value.trim().to_lowercase();
            if !context.is_empty() {
                self.default_context = context;
            }
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.default_context, "global");
        assert_eq!(config.throttle.max_per_minute, 30);
        assert!(config.throttle.critical_exempt);
        assert_eq!(config.retry.policy(), RetryPolicy::default());
        assert_eq!(config.history_capacity, 100);
        assert!(!config.security.insecure_dev_mode);
    }

    #[test]
    fn file_overlays_defaults() {
        let file: ConfigFile = toml::from_str(
            r#"
            context = "Editor"
            [throttle]
            max_per_minute = 5
            [metrics]
            snapshot_interval_secs = 10
            "#,
        )
        .unwrap();

        let config = Config::from_file(file);
        assert_eq!(config.default_context, "editor");
        assert_eq!(config.throttle.max_per_minute, 5);
        assert!(config.throttle.critical_exempt);
        assert_eq!(config.metrics.snapshot_interval, Duration::from_secs(10));
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn env_overrides_file() {
        let mut config = Config::default();
        config.apply_env(env(&[
            ("VOXD_INSECURE_DEV_MODE", "true"),
            ("VOXD_MAX_PER_MINUTE", "7"),
            ("VOXD_MAX_RETRIES", "1"),
            ("VOXD_CONTEXT", " Media "),
        ]));

        assert!(config.security.insecure_dev_mode);
        assert_eq!(config.throttle.max_per_minute, 7);
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.default_context, "media");
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let mut config = Config::default();
        config.apply_env(env(&[
            ("VOXD_INSECURE_DEV_MODE", "maybe"),
            ("VOXD_MAX_PER_MINUTE", "lots"),
        ]));

        assert!(!config.security.insecure_dev_mode);
        assert_eq!(config.throttle.max_per_minute, 30);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(Config::default().validate().is_ok());

        let mut config = Config::default();
        config.throttle.max_per_minute = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::default();
        config.metrics.ema_alpha = 1.5;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::default();
        config.retry.base_delay_ms = 5000;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(Config::load(Some(&missing)), Err(Error::Io(_))));
    }
}
