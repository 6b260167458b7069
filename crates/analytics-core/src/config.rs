// crates/analytics-core/src/config.rs
//! Configuration for the engine and the batch processor. Plain
//! `serde`-derived structs, loaded once at startup — no file watching,
//! no hot reload, no secrets.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub enable_incremental_processing: bool,
    pub cache_expiration_minutes: u64,
    pub batch_processing_size: usize,
    pub max_processing_time_ms: u64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            enable_incremental_processing: true,
            cache_expiration_minutes: 15,
            batch_processing_size: 50,
            max_processing_time_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchProcessorConfig {
    pub batch_size: usize,
    pub max_concurrency: usize,
    pub max_memory_usage_mb: u64,
    pub enable_progress_tracking: bool,
    pub enable_error_recovery: bool,
    pub retry_attempts: u32,
}

impl Default for BatchProcessorConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            max_concurrency: 4,
            max_memory_usage_mb: 512,
            enable_progress_tracking: true,
            enable_error_recovery: true,
            retry_attempts: 2,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub analytics: AnalyticsConfig,
    pub batch_processor: BatchProcessorConfig,
}

impl Config {
    /// Loads a TOML config file. Missing sections fall back to defaults
    /// because both halves derive `#[serde(default)]`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Read(path.as_ref().display().to_string(), e.to_string()))?;
        toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Overlays `ANALYTICS_*`-prefixed environment variables on top of
    /// `self`. Unset or unparsable variables leave the existing value
    /// untouched.
    pub fn overlay_env(mut self) -> Self {
        self.overlay_from(&std::env::vars().collect())
    }

    fn overlay_from(mut self, vars: &HashMap<String, String>) -> Self {
        macro_rules! overlay {
            ($key:literal, $field:expr, $parse:expr) => {
                if let Some(raw) = vars.get($key) {
                    if let Some(parsed) = $parse(raw.as_str()) {
                        $field = parsed;
                    }
                }
            };
        }
        overlay!("ANALYTICS_ENABLE_INCREMENTAL_PROCESSING", self.analytics.enable_incremental_processing, |s: &str| s
            .parse::<bool>()
            .ok());
        overlay!("ANALYTICS_CACHE_EXPIRATION_MINUTES", self.analytics.cache_expiration_minutes, |s: &str| s
            .parse::<u64>()
            .ok());
        overlay!("ANALYTICS_BATCH_PROCESSING_SIZE", self.analytics.batch_processing_size, |s: &str| s
            .parse::<usize>()
            .ok());
        overlay!("ANALYTICS_MAX_PROCESSING_TIME_MS", self.analytics.max_processing_time_ms, |s: &str| s
            .parse::<u64>()
            .ok());
        overlay!("ANALYTICS_BATCH_SIZE", self.batch_processor.batch_size, |s: &str| s.parse::<usize>().ok());
        overlay!("ANALYTICS_MAX_CONCURRENCY", self.batch_processor.max_concurrency, |s: &str| s
            .parse::<usize>()
            .ok());
        overlay!("ANALYTICS_MAX_MEMORY_USAGE_MB", self.batch_processor.max_memory_usage_mb, |s: &str| s
            .parse::<u64>()
            .ok());
        overlay!("ANALYTICS_ENABLE_PROGRESS_TRACKING", self.batch_processor.enable_progress_tracking, |s: &str| s
            .parse::<bool>()
            .ok());
        overlay!("ANALYTICS_ENABLE_ERROR_RECOVERY", self.batch_processor.enable_error_recovery, |s: &str| s
            .parse::<bool>()
            .ok());
        overlay!("ANALYTICS_RETRY_ATTEMPTS", self.batch_processor.retry_attempts, |s: &str| s.parse::<u32>().ok());
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file {0}: {1}")]
    Read(String, String),
    #[error("could not parse config file: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = Config::default();
        assert!(cfg.analytics.enable_incremental_processing);
        assert_eq!(cfg.analytics.batch_processing_size, 50);
        assert_eq!(cfg.batch_processor.max_concurrency, 4);
    }

    #[test]
    fn env_overlay_parses_recognized_vars_only() {
        let mut vars = HashMap::new();
        vars.insert("ANALYTICS_MAX_CONCURRENCY".to_string(), "8".to_string());
        vars.insert("ANALYTICS_ENABLE_INCREMENTAL_PROCESSING".to_string(), "false".to_string());
        vars.insert("ANALYTICS_BATCH_SIZE".to_string(), "not-a-number".to_string());
        let cfg = Config::default().overlay_from(&vars);
        assert_eq!(cfg.batch_processor.max_concurrency, 8);
        assert!(!cfg.analytics.enable_incremental_processing);
        assert_eq!(cfg.batch_processor.batch_size, 50);
    }

    #[test]
    fn toml_round_trips_partial_sections() {
        let toml_text = "[analytics]\nbatch_processing_size = 75\n";
        let cfg: Config = toml::from_str(toml_text).unwrap();
        assert_eq!(cfg.analytics.batch_processing_size, 75);
        assert_eq!(cfg.analytics.cache_expiration_minutes, 15);
        assert_eq!(cfg.batch_processor.max_concurrency, 4);
    }
}
