//! Configuration for the prediction service
use crate::services::ranker::DEFAULT_TOP_K;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration struct, loaded from environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service name used in logs
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Directory holding one subdirectory per model artifact version
    #[serde(default = "default_artifact_root")]
    pub artifact_root: PathBuf,

    /// Version to serve; `current` follows the training job's symlink
    #[serde(default = "default_model_version")]
    pub model_version: String,

    /// Number of recommendations returned per request
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Upper bound on a single scorer call
    #[serde(default = "default_scoring_timeout_ms")]
    pub scoring_timeout_ms: u64,

    /// Scorer calls allowed to run at once
    #[serde(default = "default_max_concurrent_scoring")]
    pub max_concurrent_scoring: usize,
}

fn default_service_name() -> String {
    "prediction-service".to_string()
}

fn default_artifact_root() -> PathBuf {
    PathBuf::from("./models")
}

fn default_model_version() -> String {
    "current".to_string()
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_scoring_timeout_ms() -> u64 {
    2000
}

fn default_max_concurrent_scoring() -> usize {
    8
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            artifact_root: default_artifact_root(),
            model_version: default_model_version(),
            top_k: default_top_k(),
            scoring_timeout_ms: default_scoring_timeout_ms(),
            max_concurrent_scoring: default_max_concurrent_scoring(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let config: Config = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_k == 0 {
            return Err(ConfigError::Invalid("TOP_K must be at least 1".into()));
        }
        if self.max_concurrent_scoring == 0 {
            return Err(ConfigError::Invalid(
                "MAX_CONCURRENT_SCORING must be at least 1".into(),
            ));
        }
        if self.scoring_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "SCORING_TIMEOUT_MS must be positive".into(),
            ));
        }
        if self.model_version.trim().is_empty() {
            return Err(ConfigError::Invalid("MODEL_VERSION must not be blank".into()));
        }
        Ok(())
    }

    pub fn scoring_timeout(&self) -> Duration {
        Duration::from_millis(self.scoring_timeout_ms)
    }
}
