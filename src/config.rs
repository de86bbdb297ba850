//! Planforge configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::llm::GatewayConfig;

/// Main planforge configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider configuration
    pub llm: LlmConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that required environment variables are set. Call this early
    /// in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if std::env::var(&self.llm.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.llm.api_key_env
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .planforge.yml
        let local_config = PathBuf::from(".planforge.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/planforge/planforge.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("planforge").join("planforge.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Model for quick analysis verdicts
    #[serde(rename = "fast-model")]
    pub fast_model: String,

    /// Thinking-class model for long structured generation
    #[serde(rename = "deep-model")]
    pub deep_model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL (any OpenAI-compatible endpoint)
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Fast-model request timeout in milliseconds; deep models get 5x this
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Total attempts per model invocation
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// First retry delay in milliseconds; doubles per attempt
    #[serde(rename = "backoff-base-ms")]
    pub backoff_base_ms: u64,

    /// Fixed delay after a rate-limit response, in milliseconds
    #[serde(rename = "rate-limit-backoff-ms")]
    pub rate_limit_backoff_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            fast_model: "inclusionAI/Ling-flash-2.0".to_string(),
            deep_model: "moonshotai/Kimi-K2-Thinking".to_string(),
            api_key_env: "SILICONFLOW_API_KEY".to_string(),
            base_url: "https://api.siliconflow.cn/v1".to_string(),
            timeout_ms: 120_000,
            max_retries: 3,
            backoff_base_ms: 1_000,
            rate_limit_backoff_ms: 5_000,
        }
    }
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .context(format!("{} environment variable not set", self.api_key_env))
    }

    /// Resolve gateway policy from this configuration
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            fast_model: self.fast_model.clone(),
            deep_model: self.deep_model.clone(),
            max_retries: self.max_retries,
            backoff_base: Duration::from_millis(self.backoff_base_ms),
            rate_limit_backoff: Duration::from_millis(self.rate_limit_backoff_ms),
            fast_timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}
