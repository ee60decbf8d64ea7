//! Layered configuration: built-in defaults, then an optional TOML file,
//! then environment overrides. Validation runs last so every layer is
//! checked together.

use serde::Deserialize;
use std::path::Path;

use crate::completion::RetryPolicy;
use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
    pub throttle: ThrottleConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_base: String,
    /// Absent means offline: the CLI falls back to the scripted client.
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f64,
    pub max_output_tokens: u32,
    pub request_timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".into(),
            api_key: None,
            model: "gpt-4".into(),
            temperature: 0.7,
            max_output_tokens: 800,
            request_timeout_secs: 60,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Regenerations allowed after the initial draft.
    pub max_revisions: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { max_revisions: 3 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    pub enabled: bool,
    pub window_minutes: u32,
    /// Lifetime spend above which the frequency cap no longer applies.
    pub vip_spend_threshold: f64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_minutes: 60,
            vip_spend_threshold: 10_000.0,
        }
    }
}

impl Config {
    /// Load from an optional TOML file, apply environment overrides,
    /// validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                toml::from_str(&raw).map_err(|err| ConfigError::Load(err.to_string()))?
            }
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Environment wins over file values. The lookup is injected so tests
    /// never have to mutate process globals.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(base) = lookup("OPENAI_API_BASE") {
            self.llm.api_base = base;
        }
        if let Some(model) = lookup("OPENAI_MODEL") {
            self.llm.model = model;
        }
        if let Some(raw) = lookup("AGENT_TEMPERATURE") {
            match raw.parse::<f64>() {
                Ok(value) => self.llm.temperature = value,
                Err(_) => {
                    tracing::warn!(value = %raw, "AGENT_TEMPERATURE is not a number, ignoring");
                }
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Validation(format!(
                "llm.temperature must be within 0.0..=2.0, got {}",
                self.llm.temperature
            )));
        }
        if self.llm.max_output_tokens == 0 {
            return Err(ConfigError::Validation(
                "llm.max_output_tokens must be at least 1".into(),
            ));
        }
        if self.llm.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "llm.request_timeout_secs must be at least 1".into(),
            ));
        }
        if self.llm.retry.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "llm.retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.throttle.enabled && self.throttle.window_minutes == 0 {
            return Err(ConfigError::Validation(
                "throttle.window_minutes must be at least 1 when the throttle is enabled".into(),
            ));
        }
        Ok(())
    }
}
