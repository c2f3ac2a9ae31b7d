//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every field has a default matching the trading server's stock setup, so a
//! partial (or missing) file still yields a runnable agent. Secrets are
//! referenced by env-var name and resolved at runtime.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub feeds: FeedsConfig,
    pub analysis: AnalysisConfig,
    pub advisory: AdvisoryConfig,
    pub orders: OrdersConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    /// Identity attached to every submitted order.
    pub username: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "SCOUT-001".to_string(),
            username: "agent1".to_string(),
        }
    }
}

/// What to do with a message that fails to decode.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DecodeErrorPolicy {
    /// Drop the message and keep reading.
    #[default]
    Skip,
    /// Tear the connection down and reconnect.
    Reconnect,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FeedsConfig {
    pub market_url: String,
    pub events_url: String,
    pub reconnect_delay_secs: f64,
    pub connect_timeout_secs: f64,
    pub decode_error_policy: DecodeErrorPolicy,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            market_url: "ws://localhost:3030/ws/market".to_string(),
            events_url: "ws://localhost:3030/ws/events".to_string(),
            reconnect_delay_secs: 5.0,
            connect_timeout_secs: 10.0,
            decode_error_policy: DecodeErrorPolicy::Skip,
        }
    }
}

impl FeedsConfig {
    pub fn reconnect_delay(&self) -> Duration {
        secs(self.reconnect_delay_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        secs(self.connect_timeout_secs)
    }
}

/// Whether two analysis cycles for the same entity may overlap.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    #[default]
    Allow,
    SkipInFlight,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AnalysisConfig {
    pub min_events: usize,
    pub min_ticks: usize,
    /// How many recent events go into each prompt.
    pub events_in_prompt: usize,
    pub overlap_policy: OverlapPolicy,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_events: 3,
            min_ticks: 1,
            events_in_prompt: 3,
            overlap_policy: OverlapPolicy::Allow,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AdvisoryConfig {
    /// "gemini" | "openrouter" | "anthropic"
    pub provider: String,
    pub model: String,
    pub api_key_env: String,
    pub max_tokens: u32,
    pub timeout_secs: f64,
    /// Pause after every advisory call, successful or not.
    pub cooldown_secs: f64,
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-pro".to_string(),
            api_key_env: "GOOGLE_API_KEY".to_string(),
            max_tokens: 1024,
            timeout_secs: 60.0,
            cooldown_secs: 5.0,
        }
    }
}

impl AdvisoryConfig {
    pub fn timeout(&self) -> Duration {
        secs(self.timeout_secs)
    }

    pub fn cooldown(&self) -> Duration {
        secs(self.cooldown_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OrdersConfig {
    pub endpoint: String,
    pub timeout_secs: f64,
    /// Pause after every submission attempt.
    pub cooldown_secs: f64,
    /// Log orders instead of sending them.
    pub dry_run: bool,
}

impl Default for OrdersConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:3030/order".to_string(),
            timeout_secs: 10.0,
            cooldown_secs: 5.0,
            dry_run: false,
        }
    }
}

impl OrdersConfig {
    pub fn timeout(&self) -> Duration {
        secs(self.timeout_secs)
    }

    pub fn cooldown(&self) -> Duration {
        secs(self.cooldown_secs)
    }
}

fn secs(value: f64) -> Duration {
    Duration::from_secs_f64(value.max(0.0))
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            info!(path, "No config file found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// The advisory API key, if the referenced variable is set and non-empty.
    pub fn advisory_api_key(&self) -> Option<SecretString> {
        Self::resolve_env(&self.advisory.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .map(SecretString::new)
    }
}
