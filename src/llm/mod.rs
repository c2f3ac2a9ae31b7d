//! LLM integration for trade advice.
//!
//! Defines the `LlmProvider` trait (one raw text-generation call) and the
//! `AdvisoryClient` that turns an analysis snapshot into a prompt, calls the
//! provider once, and enforces the post-call cool-down. Implementations:
//! Google Gemini, OpenRouter, Anthropic.

pub mod anthropic;
pub mod gemini;
pub mod openrouter;
pub mod prompt;

use anyhow::{Context, Result};
use async_trait::async_trait;
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::AdvisoryConfig;
use crate::engine::trigger::AnalysisSnapshot;
use crate::types::ScoutError;

/// Abstraction over text-generation services.
///
/// The reply is unstructured; callers must not assume any format.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a prompt, return the reply text. One attempt, no retry.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Model identifier string.
    fn model_name(&self) -> &str;
}

/// Stand-in used when no API key is configured. Every call fails, so the
/// pipeline keeps ingesting but never produces an instruction.
pub struct DisabledProvider;

#[async_trait]
impl LlmProvider for DisabledProvider {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        anyhow::bail!("no advisory API key configured")
    }

    fn model_name(&self) -> &str {
        "disabled"
    }
}

/// Build the provider named in the config.
pub fn build_provider(cfg: &AdvisoryConfig, api_key: Option<SecretString>) -> Result<Arc<dyn LlmProvider>> {
    let Some(api_key) = api_key else {
        warn!(
            env = %cfg.api_key_env,
            "No advisory API key configured, running in ingest-only mode"
        );
        return Ok(Arc::new(DisabledProvider));
    };

    let provider: Arc<dyn LlmProvider> = match cfg.provider.as_str() {
        "gemini" => Arc::new(gemini::GeminiClient::new(
            api_key,
            Some(cfg.model.clone()),
            Some(cfg.max_tokens),
            cfg.timeout(),
        )?),
        "openrouter" => Arc::new(openrouter::OpenRouterClient::new(
            api_key,
            Some(cfg.model.clone()),
            Some(cfg.max_tokens),
            cfg.timeout(),
        )?),
        "anthropic" => Arc::new(anthropic::AnthropicClient::new(
            api_key,
            Some(cfg.model.clone()),
            Some(cfg.max_tokens),
            cfg.timeout(),
        )?),
        other => {
            return Err(ScoutError::Config(format!("unknown advisory provider: {other}")).into());
        }
    };

    info!(provider = %cfg.provider, model = %provider.model_name(), "Advisory provider ready");
    Ok(provider)
}

/// Prompt construction, one provider call, then the cool-down.
pub struct AdvisoryClient {
    provider: Arc<dyn LlmProvider>,
    cooldown: Duration,
}

impl AdvisoryClient {
    pub fn new(provider: Arc<dyn LlmProvider>, cooldown: Duration) -> Self {
        Self { provider, cooldown }
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Ask for advice on one snapshot.
    ///
    /// The cool-down is applied after the call whatever its outcome, so
    /// back-to-back cycles respect the upstream rate limit.
    pub async fn advise(&self, snapshot: &AnalysisSnapshot) -> Result<String> {
        let prompt = prompt::build_prompt(snapshot).context("Failed to build advisory prompt")?;

        let result = self.provider.generate(&prompt).await.map_err(|e| {
            anyhow::Error::from(ScoutError::Advisory {
                provider: self.provider.model_name().to_string(),
                message: format!("{e:#}"),
            })
        });

        if let Ok(ref text) = result {
            info!(
                entity = %snapshot.entity_id,
                model = %self.provider.model_name(),
                analysis = %text,
                "Advisory analysis received"
            );
        }

        tokio::time::sleep(self.cooldown).await;
        result
    }
}
