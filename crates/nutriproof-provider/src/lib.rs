//! Text-generation backends used to turn research into a recommendation.

pub mod anthropic;
pub mod error;
pub mod openai;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use anthropic::AnthropicProvider;
pub use error::{ProviderError, ProviderErrorKind};
pub use openai::OpenAiProvider;
pub use types::*;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Short backend label for logs.
    fn name(&self) -> &'static str;

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError>;
}

pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(?timeout, "http client setup failed, using reqwest defaults: {e}");
            reqwest::Client::new()
        })
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Anthropic,
    OpenAI,
    /// Local OpenAI-compatible server; no key.
    Ollama,
    /// Any other OpenAI-compatible endpoint.
    Custom,
}

impl ProviderType {
    pub fn requires_api_key(self) -> bool {
        !matches!(self, Self::Ollama)
    }

    pub fn requires_base_url(self) -> bool {
        matches!(self, Self::Custom)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ProviderConfig {
    pub fn new(provider_type: ProviderType) -> Self {
        Self {
            provider_type,
            api_key: None,
            base_url: None,
            timeout_secs: None,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

/// Builds the backend for `config`. Empty strings count as absent.
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn LlmProvider>> {
    let api_key = config.api_key.as_deref().filter(|k| !k.is_empty());
    let base_url = config.base_url.as_deref().filter(|u| !u.is_empty());
    let timeout = config
        .timeout_secs
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_TIMEOUT);
    let missing_key = || anyhow!("{:?} provider requires api_key", config.provider_type);

    let provider: Arc<dyn LlmProvider> = match config.provider_type {
        ProviderType::Anthropic => Arc::new(AnthropicProvider::with_timeout(
            api_key.ok_or_else(missing_key)?,
            base_url.unwrap_or(anthropic::DEFAULT_BASE_URL),
            timeout,
        )),
        ProviderType::OpenAI => Arc::new(OpenAiProvider::with_timeout(
            api_key.ok_or_else(missing_key)?,
            base_url.unwrap_or(openai::DEFAULT_BASE_URL),
            timeout,
        )),
        ProviderType::Ollama => Arc::new(OpenAiProvider::with_timeout(
            "ollama",
            base_url.unwrap_or(openai::OLLAMA_BASE_URL),
            timeout,
        )),
        ProviderType::Custom => {
            let key = api_key.ok_or_else(missing_key)?;
            let base_url = base_url.ok_or_else(|| anyhow!("Custom provider requires base_url"))?;
            Arc::new(OpenAiProvider::with_timeout(key, base_url, timeout))
        }
    };
    tracing::debug!(provider = provider.name(), "created text-generation provider");
    Ok(provider)
}

/// Echoes the prompt back, prefixed with the model name.
pub struct StubProvider;

#[async_trait]
impl LlmProvider for StubProvider {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        Ok(Completion {
            text: format!("[stub:{}] {}", request.model, request.prompt),
            usage: None,
            stop_reason: Some(StopReason::EndTurn),
        })
    }
}
