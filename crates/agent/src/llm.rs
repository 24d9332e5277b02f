use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use switchover_core::config::ProviderConfig;

/// Failure of a single provider call. Never leaves the orchestrator.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("provider call timed out")]
    Timeout,
    #[error("provider rate limited the request (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },
    #[error("provider error: {0}")]
    Provider(String),
}

impl ProviderError {
    /// Short failure label recorded with attempt metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::RateLimited { .. } => "rate_limited",
            Self::Provider(_) => "provider_error",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GenerationOptions {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl From<&ProviderConfig> for GenerationOptions {
    fn from(config: &ProviderConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Name recorded in metrics and logs.
    fn name(&self) -> &str;

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, ProviderError>;
}

/// A provider in the chain together with the options it is called with.
#[derive(Clone)]
pub struct ProviderSlot {
    pub client: Arc<dyn LlmClient>,
    pub options: GenerationOptions,
}

impl ProviderSlot {
    pub fn new(client: Arc<dyn LlmClient>, options: GenerationOptions) -> Self {
        Self { client, options }
    }

    pub fn name(&self) -> &str {
        self.client.name()
    }
}

impl std::fmt::Debug for ProviderSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSlot")
            .field("client", &self.client.name())
            .field("options", &self.options)
            .finish()
    }
}
