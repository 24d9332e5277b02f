//! HTTP clients for the supported text-generation providers.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use switchover_core::config::{AppConfig, ProviderConfig, ProviderKind};

use crate::llm::{GenerationOptions, LlmClient, ProviderError, ProviderSlot};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_RETRY_AFTER_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ProviderBuildError {
    #[error("provider `{0}` has no api key")]
    MissingApiKey(&'static str),
    #[error("failed to build http client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Builds the ordered provider chain from configuration. Providers without an
/// API key are skipped.
pub fn build_provider_chain(config: &AppConfig) -> Result<Vec<ProviderSlot>, ProviderBuildError> {
    let http = Client::builder().timeout(config.orchestrator.call_timeout()).build()?;

    config
        .enabled_providers()
        .map(|provider| {
            let client = build_client(provider, http.clone())?;
            Ok(ProviderSlot::new(client, GenerationOptions::from(provider)))
        })
        .collect()
}

fn build_client(
    provider: &ProviderConfig,
    http: Client,
) -> Result<Arc<dyn LlmClient>, ProviderBuildError> {
    let api_key = provider
        .api_key
        .clone()
        .ok_or(ProviderBuildError::MissingApiKey(provider.kind.as_str()))?;
    let base_url = provider.resolved_base_url().trim_end_matches('/').to_string();

    let client: Arc<dyn LlmClient> = match provider.kind {
        ProviderKind::Anthropic => Arc::new(AnthropicClient::new(http, api_key, base_url)),
        ProviderKind::OpenAi => Arc::new(OpenAiClient::new(http, api_key, base_url)),
        ProviderKind::Gemini => Arc::new(GeminiClient::new(http, api_key, base_url)),
    };
    Ok(client)
}

pub struct AnthropicClient {
    http: Client,
    api_key: SecretString,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(http: Client, api_key: SecretString, base_url: impl Into<String>) -> Self {
        Self { http, api_key, base_url: base_url.into() }
    }

    fn request_body(prompt: &str, options: &GenerationOptions) -> Value {
        json!({
            "model": options.model,
            "max_tokens": options.max_tokens,
            "temperature": options.temperature,
            "messages": [{"role": "user", "content": prompt}],
        })
    }

    fn extract_text(body: &Value) -> Result<String, ProviderError> {
        let blocks = body["content"].as_array().ok_or_else(|| {
            ProviderError::Provider("missing `content` array in anthropic response".to_string())
        })?;
        let text = blocks
            .iter()
            .filter(|block| block["type"] == "text")
            .filter_map(|block| block["text"].as_str())
            .collect::<Vec<_>>()
            .join("\n");
        non_empty_completion(text)
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        debug!(provider = "anthropic", model = %options.model, "sending completion request");

        let request = self
            .http
            .post(&url)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&Self::request_body(prompt, options));
        let body = send_json(request).await?;
        Self::extract_text(&body)
    }
}

pub struct OpenAiClient {
    http: Client,
    api_key: SecretString,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(http: Client, api_key: SecretString, base_url: impl Into<String>) -> Self {
        Self { http, api_key, base_url: base_url.into() }
    }

    fn request_body(prompt: &str, options: &GenerationOptions) -> Value {
        json!({
            "model": options.model,
            "max_tokens": options.max_tokens,
            "temperature": options.temperature,
            "messages": [{"role": "user", "content": prompt}],
        })
    }

    fn extract_text(body: &Value) -> Result<String, ProviderError> {
        let text = body["choices"][0]["message"]["content"].as_str().ok_or_else(|| {
            ProviderError::Provider("missing `choices[0].message.content` in response".into())
        })?;
        non_empty_completion(text.to_string())
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        debug!(provider = "openai", model = %options.model, "sending completion request");

        let request = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&Self::request_body(prompt, options));
        let body = send_json(request).await?;
        Self::extract_text(&body)
    }
}

pub struct GeminiClient {
    http: Client,
    api_key: SecretString,
    base_url: String,
}

impl GeminiClient {
    pub fn new(http: Client, api_key: SecretString, base_url: impl Into<String>) -> Self {
        Self { http, api_key, base_url: base_url.into() }
    }

    fn request_body(prompt: &str, options: &GenerationOptions) -> Value {
        json!({
            "contents": [{"role": "user", "parts": [{"text": prompt}]}],
            "generationConfig": {
                "temperature": options.temperature,
                "maxOutputTokens": options.max_tokens,
            },
        })
    }

    fn extract_text(body: &Value) -> Result<String, ProviderError> {
        let parts = body["candidates"][0]["content"]["parts"].as_array().ok_or_else(|| {
            ProviderError::Provider("missing `candidates[0].content.parts` in response".into())
        })?;
        let text =
            parts.iter().filter_map(|part| part["text"].as_str()).collect::<Vec<_>>().join("");
        non_empty_completion(text)
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, options.model);
        debug!(provider = "gemini", model = %options.model, "sending completion request");

        let request = self
            .http
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&Self::request_body(prompt, options));
        let body = send_json(request).await?;
        Self::extract_text(&body)
    }
}

async fn send_json(request: reqwest::RequestBuilder) -> Result<Value, ProviderError> {
    let response = request.send().await.map_err(map_transport_error)?;
    let status = response.status();
    let body_text = response.text().await.map_err(map_transport_error)?;

    if !status.is_success() {
        return Err(map_http_error(status, &body_text));
    }

    serde_json::from_str(&body_text)
        .map_err(|error| ProviderError::Provider(format!("invalid JSON in response: {error}")))
}

fn map_transport_error(error: reqwest::Error) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Provider(format!("request failed: {error}"))
    }
}

/// 429 becomes `RateLimited`; every other non-success status is a provider error.
pub fn map_http_error(status: StatusCode, body_text: &str) -> ProviderError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after_secs = serde_json::from_str::<Value>(body_text)
                .ok()
                .and_then(|body| body["error"]["retry_after_secs"].as_u64())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            ProviderError::RateLimited { retry_after_secs }
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ProviderError::Timeout,
        _ => ProviderError::Provider(format!("HTTP {status}: {}", truncate(body_text, 200))),
    }
}

fn non_empty_completion(text: String) -> Result<String, ProviderError> {
    if text.trim().is_empty() {
        return Err(ProviderError::Provider("provider returned an empty completion".to_string()));
    }
    Ok(text)
}

fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;
    use secrecy::SecretString;
    use serde_json::json;

    use switchover_core::config::{AppConfig, ProviderConfig, ProviderKind};

    use super::{
        build_provider_chain, map_http_error, AnthropicClient, GeminiClient, OpenAiClient,
    };
    use crate::llm::{GenerationOptions, ProviderError};

    fn options() -> GenerationOptions {
        GenerationOptions { model: "model-x".to_string(), temperature: 0.2, max_tokens: 512 }
    }

    #[test]
    fn rate_limit_maps_with_retry_hint_and_default() {
        assert_eq!(
            map_http_error(
                StatusCode::TOO_MANY_REQUESTS,
                r#"{"error":{"message":"slow down","retry_after_secs":12}}"#
            ),
            ProviderError::RateLimited { retry_after_secs: 12 }
        );
        assert_eq!(
            map_http_error(StatusCode::TOO_MANY_REQUESTS, "not json"),
            ProviderError::RateLimited { retry_after_secs: 30 }
        );
    }

    #[test]
    fn other_statuses_map_to_provider_errors() {
        match map_http_error(StatusCode::INTERNAL_SERVER_ERROR, r#"{"error":"boom"}"#) {
            ProviderError::Provider(message) => {
                assert!(message.contains("500"));
                assert!(message.contains("boom"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(map_http_error(StatusCode::GATEWAY_TIMEOUT, ""), ProviderError::Timeout);
    }

    #[test]
    fn anthropic_text_blocks_are_joined() {
        let body = json!({
            "content": [
                {"type": "text", "text": "| technical | 7 |"},
                {"type": "tool_use", "id": "x"},
                {"type": "text", "text": "| economic | 5 |"}
            ]
        });
        let text = AnthropicClient::extract_text(&body).expect("text content");
        assert_eq!(text, "| technical | 7 |\n| economic | 5 |");
    }

    #[test]
    fn empty_completions_are_provider_errors() {
        let anthropic = json!({"content": [{"type": "text", "text": "  "}]});
        let openai = json!({"choices": [{"message": {"content": ""}}]});
        let gemini = json!({"candidates": [{"content": {"parts": []}}]});

        for result in [
            AnthropicClient::extract_text(&anthropic),
            OpenAiClient::extract_text(&openai),
            GeminiClient::extract_text(&gemini),
        ] {
            assert!(matches!(
                result,
                Err(ProviderError::Provider(message)) if message.contains("empty")
            ));
        }
    }

    #[test]
    fn openai_and_gemini_responses_are_extracted() {
        let openai = json!({
            "choices": [{"message": {"role": "assistant", "content": "PHASE | a | b"}}]
        });
        let gemini = json!({
            "candidates": [{"content": {"parts": [{"text": "TOTAL | "}, {"text": "6 months"}]}}]
        });

        assert_eq!(OpenAiClient::extract_text(&openai).expect("openai"), "PHASE | a | b");
        assert_eq!(GeminiClient::extract_text(&gemini).expect("gemini"), "TOTAL | 6 months");
        assert!(OpenAiClient::extract_text(&json!({"error": "x"})).is_err());
    }

    #[test]
    fn request_bodies_carry_generation_options() {
        let anthropic = AnthropicClient::request_body("prompt", &options());
        assert_eq!(anthropic["model"], "model-x");
        assert_eq!(anthropic["max_tokens"], 512);
        assert_eq!(anthropic["messages"][0]["content"], "prompt");

        let gemini = GeminiClient::request_body("prompt", &options());
        assert_eq!(gemini["generationConfig"]["maxOutputTokens"], 512);
        assert_eq!(gemini["contents"][0]["parts"][0]["text"], "prompt");
    }

    #[test]
    fn provider_chain_keeps_config_order_and_skips_keyless_entries() {
        let mut config = AppConfig::default();
        let mut gemini = ProviderConfig::new(ProviderKind::Gemini);
        gemini.api_key = Some(SecretString::from("g-key".to_string()));
        let openai = ProviderConfig::new(ProviderKind::OpenAi);
        let mut anthropic = ProviderConfig::new(ProviderKind::Anthropic);
        anthropic.api_key = Some(SecretString::from("a-key".to_string()));
        anthropic.model = "claude-custom".to_string();
        config.providers = vec![gemini, openai, anthropic];

        let chain = build_provider_chain(&config).expect("chain builds");

        let names = chain.iter().map(|slot| slot.name().to_string()).collect::<Vec<_>>();
        assert_eq!(names, vec!["gemini", "anthropic"]);
        assert_eq!(chain[1].options.model, "claude-custom");
    }
}
