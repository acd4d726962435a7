//! LLM backends: the generation contract the engine depends on, plus an HTTP client
//! for Anthropic, OpenAI, OpenAI-compatible, and local servers.

mod providers;

pub use providers::LlmProvider;

use async_trait::async_trait;
use dialectic_core::config::LlmConfig;
use providers::{AnthropicRequest, AnthropicResponse, ChatMessage, OpenAIRequest, OpenAIResponse};
use std::time::Duration;

/// Errors from LLM backend calls.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("response parse error: {0}")]
    Parse(String),
    #[error("empty response from LLM")]
    EmptyResponse,
}

/// The one capability the engine needs from a language model.
///
/// Implementations must be safe to share across concurrent queries.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Generate a completion for `prompt` under `system_prompt`, capped at `max_tokens`.
    async fn generate(
        &self,
        prompt: &str,
        max_tokens: u32,
        system_prompt: &str,
    ) -> Result<String, BackendError>;

    /// Human-readable backend name (for logging).
    fn name(&self) -> &str {
        "backend"
    }
}

/// HTTP client for the configured provider.
pub struct LlmClient {
    provider: LlmProvider,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(provider: LlmProvider, timeout: Duration) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Http(e.to_string()))?;
        Ok(Self { provider, http })
    }

    /// Resolve the provider from config + environment and build a client for it.
    pub fn from_config(config: &LlmConfig) -> anyhow::Result<Self> {
        let provider = LlmProvider::from_config(config)?;
        Ok(Self::new(provider, Duration::from_secs(config.timeout_secs))?)
    }

    /// Human-readable provider name.
    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    /// Model name in use.
    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    async fn complete_anthropic(
        &self,
        api_key: &str,
        model: &str,
        system: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, BackendError> {
        let req = AnthropicRequest {
            model: model.to_string(),
            max_tokens,
            system: system.to_string(),
            messages: vec![ChatMessage::new("user", prompt)],
        };

        let resp = self
            .http
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&req)
            .send()
            .await
            .map_err(|e| BackendError::Http(format!("failed to call Anthropic API: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let body = resp
            .json::<AnthropicResponse>()
            .await
            .map_err(|e| BackendError::Parse(format!("Anthropic response: {}", e)))?;

        body.content
            .into_iter()
            .find_map(|c| c.text)
            .ok_or(BackendError::EmptyResponse)
    }

    /// Chat-completions call shared by OpenAI, OpenAI-compatible, and local servers.
    #[allow(clippy::too_many_arguments)]
    async fn complete_chat(
        &self,
        url: &str,
        api_key: Option<&str>,
        model: &str,
        system: &str,
        prompt: &str,
        max_tokens: u32,
        temperature: Option<f64>,
    ) -> Result<String, BackendError> {
        let label = self.provider.provider_name();
        let req = OpenAIRequest {
            model: model.to_string(),
            max_tokens,
            messages: vec![
                ChatMessage::new("system", system),
                ChatMessage::new("user", prompt),
            ],
            temperature,
        };

        let mut builder = self
            .http
            .post(url)
            .header("content-type", "application/json")
            .json(&req);
        if let Some(key) = api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| BackendError::Http(format!("failed to call {} at {}: {}", label, url, e)))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let body = resp
            .json::<OpenAIResponse>()
            .await
            .map_err(|e| BackendError::Parse(format!("{} response: {}", label, e)))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(BackendError::EmptyResponse)
    }
}

#[async_trait]
impl Backend for LlmClient {
    async fn generate(
        &self,
        prompt: &str,
        max_tokens: u32,
        system_prompt: &str,
    ) -> Result<String, BackendError> {
        match &self.provider {
            LlmProvider::Anthropic { api_key, model } => {
                self.complete_anthropic(api_key, model, system_prompt, prompt, max_tokens)
                    .await
            }
            LlmProvider::OpenAI { api_key, model } => {
                self.complete_chat(
                    "https://api.openai.com/v1/chat/completions",
                    Some(api_key),
                    model,
                    system_prompt,
                    prompt,
                    max_tokens,
                    None,
                )
                .await
            }
            LlmProvider::OpenAICompatible {
                api_key,
                base_url,
                model,
            } => {
                let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));
                self.complete_chat(
                    &url,
                    Some(api_key),
                    model,
                    system_prompt,
                    prompt,
                    max_tokens,
                    None,
                )
                .await
            }
            LlmProvider::Local { base_url, model } => {
                let url = format!("{}/v1/chat/completions", base_url.trim_end_matches('/'));
                // Deterministic output for local models
                self.complete_chat(
                    &url,
                    None,
                    model,
                    system_prompt,
                    prompt,
                    max_tokens,
                    Some(0.0),
                )
                .await
            }
        }
    }

    fn name(&self) -> &str {
        self.provider.provider_name()
    }
}

/// Strip `<think>...</think>` blocks that some models (qwen3, deepseek) emit.
pub fn strip_think_blocks(text: &str) -> String {
    let mut result = text.to_string();
    while let Some(start) = result.find("<think>") {
        if let Some(end_offset) = result[start..].find("</think>") {
            let end = start + end_offset + "</think>".len();
            result = format!("{}{}", &result[..start], &result[end..]);
        } else {
            // Unclosed think block: truncate from <think> onward
            result.truncate(start);
            break;
        }
    }
    result
}
