//! LLM provider selection and API request/response types.

use anyhow::{Context, Result};
use dialectic_core::config::LlmConfig;
use serde::{Deserialize, Serialize};

const ANTHROPIC_DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";

/// LLM provider configuration.
#[derive(Clone)]
pub enum LlmProvider {
    Anthropic {
        api_key: String,
        model: String,
    },
    OpenAI {
        api_key: String,
        model: String,
    },
    /// Any OpenAI-compatible API with Bearer token auth (Together, OpenRouter, etc.)
    OpenAICompatible {
        api_key: String,
        base_url: String,
        model: String,
    },
    /// Unauthenticated OpenAI-style local server (Ollama, LM Studio, vLLM).
    Local {
        base_url: String,
        model: String,
    },
}

impl std::fmt::Debug for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmProvider")
            .field("provider", &self.provider_name())
            .field("model", &self.model_name())
            .finish()
    }
}

/// Read a credential from the environment, treating empty values as unset.
fn env_key(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl LlmProvider {
    /// Resolve the provider from config and environment.
    ///
    /// Priority chain:
    /// 1. `config.provider` forced -> use that provider
    /// 2. `ANTHROPIC_API_KEY` -> Anthropic
    /// 3. `OPENAI_API_KEY` -> OpenAI
    /// 4. `DIALECTIC_LOCAL_URL` set -> local server at that URL
    /// 5. Error with helpful message
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        if let Some(ref forced) = config.provider {
            return Self::from_forced_provider(forced, config);
        }

        if let Some(key) = env_key("ANTHROPIC_API_KEY") {
            return Ok(Self::Anthropic {
                api_key: key,
                model: model_or(config, ANTHROPIC_DEFAULT_MODEL),
            });
        }

        if let Some(key) = env_key("OPENAI_API_KEY") {
            return Ok(Self::OpenAI {
                api_key: key,
                model: model_or(config, OPENAI_DEFAULT_MODEL),
            });
        }

        if let Some(base_url) = env_key("DIALECTIC_LOCAL_URL") {
            return Ok(Self::Local {
                base_url,
                model: model_or(config, &config.local_model),
            });
        }

        anyhow::bail!(
            "No LLM provider available. Options:\n\
             - Set ANTHROPIC_API_KEY for Anthropic\n\
             - Set OPENAI_API_KEY for OpenAI\n\
             - Set DIALECTIC_LOCAL_URL for any OpenAI-compatible local server (Ollama, LM Studio, vLLM)\n\
             - Set DIALECTIC_PROVIDER to force a provider"
        )
    }

    /// Resolve a forced provider name to a provider instance.
    fn from_forced_provider(provider: &str, config: &LlmConfig) -> Result<Self> {
        match provider {
            "anthropic" => {
                let key = env_key("ANTHROPIC_API_KEY")
                    .context("provider=anthropic but ANTHROPIC_API_KEY not set")?;
                Ok(Self::Anthropic {
                    api_key: key,
                    model: model_or(config, ANTHROPIC_DEFAULT_MODEL),
                })
            }
            "openai" => {
                let key = env_key("OPENAI_API_KEY")
                    .context("provider=openai but OPENAI_API_KEY not set")?;
                Ok(Self::OpenAI {
                    api_key: key,
                    model: model_or(config, OPENAI_DEFAULT_MODEL),
                })
            }
            "openai-compatible" => {
                let key = env_key("DIALECTIC_API_KEY")
                    .context("provider=openai-compatible but DIALECTIC_API_KEY not set")?;
                let base_url =
                    env_key("DIALECTIC_BASE_URL").unwrap_or_else(|| config.local_url.clone());
                Ok(Self::OpenAICompatible {
                    api_key: key,
                    base_url,
                    model: model_or(config, &config.local_model),
                })
            }
            "local" => Ok(Self::Local {
                base_url: env_key("DIALECTIC_LOCAL_URL")
                    .unwrap_or_else(|| config.local_url.clone()),
                model: model_or(config, &config.local_model),
            }),
            other => anyhow::bail!(
                "Unknown provider '{}'. Valid: anthropic, openai, openai-compatible, local",
                other
            ),
        }
    }

    /// Human-readable provider name.
    pub fn provider_name(&self) -> &str {
        match self {
            Self::Anthropic { .. } => "Anthropic",
            Self::OpenAI { .. } => "OpenAI",
            Self::OpenAICompatible { .. } => "OpenAI-Compatible",
            Self::Local { .. } => "Local",
        }
    }

    /// Model name in use.
    pub fn model_name(&self) -> &str {
        match self {
            Self::Anthropic { model, .. }
            | Self::OpenAI { model, .. }
            | Self::OpenAICompatible { model, .. }
            | Self::Local { model, .. } => model,
        }
    }
}

fn model_or(config: &LlmConfig, default: &str) -> String {
    config
        .model
        .clone()
        .unwrap_or_else(|| default.to_string())
}

// ---------------------------------------------------------------------------
// API Request / Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub(crate) struct AnthropicRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<ChatMessage>,
    pub system: String,
}

#[derive(Serialize)]
pub(crate) struct OpenAIRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// A role-tagged message; both APIs share this shape.
#[derive(Serialize)]
pub(crate) struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct AnthropicResponse {
    pub content: Vec<AnthropicContent>,
}

/// A content block. Non-text blocks (thinking, tool use) carry no `text`.
#[derive(Deserialize)]
pub(crate) struct AnthropicContent {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct OpenAIResponse {
    pub choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
pub(crate) struct OpenAIChoice {
    pub message: OpenAIChoiceMessage,
}

#[derive(Deserialize)]
pub(crate) struct OpenAIChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const PROVIDER_VARS: [&str; 5] = [
        "ANTHROPIC_API_KEY",
        "OPENAI_API_KEY",
        "DIALECTIC_LOCAL_URL",
        "DIALECTIC_API_KEY",
        "DIALECTIC_BASE_URL",
    ];

    /// Run `f` with exactly `vars` set among the provider variables, then restore them.
    fn with_provider_env<T>(vars: &[(&str, &str)], f: impl FnOnce() -> T) -> T {
        let saved: Vec<_> = PROVIDER_VARS
            .iter()
            .map(|var| (*var, std::env::var(var).ok()))
            .collect();
        // SAFETY: every test that touches these variables is #[serial].
        unsafe {
            for var in PROVIDER_VARS {
                std::env::remove_var(var);
            }
            for (var, value) in vars {
                std::env::set_var(var, value);
            }
        }
        let out = f();
        unsafe {
            for (var, value) in saved {
                match value {
                    Some(v) => std::env::set_var(var, v),
                    None => std::env::remove_var(var),
                }
            }
        }
        out
    }

    fn local_base_url(provider: &LlmProvider) -> &str {
        match provider {
            LlmProvider::Local { base_url, .. } => base_url,
            other => panic!("expected local provider, got {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn test_forced_local_provider() {
        let config = LlmConfig {
            provider: Some("local".to_string()),
            ..LlmConfig::default()
        };
        let provider = with_provider_env(&[], || LlmProvider::from_config(&config)).unwrap();
        assert_eq!(provider.provider_name(), "Local");
        assert_eq!(provider.model_name(), "qwen2.5:7b");
        assert_eq!(local_base_url(&provider), "http://localhost:11434");
    }

    #[test]
    #[serial]
    fn test_forced_local_with_model_override() {
        let config = LlmConfig {
            provider: Some("local".to_string()),
            model: Some("llama3.1:8b".to_string()),
            ..LlmConfig::default()
        };
        let provider = with_provider_env(&[], || LlmProvider::from_config(&config)).unwrap();
        assert_eq!(provider.model_name(), "llama3.1:8b");
    }

    #[test]
    fn test_unknown_forced_provider() {
        let config = LlmConfig {
            provider: Some("palm".to_string()),
            ..LlmConfig::default()
        };
        let err = LlmProvider::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("Unknown provider 'palm'"));
    }

    #[test]
    #[serial]
    fn test_no_provider_available_is_error() {
        let err = with_provider_env(&[], || LlmProvider::from_config(&LlmConfig::default()))
            .unwrap_err();
        assert!(err.to_string().contains("No LLM provider available"));
    }

    #[test]
    #[serial]
    fn test_forced_provider_without_key_is_error() {
        let anthropic = LlmConfig {
            provider: Some("anthropic".to_string()),
            ..LlmConfig::default()
        };
        let err = with_provider_env(&[("OPENAI_API_KEY", "sk-openai")], || {
            LlmProvider::from_config(&anthropic)
        })
        .unwrap_err();
        assert!(err.to_string().contains("ANTHROPIC_API_KEY not set"));

        let compatible = LlmConfig {
            provider: Some("openai-compatible".to_string()),
            ..LlmConfig::default()
        };
        let err = with_provider_env(&[], || LlmProvider::from_config(&compatible)).unwrap_err();
        assert!(err.to_string().contains("DIALECTIC_API_KEY not set"));
    }

    #[test]
    #[serial]
    fn test_detection_order() {
        fn detect(vars: &[(&str, &str)]) -> LlmProvider {
            with_provider_env(vars, || LlmProvider::from_config(&LlmConfig::default())).unwrap()
        }

        let both = detect(&[
            ("ANTHROPIC_API_KEY", "sk-ant"),
            ("OPENAI_API_KEY", "sk-openai"),
            ("DIALECTIC_LOCAL_URL", "http://gpu-box:8000"),
        ]);
        assert_eq!(both.provider_name(), "Anthropic");
        assert_eq!(both.model_name(), ANTHROPIC_DEFAULT_MODEL);

        let openai = detect(&[
            ("OPENAI_API_KEY", "sk-openai"),
            ("DIALECTIC_LOCAL_URL", "http://gpu-box:8000"),
        ]);
        assert_eq!(openai.provider_name(), "OpenAI");

        let blank_key = detect(&[
            ("ANTHROPIC_API_KEY", "   "),
            ("DIALECTIC_LOCAL_URL", "http://gpu-box:8000"),
        ]);
        assert_eq!(blank_key.provider_name(), "Local");
    }

    #[test]
    #[serial]
    fn test_local_url_comes_from_env() {
        let detected = with_provider_env(&[("DIALECTIC_LOCAL_URL", "http://gpu-box:8000")], || {
            LlmProvider::from_config(&LlmConfig::default())
        })
        .unwrap();
        assert_eq!(local_base_url(&detected), "http://gpu-box:8000");

        let forced = LlmConfig {
            provider: Some("local".to_string()),
            ..LlmConfig::default()
        };
        let forced = with_provider_env(&[("DIALECTIC_LOCAL_URL", "http://gpu-box:8000")], || {
            LlmProvider::from_config(&forced)
        })
        .unwrap();
        assert_eq!(local_base_url(&forced), "http://gpu-box:8000");
    }

    #[test]
    fn test_debug_omits_api_key() {
        let provider = LlmProvider::Anthropic {
            api_key: "sk-secret".to_string(),
            model: "claude".to_string(),
        };
        let dbg = format!("{:?}", provider);
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("Anthropic"));
    }

    #[test]
    fn test_chat_message_shape() {
        let json = serde_json::to_value(ChatMessage::new("system", "be brief")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "system", "content": "be brief"}));
    }

    #[test]
    fn test_response_with_null_content_parses() {
        let body: OpenAIResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(body.choices[0].message.content.is_none());

        let body: AnthropicResponse =
            serde_json::from_str(r#"{"content":[{"type":"thinking"},{"type":"text","text":"hi"}]}"#)
                .unwrap();
        assert_eq!(body.content[1].text.as_deref(), Some("hi"));
    }
}
