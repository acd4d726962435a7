//! Configuration for the engine, LLM backend, and embedding provider.
//!
//! Load order: `.dialectic/config.toml` → environment variables → defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DialecticConfig {
    pub engine: EngineConfig,
    pub llm: LlmConfig,
    pub embeddings: EmbeddingConfig,
}

/// Phase orchestration knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Conflict score at or above which synthesis runs.
    pub synthesis_threshold: f64,
    /// Token budget passed to the backend for each of the three phases.
    pub max_tokens_per_phase: u32,
    /// Dialectical cycles per query. Values below 1 disable synthesis;
    /// only a single cycle is run today.
    pub max_iterations: u32,
    /// Token budget for the conflict classifier sub-call.
    pub classifier_max_tokens: u32,
}

/// LLM provider selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Force a provider: anthropic, openai, openai-compatible, local.
    /// When unset, the first provider with credentials in the environment wins.
    pub provider: Option<String>,
    /// Model override. Each provider has its own default.
    pub model: Option<String>,
    /// Base URL for local / OpenAI-compatible servers.
    pub local_url: String,
    /// Model name used with `local_url`.
    pub local_model: String,
    /// HTTP timeout for a single generation call.
    pub timeout_secs: u64,
}

/// Embedding provider selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `auto` (model if available, else hashed), `model`, or `hashed`.
    pub provider: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            synthesis_threshold: 0.85,
            max_tokens_per_phase: 10_000,
            max_iterations: 1,
            classifier_max_tokens: 256,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: None,
            model: None,
            local_url: "http://localhost:11434".to_string(),
            local_model: "qwen2.5:7b".to_string(),
            timeout_secs: 300,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "auto".to_string(),
        }
    }
}

/// Parse an env var into a config field. A set-but-malformed value is an error.
fn env_override<T>(var: &str, target: &mut T) -> Result<()>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    if let Ok(v) = std::env::var(var) {
        *target = v
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("invalid value for {}: {:?}", var, v))?;
    }
    Ok(())
}

fn env_override_string(var: &str, target: &mut Option<String>) {
    if let Ok(v) = std::env::var(var)
        && !v.trim().is_empty()
    {
        *target = Some(v.trim().to_string());
    }
}

impl DialecticConfig {
    /// Load config from `.dialectic/config.toml` under `project_root`, with env var overrides.
    /// Falls back to defaults if no config file exists.
    pub fn load(project_root: &Path) -> Result<Self> {
        let config_path = project_root.join(".dialectic").join("config.toml");

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("failed to read {}", config_path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("failed to parse {}", config_path.display()))?
        } else {
            Self::default()
        };

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `DIALECTIC_*` environment overrides on top of the current values.
    pub fn apply_env(&mut self) -> Result<()> {
        env_override(
            "DIALECTIC_SYNTHESIS_THRESHOLD",
            &mut self.engine.synthesis_threshold,
        )?;
        env_override("DIALECTIC_MAX_TOKENS", &mut self.engine.max_tokens_per_phase)?;
        env_override("DIALECTIC_MAX_ITERATIONS", &mut self.engine.max_iterations)?;
        env_override("DIALECTIC_LOCAL_URL", &mut self.llm.local_url)?;
        env_override("DIALECTIC_EMBEDDING_PROVIDER", &mut self.embeddings.provider)?;
        env_override_string("DIALECTIC_PROVIDER", &mut self.llm.provider);
        env_override_string("DIALECTIC_MODEL", &mut self.llm.model);
        Ok(())
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.engine.synthesis_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            anyhow::bail!(
                "synthesis_threshold ({}) must be within [0.0, 1.0]",
                threshold
            );
        }
        if self.engine.max_tokens_per_phase == 0 {
            anyhow::bail!("max_tokens_per_phase must be greater than 0");
        }
        if self.engine.classifier_max_tokens == 0 {
            anyhow::bail!("classifier_max_tokens must be greater than 0");
        }
        match self.embeddings.provider.as_str() {
            "auto" | "model" | "hashed" => Ok(()),
            other => anyhow::bail!(
                "unknown embedding provider '{}'. Valid: auto, model, hashed",
                other
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const CONFIG_VARS: [&str; 7] = [
        "DIALECTIC_SYNTHESIS_THRESHOLD",
        "DIALECTIC_MAX_TOKENS",
        "DIALECTIC_MAX_ITERATIONS",
        "DIALECTIC_PROVIDER",
        "DIALECTIC_MODEL",
        "DIALECTIC_LOCAL_URL",
        "DIALECTIC_EMBEDDING_PROVIDER",
    ];

    /// Run `f` with exactly `vars` set among the config variables, then restore them.
    fn with_config_env<T>(vars: &[(&str, &str)], f: impl FnOnce() -> T) -> T {
        let saved: Vec<_> = CONFIG_VARS
            .iter()
            .map(|var| (*var, std::env::var(var).ok()))
            .collect();
        // SAFETY: every test that reads or writes these variables is #[serial].
        unsafe {
            for var in CONFIG_VARS {
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

    fn write_project_config(body: &str) -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join(".dialectic");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.toml"), body).unwrap();
        tmp
    }

    #[test]
    fn test_default_config() {
        let config = DialecticConfig::default();
        assert_eq!(config.engine.synthesis_threshold, 0.85);
        assert_eq!(config.engine.max_tokens_per_phase, 10_000);
        assert_eq!(config.engine.max_iterations, 1);
        assert_eq!(config.engine.classifier_max_tokens, 256);
        assert_eq!(config.llm.provider, None);
        assert_eq!(config.llm.local_url, "http://localhost:11434");
        assert_eq!(config.embeddings.provider, "auto");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
[engine]
synthesis_threshold = 0.6
max_tokens_per_phase = 2048

[llm]
provider = "anthropic"
model = "claude-haiku-4-5-20251001"

[embeddings]
provider = "hashed"
"#;
        let config: DialecticConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.engine.synthesis_threshold, 0.6);
        assert_eq!(config.engine.max_tokens_per_phase, 2048);
        assert_eq!(config.llm.provider.as_deref(), Some("anthropic"));
        assert_eq!(config.embeddings.provider, "hashed");
        // Defaults for unspecified fields
        assert_eq!(config.engine.max_iterations, 1);
        assert_eq!(config.llm.timeout_secs, 300);
    }

    #[test]
    #[serial]
    fn test_config_load_nonexistent() {
        let config =
            with_config_env(&[], || DialecticConfig::load(Path::new("/nonexistent/path"))).unwrap();
        assert_eq!(config.engine.max_iterations, 1);
    }

    #[test]
    #[serial]
    fn test_load_reads_project_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join(".dialectic");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("config.toml"),
            r#"
[engine]
classifier_max_tokens = 128
"#,
        )
        .unwrap();

        let config = DialecticConfig::load(tmp.path()).unwrap();
        assert_eq!(config.engine.classifier_max_tokens, 128);
    }

    #[test]
    #[serial]
    fn test_load_rejects_malformed_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join(".dialectic");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.toml"), "[engine\nsynthesis_threshold = ").unwrap();

        assert!(DialecticConfig::load(tmp.path()).is_err());
    }

    #[test]
    fn test_validate_threshold_range() {
        let mut config = DialecticConfig::default();
        config.engine.synthesis_threshold = 1.5;
        assert!(config.validate().is_err());

        config.engine.synthesis_threshold = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_token_budget() {
        let mut config = DialecticConfig::default();
        config.engine.max_tokens_per_phase = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_unknown_embedding_provider() {
        let mut config = DialecticConfig::default();
        config.embeddings.provider = "word2vec".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("word2vec"));
    }

    #[test]
    #[serial]
    fn test_malformed_env_number_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let err = with_config_env(&[("DIALECTIC_MAX_TOKENS", "lots")], || {
            DialecticConfig::load(tmp.path())
        })
        .unwrap_err();
        let msg = format!("{:#}", err);
        assert!(msg.contains("DIALECTIC_MAX_TOKENS"), "{}", msg);
        assert!(msg.contains("lots"), "{}", msg);

        let err = with_config_env(&[("DIALECTIC_SYNTHESIS_THRESHOLD", "high")], || {
            DialecticConfig::load(tmp.path())
        })
        .unwrap_err();
        assert!(format!("{:#}", err).contains("DIALECTIC_SYNTHESIS_THRESHOLD"));
    }

    #[test]
    #[serial]
    fn test_out_of_range_env_threshold_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let err = with_config_env(&[("DIALECTIC_SYNTHESIS_THRESHOLD", "1.5")], || {
            DialecticConfig::load(tmp.path())
        })
        .unwrap_err();
        assert!(err.to_string().contains("synthesis_threshold (1.5)"));

        let mut config = DialecticConfig::default();
        with_config_env(&[("DIALECTIC_SYNTHESIS_THRESHOLD", "1.5")], || config.apply_env())
            .unwrap();
        assert_eq!(config.engine.synthesis_threshold, 1.5);
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_env_overrides_win_over_file() {
        let tmp = write_project_config(
            r#"
[engine]
max_tokens_per_phase = 2048
max_iterations = 1

[llm]
provider = "anthropic"
"#,
        );

        let config = with_config_env(
            &[
                ("DIALECTIC_MAX_TOKENS", " 4096 "),
                ("DIALECTIC_MAX_ITERATIONS", "0"),
                ("DIALECTIC_PROVIDER", "local"),
                ("DIALECTIC_MODEL", "llama3.1:8b"),
                ("DIALECTIC_LOCAL_URL", "http://gpu-box:8000"),
                ("DIALECTIC_EMBEDDING_PROVIDER", "hashed"),
            ],
            || DialecticConfig::load(tmp.path()),
        )
        .unwrap();

        assert_eq!(config.engine.max_tokens_per_phase, 4096);
        assert_eq!(config.engine.max_iterations, 0);
        assert_eq!(config.llm.provider.as_deref(), Some("local"));
        assert_eq!(config.llm.model.as_deref(), Some("llama3.1:8b"));
        assert_eq!(config.llm.local_url, "http://gpu-box:8000");
        assert_eq!(config.embeddings.provider, "hashed");
        // Untouched by env
        assert_eq!(config.engine.synthesis_threshold, 0.85);
    }

    #[test]
    #[serial]
    fn test_blank_env_provider_keeps_file_value() {
        let tmp = write_project_config("[llm]\nprovider = \"openai\"\n");
        let config = with_config_env(&[("DIALECTIC_PROVIDER", "  ")], || {
            DialecticConfig::load(tmp.path())
        })
        .unwrap();
        assert_eq!(config.llm.provider.as_deref(), Some("openai"));
    }
}
