//! CLI binary for the dialectic engine: run a query through thesis, antithesis and
//! (when warranted) synthesis, and print the result as JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialectic_core::config::DialecticConfig;
use dialectic_engine::{Backend, DialecticEngine, Embedder, LlmClient};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "dialectic",
    about = "Thesis, antithesis and synthesis reasoning over an LLM"
)]
struct Cli {
    /// Directory holding `.dialectic/config.toml` (defaults to current directory)
    #[arg(short, long, global = true)]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one dialectical cycle for a query
    Query {
        /// The question or claim to reason about
        query: String,

        /// Cycle budget; 0 disables synthesis
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Conflict score at or above which synthesis runs
        #[arg(long)]
        threshold: Option<f64>,

        /// Token budget for each generation phase
        #[arg(long)]
        max_tokens: Option<u32>,

        /// Force a provider: anthropic, openai, openai-compatible, local
        #[arg(long)]
        provider: Option<String>,

        /// Pretty-print the JSON result
        #[arg(long)]
        pretty: bool,
    },

    /// Critique a thesis from several perspectives at once
    Critique {
        /// The question the thesis answers
        query: String,

        /// The thesis text to critique
        #[arg(long)]
        thesis: String,

        /// A perspective to critique from (repeatable)
        #[arg(long = "perspective", required = true)]
        perspectives: Vec<String>,

        /// Force a provider: anthropic, openai, openai-compatible, local
        #[arg(long)]
        provider: Option<String>,

        /// Pretty-print the JSON result
        #[arg(long)]
        pretty: bool,
    },

    /// Print the effective configuration as TOML
    Config,
}

/// Flag overrides applied on top of the loaded configuration.
#[derive(Default)]
struct Overrides {
    max_iterations: Option<u32>,
    threshold: Option<f64>,
    max_tokens: Option<u32>,
    provider: Option<String>,
}

fn get_project_root(cli: &Cli) -> Result<PathBuf> {
    match &cli.project {
        Some(p) => Ok(p.clone()),
        None => std::env::current_dir().context("failed to get current directory"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let project_root = get_project_root(&cli)?;
    let config = DialecticConfig::load(&project_root)?;

    match cli.command {
        Commands::Query {
            query,
            max_iterations,
            threshold,
            max_tokens,
            provider,
            pretty,
        } => {
            let overrides = Overrides {
                max_iterations,
                threshold,
                max_tokens,
                provider,
            };
            cmd_query(config, overrides, &query, pretty).await
        }
        Commands::Critique {
            query,
            thesis,
            perspectives,
            provider,
            pretty,
        } => {
            let overrides = Overrides {
                provider,
                ..Overrides::default()
            };
            cmd_critique(config, overrides, &query, &thesis, &perspectives, pretty).await
        }
        Commands::Config => cmd_config(&config),
    }
}

fn apply_overrides(mut config: DialecticConfig, overrides: Overrides) -> Result<DialecticConfig> {
    if let Some(n) = overrides.max_iterations {
        config.engine.max_iterations = n;
    }
    if let Some(t) = overrides.threshold {
        config.engine.synthesis_threshold = t;
    }
    if let Some(n) = overrides.max_tokens {
        config.engine.max_tokens_per_phase = n;
    }
    if overrides.provider.is_some() {
        config.llm.provider = overrides.provider;
    }
    config.validate().context("invalid command-line override")?;
    Ok(config)
}

fn build_engine(config: &DialecticConfig) -> Result<DialecticEngine> {
    let client = LlmClient::from_config(&config.llm).context("no usable LLM provider")?;
    eprintln!("Using {} ({})", client.provider_name(), client.model_name());
    let backend: Arc<dyn Backend> = Arc::new(client);
    let embedder = Arc::new(Embedder::from_config(&config.embeddings));
    tracing::debug!(embeddings = embedder.provider_name(), "embedder ready");

    Ok(DialecticEngine::from_config(backend, embedder, &config.engine))
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", json);
    Ok(())
}

async fn cmd_query(
    config: DialecticConfig,
    overrides: Overrides,
    query: &str,
    pretty: bool,
) -> Result<()> {
    let config = apply_overrides(config, overrides)?;
    let engine = build_engine(&config)?;

    let result = engine.process(query).await?;
    print_json(&result, pretty)
}

async fn cmd_critique(
    config: DialecticConfig,
    overrides: Overrides,
    query: &str,
    thesis: &str,
    perspectives: &[String],
    pretty: bool,
) -> Result<()> {
    let config = apply_overrides(config, overrides)?;
    let engine = build_engine(&config)?;

    let critiques = engine.critique_perspectives(query, thesis, perspectives).await;
    if critiques.iter().all(|c| c.failed) {
        anyhow::bail!("all {} perspective critiques failed", critiques.len());
    }
    print_json(&critiques, pretty)
}

fn cmd_config(config: &DialecticConfig) -> Result<()> {
    let rendered = toml::to_string_pretty(config).context("failed to render config")?;
    print!("{}", rendered);
    Ok(())
}
