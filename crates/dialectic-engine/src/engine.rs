//! Phase orchestrator: thesis → antithesis → conflict score → (synthesis | skip).
//!
//! One pass per query, phases strictly sequential. Generation failures in any phase
//! abort the query with an [`EngineError`] naming the phase; the conflict classifier
//! degrades instead of failing (see [`crate::conflict`]).

use crate::conflict::ConflictScorer;
use crate::embeddings::Embedder;
use crate::extraction::{extract_contradictions, extract_research_proposals};
use crate::llm::{Backend, BackendError};
use crate::prompts;
use dialectic_core::config::EngineConfig;
use dialectic_core::result::{
    AntithesisPhase, DialecticResult, Phase, PhaseResult, SynthesisPhase, ThesisPhase,
};
use std::sync::Arc;
use std::time::Instant;

/// A query failed because one of its generation phases failed.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{phase} generation failed: {source}")]
    Phase {
        phase: Phase,
        #[source]
        source: BackendError,
    },
}

impl EngineError {
    pub fn phase(&self) -> Phase {
        match self {
            EngineError::Phase { phase, .. } => *phase,
        }
    }
}

/// Runs dialectical cycles against a backend.
///
/// Holds no per-query state, so one engine can serve concurrent queries.
pub struct DialecticEngine {
    backend: Arc<dyn Backend>,
    scorer: ConflictScorer,
    synthesis_threshold: f64,
    max_tokens_per_phase: u32,
    max_iterations: u32,
}

pub(crate) fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

impl DialecticEngine {
    /// Engine with default knobs (threshold 0.85, 10 000 tokens per phase, one cycle).
    pub fn new(backend: Arc<dyn Backend>, embedder: Arc<Embedder>) -> Self {
        Self::from_config(backend, embedder, &EngineConfig::default())
    }

    pub fn from_config(
        backend: Arc<dyn Backend>,
        embedder: Arc<Embedder>,
        config: &EngineConfig,
    ) -> Self {
        let scorer = ConflictScorer::new(Arc::clone(&backend), embedder)
            .with_classifier_max_tokens(config.classifier_max_tokens);
        Self {
            backend,
            scorer,
            synthesis_threshold: config.synthesis_threshold,
            max_tokens_per_phase: config.max_tokens_per_phase,
            max_iterations: config.max_iterations,
        }
    }

    pub fn with_synthesis_threshold(mut self, threshold: f64) -> Self {
        self.synthesis_threshold = threshold;
        self
    }

    pub fn with_max_tokens_per_phase(mut self, max_tokens: u32) -> Self {
        self.max_tokens_per_phase = max_tokens;
        self
    }

    pub fn synthesis_threshold(&self) -> f64 {
        self.synthesis_threshold
    }

    pub fn max_tokens_per_phase(&self) -> u32 {
        self.max_tokens_per_phase
    }

    pub(crate) fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Process a query with the configured iteration budget.
    pub async fn process(&self, query: &str) -> Result<DialecticResult, EngineError> {
        self.process_query(query, self.max_iterations).await
    }

    /// Run one dialectical cycle for `query`.
    ///
    /// Synthesis runs only when the conflict score reaches the threshold and
    /// `max_iterations >= 1`. Budgets above 1 still run a single cycle.
    pub async fn process_query(
        &self,
        query: &str,
        max_iterations: u32,
    ) -> Result<DialecticResult, EngineError> {
        let started = Instant::now();
        if max_iterations > 1 {
            tracing::debug!(
                max_iterations,
                "multi-round refinement is not supported, running a single cycle"
            );
        }

        let thesis = self.run_thesis(query).await?;
        log_phase(|| thesis.clone().into());

        let antithesis = self.run_antithesis(query, &thesis.text).await?;
        log_phase(|| antithesis.clone().into());

        let conflict = self
            .scorer
            .score(&thesis.text, &antithesis.text, &antithesis.contradictions)
            .await;

        let synthesis = if self.should_synthesize(conflict.score, max_iterations) {
            let synthesis = self.run_synthesis(query, &thesis, &antithesis).await?;
            log_phase(|| synthesis.clone().into());
            synthesis
        } else {
            tracing::debug!(
                score = conflict.score,
                threshold = self.synthesis_threshold,
                max_iterations,
                "synthesis skipped"
            );
            SynthesisPhase::skipped()
        };

        let synthesis_ran = synthesis.ran();
        let result = DialecticResult::assemble(
            thesis,
            antithesis,
            synthesis,
            conflict.score,
            elapsed_ms(started),
        );

        tracing::info!(
            backend = self.backend.name(),
            mode = %result.mode,
            synthesis_ran,
            conflict_score = result.conflict_score,
            contradictions = result.trace.contradictions_found,
            total_time_ms = result.metadata.total_time_ms,
            "query processed"
        );

        Ok(result)
    }

    /// The synthesis gate.
    pub fn should_synthesize(&self, conflict_score: f64, max_iterations: u32) -> bool {
        max_iterations >= 1 && conflict_score >= self.synthesis_threshold
    }

    async fn generate(&self, phase: Phase, prompt: &str) -> Result<(String, u64), EngineError> {
        let started = Instant::now();
        let text = self
            .backend
            .generate(prompt, self.max_tokens_per_phase, prompts::DIALECTIC_SYSTEM)
            .await
            .map_err(|source| EngineError::Phase { phase, source })?;
        Ok((text, elapsed_ms(started)))
    }

    async fn run_thesis(&self, query: &str) -> Result<ThesisPhase, EngineError> {
        let prompt = prompts::thesis_prompt(query);
        let (text, latency_ms) = self.generate(Phase::Thesis, &prompt).await?;
        Ok(ThesisPhase {
            text: text.trim().to_string(),
            latency_ms,
        })
    }

    async fn run_antithesis(
        &self,
        query: &str,
        thesis: &str,
    ) -> Result<AntithesisPhase, EngineError> {
        let prompt = prompts::antithesis_prompt(query, thesis);
        let (text, latency_ms) = self.generate(Phase::Antithesis, &prompt).await?;
        let text = text.trim().to_string();
        let contradictions = extract_contradictions(&text);
        Ok(AntithesisPhase {
            text,
            latency_ms,
            contradictions,
        })
    }

    async fn run_synthesis(
        &self,
        query: &str,
        thesis: &ThesisPhase,
        antithesis: &AntithesisPhase,
    ) -> Result<SynthesisPhase, EngineError> {
        let prompt = prompts::synthesis_prompt(
            query,
            &thesis.text,
            &antithesis.text,
            &antithesis.contradictions,
        );
        let (text, latency_ms) = self.generate(Phase::Synthesis, &prompt).await?;
        let research = extract_research_proposals(&text);
        Ok(SynthesisPhase::completed(&text, latency_ms, research))
    }
}

/// Log a finished phase. The record is only built when debug logging is on.
fn log_phase(record: impl FnOnce() -> PhaseResult) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }
    let result = record();
    tracing::debug!(
        phase = %result.phase(),
        latency_ms = result.latency_ms().unwrap_or(0),
        chars = result.text().map_or(0, str::len),
        items = result.derived_items().len(),
        "phase complete"
    );
}
