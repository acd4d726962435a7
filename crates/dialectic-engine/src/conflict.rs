//! Conflict scoring: how strongly an antithesis opposes its thesis.
//!
//! Three independent signals are blended, and the blend is a floor rather than a
//! ceiling, so one confident signal is never diluted by two weak ones:
//!
//! 1. semantic distance between thesis and antithesis embeddings,
//! 2. a capped step function of the contradiction count,
//! 3. a model-judged "normative conflict" rating of the two conclusions.
//!
//! Every signal fails toward 0.0, which fails toward skipping synthesis.

use crate::embeddings::{Embedder, cosine_similarity};
use crate::llm::{Backend, strip_think_blocks};
use crate::prompts;
use std::sync::Arc;

/// Heuristic value per contradiction count; counts of 5 or more use the last entry.
pub const CONTRADICTION_STEPS: [f64; 6] = [0.0, 0.30, 0.50, 0.60, 0.72, 0.85];

pub const SEMANTIC_WEIGHT: f64 = 0.4;
pub const HEURISTIC_WEIGHT: f64 = 0.3;
pub const JUDGED_WEIGHT: f64 = 0.3;

/// Longest conclusion excerpt (in characters) sent to the classifier.
pub const MAX_EXCERPT_CHARS: usize = 1500;

/// Default token budget for the classifier sub-call.
pub const DEFAULT_CLASSIFIER_MAX_TOKENS: u32 = 256;

/// Outcome of the model-judged conflict sub-call.
#[derive(Debug, Clone, PartialEq)]
pub enum JudgedConflict {
    /// The classifier answered with a usable rating (clamped to [0, 1]).
    Scored(f64),
    /// The call or the parse failed; the signal counts as 0.0.
    Degraded { reason: String },
}

impl JudgedConflict {
    pub fn value(&self) -> f64 {
        match self {
            JudgedConflict::Scored(v) => *v,
            JudgedConflict::Degraded { .. } => 0.0,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, JudgedConflict::Degraded { .. })
    }

    fn degraded(reason: impl Into<String>) -> Self {
        JudgedConflict::Degraded {
            reason: reason.into(),
        }
    }
}

/// The individual signals and the final score, for logging and diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictBreakdown {
    pub semantic_distance: f64,
    pub contradiction_heuristic: f64,
    pub judged: JudgedConflict,
    pub score: f64,
}

/// Map a contradiction count onto the capped step function.
pub fn contradiction_heuristic(count: usize) -> f64 {
    CONTRADICTION_STEPS[count.min(CONTRADICTION_STEPS.len() - 1)]
}

/// `1 - cosine`, bounded to [0, 1].
pub fn semantic_distance(a: &[f32], b: &[f32]) -> f64 {
    (1.0 - cosine_similarity(a, b)).clamp(0.0, 1.0)
}

/// Weighted blend, raised to the strongest of the heuristic and judged signals.
pub fn blend(semantic_distance: f64, contradiction_heuristic: f64, judged: f64) -> f64 {
    let d = semantic_distance.clamp(0.0, 1.0);
    let h = contradiction_heuristic.clamp(0.0, 1.0);
    let j = judged.clamp(0.0, 1.0);
    let weighted = SEMANTIC_WEIGHT * d + HEURISTIC_WEIGHT * h + JUDGED_WEIGHT * j;
    weighted.max(h).max(j).min(1.0)
}

/// The last one or two paragraphs of `text`, keeping at most the trailing
/// [`MAX_EXCERPT_CHARS`] characters.
pub fn conclusion_excerpt(text: &str) -> String {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line.trim_end());
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n"));
    }

    let tail_start = paragraphs.len().saturating_sub(2);
    let excerpt = paragraphs[tail_start..].join("\n\n");

    let char_count = excerpt.chars().count();
    if char_count > MAX_EXCERPT_CHARS {
        excerpt.chars().skip(char_count - MAX_EXCERPT_CHARS).collect()
    } else {
        excerpt
    }
}

/// Parse a classifier response of the form `{"conflict": <float>}`.
///
/// Tries the whole response as JSON first, then the first `{...}` span.
/// Anything unusable degrades to 0.0.
pub fn parse_conflict_response(response: &str) -> JudgedConflict {
    let cleaned = strip_think_blocks(response);
    let text = cleaned.trim();

    let parsed = match serde_json::from_str::<serde_json::Value>(text) {
        Ok(v) if v.is_object() => Some(v),
        _ => first_brace_span(text).and_then(|span| serde_json::from_str(span).ok()),
    };

    let Some(value) = parsed else {
        return JudgedConflict::degraded("classifier response contained no JSON object");
    };

    match value.get("conflict") {
        Some(field) => match field.as_f64() {
            Some(v) if v.is_finite() => JudgedConflict::Scored(v.clamp(0.0, 1.0)),
            _ => JudgedConflict::degraded(format!("non-numeric conflict value: {}", field)),
        },
        None => JudgedConflict::degraded("classifier JSON has no \"conflict\" field"),
    }
}

/// The first `{` through the next `}`.
fn first_brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text[start..].find('}')?;
    Some(&text[start..=start + end])
}

/// Computes the blended conflict score for a thesis/antithesis pair.
pub struct ConflictScorer {
    backend: Arc<dyn Backend>,
    embedder: Arc<Embedder>,
    classifier_max_tokens: u32,
}

impl ConflictScorer {
    pub fn new(backend: Arc<dyn Backend>, embedder: Arc<Embedder>) -> Self {
        Self {
            backend,
            embedder,
            classifier_max_tokens: DEFAULT_CLASSIFIER_MAX_TOKENS,
        }
    }

    pub fn with_classifier_max_tokens(mut self, max_tokens: u32) -> Self {
        self.classifier_max_tokens = max_tokens;
        self
    }

    /// Score how strongly `antithesis` opposes `thesis`. Never fails.
    pub async fn score(
        &self,
        thesis: &str,
        antithesis: &str,
        contradictions: &[String],
    ) -> ConflictBreakdown {
        let semantic_distance = self.semantic_signal(thesis, antithesis);
        let contradiction_heuristic = contradiction_heuristic(contradictions.len());
        let judged = self.judge(thesis, antithesis).await;

        let score = blend(semantic_distance, contradiction_heuristic, judged.value());

        tracing::debug!(
            semantic_distance,
            contradiction_heuristic,
            judged = judged.value(),
            judged_degraded = judged.is_degraded(),
            score,
            "conflict scored"
        );

        ConflictBreakdown {
            semantic_distance,
            contradiction_heuristic,
            judged,
            score,
        }
    }

    fn semantic_signal(&self, thesis: &str, antithesis: &str) -> f64 {
        let vectors = self
            .embedder
            .encode(thesis)
            .and_then(|a| self.embedder.encode(antithesis).map(|b| (a, b)));
        match vectors {
            Ok((a, b)) => semantic_distance(&a, &b),
            Err(e) => {
                tracing::warn!("semantic distance unavailable, counting as 0.0: {}", e);
                0.0
            }
        }
    }

    /// Ask the backend to rate the opposition between the two conclusions.
    pub async fn judge(&self, thesis: &str, antithesis: &str) -> JudgedConflict {
        let prompt = prompts::conflict_prompt(
            &conclusion_excerpt(thesis),
            &conclusion_excerpt(antithesis),
        );

        let judged = match self
            .backend
            .generate(&prompt, self.classifier_max_tokens, prompts::CONFLICT_SYSTEM)
            .await
        {
            Ok(response) => parse_conflict_response(&response),
            Err(e) => JudgedConflict::degraded(format!("classifier call failed: {}", e)),
        };

        if let JudgedConflict::Degraded { reason } = &judged {
            tracing::warn!("model-judged conflict degraded to 0.0: {}", reason);
        }
        judged
    }
}
