//! Multi-perspective critique: fan out one antithesis-style call per perspective.
//!
//! Calls run concurrently. A failed call yields a `failed` record in its slot
//! instead of aborting the batch.

use crate::engine::{DialecticEngine, elapsed_ms};
use crate::extraction::extract_contradictions;
use crate::prompts;
use futures_util::future::join_all;
use serde::Serialize;
use std::time::Instant;

/// One perspective's critique of a thesis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerspectiveCritique {
    pub perspective: String,
    /// The critique text, or the error message when `failed`.
    pub text: String,
    pub contradictions: Vec<String>,
    pub latency_ms: u64,
    pub failed: bool,
}

impl DialecticEngine {
    /// Critique `thesis` from each of `perspectives` concurrently.
    ///
    /// Output order matches `perspectives`.
    pub async fn critique_perspectives<S: AsRef<str>>(
        &self,
        query: &str,
        thesis: &str,
        perspectives: &[S],
    ) -> Vec<PerspectiveCritique> {
        let critiques = perspectives
            .iter()
            .map(|p| self.critique_one(query, thesis, p.as_ref()));
        let results = join_all(critiques).await;

        let failed = results.iter().filter(|c| c.failed).count();
        if failed > 0 {
            tracing::warn!(
                "{}/{} perspective critiques failed",
                failed,
                results.len()
            );
        }
        results
    }

    async fn critique_one(&self, query: &str, thesis: &str, perspective: &str) -> PerspectiveCritique {
        let prompt = prompts::perspective_prompt(query, thesis, perspective);
        let started = Instant::now();
        let response = self
            .backend()
            .generate(&prompt, self.max_tokens_per_phase(), prompts::DIALECTIC_SYSTEM)
            .await;
        let latency_ms = elapsed_ms(started);

        match response {
            Ok(text) => {
                let text = text.trim().to_string();
                let contradictions = extract_contradictions(&text);
                PerspectiveCritique {
                    perspective: perspective.to_string(),
                    text,
                    contradictions,
                    latency_ms,
                    failed: false,
                }
            }
            Err(e) => {
                tracing::debug!(perspective, "perspective critique failed: {}", e);
                PerspectiveCritique {
                    perspective: perspective.to_string(),
                    text: format!("critique failed: {}", e),
                    contradictions: Vec::new(),
                    latency_ms,
                    failed: true,
                }
            }
        }
    }
}
