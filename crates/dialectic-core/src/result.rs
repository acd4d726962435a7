//! Per-query data model: phase records, trace, timing metadata, and the final result.
//!
//! Everything here is built once per `process_query` call and never mutated after
//! it lands in a [`DialecticResult`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// The stages of a dialectical cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Thesis,
    Antithesis,
    Synthesis,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Thesis => write!(f, "thesis"),
            Phase::Antithesis => write!(f, "antithesis"),
            Phase::Synthesis => write!(f, "synthesis"),
        }
    }
}

/// Which answer the result carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Synthesis was skipped or came back empty; the thesis is the answer.
    ThesisOnly,
    /// Synthesis ran and produced text; it is the answer.
    Synthesis,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::ThesisOnly => "thesis_only",
            Mode::Synthesis => "synthesis",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the thesis phase.
#[derive(Debug, Clone, PartialEq)]
pub struct ThesisPhase {
    pub text: String,
    pub latency_ms: u64,
}

/// Output of the antithesis phase, with the contradictions parsed from its text.
#[derive(Debug, Clone, PartialEq)]
pub struct AntithesisPhase {
    pub text: String,
    pub latency_ms: u64,
    pub contradictions: Vec<String>,
}

/// Output of the synthesis phase. Text and timing are absent when the phase was skipped.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SynthesisPhase {
    pub text: Option<String>,
    pub latency_ms: Option<u64>,
    pub research_proposals: Vec<String>,
}

impl SynthesisPhase {
    /// The record for a cycle where the gate kept synthesis from running.
    pub fn skipped() -> Self {
        Self::default()
    }

    /// Build from raw model output. Whitespace-only text becomes `None`.
    pub fn completed(raw_text: &str, latency_ms: u64, research_proposals: Vec<String>) -> Self {
        let trimmed = raw_text.trim();
        Self {
            text: (!trimmed.is_empty()).then(|| trimmed.to_string()),
            latency_ms: Some(latency_ms),
            research_proposals,
        }
    }

    /// Whether the phase ran (regardless of whether it produced text).
    pub fn ran(&self) -> bool {
        self.latency_ms.is_some()
    }
}

/// A single phase's record, for code that handles phases uniformly (logging, reports).
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseResult {
    Thesis(ThesisPhase),
    Antithesis(AntithesisPhase),
    Synthesis(SynthesisPhase),
}

impl PhaseResult {
    pub fn phase(&self) -> Phase {
        match self {
            PhaseResult::Thesis(_) => Phase::Thesis,
            PhaseResult::Antithesis(_) => Phase::Antithesis,
            PhaseResult::Synthesis(_) => Phase::Synthesis,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            PhaseResult::Thesis(p) => Some(&p.text),
            PhaseResult::Antithesis(p) => Some(&p.text),
            PhaseResult::Synthesis(p) => p.text.as_deref(),
        }
    }

    pub fn latency_ms(&self) -> Option<u64> {
        match self {
            PhaseResult::Thesis(p) => Some(p.latency_ms),
            PhaseResult::Antithesis(p) => Some(p.latency_ms),
            PhaseResult::Synthesis(p) => p.latency_ms,
        }
    }

    /// Structured items derived from the phase text (contradictions or research proposals).
    pub fn derived_items(&self) -> &[String] {
        match self {
            PhaseResult::Thesis(_) => &[],
            PhaseResult::Antithesis(p) => &p.contradictions,
            PhaseResult::Synthesis(p) => &p.research_proposals,
        }
    }
}

impl From<ThesisPhase> for PhaseResult {
    fn from(p: ThesisPhase) -> Self {
        PhaseResult::Thesis(p)
    }
}

impl From<AntithesisPhase> for PhaseResult {
    fn from(p: AntithesisPhase) -> Self {
        PhaseResult::Antithesis(p)
    }
}

impl From<SynthesisPhase> for PhaseResult {
    fn from(p: SynthesisPhase) -> Self {
        PhaseResult::Synthesis(p)
    }
}

/// The texts produced by each phase plus the structured items extracted from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub thesis: String,
    pub antithesis: String,
    pub synthesis: Option<String>,
    pub contradictions_found: usize,
    pub research_proposals: Vec<String>,
}

/// Per-phase and total wall-clock latency, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub thesis_time_ms: u64,
    pub antithesis_time_ms: u64,
    pub synthesis_time_ms: Option<u64>,
    pub total_time_ms: u64,
}

/// The externally returned record for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialecticResult {
    /// The final answer: synthesis text in synthesis mode, thesis text otherwise.
    pub result: String,
    pub mode: Mode,
    /// Bounded to [0, 1].
    pub conflict_score: f64,
    pub trace: Trace,
    pub metadata: Metadata,
}

impl DialecticResult {
    /// Assemble the result from the phase records.
    ///
    /// Mode and answer text are derived here so the two can never disagree:
    /// synthesis mode only when the synthesis phase produced non-empty text.
    pub fn assemble(
        thesis: ThesisPhase,
        antithesis: AntithesisPhase,
        synthesis: SynthesisPhase,
        conflict_score: f64,
        total_time_ms: u64,
    ) -> Self {
        let synthesis_text = synthesis
            .text
            .filter(|t| !t.trim().is_empty());

        let (mode, result) = match &synthesis_text {
            Some(text) => (Mode::Synthesis, text.clone()),
            None => (Mode::ThesisOnly, thesis.text.clone()),
        };

        Self {
            result,
            mode,
            conflict_score: conflict_score.clamp(0.0, 1.0),
            trace: Trace {
                thesis: thesis.text,
                antithesis: antithesis.text,
                synthesis: synthesis_text,
                contradictions_found: antithesis.contradictions.len(),
                research_proposals: synthesis.research_proposals,
            },
            metadata: Metadata {
                thesis_time_ms: thesis.latency_ms,
                antithesis_time_ms: antithesis.latency_ms,
                synthesis_time_ms: synthesis.latency_ms,
                total_time_ms,
            },
        }
    }
}
