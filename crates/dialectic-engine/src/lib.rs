//! Dialectical reasoning engine: thesis → antithesis → (conflict-gated) synthesis.
//!
//! The orchestrator runs the phases against a pluggable [`llm::Backend`], extracts
//! structured contradictions and research proposals from free-form output, and blends
//! semantic distance, a contradiction-count heuristic, and a model-judged estimate into
//! a conflict score that decides whether the synthesis phase is worth its cost.

pub mod conflict;
pub mod embeddings;
pub mod engine;
pub mod extraction;
pub mod llm;
pub mod perspectives;
pub mod prompts;

pub use conflict::{ConflictBreakdown, ConflictScorer, JudgedConflict};
pub use embeddings::Embedder;
pub use engine::{DialecticEngine, EngineError};
pub use llm::{Backend, BackendError, LlmClient, LlmProvider};
pub use perspectives::PerspectiveCritique;
