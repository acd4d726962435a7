//! Text embeddings for semantic-distance scoring.
//!
//! Two strategies behind one `encode` method:
//! - **Model**: a pretrained sentence-embedding model via fastembed (requires the
//!   `local-embeddings` feature), loaded once at construction and reused.
//! - **Hashed**: a deterministic 768-dimension vector derived from SHA-256 of the text.
//!   Used when the model is unavailable so the pipeline never depends on the heavy
//!   dependency to start.

use dialectic_core::config::EmbeddingConfig;
use sha2::{Digest, Sha256};

/// Dimension of the hashed fallback embedding.
pub const HASHED_DIMENSION: usize = 768;

/// Errors from the model-backed embedder at encode time.
#[derive(Debug, thiserror::Error)]
#[error("embedding generation failed: {0}")]
pub struct EmbeddingError(pub String);

/// Embedding strategy selected at construction time.
pub enum Embedder {
    /// Pretrained sentence-embedding model (fastembed).
    #[cfg(feature = "local-embeddings")]
    Model(std::sync::Mutex<fastembed::TextEmbedding>),
    /// Deterministic SHA-256 based fallback.
    Hashed,
}

impl Embedder {
    /// Build the embedder named by `config.provider`.
    ///
    /// Never fails: if the model cannot be loaded, a warning is logged and the
    /// hashed fallback is used instead.
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        match config.provider.as_str() {
            "hashed" => Self::Hashed,
            "model" | "auto" => Self::load_model_or_fallback(),
            other => {
                tracing::warn!(
                    "unknown embedding provider '{}', using hashed fallback embeddings",
                    other
                );
                Self::Hashed
            }
        }
    }

    /// The deterministic fallback, for tests and offline use.
    pub fn hashed() -> Self {
        Self::Hashed
    }

    #[cfg(feature = "local-embeddings")]
    fn load_model_or_fallback() -> Self {
        use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

        match TextEmbedding::try_new(InitOptions::new(EmbeddingModel::AllMiniLML6V2)) {
            Ok(model) => {
                tracing::debug!("loaded sentence-embedding model AllMiniLML6V2");
                Self::Model(std::sync::Mutex::new(model))
            }
            Err(e) => {
                tracing::warn!(
                    "failed to load sentence-embedding model ({}), using hashed fallback embeddings",
                    e
                );
                Self::Hashed
            }
        }
    }

    #[cfg(not(feature = "local-embeddings"))]
    fn load_model_or_fallback() -> Self {
        tracing::warn!(
            "sentence-embedding model unavailable (built without the 'local-embeddings' feature), \
             using hashed fallback embeddings"
        );
        Self::Hashed
    }

    /// Encode text into a vector. Deterministic for a given text and embedder.
    pub fn encode(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        match self {
            #[cfg(feature = "local-embeddings")]
            Self::Model(model) => {
                let mut model = model
                    .lock()
                    .map_err(|_| EmbeddingError("embedding model lock poisoned".to_string()))?;
                let mut embeddings = model
                    .embed(vec![text], None)
                    .map_err(|e| EmbeddingError(e.to_string()))?;
                let mut embedding = embeddings
                    .pop()
                    .ok_or_else(|| EmbeddingError("empty embedding response".to_string()))?;
                normalize_l2(&mut embedding);
                Ok(embedding)
            }
            Self::Hashed => Ok(hashed_embedding(text)),
        }
    }

    /// Return a human-readable description of the active strategy.
    pub fn provider_name(&self) -> &str {
        match self {
            #[cfg(feature = "local-embeddings")]
            Self::Model(_) => "Model (fastembed)",
            Self::Hashed => "Hashed (SHA-256)",
        }
    }
}

/// Deterministic embedding: the SHA-256 digest repeated to fill the vector, bytes read
/// as unsigned magnitudes, then L2-normalized.
pub fn hashed_embedding(text: &str) -> Vec<f32> {
    let digest = Sha256::digest(text.as_bytes());
    let mut v: Vec<f32> = digest
        .iter()
        .cycle()
        .take(HASHED_DIMENSION)
        .map(|&b| f32::from(b))
        .collect();
    normalize_l2(&mut v);
    v
}

/// L2-normalize a vector in place. Zero vectors are left unchanged.
fn normalize_l2(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity in f64, clamped to [-1, 1].
///
/// Returns 0.0 for mismatched lengths or a zero-norm input.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    // sqrt of the product keeps identical inputs at exactly 1.0
    (dot / (norm_a * norm_b).sqrt()).clamp(-1.0, 1.0)
}
