//! Embedding collaborator.
//!
//! The index only needs `text -> Vec<f32>` of the configured length. Two
//! implementations ship with the crate: [`HashingEmbedder`], always available
//! and deterministic, and `bert::EmbeddingGenerator` behind the
//! `embeddings-candle` feature.

use thiserror::Error;

#[cfg(feature = "embeddings-candle")]
pub mod bert;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Model loading failed: {0}")]
    ModelLoading(String),
    #[error("Tokenization failed: {0}")]
    Tokenization(String),
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Turns text into a vector of length [`EmbeddingFunction::dimension`].
pub trait EmbeddingFunction: Send + Sync {
    fn generate_embedding(&self, text: &str) -> Result<Vec<f32>>;

    fn dimension(&self) -> usize;

    fn generate_embeddings_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.generate_embedding(text)).collect()
    }
}

/// Signed feature-hashing embedder.
///
/// Each lowercase alphanumeric token is hashed (FNV-1a) into one of `dim`
/// buckets with a sign taken from the hash's top bit; the sum is L2
/// normalized. Texts sharing words land close together, and the same text
/// always yields the same vector. Text without tokens maps to the zero vector.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(EmbeddingError::ModelLoading(
                "hashing embedder needs a dimension > 0".to_string(),
            ));
        }
        Ok(Self { dimension })
    }
}

impl EmbeddingFunction for HashingEmbedder {
    fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let mut embedding = vec![0.0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let h = fnv1a(&token.to_lowercase());
            let bucket = (h % self.dimension as u64) as usize;
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            embedding[bucket] += sign;
        }

        let norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            embedding.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn fnv1a(token: &str) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for b in token.bytes() {
        h ^= b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}
