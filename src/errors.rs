//! # Error Types Module
//!
//! Structured error handling for index operations. Storage and embedding failures
//! are wrapped unchanged so hosts can inspect the collaborator's own error.

use thiserror::Error;

use crate::embeddings::EmbeddingError;
use crate::metric::Metric;
use crate::persistence::PersistenceError;

/// Main error type for vaf operations
#[derive(Error, Debug)]
pub enum VafError {
    /// Vector length differs from the index dimension
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Bad caller input: zero `top_k`, zero `dim`, unknown metric name
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Record id does not exist
    #[error("Record ID {id} does not exist")]
    NotFound { id: u64 },

    /// A restored snapshot disagrees with the configured index shape
    #[error("Snapshot holds a {found_metric} index of dimension {found_dim}, configured {metric} of dimension {dim}")]
    ConfigMismatch {
        metric: Metric,
        dim: usize,
        found_metric: Metric,
        found_dim: usize,
    },

    /// Embedding generation error
    #[error("Embedding generation failed: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Storage or snapshot format error
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Lock acquisition error
    #[error("Failed to acquire lock: {0}")]
    LockError(String),
}

impl VafError {
    /// Errors caused by the caller's input rather than by a collaborator
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            VafError::DimensionMismatch { .. }
                | VafError::InvalidArgument(_)
                | VafError::NotFound { .. }
                | VafError::ConfigMismatch { .. }
        )
    }

    /// `NotFound` is an ordinary outcome; everything else aborts the operation
    pub fn is_recoverable(&self) -> bool {
        matches!(self, VafError::NotFound { .. })
    }
}

/// Result type for vaf operations
pub type VafResult<T> = Result<T, VafError>;

/// Helper trait for converting lock poisoning into `VafError`
pub trait ToLockError<T> {
    fn to_lock_error(self, operation: &str) -> VafResult<T>;
}

impl<T, G> ToLockError<T> for Result<T, std::sync::PoisonError<G>> {
    fn to_lock_error(self, operation: &str) -> VafResult<T> {
        self.map_err(|_| VafError::LockError(format!("Failed to acquire lock for {}", operation)))
    }
}
