//! Index configuration and crate-wide defaults.
//!
//! Runtime options for the command-line host come from flags and environment
//! variables in `main.rs`; they are funnelled into an [`IndexConfig`].

use serde::{Deserialize, Serialize};

use crate::errors::{VafError, VafResult};
use crate::metric::Metric;

/// Dimension used when the caller does not pick one.
pub const DEFAULT_VECTOR_DIMENSION: usize = 300;

/// Number of results returned by a query when the caller does not pick one.
pub const DEFAULT_TOP_K: usize = 3;

/// Snapshot format version written by this crate.
pub const SNAPSHOT_VERSION: &str = "1.0.0";

/// Snapshot format tag written by this crate.
pub const SNAPSHOT_FORMAT: &str = "vaf-index";

/// What `restore` does when the storage has nothing to load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingSnapshot {
    /// Surface the storage error.
    #[default]
    Fail,
    /// Keep the current (empty) index. Corrupt snapshots still fail.
    CreateEmpty,
}

/// Shape of an index: its metric, its dimension, and its restore policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub metric: Metric,
    pub dim: usize,
    #[serde(default)]
    pub missing_snapshot: MissingSnapshot,
}

impl IndexConfig {
    pub fn new(metric: Metric, dim: usize) -> VafResult<Self> {
        let config = Self {
            metric,
            dim,
            missing_snapshot: MissingSnapshot::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_missing_snapshot(mut self, policy: MissingSnapshot) -> Self {
        self.missing_snapshot = policy;
        self
    }

    pub fn validate(&self) -> VafResult<()> {
        if self.dim == 0 {
            return Err(VafError::InvalidArgument("dim must be > 0".to_string()));
        }
        Ok(())
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            metric: Metric::Cosine,
            dim: DEFAULT_VECTOR_DIMENSION,
            missing_snapshot: MissingSnapshot::default(),
        }
    }
}
