//! # vaf
//!
//! An embedding-backed vector index. Records pair a caller-chosen `u64` id with a
//! fixed-dimension `f32` vector and a string-to-string metadata map. Queries scan
//! every record, keep the ones matching an exact-match metadata filter and return
//! the `k` closest under the index metric (`l2` or `cosine`).
//!
//! # Examples
//!
//! ```rust
//! use std::collections::HashMap;
//! use vaf::{Filter, FlatIndex, Metric};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut index = FlatIndex::new(Metric::L2, 2)?;
//! index.upsert(1, vec![0.0, 0.0], HashMap::new())?;
//! index.upsert(2, vec![1.0, 0.0], HashMap::new())?;
//!
//! let results = index.search(&[0.0, 0.0], 1, &Filter::default())?;
//! assert_eq!(results[0].id, 1);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod embeddings;
pub mod errors;
pub mod filter;
pub mod index;
pub mod metric;
pub mod persistence;
pub mod store;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub use client::{IndexInfo, TextRecord, VectorIndexClient};
pub use config::{IndexConfig, MissingSnapshot, DEFAULT_TOP_K, DEFAULT_VECTOR_DIMENSION};
pub use embeddings::{EmbeddingError, EmbeddingFunction, HashingEmbedder};
#[cfg(feature = "embeddings-candle")]
pub use embeddings::bert::EmbeddingGenerator;
pub use errors::{VafError, VafResult};
pub use filter::Filter;
pub use index::flat::FlatIndex;
pub use metric::Metric;
pub use persistence::{FileStorage, MemoryStorage, PersistenceError, Snapshot, Storage};
pub use store::RecordStore;

/// String-to-string metadata attached to a record.
pub type Metadata = HashMap<String, String>;

/// One stored (id, vector, metadata) triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: u64,
    pub vector: Vec<f32>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Record {
    pub fn new(id: u64, vector: Vec<f32>, metadata: Metadata) -> Self {
        Self { id, vector, metadata }
    }
}

/// A single hit returned by a search, ordered by ascending `distance`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub id: u64,
    pub distance: f32,
    pub metadata: Metadata,
}
