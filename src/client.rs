//! # Client Module
//!
//! `VectorIndexClient` is the facade a host wires together: one index, one
//! embedding function and, optionally, one storage collaborator. There is no
//! process-wide default instance; callers construct a client and pass it
//! around by reference.
//!
//! # Examples
//!
//! ```rust
//! use vaf::{Filter, HashingEmbedder, IndexConfig, Metric, TextRecord, VectorIndexClient};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = IndexConfig::new(Metric::L2, 10)?;
//! let client = VectorIndexClient::new(config, Box::new(HashingEmbedder::new(10)?))?;
//!
//! client.upsert_records(
//!     vec![TextRecord::new(23, "The Great Pyramid of Giza").with_metadata("category", "architecture")],
//!     None,
//! )?;
//! let results = client.query("What is the Great Pyramid of Giza?", 10, &Filter::default())?;
//! assert_eq!(results[0].id, 23);
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{IndexConfig, MissingSnapshot};
use crate::embeddings::{EmbeddingError, EmbeddingFunction};
use crate::errors::{ToLockError, VafError, VafResult};
use crate::filter::Filter;
use crate::index::flat::FlatIndex;
use crate::metric::Metric;
use crate::persistence::{Snapshot, Storage};
use crate::{Metadata, Record, SearchResult};

/// A record whose vector is produced by the client's embedding function.
///
/// When deserialized from JSON, every field other than `id` and `text` is
/// collected into `metadata`, so `{"id": 1, "text": "...", "category": "fashion"}`
/// is filterable by `category`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRecord {
    pub id: u64,
    pub text: String,
    #[serde(flatten)]
    pub metadata: Metadata,
}

impl TextRecord {
    pub fn new(id: u64, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Information about an index
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexInfo {
    pub metric: Metric,
    pub dimension: usize,
    pub count: usize,
    pub is_empty: bool,
    pub max_id: Option<u64>,
}

/// Host-facing facade over one index.
///
/// The index sits behind `Arc<RwLock<_>>`: searches share the read lock, and
/// each upsert or delete holds the write lock for the whole replacement so no
/// reader sees a half-written record. Embeddings are computed before the lock
/// is taken.
pub struct VectorIndexClient {
    config: IndexConfig,
    index: Arc<RwLock<FlatIndex>>,
    embedding_function: Arc<dyn EmbeddingFunction>,
    storage: Option<Arc<dyn Storage>>,
}

impl fmt::Debug for VectorIndexClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorIndexClient")
            .field("config", &self.config)
            .field("has_storage", &self.storage.is_some())
            .finish()
    }
}

impl fmt::Display for VectorIndexClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VectorIndex(metric={}, dim={})", self.config.metric, self.config.dim)
    }
}

impl VectorIndexClient {
    /// Creates an empty index. The embedding function must produce vectors of
    /// the configured dimension.
    pub fn new(config: IndexConfig, embedding_function: Box<dyn EmbeddingFunction>) -> VafResult<Self> {
        config.validate()?;
        if embedding_function.dimension() != config.dim {
            return Err(VafError::DimensionMismatch {
                expected: config.dim,
                actual: embedding_function.dimension(),
            });
        }

        info!("Created index (metric={}, dim={})", config.metric, config.dim);
        Ok(Self {
            config,
            index: Arc::new(RwLock::new(FlatIndex::new(config.metric, config.dim)?)),
            embedding_function: Arc::from(embedding_function),
            storage: None,
        })
    }

    /// Attaches a storage collaborator used by `persist` and `restore`.
    pub fn with_storage(mut self, storage: Box<dyn Storage>) -> Self {
        self.storage = Some(Arc::from(storage));
        self
    }

    /// Creates a client bound to `storage` and restores its snapshot, honouring
    /// the configured [`MissingSnapshot`] policy.
    pub fn open(
        config: IndexConfig,
        embedding_function: Box<dyn EmbeddingFunction>,
        storage: Box<dyn Storage>,
    ) -> VafResult<Self> {
        let client = Self::new(config, embedding_function)?.with_storage(storage);
        client.restore()?;
        Ok(client)
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn metric(&self) -> Metric {
        self.config.metric
    }

    pub fn dimension(&self) -> usize {
        self.config.dim
    }

    /// Embeds and upserts every record as one batch.
    ///
    /// `shared_metadata` is merged into each record; keys set on the record
    /// itself win. Either every record is stored or, on any error, none is.
    pub fn upsert_records(&self, records: Vec<TextRecord>, shared_metadata: Option<&Metadata>) -> VafResult<usize> {
        let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();

        // Generate embeddings outside the lock
        let embeddings = self.embedding_function.generate_embeddings_batch(&texts)?;
        if embeddings.len() != records.len() {
            return Err(EmbeddingError::Inference(format!(
                "embedding function returned {} vectors for {} texts",
                embeddings.len(),
                records.len()
            ))
            .into());
        }

        let batch: Vec<Record> = records
            .into_iter()
            .zip(embeddings)
            .map(|(record, vector)| {
                let mut metadata = shared_metadata.cloned().unwrap_or_default();
                metadata.extend(record.metadata);
                Record::new(record.id, vector, metadata)
            })
            .collect();

        self.upsert_vectors(batch)
    }

    /// Upserts precomputed vectors as one batch.
    pub fn upsert_vectors(&self, records: Vec<Record>) -> VafResult<usize> {
        let count = records.len();
        let mut index = self.index.write().to_lock_error("upsert")?;
        index.upsert_batch(records)?;
        debug!("Upserted {} records ({} live)", count, index.len());
        Ok(count)
    }

    /// Embeds `query` and searches with it.
    pub fn query(&self, query: &str, top_k: usize, filter: &Filter) -> VafResult<Vec<SearchResult>> {
        if top_k == 0 {
            return Err(VafError::InvalidArgument("top_k must be > 0".to_string()));
        }
        let query_embedding = self.embedding_function.generate_embedding(query)?;
        self.search(&query_embedding, top_k, filter)
    }

    pub fn search(&self, query: &[f32], top_k: usize, filter: &Filter) -> VafResult<Vec<SearchResult>> {
        let index = self.index.read().to_lock_error("search")?;
        index.search(query, top_k, filter)
    }

    pub fn get(&self, id: u64) -> VafResult<Option<Record>> {
        let index = self.index.read().to_lock_error("get")?;
        Ok(index.get(id).cloned())
    }

    /// Removes a record; an unknown id is reported as `NotFound`.
    pub fn delete(&self, id: u64) -> VafResult<()> {
        let mut index = self.index.write().to_lock_error("delete")?;
        if index.delete(id) {
            Ok(())
        } else {
            Err(VafError::NotFound { id })
        }
    }

    pub fn count(&self) -> VafResult<usize> {
        let index = self.index.read().to_lock_error("count")?;
        Ok(index.len())
    }

    pub fn info(&self) -> VafResult<IndexInfo> {
        let index = self.index.read().to_lock_error("info")?;
        Ok(IndexInfo {
            metric: index.metric(),
            dimension: index.dimension(),
            count: index.len(),
            is_empty: index.is_empty(),
            max_id: index.max_id(),
        })
    }

    /// Serializes the whole index and hands the bytes to storage.
    pub fn persist(&self) -> VafResult<()> {
        let storage = self.require_storage()?;
        let snapshot = {
            let index = self.index.read().to_lock_error("persist")?;
            Snapshot::from_index(&index)
        };
        let bytes = snapshot.to_bytes()?;
        storage.save(&bytes)?;
        info!("Persisted {} records", snapshot.records.len());
        Ok(())
    }

    /// Replaces the in-memory index with the stored snapshot.
    ///
    /// Returns whether a snapshot was loaded. A missing snapshot is an error
    /// unless the policy is [`MissingSnapshot::CreateEmpty`]; unreadable or
    /// mismatched snapshots are always errors and leave the index untouched.
    pub fn restore(&self) -> VafResult<bool> {
        let storage = self.require_storage()?;
        let bytes = match storage.load() {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() && self.config.missing_snapshot == MissingSnapshot::CreateEmpty => {
                warn!("No snapshot found ({}), keeping current index", e);
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        let restored = Snapshot::from_bytes(&bytes)?.into_index()?;
        if restored.metric() != self.config.metric || restored.dimension() != self.config.dim {
            return Err(VafError::ConfigMismatch {
                metric: self.config.metric,
                dim: self.config.dim,
                found_metric: restored.metric(),
                found_dim: restored.dimension(),
            });
        }

        let count = restored.len();
        let mut index = self.index.write().to_lock_error("restore")?;
        *index = restored;
        info!("Restored {} records", count);
        Ok(true)
    }

    fn require_storage(&self) -> VafResult<&Arc<dyn Storage>> {
        self.storage
            .as_ref()
            .ok_or_else(|| VafError::InvalidArgument("no storage configured for this index".to_string()))
    }
}

/// Parses `key=value` pairs into a metadata map.
pub fn parse_metadata<'a>(pairs: impl IntoIterator<Item = &'a str>) -> VafResult<HashMap<String, String>> {
    pairs.into_iter().map(Filter::parse_condition).collect()
}
