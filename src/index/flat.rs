//! # Flat Index Implementation
//!
//! Stores records in a [`RecordStore`] and answers queries by scanning all of
//! them. The metric and dimension are fixed when the index is built.
//!
//! ## Performance Characteristics
//!
//! - **Search Complexity**: O(n·dim) distance work, O(n log k) selection
//! - **Upsert Complexity**: O(dim) validation plus one hash insert
//! - **Accuracy**: 100% - exact search results
//!
//! # Examples
//!
//! ```rust
//! use std::collections::HashMap;
//! use vaf::{Filter, FlatIndex, Metric};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut index = FlatIndex::new(Metric::Cosine, 3)?;
//! index.upsert(1, vec![1.0, 2.0, 3.0], HashMap::new())?;
//!
//! let results = index.search(&[1.1, 2.1, 3.1], 5, &Filter::default())?;
//! assert_eq!(results.len(), 1);
//! # Ok(())
//! # }
//! ```

use crate::errors::{VafError, VafResult};
use crate::filter::Filter;
use crate::index::search;
use crate::metric::Metric;
use crate::store::{check_finite, RecordStore};
use crate::{Metadata, Record, SearchResult};

/// Exact-search index over a record store
#[derive(Debug, Clone)]
pub struct FlatIndex {
    metric: Metric,
    store: RecordStore,
}

impl FlatIndex {
    /// Creates an empty index bound to `(metric, dim)`. Fails for `dim == 0`.
    pub fn new(metric: Metric, dim: usize) -> VafResult<Self> {
        Ok(Self {
            metric,
            store: RecordStore::new(dim)?,
        })
    }

    /// Rebuilds an index from a full record set, validating every record.
    pub fn from_records(metric: Metric, dim: usize, records: Vec<Record>) -> VafResult<Self> {
        let mut index = Self::new(metric, dim)?;
        index.store.upsert_batch(records)?;
        Ok(index)
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn dimension(&self) -> usize {
        self.store.dimension()
    }

    pub fn upsert(&mut self, id: u64, vector: Vec<f32>, metadata: Metadata) -> VafResult<()> {
        self.store.upsert(id, vector, metadata)
    }

    pub fn upsert_batch(&mut self, records: Vec<Record>) -> VafResult<()> {
        self.store.upsert_batch(records)
    }

    pub fn get(&self, id: u64) -> Option<&Record> {
        self.store.get(id)
    }

    pub fn delete(&mut self, id: u64) -> bool {
        self.store.delete(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> + '_ {
        self.store.iter()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn max_id(&self) -> Option<u64> {
        self.store.max_id()
    }

    /// Returns up to `top_k` records matching `filter`, closest first.
    ///
    /// Equal distances are ordered by ascending id, so repeated queries over an
    /// unchanged index return identical output.
    pub fn search(&self, query: &[f32], top_k: usize, filter: &Filter) -> VafResult<Vec<SearchResult>> {
        if query.len() != self.dimension() {
            return Err(VafError::DimensionMismatch {
                expected: self.dimension(),
                actual: query.len(),
            });
        }
        check_finite(query)?;
        if top_k == 0 {
            return Err(VafError::InvalidArgument("top_k must be > 0".to_string()));
        }
        Ok(search::top_k(self.store.iter(), self.metric, query, top_k, filter))
    }
}
