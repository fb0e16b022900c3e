//! # Record Store
//!
//! Authoritative, mutable collection of records keyed by id. It knows nothing
//! about similarity: it enforces id uniqueness and the fixed vector dimension
//! and hands out snapshot traversals to the search engine.
//!
//! A record is replaced by a single `HashMap::insert`, so a reader holding
//! `&RecordStore` always sees either the old or the new (vector, metadata)
//! pair, never a mix.

use std::collections::HashMap;

use crate::errors::{VafError, VafResult};
use crate::{Metadata, Record};

#[derive(Debug, Clone)]
pub struct RecordStore {
    dim: usize,
    records: HashMap<u64, Record>,
}

impl RecordStore {
    /// Creates an empty store. `dim` must be positive.
    pub fn new(dim: usize) -> VafResult<Self> {
        if dim == 0 {
            return Err(VafError::InvalidArgument("dim must be > 0".to_string()));
        }
        Ok(Self {
            dim,
            records: HashMap::new(),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    /// Inserts the record, or replaces the existing record with the same id.
    pub fn upsert(&mut self, id: u64, vector: Vec<f32>, metadata: Metadata) -> VafResult<()> {
        self.check_dimension(&vector)?;
        self.records.insert(id, Record { id, vector, metadata });
        Ok(())
    }

    /// Upserts every record or none of them.
    ///
    /// All dimensions are checked before the first insert. When the batch
    /// repeats an id, the later entry wins.
    pub fn upsert_batch(&mut self, records: Vec<Record>) -> VafResult<()> {
        for record in &records {
            self.check_dimension(&record.vector)?;
        }
        self.records.reserve(records.len());
        for record in records {
            self.records.insert(record.id, record);
        }
        Ok(())
    }

    pub fn get(&self, id: u64) -> Option<&Record> {
        self.records.get(&id)
    }

    /// Returns whether a record existed and was removed.
    pub fn delete(&mut self, id: u64) -> bool {
        self.records.remove(&id).is_some()
    }

    /// Fresh traversal over the records present at call time, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Record> + '_ {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.records.contains_key(&id)
    }

    pub fn max_id(&self) -> Option<u64> {
        self.records.keys().copied().max()
    }

    fn check_dimension(&self, vector: &[f32]) -> VafResult<()> {
        if vector.len() != self.dim {
            return Err(VafError::DimensionMismatch {
                expected: self.dim,
                actual: vector.len(),
            });
        }
        check_finite(vector)
    }
}

/// NaN and infinities have no JSON representation and poison every distance.
pub(crate) fn check_finite(vector: &[f32]) -> VafResult<()> {
    match vector.iter().position(|x| !x.is_finite()) {
        Some(pos) => Err(VafError::InvalidArgument(format!(
            "vector component {} is not finite ({})",
            pos, vector[pos]
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(pairs: &[(&str, &str)]) -> Metadata {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_zero_dim_rejected() {
        assert!(matches!(RecordStore::new(0), Err(VafError::InvalidArgument(_))));
    }

    #[test]
    fn test_upsert_then_get() {
        let mut store = RecordStore::new(3).unwrap();
        store.upsert(7, vec![1.0, 2.0, 3.0], meta(&[("category", "fashion")])).unwrap();

        let record = store.get(7).unwrap();
        assert_eq!(record, &Record::new(7, vec![1.0, 2.0, 3.0], meta(&[("category", "fashion")])));
        assert_eq!(store.len(), 1);
        assert!(store.get(8).is_none());
    }

    #[test]
    fn test_upsert_replaces_existing() {
        let mut store = RecordStore::new(2).unwrap();
        store.upsert(1, vec![1.0, 1.0], meta(&[("category", "fashion"), ("color", "blue")])).unwrap();
        store.upsert(1, vec![2.0, 2.0], meta(&[("category", "architecture")])).unwrap();

        assert_eq!(store.len(), 1);
        let record = store.get(1).unwrap();
        assert_eq!(record.vector, vec![2.0, 2.0]);
        assert_eq!(record.metadata, meta(&[("category", "architecture")]));
    }

    #[test]
    fn test_dimension_mismatch_leaves_store_unchanged() {
        let mut store = RecordStore::new(2).unwrap();
        store.upsert(1, vec![1.0, 1.0], Metadata::new()).unwrap();

        let err = store.upsert(1, vec![5.0, 5.0, 5.0], Metadata::new()).unwrap_err();
        assert!(matches!(err, VafError::DimensionMismatch { expected: 2, actual: 3 }));
        let err = store.upsert(2, vec![], Metadata::new()).unwrap_err();
        assert!(matches!(err, VafError::DimensionMismatch { expected: 2, actual: 0 }));

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(1).unwrap().vector, vec![1.0, 1.0]);
    }

    #[test]
    fn test_batch_is_all_or_nothing() {
        let mut store = RecordStore::new(2).unwrap();
        store.upsert(1, vec![0.0, 0.0], Metadata::new()).unwrap();

        let batch = vec![
            Record::new(1, vec![9.0, 9.0], Metadata::new()),
            Record::new(2, vec![1.0, 0.0], Metadata::new()),
            Record::new(3, vec![1.0], Metadata::new()),
        ];
        assert!(store.upsert_batch(batch).is_err());
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(1).unwrap().vector, vec![0.0, 0.0]);

        let batch = vec![
            Record::new(2, vec![1.0, 0.0], Metadata::new()),
            Record::new(3, vec![0.0, 1.0], Metadata::new()),
            Record::new(2, vec![2.0, 0.0], Metadata::new()),
        ];
        store.upsert_batch(batch).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.get(2).unwrap().vector, vec![2.0, 0.0]);
    }

    #[test]
    fn test_non_finite_values_rejected() {
        let mut store = RecordStore::new(2).unwrap();
        store.upsert(1, vec![1.0, 1.0], Metadata::new()).unwrap();

        for bad in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            let err = store.upsert(2, vec![0.0, bad], Metadata::new()).unwrap_err();
            assert!(matches!(err, VafError::InvalidArgument(_)));
            let err = store.upsert(1, vec![bad, 0.0], Metadata::new()).unwrap_err();
            assert!(matches!(err, VafError::InvalidArgument(_)));
        }

        let batch = vec![
            Record::new(3, vec![1.0, 0.0], Metadata::new()),
            Record::new(4, vec![f32::NAN, 0.0], Metadata::new()),
        ];
        assert!(matches!(store.upsert_batch(batch), Err(VafError::InvalidArgument(_))));

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(1).unwrap().vector, vec![1.0, 1.0]);
    }

    #[test]
    fn test_delete() {
        let mut store = RecordStore::new(1).unwrap();
        store.upsert(1, vec![1.0], Metadata::new()).unwrap();

        assert!(store.delete(1));
        assert!(!store.delete(1));
        assert!(store.is_empty());
    }

    #[test]
    fn test_iter_is_restartable() {
        let mut store = RecordStore::new(1).unwrap();
        for id in 0..5 {
            store.upsert(id, vec![id as f32], Metadata::new()).unwrap();
        }

        let mut first: Vec<u64> = store.iter().map(|r| r.id).collect();
        let mut second: Vec<u64> = store.iter().map(|r| r.id).collect();
        first.sort();
        second.sort();
        assert_eq!(first, vec![0, 1, 2, 3, 4]);
        assert_eq!(first, second);

        store.delete(2);
        assert_eq!(store.iter().count(), 4);
        assert_eq!(store.max_id(), Some(4));
    }
}
