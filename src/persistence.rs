//! # Persistence Module
//!
//! Snapshot format and the storage collaborator that carries it.
//!
//! ## File Format
//!
//! An index is saved as a JSON document:
//! ```json
//! {
//!   "header": {
//!     "version": "1.0.0",
//!     "format": "vaf-index",
//!     "created_at": "2025-01-21T10:00:00Z"
//!   },
//!   "dim": 10,
//!   "metric": "l2",
//!   "records": [
//!     { "id": 1, "vector": [0.1, 0.2], "metadata": { "category": "fashion" } }
//!   ]
//! }
//! ```
//!
//! Records are written in ascending id order so equal indexes serialize to
//! equal bodies.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{SNAPSHOT_FORMAT, SNAPSHOT_VERSION};
use crate::index::flat::FlatIndex;
use crate::metric::Metric;
use crate::Record;

/// Error types for persistence operations
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl PersistenceError {
    /// True when the storage holds nothing at all, as opposed to unreadable data
    pub fn is_not_found(&self) -> bool {
        matches!(self, PersistenceError::FileNotFound(_))
    }
}

/// File header containing version and format information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileHeader {
    pub version: String,
    pub format: String,
    pub created_at: DateTime<Utc>,
}

impl Default for FileHeader {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION.to_string(),
            format: SNAPSHOT_FORMAT.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Complete index state as written to storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub header: FileHeader,
    pub dim: usize,
    pub metric: Metric,
    pub records: Vec<Record>,
}

impl Snapshot {
    pub fn from_index(index: &FlatIndex) -> Self {
        let mut records: Vec<Record> = index.iter().cloned().collect();
        records.sort_by_key(|r| r.id);
        Self {
            header: FileHeader::default(),
            dim: index.dimension(),
            metric: index.metric(),
            records,
        }
    }

    /// Validates the snapshot and rebuilds the index it describes.
    pub fn into_index(self) -> Result<FlatIndex, PersistenceError> {
        if self.header.version != SNAPSHOT_VERSION {
            return Err(PersistenceError::VersionMismatch {
                expected: SNAPSHOT_VERSION.to_string(),
                actual: self.header.version,
            });
        }
        if self.header.format != SNAPSHOT_FORMAT {
            return Err(PersistenceError::InvalidFormat(format!(
                "Expected format '{}', got '{}'",
                SNAPSHOT_FORMAT, self.header.format
            )));
        }
        if self.dim == 0 {
            return Err(PersistenceError::InvalidFormat("dim must be > 0".to_string()));
        }

        let mut seen = HashSet::with_capacity(self.records.len());
        for record in &self.records {
            if record.vector.len() != self.dim {
                return Err(PersistenceError::InvalidFormat(format!(
                    "record {} has {} values, index dimension is {}",
                    record.id,
                    record.vector.len(),
                    self.dim
                )));
            }
            if !seen.insert(record.id) {
                return Err(PersistenceError::InvalidFormat(format!(
                    "record {} appears more than once",
                    record.id
                )));
            }
        }

        FlatIndex::from_records(self.metric, self.dim, self.records)
            .map_err(|e| PersistenceError::InvalidFormat(e.to_string()))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, PersistenceError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PersistenceError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Byte-level storage collaborator.
///
/// Implementations report an absent snapshot as
/// [`PersistenceError::FileNotFound`] and never substitute empty data.
pub trait Storage: Send + Sync {
    fn save(&self, bytes: &[u8]) -> Result<(), PersistenceError>;
    fn load(&self) -> Result<Vec<u8>, PersistenceError>;
}

/// Storage backed by a single file, replaced atomically on save
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling of the target with `.tmp` appended to the full file name.
    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl Storage for FileStorage {
    fn save(&self, bytes: &[u8]) -> Result<(), PersistenceError> {
        // Create parent directories if they don't exist
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // Write to a temporary file first, then rename for atomicity
        let temp_path = self.temp_path();
        fs::write(&temp_path, bytes)?;
        fs::rename(&temp_path, &self.path)?;

        info!("Saved snapshot to {} ({} bytes)", self.path.display(), bytes.len());
        Ok(())
    }

    fn load(&self) -> Result<Vec<u8>, PersistenceError> {
        match fs::read(&self.path) {
            Ok(bytes) => {
                debug!("Read snapshot {} ({} bytes)", self.path.display(), bytes.len());
                Ok(bytes)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(PersistenceError::FileNotFound(self.path.display().to_string()))
            }
            Err(e) => Err(PersistenceError::Io(e)),
        }
    }
}

/// In-process storage, useful for hosts that ship bytes elsewhere themselves
#[derive(Debug, Default)]
pub struct MemoryStorage {
    bytes: Mutex<Option<Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Mutex::new(Some(bytes)),
        }
    }
}

impl Storage for MemoryStorage {
    fn save(&self, bytes: &[u8]) -> Result<(), PersistenceError> {
        let mut slot = self
            .bytes
            .lock()
            .map_err(|_| PersistenceError::Io(io::Error::other("memory storage lock poisoned")))?;
        *slot = Some(bytes.to_vec());
        Ok(())
    }

    fn load(&self) -> Result<Vec<u8>, PersistenceError> {
        let slot = self
            .bytes
            .lock()
            .map_err(|_| PersistenceError::Io(io::Error::other("memory storage lock poisoned")))?;
        slot.clone()
            .ok_or_else(|| PersistenceError::FileNotFound("<memory>".to_string()))
    }
}

/// Save an index to a file
pub fn save_index_to_file(index: &FlatIndex, path: &Path) -> Result<(), PersistenceError> {
    let bytes = Snapshot::from_index(index).to_bytes()?;
    FileStorage::new(path).save(&bytes)
}

/// Load an index from a file
pub fn load_index_from_file(path: &Path) -> Result<FlatIndex, PersistenceError> {
    let bytes = FileStorage::new(path).load()?;
    Snapshot::from_bytes(&bytes)?.into_index()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use crate::Metadata;
    use tempfile::TempDir;

    fn create_test_index() -> FlatIndex {
        let mut index = FlatIndex::new(Metric::L2, 3).unwrap();
        let mut meta = Metadata::new();
        meta.insert("category".to_string(), "fashion".to_string());
        index.upsert(2, vec![4.0, 5.0, 6.0], Metadata::new()).unwrap();
        index.upsert(1, vec![1.0, 2.0, 3.0], meta).unwrap();
        index
    }

    #[test]
    fn test_snapshot_creation() {
        let snapshot = Snapshot::from_index(&create_test_index());

        assert_eq!(snapshot.header.version, SNAPSHOT_VERSION);
        assert_eq!(snapshot.header.format, SNAPSHOT_FORMAT);
        assert_eq!(snapshot.dim, 3);
        assert_eq!(snapshot.metric, Metric::L2);
        assert_eq!(snapshot.records.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_snapshot_conversion() {
        let source = create_test_index();
        let bytes = Snapshot::from_index(&source).to_bytes().unwrap();
        let restored = Snapshot::from_bytes(&bytes).unwrap().into_index().unwrap();

        assert_eq!(restored.len(), 2);
        assert_eq!(restored.dimension(), 3);
        assert_eq!(restored.metric(), Metric::L2);
        assert_eq!(restored.get(1), source.get(1));
        assert_eq!(restored.get(2), source.get(2));

        let query = [1.1, 2.1, 3.1];
        assert_eq!(
            restored.search(&query, 2, &Filter::default()).unwrap(),
            source.search(&query, 2, &Filter::default()).unwrap()
        );
    }

    #[test]
    fn test_save_and_load_index() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("nested").join("index.json");

        let source = create_test_index();
        save_index_to_file(&source, &file_path).unwrap();
        assert!(file_path.exists());
        assert!(!temp_dir.path().join("nested").join("index.json.tmp").exists());

        let loaded = load_index_from_file(&file_path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get(1).unwrap().metadata.get("category").unwrap(), "fashion");
    }

    #[test]
    fn test_load_nonexistent_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = load_index_from_file(&temp_dir.path().join("missing.json"));
        assert!(matches!(result.unwrap_err(), PersistenceError::FileNotFound(_)));
    }

    #[test]
    fn test_invalid_file_format() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("invalid.json");
        fs::write(&file_path, "invalid json").unwrap();

        let result = load_index_from_file(&file_path);
        assert!(matches!(result.unwrap_err(), PersistenceError::Serialization(_)));
    }

    #[test]
    fn test_version_mismatch() {
        let mut snapshot = Snapshot::from_index(&create_test_index());
        snapshot.header.version = "2.0.0".to_string();

        let result = snapshot.into_index();
        assert!(matches!(result.unwrap_err(), PersistenceError::VersionMismatch { .. }));
    }

    #[test]
    fn test_format_mismatch() {
        let mut snapshot = Snapshot::from_index(&create_test_index());
        snapshot.header.format = "other-index".to_string();

        let result = snapshot.into_index();
        assert!(matches!(result.unwrap_err(), PersistenceError::InvalidFormat(_)));
    }

    #[test]
    fn test_rejects_inconsistent_records() {
        let mut snapshot = Snapshot::from_index(&create_test_index());
        snapshot.records[0].vector.push(7.0);
        assert!(matches!(snapshot.into_index().unwrap_err(), PersistenceError::InvalidFormat(_)));

        let mut snapshot = Snapshot::from_index(&create_test_index());
        let duplicate = snapshot.records[0].clone();
        snapshot.records.push(duplicate);
        assert!(matches!(snapshot.into_index().unwrap_err(), PersistenceError::InvalidFormat(_)));

        let mut snapshot = Snapshot::from_index(&create_test_index());
        snapshot.dim = 0;
        assert!(matches!(snapshot.into_index().unwrap_err(), PersistenceError::InvalidFormat(_)));
    }

    #[test]
    fn test_unknown_metric_is_rejected() {
        let bytes = br#"{
            "header": {"version": "1.0.0", "format": "vaf-index", "created_at": "2025-01-21T10:00:00Z"},
            "dim": 2,
            "metric": "manhattan",
            "records": []
        }"#;
        assert!(matches!(
            Snapshot::from_bytes(bytes).unwrap_err(),
            PersistenceError::Serialization(_)
        ));
    }

    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::new();
        assert!(storage.load().unwrap_err().is_not_found());

        storage.save(b"abc").unwrap();
        assert_eq!(storage.load().unwrap(), b"abc".to_vec());
    }

    #[test]
    fn test_temp_path_keeps_full_file_name() {
        let json = FileStorage::new("/data/idx.json");
        let bin = FileStorage::new("/data/idx.bin");
        let tmp = FileStorage::new("/data/idx.tmp");

        assert_eq!(json.temp_path(), PathBuf::from("/data/idx.json.tmp"));
        assert_eq!(bin.temp_path(), PathBuf::from("/data/idx.bin.tmp"));
        assert_ne!(tmp.temp_path(), tmp.path());
    }

    #[test]
    fn test_save_to_tmp_named_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("snapshot.tmp");

        save_index_to_file(&create_test_index(), &path).unwrap();
        assert!(!temp_dir.path().join("snapshot.tmp.tmp").exists());
        assert_eq!(load_index_from_file(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_saved_index_always_restores() {
        let mut index = create_test_index();
        assert!(index.upsert(3, vec![f32::INFINITY, 0.0, 0.0], Metadata::new()).is_err());
        assert!(index.upsert(1, vec![f32::NAN, 0.0, 0.0], Metadata::new()).is_err());
        index.upsert(3, vec![f32::MAX, f32::MIN_POSITIVE, -0.0], Metadata::new()).unwrap();

        let bytes = Snapshot::from_index(&index).to_bytes().unwrap();
        let restored = Snapshot::from_bytes(&bytes).unwrap().into_index().unwrap();
        assert_eq!(restored.len(), 3);
        assert_eq!(restored.get(1), index.get(1));
        assert_eq!(restored.get(3), index.get(3));
    }
}
