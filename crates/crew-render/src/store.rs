//! Key-value backend for `kv` nodes.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use parking_lot::RwLock;
use thiserror::Error;

/// Errors from a key-value backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no value for key '{key}'")]
    NotFound { key: String },

    #[error("storage backend error: {0}")]
    Backend(#[from] sled::Error),
}

impl StoreError {
    pub fn not_found(key: &str) -> Self {
        Self::NotFound {
            key: key.to_string(),
        }
    }
}

/// String-keyed byte store.
///
/// A missing key is an error, not an empty value.
pub trait KvStore: Send + Sync + fmt::Debug {
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Deleting an absent key succeeds.
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Persistent store backed by sled.
#[derive(Debug, Clone)]
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// A store deleted when dropped.
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }
}

impl KvStore for SledStore {
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.db
            .get(key.as_bytes())?
            .map(|value| value.to_vec())
            .ok_or_else(|| StoreError::not_found(key))
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.db.insert(key.as_bytes(), value)?;
        self.db.flush()?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.db.remove(key.as_bytes())?;
        self.db.flush()?;
        Ok(())
    }
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::not_found(key))
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.entries.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(store: &dyn KvStore) {
        assert!(matches!(store.get("/a"), Err(StoreError::NotFound { .. })));

        store.put("/a", b"alpha").unwrap();
        assert_eq!(store.get("/a").unwrap(), b"alpha");

        store.put("/a", b"beta").unwrap();
        assert_eq!(store.get("/a").unwrap(), b"beta");

        store.delete("/a").unwrap();
        store.delete("/a").unwrap();
        assert!(store.get("/a").is_err());
    }

    #[test]
    fn test_memory_store() {
        exercise(&MemoryStore::new());
    }

    #[test]
    fn test_sled_store() {
        exercise(&SledStore::temporary().unwrap());
    }

    #[test]
    fn test_sled_store_persists() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("crew.db");
        {
            let store = SledStore::open(&path).unwrap();
            store.put("greeting", b"hello").unwrap();
        }
        let store = SledStore::open(&path).unwrap();
        assert_eq!(store.get("greeting").unwrap(), b"hello");
    }
}
