//! Process-wide scratch space shared by all scripts.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::types::ScratchValue;

/// Shared key/value scratch space.
///
/// Cloning is cheap and every clone sees the same map. Reads take a shared
/// lock, writes an exclusive one; no operation holds the lock across a
/// call into Lua.
#[derive(Debug, Clone, Default)]
pub struct ScratchStore {
    inner: Arc<RwLock<HashMap<String, ScratchValue>>>,
}

impl ScratchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<ScratchValue> {
        self.inner.read().get(key).cloned()
    }

    /// Store a value, returning the previous one.
    pub fn set(&self, key: impl Into<String>, value: impl Into<ScratchValue>) -> Option<ScratchValue> {
        self.inner.write().insert(key.into(), value.into())
    }

    pub fn delete(&self, key: &str) -> Option<ScratchValue> {
        self.inner.write().remove(key)
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let a = ScratchStore::new();
        let b = a.clone();
        a.set("hits", 3i64);
        assert_eq!(b.get("hits"), Some(ScratchValue::Integer(3)));

        assert_eq!(b.delete("hits"), Some(ScratchValue::Integer(3)));
        assert!(a.is_empty());
    }

    #[test]
    fn test_keys_sorted() {
        let store = ScratchStore::new();
        store.set("zeta", true);
        store.set("alpha", "x");
        store.set("mid", 1.5);
        assert_eq!(store.keys(), vec!["alpha", "mid", "zeta"]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_concurrent_writers() {
        let store = ScratchStore::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for j in 0..100 {
                        store.set(format!("k{i}-{j}"), j as i64);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.len(), 800);
    }
}
