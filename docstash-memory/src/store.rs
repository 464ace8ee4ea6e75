//! In-memory key/value storage.
//!
//! This module provides a simple backend that keeps database snapshots as byte blobs in a
//! `HashMap` behind a read-write lock.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::trace;

use docstash_core::{
    backend::{KeyLocks, KeyValueStore, KeyValueStoreBuilder},
    error::DocumentStoreResult,
};

type BlobMap = HashMap<String, Vec<u8>>;

/// Thread-safe in-memory key/value store.
///
/// # Thread Safety
///
/// `MemoryStore` is cloneable and uses an `Arc`-wrapped internal map, allowing it to be shared
/// across tasks and threads. Multiple clones of the same instance share the same data and key
/// locks, so two databases opened on clones under the same name see each other's writes and
/// never interleave them.
///
/// # Example
///
/// ```ignore
/// use docstash_memory::MemoryStore;
/// use docstash::store::Database;
///
/// let storage = MemoryStore::new();
/// let db = Database::open("inventory", storage.clone())?;
/// assert!(storage.contains_key("inventory"));
/// ```
#[derive(Default, Clone, Debug)]
pub struct MemoryStore {
    blobs: Arc<RwLock<BlobMap>>,
    locks: KeyLocks,
}

impl MemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder for constructing a `MemoryStore`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use docstash_memory::MemoryStore;
    ///
    /// let store = MemoryStore::builder().build().await?;
    /// ```
    pub fn builder() -> MemoryStoreBuilder {
        MemoryStoreBuilder::default()
    }

    /// Returns `true` if a value is stored under `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.blobs.read().contains_key(key)
    }

    /// Returns the stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys = self.blobs.read().keys().cloned().collect::<Vec<_>>();
        keys.sort();
        keys
    }

    /// Removes the value stored under `key`, returning it.
    pub fn remove(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs.write().remove(key)
    }

    /// Removes every stored value.
    pub fn clear(&self) {
        self.blobs.write().clear();
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> DocumentStoreResult<Option<Vec<u8>>> {
        let value = self.blobs.read().get(key).cloned();

        trace!(target: "docstash::store", key, found = value.is_some(), "Memory get");

        Ok(value)
    }

    fn set(&self, key: &str, value: Vec<u8>) -> DocumentStoreResult<()> {
        trace!(target: "docstash::store", key, bytes = value.len(), "Memory set");

        self.blobs.write().insert(key.to_string(), value);
        Ok(())
    }

    fn key_locks(&self) -> &KeyLocks {
        &self.locks
    }
}

/// Builder for constructing [`MemoryStore`] instances.
///
/// Optionally seeds the store with existing values, which is handy for tests that start from a
/// known snapshot.
///
/// # Example
///
/// ```ignore
/// use docstash_memory::MemoryStore;
/// use docstash::backend::KeyValueStoreBuilder;
///
/// let store = MemoryStore::builder()
///     .with_value("inventory", br#"{"items":[]}"#.to_vec())
///     .build()
///     .await?;
/// ```
#[derive(Default, Debug, Clone)]
pub struct MemoryStoreBuilder {
    seed: BlobMap,
}

impl MemoryStoreBuilder {
    /// Stores `value` under `key` in the built store.
    pub fn with_value(mut self, key: impl Into<String>, value: Vec<u8>) -> Self {
        self.seed.insert(key.into(), value);
        self
    }
}

#[async_trait]
impl KeyValueStoreBuilder for MemoryStoreBuilder {
    type Store = MemoryStore;

    /// Builds and returns a new [`MemoryStore`] holding the seeded values.
    async fn build(self) -> DocumentStoreResult<Self::Store> {
        Ok(MemoryStore {
            blobs: Arc::new(RwLock::new(self.seed)),
            locks: KeyLocks::new(),
        })
    }
}
