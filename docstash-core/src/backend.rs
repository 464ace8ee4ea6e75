//! Storage backend abstraction for the document store.
//!
//! A database is persisted as a single serialized blob stored under the database name in a
//! [`KeyValueStore`]. The store only needs to get and set whole values; everything else
//! (collections, documents, queries) is handled by the [`Database`](crate::store::Database)
//! layered on top.
//!
//! # Traits
//!
//! - [`KeyValueStore`]: The synchronous byte store a database is persisted in
//! - [`KeyValueStoreBuilder`]: Factory trait for creating store instances
//!
//! # Locking
//!
//! Every store owns a [`KeyLocks`] registry. A database takes the lock for its key around each
//! read-modify-write cycle, so databases opened on the same key of one store (or of its clones)
//! never interleave their writes, however many handles were opened.
//!
//! # Examples
//!
//! ```ignore
//! use docstash::backend::KeyValueStore;
//!
//! let store = MyStoreImpl::new();
//! store.set("inventory", br#"{"items":[]}"#.to_vec())?;
//! assert!(store.get("inventory")?.is_some());
//! ```

use async_trait::async_trait;
use mea::mutex::Mutex;
use std::{collections::HashMap, fmt::Debug, sync::Arc};

use crate::error::DocumentStoreResult;

/// Synchronous key/value byte store used to persist databases.
///
/// Keys are database names and values are whole serialized database snapshots. Both
/// operations block the caller until they complete.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`. A single `get` or `set` must be atomic with respect
/// to other calls on the same key; the database layer takes care of serializing its own
/// read-modify-write cycles.
pub trait KeyValueStore: Send + Sync + Debug {
    /// Returns the value stored under `key`, or `None` if the key is absent.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Storage`](crate::error::DocumentStoreError::Storage) if
    /// the value cannot be read.
    fn get(&self, key: &str) -> DocumentStoreResult<Option<Vec<u8>>>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Storage`](crate::error::DocumentStoreError::Storage) if
    /// the value cannot be written.
    fn set(&self, key: &str, value: Vec<u8>) -> DocumentStoreResult<()>;

    /// The lock registry shared by every handle to this store.
    ///
    /// Clones of a store must return the same registry.
    fn key_locks(&self) -> &KeyLocks;
}

/// Registry of per-key async locks.
///
/// Cloning is cheap and clones share their locks. The lock for a key is created on first use
/// and lives as long as the registry.
#[derive(Debug, Default, Clone)]
pub struct KeyLocks {
    locks: Arc<parking_lot::Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock guarding `key`.
    pub fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

impl<S> KeyValueStore for &S
where
    S: KeyValueStore + ?Sized,
{
    fn get(&self, key: &str) -> DocumentStoreResult<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Vec<u8>) -> DocumentStoreResult<()> {
        (**self).set(key, value)
    }

    fn key_locks(&self) -> &KeyLocks {
        (**self).key_locks()
    }
}

impl<S> KeyValueStore for Arc<S>
where
    S: KeyValueStore + ?Sized,
{
    fn get(&self, key: &str) -> DocumentStoreResult<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Vec<u8>) -> DocumentStoreResult<()> {
        (**self).set(key, value)
    }

    fn key_locks(&self) -> &KeyLocks {
        (**self).key_locks()
    }
}

impl<S> KeyValueStore for Box<S>
where
    S: KeyValueStore + ?Sized,
{
    fn get(&self, key: &str) -> DocumentStoreResult<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Vec<u8>) -> DocumentStoreResult<()> {
        (**self).set(key, value)
    }

    fn key_locks(&self) -> &KeyLocks {
        (**self).key_locks()
    }
}

/// A boxed store for selecting a backend at runtime.
pub type DynKeyValueStore = Box<dyn KeyValueStore>;

/// Factory for [`KeyValueStore`] implementations.
///
/// Builders perform whatever setup a store needs (creating directories, opening handles)
/// before handing out a ready-to-use instance.
#[async_trait]
pub trait KeyValueStoreBuilder {
    type Store: KeyValueStore;

    async fn build(self) -> DocumentStoreResult<Self::Store>;
}
