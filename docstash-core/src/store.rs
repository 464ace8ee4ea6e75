//! Database handles and their persisted snapshots.
//!
//! A [`Database`] names one blob in a [`KeyValueStore`]. The blob is a JSON object mapping
//! collection names to arrays of documents. Every operation reads the whole blob, and every
//! mutation writes the whole blob back.
//!
//! # Concurrency
//!
//! `Database` is a cheap, cloneable handle. Every mutation holds the storage's lock for the
//! database key (see [`KeyLocks`](crate::backend::KeyLocks)) across its read-modify-write
//! cycle. Clones of a handle, and handles opened separately on the same store, therefore never
//! interleave their writes.
//!
//! # Example
//!
//! ```ignore
//! use docstash::{store::Database, memory::MemoryStore};
//!
//! let db = Database::builder("inventory")
//!     .default_limit(50)
//!     .open(MemoryStore::new())?;
//!
//! let items = db.collection("items").await?;
//! println!("{:?}", db.info()?);
//! ```

use std::{fmt, sync::Arc};

use indexmap::IndexMap;
use mea::mutex::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    backend::KeyValueStore,
    collection::Collection,
    cursor::DEFAULT_LIMIT,
    document::{CREATED_AT_FIELD, Document},
    error::{DocumentStoreError, DocumentStoreResult},
    query::SortDirection,
};

/// In-memory form of a persisted database: collection name to documents, in insertion order.
/// Collections in creation order.
pub(crate) type Snapshot = IndexMap<String, Vec<Document>>;

/// Tunable defaults for a database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseOptions {
    /// Field cursors sort by unless told otherwise.
    pub default_sort_field: String,
    /// Direction cursors sort in unless told otherwise.
    pub default_sort_direction: SortDirection,
    /// Result cap applied by cursors unless told otherwise. `0` means no cap.
    pub default_limit: usize,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            default_sort_field: CREATED_AT_FIELD.to_string(),
            default_sort_direction: SortDirection::Desc,
            default_limit: DEFAULT_LIMIT,
        }
    }
}

/// Summary of a database's contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    pub database_name: String,
    pub num_collections: usize,
    pub collections: Vec<String>,
}

struct DatabaseInner<S> {
    name: String,
    storage: S,
    options: DatabaseOptions,
    write_lock: Arc<Mutex<()>>,
}

/// Handle to one named database persisted in a [`KeyValueStore`].
pub struct Database<S: KeyValueStore> {
    inner: Arc<DatabaseInner<S>>,
}

impl<S: KeyValueStore> Clone for Database<S> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<S: KeyValueStore> fmt::Debug for Database<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.inner.name)
            .field("storage", &self.inner.storage)
            .field("options", &self.inner.options)
            .finish()
    }
}

impl<S: KeyValueStore> Database<S> {
    /// Opens (creating if necessary) the database `name` with default options.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Validation`] if the name is not longer than three
    /// characters, or a storage error if the initial blob cannot be written.
    pub fn open(name: impl Into<String>, storage: S) -> DocumentStoreResult<Self> {
        DatabaseBuilder::new(name).open(storage)
    }

    /// Creates a builder for opening a database with custom options.
    pub fn builder(name: impl Into<String>) -> DatabaseBuilder {
        DatabaseBuilder::new(name)
    }

    /// Returns the database name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn options(&self) -> &DatabaseOptions {
        &self.inner.options
    }

    /// Returns the underlying key/value store.
    pub fn storage(&self) -> &S {
        &self.inner.storage
    }

    /// Returns a handle to the collection `name`, creating it if it does not exist.
    ///
    /// Each call returns a new handle with its own, empty hook registrations.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Validation`] if the name is shorter than three characters.
    pub async fn collection(&self, name: impl Into<String>) -> DocumentStoreResult<Collection<S>> {
        let name = name.into();
        validate_collection_name(&name)?;

        let _guard = self.lock().await;
        let mut snapshot = self.read_snapshot()?;

        if !snapshot.contains_key(&name) {
            debug!(target: "docstash::store", database = %self.name(), collection = %name, "Creating collection");
            snapshot.insert(name.clone(), Vec::new());
            self.write_snapshot(&snapshot)?;
        }

        Ok(Collection::new(name, self.clone()))
    }

    /// Describes the collections currently stored in the database.
    pub fn info(&self) -> DocumentStoreResult<DatabaseInfo> {
        let collections = self
            .read_snapshot()?
            .into_keys()
            .collect::<Vec<_>>();

        Ok(DatabaseInfo {
            database_name: self.name().to_string(),
            num_collections: collections.len(),
            collections,
        })
    }

    /// Acquires the mutation lock for this database's storage key.
    pub(crate) async fn lock(&self) -> MutexGuard<'_, ()> {
        self.inner.write_lock.lock().await
    }

    pub(crate) fn read_snapshot(&self) -> DocumentStoreResult<Snapshot> {
        match self.inner.storage.get(self.name())? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Err(DocumentStoreError::Storage(format!(
                "Database {} not found",
                self.name()
            ))),
        }
    }

    pub(crate) fn write_snapshot(&self, snapshot: &Snapshot) -> DocumentStoreResult<()> {
        let bytes = serde_json::to_vec(snapshot)?;
        self.inner.storage.set(self.name(), bytes)
    }

    /// Reads the documents of one collection.
    pub(crate) fn read_collection(&self, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        self.read_snapshot()?
            .shift_remove(collection)
            .ok_or_else(|| DocumentStoreError::CollectionNotFound(collection.to_string()))
    }

    /// Runs a read-modify-write cycle on one collection under the mutation lock.
    ///
    /// `mutate` returns its output and whether it changed the documents; the snapshot is only
    /// written back when it did. An error from `mutate` leaves storage untouched.
    pub(crate) async fn modify_collection<T>(
        &self,
        collection: &str,
        mutate: impl FnOnce(&mut Vec<Document>) -> DocumentStoreResult<(T, bool)>,
    ) -> DocumentStoreResult<T> {
        let _guard = self.lock().await;
        let mut snapshot = self.read_snapshot()?;

        let documents = snapshot
            .get_mut(collection)
            .ok_or_else(|| DocumentStoreError::CollectionNotFound(collection.to_string()))?;

        let (output, changed) = mutate(documents)?;

        if changed {
            self.write_snapshot(&snapshot)?;
        }

        Ok(output)
    }
}

/// Builder for opening a [`Database`] with custom [`DatabaseOptions`].
#[derive(Debug, Clone)]
pub struct DatabaseBuilder {
    name: String,
    options: DatabaseOptions,
}

impl DatabaseBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: DatabaseOptions::default(),
        }
    }

    /// Replaces all options at once.
    pub fn options(mut self, options: DatabaseOptions) -> Self {
        self.options = options;
        self
    }

    pub fn default_sort_field(mut self, field: impl Into<String>) -> Self {
        self.options.default_sort_field = field.into();
        self
    }

    pub fn default_sort_direction(mut self, direction: SortDirection) -> Self {
        self.options.default_sort_direction = direction;
        self
    }

    pub fn default_limit(mut self, limit: usize) -> Self {
        self.options.default_limit = limit;
        self
    }

    /// Opens the database in `storage`, writing an empty blob if none exists yet.
    pub fn open<S: KeyValueStore>(self, storage: S) -> DocumentStoreResult<Database<S>> {
        validate_database_name(&self.name)?;

        if storage.get(&self.name)?.is_none() {
            debug!(target: "docstash::store", database = %self.name, "Initializing database");
            storage.set(&self.name, serde_json::to_vec(&Snapshot::new())?)?;
        }

        let write_lock = storage.key_locks().lock_for(&self.name);

        Ok(Database {
            inner: Arc::new(DatabaseInner {
                name: self.name,
                storage,
                options: self.options,
                write_lock,
            }),
        })
    }
}

fn validate_database_name(name: &str) -> DocumentStoreResult<()> {
    if name.chars().count() <= 3 {
        return Err(DocumentStoreError::Validation(format!(
            "Database name {name:?} must have more than 3 characters"
        )));
    }
    Ok(())
}

fn validate_collection_name(name: &str) -> DocumentStoreResult<()> {
    if name.chars().count() < 3 {
        return Err(DocumentStoreError::Validation(format!(
            "Collection name {name:?} must have at least 3 characters"
        )));
    }
    Ok(())
}
