//! Directory-backed key/value storage.
//!
//! Each key is stored as its own file, `<root>/<key>.json`. Writes go to a temporary file that
//! is synced and then renamed over the target, so a reader never observes a partially written
//! snapshot.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, trace};

use docstash_core::{
    backend::{KeyLocks, KeyValueStore, KeyValueStoreBuilder},
    error::{DocumentStoreError, DocumentStoreResult},
};

const EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "json.tmp";

/// Key/value store keeping one file per key under a root directory.
///
/// Clones share the same root, write lock and key locks. Stores opened separately on one
/// directory do not share key locks; open the store once and clone it.
///
/// # Example
///
/// ```ignore
/// use docstash::{file::FileStore, store::Database};
///
/// let storage = FileStore::builder("./data").build().await?;
/// let db = Database::open("inventory", storage)?; // ./data/inventory.json
/// ```
#[derive(Clone, Debug)]
pub struct FileStore {
    root: PathBuf,
    write_lock: Arc<Mutex<()>>,
    locks: KeyLocks,
}

impl FileStore {
    /// Creates a store over an existing directory.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Storage`] if `root` is not a directory.
    pub fn open(root: impl Into<PathBuf>) -> DocumentStoreResult<Self> {
        let root = root.into();

        if !root.is_dir() {
            return Err(DocumentStoreError::Storage(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        Ok(Self {
            root,
            write_lock: Arc::new(Mutex::new(())),
            locks: KeyLocks::new(),
        })
    }

    /// Creates a builder for a store rooted at `root`.
    pub fn builder(root: impl Into<PathBuf>) -> FileStoreBuilder {
        FileStoreBuilder::new(root)
    }

    /// The directory keys are stored in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The file `key` is stored in.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Storage`] if the key is empty or could escape the root
    /// directory.
    pub fn path_for(&self, key: &str) -> DocumentStoreResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(format!("{key}.{EXTENSION}")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> DocumentStoreResult<Option<Vec<u8>>> {
        let path = self.path_for(key)?;

        match fs::read(&path) {
            Ok(bytes) => {
                trace!(target: "docstash::store", path = %path.display(), bytes = bytes.len(), "File read");
                Ok(Some(bytes))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error("read", &path, err)),
        }
    }

    fn set(&self, key: &str, value: Vec<u8>) -> DocumentStoreResult<()> {
        let path = self.path_for(key)?;
        let temp = path.with_extension(TEMP_EXTENSION);

        let _guard = self.write_lock.lock();

        write_synced(&temp, &value).map_err(|err| io_error("write", &temp, err))?;
        fs::rename(&temp, &path).map_err(|err| io_error("rename", &path, err))?;

        trace!(target: "docstash::store", path = %path.display(), bytes = value.len(), "File written");

        Ok(())
    }

    fn key_locks(&self) -> &KeyLocks {
        &self.locks
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn validate_key(key: &str) -> DocumentStoreResult<()> {
    let invalid = key.is_empty()
        || key == "."
        || key.contains("..")
        || key.contains(['/', '\\'])
        || key.contains('\0');

    if invalid {
        return Err(DocumentStoreError::Storage(format!(
            "Key {key:?} cannot be used as a file name"
        )));
    }

    Ok(())
}

fn io_error(action: &str, path: &Path, err: io::Error) -> DocumentStoreError {
    DocumentStoreError::Storage(format!("Failed to {action} {}: {err}", path.display()))
}

/// Builder for constructing [`FileStore`] instances.
///
/// # Example
///
/// ```ignore
/// use docstash::{backend::KeyValueStoreBuilder, file::FileStore};
///
/// let store = FileStore::builder("./data")
///     .create_dir(false)
///     .build()
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct FileStoreBuilder {
    root: PathBuf,
    create_dir: bool,
}

impl FileStoreBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            create_dir: true,
        }
    }

    /// Whether to create the root directory (and its parents) if missing. Defaults to `true`.
    pub fn create_dir(mut self, create_dir: bool) -> Self {
        self.create_dir = create_dir;
        self
    }
}

#[async_trait]
impl KeyValueStoreBuilder for FileStoreBuilder {
    type Store = FileStore;

    /// Prepares the root directory and returns the store.
    async fn build(self) -> DocumentStoreResult<Self::Store> {
        if self.create_dir {
            fs::create_dir_all(&self.root).map_err(|err| io_error("create", &self.root, err))?;
            debug!(target: "docstash::store", root = %self.root.display(), "Prepared file store directory");
        }

        FileStore::open(self.root)
    }
}
