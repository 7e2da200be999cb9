use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use fjall::{Database, Keyspace, KeyspaceCreateOptions};
use tracing::{debug, info};

use crate::error::StoreError;

/// Key-value engine backing a storage node.
pub trait KvStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> Result<String, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Fails with [`StoreError::NotFound`] when `key` is absent.
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Ordered in-memory store. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys in ascending order.
    pub fn keys(&self) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<String, StoreError> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }
}

/// Durable store on a Fjall LSM-tree, one database directory per node.
pub struct FjallStore {
    #[allow(dead_code)]
    db: Database,
    entries: Keyspace,
    /// Held so a temporary database directory outlives the database.
    _tmp: Option<tempfile::TempDir>,
}

impl FjallStore {
    /// Open (or create) a persistent store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let db = Database::builder(path).open()?;
        info!(path = %path.display(), "Opened on-disk store");
        Self::init(db, None)
    }

    /// Open a store in a fresh temporary directory, removed on drop.
    pub fn open_temporary() -> Result<Self, StoreError> {
        let tmp = tempfile::tempdir()?;
        let db = Database::builder(tmp.path()).temporary(true).open()?;
        Self::init(db, Some(tmp))
    }

    fn init(db: Database, tmp: Option<tempfile::TempDir>) -> Result<Self, StoreError> {
        let entries = db.keyspace("entries", KeyspaceCreateOptions::default)?;
        Ok(Self {
            db,
            entries,
            _tmp: tmp,
        })
    }

    /// Number of stored keys. This is an O(n) scan.
    pub fn len(&self) -> Result<usize, StoreError> {
        let mut count = 0;
        for guard in self.entries.iter() {
            let _ = guard.key()?;
            count += 1;
        }
        Ok(count)
    }
}

impl KvStore for FjallStore {
    fn get(&self, key: &str) -> Result<String, StoreError> {
        let bytes = self
            .entries
            .get(key.as_bytes())?
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| StoreError::Io(format!("value of {key:?} is not UTF-8: {e}")))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.as_bytes(), value.as_bytes())?;
        debug!(key, "Stored key on disk");
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        if self.entries.get(key.as_bytes())?.is_none() {
            return Err(StoreError::NotFound(key.to_string()));
        }
        self.entries.remove(key.as_bytes())?;
        debug!(key, "Deleted key on disk");
        Ok(())
    }
}
