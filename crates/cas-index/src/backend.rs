//! The [`IndexBackend`] trait and its implementations.
//!
//! A backend is an ordered byte-keyed map. Each call is one transaction over
//! a single record: readers never see a half-written value, and a write is
//! durable once the call returns.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::path::Path;
use std::sync::RwLock;

use sled::transaction::{ConflictableTransactionResult, TransactionError};
use tracing::info;

use crate::error::{IndexError, IndexResult};

/// Name of the sled tree holding index entries.
pub const OBJECTS_TREE: &str = "objects";

/// Storage backend for the key index.
///
/// Implementations must be thread-safe (`Send + Sync`). Calls block; async
/// callers should run them on the blocking pool.
pub trait IndexBackend: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// Returns `Ok(None)` if there is none.
    fn get(&self, key: &[u8]) -> IndexResult<Option<Vec<u8>>>;

    /// Store `value` under `key`, returning the value it replaced.
    fn put(&self, key: &[u8], value: &[u8]) -> IndexResult<Option<Vec<u8>>>;

    /// Remove `key`. Returns `Ok(true)` if a value existed.
    fn delete(&self, key: &[u8]) -> IndexResult<bool>;

    /// Make all completed writes durable.
    fn flush(&self) -> IndexResult<()>;
}

/// Persistent backend on a sled database.
#[derive(Clone)]
pub struct SledBackend {
    db: sled::Db,
    tree: sled::Tree,
}

impl SledBackend {
    /// Open (or create) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> IndexResult<Self> {
        let path = path.as_ref();
        let db = sled::open(path)?;
        let tree = db.open_tree(OBJECTS_TREE)?;
        info!(path = %path.display(), entries = tree.len(), "opened key index");
        Ok(Self { db, tree })
    }
}

fn tx_error(e: TransactionError<Infallible>) -> IndexError {
    match e {
        TransactionError::Storage(e) => e.into(),
        TransactionError::Abort(never) => match never {},
    }
}

impl IndexBackend for SledBackend {
    fn get(&self, key: &[u8]) -> IndexResult<Option<Vec<u8>>> {
        Ok(self.tree.get(key)?.map(|v| v.to_vec()))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> IndexResult<Option<Vec<u8>>> {
        let prev = self
            .tree
            .transaction(|tx| -> ConflictableTransactionResult<_, Infallible> {
                Ok(tx.insert(key, value)?)
            })
            .map_err(tx_error)?;
        self.flush()?;
        Ok(prev.map(|v| v.to_vec()))
    }

    fn delete(&self, key: &[u8]) -> IndexResult<bool> {
        let prev = self
            .tree
            .transaction(|tx| -> ConflictableTransactionResult<_, Infallible> {
                Ok(tx.remove(key)?)
            })
            .map_err(tx_error)?;
        self.flush()?;
        Ok(prev.is_some())
    }

    fn flush(&self) -> IndexResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl fmt::Debug for SledBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SledBackend")
            .field("tree", &OBJECTS_TREE)
            .field("entries", &self.tree.len())
            .finish()
    }
}

/// An in-memory implementation of [`IndexBackend`].
///
/// Data is lost when the backend is dropped.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    records: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl InMemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> IndexResult<usize> {
        Ok(self.records.read().map_err(poisoned)?.len())
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> IndexResult<bool> {
        Ok(self.len()? == 0)
    }
}

fn poisoned<E: fmt::Display>(e: E) -> IndexError {
    IndexError::Backend(format!("lock poisoned: {e}"))
}

impl IndexBackend for InMemoryBackend {
    fn get(&self, key: &[u8]) -> IndexResult<Option<Vec<u8>>> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> IndexResult<Option<Vec<u8>>> {
        let mut records = self.records.write().map_err(poisoned)?;
        Ok(records.insert(key.to_vec(), value.to_vec()))
    }

    fn delete(&self, key: &[u8]) -> IndexResult<bool> {
        let mut records = self.records.write().map_err(poisoned)?;
        Ok(records.remove(key).is_some())
    }

    fn flush(&self) -> IndexResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn exercise(backend: &dyn IndexBackend) {
        assert_eq!(backend.get(b"a/1").unwrap(), None);
        assert_eq!(backend.put(b"a/1", b"one").unwrap(), None);
        assert_eq!(backend.get(b"a/1").unwrap().as_deref(), Some(b"one".as_slice()));

        assert_eq!(backend.put(b"a/1", b"uno").unwrap().as_deref(), Some(b"one".as_slice()));
        assert_eq!(backend.get(b"a/1").unwrap().as_deref(), Some(b"uno".as_slice()));

        assert!(backend.delete(b"a/1").unwrap());
        assert!(!backend.delete(b"a/1").unwrap());
        assert_eq!(backend.get(b"a/1").unwrap(), None);
        backend.flush().unwrap();
    }

    #[test]
    fn in_memory_semantics() {
        let backend = InMemoryBackend::new();
        exercise(&backend);
        assert!(backend.is_empty().unwrap());
    }

    #[test]
    fn in_memory_poisoned_lock_is_backend_error() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.put(b"a/1", b"one").unwrap();

        let holder = Arc::clone(&backend);
        let res = thread::spawn(move || {
            let _guard = holder.records.write().unwrap();
            panic!("writer died holding the lock");
        })
        .join();
        assert!(res.is_err());

        assert!(matches!(backend.len(), Err(IndexError::Backend(_))));
        assert!(matches!(backend.is_empty(), Err(IndexError::Backend(_))));
        assert!(matches!(backend.get(b"a/1"), Err(IndexError::Backend(_))));
    }

    #[test]
    fn sled_semantics() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SledBackend::open(dir.path().join("index.db")).unwrap();
        exercise(&backend);
    }

    #[test]
    fn sled_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");
        {
            let backend = SledBackend::open(&path).unwrap();
            backend.put(b"docs/readme", b"record").unwrap();
        }
        let backend = SledBackend::open(&path).unwrap();
        assert_eq!(backend.get(b"docs/readme").unwrap().as_deref(), Some(b"record".as_slice()));
    }

    #[test]
    fn concurrent_writers_on_distinct_keys() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(SledBackend::open(dir.path().join("index.db")).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let backend = Arc::clone(&backend);
                thread::spawn(move || {
                    let key = format!("bucket/{i}");
                    backend.put(key.as_bytes(), key.as_bytes()).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        for i in 0..8 {
            let key = format!("bucket/{i}");
            assert_eq!(backend.get(key.as_bytes()).unwrap().as_deref(), Some(key.as_bytes()));
        }
    }
}
