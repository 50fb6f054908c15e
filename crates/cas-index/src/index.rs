//! Typed access to index entries.

use std::fmt;
use std::sync::Arc;

use cas_types::ObjectKey;
use tracing::{debug, warn};

use crate::backend::IndexBackend;
use crate::entry::IndexEntry;
use crate::error::IndexResult;

/// The key index: [`IndexEntry`] records addressed by [`ObjectKey`].
///
/// Cloning is cheap; all clones share one backend. Methods block on the
/// backend.
#[derive(Clone)]
pub struct KeyIndex {
    backend: Arc<dyn IndexBackend>,
}

impl KeyIndex {
    pub fn new(backend: Arc<dyn IndexBackend>) -> Self {
        Self { backend }
    }

    /// Store `entry` under `key`, replacing any previous entry. Returns the
    /// replaced entry.
    ///
    /// Once the backend accepts the write the call succeeds. A replaced
    /// record that no longer decodes is logged and reported as `None`.
    pub fn put(&self, key: &ObjectKey, entry: &IndexEntry) -> IndexResult<Option<IndexEntry>> {
        let value = serde_json::to_vec(entry)?;
        let prev = self.backend.put(key.as_bytes(), &value)?;
        debug!(%key, digest = %entry.digest, replaced = prev.is_some(), "index entry written");
        Ok(prev.and_then(|raw| match decode(key, &raw) {
            Ok(prev) => Some(prev),
            Err(e) => {
                warn!(%key, error = %e, "replaced an undecodable index entry");
                None
            }
        }))
    }

    /// Look up the entry for `key`.
    pub fn get(&self, key: &ObjectKey) -> IndexResult<Option<IndexEntry>> {
        self.backend
            .get(key.as_bytes())?
            .map(|raw| decode(key, &raw))
            .transpose()
    }

    /// Remove the entry for `key`. Returns `true` if one existed.
    pub fn delete(&self, key: &ObjectKey) -> IndexResult<bool> {
        let existed = self.backend.delete(key.as_bytes())?;
        debug!(%key, existed, "index entry deleted");
        Ok(existed)
    }
}

fn decode(key: &ObjectKey, raw: &[u8]) -> IndexResult<IndexEntry> {
    let mut entry: IndexEntry = serde_json::from_slice(raw)?;
    entry.key = key.as_str().to_string();
    Ok(entry)
}

impl fmt::Debug for KeyIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyIndex").finish_non_exhaustive()
    }
}
