//! Per-blob metadata records stored next to each blob.
//!
//! A sidecar is a small JSON document `{"content_type": ..., "size": ...}`
//! at `<root>/<id>.meta.json`. It is always written as a whole record through
//! a staged file and an atomic rename, never streamed.

use std::io;
use std::path::{Path, PathBuf};

use cas_types::ContentId;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::atomic::Staging;
use crate::error::{StoreError, StoreResult};

/// File name suffix for sidecar records.
pub const META_SUFFIX: &str = ".meta.json";

/// Metadata recorded for each distinct blob.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobMeta {
    pub content_type: String,
    pub size: u64,
}

/// Reads and writes sidecar records under a store root.
#[derive(Clone, Debug)]
pub struct SidecarStore {
    root: PathBuf,
    staging: Staging,
}

impl SidecarStore {
    pub fn new(root: impl Into<PathBuf>, staging: Staging) -> Self {
        Self {
            root: root.into(),
            staging,
        }
    }

    /// Path of the sidecar for `id`.
    pub fn path(&self, id: &ContentId) -> PathBuf {
        self.root.join(format!("{id}{META_SUFFIX}"))
    }

    /// Write the record for `id`, replacing any previous one.
    pub async fn put_meta(&self, id: &ContentId, meta: &BlobMeta) -> StoreResult<()> {
        let bytes = serde_json::to_vec(meta).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let mut staged = self.staging.create().await?;
        staged.writer().write_all(&bytes).await?;
        staged.commit(&self.path(id)).await
    }

    /// Write the record for `id` only if none exists. Returns `true` if a
    /// record was created.
    pub async fn ensure_meta(&self, id: &ContentId, meta: &BlobMeta) -> StoreResult<bool> {
        if tokio::fs::try_exists(self.path(id)).await? {
            return Ok(false);
        }
        self.put_meta(id, meta).await?;
        Ok(true)
    }

    /// Read the record for `id`.
    ///
    /// A missing record is `Ok(None)`. A record that fails to parse is also
    /// treated as missing, since it can be rebuilt from a re-put.
    pub async fn get_meta(&self, id: &ContentId) -> StoreResult<Option<BlobMeta>> {
        read_meta(&self.path(id)).await
    }
}

async fn read_meta(path: &Path) -> StoreResult<Option<BlobMeta>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    match serde_json::from_slice(&bytes) {
        Ok(meta) => Ok(Some(meta)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable sidecar; ignoring");
            Ok(None)
        }
    }
}
