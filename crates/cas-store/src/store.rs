use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bytes::Bytes;
use cas_types::ContentId;
use futures_util::Stream;
use tokio::fs::File;
use tracing::{debug, info, warn};

use crate::atomic::{self, Published, Staging};
use crate::error::{StoreError, StoreResult};
use crate::ingest::{self, Ingested};
use crate::sidecar::{BlobMeta, SidecarStore};
use crate::sniff::OCTET_STREAM;

/// Name of the staging directory under the store root.
pub const STAGING_DIR: &str = "tmp";

/// File name suffix for blobs.
pub const BLOB_SUFFIX: &str = ".blob";

/// An open blob ready to be served.
#[derive(Debug)]
pub struct BlobHandle {
    pub id: ContentId,
    pub file: File,
    /// Media type from the sidecar, or `application/octet-stream`.
    pub content_type: String,
    /// Length of the blob file.
    pub size: u64,
    /// Modification time of the blob file.
    pub modified: SystemTime,
}

/// Filesystem content store.
///
/// Layout under `root`:
///
/// ```text
/// <id>.blob        blob bytes
/// <id>.meta.json   sidecar metadata
/// tmp/             staging area
/// ```
///
/// The store holds no locks. Publication of a blob is a single atomic rename
/// out of `tmp/`, so any number of tasks (or processes) may share a root.
#[derive(Clone)]
pub struct ContentStore {
    root: PathBuf,
    staging: Staging,
    sidecars: SidecarStore,
}

impl ContentStore {
    /// Open (or create) a store rooted at `root`.
    pub async fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        let staging_dir = root.join(STAGING_DIR);
        tokio::fs::create_dir_all(&staging_dir).await?;

        let staging = Staging::new(staging_dir);
        let sidecars = SidecarStore::new(root.clone(), staging.clone());
        info!(path = %root.display(), "opened content store");
        Ok(Self {
            root,
            staging,
            sidecars,
        })
    }

    /// The store root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The staging directory.
    pub fn staging_dir(&self) -> &Path {
        self.staging.dir()
    }

    /// Path where the blob for `id` lives once published.
    pub fn blob_path(&self, id: &ContentId) -> PathBuf {
        self.root.join(format!("{id}{BLOB_SUFFIX}"))
    }

    /// Path of the sidecar record for `id`.
    pub fn meta_path(&self, id: &ContentId) -> PathBuf {
        self.sidecars.path(id)
    }

    /// Sidecar records for this store.
    pub fn sidecars(&self) -> &SidecarStore {
        &self.sidecars
    }

    /// Ingest `input` and return its address.
    ///
    /// The result is the same whether the bytes were new or already stored.
    /// When they were already stored nothing is rewritten, but a missing
    /// sidecar is recreated from this upload.
    pub async fn put<S, E>(&self, input: S) -> StoreResult<Ingested>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: fmt::Display,
    {
        let mut staged = self.staging.create().await?;
        let ingested = ingest::process(input, staged.writer()).await?;

        let id = ingested.id;
        let meta = BlobMeta {
            content_type: ingested.content_type.clone(),
            size: ingested.size,
        };

        match atomic::publish(staged, &self.blob_path(&id)).await? {
            Published::Fresh => {
                self.sidecars.put_meta(&id, &meta).await?;
                info!(%id, size = ingested.size, content_type = %ingested.content_type, "stored blob");
            }
            Published::Existing => {
                if self.sidecars.ensure_meta(&id, &meta).await? {
                    warn!(%id, "blob had no sidecar; recreated");
                }
                debug!(%id, "blob already stored");
            }
        }
        Ok(ingested)
    }

    /// Whether a blob for `id` has been published.
    pub async fn contains(&self, id: &ContentId) -> StoreResult<bool> {
        Ok(tokio::fs::try_exists(self.blob_path(id)).await?)
    }

    /// Open the blob for `id`.
    ///
    /// The size and modification time always come from the file itself. The
    /// media type comes from the sidecar; a missing or unreadable sidecar
    /// falls back to `application/octet-stream`.
    pub async fn get(&self, id: &ContentId) -> StoreResult<BlobHandle> {
        let file = match File::open(self.blob_path(id)).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(StoreError::NotFound(*id)),
            Err(e) => return Err(e.into()),
        };
        let fs_meta = file.metadata().await?;

        let content_type = match self.sidecars.get_meta(id).await {
            Ok(Some(meta)) if !meta.content_type.is_empty() => meta.content_type,
            Ok(_) => OCTET_STREAM.to_string(),
            Err(e) => {
                warn!(%id, error = %e, "sidecar read failed; serving as binary");
                OCTET_STREAM.to_string()
            }
        };

        Ok(BlobHandle {
            id: *id,
            file,
            content_type,
            size: fs_meta.len(),
            modified: fs_meta.modified()?,
        })
    }
}

impl fmt::Debug for ContentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentStore")
            .field("root", &self.root)
            .finish()
    }
}
