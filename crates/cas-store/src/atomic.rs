//! Staged writes published by atomic rename.
//!
//! Every write goes to a uniquely named file in the staging directory, which
//! lives under the store root so that the final rename never crosses a volume.
//! The rename is the only commit point: the destination path either does not
//! exist or holds the complete, synced content.
//!
//! A [`StagedFile`] owns its temp path. Dropping it on any error path, or
//! dropping the future that holds it, removes the file.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::StoreResult;

/// Staging area for in-flight writes.
#[derive(Clone, Debug)]
pub struct Staging {
    dir: PathBuf,
}

impl Staging {
    /// Staging area rooted at `dir`. The directory must already exist.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The staging directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create a new uniquely named staging file.
    pub async fn create(&self) -> StoreResult<StagedFile> {
        let dir = self.dir.clone();
        let tmp = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new()
                .prefix("put-")
                .suffix(".tmp")
                .tempfile_in(&dir)
        })
        .await
        .map_err(io::Error::other)??;
        let (file, path) = tmp.into_parts();
        Ok(StagedFile {
            file: File::from_std(file),
            path,
        })
    }
}

/// A temp file being written. Removed on drop unless committed.
#[derive(Debug)]
pub struct StagedFile {
    file: File,
    path: TempPath,
}

/// Whether [`publish`] wrote the destination or found it already present.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Published {
    Fresh,
    Existing,
}

impl StagedFile {
    /// Write handle for the staged content.
    pub fn writer(&mut self) -> &mut File {
        &mut self.file
    }

    /// Location of the staged file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sync, close and atomically rename onto `dest`, replacing any file
    /// already there.
    pub async fn commit(self, dest: &Path) -> StoreResult<()> {
        let StagedFile { mut file, path } = self;
        file.flush().await?;
        file.sync_all().await?;
        // Wait for in-flight operations and close the descriptor before the
        // rename.
        drop(file.into_std().await);

        let target = dest.to_path_buf();
        tokio::task::spawn_blocking(move || path.persist(&target))
            .await
            .map_err(io::Error::other)?
            .map_err(|e| e.error)?;

        if let Some(parent) = dest.parent() {
            sync_dir(parent).await;
        }
        Ok(())
    }
}

/// Publish `staged` under `dest` unless `dest` already exists.
///
/// Content addressing makes an existing destination definitionally identical
/// to the staged bytes, so the existence check skips the sync and rename
/// entirely. A concurrent publisher may still win between the check and the
/// rename; if the rename fails and `dest` exists afterwards, the other
/// publisher's copy stands and this one reports [`Published::Existing`].
pub async fn publish(staged: StagedFile, dest: &Path) -> StoreResult<Published> {
    if tokio::fs::try_exists(dest).await? {
        debug!(dest = %dest.display(), "destination exists; discarding staged copy");
        return Ok(Published::Existing);
    }

    match staged.commit(dest).await {
        Ok(()) => Ok(Published::Fresh),
        Err(e) if tokio::fs::try_exists(dest).await.unwrap_or(false) => {
            debug!(dest = %dest.display(), error = %e, "lost publish race");
            Ok(Published::Existing)
        }
        Err(e) => Err(e),
    }
}

/// Best-effort fsync of a directory so a completed rename survives a crash.
async fn sync_dir(dir: &Path) {
    #[cfg(unix)]
    {
        let dir = dir.to_path_buf();
        let res = tokio::task::spawn_blocking(move || std::fs::File::open(&dir)?.sync_all()).await;
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "directory sync failed"),
            Err(e) => warn!(error = %e, "directory sync task failed"),
        }
    }
    #[cfg(not(unix))]
    let _ = dir;
}
