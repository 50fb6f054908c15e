//! Objects addressed by `bucket/key` name.
//!
//! [`NamedObjects`] joins a [`ContentStore`] and a [`KeyIndex`]. A named put
//! ingests the bytes into the content store first and only then points the
//! name at the resulting digest, so an index entry never precedes its blob.

use std::fmt;

use bytes::Bytes;
use cas_store::{BlobHandle, ContentStore, StoreError};
use cas_types::ObjectKey;
use futures_util::Stream;
use tracing::{debug, error, info};

use crate::entry::IndexEntry;
use crate::error::{NamedError, NamedResult};
use crate::index::KeyIndex;

/// A resolved named object: its index entry and an open blob.
#[derive(Debug)]
pub struct NamedObject {
    pub entry: IndexEntry,
    pub blob: BlobHandle,
}

/// Put, get and delete objects by name.
#[derive(Clone, Debug)]
pub struct NamedObjects {
    store: ContentStore,
    index: KeyIndex,
}

impl NamedObjects {
    pub fn new(store: ContentStore, index: KeyIndex) -> Self {
        Self { store, index }
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    pub fn index(&self) -> &KeyIndex {
        &self.index
    }

    /// Store `input` and point `key` at it, replacing any previous target.
    pub async fn put_named<S, E>(&self, key: &ObjectKey, input: S) -> NamedResult<IndexEntry>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: fmt::Display,
    {
        let ingested = self.store.put(input).await?;
        let entry = IndexEntry::new(key, ingested.id, ingested.size, ingested.content_type);

        let index = self.index.clone();
        let (k, e) = (key.clone(), entry.clone());
        let prev = tokio::task::spawn_blocking(move || index.put(&k, &e)).await??;

        match prev {
            Some(prev) if prev.digest != entry.digest => {
                info!(%key, from = %prev.digest, to = %entry.digest, "name repointed")
            }
            Some(_) => debug!(%key, digest = %entry.digest, "name refreshed"),
            None => info!(%key, digest = %entry.digest, size = entry.size, "name created"),
        }
        Ok(entry)
    }

    /// Resolve `key` and open its blob.
    pub async fn get_named(&self, key: &ObjectKey) -> NamedResult<NamedObject> {
        let entry = self.lookup(key).await?;
        match self.store.get(&entry.digest).await {
            Ok(blob) => Ok(NamedObject { entry, blob }),
            Err(StoreError::NotFound(id)) => Err(self.missing_blob(key, id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve `key` and confirm its blob is present, without opening it.
    pub async fn head_named(&self, key: &ObjectKey) -> NamedResult<IndexEntry> {
        let entry = self.lookup(key).await?;
        if !self.store.contains(&entry.digest).await? {
            return Err(self.missing_blob(key, entry.digest));
        }
        Ok(entry)
    }

    /// Remove the name. The blob stays in the content store.
    ///
    /// Returns whether the name existed; removing an absent name succeeds.
    pub async fn delete_named(&self, key: &ObjectKey) -> NamedResult<bool> {
        let index = self.index.clone();
        let k = key.clone();
        let existed = tokio::task::spawn_blocking(move || index.delete(&k)).await??;
        if existed {
            info!(%key, "name deleted");
        }
        Ok(existed)
    }

    async fn lookup(&self, key: &ObjectKey) -> NamedResult<IndexEntry> {
        let index = self.index.clone();
        let k = key.clone();
        tokio::task::spawn_blocking(move || index.get(&k))
            .await??
            .ok_or_else(|| NamedError::KeyNotFound(key.to_string()))
    }

    fn missing_blob(&self, key: &ObjectKey, id: cas_types::ContentId) -> NamedError {
        error!(%key, %id, "index entry references missing blob");
        NamedError::MissingBlob {
            key: key.to_string(),
            id,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Arc;

    use cas_types::ContentId;
    use futures_util::stream;
    use tokio::io::AsyncReadExt;

    use super::*;
    use crate::backend::{InMemoryBackend, SledBackend};

    fn once(data: &[u8]) -> impl Stream<Item = Result<Bytes, io::Error>> {
        stream::iter(vec![Ok(Bytes::copy_from_slice(data))])
    }

    fn key(s: &str) -> ObjectKey {
        ObjectKey::parse(s).unwrap()
    }

    async fn setup() -> (tempfile::TempDir, NamedObjects) {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::open(dir.path()).await.unwrap();
        let index = KeyIndex::new(Arc::new(InMemoryBackend::new()));
        (dir, NamedObjects::new(store, index))
    }

    async fn read_all(mut blob: BlobHandle) -> Vec<u8> {
        let mut buf = Vec::new();
        blob.file.read_to_end(&mut buf).await.unwrap();
        buf
    }

    #[tokio::test]
    async fn put_then_get() {
        let (_dir, named) = setup().await;
        let k = key("docs/notes/today.txt");
        let entry = named.put_named(&k, once(b"remember the milk")).await.unwrap();
        assert_eq!(entry.digest, ContentId::from_bytes(b"remember the milk"));
        assert_eq!(entry.size, 17);
        assert_eq!(entry.media_type, "text/plain; charset=utf-8");

        let got = named.get_named(&k).await.unwrap();
        assert_eq!(got.entry, entry);
        assert_eq!(read_all(got.blob).await, b"remember the milk");
    }

    #[tokio::test]
    async fn names_share_one_blob() {
        let (_dir, named) = setup().await;
        let a = named.put_named(&key("b/one"), once(b"shared")).await.unwrap();
        let b = named.put_named(&key("b/two"), once(b"shared")).await.unwrap();
        assert_eq!(a.digest, b.digest);

        let blobs = std::fs::read_dir(named.store().root())
            .unwrap()
            .filter(|e| e.as_ref().unwrap().file_name().to_string_lossy().ends_with(".blob"))
            .count();
        assert_eq!(blobs, 1);
    }

    #[tokio::test]
    async fn overwrite_repoints_name() {
        let (_dir, named) = setup().await;
        let k = key("b/k");
        named.put_named(&k, once(b"first")).await.unwrap();
        named.put_named(&k, once(b"second")).await.unwrap();

        let got = named.get_named(&k).await.unwrap();
        assert_eq!(got.entry.digest, ContentId::from_bytes(b"second"));
        // The old blob is still addressable by digest.
        assert!(named.store().contains(&ContentId::from_bytes(b"first")).await.unwrap());
    }

    #[tokio::test]
    async fn delete_keeps_blob_and_is_idempotent() {
        let (_dir, named) = setup().await;
        let k = key("b/k");
        let entry = named.put_named(&k, once(b"payload")).await.unwrap();

        assert!(named.delete_named(&k).await.unwrap());
        assert!(!named.delete_named(&k).await.unwrap());
        assert!(matches!(named.get_named(&k).await, Err(NamedError::KeyNotFound(_))));
        assert!(named.store().contains(&entry.digest).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_key_is_not_found() {
        let (_dir, named) = setup().await;
        assert!(matches!(named.get_named(&key("b/nope")).await, Err(NamedError::KeyNotFound(k)) if k == "b/nope"));
        assert!(matches!(named.head_named(&key("b/nope")).await, Err(NamedError::KeyNotFound(_))));
    }

    #[tokio::test]
    async fn missing_blob_is_integrity_error() {
        let (_dir, named) = setup().await;
        let k = key("b/k");
        let entry = named.put_named(&k, once(b"soon gone")).await.unwrap();
        std::fs::remove_file(named.store().blob_path(&entry.digest)).unwrap();

        match named.get_named(&k).await {
            Err(NamedError::MissingBlob { key, id }) => {
                assert_eq!(key, "b/k");
                assert_eq!(id, entry.digest);
            }
            other => panic!("expected MissingBlob, got {other:?}"),
        }
        assert!(matches!(named.head_named(&k).await, Err(NamedError::MissingBlob { .. })));
    }

    #[tokio::test]
    async fn failed_upload_leaves_name_untouched() {
        let (_dir, named) = setup().await;
        let k = key("b/k");
        named.put_named(&k, once(b"good")).await.unwrap();

        let parts: Vec<Result<Bytes, io::Error>> = vec![
            Ok(Bytes::from_static(b"bad")),
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "cut")),
        ];
        assert!(matches!(named.put_named(&k, stream::iter(parts)).await, Err(NamedError::Store(_))));
        assert_eq!(named.head_named(&k).await.unwrap().digest, ContentId::from_bytes(b"good"));
    }

    #[tokio::test]
    async fn sled_backed_names_persist() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("index.db");
        let k = key("archive/2024/report.pdf");
        {
            let store = ContentStore::open(dir.path()).await.unwrap();
            let index = KeyIndex::new(Arc::new(SledBackend::open(&db_path).unwrap()));
            NamedObjects::new(store, index)
                .put_named(&k, once(b"%PDF-1.7 ..."))
                .await
                .unwrap();
        }

        let store = ContentStore::open(dir.path()).await.unwrap();
        let index = KeyIndex::new(Arc::new(SledBackend::open(&db_path).unwrap()));
        let named = NamedObjects::new(store, index);
        let entry = named.head_named(&k).await.unwrap();
        assert_eq!(entry.media_type, "application/pdf");
        assert_eq!(entry.key, "archive/2024/report.pdf");
    }
}
