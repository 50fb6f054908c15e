//! Single-pass ingestion: hash, sniff and forward a byte stream.
//!
//! The stream is read exactly once. Every chunk feeds the SHA-256 state as it
//! arrives. The first [`SNIFF_LEN`] bytes are held back until the media type
//! is decided, then everything is forwarded to the sink unmodified. Memory use
//! is bounded by the sniff prefix plus one chunk regardless of stream length.

use std::fmt;

use bytes::Bytes;
use cas_types::ContentId;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::{StoreError, StoreResult};
use crate::sniff::{detect_content_type, SNIFF_LEN};

/// Outcome of ingesting a stream: what was stored and how to address it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingested {
    /// Digest of the exact bytes consumed.
    pub id: ContentId,
    /// Number of bytes consumed.
    pub size: u64,
    /// Media type classified from the leading bytes.
    pub content_type: String,
}

/// Consume `input`, writing every byte to `sink`.
///
/// Any stream or sink error aborts the operation. The sink is flushed before
/// returning but not synced; durability is the caller's concern.
pub async fn process<S, E, W>(input: S, sink: &mut W) -> StoreResult<Ingested>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: fmt::Display,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut input = std::pin::pin!(input);
    let mut hasher = Sha256::new();
    let mut size: u64 = 0;
    let mut prefix: Vec<u8> = Vec::with_capacity(SNIFF_LEN);
    let mut content_type: Option<&'static str> = None;

    while let Some(chunk) = input.next().await {
        let chunk = chunk.map_err(|e| StoreError::Stream(e.to_string()))?;
        if chunk.is_empty() {
            continue;
        }
        hasher.update(&chunk);
        size += chunk.len() as u64;

        if content_type.is_some() {
            sink.write_all(&chunk).await?;
            continue;
        }

        let take = (SNIFF_LEN - prefix.len()).min(chunk.len());
        prefix.extend_from_slice(&chunk[..take]);
        if prefix.len() == SNIFF_LEN {
            content_type = Some(detect_content_type(&prefix));
            sink.write_all(&prefix).await?;
            sink.write_all(&chunk[take..]).await?;
        }
    }

    // Streams shorter than the sniff window are classified on what arrived.
    let content_type = match content_type {
        Some(ct) => ct,
        None => {
            sink.write_all(&prefix).await?;
            detect_content_type(&prefix)
        }
    };
    sink.flush().await?;

    Ok(Ingested {
        id: ContentId::from_hash(hasher.finalize().into()),
        size,
        content_type: content_type.to_string(),
    })
}
