//! Content-addressed blob storage for cas.
//!
//! Blobs are stored as plain files named by the SHA-256 digest of their
//! contents, each with a small JSON sidecar recording its media type and
//! size. Ingestion is a single pass over the input stream that hashes,
//! sniffs and stages the bytes; publication is one atomic rename.
//!
//! # Modules
//!
//! - [`sniff`] -- media type classification from a bounded prefix
//! - [`ingest`] -- the single-pass digest/sniff stream processor
//! - [`atomic`] -- staging files and atomic-rename publication
//! - [`sidecar`] -- per-blob metadata records
//! - [`store`] -- [`ContentStore`], composing the above
//!
//! # Design Rules
//!
//! 1. Blobs are immutable once published (content addressing guarantees this).
//! 2. The rename out of the staging directory is the only commit point.
//! 3. Re-publishing an existing digest is an explicit no-op, not an overwrite.
//! 4. Staging files never outlive the operation that created them.
//! 5. No in-process locks: the filesystem is the concurrency primitive.
//! 6. All I/O errors are propagated, never retried.

pub mod atomic;
pub mod error;
pub mod ingest;
pub mod sidecar;
pub mod sniff;
pub mod store;

pub use atomic::{Published, StagedFile, Staging};
pub use error::{StoreError, StoreResult};
pub use ingest::Ingested;
pub use sidecar::{BlobMeta, SidecarStore};
pub use sniff::{detect_content_type, OCTET_STREAM, SNIFF_LEN};
pub use store::{BlobHandle, ContentStore};
