//! Key index for the cas object store.
//!
//! Maps human-chosen `bucket/key` names onto content digests held by a
//! [`cas_store::ContentStore`]. The index never stores blob bytes; an entry
//! is a small JSON record pointing at a blob by digest.
//!
//! # Key Types
//!
//! - [`IndexBackend`] -- Ordered byte-keyed store with single-record transactions
//! - [`SledBackend`] -- Persistent backend on a sled tree
//! - [`InMemoryBackend`] -- `BTreeMap` backend for tests and embedding
//! - [`KeyIndex`] -- Typed access to [`IndexEntry`] records
//! - [`NamedObjects`] -- Put/get/head/delete of objects by name

pub mod backend;
pub mod entry;
pub mod error;
pub mod index;
pub mod named;

pub use backend::{InMemoryBackend, IndexBackend, SledBackend, OBJECTS_TREE};
pub use entry::IndexEntry;
pub use error::{IndexError, IndexResult, NamedError, NamedResult};
pub use index::KeyIndex;
pub use named::{NamedObject, NamedObjects};
