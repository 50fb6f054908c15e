//! Foundation types for cas.
//!
//! Every other cas crate depends on `cas-types`. The types here are the two
//! identifiers a client can hand to the store:
//!
//! - [`ContentId`] -- SHA-256 digest of a blob's exact bytes, rendered as 64
//!   lowercase hex characters
//! - [`ObjectKey`] -- a caller-chosen `bucket/key` name resolved through the
//!   key index
//!
//! Both are parsed, never trusted: a value of either type is syntactically
//! valid by construction, so it is safe to turn into a filesystem path or an
//! index key.

pub mod error;
pub mod key;
pub mod object;

pub use error::TypeError;
pub use key::ObjectKey;
pub use object::ContentId;
