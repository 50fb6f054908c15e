use thiserror::Error;

/// Errors produced when parsing identifiers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid content id: {0:?}")]
    InvalidDigest(String),

    #[error("malformed object key {key:?}: {reason}")]
    MalformedKey { key: String, reason: &'static str },
}
