//! Object key parsing.
//!
//! A named object lives under a composite key of the form `bucket/key`:
//!
//! - the bucket is everything before the first `/` and must be non-empty
//! - the key is everything after it, may itself contain `/`, and must be
//!   non-empty
//!
//! The composite string is used verbatim as the index key.

use std::fmt;

use crate::error::TypeError;

/// Separator between the bucket and the key.
pub const SEPARATOR: char = '/';

/// A validated `bucket/key` name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    composite: String,
    split: usize,
}

impl ObjectKey {
    /// Build a key from its two segments.
    ///
    /// The bucket must not contain the separator, otherwise the composite
    /// string would decompose differently than it was built.
    pub fn new(bucket: &str, key: &str) -> Result<Self, TypeError> {
        let composite = format!("{bucket}{SEPARATOR}{key}");
        if bucket.is_empty() {
            return Err(malformed(composite, "bucket must not be empty"));
        }
        if bucket.contains(SEPARATOR) {
            return Err(malformed(composite, "bucket must not contain '/'"));
        }
        if key.is_empty() {
            return Err(malformed(composite, "key must not be empty"));
        }
        Ok(Self {
            split: bucket.len(),
            composite,
        })
    }

    /// Parse a request path (without the leading `/`) on the first separator.
    ///
    /// # Examples
    ///
    /// ```
    /// use cas_types::ObjectKey;
    ///
    /// let key = ObjectKey::parse("photos/2024/cat.png").unwrap();
    /// assert_eq!(key.bucket(), "photos");
    /// assert_eq!(key.key(), "2024/cat.png");
    /// assert!(ObjectKey::parse("photos").is_err());
    /// assert!(ObjectKey::parse("photos/").is_err());
    /// ```
    pub fn parse(path: &str) -> Result<Self, TypeError> {
        match path.split_once(SEPARATOR) {
            Some((bucket, key)) => Self::new(bucket, key),
            None => Err(malformed(path.to_string(), "expected bucket/key")),
        }
    }

    /// The bucket segment.
    pub fn bucket(&self) -> &str {
        &self.composite[..self.split]
    }

    /// The key segment.
    pub fn key(&self) -> &str {
        &self.composite[self.split + 1..]
    }

    /// The composite `bucket/key` string.
    pub fn as_str(&self) -> &str {
        &self.composite
    }

    /// Index key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.composite.as_bytes()
    }
}

fn malformed(key: String, reason: &'static str) -> TypeError {
    TypeError::MalformedKey { key, reason }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.composite)
    }
}
