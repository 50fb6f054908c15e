//! Index entry records.

use cas_types::{ContentId, ObjectKey};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// What the index knows about one named object.
///
/// Serialized as `{"sha", "size", "content_type", "mod_time"}`. The key is
/// not part of the record; it is the record's address in the backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    #[serde(skip)]
    pub key: String,
    #[serde(rename = "sha")]
    pub digest: ContentId,
    pub size: u64,
    #[serde(rename = "content_type")]
    pub media_type: String,
    #[serde(rename = "mod_time")]
    pub modified_at: DateTime<Utc>,
}

impl IndexEntry {
    /// A fresh entry for `key`, stamped with the current time.
    pub fn new(key: &ObjectKey, digest: ContentId, size: u64, media_type: impl Into<String>) -> Self {
        Self {
            key: key.as_str().to_string(),
            digest,
            size,
            media_type: media_type.into(),
            // HTTP dates carry whole seconds.
            modified_at: Utc::now().trunc_subsecs(0),
        }
    }
}
