//! `Range` request handling.
//!
//! Only single byte ranges are served as partial content. A request listing
//! several ranges gets the whole object.

/// An inclusive byte range within an object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` value for this range of an object of `total` bytes.
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{total}", self.start, self.end)
    }
}

/// What to send in response to a `Range` header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RangeRequest {
    /// The whole object, status 200.
    Full,
    /// One range, status 206.
    Partial(ByteRange),
    /// Status 416.
    Unsatisfiable,
}

/// `Content-Range` value for a 416 response.
pub fn unsatisfied_range(total: u64) -> String {
    format!("bytes */{total}")
}

/// Resolve a `Range` header value against an object of `size` bytes.
pub fn resolve(header: Option<&str>, size: u64) -> RangeRequest {
    let Some(value) = header else {
        return RangeRequest::Full;
    };
    let Some(spec) = value.trim().strip_prefix("bytes=") else {
        return RangeRequest::Unsatisfiable;
    };
    if spec.contains(',') {
        return RangeRequest::Full;
    }
    match parse_one(spec.trim(), size) {
        Some(range) => RangeRequest::Partial(range),
        None => RangeRequest::Unsatisfiable,
    }
}

fn parse_one(spec: &str, size: u64) -> Option<ByteRange> {
    let (first, last) = spec.split_once('-')?;
    let (first, last) = (first.trim(), last.trim());

    if first.is_empty() {
        // Suffix: the final `n` bytes.
        let n: u64 = last.parse().ok()?;
        if n == 0 || size == 0 {
            return None;
        }
        let n = n.min(size);
        return Some(ByteRange {
            start: size - n,
            end: size - 1,
        });
    }

    let start: u64 = first.parse().ok()?;
    if start >= size {
        return None;
    }
    let end = if last.is_empty() {
        size - 1
    } else {
        let end: u64 = last.parse().ok()?;
        if end < start {
            return None;
        }
        end.min(size - 1)
    };
    Some(ByteRange { start, end })
}
