//! Conditional request evaluation for object reads.
//!
//! Precedence follows RFC 9110 §13.2.2: `If-Match`, then
//! `If-Unmodified-Since`, then `If-None-Match`, then `If-Modified-Since`.
//! `If-Range` is evaluated last and only decides whether a `Range` header is
//! honored.

use axum::http::{header, HeaderMap};
use chrono::{DateTime, SubsecRound, Utc};

const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Outcome of evaluating a read's preconditions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Precondition {
    /// Serve the object. `honor_range` is false when `If-Range` failed.
    Proceed { honor_range: bool },
    /// 304.
    NotModified,
    /// 412.
    Failed,
}

/// Format a timestamp as an IMF-fixdate.
pub fn http_date(t: DateTime<Utc>) -> String {
    t.format(HTTP_DATE).to_string()
}

/// Parse an IMF-fixdate (or any RFC 2822 date).
pub fn parse_http_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(s.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Quoted entity tag for a digest.
pub fn etag_for(digest: &impl std::fmt::Display) -> String {
    format!("\"{digest}\"")
}

/// Evaluate the conditional headers of a GET or HEAD against the object's
/// current validators.
pub fn evaluate(headers: &HeaderMap, etag: &str, last_modified: DateTime<Utc>) -> Precondition {
    let last_modified = last_modified.trunc_subsecs(0);

    if let Some(list) = header_str(headers, header::IF_MATCH) {
        if !etag_list_matches(list, etag, false) {
            return Precondition::Failed;
        }
    } else if let Some(since) = header_date(headers, header::IF_UNMODIFIED_SINCE) {
        if last_modified > since {
            return Precondition::Failed;
        }
    }

    if let Some(list) = header_str(headers, header::IF_NONE_MATCH) {
        if etag_list_matches(list, etag, true) {
            return Precondition::NotModified;
        }
    } else if let Some(since) = header_date(headers, header::IF_MODIFIED_SINCE) {
        if last_modified <= since {
            return Precondition::NotModified;
        }
    }

    let honor_range = match header_str(headers, header::IF_RANGE) {
        None => true,
        Some(v) if v.trim_start().starts_with('"') => strong_eq(v.trim(), etag),
        Some(v) => parse_http_date(v) == Some(last_modified),
    };
    Precondition::Proceed { honor_range }
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn header_date(headers: &HeaderMap, name: header::HeaderName) -> Option<DateTime<Utc>> {
    header_str(headers, name).and_then(parse_http_date)
}

fn etag_list_matches(list: &str, etag: &str, weak: bool) -> bool {
    list.split(',').map(str::trim).any(|candidate| {
        candidate == "*"
            || if weak {
                weak_eq(candidate, etag)
            } else {
                strong_eq(candidate, etag)
            }
    })
}

fn strong_eq(a: &str, b: &str) -> bool {
    !a.starts_with("W/") && !b.starts_with("W/") && a == b
}

fn weak_eq(a: &str, b: &str) -> bool {
    a.trim_start_matches("W/") == b.trim_start_matches("W/")
}
