//! Conditional request evaluation
//!
//! Implements the RFC 7232 precedence between `If-Match`, `If-Unmodified-Since`,
//! `If-None-Match`, `If-Modified-Since` and the RFC 7233 `If-Range` gate.
//!
//! Validators are compared by exact string equality. Weak and strong forms of
//! the same token never match each other.

use super::cache::{parse_http_date, to_http_precision};
use hyper::header::{
    HeaderMap, HeaderName, IF_MATCH, IF_MODIFIED_SINCE, IF_NONE_MATCH, IF_RANGE,
    IF_UNMODIFIED_SINCE, RANGE,
};
use std::time::SystemTime;

/// The request headers this engine reacts to, captured once per request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionalHeaders {
    pub if_match: Option<String>,
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<String>,
    pub if_unmodified_since: Option<String>,
    pub if_range: Option<String>,
    pub range: Option<String>,
}

impl ConditionalHeaders {
    /// Capture the recognized headers from a header map
    ///
    /// Presence is what matters: a value that is not valid UTF-8 is kept
    /// (lossily decoded) so that it can still fail a comparison.
    pub fn from_header_map(headers: &HeaderMap) -> Self {
        let get = |name: &HeaderName| {
            headers
                .get(name)
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        };
        Self {
            if_match: get(&IF_MATCH),
            if_none_match: get(&IF_NONE_MATCH),
            if_modified_since: get(&IF_MODIFIED_SINCE),
            if_unmodified_since: get(&IF_UNMODIFIED_SINCE),
            if_range: get(&IF_RANGE),
            range: get(&RANGE),
        }
    }
}

/// Result of evaluating the preconditions against the current representation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    /// 412: a stated precondition does not hold
    PreconditionFailed,
    /// 304: the client's copy is current
    NotModified,
    /// Serve the representation; `use_range` gates Range processing
    Proceed { use_range: bool },
}

/// Current state of the selected representation
#[derive(Debug, Clone, Copy)]
pub struct Validators<'a> {
    pub etag: &'a str,
    /// Formatted `Last-Modified` value, matched verbatim by `If-Range`
    pub last_modified: &'a str,
    pub modified: SystemTime,
}

/// Evaluate the conditional headers in fixed precedence order
///
/// 1. `If-Match` mismatch, or else `If-Unmodified-Since` earlier than
///    the modification time, fails the precondition
/// 2. `If-None-Match` match, or else `If-Modified-Since` not earlier than
///    the modification time, means not modified
/// 3. `Range` is honored only when `If-Range` is absent or matches the
///    current `ETag` or `Last-Modified` value exactly
pub fn evaluate(headers: &ConditionalHeaders, current: &Validators<'_>) -> Evaluation {
    let modified = to_http_precision(current.modified);

    if let Some(if_match) = &headers.if_match {
        if if_match != current.etag {
            return Evaluation::PreconditionFailed;
        }
    } else if let Some(since) = headers.if_unmodified_since.as_deref().and_then(parse_http_date) {
        if since < modified {
            return Evaluation::PreconditionFailed;
        }
    }

    if let Some(if_none_match) = &headers.if_none_match {
        if if_none_match == current.etag {
            return Evaluation::NotModified;
        }
    } else if let Some(since) = headers.if_modified_since.as_deref().and_then(parse_http_date) {
        if since >= modified {
            return Evaluation::NotModified;
        }
    }

    let range_allowed = headers
        .if_range
        .as_deref()
        .is_none_or(|tag| tag == current.etag || tag == current.last_modified);

    Evaluation::Proceed {
        use_range: headers.range.is_some() && range_allowed,
    }
}
