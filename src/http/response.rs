//! HTTP response building module
//!
//! Header sets shared by every outcome, plus small builders for the
//! responses the server adapter answers without touching the filesystem.

use super::cache::CachePolicy;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty, Full};
use hyper::body::Bytes;
use hyper::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT_RANGES, ALLOW, CACHE_CONTROL, CONTENT_LENGTH,
    CONTENT_RANGE, CONTENT_TYPE, ETAG, LAST_MODIFIED,
};
use hyper::{Response, StatusCode};
use std::io;

/// Body type produced by the server adapter
pub type ServeBody = BoxBody<Bytes, io::Error>;

const ALLOWED_METHODS: &str = "GET, HEAD, OPTIONS";

/// The header set every engine response is built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderSet<'a> {
    /// `bytes` when ranges may be requested, `none` otherwise
    pub accept_ranges: &'static str,
    pub cache: CachePolicy,
    pub content_length: u64,
    pub content_type: &'a str,
    pub etag: Option<&'a str>,
    pub last_modified: Option<&'a str>,
    pub content_range: Option<String>,
}

impl<'a> HeaderSet<'a> {
    /// Headers for a cacheable representation of a resource
    pub const fn representation(
        content_length: u64,
        content_type: &'a str,
        etag: &'a str,
        last_modified: &'a str,
    ) -> Self {
        Self {
            accept_ranges: "bytes",
            cache: CachePolicy::Public,
            content_length,
            content_type,
            etag: Some(etag),
            last_modified: Some(last_modified),
            content_range: None,
        }
    }

    /// Headers for 404, 412 and 416: nothing stored, no ranges offered
    pub const fn refusal(default_type: &'a str) -> Self {
        Self {
            accept_ranges: "none",
            cache: CachePolicy::NoStore,
            content_length: 0,
            content_type: default_type,
            etag: None,
            last_modified: None,
            content_range: None,
        }
    }

    /// Render into a header map
    ///
    /// Values that are not valid header text (e.g. a misconfigured content
    /// type) are skipped and logged rather than failing the response.
    pub fn into_header_map(self) -> HeaderMap {
        let mut map = HeaderMap::with_capacity(7);
        map.insert(ACCEPT_RANGES, HeaderValue::from_static(self.accept_ranges));
        map.insert(
            CACHE_CONTROL,
            HeaderValue::from_static(self.cache.to_header_value()),
        );
        map.insert(CONTENT_LENGTH, HeaderValue::from(self.content_length));
        insert_text(&mut map, CONTENT_TYPE, self.content_type);
        if let Some(etag) = self.etag {
            insert_text(&mut map, ETAG, etag);
        }
        if let Some(last_modified) = self.last_modified {
            insert_text(&mut map, LAST_MODIFIED, last_modified);
        }
        if let Some(content_range) = self.content_range {
            insert_text(&mut map, CONTENT_RANGE, &content_range);
        }
        map
    }
}

fn insert_text(map: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            map.insert(name, v);
        }
        Err(e) => log_build_error(name.as_str(), &e.to_string()),
    }
}

/// An empty body
pub fn empty_body() -> ServeBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed()
}

/// A complete in-memory body
pub fn full_body(data: impl Into<Bytes>) -> ServeBody {
    Full::new(data.into()).map_err(|never| match never {}).boxed()
}

/// Build 405 Method Not Allowed response
pub fn build_405_response() -> Response<ServeBody> {
    Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .header(CONTENT_TYPE, "text/plain")
        .header(ALLOW, ALLOWED_METHODS)
        .body(full_body("405 Method Not Allowed"))
        .unwrap_or_else(|e| {
            log_build_error("405", &e.to_string());
            Response::new(empty_body())
        })
}

/// Build OPTIONS response
pub fn build_options_response() -> Response<ServeBody> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header(ALLOW, ALLOWED_METHODS)
        .body(empty_body())
        .unwrap_or_else(|e| {
            log_build_error("OPTIONS", &e.to_string());
            Response::new(empty_body())
        })
}

/// Build 500 response for when the engine ends without producing a head
pub fn build_500_response() -> Response<ServeBody> {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(CONTENT_TYPE, "text/plain")
        .header(CACHE_CONTROL, "no-store")
        .body(full_body("500 Internal Server Error"))
        .unwrap_or_else(|e| {
            log_build_error("500", &e.to_string());
            Response::new(empty_body())
        })
}

/// Log response build error
fn log_build_error(what: &str, error: &str) {
    crate::logger::log_error(&format!("Failed to build {what} response: {error}"));
}
