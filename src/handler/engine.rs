//! Static file engine
//!
//! The per-request decision engine:
//! resolve path -> stat -> validator -> preconditions -> (ranges) -> outcome.
//! Each request is independent; the only shared state is the optional
//! metadata index, which is swapped wholesale on rescan.

use super::emitter::{Outcome, Representation, ResponseEmitter, ServeError};
use super::listing;
use super::sink::ResponseSink;
use crate::http::cache::{http_date, strong_etag, weak_etag};
use crate::http::conditional::{evaluate, ConditionalHeaders, Evaluation, Validators};
use crate::http::mime::ContentTypes;
use crate::http::multipart::{BoundarySource, MultipartBody, RandomBoundary};
use crate::http::range::{parse_range_header, RangeLimits};
use crate::logger;
use crate::metadata::{MetadataProvider, ResourceDescriptor, ResourceKind};
use crate::routing::{self, Aliases};
use hyper::body::Bytes;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::File;
use tokio_util::sync::CancellationToken;

const LISTING_CONTENT_TYPE: &str = "text/html";

/// Engine configuration, fixed for the lifetime of a handler
#[derive(Debug, Clone)]
pub struct Settings {
    /// Served root directory
    pub root: PathBuf,
    pub content_types: ContentTypes,
    pub aliases: Aliases,
    /// Weak mtime-based validators instead of content hashes
    pub use_weak_etags: bool,
    /// Serve an HTML listing for directories instead of 404
    pub use_index_page: bool,
    /// Pre-scan the root into an index instead of stat-only lookups
    pub use_index: bool,
    pub range_limits: RangeLimits,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            content_types: ContentTypes::default(),
            aliases: Aliases::default(),
            use_weak_etags: true,
            use_index_page: true,
            use_index: false,
            range_limits: RangeLimits::default(),
        }
    }
}

/// One read-only fetch handed over by the transport
#[derive(Debug, Clone, Default)]
pub struct FetchRequest {
    /// Request target: path plus optional query
    pub target: String,
    pub headers: ConditionalHeaders,
    /// Cancelled when the peer goes away
    pub cancel: CancellationToken,
    /// HEAD: decide and send headers, never a body
    pub head_only: bool,
}

impl FetchRequest {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_headers(mut self, headers: ConditionalHeaders) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub const fn head_only(mut self, head_only: bool) -> Self {
        self.head_only = head_only;
        self
    }
}

/// Conditional and range aware handler for one served directory
pub struct StaticHandler {
    settings: Settings,
    metadata: MetadataProvider,
    boundaries: Arc<dyn BoundarySource>,
}

impl std::fmt::Debug for StaticHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticHandler")
            .field("settings", &self.settings)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

impl StaticHandler {
    /// Build a handler; scans the root first when the index is enabled
    pub async fn new(settings: Settings) -> io::Result<Self> {
        let content_types = Arc::new(settings.content_types.clone());
        let metadata = if settings.use_index {
            MetadataProvider::indexed(settings.root.clone(), content_types).await?
        } else {
            MetadataProvider::lazy(settings.root.clone(), content_types)
        };
        Ok(Self {
            settings,
            metadata,
            boundaries: Arc::new(RandomBoundary),
        })
    }

    /// Replace the multipart boundary source
    #[must_use]
    pub fn with_boundary_source(mut self, source: impl BoundarySource + 'static) -> Self {
        self.boundaries = Arc::new(source);
        self
    }

    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    pub const fn metadata(&self) -> &MetadataProvider {
        &self.metadata
    }

    /// Rebuild the metadata index; `None` when running without one
    pub async fn rescan(&self) -> io::Result<Option<usize>> {
        self.metadata.rescan().await
    }

    /// Decide and write the response for one request
    pub async fn handle<S: ResponseSink>(
        &self,
        request: &FetchRequest,
        sink: &mut S,
    ) -> Result<(), ServeError> {
        let Some(outcome) = self.decide(request).await else {
            return Ok(());
        };
        ResponseEmitter::new(
            self.settings.content_types.default_type(),
            &request.cancel,
            request.head_only,
        )
        .emit(outcome, sink)
        .await
    }

    /// Run the decision state machine; `None` means the request was cancelled
    pub async fn decide(&self, request: &FetchRequest) -> Option<Outcome> {
        if request.cancel.is_cancelled() {
            return None;
        }

        let pathname = routing::resolve(&request.target, &self.settings.aliases);
        let descriptor = self.metadata.describe(&pathname).await;

        match descriptor.kind {
            ResourceKind::Missing => Some(Outcome::NotFound),
            ResourceKind::Directory => self.directory(&descriptor, request).await,
            ResourceKind::File => self.file(descriptor, request).await,
        }
    }

    async fn directory(
        &self,
        descriptor: &ResourceDescriptor,
        request: &FetchRequest,
    ) -> Option<Outcome> {
        if !self.settings.use_index_page {
            return Some(Outcome::NotFound);
        }
        if request.cancel.is_cancelled() {
            return None;
        }

        let html = match listing::render_listing(&descriptor.path, &descriptor.pathname).await {
            Ok(html) => html,
            Err(e) => {
                logger::log_warning(&format!(
                    "Failed to list directory '{}': {e}",
                    descriptor.path.display()
                ));
                return Some(Outcome::NotFound);
            }
        };

        Some(Outcome::Listing {
            representation: Representation {
                content_type: LISTING_CONTENT_TYPE.to_string(),
                content_length: html.len() as u64,
                etag: weak_etag(descriptor.modified),
                last_modified: http_date(descriptor.modified),
            },
            html: Bytes::from(html),
        })
    }

    async fn file(&self, descriptor: ResourceDescriptor, request: &FetchRequest) -> Option<Outcome> {
        if request.cancel.is_cancelled() {
            return None;
        }

        let etag = if self.settings.use_weak_etags {
            weak_etag(descriptor.modified)
        } else {
            let hashed = tokio::select! {
                biased;
                () = request.cancel.cancelled() => return None,
                hashed = strong_etag(&descriptor.path) => hashed,
            };
            match hashed {
                Ok(etag) => etag,
                Err(e) => {
                    logger::log_warning(&format!(
                        "Failed to hash '{}': {e}",
                        descriptor.path.display()
                    ));
                    return Some(Outcome::NotFound);
                }
            }
        };
        let last_modified = http_date(descriptor.modified);

        let evaluation = evaluate(
            &request.headers,
            &Validators {
                etag: &etag,
                last_modified: &last_modified,
                modified: descriptor.modified,
            },
        );

        let representation = Representation {
            content_type: descriptor.content_type,
            content_length: descriptor.content_length,
            etag,
            last_modified,
        };

        match evaluation {
            Evaluation::PreconditionFailed => Some(Outcome::PreconditionFailed),
            Evaluation::NotModified => Some(Outcome::NotModified(representation)),
            Evaluation::Proceed { use_range: true } => {
                self.ranges(descriptor.path, representation, request).await
            }
            Evaluation::Proceed { use_range: false } if representation.content_length == 0 => {
                Some(Outcome::NoContent(representation))
            }
            Evaluation::Proceed { use_range: false } => Some(Outcome::Ok {
                representation,
                path: descriptor.path,
            }),
        }
    }

    async fn ranges(
        &self,
        path: PathBuf,
        representation: Representation,
        request: &FetchRequest,
    ) -> Option<Outcome> {
        let size = representation.content_length;
        let header = request.headers.range.as_deref().unwrap_or_default();

        let set = match parse_range_header(header, size, &self.settings.range_limits) {
            Ok(set) => set,
            Err(_) => return Some(Outcome::RangeNotSatisfiable { content_length: size }),
        };

        if request.cancel.is_cancelled() {
            return None;
        }

        // Dropped on every return below, closing the file
        let mut file = match File::open(&path).await {
            Ok(f) => f,
            Err(e) => {
                logger::log_warning(&format!("Failed to open '{}': {e}", path.display()));
                return Some(Outcome::NotFound);
            }
        };

        let assembled = MultipartBody::assemble(
            &mut file,
            &set,
            &representation.content_type,
            size,
            self.boundaries.next_boundary(),
            &request.cancel,
        )
        .await;

        match assembled {
            Ok(Some(body)) => Some(Outcome::PartialContent {
                representation,
                body,
            }),
            Ok(None) => None,
            Err(e) => {
                logger::log_warning(&format!(
                    "Failed to read ranges from '{}': {e}",
                    path.display()
                ));
                Some(Outcome::NotFound)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::sink::BufferedSink;
    use crate::http::multipart::FixedBoundary;
    use hyper::StatusCode;
    use std::fs;
    use std::time::{Duration, SystemTime};

    const BOUNDARY: &str = "TESTBOUNDARY";

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("abc.txt"), "ABCDE").unwrap();
        fs::write(dir.path().join("empty.txt"), "").unwrap();
        fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/data.json"), "{}").unwrap();
        dir
    }

    fn settings(dir: &tempfile::TempDir) -> Settings {
        Settings {
            root: dir.path().to_path_buf(),
            ..Settings::default()
        }
    }

    async fn handler(settings: Settings) -> StaticHandler {
        StaticHandler::new(settings)
            .await
            .unwrap()
            .with_boundary_source(FixedBoundary(BOUNDARY.to_string()))
    }

    async fn fetch(handler: &StaticHandler, request: FetchRequest) -> BufferedSink {
        let mut sink = BufferedSink::new();
        handler.handle(&request, &mut sink).await.unwrap();
        sink
    }

    async fn get(handler: &StaticHandler, target: &str, headers: ConditionalHeaders) -> BufferedSink {
        fetch(handler, FetchRequest::new(target).with_headers(headers)).await
    }

    fn with_range(range: &str) -> ConditionalHeaders {
        ConditionalHeaders {
            range: Some(range.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_full_body() {
        let dir = fixture();
        let h = handler(settings(&dir)).await;
        let resp = get(&h, "/abc.txt?cache=bust", ConditionalHeaders::default()).await;
        assert_eq!(resp.status, Some(StatusCode::OK));
        assert_eq!(resp.body, b"ABCDE");
        assert_eq!(resp.header("content-length"), Some("5"));
        assert_eq!(resp.header("content-type"), Some("text/plain"));
        assert_eq!(resp.header("accept-ranges"), Some("bytes"));
        assert_eq!(resp.header("cache-control"), Some("public"));
        assert!(resp.header("etag").unwrap().starts_with("W/\""));
        assert!(resp.header("last-modified").unwrap().ends_with(" GMT"));
        assert!(resp.ended);
    }

    #[tokio::test]
    async fn test_not_found() {
        let dir = fixture();
        let h = handler(settings(&dir)).await;
        let resp = get(&h, "/missing.txt", ConditionalHeaders::default()).await;
        assert_eq!(resp.status, Some(StatusCode::NOT_FOUND));
        assert_eq!(resp.header("cache-control"), Some("no-store"));
        assert!(resp.body.is_empty());
    }

    #[tokio::test]
    async fn test_traversal_stays_inside_root() {
        let dir = fixture();
        let h = handler(settings(&dir)).await;
        let resp = get(&h, "/../../../../etc/hostname", ConditionalHeaders::default()).await;
        assert_eq!(resp.status, Some(StatusCode::NOT_FOUND));

        let resp = get(&h, "/sub/../../abc.txt", ConditionalHeaders::default()).await;
        assert_eq!(resp.status, Some(StatusCode::OK));
        assert_eq!(resp.body, b"ABCDE");
    }

    #[tokio::test]
    async fn test_alias() {
        let dir = fixture();
        let h = handler(Settings {
            aliases: Aliases::new([("/", "/index.html")]),
            ..settings(&dir)
        })
        .await;
        let resp = get(&h, "/", ConditionalHeaders::default()).await;
        assert_eq!(resp.status, Some(StatusCode::OK));
        assert_eq!(resp.header("content-type"), Some("text/html"));
        assert_eq!(resp.body, b"<h1>home</h1>");
    }

    #[tokio::test]
    async fn test_not_modified_keeps_entity_headers() {
        let dir = fixture();
        let h = handler(settings(&dir)).await;
        let first = get(&h, "/abc.txt", ConditionalHeaders::default()).await;
        let etag = first.header("etag").unwrap().to_string();

        let resp = get(
            &h,
            "/abc.txt",
            ConditionalHeaders {
                if_none_match: Some(etag.clone()),
                ..Default::default()
            },
        )
        .await;
        assert_eq!(resp.status, Some(StatusCode::NOT_MODIFIED));
        assert!(resp.body.is_empty());
        assert_eq!(resp.header("content-length"), Some("5"));
        assert_eq!(resp.header("content-type"), Some("text/plain"));
        assert_eq!(resp.header("etag"), Some(etag.as_str()));
    }

    #[tokio::test]
    async fn test_if_modified_since() {
        let dir = fixture();
        let h = handler(settings(&dir)).await;
        let first = get(&h, "/abc.txt", ConditionalHeaders::default()).await;
        let last_modified = first.header("last-modified").unwrap().to_string();

        let resp = get(
            &h,
            "/abc.txt",
            ConditionalHeaders {
                if_modified_since: Some(last_modified),
                ..Default::default()
            },
        )
        .await;
        assert_eq!(resp.status, Some(StatusCode::NOT_MODIFIED));
    }

    #[tokio::test]
    async fn test_precondition_failed() {
        let dir = fixture();
        let h = handler(settings(&dir)).await;
        let resp = get(
            &h,
            "/abc.txt",
            ConditionalHeaders {
                if_match: Some("\"stale\"".to_string()),
                ..Default::default()
            },
        )
        .await;
        assert_eq!(resp.status, Some(StatusCode::PRECONDITION_FAILED));
        assert_eq!(resp.header("cache-control"), Some("no-store"));
        assert!(resp.body.is_empty());

        let resp = get(
            &h,
            "/abc.txt",
            ConditionalHeaders {
                if_unmodified_since: Some("Thu, 01 Jan 1970 00:00:01 GMT".to_string()),
                ..Default::default()
            },
        )
        .await;
        assert_eq!(resp.status, Some(StatusCode::PRECONDITION_FAILED));
    }

    #[tokio::test]
    async fn test_multipart_ranges() {
        let dir = fixture();
        let h = handler(settings(&dir)).await;
        let resp = get(&h, "/abc.txt", with_range("bytes=0-1,3-4")).await;

        assert_eq!(resp.status, Some(StatusCode::PARTIAL_CONTENT));
        assert_eq!(
            resp.header("content-type"),
            Some("multipart/byteranges; boundary=TESTBOUNDARY")
        );
        let expected = "--TESTBOUNDARY\r\n\
                        Content-Type: text/plain\r\n\
                        Content-Range: bytes 0-1/5\r\n\
                        \r\n\
                        AB\r\n\
                        --TESTBOUNDARY\r\n\
                        Content-Type: text/plain\r\n\
                        Content-Range: bytes 3-4/5\r\n\
                        \r\n\
                        DE\r\n\
                        --TESTBOUNDARY--\r\n";
        assert_eq!(String::from_utf8(resp.body.clone()).unwrap(), expected);
        assert_eq!(
            resp.header("content-length"),
            Some(expected.len().to_string().as_str())
        );
        assert_eq!(resp.header("accept-ranges"), Some("bytes"));
        assert!(resp.header("etag").is_some());
        assert!(resp.header("last-modified").is_some());
    }

    #[tokio::test]
    async fn test_single_byte_range_not_satisfiable() {
        let dir = fixture();
        let h = handler(settings(&dir)).await;
        let resp = get(&h, "/abc.txt", with_range("bytes=0-0")).await;
        assert_eq!(resp.status, Some(StatusCode::RANGE_NOT_SATISFIABLE));
        assert_eq!(resp.header("content-range"), Some("bytes */5"));
        assert_eq!(resp.header("cache-control"), Some("no-store"));
        assert!(resp.body.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_range_not_satisfiable() {
        let dir = fixture();
        let h = handler(settings(&dir)).await;
        for range in ["bytes=0-1,zz", "pages=0-1", "bytes=3-99", "0-1"] {
            let resp = get(&h, "/abc.txt", with_range(range)).await;
            assert_eq!(
                resp.status,
                Some(StatusCode::RANGE_NOT_SATISFIABLE),
                "range {range:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_range_limits_enforced() {
        let dir = fixture();
        let h = handler(Settings {
            range_limits: RangeLimits {
                max_ranges: 1,
                max_total_bytes: 1024,
            },
            ..settings(&dir)
        })
        .await;
        let resp = get(&h, "/abc.txt", with_range("bytes=0-1,3-4")).await;
        assert_eq!(resp.status, Some(StatusCode::RANGE_NOT_SATISFIABLE));
    }

    #[tokio::test]
    async fn test_if_range() {
        let dir = fixture();
        let h = handler(settings(&dir)).await;
        let first = get(&h, "/abc.txt", ConditionalHeaders::default()).await;
        let etag = first.header("etag").unwrap().to_string();
        let last_modified = first.header("last-modified").unwrap().to_string();

        for validator in [etag, last_modified] {
            let resp = get(
                &h,
                "/abc.txt",
                ConditionalHeaders {
                    if_range: Some(validator),
                    ..with_range("bytes=1-3")
                },
            )
            .await;
            assert_eq!(resp.status, Some(StatusCode::PARTIAL_CONTENT));
        }

        // Mismatch: full representation, Range ignored
        let resp = get(
            &h,
            "/abc.txt",
            ConditionalHeaders {
                if_range: Some("\"old\"".to_string()),
                ..with_range("bytes=0-0")
            },
        )
        .await;
        assert_eq!(resp.status, Some(StatusCode::OK));
        assert_eq!(resp.body, b"ABCDE");
    }

    #[tokio::test]
    async fn test_empty_file_is_no_content() {
        let dir = fixture();
        let h = handler(settings(&dir)).await;
        let resp = get(&h, "/empty.txt", ConditionalHeaders::default()).await;
        assert_eq!(resp.status, Some(StatusCode::NO_CONTENT));
        assert_eq!(resp.header("content-length"), Some("0"));
        assert!(resp.header("etag").is_some());
        assert!(resp.body.is_empty());
    }

    #[tokio::test]
    async fn test_directory_listing() {
        let dir = fixture();
        let h = handler(settings(&dir)).await;
        let resp = get(&h, "/sub", ConditionalHeaders::default()).await;
        assert_eq!(resp.status, Some(StatusCode::OK));
        assert_eq!(resp.header("content-type"), Some("text/html"));
        assert_eq!(resp.header("accept-ranges"), Some("none"));
        assert!(resp.header("etag").unwrap().starts_with("W/\""));
        let html = String::from_utf8(resp.body).unwrap();
        assert!(html.contains("<a href=\"/sub/data.json\">data.json</a>"));
    }

    #[tokio::test]
    async fn test_directory_weak_etag_even_in_strong_mode() {
        let dir = fixture();
        let h = handler(Settings {
            use_weak_etags: false,
            ..settings(&dir)
        })
        .await;
        let resp = get(&h, "/", ConditionalHeaders::default()).await;
        assert!(resp.header("etag").unwrap().starts_with("W/\""));
    }

    #[tokio::test]
    async fn test_directory_without_index_page() {
        let dir = fixture();
        let h = handler(Settings {
            use_index_page: false,
            ..settings(&dir)
        })
        .await;
        let resp = get(&h, "/sub", ConditionalHeaders::default()).await;
        assert_eq!(resp.status, Some(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn test_strong_etags() {
        let dir = fixture();
        let h = handler(Settings {
            use_weak_etags: false,
            ..settings(&dir)
        })
        .await;
        let first = get(&h, "/abc.txt", ConditionalHeaders::default()).await;
        let etag = first.header("etag").unwrap().to_string();
        assert!(etag.starts_with('"'));

        let again = get(&h, "/abc.txt", ConditionalHeaders::default()).await;
        assert_eq!(again.header("etag"), Some(etag.as_str()));

        let matched = get(
            &h,
            "/abc.txt",
            ConditionalHeaders {
                if_match: Some(etag.clone()),
                ..Default::default()
            },
        )
        .await;
        assert_eq!(matched.status, Some(StatusCode::OK));

        fs::write(dir.path().join("abc.txt"), "ABCDF").unwrap();
        let changed = get(&h, "/abc.txt", ConditionalHeaders::default()).await;
        assert_ne!(changed.header("etag"), Some(etag.as_str()));
    }

    #[tokio::test]
    async fn test_weak_etag_follows_mtime_not_content() {
        let dir = fixture();
        let h = handler(settings(&dir)).await;
        let path = dir.path().join("abc.txt");
        let pinned = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);

        fs::File::options().write(true).open(&path).unwrap().set_modified(pinned).unwrap();
        let before = get(&h, "/abc.txt", ConditionalHeaders::default()).await;

        fs::write(&path, "VWXYZ").unwrap();
        fs::File::options().write(true).open(&path).unwrap().set_modified(pinned).unwrap();
        let same_mtime = get(&h, "/abc.txt", ConditionalHeaders::default()).await;
        assert_eq!(before.header("etag"), same_mtime.header("etag"));

        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(pinned + Duration::from_secs(1))
            .unwrap();
        let touched = get(&h, "/abc.txt", ConditionalHeaders::default()).await;
        assert_ne!(before.header("etag"), touched.header("etag"));
    }

    #[tokio::test]
    async fn test_head_sends_headers_only() {
        let dir = fixture();
        let h = handler(settings(&dir)).await;
        let resp = fetch(&h, FetchRequest::new("/abc.txt").head_only(true)).await;
        assert_eq!(resp.status, Some(StatusCode::OK));
        assert_eq!(resp.header("content-length"), Some("5"));
        assert!(resp.body.is_empty());
        assert!(resp.ended);
    }

    #[tokio::test]
    async fn test_cancelled_request_writes_nothing() {
        let dir = fixture();
        for weak in [true, false] {
            let h = handler(Settings {
                use_weak_etags: weak,
                ..settings(&dir)
            })
            .await;
            let cancel = CancellationToken::new();
            cancel.cancel();
            let request = FetchRequest::new("/abc.txt")
                .with_headers(with_range("bytes=0-1"))
                .with_cancel(cancel);
            assert!(h.decide(&request).await.is_none());
            let resp = fetch(&h, request).await;
            assert!(resp.is_untouched());
        }
    }

    #[tokio::test]
    async fn test_indexed_mode_and_rescan() {
        let dir = fixture();
        let h = handler(Settings {
            use_index: true,
            ..settings(&dir)
        })
        .await;
        assert_eq!(
            get(&h, "/abc.txt", ConditionalHeaders::default()).await.status,
            Some(StatusCode::OK)
        );

        fs::write(dir.path().join("fresh.txt"), "fresh").unwrap();
        assert_eq!(
            get(&h, "/fresh.txt", ConditionalHeaders::default()).await.status,
            Some(StatusCode::NOT_FOUND)
        );

        assert!(h.rescan().await.unwrap().is_some());
        let resp = get(&h, "/fresh.txt", ConditionalHeaders::default()).await;
        assert_eq!(resp.status, Some(StatusCode::OK));
        assert_eq!(resp.body, b"fresh");
    }

    #[tokio::test]
    async fn test_lazy_mode_rescan_is_noop() {
        let dir = fixture();
        let h = handler(settings(&dir)).await;
        assert_eq!(h.rescan().await.unwrap(), None);
    }
}
