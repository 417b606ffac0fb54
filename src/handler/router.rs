//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: method validation, header
//! extraction, and handing the request to the static engine. The engine writes
//! into a channel-backed sink; the head becomes the hyper response and body
//! chunks are streamed through [`ChannelBody`].

use super::emitter::ServeError;
use super::engine::FetchRequest;
use super::sink::{ResponseSink, SinkError};
use crate::config::AppState;
use crate::http::{self, ConditionalHeaders, ServeBody};
use crate::logger::{self, AccessLogEntry};
use http_body_util::BodyExt;
use hyper::body::{Body, Bytes, Frame};
use hyper::header::{HeaderMap, HeaderName, CONTENT_LENGTH, REFERER, USER_AGENT};
use hyper::{Method, Request, Response, StatusCode, Uri, Version};
use percent_encoding::percent_decode_str;
use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::{CancellationToken, DropGuard};

/// Body chunks buffered between the engine and hyper
const BODY_CHANNEL_DEPTH: usize = 4;

type Head = (StatusCode, HeaderMap);
type Chunk = Result<Bytes, io::Error>;

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<ServeBody>, Infallible> {
    let started = Instant::now();
    let method = req.method().clone();

    // 1. Check HTTP method
    if let Some(resp) = check_http_method(&method) {
        log_access(&state, &req, peer_addr, resp.status(), 0, started);
        return Ok(resp);
    }

    // 2. Capture request headers the engine reacts to
    let cancel = CancellationToken::new();
    let request = FetchRequest {
        target: decoded_path(req.uri()),
        headers: ConditionalHeaders::from_header_map(req.headers()),
        cancel: cancel.clone(),
        head_only: method == Method::HEAD,
    };

    // Cancels the request if this future or the response body is dropped
    let guard = cancel.clone().drop_guard();

    // 3. Dispatch to the engine against the current handler
    let (head_tx, head_rx) = oneshot::channel();
    let (body_tx, body_rx) = mpsc::channel(BODY_CHANNEL_DEPTH);
    let write_timeout = Duration::from_secs(state.config.load().performance.write_timeout);
    let mut sink = ChannelSink::new(head_tx, body_tx, cancel, write_timeout);
    let handler = state.handler.load_full();

    tokio::spawn(async move {
        match handler.handle(&request, &mut sink).await {
            Ok(()) => {}
            Err(ServeError::Io(e)) => {
                logger::log_error(&format!("Failed to stream '{}': {e}", request.target));
                sink.fail(e).await;
            }
            Err(ServeError::Sink(_)) => {}
        }
    });

    // 4. Build the response from the head
    let response = match head_rx.await {
        Ok((status, headers)) => {
            let mut resp = Response::new(ChannelBody::new(body_rx, guard).boxed());
            *resp.status_mut() = status;
            *resp.headers_mut() = headers;
            resp
        }
        Err(_) => {
            logger::log_error("Request ended without a response head");
            http::response::build_500_response()
        }
    };

    let body_bytes = logged_body_bytes(&method, &response);
    log_access(&state, &req, peer_addr, response.status(), body_bytes, started);

    Ok(response)
}

/// Body size for the access log
///
/// HEAD and every status other than 200/206 carry no body whatever
/// `Content-Length` announces.
fn logged_body_bytes<B>(method: &Method, response: &Response<B>) -> usize {
    let has_body = matches!(response.status(), StatusCode::OK | StatusCode::PARTIAL_CONTENT);
    if *method == Method::HEAD || !has_body {
        return 0;
    }
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

/// Percent-decoded request path; the query plays no part in file lookup
fn decoded_path(uri: &Uri) -> String {
    percent_decode_str(uri.path())
        .decode_utf8_lossy()
        .into_owned()
}

/// Check HTTP method and return appropriate response for non-GET/HEAD methods
fn check_http_method(method: &Method) -> Option<Response<ServeBody>> {
    match *method {
        Method::GET | Method::HEAD => None,
        Method::OPTIONS => Some(http::response::build_options_response()),
        _ => {
            logger::log_warning(&format!("Method not allowed: {method}"));
            Some(http::response::build_405_response())
        }
    }
}

fn log_access<B>(
    state: &AppState,
    req: &Request<B>,
    peer_addr: SocketAddr,
    status: StatusCode,
    body_bytes: usize,
    started: Instant,
) {
    if !state.cached_access_log.load(Ordering::Relaxed) {
        return;
    }

    let header = |name: HeaderName| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };

    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = version_label(req.version()).to_string();
    entry.status = status.as_u16();
    entry.body_bytes = body_bytes;
    entry.referer = header(REFERER);
    entry.user_agent = header(USER_AGENT);
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);

    let config = state.config.load();
    logger::log_access(&entry, &config.logging.access_log_format);
}

const fn version_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}

/// Sink that forwards the head over a oneshot and body chunks over a channel
///
/// A failed send means the response was dropped by hyper; a chunk the
/// client does not take within `write_timeout` counts the same. Either way the
/// request's token is cancelled so the engine stops reading.
struct ChannelSink {
    head: Option<oneshot::Sender<Head>>,
    body: Option<mpsc::Sender<Chunk>>,
    cancel: CancellationToken,
    write_timeout: Duration,
}

impl ChannelSink {
    const fn new(
        head: oneshot::Sender<Head>,
        body: mpsc::Sender<Chunk>,
        cancel: CancellationToken,
        write_timeout: Duration,
    ) -> Self {
        Self {
            head: Some(head),
            body: Some(body),
            cancel,
            write_timeout,
        }
    }

    fn closed(&self) -> SinkError {
        self.cancel.cancel();
        SinkError::Closed
    }

    /// Abort the body so the client sees a truncated transfer, not a short one
    async fn fail(&mut self, error: io::Error) {
        if let Some(body) = self.body.take() {
            let _ = body.send(Err(error)).await;
        }
    }
}

impl ResponseSink for ChannelSink {
    async fn write_head(&mut self, status: StatusCode, headers: HeaderMap) -> Result<(), SinkError> {
        let head = self.head.take().ok_or(SinkError::HeadWritten)?;
        head.send((status, headers)).map_err(|_| self.closed())
    }

    async fn write_body(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        if self.head.is_some() {
            return Err(SinkError::NoHead);
        }
        let body = self.body.as_ref().ok_or(SinkError::Closed)?;
        match tokio::time::timeout(self.write_timeout, body.send(Ok(chunk))).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(self.closed()),
            Err(_) => {
                logger::log_warning(&format!(
                    "Client stalled for {}s, abandoning response",
                    self.write_timeout.as_secs()
                ));
                Err(self.closed())
            }
        }
    }

    async fn end(&mut self) -> Result<(), SinkError> {
        if self.head.is_some() {
            return Err(SinkError::NoHead);
        }
        self.body = None;
        Ok(())
    }
}

/// Response body fed by the engine task
///
/// Holds the request's drop guard: when hyper drops the body (client gone
/// or response finished), the request token is cancelled.
struct ChannelBody {
    rx: mpsc::Receiver<Chunk>,
    _guard: DropGuard,
}

impl ChannelBody {
    const fn new(rx: mpsc::Receiver<Chunk>, guard: DropGuard) -> Self {
        Self { rx, _guard: guard }
    }
}

impl Body for ChannelBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        self.rx
            .poll_recv(cx)
            .map(|chunk| chunk.map(|r| r.map(Frame::data)))
    }
}
