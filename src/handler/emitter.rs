//! Response emitter
//!
//! Translates a decided [`Outcome`] into status, headers and body on a
//! [`ResponseSink`]. Cancellation is checked before the head and before every
//! body chunk; once cancelled, nothing more is written.

use super::sink::{ResponseSink, SinkError};
use crate::http::multipart::MultipartBody;
use crate::http::response::HeaderSet;
use crate::logger;
use hyper::body::Bytes;
use hyper::header::HeaderMap;
use hyper::StatusCode;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

/// Chunk size used when streaming a file body
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Failure while writing a response
#[derive(Debug, Error)]
pub enum ServeError {
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error("failed to stream body: {0}")]
    Io(#[from] io::Error),
}

/// Validator and entity metadata of the selected representation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Representation {
    pub content_type: String,
    pub content_length: u64,
    pub etag: String,
    pub last_modified: String,
}

impl Representation {
    fn headers(&self) -> HeaderSet<'_> {
        HeaderSet::representation(
            self.content_length,
            &self.content_type,
            &self.etag,
            &self.last_modified,
        )
    }
}

/// Terminal decision for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    NotFound,
    PreconditionFailed,
    NotModified(Representation),
    RangeNotSatisfiable { content_length: u64 },
    PartialContent {
        representation: Representation,
        body: MultipartBody,
    },
    NoContent(Representation),
    Ok {
        representation: Representation,
        path: PathBuf,
    },
    /// Generated directory listing
    Listing {
        representation: Representation,
        html: Bytes,
    },
}

impl Outcome {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
            Self::NotModified(_) => StatusCode::NOT_MODIFIED,
            Self::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            Self::PartialContent { .. } => StatusCode::PARTIAL_CONTENT,
            Self::NoContent(_) => StatusCode::NO_CONTENT,
            Self::Ok { .. } | Self::Listing { .. } => StatusCode::OK,
        }
    }
}

/// Writes outcomes to a sink for one request
#[derive(Debug, Clone, Copy)]
pub struct ResponseEmitter<'a> {
    default_type: &'a str,
    cancel: &'a CancellationToken,
    head_only: bool,
}

impl<'a> ResponseEmitter<'a> {
    pub const fn new(default_type: &'a str, cancel: &'a CancellationToken, head_only: bool) -> Self {
        Self {
            default_type,
            cancel,
            head_only,
        }
    }

    /// Emit an outcome; a cancelled request is a silent no-op
    pub async fn emit<S: ResponseSink>(&self, outcome: Outcome, sink: &mut S) -> Result<(), ServeError> {
        if self.cancel.is_cancelled() {
            return Ok(());
        }

        let status = outcome.status();
        match outcome {
            Outcome::NotFound | Outcome::PreconditionFailed => {
                let headers = HeaderSet::refusal(self.default_type).into_header_map();
                self.head_and_end(sink, status, headers).await
            }
            Outcome::RangeNotSatisfiable { content_length } => {
                let mut header_set = HeaderSet::refusal(self.default_type);
                header_set.content_range = Some(format!("bytes */{content_length}"));
                self.head_and_end(sink, StatusCode::RANGE_NOT_SATISFIABLE, header_set.into_header_map())
                    .await
            }
            Outcome::NotModified(ref representation) => {
                let headers = representation.headers().into_header_map();
                self.head_and_end(sink, StatusCode::NOT_MODIFIED, headers).await
            }
            Outcome::NoContent(ref representation) => {
                let mut header_set = representation.headers();
                header_set.content_length = 0;
                self.head_and_end(sink, StatusCode::NO_CONTENT, header_set.into_header_map())
                    .await
            }
            Outcome::PartialContent {
                ref representation,
                body,
            } => {
                let content_type = body.content_type();
                let mut header_set = representation.headers();
                header_set.content_length = body.content.len() as u64;
                header_set.content_type = &content_type;
                let headers = header_set.into_header_map();
                self.head_body_end(sink, StatusCode::PARTIAL_CONTENT, headers, body.content)
                    .await
            }
            Outcome::Listing {
                ref representation,
                html,
            } => {
                let mut header_set = representation.headers();
                header_set.accept_ranges = "none";
                let headers = header_set.into_header_map();
                self.head_body_end(sink, StatusCode::OK, headers, html).await
            }
            Outcome::Ok {
                ref representation,
                ref path,
            } => self.stream_file(sink, representation, path).await,
        }
    }

    async fn head_and_end<S: ResponseSink>(
        &self,
        sink: &mut S,
        status: StatusCode,
        headers: HeaderMap,
    ) -> Result<(), ServeError> {
        sink.write_head(status, headers).await?;
        sink.end().await?;
        Ok(())
    }

    async fn head_body_end<S: ResponseSink>(
        &self,
        sink: &mut S,
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<(), ServeError> {
        sink.write_head(status, headers).await?;
        if !self.head_only {
            if self.cancel.is_cancelled() {
                return Ok(());
            }
            sink.write_body(body).await?;
        }
        sink.end().await?;
        Ok(())
    }

    /// Stream a whole file in bounded chunks
    async fn stream_file<S: ResponseSink>(
        &self,
        sink: &mut S,
        representation: &Representation,
        path: &Path,
    ) -> Result<(), ServeError> {
        if self.head_only {
            let headers = representation.headers().into_header_map();
            return self.head_and_end(sink, StatusCode::OK, headers).await;
        }

        // Open before the head so a vanished file still gets a clean 404
        let file = match File::open(path).await {
            Ok(f) => f,
            Err(e) => {
                logger::log_warning(&format!(
                    "File disappeared before streaming '{}': {e}",
                    path.display()
                ));
                let headers = HeaderSet::refusal(self.default_type).into_header_map();
                return self.head_and_end(sink, StatusCode::NOT_FOUND, headers).await;
            }
        };

        let headers = representation.headers().into_header_map();
        sink.write_head(StatusCode::OK, headers).await?;

        let mut reader = file.take(representation.content_length);
        let mut remaining = representation.content_length;
        let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
        while remaining > 0 {
            if self.cancel.is_cancelled() {
                return Ok(());
            }
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                return Err(ServeError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("'{}' shrank while streaming", path.display()),
                )));
            }
            remaining -= n as u64;
            if self.cancel.is_cancelled() {
                return Ok(());
            }
            sink.write_body(Bytes::copy_from_slice(&buf[..n])).await?;
        }

        sink.end().await?;
        Ok(())
    }
}
