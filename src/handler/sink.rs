//! Response sink abstraction
//!
//! The engine writes a response as: one head (status + headers), zero or more
//! body chunks, then `end`. Transports implement [`ResponseSink`]; the
//! in-memory [`BufferedSink`] collects everything for inspection.

use hyper::body::Bytes;
use hyper::header::HeaderMap;
use hyper::StatusCode;
use std::future::Future;
use thiserror::Error;

/// The peer can no longer receive the response
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("response sink closed")]
    Closed,
    #[error("response head already written")]
    HeadWritten,
    #[error("body written before response head")]
    NoHead,
}

/// Destination for one response
pub trait ResponseSink: Send {
    /// Write status line and headers; called at most once
    fn write_head(
        &mut self,
        status: StatusCode,
        headers: HeaderMap,
    ) -> impl Future<Output = Result<(), SinkError>> + Send;

    /// Write one chunk of body
    fn write_body(&mut self, chunk: Bytes) -> impl Future<Output = Result<(), SinkError>> + Send;

    /// Finish the response
    fn end(&mut self) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// Collects a whole response in memory
#[derive(Debug, Default)]
pub struct BufferedSink {
    pub status: Option<StatusCode>,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub chunks: usize,
    pub ended: bool,
}

impl BufferedSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether anything at all was written
    pub fn is_untouched(&self) -> bool {
        self.status.is_none() && self.body.is_empty() && !self.ended
    }

    /// Header value as text, for assertions and logging
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl ResponseSink for BufferedSink {
    async fn write_head(&mut self, status: StatusCode, headers: HeaderMap) -> Result<(), SinkError> {
        if self.status.is_some() {
            return Err(SinkError::HeadWritten);
        }
        self.status = Some(status);
        self.headers = headers;
        Ok(())
    }

    async fn write_body(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        if self.status.is_none() {
            return Err(SinkError::NoHead);
        }
        if self.ended {
            return Err(SinkError::Closed);
        }
        self.body.extend_from_slice(&chunk);
        self.chunks += 1;
        Ok(())
    }

    async fn end(&mut self) -> Result<(), SinkError> {
        if self.status.is_none() {
            return Err(SinkError::NoHead);
        }
        self.ended = true;
        Ok(())
    }
}
