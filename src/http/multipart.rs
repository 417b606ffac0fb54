//! `multipart/byteranges` body assembly
//!
//! Each requested range becomes one part framed by a shared boundary:
//!
//! ```text
//! --<boundary>
//! Content-Type: <type>
//! Content-Range: bytes <start>-<end>/<size>
//!
//! <bytes>
//! --<boundary>--
//! ```
//!
//! Lines are CRLF-terminated. The whole body is built in memory, so callers
//! bound it with [`RangeLimits`](super::range::RangeLimits) first.

use super::range::RangeSet;
use hyper::body::Bytes;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::io::{self, SeekFrom};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};
use tokio_util::sync::CancellationToken;

const CRLF: &[u8] = b"\r\n";
const BOUNDARY_LEN: usize = 24;

/// Source of multipart boundary tokens
pub trait BoundarySource: Send + Sync {
    /// Produce a token that is unique per response
    fn next_boundary(&self) -> String;
}

/// Random alphanumeric boundaries
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomBoundary;

impl BoundarySource for RandomBoundary {
    fn next_boundary(&self) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(BOUNDARY_LEN)
            .map(char::from)
            .collect()
    }
}

/// Always returns the same boundary (deterministic output for tests and tooling)
#[derive(Debug, Clone)]
pub struct FixedBoundary(pub String);

impl BoundarySource for FixedBoundary {
    fn next_boundary(&self) -> String {
        self.0.clone()
    }
}

/// An assembled `multipart/byteranges` payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartBody {
    pub boundary: String,
    pub content: Bytes,
}

impl MultipartBody {
    /// `Content-Type` header value announcing this body's boundary
    pub fn content_type(&self) -> String {
        format!("multipart/byteranges; boundary={}", self.boundary)
    }

    /// Read every range from `reader` and frame it as one body
    ///
    /// Cancellation is checked before each range is read; a cancelled
    /// request yields `Ok(None)` and no further reads happen.
    pub async fn assemble<R>(
        reader: &mut R,
        ranges: &RangeSet,
        content_type: &str,
        size: u64,
        boundary: String,
        cancel: &CancellationToken,
    ) -> io::Result<Option<Self>>
    where
        R: AsyncRead + AsyncSeek + Unpin,
    {
        let payload = usize::try_from(ranges.total_bytes()).unwrap_or(usize::MAX);
        let mut out = Vec::with_capacity(payload.saturating_add(ranges.ranges().len() * 128));

        for range in ranges.ranges() {
            if cancel.is_cancelled() {
                return Ok(None);
            }

            out.extend_from_slice(format!("--{boundary}").as_bytes());
            out.extend_from_slice(CRLF);
            out.extend_from_slice(format!("Content-Type: {content_type}").as_bytes());
            out.extend_from_slice(CRLF);
            out.extend_from_slice(
                format!("Content-Range: bytes {}-{}/{size}", range.start, range.end).as_bytes(),
            );
            out.extend_from_slice(CRLF);
            out.extend_from_slice(CRLF);

            let len = usize::try_from(range.len())
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "range too large"))?;
            let offset = out.len();
            out.resize(offset + len, 0);
            reader.seek(SeekFrom::Start(range.start)).await?;
            reader.read_exact(&mut out[offset..]).await?;
            out.extend_from_slice(CRLF);
        }

        out.extend_from_slice(format!("--{boundary}--").as_bytes());
        out.extend_from_slice(CRLF);

        Ok(Some(Self {
            boundary,
            content: Bytes::from(out),
        }))
    }
}
