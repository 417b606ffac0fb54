//! HTTP protocol layer module
//!
//! Provides HTTP protocol-related base functionality, decoupled from the filesystem:
//! validators, conditional evaluation, ranges and response header sets.

pub mod cache;
pub mod conditional;
pub mod mime;
pub mod multipart;
pub mod range;
pub mod response;

// Re-export commonly used types
pub use conditional::{evaluate, ConditionalHeaders, Evaluation, Validators};
pub use multipart::{BoundarySource, FixedBoundary, MultipartBody, RandomBoundary};
pub use range::{parse_range_header, ByteRange, RangeError, RangeLimits, RangeSet};
pub use response::{HeaderSet, ServeBody};
