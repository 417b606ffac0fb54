//! Conditional and byte-range aware static file serving
//!
//! Resolves request targets inside one directory and answers GET/HEAD with
//! validators, conditional evaluation (`If-Match`, `If-None-Match`,
//! `If-Modified-Since`, `If-Unmodified-Since`, `If-Range`) and
//! `multipart/byteranges` partial content.
//!
//! [`handler::StaticHandler`] is the engine; it writes to any
//! [`handler::ResponseSink`]. The `server` module runs it behind hyper.

pub mod config;
pub mod handler;
pub mod http;
pub mod logger;
pub mod metadata;
pub mod routing;
pub mod server;

pub use handler::{FetchRequest, Settings, StaticHandler};
