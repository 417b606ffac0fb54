//! Request handler module
//!
//! The static file engine, the response emitter and sinks it writes to, and
//! the hyper adapter that feeds it requests.

pub mod emitter;
pub mod engine;
pub mod listing;
pub mod router;
pub mod sink;

// Re-export main entry points
pub use emitter::{Outcome, Representation, ResponseEmitter, ServeError};
pub use engine::{FetchRequest, Settings, StaticHandler};
pub use router::handle_request;
pub use sink::{BufferedSink, ResponseSink, SinkError};
