// Configuration types module
// Defines all configuration-related data structures

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub files: FilesConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// `error`, `warn` or `info`; access lines are not filtered by level
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    /// Non-zero enables HTTP/1.1 keep-alive; idle connections are bounded by
    /// `read_timeout` on the next request head, not by this value
    pub keep_alive_timeout: u64,
    /// Seconds allowed for a request head to arrive
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub max_connections: Option<u64>,
}

/// Served directory and engine behavior
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FilesConfig {
    pub directory_path: String,
    pub default_content_type: String,
    /// Extension -> content type, merged over the built-in table
    #[serde(default)]
    pub content_type_by_extensions: HashMap<String, String>,
    /// Exact pathname rewrites applied after normalization
    #[serde(default)]
    pub pathname_aliases: Vec<PathnameAlias>,
    pub use_weak_etags: bool,
    pub use_index_page: bool,
    /// Pre-scan the directory instead of stat-only lookups
    pub use_index: bool,
    pub max_ranges: usize,
    pub max_range_bytes: u64,
}

/// One alias entry, e.g. `{ from = "/", to = "/index.html" }`
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct PathnameAlias {
    pub from: String,
    pub to: String,
}
