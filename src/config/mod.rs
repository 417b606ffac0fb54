// Configuration module entry point
// Loads layered configuration and holds the shared runtime state

mod state;
mod types;

use crate::handler::Settings;
use crate::http::mime::ContentTypes;
use crate::http::range::RangeLimits;
use crate::routing::Aliases;
use std::net::SocketAddr;
use std::path::PathBuf;

// Re-export public types
pub use state::{AppState, ReloadError};
pub use types::{
    Config, FilesConfig, LoggingConfig, PathnameAlias, PerformanceConfig, ServerConfig,
};

/// Prefix of environment overrides, e.g. `STATIC_FILES__USE_INDEX=true`
const ENV_PREFIX: &str = "STATIC";

impl Config {
    /// Load configuration from specified file path (extension optional)
    ///
    /// A missing file is not an error; defaults and environment apply.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("files.directory_path", ".")?
            .set_default("files.default_content_type", "application/octet-stream")?
            .set_default("files.use_weak_etags", true)?
            .set_default("files.use_index_page", true)?
            .set_default("files.use_index", false)?
            .set_default("files.max_ranges", 16)?
            .set_default("files.max_range_bytes", 67_108_864)? // 64MB
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

impl FilesConfig {
    /// Engine settings for this section
    pub fn to_settings(&self) -> Settings {
        Settings {
            root: PathBuf::from(&self.directory_path),
            content_types: ContentTypes::with_overrides(
                &self.content_type_by_extensions,
                self.default_content_type.clone(),
            ),
            aliases: Aliases::new(
                self.pathname_aliases
                    .iter()
                    .map(|alias| (alias.from.as_str(), alias.to.as_str())),
            ),
            use_weak_etags: self.use_weak_etags,
            use_index_page: self.use_index_page,
            use_index: self.use_index,
            range_limits: RangeLimits {
                max_ranges: self.max_ranges,
                max_total_bytes: self.max_range_bytes,
            },
        }
    }
}
