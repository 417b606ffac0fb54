// Application state module
// Holds the live handler and configuration; both are swapped wholesale on reload

use arc_swap::ArcSwap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

use super::types::Config;
use crate::handler::StaticHandler;
use crate::logger;

/// Failure to apply a configuration reload; the previous handler stays live
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),
    #[error("failed to build handler: {0}")]
    Io(#[from] io::Error),
}

/// Application state
pub struct AppState {
    pub config: ArcSwap<Config>,
    pub handler: ArcSwap<StaticHandler>,
    /// Where `reload` reads configuration from
    pub config_path: String,

    // Cached config values for fast access without loading the config
    pub cached_access_log: AtomicBool,
}

impl AppState {
    pub fn new(config: Config, handler: StaticHandler, config_path: impl Into<String>) -> Self {
        let cached_access_log = AtomicBool::new(config.logging.access_log);
        Self {
            config: ArcSwap::from_pointee(config),
            handler: ArcSwap::from_pointee(handler),
            config_path: config_path.into(),
            cached_access_log,
        }
    }

    /// Re-read configuration and swap in a freshly built handler
    ///
    /// Requests already running keep the handler they started with.
    /// Listener and logging targets are fixed at startup.
    pub async fn reload(&self) -> Result<(), ReloadError> {
        let config = Config::load_from(&self.config_path)?;
        let handler = StaticHandler::new(config.files.to_settings()).await?;

        self.handler.store(Arc::new(handler));
        self.update_cache(&config);
        self.config.store(Arc::new(config));
        logger::log_info("[Reload] Configuration reloaded, handler swapped");
        Ok(())
    }

    /// Rebuild the metadata index of the current handler
    pub async fn rescan(&self) -> io::Result<Option<usize>> {
        self.handler.load_full().rescan().await
    }

    /// Update cached configuration values
    pub fn update_cache(&self, new_config: &Config) {
        self.cached_access_log
            .store(new_config.logging.access_log, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_config(dir: &tempfile::TempDir, use_index_page: bool) -> String {
        let path = dir.path().join("static.toml");
        let root = dir.path().join("www");
        fs::create_dir_all(&root).unwrap();
        fs::write(
            &path,
            format!(
                "[logging]\naccess_log = false\n\n[files]\ndirectory_path = {:?}\nuse_index_page = {use_index_page}\n",
                root.to_str().unwrap()
            ),
        )
        .unwrap();
        path.to_str().unwrap().to_string()
    }

    async fn build(path: &str) -> AppState {
        let config = Config::load_from(path).unwrap();
        let handler = StaticHandler::new(config.files.to_settings()).await.unwrap();
        AppState::new(config, handler, path)
    }

    #[tokio::test]
    async fn test_reload_swaps_handler() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, true);
        let state = build(&path).await;
        assert!(!state.cached_access_log.load(Ordering::Relaxed));

        let before = state.handler.load_full();
        assert!(before.settings().use_index_page);

        write_config(&dir, false);
        state.reload().await.unwrap();

        assert!(!state.handler.load().settings().use_index_page);
        assert!(!state.config.load().files.use_index_page);
        // The old handler is still usable by whoever holds it
        assert!(before.settings().use_index_page);
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_handler() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, true);
        let state = build(&path).await;

        fs::write(&path, "[files]\nuse_index_page = \"sometimes\"\n").unwrap();
        assert!(state.reload().await.is_err());
        assert!(state.handler.load().settings().use_index_page);
    }

    #[tokio::test]
    async fn test_rescan_without_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, true);
        let state = build(&path).await;
        assert_eq!(state.rescan().await.unwrap(), None);
    }
}
