use static_handler::config::{AppState, Config};
use static_handler::handler::StaticHandler;
use static_handler::{logger, server};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Config file used when no path is given (extension optional)
const DEFAULT_CONFIG_PATH: &str = "config";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let cfg = Config::load_from(&config_path)?;
    logger::init(&cfg)?;

    // Build the Tokio runtime, sizing workers from configuration
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg, config_path))
}

async fn async_main(cfg: Config, config_path: String) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;
    let listener = server::create_reusable_listener(addr)?;

    let handler = StaticHandler::new(cfg.files.to_settings()).await?;
    let drain_timeout = Duration::from_secs(cfg.performance.write_timeout);
    logger::log_server_start(&addr, &cfg);

    let state = Arc::new(AppState::new(cfg, handler, config_path));
    let shutdown = CancellationToken::new();
    server::start_signal_handler(Arc::clone(&state), shutdown.clone())?;

    server::start_server_loop(listener, state, shutdown, drain_timeout).await;
    Ok(())
}
