// Signal handling module (nginx-style)
//
// Supported signals:
// - SIGHUP:  Reload configuration and swap in a new handler
// - SIGUSR1: Rescan the metadata index
// - SIGTERM: Graceful shutdown
// - SIGINT:  Graceful shutdown (Ctrl+C)

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::AppState;
use crate::logger;

/// Start signal handlers (Unix only)
///
/// Handlers are registered before this returns, so a failure to install one
/// is reported to the caller instead of inside the background task.
///
/// | Signal  | Action                    | Nginx Equivalent |
/// |---------|---------------------------|------------------|
/// | SIGHUP  | Reload config             | `nginx -s reload`|
/// | SIGUSR1 | Rescan metadata index     | (none)           |
/// | SIGTERM | Graceful stop             | `nginx -s stop`  |
/// | SIGINT  | Graceful stop             | Ctrl+C           |
#[cfg(unix)]
pub fn start_signal_handler(
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigusr1 = signal(SignalKind::user_defined1())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    logger::log_info(&format!(
        "[SIGNAL] Handlers registered (pid {}): HUP reload, USR1 rescan, TERM/INT shutdown",
        std::process::id()
    ));

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = sighup.recv() => {
                    logger::log_info("[SIGNAL] SIGHUP received, reloading configuration");
                    if let Err(e) = state.reload().await {
                        logger::log_error(&format!("Reload failed, keeping current handler: {e}"));
                    }
                }

                _ = sigusr1.recv() => {
                    logger::log_info("[SIGNAL] SIGUSR1 received, rescanning");
                    match state.rescan().await {
                        Ok(Some(_)) => {}
                        Ok(None) => logger::log_info("[SIGNAL] Index disabled, nothing to rescan"),
                        Err(e) => logger::log_error(&format!("Rescan failed, keeping previous index: {e}")),
                    }
                }

                _ = sigterm.recv() => {
                    logger::log_info("[SIGNAL] SIGTERM received, shutting down");
                    shutdown.cancel();
                    break;
                }

                _ = sigint.recv() => {
                    logger::log_info("[SIGNAL] SIGINT received, shutting down");
                    shutdown.cancel();
                    break;
                }
            }
        }
    });

    Ok(())
}

/// Non-Unix fallback: only Ctrl+C, which shuts down
#[cfg(not(unix))]
pub fn start_signal_handler(
    _state: Arc<AppState>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            logger::log_info("[SIGNAL] Ctrl+C received, shutting down");
            shutdown.cancel();
        }
    });
    Ok(())
}
