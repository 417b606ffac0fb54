// Server loop module
// Accepts connections until shutdown, then waits for in-flight ones to drain

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use super::connection::accept_connection;
use crate::config::AppState;
use crate::logger;

/// How often the drain checks for remaining connections
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Accept and serve connections until `shutdown` is cancelled
///
/// After shutdown the listener is closed at once; open connections get up to
/// `drain_timeout` to finish before the loop returns.
pub async fn start_server_loop(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: CancellationToken,
    drain_timeout: Duration,
) {
    let active_connections = Arc::new(AtomicUsize::new(0));

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,

            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &state, &active_connections);
                    }
                    Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                }
            }
        }
    }

    drop(listener);
    logger::log_info("[Shutdown] Listener closed, draining connections");
    drain_connections(&active_connections, drain_timeout).await;
}

/// Wait until no connection is active or the deadline passes
async fn drain_connections(active: &AtomicUsize, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        let remaining = active.load(Ordering::SeqCst);
        if remaining == 0 {
            logger::log_info("[Shutdown] All connections closed");
            return;
        }

        tokio::select! {
            () = tokio::time::sleep(DRAIN_POLL_INTERVAL) => {}
            () = tokio::time::sleep_until(deadline) => {
                logger::log_warning(&format!(
                    "Shutdown deadline reached with {remaining} connection(s) still open"
                ));
                return;
            }
        }
    }
}
