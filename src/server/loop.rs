// Server loop module
// Accepts connections until a shutdown is signalled, then drains in-flight ones

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use super::connection::accept_connection;
use crate::config::AppState;
use crate::logger;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Accept loop for the message board.
///
/// Must run inside a `LocalSet`: connections are served with `spawn_local`.
/// Returns once `state.shutdown_signal` fires and active connections have
/// finished, or the drain deadline (`write_timeout`) has passed.
pub async fn start_server_loop(
    listener: TcpListener,
    state: Arc<AppState>,
    active_connections: Arc<AtomicUsize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let shutdown = Arc::clone(&state.shutdown_signal);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &state, &active_connections);
                    }
                    Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                }
            }

            () = shutdown.notified() => {
                logger::log_shutdown(
                    active_connections.load(Ordering::SeqCst),
                    state.store.len().await,
                );
                break;
            }
        }
    }

    drop(listener);
    drain_connections(&active_connections, state.config.performance.write_timeout).await;
    Ok(())
}

/// Wait for in-flight connections, giving up after `timeout_secs`
async fn drain_connections(active_connections: &AtomicUsize, timeout_secs: u64) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(timeout_secs);

    loop {
        let remaining = active_connections.load(Ordering::SeqCst);
        if remaining == 0 {
            tracing::info!("All connections closed");
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            logger::log_warning(&format!(
                "Drain deadline reached with {remaining} connection(s) still open"
            ));
            return;
        }
        tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
    }
}
