//! Logger module
//!
//! Provides logging utilities for the message board including:
//! - Server lifecycle logging
//! - Access logging with multiple formats
//! - Error and warning logging
//!
//! Everything goes through `tracing`; access lines use the `access` target so
//! they can be filtered separately (`RUST_LOG=access=off`).

mod format;

pub use format::AccessLogEntry;

use crate::config::Config;
use hyper::{Method, Uri, Version};
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber
///
/// `RUST_LOG` wins over `logging.level` when set. Should be called once at
/// application startup.
pub fn init(config: &Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))?;

    tracing_subscriber::fmt().with_env_filter(filter).try_init()
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    tracing::info!("======================================");
    tracing::info!("Message board started successfully");
    tracing::info!("Listening on: http://{addr}{}", config.messages.resource_path);
    tracing::info!("Log level: {}", config.logging.level);
    if let Some(workers) = config.server.workers {
        tracing::info!("Worker threads: {workers}");
    }
    tracing::info!(
        persistent_sort = config.messages.persistent_sort,
        max_body_size = config.http.max_body_size,
        max_connections = ?config.performance.max_connections,
        "Message store ready"
    );
    tracing::info!("======================================");
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    tracing::debug!("[Connection] Accepted from: {peer_addr}");
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    tracing::error!("Failed to serve connection: {err:?}");
}

pub fn log_request(method: &Method, uri: &Uri, version: Version) {
    tracing::debug!("[Request] {method} {uri} {version:?}");
}

pub fn log_headers_count(count: usize, show: bool) {
    if show {
        tracing::info!("[Headers] Count: {count}");
    }
}

pub fn log_error(message: &str) {
    tracing::error!("{message}");
}

pub fn log_warning(message: &str) {
    tracing::warn!("{message}");
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    tracing::info!(target: "access", "{}", entry.format(format));
}

pub fn log_shutdown(active_connections: usize, stored_messages: usize) {
    tracing::info!(
        active_connections,
        stored_messages,
        "Shutdown requested, no longer accepting connections"
    );
}

/// Version string as it appears in a request line (`1.1`, `2`)
pub fn format_version(version: Version) -> String {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_version() {
        assert_eq!(format_version(Version::HTTP_10), "1.0");
        assert_eq!(format_version(Version::HTTP_11), "1.1");
        assert_eq!(format_version(Version::HTTP_2), "2");
    }
}
