// Application state module
// Owns the message store and the values every request reads

use std::sync::Arc;
use tokio::sync::Notify;

use super::types::Config;
use crate::http::CorsHeaders;
use crate::store::MessageStore;

/// Application state, built once at startup and shared by every connection
pub struct AppState {
    pub config: Config,
    pub store: MessageStore,
    /// Immutable CORS defaults; each response clones these into a fresh map
    pub cors: CorsHeaders,
    pub shutdown_signal: Arc<Notify>,
    access_log: bool,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            store: MessageStore::new(),
            cors: CorsHeaders::from_config(&config.cors),
            shutdown_signal: Arc::new(Notify::new()),
            access_log: config.logging.access_log,
        }
    }

    pub const fn access_log_enabled(&self) -> bool {
        self.access_log
    }
}
