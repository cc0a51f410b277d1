// Configuration module entry point
// Manages application configuration and runtime state

mod state;
mod types;

use std::net::SocketAddr;

// Re-export public types
pub use state::AppState;
pub use types::{Config, CorsConfig};

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Default config file is "config.toml" when no path specified
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        Self::load_with_env(config_path, |key| std::env::var(key).ok())
    }

    /// Only `SERVER_HOST` and `SERVER_PORT` are read from the environment
    fn load_with_env(
        config_path: &str,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, config::ConfigError> {
        let cors = CorsConfig::default();
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .set_override_option("server.host", env("SERVER_HOST"))?
            .set_override_option("server.port", env("SERVER_PORT"))?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.show_headers", false)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("http.server_name", "message-board/0.1")?
            .set_default("http.max_body_size", 1_048_576)? // 1MB
            .set_default("messages.resource_path", "/classes/messages")?
            .set_default("messages.persistent_sort", true)?
            .set_default("cors.allow_origin", cors.allow_origin)?
            .set_default("cors.allow_methods", cors.allow_methods)?
            .set_default("cors.allow_headers", cors.allow_headers)?
            .set_default("cors.max_age", cors.max_age)?
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

#[cfg(test)]
impl Default for Config {
    fn default() -> Self {
        use types::{HttpConfig, LoggingConfig, MessagesConfig, PerformanceConfig, ServerConfig};

        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
                workers: None,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                access_log: false,
                show_headers: false,
                access_log_format: "combined".to_string(),
            },
            performance: PerformanceConfig {
                keep_alive_timeout: 75,
                read_timeout: 30,
                write_timeout: 30,
                max_connections: None,
            },
            http: HttpConfig {
                server_name: "message-board/0.1".to_string(),
                max_body_size: 1_048_576,
            },
            messages: MessagesConfig {
                resource_path: "/classes/messages".to_string(),
                persistent_sort: true,
            },
            cors: CorsConfig::default(),
        }
    }
}
