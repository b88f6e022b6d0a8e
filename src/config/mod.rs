// Configuration module entry point
// Layered configuration: optional file, environment overrides, defaults.

mod types;

use std::net::SocketAddr;

// Re-export public types
pub use types::{
    ApiConfig, Config, LimitsConfig, LoggingConfig, ServerConfig, StorageBackend, StorageConfig,
    ThrottleConfig, TimeoutsConfig,
};

impl Config {
    /// Load configuration from specified file path (without extension)
    ///
    /// Environment variables prefixed `DOCREST_` override file values, with
    /// `__` as the section separator, e.g. `DOCREST_SERVER__PORT=9000`.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix("DOCREST").separator("__"))
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8000)?
            .set_default("api.name", "api")?
            .set_default("api.version", "v1")?
            .set_default("api.debug", false)?
            .set_default("limits.default_limit", 20)?
            .set_default("limits.max_limit", 1000)?
            .set_default("limits.max_body_size", 1_048_576)? // 1MB
            .set_default("timeouts.keep_alive", 75)?
            .set_default("timeouts.read", 30)?
            .set_default("timeouts.write", 30)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("storage.backend", "memory")?
            .set_default("throttle.enabled", false)?
            .set_default("throttle.throttle_at", 150)?
            .set_default("throttle.time_frame", 3600)?
            .set_default("throttle.expiration", 604_800)?
            .build()?;

        settings.try_deserialize()
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}
