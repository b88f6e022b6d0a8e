// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub api: ApiConfig,
    pub limits: LimitsConfig,
    pub timeouts: TimeoutsConfig,
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub throttle: ThrottleConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Api namespace configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// First path segment, e.g. `api` in `/api/v1/`
    pub name: String,
    /// Second path segment, e.g. `v1` in `/api/v1/`
    pub version: String,
    /// Expose internal error messages in responses
    pub debug: bool,
}

/// Paging and request-size bounds
#[derive(Debug, Deserialize, Clone)]
pub struct LimitsConfig {
    pub default_limit: usize,
    pub max_limit: usize,
    pub max_body_size: u64,
    pub max_connections: Option<u64>,
}

/// Connection timeout configuration (seconds)
#[derive(Debug, Deserialize, Clone)]
pub struct TimeoutsConfig {
    pub keep_alive: u64,
    pub read: u64,
    pub write: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

/// Storage backend selection
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Sqlite,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// Storage configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Database file path, required for the sqlite backend
    #[serde(default)]
    pub path: Option<String>,
}

/// Request throttling configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ThrottleConfig {
    pub enabled: bool,
    /// Requests allowed per identifier within `time_frame`
    pub throttle_at: usize,
    /// Window length in seconds
    pub time_frame: u64,
    /// Seconds before recorded accesses are dropped entirely
    pub expiration: u64,
}
