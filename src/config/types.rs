// Configuration types module
// Defines all configuration-related data structures

use serde::{Deserialize, Serialize};

pub(super) const DEFAULT_HOST: &str = "127.0.0.1";
pub(super) const DEFAULT_PORT: u16 = 8080;
pub(super) const DEFAULT_DOMAIN: &str = "*";
pub(super) const DEFAULT_SERVER_NAME: &str = "resthook/0.1";
pub(super) const DEFAULT_MAX_BODY_SIZE: u64 = 10 * 1024 * 1024;
pub(super) const DEFAULT_KEEP_ALIVE: u64 = 75;
pub(super) const DEFAULT_IO_TIMEOUT: u64 = 30;

/// Main configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listen address and runtime sizing
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub workers: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            workers: None,
        }
    }
}

/// Body format of error responses
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ErrorFormat {
    #[default]
    Json,
    Xml,
}

/// HTTP behaviour shared by every route of an application
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpConfig {
    /// Origin allowed for cross-domain requests
    pub domain: String,
    pub enable_cors: bool,
    /// Indented JSON output and request body logging
    pub debug: bool,
    #[serde(default)]
    pub error_format: ErrorFormat,
    pub max_body_size: u64,
    pub server_name: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            enable_cors: true,
            debug: false,
            error_format: ErrorFormat::Json,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            server_name: DEFAULT_SERVER_NAME.to_string(),
        }
    }
}

/// Connection handling limits
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive_timeout: u64,
    pub read_timeout: u64,
    pub write_timeout: u64,
    #[serde(default)]
    pub max_connections: Option<u64>,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            keep_alive_timeout: DEFAULT_KEEP_ALIVE,
            read_timeout: DEFAULT_IO_TIMEOUT,
            write_timeout: DEFAULT_IO_TIMEOUT,
            max_connections: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common or json)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            access_log: true,
            access_log_format: default_access_log_format(),
            access_log_file: None,
            error_log_file: None,
        }
    }
}

/// Settings handed to every response writer and request adapter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResponseConfig {
    pub debug: bool,
    pub error_format: ErrorFormat,
}

impl From<&HttpConfig> for ResponseConfig {
    fn from(http: &HttpConfig) -> Self {
        Self {
            debug: http.debug,
            error_format: http.error_format,
        }
    }
}
