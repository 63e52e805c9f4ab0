// Configuration module entry point
// Loads layered configuration: file, environment, then built-in defaults

mod types;

use std::net::SocketAddr;

use crate::error::ServerError;

pub use types::{
    Config, ErrorFormat, HttpConfig, LoggingConfig, PerformanceConfig, ResponseConfig,
    ServerConfig,
};

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Default config file is "config.toml" when no path specified
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("RESTHOOK")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_default("server.host", types::DEFAULT_HOST)?
            .set_default("server.port", types::DEFAULT_PORT)?
            .set_default("http.domain", types::DEFAULT_DOMAIN)?
            .set_default("http.enable_cors", true)?
            .set_default("http.debug", false)?
            .set_default("http.error_format", "json")?
            .set_default("http.max_body_size", types::DEFAULT_MAX_BODY_SIZE)?
            .set_default("http.server_name", types::DEFAULT_SERVER_NAME)?
            .set_default("performance.keep_alive_timeout", types::DEFAULT_KEEP_ALIVE)?
            .set_default("performance.read_timeout", types::DEFAULT_IO_TIMEOUT)?
            .set_default("performance.write_timeout", types::DEFAULT_IO_TIMEOUT)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .build()?;

        settings.try_deserialize()
    }

    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from("config")
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ServerError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| ServerError::Address(format!("{}:{}: {e}", self.server.host, self.server.port)))
    }

    pub fn response_config(&self) -> ResponseConfig {
        ResponseConfig::from(&self.http)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let cfg = Config::load_from("definitely-not-a-config-file").unwrap();
        let defaults = Config::default();
        assert_eq!(cfg.server.host, defaults.server.host);
        assert_eq!(cfg.server.port, defaults.server.port);
        assert_eq!(cfg.http.max_body_size, defaults.http.max_body_size);
        assert_eq!(cfg.http.error_format, ErrorFormat::Json);
        assert_eq!(cfg.logging.access_log_format, "combined");
    }

    #[test]
    fn test_socket_addr() {
        let mut cfg = Config::default();
        assert_eq!(cfg.socket_addr().unwrap().port(), 8080);

        cfg.server.host = "not an ip".to_string();
        assert!(cfg.socket_addr().is_err());
    }

    #[test]
    fn test_response_config_follows_http_section() {
        let mut cfg = Config::default();
        cfg.http.debug = true;
        cfg.http.error_format = ErrorFormat::Xml;
        let rc = cfg.response_config();
        assert!(rc.debug);
        assert_eq!(rc.error_format, ErrorFormat::Xml);
    }
}
