//! Logger module
//!
//! Server lifecycle messages, warnings, errors, debug traces and access log
//! lines, all written through the process log writer.

mod format;
pub mod writer;

pub use format::AccessLogEntry;
pub use writer::Level;

use crate::config::{Config, LoggingConfig};
use std::net::SocketAddr;

/// Initialize the logger with configuration
///
/// Should be called once at application startup. The HTTP debug flag
/// raises the level to `Debug`.
pub fn init(config: &Config) -> std::io::Result<()> {
    let logging: &LoggingConfig = &config.logging;
    let level = if config.http.debug {
        Level::Debug
    } else {
        Level::parse(&logging.level)
    };
    writer::init(
        level,
        logging.access_log_file.as_deref(),
        logging.error_log_file.as_deref(),
    )
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    let w = writer::get();
    w.write(Level::Info, "======================================");
    w.write(Level::Info, &format!("Listening on: http://{addr}"));
    w.write(Level::Info, &format!("Log level: {}", config.logging.level));
    if let Some(workers) = config.server.workers {
        w.write(Level::Info, &format!("Worker threads: {workers}"));
    }
    if config.http.enable_cors {
        w.write(Level::Info, &format!("CORS origin: {}", config.http.domain));
    }
    if config.http.debug {
        w.write(Level::Info, "Debug output enabled");
    }
    w.write(Level::Info, "======================================");
}

pub fn log_info(message: &str) {
    writer::get().write(Level::Info, message);
}

pub fn log_debug(message: &str) {
    writer::get().write(Level::Debug, &format!("[DEBUG] {message}"));
}

pub fn log_warning(message: &str) {
    writer::get().write(Level::Warn, &format!("[WARN] {message}"));
}

pub fn log_error(message: &str) {
    writer::get().write(Level::Error, &format!("[ERROR] {message}"));
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    log_error(&format!("Failed to serve connection: {err:?}"));
}

pub fn log_access(entry: &AccessLogEntry, format: &str) {
    writer::get().write_access(&entry.format(format));
}
