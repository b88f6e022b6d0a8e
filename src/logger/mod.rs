//! Logger module
//!
//! Provides logging utilities for the api server including:
//! - Server lifecycle logging
//! - Api request logging
//! - Error and warning logging
//! - File-based logging support

pub mod writer;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::Config;

/// Whether per-request lines are written at all
static ACCESS_LOG: AtomicBool = AtomicBool::new(true);

/// Initialize the logger with configuration
///
/// Should be called once at application startup.
pub fn init(config: &Config) -> std::io::Result<()> {
    ACCESS_LOG.store(config.logging.access_log, Ordering::Relaxed);
    writer::init(
        config.logging.access_log_file.as_deref(),
        config.logging.error_log_file.as_deref(),
    )
}

/// Write to info/access log
fn write_info(message: &str) {
    match writer::get() {
        Some(writer) => writer.write_info(message),
        None => println!("{message}"),
    }
}

/// Write to error log
fn write_error(message: &str) {
    match writer::get() {
        Some(writer) => writer.write_error(message),
        None => eprintln!("{message}"),
    }
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    write_info("======================================");
    write_info("Document api server started");
    write_info(&format!("Listening on: http://{addr}"));
    write_info(&format!(
        "Api root: http://{addr}/{}/{}/",
        config.api.name, config.api.version
    ));
    write_info(&format!("Storage backend: {}", config.storage.backend));
    write_info(&format!("Log level: {}", config.logging.level));
    if let Some(workers) = config.server.workers {
        write_info(&format!("Worker threads: {workers}"));
    }
    if let Some(ref path) = config.logging.access_log_file {
        write_info(&format!("Access log: {path}"));
    }
    if let Some(ref path) = config.logging.error_log_file {
        write_info(&format!("Error log: {path}"));
    }
    write_info("======================================\n");
}

pub fn log_shutdown() {
    write_info("\n[Shutdown] Server stopping");
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    write_info(&format!("[Connection] Accepted from: {peer_addr}"));
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    write_error(&format!("[ERROR] Failed to serve connection: {err:?}"));
}

pub fn log_error(message: &str) {
    write_error(&format!("[ERROR] {message}"));
}

pub fn log_warning(message: &str) {
    write_error(&format!("[WARN] {message}"));
}

pub fn log_api_request(method: &str, path: &str, status: u16) {
    if ACCESS_LOG.load(Ordering::Relaxed) {
        write_info(&format!("[API] {method} {path} - {status}"));
    }
}
