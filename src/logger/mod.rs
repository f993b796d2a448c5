//! Logger module
//!
//! Diagnostics go through `tracing`; access lines are emitted as events on
//! the `access` target so they can be filtered or routed on their own.

mod format;

pub use format::{AccessLogEntry, AccessLogFormat};

use crate::bridge::TransportMode;
use crate::config::{Config, LoggingConfig};
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber
///
/// `RUST_LOG` takes precedence over the configured level. Should be called
/// once at application startup.
pub fn init(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)?,
    };
    tracing_subscriber::fmt().with_env_filter(filter).try_init()
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    let scheme = match config.bridge.mode {
        TransportMode::Tls => "https",
        TransportMode::Cleartext => "http",
    };
    tracing::info!(
        listen = %format!("{scheme}://{addr}"),
        mode = ?config.bridge.mode,
        root = %config.static_files.root.display(),
        workers = ?config.server.workers,
        max_concurrent_streams = config.bridge.max_concurrent_streams,
        "server started"
    );
}

pub fn log_access(entry: &AccessLogEntry, format: AccessLogFormat) {
    tracing::info!(target: "access", "{}", entry.format(format));
}
