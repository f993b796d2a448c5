// Configuration types module
// Process-level settings; the bridge and static root carry their own sections

use crate::bridge::BridgeConfig;
use crate::logger::AccessLogFormat;
use crate::static_files::StaticConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    pub static_files: StaticConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Runtime configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Tokio worker threads; the runtime default when unset
    #[serde(default)]
    pub workers: Option<usize>,
    /// Seconds in-flight connections get to finish after a shutdown signal
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace: u64,
}

#[allow(clippy::missing_const_for_fn)]
fn default_shutdown_grace() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            workers: None,
            shutdown_grace: default_shutdown_grace(),
        }
    }
}

impl ServerConfig {
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace)
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `assetbridge=debug`
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_access_log")]
    pub access_log: bool,
    #[serde(default)]
    pub access_log_format: AccessLogFormat,
}

fn default_level() -> String {
    "info".to_string()
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            access_log: default_access_log(),
            access_log_format: AccessLogFormat::default(),
        }
    }
}
