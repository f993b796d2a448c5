//! Bridge transport configuration

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// How the secondary transport runs on the wire
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    /// TLS with ALPN (`h2`, `http/1.1`); the production setting
    #[default]
    Tls,
    /// Plain TCP, HTTP/2 by prior knowledge or HTTP/1.1
    ///
    /// Development only: browsers and most clients refuse HTTP/2 without
    /// TLS, so this mode is unsuitable for production traffic.
    Cleartext,
}

/// Certificate material for [`TransportMode::Tls`]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TlsConfig {
    /// PEM certificate chain
    pub cert_path: PathBuf,
    /// PEM private key (PKCS#8, PKCS#1 or SEC1)
    pub key_path: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BridgeConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub mode: TransportMode,
    #[serde(default)]
    pub tls: Option<TlsConfig>,

    /// Concurrent streams per HTTP/2 connection
    #[serde(default = "default_max_concurrent_streams")]
    pub max_concurrent_streams: u32,
    /// Per-stream upload buffer (HTTP/2 stream window), bytes
    #[serde(default = "default_stream_window_size")]
    pub stream_window_size: u32,
    /// Per-connection upload buffer (HTTP/2 connection window), bytes
    #[serde(default = "default_connection_window_size")]
    pub connection_window_size: u32,
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: u32,
    /// Ceiling for decoded header blocks, bytes
    #[serde(default = "default_max_header_list_size")]
    pub max_header_list_size: u32,

    /// Seconds a connection may sit without a request
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: u64,
    /// Seconds allowed for the TLS handshake and for each body read
    #[serde(default = "default_read_timeout")]
    pub read_timeout: u64,
    /// Seconds a client may stall before a response chunk is dropped
    #[serde(default = "default_write_timeout")]
    pub write_timeout: u64,

    #[serde(default)]
    pub max_connections: Option<u64>,
    /// Largest accepted request body, bytes
    #[serde(default = "default_max_body_size")]
    pub max_body_size: u64,
    /// Declared bodies above this size are streamed instead of buffered
    #[serde(default = "default_stream_threshold")]
    pub stream_threshold: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

#[allow(clippy::missing_const_for_fn)]
fn default_port() -> u16 {
    8443
}

#[allow(clippy::missing_const_for_fn)]
fn default_max_concurrent_streams() -> u32 {
    250
}

#[allow(clippy::missing_const_for_fn)]
fn default_stream_window_size() -> u32 {
    1024 * 1024
}

#[allow(clippy::missing_const_for_fn)]
fn default_connection_window_size() -> u32 {
    4 * 1024 * 1024
}

#[allow(clippy::missing_const_for_fn)]
fn default_max_frame_size() -> u32 {
    MIN_FRAME_SIZE
}

#[allow(clippy::missing_const_for_fn)]
fn default_max_header_list_size() -> u32 {
    64 * 1024
}

#[allow(clippy::missing_const_for_fn)]
fn default_idle_timeout() -> u64 {
    120
}

#[allow(clippy::missing_const_for_fn)]
fn default_read_timeout() -> u64 {
    30
}

#[allow(clippy::missing_const_for_fn)]
fn default_write_timeout() -> u64 {
    30
}

#[allow(clippy::missing_const_for_fn)]
fn default_max_body_size() -> u64 {
    10 * 1024 * 1024
}

#[allow(clippy::missing_const_for_fn)]
fn default_stream_threshold() -> u64 {
    1024 * 1024
}

/// HTTP/2 frame size bounds (RFC 9113, section 4.2)
const MIN_FRAME_SIZE: u32 = 16_384;
const MAX_FRAME_SIZE: u32 = 16_777_215;

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            mode: TransportMode::default(),
            tls: None,
            max_concurrent_streams: default_max_concurrent_streams(),
            stream_window_size: default_stream_window_size(),
            connection_window_size: default_connection_window_size(),
            max_frame_size: default_max_frame_size(),
            max_header_list_size: default_max_header_list_size(),
            idle_timeout: default_idle_timeout(),
            read_timeout: default_read_timeout(),
            write_timeout: default_write_timeout(),
            max_connections: None,
            max_body_size: default_max_body_size(),
            stream_threshold: default_stream_threshold(),
        }
    }
}

impl BridgeConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| Error::TransportConfig(format!("invalid listen address: {e}")))
    }

    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout)
    }

    pub const fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout)
    }

    pub const fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout)
    }

    /// Reject settings the transport cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.mode == TransportMode::Tls && self.tls.is_none() {
            return Err(Error::TransportConfig(
                "tls mode requires `tls.cert_path` and `tls.key_path`".to_string(),
            ));
        }
        if !(MIN_FRAME_SIZE..=MAX_FRAME_SIZE).contains(&self.max_frame_size) {
            return Err(Error::TransportConfig(format!(
                "max_frame_size must be within {MIN_FRAME_SIZE}..={MAX_FRAME_SIZE}, got {}",
                self.max_frame_size
            )));
        }
        if self.max_concurrent_streams == 0 {
            return Err(Error::TransportConfig(
                "max_concurrent_streams must be positive".to_string(),
            ));
        }
        for (name, secs) in [
            ("idle_timeout", self.idle_timeout),
            ("read_timeout", self.read_timeout),
            ("write_timeout", self.write_timeout),
        ] {
            if secs == 0 {
                return Err(Error::TransportConfig(format!("{name} must be positive")));
            }
        }
        self.socket_addr().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleartext() -> BridgeConfig {
        BridgeConfig {
            mode: TransportMode::Cleartext,
            ..BridgeConfig::default()
        }
    }

    #[test]
    fn test_tls_requires_certificates() {
        let err = BridgeConfig::default().validate().unwrap_err();
        assert!(matches!(err, Error::TransportConfig(_)));
    }

    #[test]
    fn test_cleartext_defaults_valid() {
        assert!(cleartext().validate().is_ok());
    }

    #[test]
    fn test_frame_size_bounds() {
        let mut cfg = cleartext();
        cfg.max_frame_size = 1024;
        assert!(cfg.validate().is_err());
        cfg.max_frame_size = MAX_FRAME_SIZE;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_bad_address() {
        let mut cfg = cleartext();
        cfg.host = "not an address".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_mode_deserialize() {
        let cfg: BridgeConfig = serde_json::from_str(r#"{"mode": "cleartext"}"#).unwrap();
        assert_eq!(cfg.mode, TransportMode::Cleartext);
        assert_eq!(cfg.max_concurrent_streams, 250);
    }
}
