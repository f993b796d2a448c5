//! Static asset delivery behind an HTTP/2 capable transport bridge
//!
//! - [`static_files::StaticAssetServer`] serves a directory tree with
//!   conditional requests, byte ranges and optional listings.
//! - [`bridge::TransportBridgeServer`] accepts HTTP/2 and HTTP/1.1 (TLS with
//!   ALPN, or cleartext for development) and drives any [`engine::Handler`].

pub mod bridge;
pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod logger;
pub mod server;
pub mod static_files;

pub use error::{Error, Result};
