//! Bridge between the multiplexed transport and the generic handler contract
//!
//! [`request::adapt_request`] and [`response::adapt_response`] translate
//! between the two message shapes; [`TransportBridgeServer`] owns the
//! listener, TLS and per-connection protocol settings.

mod config;
pub mod request;
pub mod response;
mod server;
pub mod tls;

pub use self::config::{BridgeConfig, TlsConfig, TransportMode};
pub use request::{adapt_request, parse_remote_ip, AdaptOptions};
pub use response::{adapt_response, BridgeBody};
pub use server::TransportBridgeServer;
