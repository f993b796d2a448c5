//! HTTP protocol layer module
//!
//! Protocol-level building blocks shared by the static server and the
//! bridge: byte ranges, cache validators, MIME types and status responses.

pub mod cache;
pub mod mime;
pub mod range;
pub mod response;

// Re-export commonly used types
pub use range::ByteRange;
pub use response::{build_error_response, build_status_response};
