//! Error types
//!
//! One taxonomy for the static server, the adapters and the bridge. Every
//! variant maps onto the status code a client receives; internal variants
//! keep their cause for logging and present a generic body to the client.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Resolved path is not under the serving root
    #[error("path escapes the serving root: {0}")]
    TraversalDenied(String),

    /// Final path segment matches an exclusion pattern
    #[error("path is excluded: {0}")]
    Excluded(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Directory without index file while listing is disabled
    #[error("directory listing disabled: {0}")]
    ListingDisabled(String),

    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    /// Filesystem failure other than "not found"
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed range header: {0}")]
    MalformedRange(String),

    #[error("range not satisfiable for {total} bytes")]
    UnsatisfiableRange { total: u64 },

    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: u64 },

    /// Adapter could not translate a message between the two shapes
    #[error("conversion failure: {0}")]
    Conversion(String),

    /// Bridge cannot start with the supplied transport settings
    #[error("transport configuration error: {0}")]
    TransportConfig(String),

    #[error("handler panicked: {0}")]
    HandlerPanic(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Arbitrary status raised by an external handler
    #[error("{code}: {message}")]
    Status { code: u16, message: String },
}

impl Error {
    /// Wrap an I/O error together with the path it occurred on
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// HTTP status code presented to the client
    pub const fn status(&self) -> u16 {
        match self {
            Self::MalformedRange(_) => 400,
            Self::TraversalDenied(_) | Self::ListingDisabled(_) => 403,
            Self::Excluded(_) | Self::NotFound(_) => 404,
            Self::MethodNotAllowed(_) => 405,
            Self::BodyTooLarge { .. } => 413,
            Self::UnsatisfiableRange { .. } => 416,
            Self::Status { code, .. } => *code,
            Self::Io { .. }
            | Self::Conversion(_)
            | Self::TransportConfig(_)
            | Self::HandlerPanic(_)
            | Self::Config(_) => 500,
        }
    }

    /// Whether the cause is hidden from the client and logged instead
    pub const fn is_internal(&self) -> bool {
        self.status() >= 500
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(Error::TraversalDenied("/x".into()).status(), 403);
        assert_eq!(Error::Excluded(".env".into()).status(), 404);
        assert_eq!(Error::MalformedRange("bytes=x".into()).status(), 400);
        assert_eq!(Error::UnsatisfiableRange { total: 10 }.status(), 416);
        assert_eq!(Error::BodyTooLarge { limit: 1 }.status(), 413);
        assert_eq!(
            Error::Status {
                code: 418,
                message: "teapot".into()
            }
            .status(),
            418
        );
    }

    #[test]
    fn test_internal_errors() {
        let err = Error::io("/srv/a", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(err.is_internal());
        assert!(err.to_string().contains("/srv/a"));
        assert!(Error::HandlerPanic("boom".into()).is_internal());
        assert!(!Error::NotFound("/a".into()).is_internal());
    }
}
