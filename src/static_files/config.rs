//! Static serving configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Settings for one static root
///
/// Immutable once the server is constructed and shared read-only by every
/// request.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StaticConfig {
    /// Directory served; must exist
    pub root: PathBuf,
    /// File served for a directory request
    #[serde(default = "default_index")]
    pub index: String,
    /// Generate listings for directories without an index file
    #[serde(default)]
    pub browse: bool,
    /// Serve precompressed `.gz` siblings to clients accepting gzip
    #[serde(default)]
    pub compress: bool,
    /// Honor `Range` requests
    #[serde(default = "default_true")]
    pub byte_range: bool,
    /// `Cache-Control` max-age in seconds; 0 disables caching headers
    #[serde(default)]
    pub cache_duration: u64,
    /// Emit `ETag` and evaluate conditional headers
    #[serde(default = "default_true")]
    pub etag: bool,
    /// Glob patterns (`*`, `?`) for path segments that must never be served
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Extension to Content-Type overrides
    #[serde(default)]
    pub content_types: HashMap<String, String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_true() -> bool {
    true
}

fn default_index() -> String {
    "index.html".to_string()
}

impl StaticConfig {
    /// Defaults for `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            index: default_index(),
            browse: false,
            compress: false,
            byte_range: true,
            cache_duration: 0,
            etag: true,
            exclude: Vec::new(),
            content_types: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_defaults() {
        let cfg: StaticConfig = serde_json::from_str(r#"{"root": "/srv/public"}"#).unwrap();
        assert_eq!(cfg.index, "index.html");
        assert!(cfg.byte_range);
        assert!(cfg.etag);
        assert!(!cfg.browse);
        assert_eq!(cfg.cache_duration, 0);
    }
}
