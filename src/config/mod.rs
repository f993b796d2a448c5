// Configuration module entry point
// Layered settings: defaults, then the config file, then ASSETBRIDGE_* variables

mod types;

pub use types::{Config, LoggingConfig, ServerConfig};

/// Prefix for environment overrides, e.g. `ASSETBRIDGE_BRIDGE__PORT=9443`
const ENV_PREFIX: &str = "ASSETBRIDGE";

impl Config {
    /// Load configuration from specified file path (extension optional)
    ///
    /// A missing file is not an error; defaults and environment variables
    /// still apply.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .set_default("static_files.root", "public")?
            .set_default("bridge.mode", "tls")?
            .set_default("logging.level", "info")?
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::TransportMode;
    use crate::logger::AccessLogFormat;
    use std::fs;

    #[test]
    fn test_defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent");
        let cfg = Config::load_from(missing.to_str().unwrap()).unwrap();

        assert_eq!(cfg.static_files.root, std::path::PathBuf::from("public"));
        assert_eq!(cfg.bridge.mode, TransportMode::Tls);
        assert_eq!(cfg.bridge.max_concurrent_streams, 250);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.logging.access_log);
        assert_eq!(cfg.server.shutdown_grace, 30);
    }

    #[test]
    fn test_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assetbridge.toml");
        fs::write(
            &path,
            r#"
[server]
workers = 4

[bridge]
mode = "cleartext"
port = 9000
max_concurrent_streams = 100
idle_timeout = 60

[static_files]
root = "/srv/www"
browse = true
exclude = [".*", "*.bak"]

[static_files.content_types]
wasm = "application/wasm"

[logging]
access_log_format = "json"
"#,
        )
        .unwrap();

        let cfg = Config::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.server.workers, Some(4));
        assert_eq!(cfg.bridge.mode, TransportMode::Cleartext);
        assert_eq!(cfg.bridge.port, 9000);
        assert_eq!(cfg.bridge.max_concurrent_streams, 100);
        assert_eq!(cfg.bridge.idle_timeout, 60);
        assert_eq!(cfg.bridge.read_timeout, 30);
        assert!(cfg.static_files.browse);
        assert_eq!(cfg.static_files.exclude, vec![".*", "*.bak"]);
        assert_eq!(
            cfg.static_files.content_types.get("wasm").map(String::as_str),
            Some("application/wasm")
        );
        assert_eq!(cfg.logging.access_log_format, AccessLogFormat::Json);
    }
}
