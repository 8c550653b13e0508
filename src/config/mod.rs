// Configuration module entry point
// Loads the immutable server configuration once at startup

mod state;
mod types;

use hyper::header::HeaderValue;
use std::net::SocketAddr;
use std::path::Path;

pub use state::AppState;
pub use types::{
    Config, FilesConfig, HttpConfig, LoggingConfig, MimeConfig, PerformanceConfig, ServerConfig,
};

/// Default config file name (without extension), looked up in the working directory
pub const DEFAULT_CONFIG_PATH: &str = "serve";

impl Config {
    /// Load configuration from specified file path (without extension)
    /// A missing file yields the built-in defaults: port 8000, root `dist`
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("files.root", "dist")?
            .set_default("http.server_name", concat!("coi-serve/", env!("CARGO_PKG_VERSION")))?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("performance.keep_alive", true)?
            .set_default("performance.header_read_timeout", 30)?
            .build()?;

        let cfg: Self = settings.try_deserialize()?;
        cfg.validate().map_err(config::ConfigError::Message)?;
        Ok(cfg)
    }

    /// Load from the default `serve.toml`
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Reject values that would only fail later, per request
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be non-zero".to_string());
        }
        if self.files.root.trim().is_empty() {
            return Err("files.root must not be empty".to_string());
        }
        if HeaderValue::from_str(&self.mime.fallback).is_err() {
            return Err(format!(
                "mime.fallback is not a valid header value: '{}'",
                self.mime.fallback
            ));
        }
        if let Some((ext, value)) = self
            .mime
            .types
            .iter()
            .find(|(_, v)| HeaderValue::from_str(v).is_err())
        {
            return Err(format!(
                "mime.types.{ext} is not a valid header value: '{value}'"
            ));
        }
        Ok(())
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }

    /// Whether the serve root exists; a missing root only produces 404s
    pub fn root_exists(&self) -> bool {
        Path::new(&self.files.root).is_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn load_toml(contents: &str) -> Result<Config, config::ConfigError> {
        let mut file = tempfile::Builder::new()
            .prefix("serve-test")
            .suffix(".toml")
            .tempfile()
            .expect("create temp config");
        file.write_all(contents.as_bytes()).expect("write temp config");
        let path = file.path().with_extension("");
        let stem = path.to_str().expect("utf-8 temp path");
        Config::load_from(stem)
    }

    #[test]
    fn test_defaults_without_file() {
        let cfg = Config::load_from("definitely-missing-serve-config").unwrap();
        assert_eq!(cfg.server.port, 8000);
        assert_eq!(cfg.files.root, "dist");
        assert_eq!(cfg.files.index_files, vec!["index.html", "index.htm"]);
        assert!(cfg.mime.builtin);
        assert_eq!(cfg.mime.fallback, "application/octet-stream");
        assert_eq!(cfg.mime.types.get("html").map(String::as_str), Some("text/html"));
        assert_eq!(
            cfg.mime.types.get("js").map(String::as_str),
            Some("application/x-javascript")
        );
        assert_eq!(cfg.logging.access_log_format, "common");
        assert_eq!(cfg.performance.header_read_timeout, 30);
        assert!(cfg.performance.keep_alive);
        assert_eq!(cfg.get_socket_addr().unwrap().port(), 8000);
    }

    #[test]
    fn test_file_overrides() {
        let cfg = load_toml(
            r#"
[server]
port = 9001

[files]
root = "public"

[mime]
builtin = false
[mime.types]
wasm = "application/wasm"
"#,
        )
        .unwrap();
        assert_eq!(cfg.server.port, 9001);
        assert_eq!(cfg.files.root, "public");
        assert!(!cfg.mime.builtin);
        assert_eq!(
            cfg.mime.types.get("wasm").map(String::as_str),
            Some("application/wasm")
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut cfg = Config::load_from("definitely-missing-serve-config").unwrap();
        cfg.server.port = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::load_from("definitely-missing-serve-config").unwrap();
        cfg.files.root = "  ".to_string();
        assert!(cfg.validate().is_err());

        let mut cfg = Config::load_from("definitely-missing-serve-config").unwrap();
        cfg.mime
            .types
            .insert("bad".to_string(), "text/plain\r\n".to_string());
        assert!(cfg.validate().is_err());
    }
}
