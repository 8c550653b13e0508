// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;
use std::collections::HashMap;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub files: FilesConfig,
    #[serde(default)]
    pub mime: MimeConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Served directory configuration
#[derive(Debug, Deserialize, Clone)]
pub struct FilesConfig {
    /// Serve root, relative to the working directory
    pub root: String,
    #[serde(default = "default_index_files")]
    pub index_files: Vec<String>,
}

fn default_index_files() -> Vec<String> {
    vec!["index.html".to_string(), "index.htm".to_string()]
}

/// Extension to content-type mapping
#[derive(Debug, Deserialize, Clone)]
pub struct MimeConfig {
    /// Use built-in guesses for extensions missing from `types`
    #[serde(default = "default_builtin")]
    pub builtin: bool,
    /// Content-type for unknown or empty extensions
    #[serde(default = "default_fallback")]
    pub fallback: String,
    /// Explicit overrides, keyed by extension without the dot
    #[serde(default = "default_mime_types")]
    pub types: HashMap<String, String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_builtin() -> bool {
    true
}

fn default_fallback() -> String {
    "application/octet-stream".to_string()
}

fn default_mime_types() -> HashMap<String, String> {
    [
        ("manifest", "text/cache-manifest"),
        ("html", "text/html"),
        ("png", "image/png"),
        ("jpg", "image/jpg"),
        ("svg", "image/svg+xml"),
        ("css", "text/css"),
        ("js", "application/x-javascript"),
    ]
    .into_iter()
    .map(|(ext, mime)| (ext.to_string(), mime.to_string()))
    .collect()
}

impl Default for MimeConfig {
    fn default() -> Self {
        Self {
            builtin: default_builtin(),
            fallback: default_fallback(),
            types: default_mime_types(),
        }
    }
}

/// HTTP configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

fn default_access_log_format() -> String {
    "common".to_string()
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive: bool,
    /// Seconds allowed for a request head to arrive, 0 disables it
    pub header_read_timeout: u64,
    pub max_connections: Option<u64>,
}
