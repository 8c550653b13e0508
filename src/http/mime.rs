//! MIME type detection module
//!
//! Resolves the Content-Type for a file from its extension. The table is an
//! immutable value built once from configuration and handed to the file engine.

use crate::config::MimeConfig;
use std::collections::HashMap;
use std::path::Path;

/// Extension to content-type table with a fallback for unmatched extensions
#[derive(Debug, Clone)]
pub struct MimeTable {
    types: HashMap<String, String>,
    builtin: bool,
    fallback: String,
}

impl MimeTable {
    pub fn new(types: HashMap<String, String>, builtin: bool, fallback: String) -> Self {
        let types = types
            .into_iter()
            .map(|(ext, mime)| (normalize_extension(&ext), mime))
            .collect();
        Self {
            types,
            builtin,
            fallback,
        }
    }

    pub fn from_config(config: &MimeConfig) -> Self {
        Self::new(
            config.types.clone(),
            config.builtin,
            config.fallback.clone(),
        )
    }

    /// Content-Type for an extension (without the dot)
    ///
    /// Explicit entries win, then built-in guesses, then the fallback.
    /// Matching is case-insensitive.
    pub fn content_type(&self, extension: Option<&str>) -> &str {
        let Some(ext) = extension.filter(|e| !e.is_empty()) else {
            return &self.fallback;
        };
        let ext = normalize_extension(ext);
        if let Some(mime) = self.types.get(&ext) {
            return mime;
        }
        if self.builtin {
            if let Some(mime) = builtin_content_type(&ext) {
                return mime;
            }
        }
        &self.fallback
    }

    /// Content-Type for a file path
    pub fn for_path(&self, path: &Path) -> &str {
        self.content_type(path.extension().and_then(|e| e.to_str()))
    }

    pub fn uses_builtin(&self) -> bool {
        self.builtin
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for MimeTable {
    fn default() -> Self {
        Self::from_config(&MimeConfig::default())
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_ascii_lowercase()
}

/// Built-in guesses used beneath the explicit table
fn builtin_content_type(extension: &str) -> Option<&'static str> {
    let mime = match extension {
        // Text
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "txt" | "md" => "text/plain",
        "xml" => "application/xml",
        "csv" => "text/csv",

        // JavaScript/WASM
        "js" | "mjs" => "text/javascript",
        "json" | "map" => "application/json",
        "wasm" => "application/wasm",
        "webmanifest" => "application/manifest+json",

        // Images
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/vnd.microsoft.icon",
        "webp" => "image/webp",
        "avif" => "image/avif",

        // Video
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "ogv" => "video/ogg",

        // Audio
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",

        // Fonts
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",

        // Archives and documents
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",

        _ => return None,
    };
    Some(mime)
}
