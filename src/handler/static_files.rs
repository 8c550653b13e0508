//! Static file serving module
//!
//! Maps request paths onto files under the serve root, picks a content type
//! from the injected [`MimeTable`], and builds the response. Directories get
//! a slash redirect, an index file, or a generated listing.

use crate::config::Config;
use crate::handler::router::RequestContext;
use crate::http::{self, cache, response::escape_html, MimeTable, RangeOutcome};
use crate::logger;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::fmt::Write as _;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;

/// Characters left as-is in listing hrefs
const LINK_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~')
    .remove(b'/');

const FILE_NOT_FOUND: &str = "File not found";

/// Static file engine, configured once and shared by all connections
#[derive(Debug, Clone)]
pub struct FileServer {
    root: PathBuf,
    mime: MimeTable,
    index_files: Vec<String>,
    server_name: String,
}

impl FileServer {
    pub fn new(root: impl Into<PathBuf>, mime: MimeTable) -> Self {
        Self {
            root: root.into(),
            mime,
            index_files: vec!["index.html".to_string(), "index.htm".to_string()],
            server_name: concat!("coi-serve/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.files.root, MimeTable::from_config(&config.mime))
            .with_index_files(config.files.index_files.clone())
            .with_server_name(config.http.server_name.clone())
    }

    #[must_use]
    pub fn with_index_files(mut self, index_files: Vec<String>) -> Self {
        self.index_files = index_files;
        self
    }

    #[must_use]
    pub fn with_server_name(mut self, server_name: String) -> Self {
        self.server_name = server_name;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub const fn mime(&self) -> &MimeTable {
        &self.mime
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Serve a GET or HEAD request
    pub async fn serve(&self, ctx: &RequestContext<'_>) -> Response<Full<Bytes>> {
        let Some(path) = translate_path(&self.root, ctx.path) else {
            return self.not_found(FILE_NOT_FOUND, ctx.is_head);
        };
        let trailing_slash = ctx.path.ends_with('/');

        let Ok(metadata) = fs::metadata(&path).await else {
            return self.not_found(FILE_NOT_FOUND, ctx.is_head);
        };
        if !self.is_within_root(&path, ctx.path) {
            return self.not_found(FILE_NOT_FOUND, ctx.is_head);
        }

        if metadata.is_dir() {
            if !trailing_slash {
                let location = match ctx.query {
                    Some(query) => format!("{}/?{query}", ctx.path),
                    None => format!("{}/", ctx.path),
                };
                return http::build_301_response(&self.server_name, &location);
            }
            for index in &self.index_files {
                let candidate = path.join(index);
                if let Ok(index_meta) = fs::metadata(&candidate).await {
                    if index_meta.is_file() {
                        return self.serve_file(ctx, &candidate, &index_meta).await;
                    }
                }
            }
            return self.serve_listing(ctx, &path).await;
        }

        if trailing_slash {
            return self.not_found(FILE_NOT_FOUND, ctx.is_head);
        }
        self.serve_file(ctx, &path, &metadata).await
    }

    /// Build an error page response carrying this server's name
    pub fn error(&self, status: StatusCode, message: &str, is_head: bool) -> Response<Full<Bytes>> {
        http::build_error_response(&self.server_name, status, message, is_head)
    }

    fn not_found(&self, message: &str, is_head: bool) -> Response<Full<Bytes>> {
        self.error(StatusCode::NOT_FOUND, message, is_head)
    }

    /// Reject paths that escape the root through symlinks
    fn is_within_root(&self, path: &Path, request_path: &str) -> bool {
        let root = match self.root.canonicalize() {
            Ok(p) => p,
            Err(e) => {
                logger::log_warning(&format!(
                    "Serve root not found or inaccessible '{}': {e}",
                    self.root.display()
                ));
                return false;
            }
        };
        let Ok(resolved) = path.canonicalize() else {
            return false;
        };
        if resolved.starts_with(&root) {
            return true;
        }
        logger::log_warning(&format!(
            "Path traversal attempt blocked: {request_path} -> {}",
            resolved.display()
        ));
        false
    }

    /// Serve a regular file; `metadata` is the stat already taken for it
    async fn serve_file(
        &self,
        ctx: &RequestContext<'_>,
        path: &Path,
        metadata: &Metadata,
    ) -> Response<Full<Bytes>> {
        let modified = metadata.modified().unwrap_or_else(|_| SystemTime::now());
        let last_modified = cache::http_date(modified);

        if cache::not_modified_since(
            ctx.if_modified_since.as_deref(),
            ctx.if_none_match.as_deref(),
            modified,
        ) {
            return http::build_304_response(&self.server_name, &last_modified);
        }

        let content = match fs::read(path).await {
            Ok(c) => Bytes::from(c),
            Err(e) => {
                logger::log_error(&format!("Failed to read file '{}': {e}", path.display()));
                return self.not_found(FILE_NOT_FOUND, ctx.is_head);
            }
        };

        let content_type = self.mime.for_path(path);
        match http::resolve_range(ctx.range.as_deref(), content.len()) {
            RangeOutcome::Full => http::build_file_response(
                &self.server_name,
                content,
                content_type,
                &last_modified,
                ctx.is_head,
            ),
            RangeOutcome::Partial(range) => http::build_partial_response(
                &self.server_name,
                &content,
                range,
                content_type,
                &last_modified,
                ctx.is_head,
            ),
            RangeOutcome::Unsatisfiable => {
                http::build_416_response(&self.server_name, content.len(), ctx.is_head)
            }
        }
    }

    async fn serve_listing(&self, ctx: &RequestContext<'_>, dir: &Path) -> Response<Full<Bytes>> {
        match list_directory(dir).await {
            Ok(entries) => {
                let display_path = percent_decode_str(ctx.path).decode_utf8_lossy();
                let html = render_listing(&display_path, &entries);
                http::build_html_response(&self.server_name, html, ctx.is_head)
            }
            Err(e) => {
                logger::log_warning(&format!(
                    "Failed to list directory '{}': {e}",
                    dir.display()
                ));
                self.not_found("No permission to list directory", ctx.is_head)
            }
        }
    }
}

/// Map a URL path onto the filesystem below `root`
///
/// The path is percent-decoded and normalised lexically: empty and `.`
/// segments are dropped and `..` removes the previous segment, never
/// climbing above `root`. A segment holding a backslash or NUL names no
/// file, so the whole path yields `None`.
pub fn translate_path(root: &Path, url_path: &str) -> Option<PathBuf> {
    let url_path = url_path.split(['?', '#']).next().unwrap_or_default();
    let decoded = percent_decode_str(url_path).decode_utf8_lossy();

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s if s.contains(['\\', '\0']) => return None,
            s => segments.push(s),
        }
    }

    Some(
        segments
            .into_iter()
            .fold(root.to_path_buf(), |path, segment| path.join(segment)),
    )
}

/// One row of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub name: String,
    pub is_dir: bool,
    pub is_symlink: bool,
}

impl ListingEntry {
    fn display_name(&self) -> String {
        if self.is_symlink {
            format!("{}@", self.name)
        } else if self.is_dir {
            format!("{}/", self.name)
        } else {
            self.name.clone()
        }
    }

    fn link_name(&self) -> String {
        if self.is_dir {
            format!("{}/", self.name)
        } else {
            self.name.clone()
        }
    }
}

/// Read a directory, sorted case-insensitively by name
pub async fn list_directory(dir: &Path) -> std::io::Result<Vec<ListingEntry>> {
    let mut reader = fs::read_dir(dir).await?;
    let mut entries = Vec::new();
    while let Some(entry) = reader.next_entry().await? {
        let is_symlink = entry.file_type().await.is_ok_and(|t| t.is_symlink());
        let is_dir = fs::metadata(entry.path()).await.is_ok_and(|m| m.is_dir());
        entries.push(ListingEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_dir,
            is_symlink,
        });
    }
    entries.sort_by_key(|e| e.name.to_lowercase());
    Ok(entries)
}

/// Render the HTML page for a directory listing
pub fn render_listing(display_path: &str, entries: &[ListingEntry]) -> String {
    let title = format!("Directory listing for {}", escape_html(display_path));
    let mut html = format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n</head>\n<body>\n<h1>{title}</h1>\n<hr>\n<ul>\n"
    );
    for entry in entries {
        let _ = writeln!(
            html,
            "<li><a href=\"{}\">{}</a></li>",
            utf8_percent_encode(&entry.link_name(), LINK_SAFE),
            escape_html(&entry.display_name()),
        );
    }
    html.push_str("</ul>\n<hr>\n</body>\n</html>\n");
    html
}
