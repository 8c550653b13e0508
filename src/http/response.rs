//! HTTP response building module
//!
//! Builders for every response the file engine emits. Each sets `Server`
//! first and the content headers after it; the cross-origin headers are
//! appended later, at finalisation.

use super::range::ByteRange;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{
    ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, LAST_MODIFIED, LOCATION, SERVER,
};
use hyper::http::response::Builder;
use hyper::{Response, StatusCode};

/// Content-Type of generated error pages
pub const ERROR_CONTENT_TYPE: &str = "text/html;charset=utf-8";

/// Content-Type of generated directory listings
pub const LISTING_CONTENT_TYPE: &str = "text/html; charset=utf-8";

fn base(server: &str, status: StatusCode) -> Builder {
    Response::builder().status(status).header(SERVER, server)
}

fn body_unless_head(data: Bytes, is_head: bool) -> Full<Bytes> {
    if is_head {
        Full::new(Bytes::new())
    } else {
        Full::new(data)
    }
}

/// Build 200 OK response for a whole file
pub fn build_file_response(
    server: &str,
    data: Bytes,
    content_type: &str,
    last_modified: &str,
    is_head: bool,
) -> Response<Full<Bytes>> {
    base(server, StatusCode::OK)
        .header(CONTENT_TYPE, content_type)
        .header(CONTENT_LENGTH, data.len())
        .header(LAST_MODIFIED, last_modified)
        .header(ACCEPT_RANGES, "bytes")
        .body(body_unless_head(data, is_head))
        .unwrap_or_else(|e| fallback("200", &e))
}

/// Build 206 Partial Content response; `data` is the full file
pub fn build_partial_response(
    server: &str,
    data: &Bytes,
    range: ByteRange,
    content_type: &str,
    last_modified: &str,
    is_head: bool,
) -> Response<Full<Bytes>> {
    let total = data.len();
    base(server, StatusCode::PARTIAL_CONTENT)
        .header(CONTENT_TYPE, content_type)
        .header(CONTENT_LENGTH, range.len())
        .header(CONTENT_RANGE, range.content_range(total))
        .header(LAST_MODIFIED, last_modified)
        .header(ACCEPT_RANGES, "bytes")
        .body(body_unless_head(
            data.slice(range.start..=range.end),
            is_head,
        ))
        .unwrap_or_else(|e| fallback("206", &e))
}

/// Build 304 Not Modified response
pub fn build_304_response(server: &str, last_modified: &str) -> Response<Full<Bytes>> {
    base(server, StatusCode::NOT_MODIFIED)
        .header(LAST_MODIFIED, last_modified)
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|e| fallback("304", &e))
}

/// Build 301 redirect to the slash-terminated directory path
pub fn build_301_response(server: &str, location: &str) -> Response<Full<Bytes>> {
    base(server, StatusCode::MOVED_PERMANENTLY)
        .header(LOCATION, location)
        .header(CONTENT_LENGTH, 0)
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|e| fallback("301", &e))
}

/// Build 416 Range Not Satisfiable response
pub fn build_416_response(server: &str, total: usize, is_head: bool) -> Response<Full<Bytes>> {
    let mut response = build_error_response(
        server,
        StatusCode::RANGE_NOT_SATISFIABLE,
        "Requested range not satisfiable",
        is_head,
    );
    if let Ok(value) = format!("bytes */{total}").parse() {
        response.headers_mut().insert(CONTENT_RANGE, value);
    }
    response
}

/// Build generated HTML page (directory listing)
pub fn build_html_response(server: &str, html: String, is_head: bool) -> Response<Full<Bytes>> {
    let data = Bytes::from(html);
    base(server, StatusCode::OK)
        .header(CONTENT_TYPE, LISTING_CONTENT_TYPE)
        .header(CONTENT_LENGTH, data.len())
        .body(body_unless_head(data, is_head))
        .unwrap_or_else(|e| fallback("HTML", &e))
}

/// Build an error response with an HTML explanation page
pub fn build_error_response(
    server: &str,
    status: StatusCode,
    message: &str,
    is_head: bool,
) -> Response<Full<Bytes>> {
    let data = Bytes::from(error_page(status, message));
    base(server, status)
        .header(CONTENT_TYPE, ERROR_CONTENT_TYPE)
        .header(CONTENT_LENGTH, data.len())
        .body(body_unless_head(data, is_head))
        .unwrap_or_else(|e| fallback(status.as_str(), &e))
}

/// HTML body for error responses
pub fn error_page(status: StatusCode, message: &str) -> String {
    let reason = status.canonical_reason().unwrap_or("Unknown");
    format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\">\n\
         <head>\n<meta charset=\"utf-8\">\n<title>{code} {reason}</title>\n</head>\n\
         <body>\n<h1>{code} {reason}</h1>\n<p>{message}</p>\n</body>\n\
         </html>\n",
        code = status.as_u16(),
        message = escape_html(message),
    )
}

/// Escape text for inclusion in HTML element content or attributes
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Log response build error and substitute a bare response
fn fallback(status: &str, error: &hyper::http::Error) -> Response<Full<Bytes>> {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}
