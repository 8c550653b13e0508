//! Request dispatch module
//!
//! Entry point for HTTP request processing: method validation, request
//! context extraction, and the access log line. Header finalisation happens
//! outside, in the service decorator wrapping this handler.

use crate::config::AppState;
use crate::logger::{self, AccessLogEntry};
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::header::{
    HeaderMap, HeaderName, IF_MODIFIED_SINCE, IF_NONE_MATCH, RANGE, REFERER, USER_AGENT,
};
use hyper::{Method, Request, Response, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Request context encapsulating information needed for request processing
#[derive(Debug)]
pub struct RequestContext<'a> {
    /// Raw (still percent-encoded) request path
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub is_head: bool,
    pub if_modified_since: Option<String>,
    pub if_none_match: Option<String>,
    pub range: Option<String>,
}

impl<'a> RequestContext<'a> {
    pub fn from_request<B>(req: &'a Request<B>) -> Self {
        let headers = req.headers();
        Self {
            path: req.uri().path(),
            query: req.uri().query(),
            is_head: req.method() == Method::HEAD,
            if_modified_since: header_string(headers, &IF_MODIFIED_SINCE),
            if_none_match: header_string(headers, &IF_NONE_MATCH),
            range: header_string(headers, &RANGE),
        }
    }
}

fn header_string(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();

    let response = match check_http_method(&state, req.method()) {
        Some(resp) => resp,
        None => state.files.serve(&RequestContext::from_request(&req)).await,
    };

    if state.config.logging.access_log {
        let entry = access_entry(&req, &response, peer_addr, started);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Only GET and HEAD are served; everything else is `501 Not Implemented`
fn check_http_method(state: &AppState, method: &Method) -> Option<Response<Full<Bytes>>> {
    match *method {
        Method::GET | Method::HEAD => None,
        _ => {
            logger::log_warning(&format!("Unsupported method: {method}"));
            Some(state.files.error(
                StatusCode::NOT_IMPLEMENTED,
                &format!("Unsupported method ('{method}')"),
                false,
            ))
        }
    }
}

fn access_entry<B>(
    req: &Request<B>,
    response: &Response<Full<Bytes>>,
    peer_addr: SocketAddr,
    started: Instant,
) -> AccessLogEntry {
    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = logger::http_version_label(req.version()).to_string();
    entry.status = response.status().as_u16();
    entry.body_bytes = response
        .body()
        .size_hint()
        .exact()
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or_default();
    entry.referer = header_string(req.headers(), &REFERER);
    entry.user_agent = header_string(req.headers(), &USER_AGENT);
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::MimeTable;
    use crate::handler::static_files::FileServer;
    use http_body_util::BodyExt;
    use hyper::header::CONTENT_TYPE;

    fn state_for(root: &std::path::Path) -> Arc<AppState> {
        let mut config = crate::config::Config::load_from("definitely-missing-serve-config")
            .unwrap();
        config.logging.access_log = false;
        let files = FileServer::new(root, MimeTable::default());
        Arc::new(AppState::with_files(config, files))
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    fn request(method: Method, uri: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    #[test]
    fn test_context_from_request() {
        let req = Request::builder()
            .method(Method::HEAD)
            .uri("/a%20b/c.js?x=1")
            .header(RANGE, "bytes=0-1")
            .body(())
            .unwrap();
        let ctx = RequestContext::from_request(&req);
        assert_eq!(ctx.path, "/a%20b/c.js");
        assert_eq!(ctx.query, Some("x=1"));
        assert!(ctx.is_head);
        assert_eq!(ctx.range.as_deref(), Some("bytes=0-1"));
        assert!(ctx.if_modified_since.is_none());
    }

    #[tokio::test]
    async fn test_unsupported_method_is_501() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_for(dir.path());
        let response = handle_request(request(Method::POST, "/"), state, peer())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/html;charset=utf-8");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(String::from_utf8_lossy(&body).contains("Unsupported method (&#x27;POST&#x27;)"));
    }

    #[tokio::test]
    async fn test_get_dispatches_to_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "ok").unwrap();
        let state = state_for(dir.path());
        let response = handle_request(request(Method::GET, "/index.html"), state, peer())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, "ok");
    }

    #[test]
    fn test_access_entry_fields() {
        let req = Request::builder()
            .uri("/index.html?v=1")
            .header(USER_AGENT, "curl/8.0")
            .body(())
            .unwrap();
        let response = Response::new(Full::new(Bytes::from_static(b"12345")));
        let entry = access_entry(&req, &response, peer(), Instant::now());
        assert_eq!(entry.remote_addr, "127.0.0.1");
        assert_eq!(entry.method, "GET");
        assert_eq!(entry.path, "/index.html");
        assert_eq!(entry.query.as_deref(), Some("v=1"));
        assert_eq!(entry.status, 200);
        assert_eq!(entry.body_bytes, 5);
        assert_eq!(entry.user_agent.as_deref(), Some("curl/8.0"));
    }
}
