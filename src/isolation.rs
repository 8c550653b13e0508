//! Cross-origin isolation module
//!
//! Appends the cross-origin isolation headers to every response. Handler
//! responses (file, redirect, error, rejected method) go through the
//! [`FinishHeaders`] service decorator. Responses `hyper` writes on its own
//! when a request cannot be parsed never reach a service; the connection
//! stream patches those heads with [`append_to_head`].

use hyper::header::{HeaderMap, HeaderName, HeaderValue};
use hyper::service::Service;
use hyper::Response;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// The isolation headers, in the order they are written
pub const ISOLATION_HEADERS: [(&str, &str); 3] = [
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-embedder-policy", "require-corp"),
    // Sent with an empty value
    ("cross-origin-resource-policy", ""),
];

/// A step run on every response's headers just before transmission
pub trait HeaderFinisher: Send + Sync {
    fn finish(&self, headers: &mut HeaderMap);
}

/// Opts responses into cross-origin isolation
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossOriginIsolation;

impl HeaderFinisher for CrossOriginIsolation {
    fn finish(&self, headers: &mut HeaderMap) {
        for (name, value) in ISOLATION_HEADERS {
            headers.append(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            );
        }
    }
}

/// Ordered list of finishers, applied in registration order
#[derive(Default)]
pub struct ResponseFinishers {
    steps: Vec<Box<dyn HeaderFinisher>>,
}

impl ResponseFinishers {
    pub fn new() -> Self {
        Self::default()
    }

    /// The finisher set every server response goes through
    pub fn isolated() -> Self {
        Self::new().with(CrossOriginIsolation)
    }

    #[must_use]
    pub fn with(mut self, finisher: impl HeaderFinisher + 'static) -> Self {
        self.steps.push(Box::new(finisher));
        self
    }

    pub fn apply(&self, headers: &mut HeaderMap) {
        for step in &self.steps {
            step.finish(headers);
        }
    }

}

/// Append the isolation headers to a serialized HTTP/1 response head
///
/// `head` must end with the blank line (`\r\n\r\n`); the headers are
/// inserted before it, with title-case names.
pub fn append_to_head(head: &mut Vec<u8>) {
    debug_assert!(head.ends_with(b"\r\n\r\n"));
    head.truncate(head.len().saturating_sub(2));
    for (name, value) in ISOLATION_HEADERS {
        for (i, word) in name.split('-').enumerate() {
            if i > 0 {
                head.push(b'-');
            }
            let mut chars = word.bytes();
            if let Some(first) = chars.next() {
                head.push(first.to_ascii_uppercase());
            }
            head.extend(chars);
        }
        head.extend_from_slice(b": ");
        head.extend_from_slice(value.as_bytes());
        head.extend_from_slice(b"\r\n");
    }
    head.extend_from_slice(b"\r\n");
}

/// Service decorator that runs the finishers on every response of `inner`
#[derive(Clone)]
pub struct FinishHeaders<S> {
    inner: S,
    finishers: Arc<ResponseFinishers>,
}

impl<S> FinishHeaders<S> {
    pub const fn new(inner: S, finishers: Arc<ResponseFinishers>) -> Self {
        Self { inner, finishers }
    }
}

impl<S, Req, B> Service<Req> for FinishHeaders<S>
where
    S: Service<Req, Response = Response<B>>,
    S::Future: 'static,
{
    type Response = Response<B>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn call(&self, req: Req) -> Self::Future {
        let fut = self.inner.call(req);
        let finishers = Arc::clone(&self.finishers);
        Box::pin(async move {
            let mut response = fut.await?;
            finishers.apply(response.headers_mut());
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;
    use hyper::body::Bytes;
    use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE};
    use hyper::service::service_fn;
    use hyper::{Request, StatusCode};
    use std::convert::Infallible;

    fn isolation_values(headers: &HeaderMap) -> Vec<(String, String)> {
        headers
            .iter()
            .filter(|(name, _)| name.as_str().starts_with("cross-origin-"))
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap().to_string(),
                )
            })
            .collect()
    }

    #[test]
    fn test_finish_appends_in_order() {
        let mut headers = HeaderMap::new();
        CrossOriginIsolation.finish(&mut headers);
        assert_eq!(
            isolation_values(&headers),
            vec![
                ("cross-origin-opener-policy".into(), "same-origin".into()),
                ("cross-origin-embedder-policy".into(), "require-corp".into()),
                ("cross-origin-resource-policy".into(), String::new()),
            ]
        );
    }

    #[test]
    fn test_finish_keeps_existing_headers_first() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/html"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("12"));
        ResponseFinishers::isolated().apply(&mut headers);

        let names: Vec<_> = headers.keys().map(HeaderName::as_str).collect();
        assert_eq!(
            names,
            [
                "content-type",
                "content-length",
                "cross-origin-opener-policy",
                "cross-origin-embedder-policy",
                "cross-origin-resource-policy",
            ]
        );
    }

    #[test]
    fn test_finishers_run_in_registration_order() {
        struct Marker(&'static str);
        impl HeaderFinisher for Marker {
            fn finish(&self, headers: &mut HeaderMap) {
                headers.append("x-step", HeaderValue::from_static(self.0));
            }
        }

        let finishers = ResponseFinishers::new().with(Marker("a")).with(Marker("b"));
        let mut headers = HeaderMap::new();
        finishers.apply(&mut headers);
        let steps: Vec<_> = headers.get_all("x-step").iter().collect();
        assert_eq!(steps, ["a", "b"]);
    }

    #[test]
    fn test_append_to_raw_head() {
        let mut head = b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\n\r\n".to_vec();
        append_to_head(&mut head);
        assert_eq!(
            String::from_utf8(head).unwrap(),
            "HTTP/1.1 400 Bad Request\r\n\
             Content-Length: 0\r\n\
             Cross-Origin-Opener-Policy: same-origin\r\n\
             Cross-Origin-Embedder-Policy: require-corp\r\n\
             Cross-Origin-Resource-Policy: \r\n\
             \r\n"
        );
    }

    #[tokio::test]
    async fn test_decorator_covers_every_status() {
        for status in [
            StatusCode::OK,
            StatusCode::MOVED_PERMANENTLY,
            StatusCode::NOT_FOUND,
            StatusCode::NOT_IMPLEMENTED,
        ] {
            let inner = service_fn(move |_req: Request<Full<Bytes>>| async move {
                let mut response = Response::new(Full::new(Bytes::new()));
                *response.status_mut() = status;
                Ok::<_, Infallible>(response)
            });
            let service = FinishHeaders::new(inner, Arc::new(ResponseFinishers::isolated()));
            let response = service
                .call(Request::new(Full::new(Bytes::new())))
                .await
                .unwrap();

            assert_eq!(response.status(), status);
            for (name, value) in ISOLATION_HEADERS {
                let values: Vec<_> = response.headers().get_all(name).iter().collect();
                assert_eq!(values, [value], "{name} on {status}");
            }
        }
    }
}
