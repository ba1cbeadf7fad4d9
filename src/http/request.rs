//! Raw request handed to the web-framework bridge.
//!
//! # Responsibilities
//! - Carry the buffered request (head + body) of one HTTP exchange
//! - Attach a request ID for correlation across listeners and logs
//! - Remember which connection the request arrived on

use hyper::body::Bytes;
use hyper::{HeaderMap, Method, Request, Uri, Version};
use uuid::Uuid;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Buffered HTTP request.
#[derive(Debug)]
pub struct RawRequest {
    fd: u64,
    id: String,
    inner: Request<Bytes>,
}

impl RawRequest {
    /// Wrap `request` received on connection `fd`.
    ///
    /// Keeps an incoming `x-request-id`, otherwise generates one.
    pub fn new(fd: u64, request: Request<Bytes>) -> Self {
        let id = request
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Self {
            fd,
            id,
            inner: request,
        }
    }

    pub fn fd(&self) -> u64 {
        self.fd
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    pub fn body(&self) -> &Bytes {
        self.inner.body()
    }

    /// The underlying `http` request.
    pub fn as_http(&self) -> &Request<Bytes> {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_incoming_request_id() {
        let request = Request::builder()
            .uri("/status")
            .header(X_REQUEST_ID, "abc-123")
            .body(Bytes::new())
            .unwrap();
        let raw = RawRequest::new(4, request);
        assert_eq!(raw.id(), "abc-123");
        assert_eq!(raw.fd(), 4);
        assert_eq!(raw.uri().path(), "/status");
    }

    #[test]
    fn generates_missing_request_id() {
        let request = Request::builder()
            .method(Method::POST)
            .body(Bytes::from_static(b"payload"))
            .unwrap();
        let raw = RawRequest::new(1, request);
        assert!(Uuid::parse_str(raw.id()).is_ok());
        assert_eq!(raw.method(), Method::POST);
        assert_eq!(raw.body().as_ref(), b"payload");
    }
}
