//! Response accumulated by listeners and written back by the runtime.
//!
//! # Design Decisions
//! - Cloning shares the same response; listeners only see `&Event`
//! - Writes after `end` are ignored
//! - Status defaults to 200 when nothing sets it

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::body::Body;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{HeaderMap, Response, StatusCode};

use crate::error::HookError;

#[derive(Debug)]
struct State {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    ended: bool,
}

/// Writable response for one request.
#[derive(Debug, Clone)]
pub struct RawResponse {
    state: Arc<Mutex<State>>,
}

impl RawResponse {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                body: Vec::new(),
                ended: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the status code.
    pub fn status(&self, code: u16) -> Result<(), HookError> {
        let status = StatusCode::from_u16(code).map_err(|e| HookError::Bridge(e.to_string()))?;
        self.lock().status = status;
        Ok(())
    }

    /// Set a header, replacing earlier values.
    pub fn header(&self, name: &str, value: &str) -> Result<(), HookError> {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| HookError::Bridge(e.to_string()))?;
        let value = HeaderValue::from_str(value).map_err(|e| HookError::Bridge(e.to_string()))?;
        self.lock().headers.insert(name, value);
        Ok(())
    }

    /// Append to the body.
    pub fn write(&self, chunk: impl AsRef<[u8]>) {
        let mut state = self.lock();
        if !state.ended {
            state.body.extend_from_slice(chunk.as_ref());
        }
    }

    /// Append a final chunk and seal the response.
    pub fn end(&self, chunk: impl AsRef<[u8]>) {
        let mut state = self.lock();
        if !state.ended {
            state.body.extend_from_slice(chunk.as_ref());
            state.ended = true;
        }
    }

    pub fn is_ended(&self) -> bool {
        self.lock().ended
    }

    pub fn status_code(&self) -> StatusCode {
        self.lock().status
    }

    /// Build the HTTP response from what listeners wrote.
    pub fn into_http(self) -> Response<Body> {
        let mut state = self.lock();
        let body = std::mem::take(&mut state.body);
        let mut response = Response::new(Body::from(body));
        *response.status_mut() = state.status;
        *response.headers_mut() = std::mem::take(&mut state.headers);
        response
    }
}

impl Default for RawResponse {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let response = RawResponse::new();
        let writer = response.clone();
        writer.status(201).unwrap();
        writer.header("content-type", "text/plain").unwrap();
        writer.write("hello ");
        writer.end("world");
        writer.write("ignored");

        assert!(response.is_ended());
        assert_eq!(response.status_code(), StatusCode::CREATED);

        let http = response.into_http();
        assert_eq!(http.status(), StatusCode::CREATED);
        assert_eq!(http.headers()["content-type"], "text/plain");
    }

    #[test]
    fn rejects_invalid_status() {
        let response = RawResponse::new();
        assert!(matches!(response.status(1000), Err(HookError::Bridge(_))));
        assert_eq!(response.status_code(), StatusCode::OK);
    }

    #[test]
    fn rejects_invalid_header() {
        let response = RawResponse::new();
        assert!(response.header("bad header", "x").is_err());
    }
}
