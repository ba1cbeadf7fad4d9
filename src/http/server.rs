//! HTTP/1.1 connection driver for request forwarding.
//!
//! # Responsibilities
//! - Serve one accepted TCP connection with hyper
//! - Buffer each request body up to the configured limit
//! - Fire `request` and turn the listener-built response into HTTP
//! - Finish in-flight requests when the server shuts down

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;

use crate::events::{Descriptor, Payload};
use crate::http::{RawRequest, RawResponse, X_REQUEST_ID};
use crate::lifecycle::shutdown::ShutdownListener;
use crate::runtime::TcpRuntime;

/// Serve HTTP on `stream` until the peer closes or the server shuts down.
pub(crate) async fn serve_connection(
    runtime: TcpRuntime,
    stream: TcpStream,
    fd: u64,
    body_limit: usize,
    mut shutdown: ShutdownListener,
) {
    let service = service_fn(move |request: Request<Incoming>| {
        let runtime = runtime.clone();
        async move { Ok::<_, Infallible>(handle(&runtime, fd, body_limit, request).await) }
    });

    let connection = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
    tokio::pin!(connection);

    tokio::select! {
        result = connection.as_mut() => {
            if let Err(e) = result {
                tracing::debug!(fd, error = %e, "HTTP connection ended with error");
            }
        }
        _ = shutdown.recv() => {
            connection.as_mut().graceful_shutdown();
            if let Err(e) = connection.as_mut().await {
                tracing::debug!(fd, error = %e, "HTTP connection ended with error during shutdown");
            }
        }
    }
}

async fn handle(
    runtime: &TcpRuntime,
    fd: u64,
    body_limit: usize,
    request: Request<Incoming>,
) -> Response<Body> {
    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(Body::new(body), body_limit).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(fd, limit = body_limit, error = %e, "Request body rejected");
            return plain(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large");
        }
    };

    let request = Arc::new(RawRequest::new(fd, Request::from_parts(parts, bytes)));
    let response = RawResponse::new();
    let request_id = request.id().to_string();

    tracing::debug!(
        fd,
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
        "Request received"
    );

    let payload = Payload::Request {
        request,
        response: response.clone(),
    };
    if runtime.fire(Descriptor::Request, payload).is_err() {
        return plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
    }

    let mut http = response.into_http();
    if let Ok(value) = request_id.parse() {
        http.headers_mut().entry(X_REQUEST_ID).or_insert(value);
    }
    http
}

fn plain(status: StatusCode, message: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(message));
    *response.status_mut() = status;
    response
}
