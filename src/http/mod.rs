//! HTTP request forwarding.
//!
//! # Data Flow
//! ```text
//! TCP connection (request listener bound or open_http_protocol set)
//!     → server.rs (hyper HTTP/1.1, body buffered up to package_max_length)
//!     → request.rs (RawRequest: parts + body + request id)
//!     → runtime fires `request` with (RawRequest, RawResponse)
//!     → bridge.rs (RequestBridge hands the pair to the web framework)
//!     → response.rs (RawResponse accumulated by the bridge → hyper Response)
//! ```
//!
//! # Design Decisions
//! - Bodies are fully buffered; listeners are synchronous
//! - Request ID taken from `x-request-id` or generated (UUID v4)
//! - A failed request firing answers 500

pub mod bridge;
pub mod request;
pub mod response;
pub mod server;

pub use bridge::RequestBridge;
pub use request::{RawRequest, X_REQUEST_ID};
pub use response::RawResponse;
