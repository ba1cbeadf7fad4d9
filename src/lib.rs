//! Lifecycle event router for a multi-process style network server.
//!
//! The runtime emits named lifecycle events (process start, worker
//! start/stop, connection accept/close, data receive, task dispatch/finish,
//! shutdown, reload, HTTP request). The router lets application code attach
//! ordered `before` / primary / `after` listeners to any of them, binds the
//! runtime callback for an event only once someone listens, and runs
//! built-in hooks such as process naming ahead of user listeners.
//!
//! # Architecture Overview
//!
//! ```text
//!   Bootstrap ──▶ Router ──────────────▶ Runtime (TcpRuntime)
//!                   │  lazy bind (on)        │
//!                   ▼                        │ fires event
//!               HookRegistry ◀── pipeline ◀──┘
//!               BuiltinTable      builtin.before → before → primary
//!                                 → builtin.after → after
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod hooks;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod router;
pub mod runtime;

pub use config::RouterConfig;
pub use error::{HookError, RouterError, RuntimeError};
pub use events::{Descriptor, Event, HookKey, Payload, Phase, WorkerInfo};
pub use hooks::{BuiltinHook, HookRegistry, Listener, ProcessNaming};
pub use http::{RawRequest, RawResponse, RequestBridge};
pub use lifecycle::Bootstrap;
pub use router::Router;
pub use runtime::{Callback, Endpoint, Runtime, RuntimeSettings, ServerMode, Settings, SocketType, TcpRuntime};
