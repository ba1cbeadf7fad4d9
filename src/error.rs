//! Error taxonomy for the router and its runtimes.
//!
//! # Categories
//! - [`HookError`]: a listener (or built-in hook, or bridge) signalled failure
//!   while a firing was in progress. Aborts the rest of that firing only.
//! - [`RuntimeError`]: the runtime handle rejected its endpoint or settings,
//!   or failed while serving.
//! - [`RouterError`]: anything surfaced from a router setup call.

use thiserror::Error;

use crate::events::Descriptor;

/// Failure signalled during a firing.
#[derive(Debug, Error)]
pub enum HookError {
    /// A listener reported failure.
    #[error("listener failed: {0}")]
    Failed(String),

    /// The runtime delivered a payload that does not belong to the descriptor.
    #[error("payload of kind `{actual}` delivered for `{expected}`")]
    PayloadMismatch {
        expected: Descriptor,
        actual: Descriptor,
    },

    /// The web-framework bridge rejected a forwarded request.
    #[error("request bridge failed: {0}")]
    Bridge(String),

    /// Any other error raised by listener code.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl HookError {
    /// Shorthand for [`HookError::Failed`].
    pub fn failed(message: impl std::fmt::Display) -> Self {
        Self::Failed(message.to_string())
    }
}

/// Errors raised by a runtime handle.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Host, port, mode or socket type is not acceptable.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Failed to bind the listening socket.
    #[error("failed to bind: {0}")]
    Bind(#[source] std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings could not be interpreted.
    #[error("invalid settings: {0}")]
    Settings(String),

    /// `start` or `set` called while the server is already running.
    #[error("server is already running")]
    AlreadyRunning,

    /// A task was dispatched but no task workers are configured.
    #[error("no task workers are running")]
    NoTaskWorkers,

    /// The connection referenced by `fd` is not open.
    #[error("connection {0} is not open")]
    UnknownConnection(u64),

    /// The OS refused the process title.
    #[error("failed to set process name: {0}")]
    ProcessName(String),
}

/// Errors surfaced by router setup and start calls.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Hook(#[from] HookError),
}
