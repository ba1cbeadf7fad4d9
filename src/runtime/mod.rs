//! Runtime handle interface and the bundled tokio runtime.
//!
//! # Data Flow
//! ```text
//! Endpoint (host, port, mode, socket type)
//!     → Runtime::create (configuration errors surface here)
//!     → Runtime::on(name, callback)      one callback per event name
//!     → Runtime::set(settings)           before start
//!     → Runtime::start()                 blocks until shutdown
//!         master:   start → manager_start
//!         workers:  worker_start → connect / receive / close / request → worker_stop
//!         tasks:    worker_start → task → finish → worker_stop
//!         master:   manager_stop → shutdown
//! ```
//!
//! # Design Decisions
//! - The router only depends on the operations listed on [`Runtime`]
//! - Runtime-specific operations (send, reload, dispatch_task) live on the
//!   concrete type and are reached through the router's `server()` handle
//! - Callbacks are synchronous; a slow listener stalls its worker

pub mod backoff;
pub mod connection;
pub mod listener;
pub mod settings;
pub mod task;
pub mod tcp;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{HookError, RuntimeError};
use crate::events::Payload;

pub use settings::{RuntimeSettings, Settings};
pub use tcp::TcpRuntime;

/// Low-level callback installed with the runtime for one event name.
pub type Callback = Arc<dyn Fn(&dyn Runtime, Payload) -> Result<(), HookError> + Send + Sync>;

/// Operations the router needs from a server runtime.
pub trait Runtime: Send + Sync + 'static {
    /// Construct a handle for `endpoint`.
    fn create(endpoint: &Endpoint) -> Result<Self, RuntimeError>
    where
        Self: Sized;

    /// Install the callback for `event`, replacing any previous one.
    fn on(&self, event: &str, callback: Callback);

    /// Apply settings. Keys present in `settings` replace current values.
    fn set(&self, settings: Settings) -> Result<(), RuntimeError>;

    /// Settings currently applied.
    fn settings(&self) -> Settings;

    /// Run the server. Blocks until it shuts down.
    fn start(&self) -> Result<(), RuntimeError>;

    /// Set the OS-visible name of the current process.
    fn set_process_name(&self, name: &str) -> Result<(), RuntimeError>;
}

/// Process model of the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerMode {
    /// Workers accept connections directly; no manager.
    Base,
    /// Master plus a manager supervising workers.
    #[default]
    Process,
}

/// Listening socket family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocketType {
    #[default]
    Tcp,
    Tcp6,
}

/// Where and how a runtime listens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub mode: ServerMode,
    pub sock_type: SocketType,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16, mode: ServerMode, sock_type: SocketType) -> Self {
        Self {
            host: host.into(),
            port,
            mode,
            sock_type,
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new("0.0.0.0", 9501, ServerMode::Process, SocketType::Tcp)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sock_type {
            SocketType::Tcp => write!(f, "{}:{}", self.host, self.port),
            SocketType::Tcp6 => write!(f, "[{}]:{}", self.host, self.port),
        }
    }
}
