//! Bootstrap facade.
//!
//! # Responsibilities
//! - Build a router for host/port/mode/socket type with an empty registry
//! - Hand out the (lazily created, memoized) runtime handle
//! - Offer the setup shortcuts the command line uses
//!
//! # Design Decisions
//! - Thin: every call lands on [`Router`]
//! - Request forwarding is one primary `request` listener, nothing more

use std::sync::Arc;

use crate::error::{HookError, RouterError};
use crate::events::{Descriptor, Event, HookKey};
use crate::hooks::HookRegistry;
use crate::http::RequestBridge;
use crate::router::Router;
use crate::runtime::{Endpoint, Runtime, ServerMode, Settings, SocketType};

/// Entry point wiring a router to a runtime.
#[derive(Debug)]
pub struct Bootstrap<R: Runtime> {
    router: Router<R>,
}

impl<R: Runtime> Bootstrap<R> {
    /// Prepare a server on `host:port`. The runtime is built on first use.
    pub fn create(host: impl Into<String>, port: u16, mode: ServerMode, sock_type: SocketType) -> Self {
        Self::from_endpoint(Endpoint::new(host, port, mode, sock_type))
    }

    pub fn from_endpoint(endpoint: Endpoint) -> Self {
        Self {
            router: Router::new(endpoint, HookRegistry::new()),
        }
    }

    /// The runtime handle; the same handle on every call.
    pub fn server(&self) -> Result<Arc<R>, RouterError> {
        self.router.server()
    }

    pub fn router(&self) -> &Router<R> {
        &self.router
    }

    pub fn on<F>(&self, key: impl Into<HookKey>, listener: F) -> Result<(), RouterError>
    where
        F: Fn(&dyn Runtime, &Event) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.router.on(key, listener)
    }

    pub fn set_process_name(&self, prefix: impl Into<String>) -> Result<(), RouterError> {
        self.router.set_process_name(prefix)
    }

    /// Forward every raw request/response pair to `bridge`.
    pub fn enable_request_forwarding<B: RequestBridge>(&self, bridge: B) -> Result<(), RouterError> {
        let bridge = Arc::new(bridge);
        self.router.on(Descriptor::Request, move |_server: &dyn Runtime, event: &Event| {
            match event.request() {
                Some((request, response)) => bridge.handle(request, response),
                None => Ok(()),
            }
        })
    }

    pub fn start(&self, settings: Settings) -> Result<(), RouterError> {
        self.router.start(settings)
    }
}
