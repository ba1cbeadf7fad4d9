//! Router binding lifecycle listeners to a runtime handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use crate::error::{HookError, RouterError};
use crate::events::{Descriptor, Event, HookKey, Payload};
use crate::hooks::{BuiltinHook, HookRegistry, Listener, ProcessNaming};
use crate::router::pipeline::Hooks;
use crate::runtime::{Callback, Endpoint, Runtime, Settings};

/// Routes runtime lifecycle events to ordered listeners.
///
/// The runtime handle is created on first use from the endpoint. At most one
/// callback per descriptor is ever installed with it, and only once something
/// listens to that descriptor.
pub struct Router<R: Runtime> {
    endpoint: Endpoint,
    server: OnceLock<Arc<R>>,
    hooks: Arc<Hooks>,
    bound: [AtomicBool; Descriptor::COUNT],
}

impl<R: Runtime> Router<R> {
    /// Create a router over `registry`. The runtime handle is not built yet.
    pub fn new(endpoint: Endpoint, registry: HookRegistry) -> Self {
        Self {
            endpoint,
            server: OnceLock::new(),
            hooks: Arc::new(Hooks::new(registry)),
            bound: std::array::from_fn(|_| AtomicBool::new(false)),
        }
    }

    /// Add a built-in hook at construction time.
    ///
    /// Its descriptors are bound when the router starts.
    #[must_use]
    pub fn with_builtin(self, hook: Arc<dyn BuiltinHook>) -> Self {
        self.hooks.install(hook);
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// The runtime handle, created on first call and shared afterwards.
    pub fn server(&self) -> Result<Arc<R>, RouterError> {
        if let Some(server) = self.server.get() {
            return Ok(Arc::clone(server));
        }
        let created = Arc::new(R::create(&self.endpoint)?);
        tracing::debug!(endpoint = %self.endpoint, "Runtime handle created");
        Ok(Arc::clone(self.server.get_or_init(|| created)))
    }

    /// Register a closure listener for `key`.
    pub fn on<F>(&self, key: impl Into<HookKey>, listener: F) -> Result<(), RouterError>
    where
        F: Fn(&dyn Runtime, &Event) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.on_listener(key, Arc::new(listener))
    }

    /// Register a listener for `key`.
    pub fn on_listener(
        &self,
        key: impl Into<HookKey>,
        listener: Arc<dyn Listener>,
    ) -> Result<(), RouterError> {
        self.on_all(key, [listener])
    }

    /// Register several listeners for `key`, in order.
    pub fn on_all(
        &self,
        key: impl Into<HookKey>,
        listeners: impl IntoIterator<Item = Arc<dyn Listener>>,
    ) -> Result<(), RouterError> {
        let key = key.into();
        let mut registered = 0usize;
        for listener in listeners {
            self.hooks.register(key, listener);
            registered += 1;
        }
        if registered == 0 {
            return Ok(());
        }
        tracing::trace!(key = %key, registered, "Listeners registered");
        self.bind(key.descriptor)
    }

    /// Install a built-in hook, binding every descriptor it declares.
    pub fn install_builtin(&self, hook: Arc<dyn BuiltinHook>) -> Result<(), RouterError> {
        let descriptors = hook.descriptors();
        self.hooks.install(hook);
        for descriptor in descriptors {
            self.bind(*descriptor)?;
        }
        Ok(())
    }

    /// Name master, manager and worker processes `<prefix><role>-<pid>...`.
    pub fn set_process_name(&self, prefix: impl Into<String>) -> Result<(), RouterError> {
        self.install_builtin(Arc::new(ProcessNaming::new(prefix)))
    }

    /// Whether a runtime callback has been installed for `descriptor`.
    pub fn is_bound(&self, descriptor: Descriptor) -> bool {
        self.bound[descriptor.index()].load(Ordering::Acquire)
    }

    /// Snapshot of the current listener table.
    pub fn registry(&self) -> Arc<HookRegistry> {
        self.hooks.registry()
    }

    /// Notify `ready` listeners, apply settings and run the runtime.
    ///
    /// Settings already applied on the runtime handle are kept; `settings`
    /// then fills what is missing, and internal defaults fill the rest.
    /// Blocks for as long as the runtime's own `start` does.
    pub fn start(&self, settings: Settings) -> Result<(), RouterError> {
        let server = self.server()?;

        // Listeners injected through the registry have not been bound yet.
        for descriptor in Descriptor::ALL {
            if self.hooks.is_wanted(descriptor) {
                self.bind(descriptor)?;
            }
        }

        let ready = Event::from_raw(Descriptor::Ready, Payload::Ready)?;
        self.hooks
            .registry()
            .dispatch(&Descriptor::Ready.primary(), server.as_ref(), &ready)?;

        let existing = server.settings();
        let defaults = Settings::defaults();
        let merged = Settings::layered([&existing, &settings, &defaults]);
        server.set(merged)?;

        tracing::info!(endpoint = %self.endpoint, "Starting runtime");
        server.start()?;
        Ok(())
    }

    fn bind(&self, descriptor: Descriptor) -> Result<(), RouterError> {
        if !descriptor.is_runtime_event() || self.is_bound(descriptor) {
            return Ok(());
        }
        let server = self.server()?;
        if self.bound[descriptor.index()]
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }

        let hooks = Arc::clone(&self.hooks);
        let callback: Callback = Arc::new(move |server: &dyn Runtime, payload: Payload| {
            hooks.fire(descriptor, server, payload)
        });
        server.on(descriptor.name(), callback);

        tracing::debug!(event = descriptor.name(), "Runtime callback bound");
        Ok(())
    }
}

impl<R: Runtime> std::fmt::Debug for Router<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bound: Vec<_> = Descriptor::ALL
            .iter()
            .filter(|d| self.is_bound(**d))
            .map(|d| d.name())
            .collect();
        f.debug_struct("Router")
            .field("endpoint", &self.endpoint)
            .field("bound", &bound)
            .finish()
    }
}
