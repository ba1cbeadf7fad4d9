//! Hook tables shared between the router and its installed callbacks.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::error::HookError;
use crate::events::{Descriptor, Event, HookKey, Payload};
use crate::hooks::{BuiltinHook, BuiltinTable, HookRegistry, Listener};
use crate::observability::metrics;
use crate::runtime::Runtime;

/// Listener and built-in tables.
///
/// Mutated only by setup calls (copy-on-write); read lock-free by firings.
pub(crate) struct Hooks {
    registry: ArcSwap<HookRegistry>,
    builtins: ArcSwap<BuiltinTable>,
}

impl Hooks {
    pub(crate) fn new(registry: HookRegistry) -> Self {
        Self {
            registry: ArcSwap::from_pointee(registry),
            builtins: ArcSwap::from_pointee(BuiltinTable::new()),
        }
    }

    pub(crate) fn register(&self, key: HookKey, listener: Arc<dyn Listener>) {
        self.registry.rcu(|current| {
            let mut next = (**current).clone();
            next.register(key, Arc::clone(&listener));
            next
        });
    }

    pub(crate) fn install(&self, hook: Arc<dyn BuiltinHook>) {
        self.builtins.rcu(|current| {
            let mut next = (**current).clone();
            next.install(Arc::clone(&hook));
            next
        });
    }

    pub(crate) fn registry(&self) -> Arc<HookRegistry> {
        self.registry.load_full()
    }

    /// Whether anything (built-in or listener, any phase) wants `descriptor`.
    pub(crate) fn is_wanted(&self, descriptor: Descriptor) -> bool {
        if self.builtins.load().get(descriptor).is_some() {
            return true;
        }
        let registry = self.registry.load();
        [descriptor.before(), descriptor.primary(), descriptor.after()]
            .iter()
            .any(|key| registry.has_listeners(key))
    }

    /// Run one firing of `descriptor`.
    pub(crate) fn fire(
        &self,
        descriptor: Descriptor,
        server: &dyn Runtime,
        payload: Payload,
    ) -> Result<(), HookError> {
        let event = Event::from_raw(descriptor, payload)?;
        metrics::record_firing(descriptor.name());

        let registry = self.registry.load_full();
        let builtin = self.builtins.load().get(descriptor).cloned();

        if let Some(hook) = &builtin {
            hook.before(server, &event)?;
        }
        registry.dispatch(&descriptor.before(), server, &event)?;
        registry.dispatch(&descriptor.primary(), server, &event)?;
        if let Some(hook) = &builtin {
            hook.after(server, &event)?;
        }
        registry.dispatch(&descriptor.after(), server, &event)
    }
}
