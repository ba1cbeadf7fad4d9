//! Built-in hooks supplied by the router itself.
//!
//! A built-in hook occupies a fixed slot per descriptor and always runs
//! ahead of user listeners in the same phase, whatever order things were
//! registered in.

use std::fmt;
use std::sync::Arc;

use crate::error::HookError;
use crate::events::{Descriptor, Event};
use crate::runtime::Runtime;

/// Hook provided by this layer rather than by application code.
pub trait BuiltinHook: Send + Sync {
    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Descriptors this hook attaches to.
    fn descriptors(&self) -> &'static [Descriptor];

    /// Runs ahead of user "before" listeners.
    fn before(&self, _server: &dyn Runtime, _event: &Event) -> Result<(), HookError> {
        Ok(())
    }

    /// Runs ahead of user "after" listeners.
    fn after(&self, _server: &dyn Runtime, _event: &Event) -> Result<(), HookError> {
        Ok(())
    }
}

/// One optional built-in hook per descriptor.
#[derive(Clone)]
pub struct BuiltinTable {
    slots: [Option<Arc<dyn BuiltinHook>>; Descriptor::COUNT],
}

impl BuiltinTable {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }

    /// Place `hook` in the slot of every descriptor it declares.
    ///
    /// A hook already occupying a slot is replaced.
    pub fn install(&mut self, hook: Arc<dyn BuiltinHook>) {
        for descriptor in hook.descriptors() {
            if let Some(previous) = &self.slots[descriptor.index()] {
                tracing::warn!(
                    event = descriptor.name(),
                    previous = previous.name(),
                    replacement = hook.name(),
                    "Replacing built-in hook"
                );
            }
            self.slots[descriptor.index()] = Some(Arc::clone(&hook));
        }
    }

    pub fn get(&self, descriptor: Descriptor) -> Option<&Arc<dyn BuiltinHook>> {
        self.slots[descriptor.index()].as_ref()
    }
}

impl Default for BuiltinTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BuiltinTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for descriptor in Descriptor::ALL {
            if let Some(hook) = self.get(descriptor) {
                map.entry(&descriptor.name(), &hook.name());
            }
        }
        map.finish()
    }
}
