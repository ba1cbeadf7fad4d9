//! Ordered listener sequences keyed by [`HookKey`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::HookError;
use crate::events::{Event, HookKey};
use crate::runtime::Runtime;

/// A hook consumer.
///
/// Implemented for every `Fn(&dyn Runtime, &Event) -> Result<(), HookError>`
/// closure, so most callers never name this trait.
pub trait Listener: Send + Sync {
    fn call(&self, server: &dyn Runtime, event: &Event) -> Result<(), HookError>;
}

impl<F> Listener for F
where
    F: Fn(&dyn Runtime, &Event) -> Result<(), HookError> + Send + Sync,
{
    fn call(&self, server: &dyn Runtime, event: &Event) -> Result<(), HookError> {
        self(server, event)
    }
}

/// Mapping from registry key to listeners in registration order.
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: HashMap<HookKey, Vec<Arc<dyn Listener>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `listener` to the sequence for `key`.
    pub fn register(&mut self, key: impl Into<HookKey>, listener: Arc<dyn Listener>) {
        self.hooks.entry(key.into()).or_default().push(listener);
    }

    /// Whether any listener is registered for `key`.
    pub fn has_listeners(&self, key: &HookKey) -> bool {
        self.hooks.get(key).is_some_and(|seq| !seq.is_empty())
    }

    /// Invoke every listener for `key` in order, stopping at the first error.
    pub fn dispatch(
        &self,
        key: &HookKey,
        server: &dyn Runtime,
        event: &Event,
    ) -> Result<(), HookError> {
        let Some(listeners) = self.hooks.get(key) else {
            return Ok(());
        };
        for (position, listener) in listeners.iter().enumerate() {
            if let Err(error) = listener.call(server, event) {
                tracing::debug!(
                    key = %key,
                    position,
                    seq = event.seq,
                    error = %error,
                    "Listener failed, aborting dispatch"
                );
                return Err(error);
            }
        }
        Ok(())
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, seq) in &self.hooks {
            map.entry(&key.to_string(), &seq.len());
        }
        map.finish()
    }
}
