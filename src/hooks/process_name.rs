//! Process identity hook.
//!
//! Names each process after its role before user listeners see the start
//! event: `<prefix><role>-<pid>[-<worker index>]` with role one of
//! `master`, `manager`, `worker`, `taskworker`.

use crate::error::HookError;
use crate::events::{Descriptor, Event, Payload};
use crate::hooks::BuiltinHook;
use crate::runtime::Runtime;

const DESCRIPTORS: &[Descriptor] = &[
    Descriptor::Start,
    Descriptor::ManagerStart,
    Descriptor::WorkerStart,
];

/// Built-in hook applying role-based process names.
#[derive(Debug, Clone)]
pub struct ProcessNaming {
    prefix: String,
}

impl ProcessNaming {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Name for the process described by `payload`, if it is a start event.
    pub fn title_for(&self, payload: &Payload) -> Option<String> {
        let prefix = &self.prefix;
        match payload {
            Payload::Start { master_pid, .. } => Some(format!("{prefix}master-{master_pid}")),
            Payload::ManagerStart { manager_pid } => Some(format!("{prefix}manager-{manager_pid}")),
            Payload::WorkerStart(info) => {
                let role = if info.task_worker { "taskworker" } else { "worker" };
                Some(format!(
                    "{prefix}{role}-{}-{}",
                    info.worker_pid, info.worker_id
                ))
            }
            _ => None,
        }
    }
}

impl BuiltinHook for ProcessNaming {
    fn name(&self) -> &'static str {
        "process-naming"
    }

    fn descriptors(&self) -> &'static [Descriptor] {
        DESCRIPTORS
    }

    fn before(&self, server: &dyn Runtime, event: &Event) -> Result<(), HookError> {
        let Some(title) = self.title_for(&event.payload) else {
            return Ok(());
        };
        // Cosmetic only; a refused title never aborts the firing.
        match server.set_process_name(&title) {
            Ok(()) => tracing::debug!(title = %title, "Process name set"),
            Err(error) => tracing::warn!(title = %title, error = %error, "Failed to set process name"),
        }
        Ok(())
    }
}
