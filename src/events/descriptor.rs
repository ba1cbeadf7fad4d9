//! Event descriptors and registry keys.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of lifecycle moments the runtime can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Descriptor {
    /// Master process started.
    Start,
    /// Manager process started (process mode only).
    ManagerStart,
    /// Manager process is exiting.
    ManagerStop,
    /// Worker or task worker started.
    WorkerStart,
    /// Worker or task worker is exiting.
    WorkerStop,
    /// Worker exited abnormally.
    WorkerError,
    /// Connection accepted.
    Connect,
    /// Data received on a connection.
    Receive,
    /// Connection closed.
    Close,
    /// Task delivered to a task worker.
    Task,
    /// Task completed.
    Finish,
    /// Server shut down.
    Shutdown,
    /// Workers are being reloaded.
    Reload,
    /// HTTP request received.
    Request,
    /// Router is about to start the runtime. Never bound to the runtime.
    Ready,
}

impl Descriptor {
    /// Number of descriptors.
    pub const COUNT: usize = 15;

    /// Every descriptor, in declaration order.
    pub const ALL: [Descriptor; Self::COUNT] = [
        Self::Start,
        Self::ManagerStart,
        Self::ManagerStop,
        Self::WorkerStart,
        Self::WorkerStop,
        Self::WorkerError,
        Self::Connect,
        Self::Receive,
        Self::Close,
        Self::Task,
        Self::Finish,
        Self::Shutdown,
        Self::Reload,
        Self::Request,
        Self::Ready,
    ];

    /// Runtime-facing event name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::ManagerStart => "manager_start",
            Self::ManagerStop => "manager_stop",
            Self::WorkerStart => "worker_start",
            Self::WorkerStop => "worker_stop",
            Self::WorkerError => "worker_error",
            Self::Connect => "connect",
            Self::Receive => "receive",
            Self::Close => "close",
            Self::Task => "task",
            Self::Finish => "finish",
            Self::Shutdown => "shutdown",
            Self::Reload => "reload",
            Self::Request => "request",
            Self::Ready => "ready",
        }
    }

    /// Whether the runtime itself fires this descriptor.
    ///
    /// `Ready` is dispatched by the router from `start` and is never bound.
    pub fn is_runtime_event(self) -> bool {
        !matches!(self, Self::Ready)
    }

    /// Position in [`Descriptor::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Registry key for the "before" sub-event.
    pub fn before(self) -> HookKey {
        HookKey::new(self, Phase::Before)
    }

    /// Registry key for the primary event.
    pub fn primary(self) -> HookKey {
        HookKey::new(self, Phase::Primary)
    }

    /// Registry key for the "after" sub-event.
    pub fn after(self) -> HookKey {
        HookKey::new(self, Phase::After)
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Sub-stage of a firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Before,
    Primary,
    After,
}

/// Registry key: a descriptor plus the phase listeners run in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookKey {
    pub descriptor: Descriptor,
    pub phase: Phase,
}

impl HookKey {
    pub fn new(descriptor: Descriptor, phase: Phase) -> Self {
        Self { descriptor, phase }
    }
}

impl From<Descriptor> for HookKey {
    fn from(descriptor: Descriptor) -> Self {
        descriptor.primary()
    }
}

impl fmt::Display for HookKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.phase {
            Phase::Before => write!(f, "{}:before", self.descriptor),
            Phase::Primary => write!(f, "{}", self.descriptor),
            Phase::After => write!(f, "{}:after", self.descriptor),
        }
    }
}
