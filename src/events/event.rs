//! Event instances built fresh for every firing.
//!
//! The runtime hands the router a raw [`Payload`]; the router checks it
//! against the descriptor being fired and wraps it into an [`Event`] stamped
//! with a sequence number and wall-clock time. The event lives only for the
//! duration of that firing.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use hyper::body::Bytes;

use crate::error::HookError;
use crate::events::Descriptor;
use crate::http::{RawRequest, RawResponse};

/// Process-wide sequence counter for firings.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Identity of a worker process (or its emulation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerInfo {
    /// Worker index. Task workers are numbered after event workers.
    pub worker_id: u32,
    /// OS process id the worker runs in.
    pub worker_pid: u32,
    /// True for task workers.
    pub task_worker: bool,
}

/// Event-specific data delivered by the runtime.
#[derive(Debug, Clone)]
pub enum Payload {
    Start {
        master_pid: u32,
        manager_pid: u32,
    },
    ManagerStart {
        manager_pid: u32,
    },
    ManagerStop {
        manager_pid: u32,
    },
    WorkerStart(WorkerInfo),
    WorkerStop(WorkerInfo),
    WorkerError {
        worker: WorkerInfo,
        exit_code: i32,
        signal: i32,
    },
    Connect {
        fd: u64,
        reactor_id: u32,
        peer: SocketAddr,
    },
    Receive {
        fd: u64,
        reactor_id: u32,
        data: Bytes,
    },
    Close {
        fd: u64,
        reactor_id: u32,
    },
    Task {
        task_id: u64,
        src_worker_id: u32,
        data: Bytes,
    },
    Finish {
        task_id: u64,
        data: Bytes,
    },
    Shutdown,
    Reload,
    Request {
        request: Arc<RawRequest>,
        response: RawResponse,
    },
    Ready,
}

impl Payload {
    /// The descriptor this payload belongs to.
    pub fn descriptor(&self) -> Descriptor {
        match self {
            Self::Start { .. } => Descriptor::Start,
            Self::ManagerStart { .. } => Descriptor::ManagerStart,
            Self::ManagerStop { .. } => Descriptor::ManagerStop,
            Self::WorkerStart(_) => Descriptor::WorkerStart,
            Self::WorkerStop(_) => Descriptor::WorkerStop,
            Self::WorkerError { .. } => Descriptor::WorkerError,
            Self::Connect { .. } => Descriptor::Connect,
            Self::Receive { .. } => Descriptor::Receive,
            Self::Close { .. } => Descriptor::Close,
            Self::Task { .. } => Descriptor::Task,
            Self::Finish { .. } => Descriptor::Finish,
            Self::Shutdown => Descriptor::Shutdown,
            Self::Reload => Descriptor::Reload,
            Self::Request { .. } => Descriptor::Request,
            Self::Ready => Descriptor::Ready,
        }
    }
}

/// One firing of a descriptor.
#[derive(Debug, Clone)]
pub struct Event {
    pub descriptor: Descriptor,
    pub payload: Payload,
    /// Monotonic sequence number within this process.
    pub seq: u64,
    pub at: SystemTime,
}

impl Event {
    /// Build an event from the runtime's raw arguments.
    ///
    /// Fails when the payload belongs to a different descriptor.
    pub fn from_raw(descriptor: Descriptor, payload: Payload) -> Result<Self, HookError> {
        let actual = payload.descriptor();
        if actual != descriptor {
            return Err(HookError::PayloadMismatch {
                expected: descriptor,
                actual,
            });
        }
        Ok(Self {
            descriptor,
            payload,
            seq: EVENT_SEQ.fetch_add(1, Ordering::Relaxed),
            at: SystemTime::now(),
        })
    }

    /// Worker identity for worker lifecycle events.
    pub fn worker(&self) -> Option<WorkerInfo> {
        match &self.payload {
            Payload::WorkerStart(info) | Payload::WorkerStop(info) => Some(*info),
            Payload::WorkerError { worker, .. } => Some(*worker),
            _ => None,
        }
    }

    /// Connection id for connection events.
    pub fn fd(&self) -> Option<u64> {
        match &self.payload {
            Payload::Connect { fd, .. } | Payload::Receive { fd, .. } | Payload::Close { fd, .. } => {
                Some(*fd)
            }
            Payload::Request { request, .. } => Some(request.fd()),
            _ => None,
        }
    }

    /// Bytes carried by receive, task and finish events.
    pub fn data(&self) -> Option<&Bytes> {
        match &self.payload {
            Payload::Receive { data, .. }
            | Payload::Task { data, .. }
            | Payload::Finish { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Request/response pair of a request event.
    pub fn request(&self) -> Option<(&RawRequest, &RawResponse)> {
        match &self.payload {
            Payload::Request { request, response } => Some((request.as_ref(), response)),
            _ => None,
        }
    }
}
