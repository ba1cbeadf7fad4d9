//! Task workers: consume dispatched tasks.
//!
//! Task workers share one queue. Each job fires `task` and, when that
//! firing succeeds, `finish` with the same task id.

use std::sync::Arc;

use hyper::body::Bytes;
use tokio::sync::{mpsc, Mutex};

use crate::events::{Descriptor, Payload, WorkerInfo};
use crate::runtime::worker::restart;
use crate::runtime::TcpRuntime;

/// A dispatched unit of work.
#[derive(Debug)]
pub(crate) struct TaskJob {
    pub(crate) task_id: u64,
    pub(crate) src_worker_id: u32,
    pub(crate) data: Bytes,
}

/// Receiving end shared by all task workers.
pub(crate) type TaskQueue = Arc<Mutex<mpsc::UnboundedReceiver<TaskJob>>>;

pub(crate) async fn run_task_worker(runtime: TcpRuntime, worker_id: u32, queue: TaskQueue) {
    let info = WorkerInfo {
        worker_id,
        worker_pid: std::process::id(),
        task_worker: true,
    };
    let mut shutdown = runtime.shutdown_listener();
    let mut reload = runtime.reload_listener();

    runtime.emit(Descriptor::WorkerStart, Payload::WorkerStart(info));
    tracing::debug!(worker_id, "Task worker started");

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            _ = reload.recv() => restart(&runtime, info),
            job = next_job(&queue) => match job {
                Some(job) => run_job(&runtime, job),
                None => break,
            },
        }
    }

    runtime.emit(Descriptor::WorkerStop, Payload::WorkerStop(info));
    tracing::debug!(worker_id, "Task worker stopped");
}

async fn next_job(queue: &TaskQueue) -> Option<TaskJob> {
    queue.lock().await.recv().await
}

fn run_job(runtime: &TcpRuntime, job: TaskJob) {
    let TaskJob {
        task_id,
        src_worker_id,
        data,
    } = job;
    tracing::trace!(task_id, src_worker_id, "Running task");

    let task = Payload::Task {
        task_id,
        src_worker_id,
        data: data.clone(),
    };
    if runtime.fire(Descriptor::Task, task).is_ok() {
        runtime.emit(Descriptor::Finish, Payload::Finish { task_id, data });
    }
}
